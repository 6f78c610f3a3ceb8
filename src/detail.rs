//! Per-game detail pages: overview, covers, screenshots, specs, ratings and
//! releases. Parsers are pure functions over HTML; `DetailScraper` fetches
//! the pages and resolves image pages through an `ImageStore`.

use crate::error::{Result, ScrapeError};
use crate::html::{all_texts, first_text, has_class, next_element, resolve, sel, text_of};
use crate::images::ImageStore;
use crate::models::{ByConsole, CoverEntry, ReleaseEntry};
use crate::source::PageSource;
use scraper::{ElementRef, Html, Node};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Title, Moby ID, rating, description and the genre block of a game.
pub type Overview = BTreeMap<String, String>;
/// Console name to spec key to value.
pub type ConsoleSpecs = BTreeMap<String, BTreeMap<String, String>>;
/// Console name to rating system to one value or a list.
pub type ConsoleRatings = BTreeMap<String, BTreeMap<String, Value>>;
/// Console name to stored screenshot locations.
pub type ConsoleScreenshots = BTreeMap<String, Vec<String>>;

type Fields = BTreeMap<String, String>;

/// A cover entry whose image pages are not visited yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverDraft {
    pub entry: CoverEntry,
    pub cover_links: Vec<String>,
}

pub fn parse_overview(html: &str, url: &str) -> Result<Overview> {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let title = first_text(root, &sel("h1")).ok_or_else(|| ScrapeError::missing(url, "title"))?;

    let mobyid = document
        .select(&sel(".text-sm.text-muted"))
        .map(text_of)
        .find_map(|text| {
            let (_, rest) = text.split_once("Moby ID:")?;
            rest.split_whitespace().next().map(str::to_string)
        })
        .unwrap_or_default();

    let mut overview = Overview::new();
    let mut rating = String::new();
    if let Some(info) = document.select(&sel("#infoBlock")).next() {
        rating = info
            .select(&sel(".info-score dl dt"))
            .find(|dt| text_of(*dt) == "Players")
            .and_then(next_element)
            .and_then(|dd| dd.select(&sel("span")).next())
            .and_then(|span| span.value().attr("data-tooltip"))
            .and_then(|tooltip| tooltip.split_whitespace().next())
            .unwrap_or_default()
            .to_string();

        let anchors = sel("a");
        let key_selector = sel(".info-genres dl.metadata dt");
        let value_selector = sel(".info-genres dl.metadata dd");
        let keys = info.select(&key_selector);
        let values = info.select(&value_selector);
        for (dt, dd) in keys.zip(values) {
            overview.insert(text_of(dt), all_texts(dd, &anchors).join(","));
        }
    }

    let description = first_text(root, &sel("#description-text"))
        .or_else(|| first_text(root, &sel("#gameOfficialDescription")))
        .unwrap_or_default();

    overview.insert("title".to_string(), title);
    overview.insert("mobyid".to_string(), mobyid);
    overview.insert("rating".to_string(), rating);
    overview.insert("description".to_string(), description);
    Ok(overview)
}

/// The `<li>` items of the value cell next to the label cell containing `label`.
fn labelled_items<'a>(section: ElementRef<'a>, label: &str) -> Vec<ElementRef<'a>> {
    section
        .select(&sel("tr td.text-nowrap"))
        .find(|td| text_of(*td).contains(label))
        .and_then(next_element)
        .map(|cell| cell.select(&sel("ul.commaList li")).collect())
        .unwrap_or_default()
}

/// Drops one enclosing `(` and `)`; inner parentheses stay.
fn strip_parentheses(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix('(').unwrap_or(text);
    text.strip_suffix(')').unwrap_or(text).trim()
}

/// Text of the first child node, i.e. a country name before its flag image.
fn leading_text(li: ElementRef<'_>) -> String {
    let text = li.children().next().and_then(|node| match node.value() {
        Node::Text(text) => Some(text.trim().to_string()),
        Node::Element(_) => ElementRef::wrap(node).map(text_of),
        _ => None,
    });
    text.filter(|t| !t.is_empty()).unwrap_or_else(|| text_of(li))
}

pub fn parse_covers(html: &str, base_url: &str) -> ByConsole<CoverDraft> {
    let document = Html::parse_document(html);
    let mut covers: ByConsole<CoverDraft> = BTreeMap::new();

    for section in document.select(&sel("section")) {
        let Some(header) = section.select(&sel("h2 a")).next() else {
            continue;
        };
        let console = text_of(header);
        let comments = section
            .select(&sel("h2 small"))
            .next()
            .map(text_of)
            .map(|v| strip_parentheses(&v).to_string())
            .unwrap_or_default();

        let packaging = labelled_items(section, "Packaging:")
            .into_iter()
            .map(text_of)
            .collect::<Vec<_>>()
            .join(", ");
        if packaging.contains("Electronic") {
            continue;
        }
        let video_standard = labelled_items(section, "Video Standard:")
            .into_iter()
            .map(text_of)
            .collect::<Vec<_>>()
            .join(", ");

        let cover_links: Vec<String> = section
            .select(&sel("div.img-holder figure a"))
            .filter_map(|a| a.value().attr("href"))
            .map(|href| resolve(base_url, href))
            .collect();

        for li in labelled_items(section, "Country:") {
            covers.entry(console.clone()).or_default().push(CoverDraft {
                entry: CoverEntry {
                    console: console.clone(),
                    country: leading_text(li),
                    packaging: packaging.clone(),
                    comments: comments.clone(),
                    video_standard: video_standard.clone(),
                    cover_images: Vec::new(),
                },
                cover_links: cover_links.clone(),
            });
        }
    }
    covers
}

/// Source of the full-size image on an image page.
pub fn parse_full_size_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let img = document.select(&sel("figure img")).next()?;
    img.value()
        .attr("src")
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}

/// Screenshot page links grouped by console.
pub fn parse_screenshot_links(html: &str, base_url: &str) -> ConsoleScreenshots {
    let document = Html::parse_document(html);
    let mut links = ConsoleScreenshots::new();
    for section in document.select(&sel("div[id^=\"screenshots-platform-\"]")) {
        let Some(header) = first_text(section, &sel("h2")) else {
            continue;
        };
        let console = header
            .strip_suffix("screenshots")
            .map(str::trim_end)
            .unwrap_or(&header)
            .to_string();
        let pages = section
            .select(&sel("div.img-holder figure a"))
            .filter_map(|a| a.value().attr("href"))
            .map(|href| resolve(base_url, href))
            .collect();
        links.insert(console, pages);
    }
    links
}

/// Console name from a header such as `NES +`.
fn console_header(text: &str) -> String {
    text.trim().trim_end_matches('+').trim().to_string()
}

/// Row label to field key: `Business Model:` becomes `business_model`.
fn field_key(label: &str) -> String {
    label.replace(':', "").trim().replace(' ', "_").to_lowercase()
}

pub fn parse_specs(html: &str) -> ConsoleSpecs {
    let document = Html::parse_document(html);
    let mut specs = ConsoleSpecs::new();
    let Some(table) = document.select(&sel("table.table-nowrap")).next() else {
        return specs;
    };

    let header = sel("td h4");
    let cells = sel("td");
    let linked_values = sel("td:nth-child(2) ul.commaList li a");
    let second_cell = sel("td:nth-child(2)");
    let mut current: Option<String> = None;

    for row in table.select(&sel("tbody tr")) {
        if let Some(h4) = row.select(&header).next() {
            let console = console_header(&text_of(h4));
            specs.entry(console.clone()).or_default();
            current = Some(console);
            continue;
        }
        let Some(console) = &current else { continue };
        if row.select(&cells).count() < 2 {
            continue;
        }
        let Some(label) = row.select(&cells).next() else {
            continue;
        };

        let mut values = all_texts(row, &linked_values);
        if values.is_empty() {
            values.extend(first_text(row, &second_cell));
        }
        if !values.is_empty() {
            if let Some(console_specs) = specs.get_mut(console) {
                console_specs.insert(field_key(&text_of(label)), values.join(","));
            }
        }
    }
    specs
}

pub fn parse_ratings(html: &str) -> ConsoleRatings {
    let document = Html::parse_document(html);
    let mut ratings = ConsoleRatings::new();
    let Some(table) = document.select(&sel("table.table-nowrap")).last() else {
        return ratings;
    };

    let header = sel("th h4");
    let cells = sel("td");
    let linked_values = sel("td:nth-child(2) ul.commaList li a");
    let mut current: Option<String> = None;

    for row in table.select(&sel("tbody tr")) {
        if let Some(h4) = row.select(&header).next() {
            let console = console_header(&text_of(h4));
            ratings.entry(console.clone()).or_default();
            current = Some(console);
            continue;
        }
        let Some(console) = &current else { continue };
        if row.select(&cells).count() < 2 {
            continue;
        }
        let Some(label) = row.select(&cells).next() else {
            continue;
        };

        let mut values = all_texts(row, &linked_values);
        let value = match values.len() {
            0 => continue,
            1 => Value::String(values.remove(0)),
            _ => Value::Array(values.into_iter().map(Value::String).collect()),
        };
        if let Some(console_ratings) = ratings.get_mut(console) {
            console_ratings.insert(field_key(&text_of(label)), value);
        }
    }
    ratings
}

/// Applies `key = value` to every group, splitting a group in two when it
/// already holds `key`: one copy keeps the old value, one takes the new.
pub fn expand_repeated(groups: Vec<Fields>, key: &str, value: &str) -> Vec<Fields> {
    let mut expanded = Vec::with_capacity(groups.len());
    for mut group in groups {
        if group.contains_key(key) {
            let mut split = group.clone();
            split.insert(key.to_string(), value.to_string());
            expanded.push(group);
            expanded.push(split);
        } else {
            group.insert(key.to_string(), value.to_string());
            expanded.push(group);
        }
    }
    expanded
}

/// One release table: a date row, common keyed rows, then one or more
/// country blocks whose keyed rows apply to each country in the block.
fn parse_release_table(table: ElementRef<'_>, console: &str) -> Vec<ReleaseEntry> {
    let cells = sel("td");
    let rows: Vec<ElementRef<'_>> = table.select(&sel("tbody tr")).collect();

    let mut common = Fields::new();
    if let Some(date) = rows.first().and_then(|row| row.select(&cells).next()) {
        common.insert(
            "release_date".to_string(),
            text_of(date).replace(" Release", ""),
        );
    }

    let mut groups: Vec<Fields> = Vec::new();
    // Groups from `start` onwards belong to the open country block
    let mut open_block: Option<usize> = None;

    for row in rows.iter().skip(1) {
        let row_cells: Vec<ElementRef<'_>> = row.select(&cells).collect();
        if row_cells.len() != 2 {
            open_block = None;
            continue;
        }
        let key = field_key(&text_of(row_cells[0]));
        let value = text_of(row_cells[1]);

        if key == "countries" {
            let start = groups.len();
            for country in value.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                let mut group = common.clone();
                group.insert("country".to_string(), country.to_string());
                groups.push(group);
            }
            open_block = (groups.len() > start).then_some(start);
        } else if let Some(start) = open_block {
            let block = groups.split_off(start);
            groups.extend(expand_repeated(block, &key, &value));
        } else {
            common.insert(key, value);
        }
    }

    groups
        .into_iter()
        .map(|fields| ReleaseEntry::from_fields(console, fields))
        .collect()
}

/// Release entries grouped by the `h4` console header preceding each table.
pub fn parse_releases(html: &str) -> ByConsole<ReleaseEntry> {
    let document = Html::parse_document(html);
    let mut releases: ByConsole<ReleaseEntry> = BTreeMap::new();
    let Some(main) = document.select(&sel("#main")).next() else {
        return releases;
    };

    let mut console: Option<String> = None;
    for node in main.descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        match element.value().name() {
            "h4" => {
                let name = text_of(element);
                releases.entry(name.clone()).or_default();
                console = Some(name);
            }
            "table" if has_class(element, "releaseTable") => {
                if let Some(name) = &console {
                    let entries = parse_release_table(element, name);
                    releases.entry(name.clone()).or_default().extend(entries);
                }
            }
            _ => {}
        }
    }
    releases
}

/// Fetches detail pages of one game. Every failure, including image
/// transfers, is returned to the caller unchanged.
pub struct DetailScraper<'a> {
    source: &'a dyn PageSource,
    images: &'a dyn ImageStore,
    base_url: String,
}

impl<'a> DetailScraper<'a> {
    pub fn new(source: &'a dyn PageSource, images: &'a dyn ImageStore, base_url: &str) -> Self {
        Self {
            source,
            images,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn overview(&self, url: &str) -> Result<Overview> {
        tracing::debug!("Processing overview");
        let html = self.source.fetch(url).await?;
        parse_overview(&html, url)
    }

    pub async fn releases(&self, url: &str) -> Result<ByConsole<ReleaseEntry>> {
        tracing::debug!("Processing releases");
        let html = self.source.fetch(url).await?;
        Ok(parse_releases(&html))
    }

    /// Specs and ratings live on the same page.
    pub async fn specs_and_ratings(&self, url: &str) -> Result<(ConsoleSpecs, ConsoleRatings)> {
        tracing::debug!("Processing specs and ratings");
        let html = self.source.fetch(url).await?;
        Ok((parse_specs(&html), parse_ratings(&html)))
    }

    pub async fn covers(&self, url: &str) -> Result<ByConsole<CoverEntry>> {
        tracing::debug!("Processing covers");
        let html = self.source.fetch(url).await?;
        let drafts = parse_covers(&html, &self.base_url);

        // Image pages are shared between countries; visit each once
        let mut stored: HashMap<String, String> = HashMap::new();
        let mut covers: ByConsole<CoverEntry> = BTreeMap::new();
        for (console, console_drafts) in drafts {
            let mut entries = Vec::with_capacity(console_drafts.len());
            for draft in console_drafts {
                let mut entry = draft.entry;
                for link in draft.cover_links {
                    if let Some(location) = stored.get(&link) {
                        entry.cover_images.push(location.clone());
                        continue;
                    }
                    if let Some(location) = self.mirror_image(&link, "covers/").await? {
                        stored.insert(link, location.clone());
                        entry.cover_images.push(location);
                    }
                }
                entries.push(entry);
            }
            covers.insert(console, entries);
        }
        Ok(covers)
    }

    pub async fn screenshots(&self, url: &str) -> Result<ConsoleScreenshots> {
        tracing::debug!("Processing screenshots");
        let html = self.source.fetch(url).await?;
        let mut screenshots = ConsoleScreenshots::new();
        for (console, pages) in parse_screenshot_links(&html, &self.base_url) {
            let mut locations = Vec::with_capacity(pages.len());
            for page in pages {
                locations.extend(self.mirror_image(&page, "screenshots/").await?);
            }
            screenshots.insert(console, locations);
        }
        Ok(screenshots)
    }

    /// Visits an image page and hands its full-size image to the store.
    async fn mirror_image(&self, page_url: &str, folder: &str) -> Result<Option<String>> {
        let html = self.source.fetch(page_url).await?;
        let Some(src) = parse_full_size_image(&html) else {
            tracing::debug!("No full-size image on {}", page_url);
            return Ok(None);
        };
        let image_url = resolve(page_url, &src);
        self.images.store(&image_url, folder).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::fake::RecordingStore;
    use crate::source::fake::FakeSite;

    const BASE: &str = "https://www.mobygames.com";

    const OVERVIEW: &str = r#"
        <h1>River Raid</h1>
        <div class="text-sm text-muted">Moby ID: 1234 added by someone</div>
        <div id="infoBlock">
          <div class="info-score"><dl>
            <dt>Critics</dt><dd><span data-tooltip="80 out of 100">80%</span></dd>
            <dt>Players</dt><dd><span data-tooltip="3.9 out of 5">3.9</span></dd>
          </dl></div>
          <div class="info-genres"><dl class="metadata">
            <dt>Genre</dt><dd><a href="/genre/action/">Action</a></dd>
            <dt>Gameplay</dt><dd><a href="/genre/shooter/">Shooter</a>, <a href="/genre/scrolling/">Scrolling</a></dd>
          </dl></div>
        </div>
        <div id="gameOfficialDescription"><summary>Official</summary> Fly up the river.</div>"#;

    #[test]
    fn overview_fields() {
        let overview = parse_overview(OVERVIEW, "u").unwrap();
        assert_eq!(overview["title"], "River Raid");
        assert_eq!(overview["mobyid"], "1234");
        assert_eq!(overview["rating"], "3.9");
        assert_eq!(overview["Genre"], "Action");
        assert_eq!(overview["Gameplay"], "Shooter,Scrolling");
        assert_eq!(overview["description"], "Official Fly up the river.");
    }

    #[test]
    fn overview_prefers_description_text_and_needs_title() {
        let html = r#"<h1>Pong</h1><div id="description-text">Bat and ball.</div>
            <div id="gameOfficialDescription">Other</div>"#;
        let overview = parse_overview(html, "u").unwrap();
        assert_eq!(overview["description"], "Bat and ball.");
        assert_eq!(overview["rating"], "");
        assert!(parse_overview("<p>no title</p>", "u").is_err());
    }

    const COVERS: &str = r#"
        <section>
          <h2><a href="/platform/atari-2600/">Atari 2600</a> <small>(Budget, Reissue)</small></h2>
          <div class="img-holder">
            <figure><a href="/game/1/river-raid/covers/atari-2600/front/">front</a></figure>
            <figure><a href="/game/1/river-raid/covers/atari-2600/back/">back</a></figure>
          </div>
          <table>
            <tr><td class="text-nowrap">Packaging:</td><td><ul class="commaList"><li>Cardboard Box</li></ul></td></tr>
            <tr><td class="text-nowrap">Video Standard:</td><td><ul class="commaList"><li>NTSC</li><li>PAL</li></ul></td></tr>
            <tr><td class="text-nowrap">Country:</td><td><ul class="commaList">
              <li>United States <img src="us.png"></li><li>Canada <img src="ca.png"></li>
            </ul></td></tr>
          </table>
        </section>
        <section>
          <h2><a href="/platform/atari-2600/">Atari 2600</a></h2>
          <table>
            <tr><td class="text-nowrap">Packaging:</td><td><ul class="commaList"><li>Electronic</li></ul></td></tr>
            <tr><td class="text-nowrap">Country:</td><td><ul class="commaList"><li>Worldwide</li></ul></td></tr>
          </table>
        </section>
        <section><h2>No console link</h2></section>"#;

    #[test]
    fn covers_expand_per_country_and_drop_electronic() {
        let covers = parse_covers(COVERS, BASE);
        let drafts = &covers["Atari 2600"];
        assert_eq!(drafts.len(), 2);
        let us = &drafts[0];
        assert_eq!(us.entry.country, "United States");
        assert_eq!(us.entry.comments, "Budget, Reissue");
        assert_eq!(us.entry.packaging, "Cardboard Box");
        assert_eq!(us.entry.video_standard, "NTSC, PAL");
        assert_eq!(
            us.cover_links[0],
            "https://www.mobygames.com/game/1/river-raid/covers/atari-2600/front/"
        );
        assert_eq!(drafts[1].entry.country, "Canada");
    }

    #[test]
    fn variant_keeps_inner_parentheses() {
        assert_eq!(strip_parentheses("(Rev. (A))"), "Rev. (A)");
        assert_eq!(strip_parentheses(" (Budget) "), "Budget");
        assert_eq!(strip_parentheses("Limited"), "Limited");

        let html = r#"<section><h2><a href="/platform/nes/">NES</a> <small>(Rev. (A))</small></h2>
            <table><tr><td class="text-nowrap">Country:</td>
            <td><ul class="commaList"><li>Japan</li></ul></td></tr></table></section>"#;
        assert_eq!(parse_covers(html, BASE)["NES"][0].entry.comments, "Rev. (A)");
    }

    #[tokio::test]
    async fn cover_images_are_visited_once_and_stored() {
        let front = "https://www.mobygames.com/game/1/river-raid/covers/atari-2600/front/";
        let back = "https://www.mobygames.com/game/1/river-raid/covers/atari-2600/back/";
        let covers_url = "https://www.mobygames.com/game/1/river-raid/covers/atari-2600/";
        let site = FakeSite::new()
            .page(covers_url, COVERS)
            .page(front, r#"<figure><img src="https://cdn.mobygames.com/front.jpg"></figure>"#)
            .page(back, r#"<figure><img src="https://cdn.mobygames.com/back.jpg"></figure>"#);
        let store = RecordingStore::default();
        let scraper = DetailScraper::new(&site, &store, BASE);

        let covers = scraper.covers(covers_url).await.unwrap();
        let entries = &covers["Atari 2600"];
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1].cover_images,
            vec!["mirror/covers/front.jpg", "mirror/covers/back.jpg"]
        );
        assert_eq!(site.visit_count(front), 1);
        assert_eq!(store.stored.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_image_transfer_reaches_the_caller() {
        let covers_url = "https://www.mobygames.com/game/1/river-raid/covers/atari-2600/";
        let site = FakeSite::new()
            .page(covers_url, COVERS)
            .page(
                "https://www.mobygames.com/game/1/river-raid/covers/atari-2600/front/",
                r#"<figure><img src="https://cdn.mobygames.com/front.jpg"></figure>"#,
            );
        let store = RecordingStore {
            fail_on: Some("front.jpg".to_string()),
            ..Default::default()
        };
        let scraper = DetailScraper::new(&site, &store, BASE);
        let err = scraper.covers(covers_url).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Upload { .. }));
    }

    #[tokio::test]
    async fn screenshots_by_console() {
        let url = "https://www.mobygames.com/game/1/river-raid/screenshots/atari-2600/";
        let shot = "https://www.mobygames.com/game/1/river-raid/screenshots/atari-2600/1/";
        let html = r#"
            <div id="screenshots-platform-28">
              <h2>Atari 2600 screenshots</h2>
              <div class="img-holder">
                <figure><a href="/game/1/river-raid/screenshots/atari-2600/1/">1</a></figure>
                <figure><a href="/game/1/river-raid/screenshots/atari-2600/2/">2</a></figure>
              </div>
            </div>"#;
        let site = FakeSite::new()
            .page(url, html)
            .page(shot, r#"<figure><img src="/images/shot1.png"></figure>"#)
            .page(
                "https://www.mobygames.com/game/1/river-raid/screenshots/atari-2600/2/",
                "<figure>no image</figure>",
            );
        let store = RecordingStore::default();
        let shots = DetailScraper::new(&site, &store, BASE)
            .screenshots(url)
            .await
            .unwrap();
        assert_eq!(shots["Atari 2600"], vec!["mirror/screenshots/shot1.png"]);
        let stored = store.stored.lock().unwrap();
        assert_eq!(stored[0].0, "https://www.mobygames.com/images/shot1.png");
    }

    const SPECS: &str = r#"
        <table class="table-nowrap"><tbody>
          <tr><td colspan="2"><h4>Atari 2600 +</h4></td></tr>
          <tr><td>Business Model:</td><td><ul class="commaList"><li><a>Commercial</a></li></ul></td></tr>
          <tr><td>Input Devices:</td><td><ul class="commaList"><li><a>Joystick</a></li><li><a>Paddle</a></li></ul></td></tr>
          <tr><td>Players:</td><td>1-2</td></tr>
        </tbody></table>
        <table class="table-nowrap"><tbody>
          <tr><th colspan="2"><h4>Atari 2600</h4></th></tr>
          <tr><td>ESRB Rating:</td><td><ul class="commaList"><li><a>Everyone</a></li></ul></td></tr>
          <tr><td>PEGI Rating:</td><td><ul class="commaList"><li><a>3</a></li><li><a>7</a></li></ul></td></tr>
          <tr><td>Notes:</td><td>plain text is ignored</td></tr>
        </tbody></table>"#;

    #[test]
    fn specs_from_first_table() {
        let specs = parse_specs(SPECS);
        let atari = &specs["Atari 2600"];
        assert_eq!(atari["business_model"], "Commercial");
        assert_eq!(atari["input_devices"], "Joystick,Paddle");
        assert_eq!(atari["players"], "1-2");
    }

    #[test]
    fn ratings_from_last_table() {
        let ratings = parse_ratings(SPECS);
        let atari = &ratings["Atari 2600"];
        assert_eq!(atari["esrb_rating"], Value::String("Everyone".into()));
        assert_eq!(atari["pegi_rating"], serde_json::json!(["3", "7"]));
        assert!(!atari.contains_key("notes"));
    }

    #[test]
    fn no_tables_means_no_specs() {
        assert!(parse_specs("<p>nothing</p>").is_empty());
        assert!(parse_ratings("<p>nothing</p>").is_empty());
    }

    #[test]
    fn repeated_key_splits_groups() {
        let mut us = Fields::new();
        us.insert("country".into(), "USA".into());
        us.insert("published_by".into(), "Activision".into());
        let mut ca = Fields::new();
        ca.insert("country".into(), "Canada".into());

        let expanded = expand_repeated(vec![us, ca], "published_by", "Zellers");
        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[0]["published_by"], "Activision");
        assert_eq!(expanded[1]["published_by"], "Zellers");
        assert_eq!(expanded[1]["country"], "USA");
        assert_eq!(expanded[2]["published_by"], "Zellers");
    }

    const RELEASES: &str = r#"
        <div id="main">
          <h4>Atari 2600</h4>
          <table class="releaseTable"><tbody>
            <tr><td colspan="2">1982 Release</td></tr>
            <tr><td>Developed by:</td><td>Activision</td></tr>
            <tr><td>Countries:</td><td><img src="us.png"> United States, <img src="ca.png"> Canada</td></tr>
            <tr><td>Published by:</td><td>Activision</td></tr>
            <tr><td>Published by:</td><td>Zellers</td></tr>
            <tr><td colspan="2">separator</td></tr>
            <tr><td>Countries:</td><td>Germany</td></tr>
            <tr><td>Comments:</td><td>Reissue, Budget</td></tr>
          </tbody></table>
          <h4>Atari 5200</h4>
          <div><table class="releaseTable"><tbody>
            <tr><td>1983 Release</td></tr>
            <tr><td>Countries:</td><td>United States</td></tr>
          </tbody></table></div>
          <h4>Intellivision</h4>
        </div>"#;

    #[test]
    fn release_tables_expand_by_country_and_repeated_key() {
        let releases = parse_releases(RELEASES);
        let atari = &releases["Atari 2600"];
        assert_eq!(atari.len(), 5);

        let countries: Vec<&str> = atari.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(
            countries,
            vec!["United States", "United States", "Canada", "Canada", "Germany"]
        );
        assert!(atari.iter().all(|r| r.release_date.as_deref() == Some("1982")));
        assert!(atari
            .iter()
            .all(|r| r.extra.get("developed_by").map(String::as_str) == Some("Activision")));
        assert_eq!(atari[0].extra["published_by"], "Activision");
        assert_eq!(atari[1].extra["published_by"], "Zellers");
        assert_eq!(atari[4].comments(), "Reissue, Budget");
        assert!(!atari[4].extra.contains_key("published_by"));

        let a5200 = &releases["Atari 5200"];
        assert_eq!(a5200.len(), 1);
        assert_eq!(a5200[0].console, "Atari 5200");
        assert_eq!(a5200[0].release_date.as_deref(), Some("1983"));
        assert!(releases["Intellivision"].is_empty());
    }
}
