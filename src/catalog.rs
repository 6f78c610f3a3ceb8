use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::html::{resolve, sel, text_of};
use crate::models::{GameListEntry, Genre, Platform};
use crate::source::PageSource;
use scraper::{ElementRef, Html};
use std::fmt;

/// A filtered, sorted game listing on the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameQuery {
    pub platform: String,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub initial: Option<char>,
    pub descending: bool,
}

impl GameQuery {
    pub fn for_platform(console_code: &str) -> Self {
        Self {
            platform: console_code.to_string(),
            year: None,
            genre: None,
            initial: None,
            descending: false,
        }
    }

    pub fn with_year(&self, year: &str) -> Self {
        Self {
            year: Some(year.to_string()),
            ..self.clone()
        }
    }

    pub fn with_genre(&self, genre: &str) -> Self {
        Self {
            genre: Some(genre.to_string()),
            ..self.clone()
        }
    }

    pub fn with_initial(&self, initial: char) -> Self {
        Self {
            initial: Some(initial),
            ..self.clone()
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            descending: !self.descending,
            ..self.clone()
        }
    }

    /// URL of one result page. Filter segments are in the site's canonical
    /// (alphabetical) order.
    pub fn page_url(&self, base_url: &str, page: usize) -> String {
        let mut url = format!("{}/game/", base_url.trim_end_matches('/'));
        if let Some(year) = &self.year {
            url.push_str(&format!("from:{}/", year));
        }
        if let Some(genre) = &self.genre {
            url.push_str(&format!("genre:{}/", genre));
        }
        url.push_str(&format!("platform:{}/", self.platform));
        if let Some(initial) = self.initial {
            url.push_str(&format!("title:{}/", initial));
        }
        if let Some(year) = &self.year {
            url.push_str(&format!("until:{}/", year));
        }
        url.push_str(if self.descending {
            "sort:-title/"
        } else {
            "sort:title/"
        });
        url.push_str(&format!("page:{}/", page));
        url
    }
}

impl fmt::Display for GameQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform {}", self.platform)?;
        if let Some(year) = &self.year {
            write!(f, ", year {}", year)?;
        }
        if let Some(genre) = &self.genre {
            write!(f, ", genre {}", genre)?;
        }
        if let Some(initial) = self.initial {
            write!(f, ", title {}", initial)?;
        }
        if self.descending {
            write!(f, " (descending)")?;
        }
        Ok(())
    }
}

/// One page of a game listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub entries: Vec<GameListEntry>,
    pub has_next: bool,
    /// Total reported above the table, when the page shows one
    pub result_count: Option<usize>,
}

pub fn parse_listing(html: &str, base_url: &str) -> ListingPage {
    let document = Html::parse_document(html);
    let row_selector = sel("tbody tr");
    let link_selector = sel("td a");
    let anchor_selector = sel("a");
    let count_selector = sel("p.no-select.text-muted");

    let entries = document
        .select(&row_selector)
        .filter_map(|row| row.select(&link_selector).next())
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(GameListEntry::new(text_of(a), resolve(base_url, href)))
        })
        .collect();

    // Game titles can contain "Next" too
    let has_next = document
        .select(&anchor_selector)
        .filter(|a| !inside_table_body(*a))
        .any(|a| text_of(a).contains("Next"));

    let result_count = document
        .select(&count_selector)
        .find_map(|p| parse_result_count(&text_of(p)));

    ListingPage {
        entries,
        has_next,
        result_count,
    }
}

fn inside_table_body(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().name() == "tbody")
}

/// Reads "1,234 results" or "1 result" (possibly with leading words).
fn parse_result_count(text: &str) -> Option<usize> {
    let (before, _) = text.split_once("result")?;
    before
        .split_whitespace()
        .last()?
        .replace(',', "")
        .parse()
        .ok()
}

/// Distinct release years linked from a console's catalog page, in page order.
pub fn parse_year_facets(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut years: Vec<String> = Vec::new();
    for a in document.select(&sel("a[href*='year']")) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Some((_, rest)) = href.split_once("year:") else {
            continue;
        };
        let year = rest.split('/').next().unwrap_or("").trim();
        if !year.is_empty() && !years.iter().any(|y| y == year) {
            years.push(year.to_string());
        }
    }
    years
}

pub fn parse_platforms(html: &str, base_url: &str) -> Vec<Platform> {
    let document = Html::parse_document(html);
    let row_selector = sel("tbody tr");
    let link_selector = sel("td a");
    let cell_selector = sel("td");

    document
        .select(&row_selector)
        .filter_map(|row| {
            let a = row.select(&link_selector).next()?;
            let href = a.value().attr("href")?;
            let games = row
                .select(&cell_selector)
                .nth(1)
                .map(text_of)
                .unwrap_or_else(|| "0".to_string());
            Some(Platform::new(text_of(a), resolve(base_url, href), games))
        })
        .collect()
}

pub fn parse_genres(html: &str, base_url: &str) -> Vec<Genre> {
    let document = Html::parse_document(html);
    document
        .select(&sel("section ul li a"))
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(Genre {
                genre_name: text_of(a),
                genre_link: resolve(base_url, href),
            })
        })
        .collect()
}

/// Enumerates every platform the site lists.
pub async fn fetch_platforms(source: &dyn PageSource, config: &Config) -> Result<Vec<Platform>> {
    let url = config.site_url("/platform/");
    let html = source.fetch(&url).await?;
    let platforms = parse_platforms(&html, &config.base_url);
    if platforms.is_empty() {
        return Err(ScrapeError::missing(&url, "platform table"));
    }
    tracing::info!("Found {} platforms", platforms.len());
    Ok(platforms)
}

/// Enumerates every genre the site lists.
pub async fn fetch_genres(source: &dyn PageSource, config: &Config) -> Result<Vec<Genre>> {
    let url = config.site_url("/genre/");
    let html = source.fetch(&url).await?;
    let genres = parse_genres(&html, &config.base_url);
    if genres.is_empty() {
        return Err(ScrapeError::missing(&url, "genre list"));
    }
    tracing::info!("Found {} genres", genres.len());
    Ok(genres)
}

/// Years offered as filters on a console's catalog page. A page that cannot
/// be fetched yields no years.
pub async fn fetch_year_facets(
    source: &dyn PageSource,
    config: &Config,
    platform: &Platform,
) -> Vec<String> {
    let url = config.site_url(&platform.link);
    match source.fetch(&url).await {
        Ok(html) => parse_year_facets(&html),
        Err(e) => {
            tracing::warn!("No year facets for {}: {}", platform.platform, e);
            Vec::new()
        }
    }
}
