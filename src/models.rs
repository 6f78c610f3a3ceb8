use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A platform row from the site's platform catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Display name, e.g. "Atari 2600"
    pub platform: String,
    /// Link to the platform's game listing
    pub link: String,
    /// Game count as printed on the catalog page
    pub games: String,
    /// Short code used in query filters, e.g. "atari-2600"
    pub console_code: String,
}

impl Platform {
    pub fn new(platform: String, link: String, games: String) -> Self {
        let console_code = last_segment(&link)
            .trim_start_matches("platform:")
            .to_string();
        Self {
            platform,
            link,
            games,
            console_code,
        }
    }

    /// Platform name usable as a file stem.
    pub fn safe_name(&self) -> String {
        self.platform
            .chars()
            .filter(|c| !matches!(c, '/' | '\\' | '?' | '*' | ':'))
            .collect()
    }
}

/// A genre row from the site's genre catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub genre_name: String,
    pub genre_link: String,
}

impl Genre {
    /// Code used in the `genre:` query filter.
    pub fn code(&self) -> &str {
        last_segment(&self.genre_link)
    }
}

/// One game found while enumerating a console's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameListEntry {
    /// Game title as listed
    pub game: String,
    /// Absolute link to the game's overview page; unique per console
    pub link: String,
    /// Last path segment of the link
    pub game_code: String,
}

impl GameListEntry {
    pub fn new(game: String, link: String) -> Self {
        let game_code = last_segment(&link).to_string();
        Self {
            game,
            link,
            game_code,
        }
    }

    fn detail_url(&self, section: &str, console_code: &str) -> String {
        format!(
            "{}/{}/{}/",
            self.link.trim_end_matches('/'),
            section,
            console_code
        )
    }

    pub fn releases_url(&self, console_code: &str) -> String {
        self.detail_url("releases", console_code)
    }

    /// Specs and ratings share one page.
    pub fn specs_url(&self, console_code: &str) -> String {
        self.detail_url("specs", console_code)
    }

    pub fn covers_url(&self, console_code: &str) -> String {
        self.detail_url("covers", console_code)
    }

    pub fn screenshots_url(&self, console_code: &str) -> String {
        self.detail_url("screenshots", console_code)
    }
}

/// Packaging variant of a game for one console and country.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverEntry {
    pub console: String,
    pub country: String,
    pub packaging: String,
    /// Variant descriptor shown next to the console header
    pub comments: String,
    pub video_standard: String,
    pub cover_images: Vec<String>,
}

/// Release of a game for one console and country.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub console: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    /// Publisher, developer, product codes and whatever else the table lists
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ReleaseEntry {
    /// Builds an entry from the keyed fields of one release-table country group.
    pub fn from_fields(console: &str, mut fields: BTreeMap<String, String>) -> Self {
        Self {
            console: console.to_string(),
            country: fields.remove("country").unwrap_or_default(),
            release_date: fields.remove("release_date"),
            comments: fields.remove("comments"),
            extra: fields,
        }
    }

    pub fn comments(&self) -> &str {
        self.comments.as_deref().unwrap_or("")
    }
}

/// Flat record written to the per-console data file: string keys to strings
/// or lists of strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedRecord(pub Map<String, Value>);

impl MergedRecord {
    pub fn from_cover(cover: &CoverEntry) -> Self {
        let mut record = MergedRecord::default();
        record.set("console", cover.console.as_str());
        record.set("country", cover.country.as_str());
        record.set("packaging", cover.packaging.as_str());
        record.set("comments", cover.comments.as_str());
        record.set("video_standard", cover.video_standard.as_str());
        record.set_list("cover_images", cover.cover_images.iter().cloned());
        record
    }

    pub fn from_release(release: &ReleaseEntry) -> Self {
        let mut record = MergedRecord::default();
        record.overlay_release(release);
        record
    }

    /// Release fields win over fields already present.
    pub fn overlay_release(&mut self, release: &ReleaseEntry) {
        self.set("console", release.console.as_str());
        self.set("country", release.country.as_str());
        if let Some(date) = &release.release_date {
            self.set("release_date", date.as_str());
        }
        if let Some(comments) = &release.comments {
            self.set("comments", comments.as_str());
        }
        for (key, value) in &release.extra {
            self.set(key, value.as_str());
        }
    }

    /// Marker stored for a game that produced no physical releases.
    pub fn stub(game_url: &str) -> Self {
        let mut record = MergedRecord::default();
        record.set("game_url", game_url);
        record
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn set_list(&mut self, key: &str, values: impl IntoIterator<Item = String>) {
        let list = values.into_iter().map(Value::String).collect();
        self.0.insert(key.to_string(), Value::Array(list));
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Records grouped by console name.
pub type ByConsole<T> = BTreeMap<String, Vec<T>>;

fn last_segment(link: &str) -> &str {
    link.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}
