//! Reconciliation of cover and release records, and enrichment of the merged
//! records with the rest of a game's detail pages.

use crate::detail::{ConsoleRatings, ConsoleScreenshots, ConsoleSpecs, Overview};
use crate::models::{ByConsole, CoverEntry, MergedRecord, ReleaseEntry};
use std::collections::HashSet;

/// Comment fragments that mark a digital-only release.
const DIGITAL_MARKERS: [&str; 4] = ["virtual release", "online", "download", "eshop"];

/// Punctuation becomes spaces, whitespace runs collapse, then lowercase.
pub fn normalize_text(text: &str) -> String {
    let spaced: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Same words in any order.
pub fn unordered_match(a: &str, b: &str) -> bool {
    let mut left: Vec<&str> = a.split_whitespace().collect();
    let mut right: Vec<&str> = b.split_whitespace().collect();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}

fn comments_match(cover: &str, release: &str) -> bool {
    let cover = normalize_text(cover);
    let release = normalize_text(release);
    cover == release || unordered_match(&cover, &release)
}

/// Merges each cover entry with every release of the same console and
/// country whose comment matches. Matched releases are consumed; unmatched
/// covers and unconsumed releases pass through on their own.
pub fn merge(
    covers: &ByConsole<CoverEntry>,
    releases: &ByConsole<ReleaseEntry>,
) -> ByConsole<MergedRecord> {
    let mut merged: ByConsole<MergedRecord> = ByConsole::new();
    let mut consumed: HashSet<(&str, usize)> = HashSet::new();

    for (console, cover_entries) in covers {
        let records = merged.entry(console.clone()).or_default();
        let release_entries = releases.get(console).map(Vec::as_slice).unwrap_or(&[]);

        for cover in cover_entries {
            let mut matched = false;
            for (index, release) in release_entries.iter().enumerate() {
                if release.country != cover.country
                    || !comments_match(&cover.comments, release.comments())
                {
                    continue;
                }
                let mut record = MergedRecord::from_cover(cover);
                record.overlay_release(release);
                record.set("console", console.as_str());
                records.push(record);
                consumed.insert((console.as_str(), index));
                matched = true;
            }
            if !matched {
                let mut record = MergedRecord::from_cover(cover);
                record.set("console", console.as_str());
                records.push(record);
            }
        }
    }

    for (console, release_entries) in releases {
        for (index, release) in release_entries.iter().enumerate() {
            if consumed.contains(&(console.as_str(), index)) {
                continue;
            }
            let mut record = MergedRecord::from_release(release);
            record.set("console", console.as_str());
            merged.entry(console.clone()).or_default().push(record);
        }
    }

    tracing::debug!("Covers and releases merged");
    merged
}

/// Copies game-wide and per-console details into every merged record.
pub fn enrich(
    overview: &Overview,
    screenshots: &ConsoleScreenshots,
    ratings: &ConsoleRatings,
    specs: &ConsoleSpecs,
    merged: &mut ByConsole<MergedRecord>,
) {
    for (console, records) in merged.iter_mut() {
        let console_specs = specs
            .get(console)
            .map(|s| {
                s.iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .unwrap_or_default();

        for record in records.iter_mut() {
            for (key, value) in overview {
                record.set(key, value.as_str());
            }
            record.set_list(
                "screenshots",
                screenshots.get(console).cloned().unwrap_or_default(),
            );
            if let Some(console_ratings) = ratings.get(console) {
                for (key, value) in console_ratings {
                    record.set(key, value.clone());
                }
            }
            record.set("specs", console_specs.as_str());
        }
    }
}

/// True for releases that only exist as downloads or online services.
pub fn is_digital(record: &MergedRecord) -> bool {
    let comments = record.get_str("comments").unwrap_or("").to_lowercase();
    DIGITAL_MARKERS.iter().any(|marker| comments.contains(marker))
}

/// Flattens merged records into the rows stored for one game: digital
/// releases are dropped and every row carries `game_url`. A game without a
/// physical release is kept as a bare marker so later runs skip it.
pub fn finalize(merged: ByConsole<MergedRecord>, game_url: &str) -> Vec<MergedRecord> {
    let mut rows: Vec<MergedRecord> = merged
        .into_values()
        .flatten()
        .filter(|record| !is_digital(record))
        .map(|mut record| {
            record.set("game_url", game_url);
            record
        })
        .collect();
    if rows.is_empty() {
        rows.push(MergedRecord::stub(game_url));
    }
    rows
}
