//! Adaptive query partitioning.
//!
//! The site serves a bounded number of pages per query, so a listing whose
//! result count exceeds the ceiling is split into narrower queries: by year,
//! then by genre, then by title initial. Whatever still exceeds the ceiling
//! after the last axis is read once ascending and once descending; items
//! hidden in the middle of such a bucket stay unreachable.

use crate::catalog::{parse_listing, GameQuery, ListingPage};
use crate::checkpoint;
use crate::error::{Result, ScrapeError};
use crate::models::GameListEntry;
use crate::source::PageSource;
use std::collections::HashSet;
use std::path::PathBuf;

/// Buckets of the last-resort axis.
pub const TITLE_INITIALS: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Year,
    Genre,
    Initial,
}

const AXES: [Axis; 3] = [Axis::Year, Axis::Genre, Axis::Initial];

/// Values available for the year and genre axes.
#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub years: Vec<String>,
    pub genres: Vec<String>,
}

/// Items collected so far and the links already seen. Threaded through every
/// partition so a link is emitted at most once.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    items: Vec<GameListEntry>,
    seen: HashSet<String>,
}

impl Harvest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the dedup set from a checkpointed list.
    pub fn resume(items: Vec<GameListEntry>) -> Self {
        let mut harvest = Self::new();
        for item in items {
            harvest.offer(item);
        }
        harvest
    }

    /// Appends `entry` unless its link was already collected.
    pub fn offer(&mut self, entry: GameListEntry) -> bool {
        if self.seen.contains(&entry.link) {
            return false;
        }
        self.seen.insert(entry.link.clone());
        self.items.push(entry);
        true
    }

    pub fn contains(&self, link: &str) -> bool {
        self.seen.contains(link)
    }

    pub fn items(&self) -> &[GameListEntry] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_parts(self) -> (Vec<GameListEntry>, HashSet<String>) {
        (self.items, self.seen)
    }
}

/// Counters of one `fetch_all` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    /// Queries whose result count was read
    pub queries: usize,
    /// Partitions small enough to paginate directly
    pub paginated: usize,
    /// Partitions still over the ceiling after every axis
    pub oversized: usize,
    /// Partitions dropped because their first page failed
    pub skipped: usize,
    pub pages: usize,
    pub added: usize,
}

pub struct Partitioner<'a> {
    source: &'a dyn PageSource,
    base_url: String,
    result_ceiling: usize,
    page_ceiling: usize,
    facets: Facets,
    checkpoint: Option<PathBuf>,
}

impl<'a> Partitioner<'a> {
    pub fn new(source: &'a dyn PageSource, base_url: &str, facets: Facets) -> Self {
        Self {
            source,
            base_url: base_url.trim_end_matches('/').to_string(),
            result_ceiling: 1000,
            page_ceiling: 21,
            facets,
            checkpoint: None,
        }
    }

    pub fn with_ceilings(mut self, result_ceiling: usize, page_ceiling: usize) -> Self {
        self.result_ceiling = result_ceiling;
        self.page_ceiling = page_ceiling;
        self
    }

    /// Rewrites `path` with the whole harvest after every paginated partition.
    pub fn with_checkpoint(mut self, path: PathBuf) -> Self {
        self.checkpoint = Some(path);
        self
    }

    /// Collects every reachable item of `base` into `harvest`, depth-first.
    pub async fn fetch_all(&self, base: GameQuery, harvest: &mut Harvest) -> Result<PartitionReport> {
        self.walk(base, 0, harvest).await
    }

    async fn walk(
        &self,
        base: GameQuery,
        first_axis: usize,
        harvest: &mut Harvest,
    ) -> Result<PartitionReport> {
        let mut report = PartitionReport::default();
        let mut stack = vec![(base, first_axis)];

        while let Some((query, next_axis)) = stack.pop() {
            report.queries += 1;
            let first = match self.first_page(&query).await {
                Ok(page) => page,
                Err(e) if e.is_soft() => {
                    tracing::warn!("Skipping {}: {}", query, e);
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let count = first.result_count.unwrap_or(0);
            if count == 0 {
                tracing::debug!("No results for {}", query);
                continue;
            }

            if count <= self.result_ceiling {
                tracing::info!("{} results for {}", count, query);
                self.paginate(&query, Some(first), harvest, &mut report)
                    .await?;
                report.paginated += 1;
                self.save(harvest)?;
                continue;
            }

            match self.subdivide(&query, next_axis) {
                Some((axis, children)) => {
                    tracing::info!(
                        "{} results for {}, splitting by {:?} into {} partitions",
                        count,
                        query,
                        AXES[axis],
                        children.len()
                    );
                    for child in children.into_iter().rev() {
                        stack.push((child, axis + 1));
                    }
                }
                None => {
                    tracing::warn!(
                        "{} results for {} and no axis left, reading both sort orders",
                        count,
                        query
                    );
                    report.oversized += 1;
                    self.paginate(&query, Some(first), harvest, &mut report)
                        .await?;
                    self.paginate(&query.reversed(), None, harvest, &mut report)
                        .await?;
                    self.save(harvest)?;
                }
            }
        }

        tracing::info!(
            "Collected {} new games ({} total) over {} queries",
            report.added,
            harvest.len(),
            report.queries
        );
        Ok(report)
    }

    async fn first_page(&self, query: &GameQuery) -> Result<ListingPage> {
        let url = query.page_url(&self.base_url, 0);
        let html = self.source.fetch(&url).await?;
        let page = parse_listing(&html, &self.base_url);
        if page.result_count.is_none() {
            return Err(ScrapeError::missing(&url, "result count"));
        }
        Ok(page)
    }

    /// Children of `query` along the first axis at or after `from` that has
    /// values, with the index of that axis.
    fn subdivide(&self, query: &GameQuery, from: usize) -> Option<(usize, Vec<GameQuery>)> {
        (from..AXES.len()).find_map(|index| {
            let children: Vec<GameQuery> = match AXES[index] {
                Axis::Year => self
                    .facets
                    .years
                    .iter()
                    .map(|year| query.with_year(year))
                    .collect(),
                Axis::Genre => self
                    .facets
                    .genres
                    .iter()
                    .map(|genre| query.with_genre(genre))
                    .collect(),
                Axis::Initial => TITLE_INITIALS
                    .chars()
                    .map(|initial| query.with_initial(initial))
                    .collect(),
            };
            (!children.is_empty()).then_some((index, children))
        })
    }

    /// Walks result pages until the next-page link disappears or the page
    /// ceiling is hit. A failing page ends the walk for this partition.
    async fn paginate(
        &self,
        query: &GameQuery,
        first: Option<ListingPage>,
        harvest: &mut Harvest,
        report: &mut PartitionReport,
    ) -> Result<()> {
        let mut pending = first;
        for page in 0..self.page_ceiling {
            let listing = match pending.take() {
                Some(listing) => listing,
                None => {
                    let url = query.page_url(&self.base_url, page);
                    match self.source.fetch(&url).await {
                        Ok(html) => parse_listing(&html, &self.base_url),
                        Err(e) if e.is_soft() => {
                            tracing::warn!("Stopping {} at page {}: {}", query, page, e);
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
            };
            report.pages += 1;
            for entry in listing.entries {
                if harvest.offer(entry) {
                    report.added += 1;
                }
            }
            if !listing.has_next {
                break;
            }
        }
        Ok(())
    }

    fn save(&self, harvest: &Harvest) -> Result<()> {
        if let Some(path) = &self.checkpoint {
            checkpoint::save_json(path, harvest.items())?;
        }
        Ok(())
    }
}
