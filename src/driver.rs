use crate::catalog::{fetch_year_facets, GameQuery};
use crate::checkpoint::{load_json_list, save_json};
use crate::config::Config;
use crate::detail::DetailScraper;
use crate::error::Result;
use crate::export::export_records;
use crate::images::ImageStore;
use crate::models::{GameListEntry, Genre, MergedRecord, Platform};
use crate::partition::{Facets, Harvest, PartitionReport, Partitioner};
use crate::reconcile::{enrich, finalize, merge};
use crate::source::PageSource;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::time::Duration;

/// How a scrape pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every selected platform is done
    Exit,
    /// A detail page or image failed; run the pass again
    Restart,
}

/// Ties the catalog, partitioner, detail scrapers and exporter together for
/// the platforms selected on the command line.
pub struct Driver<'a> {
    config: &'a Config,
    source: &'a dyn PageSource,
    images: &'a dyn ImageStore,
}

impl<'a> Driver<'a> {
    pub fn new(config: &'a Config, source: &'a dyn PageSource, images: &'a dyn ImageStore) -> Self {
        Self {
            config,
            source,
            images,
        }
    }

    /// Enumerates every game of `platform` into its game-list file, resuming
    /// from whatever that file already holds.
    pub async fn list_games(&self, platform: &Platform, genres: &[Genre]) -> Result<PartitionReport> {
        let path = self.config.games_list_path(&platform.console_code);
        let known: Vec<GameListEntry> = load_json_list(&path)?;
        if !known.is_empty() {
            tracing::info!(
                "Resuming {} with {} games already listed",
                platform.platform,
                known.len()
            );
        }
        let mut harvest = Harvest::resume(known);

        let facets = Facets {
            years: fetch_year_facets(self.source, self.config, platform).await,
            genres: genres.iter().map(|g| g.code().to_string()).collect(),
        };
        let partitioner = Partitioner::new(self.source, &self.config.base_url, facets)
            .with_ceilings(self.config.result_ceiling, self.config.page_ceiling)
            .with_checkpoint(path.clone());

        let report = partitioner
            .fetch_all(GameQuery::for_platform(&platform.console_code), &mut harvest)
            .await?;
        save_json(&path, harvest.items())?;

        tracing::info!(
            "{}: {} games listed ({} new, {} partitions skipped)",
            platform.platform,
            harvest.len(),
            report.added,
            report.skipped
        );
        Ok(report)
    }

    /// One pass over the selected platforms. Any error ends the pass with
    /// `Restart`; progress already checkpointed is kept.
    pub async fn scrape_platforms(&self, platforms: &[Platform]) -> RunOutcome {
        for platform in platforms {
            if let Err(e) = self.scrape_platform(platform).await {
                tracing::error!("Scraping {} failed: {}", platform.platform, e);
                return RunOutcome::Restart;
            }
        }
        RunOutcome::Exit
    }

    /// Repeats the pass until it completes or `max_restarts` relaunches are
    /// spent, sleeping `delay_between_restarts` seconds in between. Returns
    /// `Restart` only when the budget ran out.
    pub async fn scrape_with_restarts(&self, platforms: &[Platform]) -> RunOutcome {
        let mut restarts = 0;
        loop {
            match self.scrape_platforms(platforms).await {
                RunOutcome::Exit => return RunOutcome::Exit,
                RunOutcome::Restart if restarts < self.config.max_restarts => {
                    restarts += 1;
                    tracing::warn!(
                        "Restarting in {}s ({}/{})",
                        self.config.delay_between_restarts,
                        restarts,
                        self.config.max_restarts
                    );
                    tokio::time::sleep(Duration::from_secs(self.config.delay_between_restarts)).await;
                }
                RunOutcome::Restart => {
                    tracing::error!("Giving up after {} restarts", restarts);
                    return RunOutcome::Restart;
                }
            }
        }
    }

    /// Scrapes every listed game of one platform not already in its data
    /// file, then exports the spreadsheet.
    pub async fn scrape_platform(&self, platform: &Platform) -> Result<()> {
        let safe_name = platform.safe_name();
        let excel_path = self.config.excel_path(&safe_name);
        if excel_path.exists() {
            tracing::info!("{} already exported, skipping", platform.platform);
            return Ok(());
        }

        let list_path = self.config.games_list_path(&platform.console_code);
        if !list_path.exists() {
            tracing::warn!(
                "No game list for {} at {}, run `list {}` first",
                platform.platform,
                list_path.display(),
                platform.console_code
            );
            return Ok(());
        }
        let games: Vec<GameListEntry> = load_json_list(&list_path)?;

        let data_path = self.config.data_path(&safe_name);
        let mut records: Vec<MergedRecord> = load_json_list(&data_path)?;
        let done: HashSet<String> = records
            .iter()
            .filter_map(|r| r.get_str("game_url"))
            .map(str::to_string)
            .collect();

        let progress_bar = ProgressBar::new(games.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} games ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        for game in &games {
            progress_bar.inc(1);
            if done.contains(&game.link) {
                continue;
            }
            progress_bar.set_message(game.game.clone());
            let rows = match self.scrape_game(platform, game).await {
                Ok(rows) => rows,
                Err(e) => {
                    progress_bar.abandon_with_message(format!("failed on {}", game.game));
                    return Err(e);
                }
            };
            records.extend(rows);
            save_json(&data_path, &records)?;
        }
        progress_bar.finish_with_message("done");

        save_json(&data_path, &records)?;
        export_records(&records, &self.config.priority_columns, &excel_path)?;
        tracing::info!("{} scraped successfully", platform.platform);
        Ok(())
    }

    /// Scrapes all detail pages of one game and returns the rows to store.
    pub async fn scrape_game(&self, platform: &Platform, game: &GameListEntry) -> Result<Vec<MergedRecord>> {
        tracing::debug!("Scraping {} ({})", game.game, game.link);
        let code = &platform.console_code;
        let details = DetailScraper::new(self.source, self.images, &self.config.base_url);

        let overview = details.overview(&game.link).await?;
        let releases = details.releases(&game.releases_url(code)).await?;
        let (specs, ratings) = details.specs_and_ratings(&game.specs_url(code)).await?;
        let covers = details.covers(&game.covers_url(code)).await?;

        if covers.values().all(Vec::is_empty) && releases.values().all(Vec::is_empty) {
            tracing::debug!("{} has no covers or releases", game.game);
            return Ok(finalize(Default::default(), &game.link));
        }
        let screenshots = details.screenshots(&game.screenshots_url(code)).await?;

        let mut merged = merge(&covers, &releases);
        enrich(&overview, &screenshots, &ratings, &specs, &mut merged);
        Ok(finalize(merged, &game.link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::KeepSourceUrl;
    use crate::source::fake::FakeSite;

    const BASE: &str = "https://www.mobygames.com";
    const GAME: &str = "https://www.mobygames.com/game/1/pong/";

    fn config(name: &str) -> Config {
        Config {
            work_folder: crate::checkpoint::scratch_dir(name).to_string_lossy().into_owned(),
            ..Config::default()
        }
    }

    fn platform() -> Platform {
        Platform::new("Atari 2600".into(), format!("{}/platform/atari-2600/", BASE), "2".into())
    }

    fn game_site() -> FakeSite {
        FakeSite::new()
            .page(GAME, "<h1>Pong</h1>")
            .page(
                format!("{}releases/atari-2600/", GAME),
                r#"<div id="main"><h4>Atari 2600</h4>
                   <table class="releaseTable"><tbody>
                     <tr><td>1977 Release</td></tr>
                     <tr><td>Countries:</td><td>United States</td></tr>
                   </tbody></table></div>"#,
            )
            .page(format!("{}specs/atari-2600/", GAME), "<p>no specs</p>")
            .page(format!("{}covers/atari-2600/", GAME), "<p>no covers</p>")
            .page(format!("{}screenshots/atari-2600/", GAME), "<p>none</p>")
    }

    #[tokio::test]
    async fn game_without_covers_keeps_its_releases() {
        let config = config("driver-game");
        let site = game_site();
        let driver = Driver::new(&config, &site, &KeepSourceUrl);
        let game = GameListEntry::new("Pong".into(), GAME.into());

        let rows = driver.scrape_game(&platform(), &game).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("title"), Some("Pong"));
        assert_eq!(rows[0].get_str("country"), Some("United States"));
        assert_eq!(rows[0].get_str("release_date"), Some("1977"));
        assert_eq!(rows[0].get_str("game_url"), Some(GAME));
    }

    #[tokio::test]
    async fn failing_page_restarts_and_resume_skips_done_games() {
        let config = config("driver-resume");
        let platform = platform();
        let missing = "https://www.mobygames.com/game/2/combat/";
        let games = vec![
            GameListEntry::new("Pong".into(), GAME.into()),
            GameListEntry::new("Combat".into(), missing.into()),
        ];
        save_json(&config.games_list_path(&platform.console_code), &games).unwrap();

        let site = game_site();
        let driver = Driver::new(&config, &site, &KeepSourceUrl);
        let outcome = driver.scrape_platforms(std::slice::from_ref(&platform)).await;
        assert_eq!(outcome, RunOutcome::Restart);

        let data_path = config.data_path(&platform.safe_name());
        let saved: Vec<MergedRecord> = load_json_list(&data_path).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!config.excel_path(&platform.safe_name()).exists());

        // Pong is not fetched again on the next pass
        let site = game_site()
            .page(missing, "<h1>Combat</h1>")
            .page(format!("{}releases/atari-2600/", missing), "<p>none</p>")
            .page(format!("{}specs/atari-2600/", missing), "<p>none</p>")
            .page(format!("{}covers/atari-2600/", missing), "<p>none</p>");
        let driver = Driver::new(&config, &site, &KeepSourceUrl);
        let outcome = driver.scrape_platforms(std::slice::from_ref(&platform)).await;
        assert_eq!(outcome, RunOutcome::Exit);
        assert_eq!(site.visit_count(GAME), 0);

        let saved: Vec<MergedRecord> = load_json_list(&data_path).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].len(), 1);
        assert!(config.excel_path(&platform.safe_name()).exists());
    }

    #[tokio::test]
    async fn listing_resumes_from_game_list_file() {
        let config = Config {
            result_ceiling: 10,
            ..config("driver-list")
        };
        let platform = platform();
        let known = vec![GameListEntry::new("Pong".into(), GAME.into())];
        save_json(&config.games_list_path("atari-2600"), &known).unwrap();

        let query = GameQuery::for_platform("atari-2600");
        let site = FakeSite::new().page(
            query.page_url(BASE, 0),
            format!(
                r#"<p class="no-select text-muted">2 results</p>
                   <table><tbody>
                     <tr><td><a href="{}">Pong</a></td></tr>
                     <tr><td><a href="/game/2/combat/">Combat</a></td></tr>
                   </tbody></table>"#,
                GAME
            ),
        );
        let driver = Driver::new(&config, &site, &KeepSourceUrl);
        let report = driver.list_games(&platform, &[]).await.unwrap();
        assert_eq!(report.added, 1);

        let listed: Vec<GameListEntry> = load_json_list(&config.games_list_path("atari-2600")).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].game, "Combat");
    }

    #[tokio::test]
    async fn restart_budget_runs_out() {
        let config = Config {
            max_restarts: 2,
            delay_between_restarts: 0,
            ..config("driver-budget")
        };
        let platform = platform();
        let games = vec![GameListEntry::new("Pong".into(), GAME.into())];
        save_json(&config.games_list_path(&platform.console_code), &games).unwrap();

        let site = FakeSite::new();
        let driver = Driver::new(&config, &site, &KeepSourceUrl);
        let outcome = driver.scrape_with_restarts(std::slice::from_ref(&platform)).await;
        assert_eq!(outcome, RunOutcome::Restart);
        assert_eq!(site.visit_count(GAME), 3);
    }

    #[tokio::test]
    async fn completed_pass_needs_no_restart() {
        let config = Config {
            delay_between_restarts: 0,
            ..config("driver-restart-ok")
        };
        let platform = platform();
        let games = vec![GameListEntry::new("Pong".into(), GAME.into())];
        save_json(&config.games_list_path(&platform.console_code), &games).unwrap();

        let site = game_site();
        let driver = Driver::new(&config, &site, &KeepSourceUrl);
        let outcome = driver.scrape_with_restarts(std::slice::from_ref(&platform)).await;
        assert_eq!(outcome, RunOutcome::Exit);
        assert_eq!(site.visit_count(GAME), 1);
    }
}
