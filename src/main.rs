use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mobygames_scraper::{
    catalog::{fetch_genres, fetch_platforms},
    checkpoint::{load_json_list, save_json},
    config::Config,
    driver::{Driver, RunOutcome},
    export::export_file,
    images::{ImageStore, KeepSourceUrl, LocalMirror},
    models::{Genre, Platform},
    source::HttpSource,
    utils::setup_folders,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mobygames-scraper", version, about = "Scrapes game releases from MobyGames")]
struct Cli {
    /// Path to config.ini; by default the current folder, then the user config folder
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save the platform catalog to platforms.json
    Platforms,
    /// Save the genre catalog to genres.json
    Genres,
    /// List every game of the given consoles (all platforms when empty)
    List { console_codes: Vec<String> },
    /// Scrape game details of the given consoles and export them
    Scrape { console_codes: Vec<String> },
    /// Export a data file as a spreadsheet
    Export { input: PathBuf, output: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_create()?.0,
    };

    // Setup working folders
    setup_folders(&config)?;

    match cli.command {
        Command::Platforms => {
            let source = HttpSource::new(&config)?;
            let platforms = fetch_platforms(&source, &config).await?;
            save_json(&config.platforms_path(), &platforms)?;
            println!("{} platforms saved to {}", platforms.len(), config.platforms_path().display());
        }
        Command::Genres => {
            let source = HttpSource::new(&config)?;
            let genres = fetch_genres(&source, &config).await?;
            save_json(&config.genres_path(), &genres)?;
            println!("{} genres saved to {}", genres.len(), config.genres_path().display());
        }
        Command::List { console_codes } => {
            let source = HttpSource::new(&config)?;
            let platforms = select_platforms(&config, &console_codes)?;
            let genres = load_genres(&config, &source).await?;
            let driver = Driver::new(&config, &source, &KeepSourceUrl);
            for platform in &platforms {
                tracing::info!("Listing games for {}", platform.platform);
                driver.list_games(platform, &genres).await?;
            }
        }
        Command::Scrape { console_codes } => {
            let source = HttpSource::new(&config)?;
            let platforms = select_platforms(&config, &console_codes)?;
            let images: Box<dyn ImageStore> = match config.image_folder_path() {
                Some(root) => Box::new(LocalMirror::new(source.client().clone(), root)),
                None => Box::new(KeepSourceUrl),
            };
            let driver = Driver::new(&config, &source, images.as_ref());
            if driver.scrape_with_restarts(&platforms).await == RunOutcome::Restart {
                anyhow::bail!("Scraping did not complete after {} restarts", config.max_restarts);
            }
        }
        Command::Export { input, output } => {
            let rows = export_file(&input, &output, &config.priority_columns)?;
            println!("{} rows exported to {}", rows, output.display());
        }
    }

    Ok(())
}

/// Platforms from platforms.json matching `console_codes`; all of them when empty.
fn select_platforms(config: &Config, console_codes: &[String]) -> Result<Vec<Platform>> {
    let path = config.platforms_path();
    let platforms: Vec<Platform> = load_json_list(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if platforms.is_empty() {
        anyhow::bail!("No platforms in {}, run `platforms` first", path.display());
    }
    if console_codes.is_empty() {
        return Ok(platforms);
    }

    let mut selected = Vec::with_capacity(console_codes.len());
    for code in console_codes {
        match platforms.iter().find(|p| &p.console_code == code) {
            Some(platform) => selected.push(platform.clone()),
            None => tracing::warn!("Unknown console code {}", code),
        }
    }
    if selected.is_empty() {
        anyhow::bail!("None of the given console codes is in {}", path.display());
    }
    Ok(selected)
}

/// Genres from genres.json, fetched and saved first when the file is missing.
async fn load_genres(config: &Config, source: &HttpSource) -> Result<Vec<Genre>> {
    let path = config.genres_path();
    let genres: Vec<Genre> = load_json_list(&path)?;
    if !genres.is_empty() {
        return Ok(genres);
    }
    let genres = fetch_genres(source, config).await?;
    save_json(&path, &genres)?;
    Ok(genres)
}
