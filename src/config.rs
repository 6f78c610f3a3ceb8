use anyhow::Result;
use configparser::ini::Ini;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "https://www.mobygames.com";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_PRIORITY_COLUMNS: &str =
    "console,title,comments,mobyid,country,Genre,rating,description,published_by,developed_by";

const DEFAULT_CONFIG: &str = r#"[url]
BASE_URL = https://www.mobygames.com

[http]
USER_AGENT = Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36
SESSION_COOKIE =
TIMEOUT_REQUEST = 120

[partition]
RESULT_CEILING = 1000
PAGE_CEILING = 21

[run]
MAX_RESTARTS = 20
DELAY_BETWEEN_RESTARTS = 10

[folder]
WORK_FOLDER = .
IMAGE_FOLDER =

[export]
PRIORITY_COLUMNS = console,title,comments,mobyid,country,Genre,rating,description,published_by,developed_by
"#;

/// Configuration for the scraper, loaded from config.ini.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site root, without a trailing slash
    pub base_url: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Value of the `remember-www` session cookie (optional)
    pub session_cookie: Option<String>,
    /// Timeout for a single page request (seconds)
    pub timeout_request: u64,
    /// Largest result count paginated without subdividing
    pub result_ceiling: usize,
    /// Largest number of pages the site serves per query
    pub page_ceiling: usize,
    /// How many times a failed scrape pass is relaunched
    pub max_restarts: u32,
    /// Delay between relaunches (seconds)
    pub delay_between_restarts: u64,
    /// Folder holding catalog files, game lists, data and spreadsheets
    pub work_folder: String,
    /// Folder mirroring cover and screenshot images; empty keeps source URLs
    pub image_folder: Option<String>,
    /// Columns placed first in exported spreadsheets
    pub priority_columns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            session_cookie: None,
            timeout_request: 120,
            result_ceiling: 1000,
            page_ceiling: 21,
            max_restarts: 20,
            delay_between_restarts: 10,
            work_folder: ".".to_string(),
            image_folder: None,
            priority_columns: split_list(DEFAULT_PRIORITY_COLUMNS),
        }
    }
}

impl Config {
    /// Loads configuration from the given path (expands tilde if present).
    pub fn load(path: &str) -> Result<Self> {
        let mut ini = Ini::new();
        ini.load(Self::expand_tilde(path))
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        Self::from_ini(&ini)
    }

    /// Parses configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self> {
        let mut ini = Ini::new();
        ini.read(text.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self> {
        let defaults = Config::default();
        let uint = |section: &str, key: &str, fallback: u64| -> u64 {
            ini.getuint(section, key).unwrap_or(None).unwrap_or(fallback)
        };
        let non_empty = |section: &str, key: &str| -> Option<String> {
            ini.get(section, key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let base_url = non_empty("url", "BASE_URL")
            .unwrap_or(defaults.base_url)
            .trim_end_matches('/')
            .to_string();
        let user_agent = non_empty("http", "USER_AGENT").unwrap_or(defaults.user_agent);
        let session_cookie = non_empty("http", "SESSION_COOKIE");
        let timeout_request = uint("http", "TIMEOUT_REQUEST", defaults.timeout_request);

        let result_ceiling =
            uint("partition", "RESULT_CEILING", defaults.result_ceiling as u64) as usize;
        let page_ceiling = uint("partition", "PAGE_CEILING", defaults.page_ceiling as u64) as usize;

        let max_restarts = uint("run", "MAX_RESTARTS", defaults.max_restarts as u64) as u32;
        let delay_between_restarts = uint(
            "run",
            "DELAY_BETWEEN_RESTARTS",
            defaults.delay_between_restarts,
        );

        let work_folder = non_empty("folder", "WORK_FOLDER").unwrap_or(defaults.work_folder);
        let image_folder = non_empty("folder", "IMAGE_FOLDER");

        let priority_columns = non_empty("export", "PRIORITY_COLUMNS")
            .map(|s| split_list(&s))
            .unwrap_or(defaults.priority_columns);

        let config = Config {
            base_url,
            user_agent,
            session_cookie,
            timeout_request,
            result_ceiling,
            page_ceiling,
            max_restarts,
            delay_between_restarts,
            work_folder,
            image_folder,
            priority_columns,
        };

        // Validate configuration
        if config.timeout_request == 0 {
            anyhow::bail!("TIMEOUT_REQUEST must be greater than 0");
        }
        if config.result_ceiling == 0 {
            anyhow::bail!("RESULT_CEILING must be greater than 0");
        }
        if config.page_ceiling == 0 {
            anyhow::bail!("PAGE_CEILING must be greater than 0");
        }

        Ok(config)
    }

    /// Loads configuration from the recommended locations, or creates a default config if not found.
    pub fn load_or_create() -> Result<(Self, PathBuf)> {
        use std::fs;

        let mut candidates = vec![PathBuf::from("config.ini")];
        if let Some(dir) = Self::user_config_dir() {
            candidates.push(dir.join("config.ini"));
        }

        for path in &candidates {
            if path.exists() {
                match Self::load(&path.to_string_lossy()) {
                    Ok(cfg) => return Ok((cfg, path.clone())),
                    Err(e) => tracing::warn!("Failed to load config from {}: {}", path.display(), e),
                }
            }
        }

        let default_path = Self::user_config_dir()
            .map(|dir| dir.join("config.ini"))
            .unwrap_or_else(|| PathBuf::from("config.ini"));

        if let Some(parent) = default_path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        fs::write(&default_path, DEFAULT_CONFIG).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create default config at {}: {}",
                default_path.display(),
                e
            )
        })?;
        tracing::info!(
            "No config.ini found. Created a default config at {}. Please edit it as needed.",
            default_path.display()
        );

        let cfg = Self::load(&default_path.to_string_lossy())?;
        Ok((cfg, default_path))
    }

    fn user_config_dir() -> Option<PathBuf> {
        #[cfg(windows)]
        let root = std::env::var_os("APPDATA").map(PathBuf::from);
        #[cfg(not(windows))]
        let root = std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"));
        root.map(|r| r.join("mobygames-scraper"))
    }

    /// Expands a path that starts with ~ to the user's home directory.
    fn expand_tilde(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            #[cfg(windows)]
            let home = std::env::var_os("USERPROFILE");
            #[cfg(not(windows))]
            let home = std::env::var_os("HOME");
            if let Some(home) = home {
                return PathBuf::from(home).join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn work_path(&self) -> PathBuf {
        Self::expand_tilde(&self.work_folder)
    }

    pub fn platforms_path(&self) -> PathBuf {
        self.work_path().join("platforms.json")
    }

    pub fn genres_path(&self) -> PathBuf {
        self.work_path().join("genres.json")
    }

    pub fn games_list_folder(&self) -> PathBuf {
        self.work_path().join("games_list")
    }

    /// Checkpoint file of a console's game list.
    pub fn games_list_path(&self, console_code: &str) -> PathBuf {
        self.games_list_folder().join(format!("{}.json", console_code))
    }

    pub fn data_folder(&self) -> PathBuf {
        self.work_path().join("data")
    }

    /// Checkpoint file of a platform's scraped records.
    pub fn data_path(&self, safe_platform_name: &str) -> PathBuf {
        self.data_folder().join(format!("{}.json", safe_platform_name))
    }

    pub fn excel_folder(&self) -> PathBuf {
        self.work_path().join("excels")
    }

    pub fn excel_path(&self, safe_platform_name: &str) -> PathBuf {
        self.excel_folder().join(format!("{}.xlsx", safe_platform_name))
    }

    pub fn image_folder_path(&self) -> Option<PathBuf> {
        self.image_folder.as_deref().map(Self::expand_tilde)
    }

    /// Absolute URL for a site path such as `/genre/`.
    pub fn site_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_parses_to_defaults() {
        let cfg = Config::from_ini_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(cfg.base_url, "https://www.mobygames.com");
        assert_eq!(cfg.result_ceiling, 1000);
        assert_eq!(cfg.page_ceiling, 21);
        assert_eq!(cfg.session_cookie, None);
        assert_eq!(cfg.image_folder, None);
        assert_eq!(cfg.priority_columns[0], "console");
        assert_eq!(cfg.priority_columns.len(), 10);
    }

    #[test]
    fn overrides_and_trailing_slash() {
        let cfg = Config::from_ini_str(
            "[url]\nBASE_URL = http://localhost:8080/\n[partition]\nRESULT_CEILING = 50\n[folder]\nIMAGE_FOLDER = /tmp/img\n",
        )
        .unwrap();
        assert_eq!(cfg.base_url, "http://localhost:8080");
        assert_eq!(cfg.result_ceiling, 50);
        assert_eq!(cfg.image_folder.as_deref(), Some("/tmp/img"));
        assert_eq!(cfg.site_url("/genre/"), "http://localhost:8080/genre/");
        assert_eq!(cfg.site_url("https://a.b/c"), "https://a.b/c");
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        assert!(Config::from_ini_str("[partition]\nPAGE_CEILING = 0\n").is_err());
    }
}
