use thiserror::Error;

/// Errors raised while fetching and parsing pages or persisting results.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{what} not found on {url}")]
    MissingElement { url: String, what: &'static str },

    #[error("image transfer for {url} failed: {reason}")]
    Upload { url: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet export failed: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),
}

impl ScrapeError {
    /// Missing pages and missing markup are treated as "no results" by the
    /// catalog walkers; everything else must reach the caller.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            ScrapeError::Navigation { .. }
                | ScrapeError::Status { .. }
                | ScrapeError::MissingElement { .. }
        )
    }

    pub fn missing(url: &str, what: &'static str) -> Self {
        ScrapeError::MissingElement {
            url: url.to_string(),
            what,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
