use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Coarse failure classes reported across the catalog boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransientNetwork,
    MalformedFeed,
    Storage,
    NotFound,
    Config,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetching {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("Feed at {0} returned no data")]
    EmptyFeed(String),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("No playable content in item {title:?}")]
    NoPlayableContent { title: String },

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("OPML error: {0}")]
    Opml(#[from] opml::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Http(_) | AppError::Timeout { .. } | AppError::HttpStatus { .. } => {
                ErrorKind::TransientNetwork
            }
            AppError::FeedParse(_)
            | AppError::EmptyFeed(_)
            | AppError::InvalidUrl(_)
            | AppError::NoPlayableContent { .. } => ErrorKind::MalformedFeed,
            AppError::Database(_) | AppError::Json(_) => ErrorKind::Storage,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Config(_) | AppError::Toml(_) | AppError::Opml(_) => ErrorKind::Config,
            AppError::Io(_) | AppError::Other(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_failure_class() {
        let timeout = AppError::Timeout {
            url: "https://example.com/rss".into(),
            timeout: Duration::from_secs(8),
        };
        assert_eq!(timeout.kind(), ErrorKind::TransientNetwork);

        let missing = AppError::NoPlayableContent {
            title: "Pilot".into(),
        };
        assert_eq!(missing.kind(), ErrorKind::MalformedFeed);
        assert_eq!(missing.to_string(), "No playable content in item \"Pilot\"");

        let lookup = AppError::not_found("show", "abc");
        assert_eq!(lookup.kind(), ErrorKind::NotFound);
        assert_eq!(lookup.to_string(), "show abc not found");
    }
}
