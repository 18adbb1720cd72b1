use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One podcast feed in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: String,
    pub title: String,
    /// Sanitized HTML.
    pub description: String,
    pub artwork: String,
    pub creator: String,
    pub categories: Vec<String>,
    pub feed_url: String,
    pub link: String,
    pub added_at: DateTime<Utc>,
    pub approved: bool,
}
