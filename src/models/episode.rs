use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub show_id: String,
    pub title: String,
    /// Sanitized HTML.
    pub description: String,
    pub thumbnail: String,
    pub media_url: String,
    pub media_type: String,
    pub published_at: DateTime<Utc>,
}
