use std::collections::HashMap;
use std::sync::Mutex;

use podcast_catalog::db::Repository;
use podcast_catalog::feed::FeedSource;
use podcast_catalog::models::{Enclosure, ParsedFeed, ParsedItem};
use podcast_catalog::{App, Config, Result};

pub const SHOW_URL: &str = "https://example.com/show/rss";

/// Feed source backed by a map that tests edit between runs.
#[derive(Default)]
pub struct MemorySource {
    feeds: Mutex<HashMap<String, ParsedFeed>>,
}

impl MemorySource {
    pub fn publish(&self, url: &str, feed: ParsedFeed) {
        self.feeds.lock().unwrap().insert(url.to_string(), feed);
    }
}

impl FeedSource for MemorySource {
    async fn fetch(&self, url: &str) -> Result<Option<ParsedFeed>> {
        Ok(self.feeds.lock().unwrap().get(url).cloned())
    }
}

pub async fn app() -> App<MemorySource> {
    let repository = Repository::open_in_memory().await.unwrap();
    App::with_source(&Config::default(), repository, MemorySource::default())
}

pub fn item(title: &str) -> ParsedItem {
    ParsedItem {
        guid: Some(format!("urn:{title}")),
        title: title.to_string(),
        description: format!("<p>Notes for {title}</p>"),
        image: None,
        published: Some("Wed, 15 Sep 2021 00:00:00 -0400".to_string()),
        enclosures: vec![Enclosure {
            url: format!("https://cdn.example.com/{}.mp3", title.replace(' ', "-")),
            mime_type: "audio/mpeg".to_string(),
        }],
    }
}

pub fn feed(title: &str, items: &[&str]) -> ParsedFeed {
    ParsedFeed {
        title: title.to_string(),
        description: format!("<p>All about {title}</p>"),
        image: Some("https://example.com/art.png".to_string()),
        author: Some("Example Network".to_string()),
        categories: vec!["Technology".to_string()],
        link: "https://example.com/show".to_string(),
        items: items.iter().map(|t| item(t)).collect(),
    }
}
