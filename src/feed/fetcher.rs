use std::future::Future;
use std::time::Duration;

use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{Enclosure, ParsedFeed, ParsedItem};

/// Something that turns a feed URL into structured feed data.
///
/// `Ok(None)` means the source answered but had nothing to parse.
pub trait FeedSource: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Option<ParsedFeed>>> + Send;
}

/// Fetches feeds over HTTP and parses RSS/Atom with `feed-rs`.
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Option<ParsedFeed>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        tracing::debug!("Fetched {} bytes from {}", bytes.len(), url);
        parse_feed(&bytes)
    }
}

/// Parse a raw RSS/Atom document into a [`ParsedFeed`].
pub fn parse_feed(bytes: &[u8]) -> Result<Option<ParsedFeed>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let feed = parser::parse(bytes)?;
    Ok(Some(parsed_from_feed(feed)))
}

fn parsed_from_feed(feed: Feed) -> ParsedFeed {
    let link = feed
        .links
        .iter()
        .find(|l| l.rel.as_deref() != Some("self"))
        .or_else(|| feed.links.first())
        .map(|l| l.href.clone())
        .unwrap_or_default();

    ParsedFeed {
        title: feed.title.map(|t| t.content).unwrap_or_default(),
        description: feed.description.map(|d| d.content).unwrap_or_default(),
        image: feed.logo.or(feed.icon).map(|i| i.uri),
        author: feed.authors.into_iter().next().map(|p| p.name),
        categories: feed.categories.into_iter().map(|c| c.term).collect(),
        link,
        items: feed.entries.into_iter().map(parsed_from_entry).collect(),
    }
}

fn parsed_from_entry(entry: Entry) -> ParsedItem {
    let enclosures = entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(|c| {
            let url = c.url.as_ref()?;
            Some(Enclosure {
                url: url.to_string(),
                mime_type: c
                    .content_type
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_default(),
            })
        })
        .collect();

    let image = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .next();

    // Try summary first, then fall back to content
    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();

    ParsedItem {
        guid: Some(entry.id).filter(|id| !id.is_empty()),
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        description,
        image,
        published: entry.published.or(entry.updated).map(|dt| dt.to_rfc2822()),
        enclosures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Show</title>
    <link>https://example.com/show</link>
    <description>A show about &lt;b&gt;examples&lt;/b&gt;</description>
    <category>Technology</category>
    <category>News</category>
    <image>
      <url>https://example.com/art.png</url>
      <title>Example Show</title>
      <link>https://example.com/show</link>
    </image>
    <item>
      <title>Pilot</title>
      <guid>ep-1</guid>
      <description>First one</description>
      <pubDate>Wed, 15 Sep 2021 00:00:00 -0400</pubDate>
      <enclosure url="https://example.com/pilot.mp3" length="1024" type="audio/mpeg"/>
    </item>
    <item>
      <title>Trailer</title>
      <description>No audio here</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn maps_channel_and_items() {
        let feed = parse_feed(SAMPLE.as_bytes()).unwrap().unwrap();

        assert_eq!(feed.title, "Example Show");
        assert_eq!(feed.link, "https://example.com/show");
        assert_eq!(feed.categories, vec!["Technology", "News"]);
        assert_eq!(feed.image.as_deref(), Some("https://example.com/art.png"));
        assert_eq!(feed.items.len(), 2);

        let pilot = &feed.items[0];
        assert_eq!(pilot.title, "Pilot");
        assert_eq!(pilot.guid.as_deref(), Some("ep-1"));
        assert_eq!(
            pilot.enclosures,
            vec![Enclosure {
                url: "https://example.com/pilot.mp3".into(),
                mime_type: "audio/mpeg".into(),
            }]
        );
        assert_eq!(
            pilot.published.as_deref(),
            Some("Wed, 15 Sep 2021 04:00:00 +0000")
        );

        assert!(feed.items[1].enclosures.is_empty());
    }

    #[test]
    fn blank_body_is_absent() {
        assert!(parse_feed(b"  \n").unwrap().is_none());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_feed(b"this is not xml").unwrap_err();
        assert!(matches!(err, AppError::FeedParse(_)));
    }
}
