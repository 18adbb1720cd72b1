use std::path::Path;

use ::opml::{Outline, OPML};

use crate::error::Result;

/// Collect every feed URL in an OPML subscription list, nested outlines included.
pub fn parse_opml_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    parse_opml(&content)
}

pub fn parse_opml(content: &str) -> Result<Vec<String>> {
    let document = OPML::from_str(content)?;
    let mut urls = Vec::new();
    collect_feed_urls(&document.body.outlines, &mut urls);
    Ok(urls)
}

fn collect_feed_urls(outlines: &[Outline], urls: &mut Vec<String>) {
    for outline in outlines {
        if let Some(url) = outline.xml_url.as_deref().map(str::trim) {
            if !url.is_empty() && !urls.iter().any(|u| u == url) {
                urls.push(url.to_string());
            }
        }
        collect_feed_urls(&outline.outlines, urls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_outlines() {
        let doc = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>Subscriptions</title></head>
  <body>
    <outline text="Tech">
      <outline text="Show A" type="rss" xmlUrl="https://a.example.com/rss"/>
      <outline text="Show B" type="rss" xmlUrl="https://b.example.com/rss"/>
    </outline>
    <outline text="Show A again" type="rss" xmlUrl="https://a.example.com/rss"/>
    <outline text="Show C" type="rss" xmlUrl="https://c.example.com/rss"/>
  </body>
</opml>"#;

        let urls = parse_opml(doc).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://a.example.com/rss",
                "https://b.example.com/rss",
                "https://c.example.com/rss",
            ]
        );
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.opml");
        std::fs::write(
            &path,
            r#"<opml version="2.0"><head/><body><outline text="X" xmlUrl="https://x.example.com/rss"/></body></opml>"#,
        )
        .unwrap();

        assert_eq!(parse_opml_file(&path).unwrap(), vec!["https://x.example.com/rss"]);
    }
}
