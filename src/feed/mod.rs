mod fetcher;
mod normalizer;
mod opml;

pub use fetcher::{parse_feed, FeedSource, HttpFeedSource};
pub use normalizer::{parse_pub_date, HtmlSanitizer, Normalizer};
pub use self::opml::{parse_opml, parse_opml_file};
