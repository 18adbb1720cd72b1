mod episode;
mod feed;
mod show;

pub use episode::Episode;
pub use feed::{Enclosure, ParsedFeed, ParsedItem};
pub use show::Show;
