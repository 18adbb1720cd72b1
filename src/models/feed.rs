#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub author: Option<String>,
    pub categories: Vec<String>,
    pub link: String,
    pub items: Vec<ParsedItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    pub guid: Option<String>,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    /// Raw publish date, e.g. `Wed, 15 Sep 2021 00:00:00 -0400`.
    pub published: Option<String>,
    pub enclosures: Vec<Enclosure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
}
