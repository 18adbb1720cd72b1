use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::config::{Config, EpisodeIdentity};
use crate::error::{AppError, Result};
use crate::identity;
use crate::models::{Episode, ParsedFeed, ParsedItem, Show};

/// Allowlist HTML cleaner: paragraphs and links with `href` only.
pub struct HtmlSanitizer {
    builder: ammonia::Builder<'static>,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        let mut builder = ammonia::Builder::default();
        builder
            .tags(HashSet::from(["p", "a"]))
            .tag_attributes(HashMap::from([("a", HashSet::from(["href"]))]))
            .generic_attributes(HashSet::new())
            // Remove `rel` attributes from `<a>` tags
            .link_rel(None);
        Self { builder }
    }

    pub fn sanitize(&self, raw: &str) -> String {
        self.builder.clean(raw.trim()).to_string()
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps parsed feed records onto catalog rows.
pub struct Normalizer {
    sanitizer: HtmlSanitizer,
    default_artwork: String,
    unknown_author: String,
    identity: EpisodeIdentity,
}

impl Normalizer {
    pub fn new(config: &Config) -> Self {
        Self {
            sanitizer: HtmlSanitizer::new(),
            default_artwork: config.default_artwork.clone(),
            unknown_author: config.unknown_author.clone(),
            identity: config.episode_identity,
        }
    }

    /// Candidate show for a feed seen for the first time. New shows start unapproved.
    pub fn show(&self, feed: &ParsedFeed, feed_url: &str) -> Show {
        Show {
            id: identity::show_id(feed_url),
            title: feed.title.clone(),
            description: self.sanitizer.sanitize(&feed.description),
            artwork: feed
                .image
                .clone()
                .unwrap_or_else(|| self.default_artwork.clone()),
            creator: feed
                .author
                .clone()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| self.unknown_author.clone()),
            categories: feed.categories.clone(),
            feed_url: feed_url.to_string(),
            link: feed.link.clone(),
            added_at: Utc::now(),
            approved: false,
        }
    }

    pub fn episode_id(&self, feed_url: &str, item: &ParsedItem) -> String {
        match (self.identity, item.guid.as_deref()) {
            (EpisodeIdentity::Guid, Some(guid)) if !guid.is_empty() => {
                identity::episode_id_from_guid(feed_url, guid)
            }
            _ => identity::episode_id(feed_url, &item.title),
        }
    }

    /// Candidate episode for `item`. An item without an enclosure has nothing
    /// to play and is rejected.
    pub fn episode(&self, feed: &ParsedFeed, item: &ParsedItem, feed_url: &str) -> Result<Episode> {
        let published_at = match item.published.as_deref().and_then(parse_pub_date) {
            Some(dt) => dt,
            None => {
                tracing::debug!(
                    "Unparseable publish date {:?} on {:?}, using now",
                    item.published,
                    item.title
                );
                Utc::now()
            }
        };

        let enclosure = item
            .enclosures
            .first()
            .ok_or_else(|| AppError::NoPlayableContent {
                title: item.title.clone(),
            })?;

        let thumbnail = item
            .image
            .clone()
            .or_else(|| feed.image.clone())
            .unwrap_or_else(|| self.default_artwork.clone());

        Ok(Episode {
            id: self.episode_id(feed_url, item),
            show_id: identity::show_id(feed_url),
            title: item.title.clone(),
            description: self.sanitizer.sanitize(&item.description),
            thumbnail,
            media_url: enclosure.url.clone(),
            media_type: enclosure.mime_type.clone(),
            published_at,
        })
    }
}

fn month_from_abbrev(s: &str) -> Option<u32> {
    let month = match s {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Zone offset in seconds east of UTC. Accepts `±HHMM`, `±HH:MM` and `±HH`;
/// anything unrecognised counts as UTC.
fn zone_offset(zone: &str) -> i32 {
    let hours = match zone {
        "GMT" | "UT" | "UTC" | "Z" => 0,
        "EST" => -5,
        "EDT" | "AST" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => return numeric_offset(zone).unwrap_or(0),
    };
    hours * 3600
}

fn numeric_offset(zone: &str) -> Option<i32> {
    let (sign, rest) = match zone.as_bytes().first() {
        Some(b'+') => (1, &zone[1..]),
        Some(b'-') => (-1, &zone[1..]),
        _ => return None,
    };
    let digits = rest.replacen(':', "", 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hh, mm) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hh > 23 || mm > 59 {
        return None;
    }
    Some(sign * (hh * 3600 + mm * 60))
}

/// Parse an RFC-822 style date: `Wed, 15 Sep 2021 00:00:00 -0400`.
///
/// Returns `None` for anything malformed; callers substitute the current time.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let mut parts: Vec<&str> = raw.split_whitespace().collect();

    // Day of week is optional
    if parts
        .first()
        .is_some_and(|p| p.trim_end_matches(',').chars().all(|c| c.is_ascii_alphabetic()))
    {
        parts.remove(0);
    }

    let [day, month, year, clock, rest @ ..] = parts.as_slice() else {
        return None;
    };

    let day: u32 = day.parse().ok()?;
    let month = month_from_abbrev(month)?;
    let year: i32 = year.parse().ok()?;
    // Stored timestamps are RFC 3339, which has four-digit years only
    if !(0..=9999).contains(&year) {
        return None;
    }

    let mut hms = clock.split(':');
    let hour: u32 = hms.next()?.parse().ok()?;
    let minute: u32 = hms.next()?.parse().ok()?;
    let second: u32 = hms.next()?.parse().ok()?;
    if hms.next().is_some() {
        return None;
    }

    let offset = rest.first().map_or(0, |zone| zone_offset(zone));

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let dt = FixedOffset::east_opt(offset)?
        .from_local_datetime(&naive)
        .single()?;
    Some(dt.with_timezone(&Utc))
}
