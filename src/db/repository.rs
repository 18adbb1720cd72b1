use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Episode, Show};

use super::schema::{DROP_SCHEMA, SCHEMA};

const SHOW_COLUMNS: &str = "s.id, s.title, s.description, s.artwork, s.creator, s.categories, \
                            s.feed_url, s.link, s.added_at, s.approved";

const EPISODE_COLUMNS: &str = "e.id, e.show_id, e.title, e.description, e.thumbnail, \
                               e.media_url, e.media_type, e.published_at";

/// Durable store for shows and episodes with their full-text indexes.
///
/// Every mutation runs in its own transaction; the index triggers fire
/// inside it, so a base row and its index entry commit or roll back together.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        tracing::debug!("Opened catalog at {}", db_path);
        Ok(Self { conn })
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Drop and recreate every table, index and trigger.
    pub async fn reset(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                tx.execute_batch(DROP_SCHEMA)?;
                tx.execute_batch(SCHEMA)?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        tracing::warn!("Catalog reset");
        Ok(())
    }

    // Show operations

    pub async fn show_exists(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let exists = conn
                    .query_row("SELECT 1 FROM shows WHERE id = ?1", params![id], |_| Ok(()))
                    .optional()?
                    .is_some();
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    pub async fn insert_show(&self, show: Show) -> Result<()> {
        let categories = serde_json::to_string(&show.categories)?;
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    r#"INSERT INTO shows (id, title, description, artwork, creator, categories, feed_url, link, added_at, approved)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
                    params![
                        show.id,
                        show.title,
                        show.description,
                        show.artwork,
                        show.creator,
                        categories,
                        show.feed_url,
                        show.link,
                        format_datetime(&show.added_at),
                        show.approved,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Rewrite a show's metadata. Identity, feed URL and first-seen time are kept.
    pub async fn update_show(&self, show: Show) -> Result<()> {
        let categories = serde_json::to_string(&show.categories)?;
        let id = show.id.clone();
        let changed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let changed = tx.execute(
                    r#"UPDATE shows SET title = ?2, description = ?3, artwork = ?4, creator = ?5,
                           categories = ?6, link = ?7, approved = ?8
                       WHERE id = ?1"#,
                    params![
                        show.id,
                        show.title,
                        show.description,
                        show.artwork,
                        show.creator,
                        categories,
                        show.link,
                        show.approved,
                    ],
                )?;
                tx.commit()?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(AppError::not_found("show", id));
        }
        Ok(())
    }

    pub async fn approve_show(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        let key = id.clone();
        let changed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let changed =
                    tx.execute("UPDATE shows SET approved = 1 WHERE id = ?1", params![key])?;
                tx.commit()?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(AppError::not_found("show", id));
        }
        Ok(())
    }

    /// Delete a show together with its episodes.
    pub async fn delete_show(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        let key = id.clone();
        let (shows, episodes) = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let episodes =
                    tx.execute("DELETE FROM episodes WHERE show_id = ?1", params![key])?;
                let shows = tx.execute("DELETE FROM shows WHERE id = ?1", params![key])?;
                tx.commit()?;
                Ok((shows, episodes))
            })
            .await?;

        if shows == 0 {
            return Err(AppError::not_found("show", id));
        }
        tracing::info!("Deleted show {} and {} episodes", id, episodes);
        Ok(())
    }

    pub async fn get_show(&self, id: &str) -> Result<Option<Show>> {
        let id = id.to_string();
        let show = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {SHOW_COLUMNS} FROM shows s WHERE s.id = ?1"))?;
                let show = stmt.query_row(params![id], show_from_row).optional()?;
                Ok(show)
            })
            .await?;
        Ok(show)
    }

    /// Most recently added shows first.
    pub async fn list_shows(&self, limit: usize, include_unapproved: bool) -> Result<Vec<Show>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let shows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {SHOW_COLUMNS} FROM shows s
                       WHERE ?1 OR s.approved = 1
                       ORDER BY s.added_at DESC, s.seq DESC
                       LIMIT ?2"#
                ))?;
                let shows = stmt
                    .query_map(params![include_unapproved, limit], show_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(shows)
            })
            .await?;
        Ok(shows)
    }

    pub async fn list_approved_shows(&self) -> Result<Vec<Show>> {
        let shows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SHOW_COLUMNS} FROM shows s WHERE s.approved = 1 ORDER BY s.seq"
                ))?;
                let shows = stmt
                    .query_map([], show_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(shows)
            })
            .await?;
        Ok(shows)
    }

    /// Approved shows matching `query`, best match first.
    pub async fn search_shows(&self, query: &str) -> Result<Vec<Show>> {
        let Some(expr) = fts_query(query) else {
            return Ok(Vec::new());
        };
        let shows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {SHOW_COLUMNS}
                       FROM shows_fts
                       JOIN shows s ON s.seq = shows_fts.rowid
                       WHERE shows_fts MATCH ?1 AND s.approved = 1
                       ORDER BY bm25(shows_fts, 10.0, 1.0)"#
                ))?;
                let shows = stmt
                    .query_map(params![expr], show_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(shows)
            })
            .await?;
        Ok(shows)
    }

    pub async fn count_shows(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM shows").await
    }

    // Episode operations

    pub async fn insert_episode(&self, episode: Episode) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    r#"INSERT INTO episodes (id, show_id, title, description, thumbnail, media_url, media_type, published_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                    params![
                        episode.id,
                        episode.show_id,
                        episode.title,
                        episode.description,
                        episode.thumbnail,
                        episode.media_url,
                        episode.media_type,
                        format_datetime(&episode.published_at),
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_episode(&self, id: &str) -> Result<Option<Episode>> {
        let id = id.to_string();
        let episode = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {EPISODE_COLUMNS} FROM episodes e WHERE e.id = ?1"
                ))?;
                let episode = stmt.query_row(params![id], episode_from_row).optional()?;
                Ok(episode)
            })
            .await?;
        Ok(episode)
    }

    /// Episodes of a show, newest publish date first.
    pub async fn list_episodes(&self, show_id: &str) -> Result<Vec<Episode>> {
        let show_id = show_id.to_string();
        let episodes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {EPISODE_COLUMNS} FROM episodes e
                       WHERE e.show_id = ?1
                       ORDER BY e.published_at DESC, e.seq DESC"#
                ))?;
                let episodes = stmt
                    .query_map(params![show_id], episode_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(episodes)
            })
            .await?;
        Ok(episodes)
    }

    /// Identifiers of every stored episode of a show.
    pub async fn episode_ids(&self, show_id: &str) -> Result<HashSet<String>> {
        let show_id = show_id.to_string();
        let ids = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT id FROM episodes WHERE show_id = ?1")?;
                let ids = stmt
                    .query_map(params![show_id], |row| row.get(0))?
                    .collect::<std::result::Result<HashSet<String>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Episodes matching `query`, best match first, optionally limited to one show.
    pub async fn search_episodes(&self, show_id: Option<&str>, query: &str) -> Result<Vec<Episode>> {
        let Some(expr) = fts_query(query) else {
            return Ok(Vec::new());
        };
        let show_id = show_id.map(str::to_string);
        let episodes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {EPISODE_COLUMNS}
                       FROM episodes_fts
                       JOIN episodes e ON e.seq = episodes_fts.rowid
                       WHERE episodes_fts MATCH ?1 AND (?2 IS NULL OR e.show_id = ?2)
                       ORDER BY bm25(episodes_fts, 10.0, 1.0)"#
                ))?;
                let episodes = stmt
                    .query_map(params![expr, show_id], episode_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(episodes)
            })
            .await?;
        Ok(episodes)
    }

    pub async fn count_episodes(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM episodes").await
    }

    /// Verify both full-text indexes against their base tables.
    pub async fn check_index_integrity(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute(
                    "INSERT INTO shows_fts (shows_fts, rank) VALUES ('integrity-check', 1)",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO episodes_fts (episodes_fts, rank) VALUES ('integrity-check', 1)",
                    [],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn count(&self, sql: &'static str) -> Result<usize> {
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

/// Turn free text into an FTS5 expression: every word is quoted and
/// prefix-matched, words are ANDed. `None` when nothing searchable remains.
fn fts_query(raw: &str) -> Option<String> {
    let terms: Vec<String> = raw
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\"*"))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // SQLite datetime format (e.g., "2026-01-11 12:34:56")
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn show_from_row(row: &Row) -> rusqlite::Result<Show> {
    let categories: String = row.get(5)?;
    let categories = serde_json::from_str(&categories)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Show {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        artwork: row.get(3)?,
        creator: row.get(4)?,
        categories,
        feed_url: row.get(6)?,
        link: row.get(7)?,
        added_at: parse_datetime(8, &row.get::<_, String>(8)?)?,
        approved: row.get(9)?,
    })
}

fn episode_from_row(row: &Row) -> rusqlite::Result<Episode> {
    Ok(Episode {
        id: row.get(0)?,
        show_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        thumbnail: row.get(4)?,
        media_url: row.get(5)?,
        media_type: row.get(6)?,
        published_at: parse_datetime(7, &row.get::<_, String>(7)?)?,
    })
}
