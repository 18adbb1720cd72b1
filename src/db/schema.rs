//! Catalog tables and their full-text shadows.
//!
//! Each base table has an FTS5 external-content index over `title` and
//! `description`, keyed by the table's `seq` rowid. Triggers mirror every
//! insert, delete and update inside the statement's own transaction; an
//! update retracts the old index entry before inserting the new one, since
//! FTS5 cannot rewrite indexed text in place.

pub const SCHEMA: &str = r#"
-- shows table
CREATE TABLE IF NOT EXISTS shows (
    seq INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    artwork TEXT NOT NULL,
    creator TEXT NOT NULL,
    categories TEXT NOT NULL DEFAULT '[]',
    feed_url TEXT NOT NULL,
    link TEXT NOT NULL,
    added_at TEXT NOT NULL,
    approved INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_shows_added_at ON shows(added_at DESC);
CREATE INDEX IF NOT EXISTS idx_shows_approved ON shows(approved);

-- episodes table
CREATE TABLE IF NOT EXISTS episodes (
    seq INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    show_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    thumbnail TEXT NOT NULL,
    media_url TEXT NOT NULL,
    media_type TEXT NOT NULL,
    published_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_episodes_show_published ON episodes(show_id, published_at DESC);

-- full-text indexes
CREATE VIRTUAL TABLE IF NOT EXISTS shows_fts USING fts5(
    title,
    description,
    content='shows',
    content_rowid='seq'
);

CREATE VIRTUAL TABLE IF NOT EXISTS episodes_fts USING fts5(
    title,
    description,
    content='episodes',
    content_rowid='seq'
);

CREATE TRIGGER IF NOT EXISTS shows_fts_insert AFTER INSERT ON shows BEGIN
    INSERT INTO shows_fts (rowid, title, description) VALUES (new.seq, new.title, new.description);
END;

CREATE TRIGGER IF NOT EXISTS shows_fts_delete AFTER DELETE ON shows BEGIN
    INSERT INTO shows_fts (shows_fts, rowid, title, description) VALUES ('delete', old.seq, old.title, old.description);
END;

CREATE TRIGGER IF NOT EXISTS shows_fts_update AFTER UPDATE ON shows BEGIN
    INSERT INTO shows_fts (shows_fts, rowid, title, description) VALUES ('delete', old.seq, old.title, old.description);
    INSERT INTO shows_fts (rowid, title, description) VALUES (new.seq, new.title, new.description);
END;

CREATE TRIGGER IF NOT EXISTS episodes_fts_insert AFTER INSERT ON episodes BEGIN
    INSERT INTO episodes_fts (rowid, title, description) VALUES (new.seq, new.title, new.description);
END;

CREATE TRIGGER IF NOT EXISTS episodes_fts_delete AFTER DELETE ON episodes BEGIN
    INSERT INTO episodes_fts (episodes_fts, rowid, title, description) VALUES ('delete', old.seq, old.title, old.description);
END;

CREATE TRIGGER IF NOT EXISTS episodes_fts_update AFTER UPDATE ON episodes BEGIN
    INSERT INTO episodes_fts (episodes_fts, rowid, title, description) VALUES ('delete', old.seq, old.title, old.description);
    INSERT INTO episodes_fts (rowid, title, description) VALUES (new.seq, new.title, new.description);
END;
"#;

/// Drops everything [`SCHEMA`] creates.
pub const DROP_SCHEMA: &str = r#"
DROP TRIGGER IF EXISTS shows_fts_insert;
DROP TRIGGER IF EXISTS shows_fts_update;
DROP TRIGGER IF EXISTS shows_fts_delete;
DROP TRIGGER IF EXISTS episodes_fts_insert;
DROP TRIGGER IF EXISTS episodes_fts_update;
DROP TRIGGER IF EXISTS episodes_fts_delete;
DROP TABLE IF EXISTS shows_fts;
DROP TABLE IF EXISTS episodes_fts;
DROP TABLE IF EXISTS shows;
DROP TABLE IF EXISTS episodes;
"#;
