use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use url::Url;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::{FeedSource, Normalizer};
use crate::identity;

/// Outcome of a successful ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub show_id: String,
    pub show_created: bool,
    pub new_episodes: usize,
}

/// One async mutex per show, so two runs for the same feed never interleave
/// their exists-check and insert steps. Runs for different shows do not contend.
#[derive(Default)]
pub struct ShowLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ShowLocks {
    pub async fn acquire(&self, show_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Forget locks nobody holds or waits on
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(show_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

pub struct Ingestor<S> {
    repository: Repository,
    source: S,
    normalizer: Normalizer,
    fetch_timeout: Duration,
    locks: ShowLocks,
}

impl<S: FeedSource> Ingestor<S> {
    pub fn new(repository: Repository, source: S, normalizer: Normalizer, fetch_timeout: Duration) -> Self {
        Self {
            repository,
            source,
            normalizer,
            fetch_timeout,
            locks: ShowLocks::default(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Bring the catalog up to date with the feed at `feed_url`.
    ///
    /// Episodes stored before a failing item stay stored; the run still
    /// reports the failure.
    pub async fn ingest(&self, feed_url: &str) -> Result<IngestReport> {
        Url::parse(feed_url)?;

        let feed = match tokio::time::timeout(self.fetch_timeout, self.source.fetch(feed_url)).await {
            Ok(fetched) => fetched?.ok_or_else(|| AppError::EmptyFeed(feed_url.to_string()))?,
            Err(_) => {
                return Err(AppError::Timeout {
                    url: feed_url.to_string(),
                    timeout: self.fetch_timeout,
                })
            }
        };

        let show_id = identity::show_id(feed_url);
        let _guard = self.locks.acquire(&show_id).await;

        let show_created = if self.repository.show_exists(&show_id).await? {
            false
        } else {
            let show = self.normalizer.show(&feed, feed_url);
            tracing::info!("New show {:?} ({}) from {}", show.title, show_id, feed_url);
            self.repository.insert_show(show).await?;
            true
        };

        let mut known = self.repository.episode_ids(&show_id).await?;
        let mut new_episodes = 0;

        for item in &feed.items {
            let episode_id = self.normalizer.episode_id(feed_url, item);
            if known.contains(&episode_id) {
                continue;
            }

            let episode = match self.normalizer.episode(&feed, item, feed_url) {
                Ok(episode) => episode,
                Err(e) => {
                    tracing::warn!(
                        "Stopping {} after {} new episodes: {}",
                        feed_url,
                        new_episodes,
                        e
                    );
                    return Err(e);
                }
            };

            tracing::debug!("Inserting episode {:?}", episode.title);
            self.repository.insert_episode(episode).await?;
            known.insert(episode_id);
            new_episodes += 1;
        }

        tracing::info!(
            "Ingested {}: {} new episodes{}",
            feed_url,
            new_episodes,
            if show_created { " (new show)" } else { "" }
        );

        Ok(IngestReport {
            show_id,
            show_created,
            new_episodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::models::{Enclosure, ParsedFeed, ParsedItem};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const URL: &str = "https://example.com/show/rss";

    fn item(title: &str) -> ParsedItem {
        ParsedItem {
            title: title.into(),
            published: Some("Wed, 15 Sep 2021 00:00:00 +0000".into()),
            enclosures: vec![Enclosure {
                url: format!("https://cdn.example.com/{title}.mp3"),
                mime_type: "audio/mpeg".into(),
            }],
            ..Default::default()
        }
    }

    /// Returns the same feed for every URL, optionally after a delay.
    struct FixedSource {
        feed: Option<ParsedFeed>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(feed: Option<ParsedFeed>) -> Self {
            Self {
                feed,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FeedSource for FixedSource {
        async fn fetch(&self, _url: &str) -> Result<Option<ParsedFeed>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.feed.clone())
        }
    }

    async fn ingestor(source: FixedSource, timeout: Duration) -> Ingestor<FixedSource> {
        let repository = Repository::open_in_memory().await.unwrap();
        let normalizer = Normalizer::new(&Config::default());
        Ingestor::new(repository, source, normalizer, timeout)
    }

    fn feed(titles: &[&str]) -> ParsedFeed {
        ParsedFeed {
            title: "Example Show".into(),
            items: titles.iter().map(|t| item(t)).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn slow_fetch_times_out_without_writing() {
        let mut source = FixedSource::new(Some(feed(&["Pilot"])));
        source.delay = Duration::from_secs(5);
        let ingestor = ingestor(source, Duration::from_millis(50)).await;

        let err = ingestor.ingest(URL).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout { .. }));
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);
        assert_eq!(ingestor.repository.count_shows().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn absent_feed_aborts_run() {
        let ingestor = ingestor(FixedSource::new(None), Duration::from_secs(1)).await;

        let err = ingestor.ingest(URL).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyFeed(_)));
        assert_eq!(ingestor.repository.count_shows().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_fetching() {
        let ingestor = ingestor(FixedSource::new(Some(feed(&[]))), Duration::from_secs(1)).await;

        let err = ingestor.ingest("not a url").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidUrl(_)));
        assert_eq!(ingestor.source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_titles_within_a_feed_insert_once() {
        let ingestor = ingestor(
            FixedSource::new(Some(feed(&["Pilot", "Pilot", "Episode 2"]))),
            Duration::from_secs(1),
        )
        .await;

        let report = ingestor.ingest(URL).await.unwrap();
        assert_eq!(report.new_episodes, 2);
        assert_eq!(ingestor.repository.count_episodes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn concurrent_runs_for_one_show_do_not_duplicate() {
        let ingestor = Arc::new(
            ingestor(
                FixedSource::new(Some(feed(&["Pilot", "Episode 2", "Episode 3"]))),
                Duration::from_secs(1),
            )
            .await,
        );

        let runs: Vec<_> = (0..4)
            .map(|_| {
                let ingestor = Arc::clone(&ingestor);
                tokio::spawn(async move { ingestor.ingest(URL).await })
            })
            .collect();

        let mut created = 0;
        let mut inserted = 0;
        for run in runs {
            let report = run.await.unwrap().unwrap();
            created += usize::from(report.show_created);
            inserted += report.new_episodes;
        }

        assert_eq!(created, 1);
        assert_eq!(inserted, 3);
        assert_eq!(ingestor.repository.count_shows().await.unwrap(), 1);
        assert_eq!(ingestor.repository.count_episodes().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn show_locks_are_per_show() {
        let locks = ShowLocks::default();
        let a = locks.acquire("a").await;
        // A different show is not blocked by a held lock
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(b.is_ok());
        // The same show is
        let again = tokio::time::timeout(Duration::from_millis(50), locks.acquire("a")).await;
        assert!(again.is_err());
        drop(a);
        assert!(
            tokio::time::timeout(Duration::from_millis(100), locks.acquire("a"))
                .await
                .is_ok()
        );
    }
}
