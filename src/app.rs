use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::{parse_opml_file, FeedSource, HttpFeedSource, Normalizer};
use crate::ingest::{IngestReport, Ingestor};
use crate::models::{Episode, Show};
use crate::scheduler::{Scheduler, SchedulerHandle};

/// Successes and failures of a batch of ingestion runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn record(&mut self, result: &Result<IngestReport>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// The catalog as seen by its callers: ingestion, moderation and queries.
pub struct App<S = HttpFeedSource> {
    repository: Repository,
    ingestor: Arc<Ingestor<S>>,
    scheduler: Arc<Scheduler<S>>,
}

impl App<HttpFeedSource> {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Repository::open(&config.db_path).await?;
        let source = HttpFeedSource::new(config.fetch_timeout(), &config.user_agent)?;
        Ok(Self::with_source(config, repository, source))
    }
}

impl<S: FeedSource> App<S> {
    pub fn with_source(config: &Config, repository: Repository, source: S) -> Self {
        let ingestor = Arc::new(Ingestor::new(
            repository.clone(),
            source,
            Normalizer::new(config),
            config.fetch_timeout(),
        ));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&ingestor),
            repository.clone(),
            config.refresh_interval(),
            config.max_concurrent_fetches,
        ));

        Self {
            repository,
            ingestor,
            scheduler,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn source(&self) -> &S {
        self.ingestor.source()
    }

    // Ingestion

    /// Ingest one feed now and wait for the outcome.
    pub async fn ingest(&self, feed_url: &str) -> Result<IngestReport> {
        self.scheduler
            .refresh_now(feed_url)
            .await
            .map_err(|e| AppError::Other(e.into()))?
    }

    /// Ingest several feeds concurrently, e.g. from a subscription list.
    pub async fn ingest_all<I>(&self, feed_urls: I) -> BatchSummary
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let tasks: Vec<_> = feed_urls
            .into_iter()
            .map(|url| self.scheduler.refresh_now(url.as_ref()))
            .collect();

        let mut summary = BatchSummary::default();
        for joined in futures::future::join_all(tasks).await {
            summary.record(&joined.unwrap_or_else(|e| Err(AppError::Other(e.into()))));
        }
        summary
    }

    pub async fn import_opml(&self, path: &Path) -> Result<BatchSummary> {
        let urls = parse_opml_file(path)?;
        tracing::info!("Importing {} feeds from {:?}", urls.len(), path);
        Ok(self.ingest_all(urls).await)
    }

    /// Run one sweep over every approved show and wait for all of it.
    pub async fn refresh_all(&self) -> Result<BatchSummary> {
        let tasks = self.scheduler.sweep().await?;

        let mut summary = BatchSummary::default();
        for joined in futures::future::join_all(tasks).await {
            summary.record(&joined.unwrap_or_else(|e| Err(AppError::Other(e.into()))));
        }
        Ok(summary)
    }

    pub fn start_scheduler(&self) -> SchedulerHandle {
        Arc::clone(&self.scheduler).start()
    }

    // Moderation

    pub async fn approve(&self, show_id: &str) -> Result<()> {
        self.repository.approve_show(show_id).await?;
        tracing::info!("Approved show {}", show_id);
        Ok(())
    }

    pub async fn delete(&self, show_id: &str) -> Result<()> {
        self.repository.delete_show(show_id).await
    }

    // Queries

    pub async fn list_top_shows(&self, limit: usize, include_unapproved: bool) -> Result<Vec<Show>> {
        self.repository.list_shows(limit, include_unapproved).await
    }

    pub async fn get_show(&self, id: &str) -> Result<Show> {
        self.repository
            .get_show(id)
            .await?
            .ok_or_else(|| AppError::not_found("show", id))
    }

    pub async fn list_episodes(&self, show_id: &str) -> Result<Vec<Episode>> {
        self.repository.list_episodes(show_id).await
    }

    pub async fn get_episode(&self, id: &str) -> Result<Episode> {
        self.repository
            .get_episode(id)
            .await?
            .ok_or_else(|| AppError::not_found("episode", id))
    }

    pub async fn search_shows(&self, query: &str) -> Result<Vec<Show>> {
        self.repository.search_shows(query).await
    }

    pub async fn search_episodes(&self, show_id: Option<&str>, query: &str) -> Result<Vec<Episode>> {
        self.repository.search_episodes(show_id, query).await
    }
}
