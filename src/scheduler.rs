use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::Repository;
use crate::error::Result;
use crate::feed::FeedSource;
use crate::ingest::{IngestReport, Ingestor};

pub type IngestTask = JoinHandle<Result<IngestReport>>;

pub struct Scheduler<S> {
    ingestor: Arc<Ingestor<S>>,
    repository: Repository,
    interval: Duration,
    permits: Arc<Semaphore>,
}

impl<S: FeedSource> Scheduler<S> {
    pub fn new(
        ingestor: Arc<Ingestor<S>>,
        repository: Repository,
        interval: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            ingestor,
            repository,
            interval,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Launch one independent run per approved show.
    ///
    /// The returned tasks may be awaited or dropped; dropping them leaves the
    /// runs going in the background.
    pub async fn sweep(&self) -> Result<Vec<IngestTask>> {
        let shows = self.repository.list_approved_shows().await?;
        tracing::info!("Updating {} approved feeds", shows.len());

        let tasks = shows
            .into_iter()
            .map(|show| {
                let ingestor = Arc::clone(&self.ingestor);
                let permits = Arc::clone(&self.permits);
                tokio::spawn(async move {
                    // The semaphore is never closed
                    let _permit = permits.acquire_owned().await.ok();
                    run_logged(&ingestor, &show.feed_url).await
                })
            })
            .collect();

        Ok(tasks)
    }

    /// Ingest one feed right away, outside the sweep's concurrency budget.
    pub fn refresh_now(&self, feed_url: &str) -> IngestTask {
        let ingestor = Arc::clone(&self.ingestor);
        let feed_url = feed_url.to_string();
        tokio::spawn(async move { run_logged(&ingestor, &feed_url).await })
    }

    /// Run a sweep every interval until the handle is shut down. The first
    /// sweep starts immediately.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (sender, mut receiver) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!("Scheduler started, sweeping every {:?}", self.interval);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(e) = self.sweep().await {
                            tracing::error!("Failed to start sweep: {}", e);
                        }
                    }
                    _ = receiver.recv() => {
                        tracing::info!("Scheduler stopped");
                        break;
                    }
                }
            }
        });

        SchedulerHandle { sender, task }
    }
}

async fn run_logged<S: FeedSource>(ingestor: &Ingestor<S>, feed_url: &str) -> Result<IngestReport> {
    let result = ingestor.ingest(feed_url).await;
    if let Err(e) = &result {
        tracing::warn!("Failed to update {} ({:?}): {}", feed_url, e.kind(), e);
    }
    result
}

pub struct SchedulerHandle {
    sender: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop sweeping. Runs already launched finish on their own.
    pub async fn shutdown(self) {
        let _ = self.sender.send(()).await;
        let _ = self.task.await;
    }
}
