//! Background delivery of the sync queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::photo::{attach_image, PhotoOptions};
use super::{SyncQueue, Transport, TransportError};
use crate::error::Result;
use crate::models::SyncQueueItem;
use crate::wire::RemoteRequest;

/// How often the worker looks for items written by another process.
pub const DEFAULT_STORE_POLL: Duration = Duration::from_secs(2);

/// Scheduling and media settings for the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWorkerConfig {
    /// Unconditional pass interval
    pub interval: Duration,
    /// Store check for never-attempted items. Wakes only reach a worker in
    /// the same process, so this is how writes from other processes are
    /// picked up before the next interval.
    pub store_poll: Duration,
    pub photo: PhotoOptions,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            store_poll: DEFAULT_STORE_POLL,
            photo: PhotoOptions::default(),
        }
    }
}

/// Outcome of one delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub delivered: usize,
    pub failed: usize,
    /// Items left in the queue when the pass finished
    pub remaining: usize,
    /// The pass did not run because another one was in progress
    pub skipped: bool,
}

/// Drains the queue through a [`Transport`], one item at a time.
pub struct SyncWorker<T> {
    queue: SyncQueue,
    transport: T,
    config: SyncWorkerConfig,
    in_progress: AtomicBool,
}

/// Clears the in-progress flag when a pass ends, even on error.
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: Transport> SyncWorker<T> {
    pub const fn new(queue: SyncQueue, transport: T, config: SyncWorkerConfig) -> Self {
        Self {
            queue,
            transport,
            config,
            in_progress: AtomicBool::new(false),
        }
    }

    pub const fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Attempt every queued item once, in order.
    ///
    /// Works on a snapshot taken at the start; items enqueued meanwhile wait
    /// for the next pass. A failing item does not stop the pass. Returns a
    /// skipped report when a pass is already running.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let Some(_guard) = PassGuard::acquire(&self.in_progress) else {
            tracing::debug!("Sync pass already running, skipping");
            return Ok(PassReport {
                skipped: true,
                ..PassReport::default()
            });
        };

        let snapshot = self.queue.snapshot()?;
        let mut report = PassReport::default();

        for item in &snapshot {
            match self.deliver(item).await {
                Ok(()) => {
                    self.queue.mark_delivered(item)?;
                    report.delivered += 1;
                }
                Err(error) => {
                    let message = error.to_string();
                    let attempts = self.queue.mark_failed(item.id, &message)?;
                    tracing::warn!(
                        item = %item.id,
                        kind = item.kind().as_str(),
                        attempts = attempts.unwrap_or_default(),
                        "Delivery failed: {message}"
                    );
                    report.failed += 1;
                }
            }
        }

        report.remaining = self.queue.len()?;
        if report.delivered > 0 || report.failed > 0 {
            tracing::info!(
                delivered = report.delivered,
                failed = report.failed,
                remaining = report.remaining,
                "Sync pass finished"
            );
        }
        Ok(report)
    }

    async fn deliver(&self, item: &SyncQueueItem) -> std::result::Result<(), TransportError> {
        for request in RemoteRequest::from_payload(&item.payload) {
            let request = match request {
                RemoteRequest::Photo(photo) => {
                    RemoteRequest::Photo(attach_image(photo, self.config.photo).await?)
                }
                other => other,
            };
            self.transport.send(&request).await?;
        }
        Ok(())
    }
}

impl<T: Transport + 'static> SyncWorker<T> {
    /// Run passes on enqueue and on every interval tick until `shutdown`
    /// flips to `true` or its sender is dropped.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let poll_every = self.config.store_poll;
            let mut store_poll = tokio::time::interval_at(Instant::now() + poll_every, poll_every);
            store_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval_secs = self.config.interval.as_secs(), "Sync worker started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    () = self.queue.notified() => {}
                    _ = store_poll.tick() => {
                        match self.queue.has_unattempted() {
                            Ok(true) => {}
                            Ok(false) => continue,
                            Err(error) => {
                                tracing::warn!("Could not poll the sync queue: {error}");
                                continue;
                            }
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                if let Err(error) = self.run_pass().await {
                    tracing::error!("Sync pass failed: {error}");
                }
            }

            tracing::info!("Sync worker stopped");
        })
    }
}
