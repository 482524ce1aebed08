//! Durable outbound queue

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Notify;

use crate::error::Result;
use crate::models::{LocationPoint, PairCode, QueueItemId, SyncPayload, SyncQueueItem};
use crate::store::{EventStore, RecordKey, StoreTxn};

/// Ordered list of events awaiting remote acknowledgement, persisted in the
/// event store under [`RecordKey::SyncQueue`].
///
/// Cloning is cheap; clones share the store and the wake signal.
#[derive(Clone)]
pub struct SyncQueue {
    store: Arc<EventStore>,
    wake: Arc<Notify>,
}

/// Queue health for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    /// Age of the oldest queued item in milliseconds
    pub oldest_age_ms: Option<i64>,
    pub max_attempts: u32,
    /// Error recorded on the first failing item
    pub last_error: Option<String>,
}

impl SyncQueue {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self {
            store,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Append an item and wake the worker. Never touches the network.
    pub fn enqueue(&self, payload: SyncPayload) -> Result<SyncQueueItem> {
        let item = self.store.transact(|txn| push(txn, payload))?;
        self.wake();
        Ok(item)
    }

    /// Current queue contents in delivery order.
    pub fn snapshot(&self) -> Result<Vec<SyncQueueItem>> {
        Ok(self
            .store
            .read::<Vec<SyncQueueItem>>(RecordKey::SyncQueue)?
            .unwrap_or_default())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether any item has never been tried.
    pub fn has_unattempted(&self) -> Result<bool> {
        Ok(self.snapshot()?.iter().any(|item| item.attempts == 0))
    }

    /// Remove an acknowledged item.
    ///
    /// The live queue is re-read by id. A location batch that gained points
    /// while it was being delivered keeps the points that were not part of
    /// the delivered snapshot. Returns `false` when the item was already gone.
    pub fn mark_delivered(&self, delivered: &SyncQueueItem) -> Result<bool> {
        self.store.transact(|txn| {
            let mut items = load(txn)?;
            let Some(index) = items.iter().position(|item| item.id == delivered.id) else {
                return Ok(false);
            };

            let delivered_points = match &delivered.payload {
                SyncPayload::LocationBatch { points, .. } => points.len(),
                _ => 0,
            };
            let keep_rest = match &mut items[index].payload {
                SyncPayload::LocationBatch { points, .. } if points.len() > delivered_points => {
                    points.drain(..delivered_points);
                    true
                }
                _ => false,
            };
            if !keep_rest {
                items.remove(index);
            }

            txn.write(RecordKey::SyncQueue, &items)?;
            Ok(true)
        })
    }

    /// Record a failed delivery attempt. The item stays queued.
    ///
    /// Returns the new attempt count, or `None` when the item was already gone.
    pub fn mark_failed(&self, id: QueueItemId, error: &str) -> Result<Option<u32>> {
        self.store.transact(|txn| {
            let mut items = load(txn)?;
            let Some(item) = items.iter_mut().find(|item| item.id == id) else {
                return Ok(None);
            };
            item.attempts = item.attempts.saturating_add(1);
            item.last_error = Some(error.to_string());
            let attempts = item.attempts;

            txn.write(RecordKey::SyncQueue, &items)?;
            Ok(Some(attempts))
        })
    }

    pub fn stats(&self, now: i64) -> Result<QueueStats> {
        let items = self.snapshot()?;
        Ok(QueueStats {
            pending: items.len(),
            oldest_age_ms: items
                .iter()
                .map(|item| item.created_at)
                .min()
                .map(|created| now.saturating_sub(created).max(0)),
            max_attempts: items.iter().map(|item| item.attempts).max().unwrap_or(0),
            last_error: items.iter().find_map(|item| item.last_error.clone()),
        })
    }

    /// Ask the worker for a pass as soon as possible.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Resolves after the next [`Self::wake`].
    pub async fn notified(&self) {
        self.wake.notified().await;
    }
}

fn load(txn: &StoreTxn<'_>) -> Result<Vec<SyncQueueItem>> {
    Ok(txn
        .read::<Vec<SyncQueueItem>>(RecordKey::SyncQueue)?
        .unwrap_or_default())
}

/// Append an item inside a caller's transaction.
pub(crate) fn push(txn: &mut StoreTxn<'_>, payload: SyncPayload) -> Result<SyncQueueItem> {
    let mut items = load(txn)?;
    let item = SyncQueueItem::new(payload);
    items.push(item.clone());
    txn.write(RecordKey::SyncQueue, &items)?;
    Ok(item)
}

/// Queue one location point inside a caller's transaction.
///
/// The point joins the tail item when that item is a never-attempted batch
/// for the same shift with room left; otherwise a new batch is started.
pub(crate) fn push_location(
    txn: &mut StoreTxn<'_>,
    pair_code: &PairCode,
    point: LocationPoint,
    batch_size: usize,
) -> Result<()> {
    let mut items = load(txn)?;
    let joined = match items.last_mut() {
        Some(SyncQueueItem {
            attempts: 0,
            payload:
                SyncPayload::LocationBatch {
                    pair_code: tail_code,
                    points,
                },
            ..
        }) if tail_code == pair_code && points.len() < batch_size => {
            points.push(point.clone());
            true
        }
        _ => false,
    };
    if !joined {
        items.push(SyncQueueItem::new(SyncPayload::LocationBatch {
            pair_code: pair_code.clone(),
            points: vec![point],
        }));
    }
    txn.write(RecordKey::SyncQueue, &items)?;
    Ok(())
}
