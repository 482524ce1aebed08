//! Sync queue and delivery worker
//!
//! Recorded events are appended to a durable queue and pushed to the remote
//! mirror by a single background worker. Delivery is at-least-once: an item
//! leaves the queue only after the remote acknowledged it, and failures are
//! retried on every pass without limit.

mod photo;
mod queue;
mod transport;
mod worker;

pub use photo::{attach_image, prepare_photo, PhotoOptions, PreparedPhoto};
pub use queue::{QueueStats, SyncQueue};
pub(crate) use queue::{push, push_location};
pub use transport::{HttpTransport, Transport, TransportError};
pub use worker::{PassReport, SyncWorker, SyncWorkerConfig, DEFAULT_STORE_POLL};
