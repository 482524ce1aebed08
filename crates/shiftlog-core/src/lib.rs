//! shiftlog-core - Core library for shiftlog
//!
//! This crate contains the offline-first shift engine shared by the CLI and
//! the remote reconciler: the geospatial trail processor, the durable event
//! store, the shift state machine, and the sync queue with its worker.

pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod shift;
pub mod store;
pub mod sync;
pub mod util;
pub mod wire;

pub use error::{Error, Result};
pub use models::{
    EventId, LocationPoint, Note, PairCode, PhotoEvent, Shift, ShiftId, SyncPayload,
    SyncQueueItem,
};
pub use shift::{
    AppendOutcome, EndOutcome, ShiftMachine, ShiftSettings, ShiftState, StartOutcome, StartShift,
};
pub use store::EventStore;
pub use sync::{HttpTransport, SyncQueue, SyncWorker, Transport};
