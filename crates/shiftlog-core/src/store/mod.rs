//! Durable event store
//!
//! Three independently addressable records (the active-shift slot, the
//! shift history, and the sync queue) kept as JSON values in a single SQLite
//! table. Every write is a committed transaction, so a reader only ever sees
//! the last fully-written value of a record.

mod connection;
mod migrations;

pub use connection::{EventStore, StoreTxn};

/// The durable records the engine keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// The single active-shift slot
    ActiveShift,
    /// Ended shifts, newest first
    ShiftHistory,
    /// Outbound events awaiting acknowledgement
    SyncQueue,
}

impl RecordKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ActiveShift => "shift.active",
            Self::ShiftHistory => "shift.history",
            Self::SyncQueue => "sync.queue",
        }
    }
}
