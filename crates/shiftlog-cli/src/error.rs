use std::io;

use shiftlog_core::sync::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shiftlog_core::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("A shift is already active (pair code {0}). End it with `shiftlog end`.")]
    AlreadyActive(String),
    #[error("No active shift. Start one with `shiftlog start`.")]
    NoActiveShift,
    #[error("No shifts recorded yet")]
    NoShifts,
    #[error("Photo file not found: {0}")]
    PhotoNotFound(String),
    #[error("No shift found for pair code {0}")]
    ShiftNotFound(String),
    #[error("Could not resolve a data directory; pass --db-path")]
    NoDataDir,
    #[error(
        "Sync is not configured. Set api_base_url in {0} or export SHIFTLOG_API_URL to enable `shiftlog sync`."
    )]
    SyncNotConfigured(String),
}
