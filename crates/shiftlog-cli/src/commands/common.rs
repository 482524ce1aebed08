use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::DateTime;
use serde::Serialize;
use shiftlog_core::config::{ClientConfig, API_URL_ENV};
use shiftlog_core::models::ShiftSummary;
use shiftlog_core::sync::HttpTransport;
use shiftlog_core::{EventStore, LocationPoint, Shift, ShiftMachine, SyncQueue, SyncQueueItem};

use crate::cli::{LocationArgs, OptionalLocationArgs};
use crate::error::CliError;

/// Environment variable overriding the store location.
pub const DB_PATH_ENV: &str = "SHIFTLOG_DB_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

/// An opened local store plus the client configuration.
pub struct Workspace {
    pub machine: ShiftMachine,
    pub config: ClientConfig,
    pub config_path: PathBuf,
}

impl Workspace {
    pub fn queue(&self) -> &SyncQueue {
        self.machine.queue()
    }

    pub fn transport(&self) -> Result<HttpTransport, CliError> {
        let base_url = self
            .config
            .api_base_url()
            .ok_or_else(|| CliError::SyncNotConfigured(self.config_path.display().to_string()))?;
        Ok(HttpTransport::new(base_url, self.config.request_timeout())?)
    }
}

/// Resolve store and config paths. The config file defaults to a sibling of
/// the store.
pub fn resolve_paths(
    cli_db_path: Option<PathBuf>,
    cli_config_path: Option<PathBuf>,
) -> Result<Paths, CliError> {
    let db_path = match cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        Some(path) => path,
        None => default_db_path()?,
    };
    let config_path = cli_config_path.unwrap_or_else(|| db_path.with_file_name("config.json"));
    Ok(Paths {
        db_path,
        config_path,
    })
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("shiftlog").join("shiftlog.db"))
        .ok_or(CliError::NoDataDir)
}

pub fn open_workspace(paths: &Paths) -> Result<Workspace, CliError> {
    let config = ClientConfig::load(&paths.config_path)?.with_env_overrides(|name| {
        if name == API_URL_ENV {
            env::var(name).ok()
        } else {
            None
        }
    });
    config.validate()?;

    let store = Arc::new(EventStore::open(&paths.db_path)?);
    let queue = SyncQueue::new(Arc::clone(&store));
    let machine = ShiftMachine::open(store, queue, config.shift_settings())?;

    Ok(Workspace {
        machine,
        config,
        config_path: paths.config_path.clone(),
    })
}

pub fn location_point(args: &LocationArgs) -> Result<LocationPoint, CliError> {
    let point = LocationPoint::new(args.lat, args.lon, args.accuracy)?;
    Ok(match args.address.as_deref() {
        Some(address) => point.with_address(address),
        None => point,
    })
}

pub fn optional_location_point(
    args: &OptionalLocationArgs,
) -> Result<Option<LocationPoint>, CliError> {
    match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => Ok(Some(LocationPoint::new(lat, lon, args.accuracy)?)),
        (None, None) => Ok(None),
        _ => Err(
            shiftlog_core::Error::validation("--lat and --lon must be given together").into(),
        ),
    }
}

/// Absolute path of a photo that must exist on disk.
pub fn resolve_photo_path(path: &Path) -> Result<String, CliError> {
    std::fs::canonicalize(path)
        .map(|resolved| resolved.display().to_string())
        .map_err(|_| CliError::PhotoNotFound(path.display().to_string()))
}

pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_duration(millis: i64) -> String {
    let total_minutes = millis.max(0) / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m")
    }
}

pub fn format_distance(meters: f64) -> String {
    if meters >= 1_000.0 {
        format!("{:.2} km", meters / 1_000.0)
    } else {
        format!("{meters:.0} m")
    }
}

#[derive(Debug, Serialize)]
pub struct ShiftListItem {
    pub id: String,
    pub pair_code: String,
    pub staff_name: String,
    pub site_name: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub active: bool,
    #[serde(flatten)]
    pub summary: ShiftSummary,
}

pub fn shift_to_list_item(shift: &Shift, summary: ShiftSummary) -> ShiftListItem {
    ShiftListItem {
        id: shift.id.to_string(),
        pair_code: shift.pair_code.to_string(),
        staff_name: shift.staff_name.clone(),
        site_name: shift.site_name.clone(),
        start_time: shift.start_time,
        end_time: shift.end_time,
        active: shift.active,
        summary,
    }
}

/// One-line description of a shift for listings.
pub fn shift_line(shift: &Shift, summary: &ShiftSummary) -> String {
    format!(
        "{}  {}  {} @ {}  {}  {}  {} pts, {} photos, {} notes",
        shift.pair_code,
        format_timestamp(shift.start_time),
        shift.staff_name,
        shift.site_name,
        format_duration(summary.duration_ms),
        format_distance(summary.trail_length_meters),
        summary.location_count,
        summary.photo_count,
        summary.note_count,
    )
}

#[derive(Debug, Serialize)]
pub struct QueueListItem {
    pub id: String,
    pub kind: &'static str,
    pub pair_code: String,
    pub created_at: i64,
    pub attempts: u32,
    pub last_error: Option<String>,
}

pub fn queue_item_to_list_item(item: &SyncQueueItem) -> QueueListItem {
    QueueListItem {
        id: item.id.to_string(),
        kind: item.kind().as_str(),
        pair_code: item.payload.pair_code().to_string(),
        created_at: item.created_at,
        attempts: item.attempts,
        last_error: item.last_error.clone(),
    }
}

pub fn queue_line(item: &SyncQueueItem) -> String {
    let mut line = format!(
        "{}  {:<14}  {}  attempts={}",
        format_timestamp(item.created_at),
        item.kind().as_str(),
        item.payload.pair_code(),
        item.attempts
    );
    if let Some(error) = &item.last_error {
        line.push_str("  last_error=");
        line.push_str(error);
    }
    line
}
