use std::sync::Arc;

use shiftlog_core::sync::{PassReport, SyncWorker};
use shiftlog_core::wire::ShiftProjection;
use shiftlog_core::PairCode;
use tokio::sync::watch;

use crate::commands::common::{format_timestamp, Workspace};
use crate::error::CliError;

pub async fn run_sync(workspace: &Workspace) -> Result<(), CliError> {
    let transport = workspace.transport()?;
    let worker = SyncWorker::new(
        workspace.queue().clone(),
        transport,
        workspace.config.worker_config(),
    );

    let report = worker.run_pass().await?;
    println!("{}", pass_summary(&report));
    Ok(())
}

/// Run the worker until Ctrl-C.
pub async fn run_worker(workspace: &Workspace) -> Result<(), CliError> {
    let transport = workspace.transport()?;
    let worker = Arc::new(SyncWorker::new(
        workspace.queue().clone(),
        transport,
        workspace.config.worker_config(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = Arc::clone(&worker).spawn(shutdown_rx);
    println!("Syncing in the background. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    // The worker also stops if the sender is dropped.
    let _ = shutdown_tx.send(true);
    if let Err(error) = handle.await {
        tracing::error!("Sync worker task failed: {error}");
    }

    let remaining = workspace.queue().len()?;
    println!("Stopped with {remaining} item(s) waiting to sync.");
    Ok(())
}

pub async fn run_view(workspace: &Workspace, pair_code: &str, as_json: bool) -> Result<(), CliError> {
    let pair_code = PairCode::parse(pair_code)?;
    let transport = workspace.transport()?;
    let projection = transport
        .fetch_shift(&pair_code)
        .await?
        .ok_or_else(|| CliError::ShiftNotFound(pair_code.to_string()))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&projection)?);
    } else {
        for line in projection_lines(&projection) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn pass_summary(report: &PassReport) -> String {
    if report.skipped {
        return "Another sync pass is already running".to_string();
    }
    format!(
        "Sync pass finished: {} delivered, {} failed, {} remaining",
        report.delivered, report.failed, report.remaining
    )
}

pub fn projection_lines(projection: &ShiftProjection) -> Vec<String> {
    let mut lines = vec![format!(
        "{}  {} @ {}  {}",
        projection.pair_code,
        projection.staff_name.as_deref().unwrap_or("(unknown staff)"),
        projection.site_name.as_deref().unwrap_or("(unknown site)"),
        if projection.active { "active" } else { "ended" }
    )];
    if let Some(start) = projection.start_time {
        lines.push(format!("Started: {}", format_timestamp(start)));
    }
    if let Some(end) = projection.end_time {
        lines.push(format!("Ended:   {}", format_timestamp(end)));
    }
    if let Some(location) = &projection.latest_location {
        lines.push(format!(
            "Last seen: {:.5}, {:.5} at {}",
            location.latitude,
            location.longitude,
            format_timestamp(location.timestamp)
        ));
    }
    lines.push(format!(
        "{} locations, {} photos, {} notes",
        projection.locations.len(),
        projection.photos.len(),
        projection.notes.len()
    ));
    for note in &projection.notes {
        lines.push(format!("  {}  {}", format_timestamp(note.timestamp), note.text));
    }
    lines
}
