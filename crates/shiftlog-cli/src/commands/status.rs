use serde::Serialize;
use shiftlog_core::geo::{encode_polyline, filter_jitter};
use shiftlog_core::shift::ShiftState;
use shiftlog_core::sync::QueueStats;
use shiftlog_core::util::now_millis;

use crate::commands::common::{
    format_duration, queue_item_to_list_item, queue_line, shift_line, shift_to_list_item,
    QueueListItem, ShiftListItem, Workspace,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusReport {
    state: ShiftState,
    active: Option<ShiftListItem>,
    queue: QueueStats,
    sync_configured: bool,
}

pub fn run_status(workspace: &Workspace, as_json: bool) -> Result<(), CliError> {
    let machine = &workspace.machine;
    let active = machine.get_active()?;
    let report = StatusReport {
        state: machine.state()?,
        active: active
            .as_ref()
            .map(|shift| shift_to_list_item(shift, machine.summary(shift))),
        queue: workspace.queue().stats(now_millis())?,
        sync_configured: workspace.config.api_base_url().is_some(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &active {
        Some(shift) => println!("Active: {}", shift_line(shift, &machine.summary(shift))),
        None => println!("No active shift"),
    }
    let queue = &report.queue;
    print!("Queue: {} pending", queue.pending);
    if let Some(age) = queue.oldest_age_ms {
        print!(", oldest {}", format_duration(age));
    }
    if queue.max_attempts > 0 {
        print!(", up to {} failed attempts", queue.max_attempts);
    }
    println!();
    if let Some(error) = &queue.last_error {
        println!("Last error: {error}");
    }
    if !report.sync_configured {
        println!("Sync: not configured");
    }
    Ok(())
}

pub fn run_history(workspace: &Workspace, limit: usize, as_json: bool) -> Result<(), CliError> {
    let machine = &workspace.machine;
    let history = machine.get_history()?;
    let shown = history.iter().take(limit);

    if as_json {
        let items = shown
            .map(|shift| shift_to_list_item(shift, machine.summary(shift)))
            .collect::<Vec<ShiftListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No shifts recorded yet.");
        return Ok(());
    }
    for shift in shown {
        println!("{}", shift_line(shift, &machine.summary(shift)));
    }
    Ok(())
}

pub fn run_queue(workspace: &Workspace, as_json: bool) -> Result<(), CliError> {
    let items = workspace.queue().snapshot()?;

    if as_json {
        let json_items = items
            .iter()
            .map(queue_item_to_list_item)
            .collect::<Vec<QueueListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Nothing waiting to sync.");
        return Ok(());
    }
    for item in &items {
        println!("{}", queue_line(item));
    }
    Ok(())
}

/// Encoded polyline of the active shift, or the most recent ended one.
pub fn trail_polyline(workspace: &Workspace, filtered: bool) -> Result<String, CliError> {
    let machine = &workspace.machine;
    let shift = match machine.get_active()? {
        Some(shift) => shift,
        None => machine
            .get_history()?
            .into_iter()
            .next()
            .ok_or(CliError::NoShifts)?,
    };

    Ok(if filtered {
        encode_polyline(&filter_jitter(&shift.locations, machine.settings().jitter))
    } else {
        encode_polyline(&shift.locations)
    })
}

pub fn run_trail(workspace: &Workspace, filtered: bool) -> Result<(), CliError> {
    println!("{}", trail_polyline(workspace, filtered)?);
    Ok(())
}
