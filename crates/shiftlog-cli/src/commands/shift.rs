use std::path::Path;

use shiftlog_core::geo::{Geofence, GeofenceTransition, Position};
use shiftlog_core::{AppendOutcome, EndOutcome, Shift, StartOutcome, StartShift};

use crate::cli::{LocationArgs, OptionalLocationArgs, StartArgs};
use crate::commands::common::{
    format_distance, format_duration, location_point, optional_location_point, resolve_photo_path,
    Workspace,
};
use crate::error::CliError;

pub fn run_start(workspace: &Workspace, args: &StartArgs) -> Result<Shift, CliError> {
    let location = location_point(&args.location)?;
    let geofence = args
        .fence_radius
        .map(|radius| Geofence::new(location.coordinate(), radius))
        .transpose()?;

    let outcome = workspace.machine.start_with(StartShift {
        staff_name: args.staff.clone(),
        site_name: args.site.clone(),
        location,
        geofence,
    })?;

    match outcome {
        StartOutcome::Started(shift) => {
            println!("Shift started for {} at {}", shift.staff_name, shift.site_name);
            println!("Pair code: {}", shift.pair_code);
            Ok(shift)
        }
        StartOutcome::AlreadyActive(shift) => {
            Err(CliError::AlreadyActive(shift.pair_code.to_string()))
        }
    }
}

pub fn run_location(workspace: &Workspace, args: &LocationArgs) -> Result<(), CliError> {
    let point = location_point(args)?;
    let (shift, crossing) = recorded(workspace.machine.append_location(point)?)?;

    println!("Location recorded ({} points)", shift.locations.len());
    match crossing {
        Some(GeofenceTransition::Entered) => println!("Entered site {}", shift.site_name),
        Some(GeofenceTransition::Left) => println!("Left site {}", shift.site_name),
        None => {}
    }
    Ok(())
}

pub fn run_photo(
    workspace: &Workspace,
    path: &Path,
    location: &OptionalLocationArgs,
) -> Result<(), CliError> {
    let file_ref = resolve_photo_path(path)?;
    let location = optional_location_point(location)?;
    let (shift, _) = recorded(workspace.machine.append_photo(&file_ref, location)?)?;

    if let Some(photo) = shift.photos.last() {
        println!("{}", photo.id);
    }
    Ok(())
}

pub fn run_note(
    workspace: &Workspace,
    text: &[String],
    location: &OptionalLocationArgs,
) -> Result<(), CliError> {
    let location = optional_location_point(location)?;
    let (shift, _) = recorded(workspace.machine.append_note(&text.join(" "), location)?)?;

    if let Some(note) = shift.notes.last() {
        println!("{}", note.id);
    }
    Ok(())
}

pub fn run_end(workspace: &Workspace) -> Result<(), CliError> {
    match workspace.machine.end()? {
        EndOutcome::Ended(shift) => {
            let summary = workspace.machine.summary(&shift);
            println!(
                "Shift {} ended after {} ({} travelled)",
                shift.pair_code,
                format_duration(summary.duration_ms),
                format_distance(summary.trail_length_meters)
            );
        }
        EndOutcome::NothingToEnd => println!("No active shift to end."),
    }
    Ok(())
}

fn recorded(outcome: AppendOutcome) -> Result<(Shift, Option<GeofenceTransition>), CliError> {
    match outcome {
        AppendOutcome::Recorded { shift, geofence } => Ok((shift, geofence)),
        AppendOutcome::NoActiveShift => Err(CliError::NoActiveShift),
    }
}
