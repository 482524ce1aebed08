//! Shift lifecycle
//!
//! [`ShiftMachine`] is the only writer of the active-shift slot and the shift
//! history. Every operation validates its input first and then commits the
//! shift change together with the sync queue entries it produces, so a crash
//! never leaves a recorded event without its delivery or the other way round.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::{self, Geofence, GeofenceTransition, JitterThresholds};
use crate::models::{
    LocationPoint, Note, PairCode, PhotoEvent, Shift, ShiftSummary, SyncPayload,
};
use crate::store::{EventStore, RecordKey, StoreTxn};
use crate::sync::{self, SyncQueue};
use crate::util::{now_millis, required_text};

/// Attempts at drawing a pair code not already used on this device.
const PAIR_CODE_ATTEMPTS: usize = 64;

/// Lifecycle phase of the device's shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShiftState {
    NoActiveShift,
    Active,
    Ending,
}

/// Tunables for recording a shift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftSettings {
    /// Decides which appended points are sent to the remote mirror
    pub jitter: JitterThresholds,
    /// Maximum points per queued location batch
    pub location_batch_size: usize,
}

impl Default for ShiftSettings {
    fn default() -> Self {
        Self {
            jitter: JitterThresholds::default(),
            location_batch_size: 20,
        }
    }
}

/// Arguments for [`ShiftMachine::start_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct StartShift {
    pub staff_name: String,
    pub site_name: String,
    pub location: LocationPoint,
    pub geofence: Option<Geofence>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Started(Shift),
    /// A shift is already running; it is returned unchanged.
    AlreadyActive(Shift),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Recorded {
        shift: Shift,
        /// Set when the appended location crossed the site geofence
        geofence: Option<GeofenceTransition>,
    },
    NoActiveShift,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EndOutcome {
    Ended(Shift),
    NothingToEnd,
}

/// The shift state machine.
pub struct ShiftMachine {
    store: Arc<EventStore>,
    queue: SyncQueue,
    settings: ShiftSettings,
    phase: Mutex<ShiftState>,
}

impl ShiftMachine {
    /// Recover the machine from whatever the store holds.
    pub fn open(store: Arc<EventStore>, queue: SyncQueue, settings: ShiftSettings) -> Result<Self> {
        if settings.location_batch_size == 0 {
            return Err(Error::validation("location batch size must be at least 1"));
        }

        let active: Option<Shift> = store.read(RecordKey::ActiveShift)?;
        let phase = match &active {
            Some(shift) => {
                tracing::info!(pair_code = %shift.pair_code, "Recovered active shift");
                ShiftState::Active
            }
            None => ShiftState::NoActiveShift,
        };

        Ok(Self {
            store,
            queue,
            settings,
            phase: Mutex::new(phase),
        })
    }

    pub fn state(&self) -> Result<ShiftState> {
        Ok(*self.lock_phase()?)
    }

    pub const fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub const fn settings(&self) -> &ShiftSettings {
        &self.settings
    }

    /// Start a shift at `location`.
    pub fn start(
        &self,
        staff_name: &str,
        site_name: &str,
        location: LocationPoint,
    ) -> Result<StartOutcome> {
        self.start_with(StartShift {
            staff_name: staff_name.to_string(),
            site_name: site_name.to_string(),
            location,
            geofence: None,
        })
    }

    pub fn start_with(&self, request: StartShift) -> Result<StartOutcome> {
        let staff_name = required_text("staff name", &request.staff_name)?;
        let site_name = required_text("site name", &request.site_name)?;
        request.location.validate()?;

        let mut phase = self.lock_phase()?;
        let outcome = self.store.transact(|txn| {
            if let Some(current) = txn.read::<Shift>(RecordKey::ActiveShift)? {
                return Ok(StartOutcome::AlreadyActive(current));
            }

            let pair_code = fresh_pair_code(txn)?;
            let start_time = now_millis();
            let mut shift = Shift::begin(
                staff_name,
                site_name,
                pair_code,
                request.location,
                start_time,
            );
            shift.geofence = request.geofence;

            sync::push(
                txn,
                SyncPayload::ShiftStart {
                    pair_code: shift.pair_code.clone(),
                    staff_name: shift.staff_name.clone(),
                    site_name: shift.site_name.clone(),
                    start_time,
                },
            )?;
            if let Some(first) = shift.locations.first().cloned() {
                self.force_publish(txn, &mut shift, first)?;
            }

            txn.write(RecordKey::ActiveShift, &shift)?;
            Ok(StartOutcome::Started(shift))
        })?;

        *phase = ShiftState::Active;
        drop(phase);

        if let StartOutcome::Started(shift) = &outcome {
            tracing::info!(
                shift = %shift.id,
                pair_code = %shift.pair_code,
                site = %shift.site_name,
                "Shift started"
            );
            self.queue.wake();
        }
        Ok(outcome)
    }

    /// Record a GPS sample on the active shift.
    ///
    /// Every sample is kept locally; only samples that pass the jitter rule
    /// against the last published point are queued for delivery.
    pub fn append_location(&self, point: LocationPoint) -> Result<AppendOutcome> {
        point.validate()?;

        let _phase = self.lock_phase()?;
        let outcome = self.store.transact(|txn| {
            let Some(mut shift) = txn.read::<Shift>(RecordKey::ActiveShift)? else {
                return Ok(AppendOutcome::NoActiveShift);
            };

            let crossing = match (&shift.geofence, shift.locations.last()) {
                (Some(fence), Some(previous)) => geo::transition(previous, &point, fence),
                _ => None,
            };
            shift.locations.push(point.clone());
            self.publish_location(txn, &mut shift, point.clone())?;

            if let Some(crossing) = crossing {
                let text = match crossing {
                    GeofenceTransition::Entered => format!("Entered site {}", shift.site_name),
                    GeofenceTransition::Left => format!("Left site {}", shift.site_name),
                };
                let mut note = Note::new(text, Some(point.clone()));
                note.timestamp = point.timestamp;
                record_note(txn, &mut shift, note)?;
            }

            txn.write(RecordKey::ActiveShift, &shift)?;
            Ok(AppendOutcome::Recorded {
                shift,
                geofence: crossing,
            })
        })?;

        if let AppendOutcome::Recorded {
            geofence: Some(crossing),
            shift,
        } = &outcome
        {
            tracing::info!(pair_code = %shift.pair_code, ?crossing, "Geofence crossed");
        }
        self.queue.wake();
        Ok(outcome)
    }

    /// Record a photo by local file reference.
    pub fn append_photo(
        &self,
        file_ref: &str,
        location: Option<LocationPoint>,
    ) -> Result<AppendOutcome> {
        let file_ref = required_text("photo file reference", file_ref)?;
        if let Some(location) = &location {
            location.validate()?;
        }

        let _phase = self.lock_phase()?;
        let outcome = self.store.transact(|txn| {
            let Some(mut shift) = txn.read::<Shift>(RecordKey::ActiveShift)? else {
                return Ok(AppendOutcome::NoActiveShift);
            };

            let photo = PhotoEvent::new(file_ref, location);
            shift.photos.push(photo.clone());
            sync::push(
                txn,
                SyncPayload::Photo {
                    pair_code: shift.pair_code.clone(),
                    photo,
                },
            )?;

            txn.write(RecordKey::ActiveShift, &shift)?;
            Ok(AppendOutcome::Recorded {
                shift,
                geofence: None,
            })
        })?;

        self.queue.wake();
        Ok(outcome)
    }

    pub fn append_note(&self, text: &str, location: Option<LocationPoint>) -> Result<AppendOutcome> {
        let text = required_text("note text", text)?;
        if let Some(location) = &location {
            location.validate()?;
        }

        let _phase = self.lock_phase()?;
        let outcome = self.store.transact(|txn| {
            let Some(mut shift) = txn.read::<Shift>(RecordKey::ActiveShift)? else {
                return Ok(AppendOutcome::NoActiveShift);
            };

            record_note(txn, &mut shift, Note::new(text, location))?;

            txn.write(RecordKey::ActiveShift, &shift)?;
            Ok(AppendOutcome::Recorded {
                shift,
                geofence: None,
            })
        })?;

        self.queue.wake();
        Ok(outcome)
    }

    /// End the active shift and move it to the front of the history.
    ///
    /// Deliveries already queued for the shift are left alone; `shift-end`
    /// is queued behind them.
    pub fn end(&self) -> Result<EndOutcome> {
        let mut phase = self.lock_phase()?;
        let previous = *phase;
        *phase = ShiftState::Ending;

        let result = self.store.transact(|txn| {
            let Some(mut shift) = txn.read::<Shift>(RecordKey::ActiveShift)? else {
                return Ok(EndOutcome::NothingToEnd);
            };

            let end_time = now_millis().max(shift.start_time);
            shift.active = false;
            shift.end_time = Some(end_time);

            // The remote trail ends where the local one does.
            if let Some(last) = shift.locations.last().cloned() {
                if shift.last_published.as_ref() != Some(&last) {
                    self.force_publish(txn, &mut shift, last)?;
                }
            }

            let mut history: Vec<Shift> = txn.read(RecordKey::ShiftHistory)?.unwrap_or_default();
            history.insert(0, shift.clone());
            txn.write(RecordKey::ShiftHistory, &history)?;
            txn.delete(RecordKey::ActiveShift)?;
            sync::push(
                txn,
                SyncPayload::ShiftEnd {
                    pair_code: shift.pair_code.clone(),
                    end_time,
                },
            )?;

            Ok(EndOutcome::Ended(shift))
        });

        match result {
            Ok(outcome) => {
                *phase = ShiftState::NoActiveShift;
                drop(phase);
                if let EndOutcome::Ended(shift) = &outcome {
                    tracing::info!(
                        shift = %shift.id,
                        pair_code = %shift.pair_code,
                        locations = shift.locations.len(),
                        photos = shift.photos.len(),
                        notes = shift.notes.len(),
                        "Shift ended"
                    );
                    self.queue.wake();
                }
                Ok(outcome)
            }
            Err(error) => {
                *phase = previous;
                Err(error)
            }
        }
    }

    pub fn get_active(&self) -> Result<Option<Shift>> {
        self.store.read(RecordKey::ActiveShift)
    }

    /// Ended shifts, newest first.
    pub fn get_history(&self) -> Result<Vec<Shift>> {
        Ok(self.store.read(RecordKey::ShiftHistory)?.unwrap_or_default())
    }

    pub fn summary(&self, shift: &Shift) -> ShiftSummary {
        shift.summary(self.settings.jitter, now_millis())
    }

    fn publish_location(
        &self,
        txn: &mut StoreTxn<'_>,
        shift: &mut Shift,
        point: LocationPoint,
    ) -> Result<()> {
        if !geo::should_publish(shift.last_published.as_ref(), &point, self.settings.jitter) {
            return Ok(());
        }
        self.force_publish(txn, shift, point)
    }

    /// Queue `point` regardless of jitter. Used for the first and last
    /// points of a shift.
    fn force_publish(
        &self,
        txn: &mut StoreTxn<'_>,
        shift: &mut Shift,
        point: LocationPoint,
    ) -> Result<()> {
        sync::push_location(
            txn,
            &shift.pair_code,
            point.clone(),
            self.settings.location_batch_size,
        )?;
        shift.last_published = Some(point);
        Ok(())
    }

    fn lock_phase(&self) -> Result<MutexGuard<'_, ShiftState>> {
        self.phase
            .lock()
            .map_err(|_| Error::persistence("shift state lock poisoned"))
    }
}

fn record_note(txn: &mut StoreTxn<'_>, shift: &mut Shift, note: Note) -> Result<()> {
    shift.notes.push(note.clone());
    sync::push(
        txn,
        SyncPayload::Note {
            pair_code: shift.pair_code.clone(),
            note,
        },
    )?;
    Ok(())
}

/// Draw a pair code that no shift on this device has used.
fn fresh_pair_code(txn: &StoreTxn<'_>) -> Result<PairCode> {
    let history: Vec<Shift> = txn.read(RecordKey::ShiftHistory)?.unwrap_or_default();
    for _ in 0..PAIR_CODE_ATTEMPTS {
        let candidate = PairCode::generate();
        if !history.iter().any(|shift| shift.pair_code == candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::persistence("could not allocate an unused pair code"))
}
