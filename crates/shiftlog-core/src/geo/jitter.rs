//! GPS jitter filtering.

use serde::{Deserialize, Serialize};

use super::{distance_meters, Position, Sample};

/// Thresholds deciding which samples represent real movement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JitterThresholds {
    /// Minimum distance from the last retained point, in metres.
    pub min_move_meters: f64,
    /// Samples with a worse accuracy radius than this are dropped.
    pub max_accuracy_meters: f64,
}

impl Default for JitterThresholds {
    fn default() -> Self {
        Self {
            min_move_meters: 5.0,
            max_accuracy_meters: 30.0,
        }
    }
}

/// Decide whether `candidate` is real movement relative to `last_retained`.
///
/// This is the incremental form of [`filter_jitter`]: callers that see points
/// one at a time keep the last accepted point and ask about the next one.
pub fn should_publish<L, C>(
    last_retained: Option<&L>,
    candidate: &C,
    thresholds: JitterThresholds,
) -> bool
where
    L: Position + ?Sized,
    C: Sample + ?Sized,
{
    // Written as a negated `<=` so a NaN accuracy is rejected too.
    if !(candidate.accuracy_meters() <= thresholds.max_accuracy_meters) {
        return false;
    }
    match last_retained {
        Some(last) => distance_meters(last, candidate) >= thresholds.min_move_meters,
        None => true,
    }
}

/// Drop samples that are too inaccurate or too close to the last retained one.
///
/// The first and last samples of a non-empty input are always kept so the
/// trail still starts and ends where the shift did.
pub fn filter_jitter<T: Sample + Clone>(points: &[T], thresholds: JitterThresholds) -> Vec<T> {
    let Some((first, rest)) = points.split_first() else {
        return Vec::new();
    };
    let mut kept = vec![first.clone()];
    let Some((last, interior)) = rest.split_last() else {
        return kept;
    };

    for point in interior {
        if should_publish(kept.last(), point, thresholds) {
            kept.push(point.clone());
        }
    }
    kept.push(last.clone());
    kept
}
