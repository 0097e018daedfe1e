//! Per-set decisions for an exercise definition.
//!
//! Timed sets run on a countdown; rep and reaction sets wait for an explicit
//! "set complete" signal. Rest phases sit between sets, never after the last.

use crate::{Error, ExerciseDefinition, ExerciseKind, Result};

/// Whether active sets of this exercise end on a countdown.
pub fn is_timer_driven(definition: &ExerciseDefinition) -> bool {
    matches!(definition.kind, ExerciseKind::TimedSets { .. })
}

/// Countdown length of an active set, or None for manual sets.
pub fn active_duration(definition: &ExerciseDefinition) -> Option<u32> {
    match definition.kind {
        ExerciseKind::TimedSets {
            set_duration_seconds,
        } => Some(set_duration_seconds),
        ExerciseKind::Reps { .. } | ExerciseKind::Reaction { .. } => None,
    }
}

/// Rest that follows `set_index`, or None after the last set or when rest is 0.
pub fn rest_after(definition: &ExerciseDefinition, set_index: u32) -> Result<Option<u32>> {
    check_set_index(definition, set_index)?;

    if set_index + 1 == definition.sets || definition.rest_duration_seconds == 0 {
        return Ok(None);
    }
    Ok(Some(definition.rest_duration_seconds))
}

/// Fail with [`Error::InvalidSetIndex`] unless `set_index < sets`.
pub fn check_set_index(definition: &ExerciseDefinition, set_index: u32) -> Result<()> {
    if set_index >= definition.sets {
        return Err(Error::InvalidSetIndex {
            index: set_index,
            total: definition.sets,
        });
    }
    Ok(())
}
