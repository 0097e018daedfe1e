//! Core domain types for Splitstep.
//!
//! This module defines the fundamental types used throughout the system:
//! - Exercise definitions and their per-subtype parameters
//! - Session phases
//! - Events emitted to the presentation layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Exercise Types
// ============================================================================

/// Drill subtype of an exercise
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseSubType {
    Reps,
    TimedSets,
    Reaction,
}

impl fmt::Display for ExerciseSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExerciseSubType::Reps => "Reps",
            ExerciseSubType::TimedSets => "Timed sets",
            ExerciseSubType::Reaction => "Reaction",
        };
        f.write_str(name)
    }
}

/// Subtype-specific parameters. Each variant carries only its own fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExerciseKind {
    /// Rep-counted sets, advanced manually
    Reps { reps: u32 },
    /// Time-boxed sets driven by a countdown
    TimedSets { set_duration_seconds: u32 },
    /// Cone reaction drill, advanced manually
    Reaction {
        reps: u32,
        cones: u32,
        rep_duration_seconds: u32,
    },
}

impl ExerciseKind {
    pub fn sub_type(&self) -> ExerciseSubType {
        match self {
            ExerciseKind::Reps { .. } => ExerciseSubType::Reps,
            ExerciseKind::TimedSets { .. } => ExerciseSubType::TimedSets,
            ExerciseKind::Reaction { .. } => ExerciseSubType::Reaction,
        }
    }
}

/// An exercise definition, read-only for the duration of a session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub favorite: bool,
    pub sets: u32,
    /// Rest between sets; 0 means no rest phase
    #[serde(default)]
    pub rest_duration_seconds: u32,
    pub kind: ExerciseKind,
}

impl ExerciseDefinition {
    pub fn sub_type(&self) -> ExerciseSubType {
        self.kind.sub_type()
    }

    /// List every invariant this definition breaks.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.id.is_empty() {
            problems.push("Exercise has empty ID".to_string());
        }
        if self.name.is_empty() {
            problems.push(format!("Exercise '{}' has empty name", self.id));
        }
        if self.sets == 0 {
            problems.push(format!("Exercise '{}' must have at least one set", self.id));
        }

        match self.kind {
            ExerciseKind::Reps { reps } if reps == 0 => {
                problems.push(format!("Exercise '{}' has a rep target of 0", self.id));
            }
            ExerciseKind::TimedSets {
                set_duration_seconds,
            } if set_duration_seconds == 0 => {
                problems.push(format!("Exercise '{}' has a set duration of 0", self.id));
            }
            ExerciseKind::Reaction {
                reps,
                cones,
                rep_duration_seconds,
            } => {
                if reps == 0 {
                    problems.push(format!("Exercise '{}' has a rep target of 0", self.id));
                }
                if cones == 0 {
                    problems.push(format!("Exercise '{}' has no cones", self.id));
                }
                if rep_duration_seconds == 0 {
                    problems.push(format!("Exercise '{}' has a rep duration of 0", self.id));
                }
            }
            _ => {}
        }

        problems
    }

    /// Fail with [`crate::Error::InvalidDefinition`] if any invariant is broken.
    pub fn validate(&self) -> crate::Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::InvalidDefinition(problems.join("; ")))
        }
    }
}

// ============================================================================
// Session Types
// ============================================================================

/// Phase of a running session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase", content = "set_index", rename_all = "snake_case")]
pub enum Phase {
    ActiveSet(u32),
    RestingAfter(u32),
    Done,
}

impl Phase {
    /// Set index the phase belongs to (None once done)
    pub fn set_index(&self) -> Option<u32> {
        match self {
            Phase::ActiveSet(i) | Phase::RestingAfter(i) => Some(*i),
            Phase::Done => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::ActiveSet(i) => write!(f, "Set {}", i + 1),
            Phase::RestingAfter(i) => write!(f, "Rest after set {}", i + 1),
            Phase::Done => f.write_str("Done"),
        }
    }
}

/// Summary handed to the presentation layer when a session completes
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub exercise_id: String,
    pub sets_completed: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Single-line JSON rendering for scripts consuming the CLI.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Notification emitted by a session, in order
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// A new phase started (set_index is None for Done)
    PhaseChanged { phase: Phase, set_index: Option<u32> },
    /// One countdown tick during a timer-driven phase
    Remaining {
        phase: Phase,
        seconds: u32,
        /// Full length of the phase's countdown, for progress rendering
        total_seconds: u32,
        display: String,
    },
    /// The session reached Done
    Completed(SessionSummary),
}

// ============================================================================
// Library Type
// ============================================================================

/// Read-only collection of exercise definitions keyed by id
#[derive(Clone, Debug, Default)]
pub struct ExerciseLibrary {
    pub exercises: HashMap<String, ExerciseDefinition>,
}
