#![forbid(unsafe_code)]

//! Core domain model and session engine for Splitstep.
//!
//! This crate provides:
//! - Exercise definitions (reps, timed sets, reaction drills)
//! - Duration display and validation
//! - Countdown timer engine
//! - Set sequencing and the session state machine
//! - Built-in exercise library and configuration

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod duration;
pub mod timer;
pub mod sequencer;
pub mod session;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_library, get_default_library};
pub use config::Config;
pub use duration::{format_mmss, DurationDisplayable, DurationKind};
pub use timer::{Countdown, CountdownReceiver, TimerEvent, TimerHandle};
pub use session::{Session, SessionState, SessionStatus};
