//! Duration display model.
//!
//! Durations are stored as whole seconds and edited as a minutes:seconds pair
//! on two 0-59 pickers. Validation here is what keeps a countdown from ever
//! being started with zero seconds.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest value either picker column can show
pub const PICKER_MAX_VALUE: u32 = 59;

/// Split a duration into (minutes, seconds-remainder).
pub fn to_display(seconds: u32) -> (u32, u32) {
    (seconds / 60, seconds % 60)
}

/// Combine picker values into whole seconds.
///
/// Both values must already be within `0..=59`; use [`validate`] for raw input.
pub fn from_display(minutes: u32, seconds: u32) -> u32 {
    debug_assert!(minutes <= PICKER_MAX_VALUE && seconds <= PICKER_MAX_VALUE);
    minutes * 60 + seconds
}

/// Validate picker input, returning the total seconds.
///
/// Out-of-range parts are rejected before conversion; 00:00 fails with
/// [`Error::ZeroDuration`].
pub fn validate(minutes: u32, seconds: u32) -> Result<u32> {
    if minutes > PICKER_MAX_VALUE || seconds > PICKER_MAX_VALUE {
        return Err(Error::DurationOutOfRange { minutes, seconds });
    }
    if minutes == 0 && seconds == 0 {
        return Err(Error::ZeroDuration);
    }
    Ok(from_display(minutes, seconds))
}

/// Format seconds as zero-padded `mm:ss`. Minutes are never truncated.
pub fn format_mmss(seconds: u32) -> String {
    let (minutes, seconds) = to_display(seconds);
    format!("{minutes:02}:{seconds:02}")
}

/// Two-digit labels for a picker column ("00" through "59").
pub fn picker_labels() -> Vec<String> {
    (0..=PICKER_MAX_VALUE).map(|v| format!("{v:02}")).collect()
}

/// Which stored duration a displayable represents
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DurationKind {
    SetDuration,
    RestDuration,
    RepDuration,
}

impl DurationKind {
    pub fn label(&self) -> &'static str {
        match self {
            DurationKind::SetDuration => "set duration",
            DurationKind::RestDuration => "rest duration",
            DurationKind::RepDuration => "rep duration",
        }
    }

    /// Title shown on the editing dialog
    pub fn title(&self) -> &'static str {
        match self {
            DurationKind::SetDuration => "Set Duration",
            DurationKind::RestDuration => "Rest Duration",
            DurationKind::RepDuration => "Rep Duration",
        }
    }
}

/// A duration value together with what it represents
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DurationDisplayable {
    kind: DurationKind,
    seconds: u32,
}

impl DurationDisplayable {
    /// Wrap a duration read from an exercise definition.
    pub fn from_stored(kind: DurationKind, seconds: u32) -> Self {
        Self { kind, seconds }
    }

    /// Build from picker input, applying [`validate`].
    pub fn from_picker(kind: DurationKind, minutes: u32, seconds: u32) -> Result<Self> {
        let total = validate(minutes, seconds)?;
        Ok(Self {
            kind,
            seconds: total,
        })
    }

    pub fn kind(&self) -> DurationKind {
        self.kind
    }

    pub fn total_seconds(&self) -> u32 {
        self.seconds
    }

    pub fn minutes(&self) -> u32 {
        to_display(self.seconds).0
    }

    pub fn seconds_part(&self) -> u32 {
        to_display(self.seconds).1
    }

    pub fn display(&self) -> String {
        format_mmss(self.seconds)
    }

    pub fn title(&self) -> &'static str {
        self.kind.title()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_display_splits_minutes() {
        assert_eq!(to_display(0), (0, 0));
        assert_eq!(to_display(59), (0, 59));
        assert_eq!(to_display(60), (1, 0));
        assert_eq!(to_display(3599), (59, 59));
    }

    #[test]
    fn test_display_roundtrip_over_picker_range() {
        for m in 0..=PICKER_MAX_VALUE {
            for s in 0..=PICKER_MAX_VALUE {
                assert_eq!(to_display(from_display(m, s)), (m, s));
            }
        }
    }

    #[test]
    fn test_validate_zero_duration() {
        assert!(matches!(validate(0, 0), Err(Error::ZeroDuration)));
    }

    #[test]
    fn test_validate_accepts_any_nonzero_pair() {
        for m in 0..=PICKER_MAX_VALUE {
            for s in 0..=PICKER_MAX_VALUE {
                if m == 0 && s == 0 {
                    continue;
                }
                assert_eq!(validate(m, s).unwrap(), m * 60 + s);
            }
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(matches!(
            validate(60, 0),
            Err(Error::DurationOutOfRange { minutes: 60, seconds: 0 })
        ));
        assert!(matches!(
            validate(0, 75),
            Err(Error::DurationOutOfRange { .. })
        ));
    }

    #[test]
    fn test_format_mmss() {
        assert_eq!(format_mmss(0), "00:00");
        assert_eq!(format_mmss(5), "00:05");
        assert_eq!(format_mmss(90), "01:30");
        assert_eq!(format_mmss(3600), "60:00");
    }

    #[test]
    fn test_picker_labels() {
        let labels = picker_labels();
        assert_eq!(labels.len(), 60);
        assert_eq!(labels[0], "00");
        assert_eq!(labels[59], "59");
    }

    #[test]
    fn test_displayable_from_picker() {
        let d = DurationDisplayable::from_picker(DurationKind::RestDuration, 1, 15).unwrap();
        assert_eq!(d.total_seconds(), 75);
        assert_eq!(d.minutes(), 1);
        assert_eq!(d.seconds_part(), 15);
        assert_eq!(d.display(), "01:15");
        assert_eq!(d.title(), "Rest Duration");
        assert_eq!(d.kind().label(), "rest duration");
    }

    #[test]
    fn test_displayable_rejects_zero() {
        let err = DurationDisplayable::from_picker(DurationKind::SetDuration, 0, 0).unwrap_err();
        assert_eq!(err.message_key(), Some("error_zero_duration"));
    }
}
