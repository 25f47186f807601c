//! Enumeration types for drafts, participants, and timers.
//!
//! Every enum serializes as `snake_case` so the same spelling is used on the
//! wire, in `PostgreSQL` text columns, and in `Dragonfly` cache values.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error returned when a stored string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The offending input.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Draft lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of a draft.
///
/// ```text
/// not_started -> starting -> active -> completed
///                              |
///                              +----> canceled
///                              +----> stalled
/// ```
///
/// `starting -> active` is time-delayed by the preparation countdown.
/// `stalled` is entered only when no legal item is left for a fallback pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DraftStatus {
    /// Created but not yet started.
    NotStarted,
    /// Preparation countdown running; no picks accepted yet.
    Starting,
    /// Turn timers running; picks accepted.
    Active,
    /// Every pick has been made.
    Completed,
    /// Administratively canceled.
    Canceled,
    /// A fallback pick found no item to select; the draft is frozen.
    Stalled,
}

impl DraftStatus {
    /// Stable text form used for storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Stalled => "stalled",
        }
    }

    /// Whether no further lifecycle transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    ///
    /// No transition skips a state. Cancellation is reachable from every
    /// non-terminal state; reset (back to `not_started`) is handled
    /// separately by the manager and is not a lifecycle transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Starting)
                | (Self::Starting, Self::Active)
                | (Self::Active, Self::Completed | Self::Stalled)
                | (
                    Self::NotStarted | Self::Starting | Self::Active | Self::Stalled,
                    Self::Canceled
                )
        )
    }
}

impl core::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for DraftStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "starting" => Ok(Self::Starting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "canceled" => Ok(Self::Canceled),
            "stalled" => Ok(Self::Stalled),
            other => Err(ParseEnumError {
                kind: "draft status",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// Whether a seat is occupied by a person or by a scripted bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ParticipantKind {
    /// A real participant who picks manually.
    #[default]
    Human,
    /// A simulated participant whose picks are always autopicks.
    Scripted,
}

impl ParticipantKind {
    /// Stable text form used for storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Scripted => "scripted",
        }
    }
}

impl core::str::FromStr for ParticipantKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Self::Human),
            "scripted" => Ok(Self::Scripted),
            other => Err(ParseEnumError {
                kind: "participant kind",
                value: other.to_owned(),
            }),
        }
    }
}

/// How the fallback selector chooses among eligible items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AutopickStrategy {
    /// Uniformly random over the eligible set.
    #[default]
    Random,
    /// First eligible entry of the participant's preference list, falling
    /// back to random when none of the preferences is eligible.
    PreferenceOrder,
    /// Eligible item with the lexicographically smallest name.
    Alphabetical,
}

impl AutopickStrategy {
    /// Stable text form used for storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::PreferenceOrder => "preference_order",
            Self::Alphabetical => "alphabetical",
        }
    }
}

impl core::str::FromStr for AutopickStrategy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "preference_order" => Ok(Self::PreferenceOrder),
            "alphabetical" => Ok(Self::Alphabetical),
            other => Err(ParseEnumError {
                kind: "autopick strategy",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// What a persisted countdown is counting down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TimerKind {
    /// The pre-draft countdown; no participant is owed a pick.
    Preparation,
    /// A participant's turn clock.
    Turn,
}

impl TimerKind {
    /// Stable text form used for storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preparation => "preparation",
            Self::Turn => "turn",
        }
    }
}

impl core::str::FromStr for TimerKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preparation" => Ok(Self::Preparation),
            "turn" => Ok(Self::Turn),
            other => Err(ParseEnumError {
                kind: "timer kind",
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_roundtrips() {
        for status in [
            DraftStatus::NotStarted,
            DraftStatus::Starting,
            DraftStatus::Active,
            DraftStatus::Completed,
            DraftStatus::Canceled,
            DraftStatus::Stalled,
        ] {
            assert_eq!(status.as_str().parse::<DraftStatus>(), Ok(status));
        }
    }

    #[test]
    fn lifecycle_never_skips_states() {
        assert!(DraftStatus::NotStarted.can_transition_to(DraftStatus::Starting));
        assert!(!DraftStatus::NotStarted.can_transition_to(DraftStatus::Active));
        assert!(!DraftStatus::Starting.can_transition_to(DraftStatus::Completed));
        assert!(DraftStatus::Active.can_transition_to(DraftStatus::Completed));
        assert!(DraftStatus::Active.can_transition_to(DraftStatus::Canceled));
        assert!(!DraftStatus::Completed.can_transition_to(DraftStatus::Canceled));
    }

    #[test]
    fn unknown_text_is_rejected() {
        let err = "paused".parse::<DraftStatus>();
        assert!(err.is_err());
        assert!("robot".parse::<ParticipantKind>().is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&DraftStatus::NotStarted).unwrap_or_default();
        assert_eq!(json, "\"not_started\"");
    }
}
