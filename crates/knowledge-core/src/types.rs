use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque identifier of a conversational turn, assigned at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock instant a turn was submitted.
///
/// Millisecond precision so that turns submitted in quick succession stay
/// distinguishable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Error taxonomy shared by every subsystem.
///
/// Concrete error types expose `kind()` so callers can branch on the category
/// without matching every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty or whitespace-only query.
    InvalidInput,
    /// Operation not permitted in the turn's current state.
    InvalidState,
    /// The response resolver's underlying call failed.
    ResolutionFailure,
    /// The platform speech API is unavailable.
    UnsupportedCapability,
    /// Speech capture finished without any words.
    NoSpeechDetected,
    /// Speech capture failed.
    RecognitionError,
    /// Setup failed: invalid settings or an unreadable file.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::ResolutionFailure => "resolution_failure",
            ErrorKind::UnsupportedCapability => "unsupported_capability",
            ErrorKind::NoSpeechDetected => "no_speech_detected",
            ErrorKind::RecognitionError => "recognition_error",
            ErrorKind::Configuration => "configuration",
        };
        write!(f, "{}", s)
    }
}

/// Whether a new query may be submitted while another is still resolving.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPolicy {
    /// Submissions never block; each turn resolves independently.
    #[default]
    Concurrent,
    /// At most one pending turn; submission is refused until it settles.
    SingleFlight,
}
