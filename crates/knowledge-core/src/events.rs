use serde::{Deserialize, Serialize};

use crate::types::{ErrorKind, Timestamp, TurnId};

/// Change notifications published by the conversation store.
///
/// Consumed by the rendering layer to project the session into UI elements.
/// Events carry identifiers only; subscribers read the current turn state
/// from the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConversationEvent {
    /// A new pending turn was appended to the session.
    TurnAppended {
        turn_id: TurnId,
        index: usize,
        timestamp: Timestamp,
    },

    /// A pending turn received its answer.
    TurnResolved { turn_id: TurnId, attempt: u64 },

    /// A pending turn's resolution failed.
    TurnFailed {
        turn_id: TurnId,
        attempt: u64,
        kind: ErrorKind,
    },

    /// A turn was reset to pending for a fresh resolution attempt.
    TurnRegenerated { turn_id: TurnId, attempt: u64 },

    /// A resolution for a superseded attempt arrived and was dropped.
    StaleResolutionDiscarded {
        turn_id: TurnId,
        stale_attempt: u64,
        current_attempt: u64,
    },

    /// Every turn in the session was removed.
    SessionCleared { removed: usize },
}

impl ConversationEvent {
    /// The turn this event refers to, if any.
    pub fn turn_id(&self) -> Option<TurnId> {
        match self {
            ConversationEvent::TurnAppended { turn_id, .. }
            | ConversationEvent::TurnResolved { turn_id, .. }
            | ConversationEvent::TurnFailed { turn_id, .. }
            | ConversationEvent::TurnRegenerated { turn_id, .. }
            | ConversationEvent::StaleResolutionDiscarded { turn_id, .. } => Some(*turn_id),
            ConversationEvent::SessionCleared { .. } => None,
        }
    }
}

/// Notifications published by the speech bridge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SpeechEvent {
    /// Playback of an utterance began.
    SpeechStarted { request_id: u64, voice: Option<String> },

    /// Playback ran to completion.
    SpeechFinished { request_id: u64 },

    /// Playback was cancelled before it finished.
    SpeechInterrupted { request_id: u64 },

    /// Speech capture began listening.
    CaptureStarted,

    /// Speech capture ended, with or without a transcript.
    CaptureFinished { transcript: Option<String> },

    /// Transient user-facing notification text.
    Notice { message: String },
}
