//! Turn lifecycle state machine.
//!
//! Enforces the allowed transitions for a question/answer exchange:
//! - Pending -> Resolved (answer arrived)
//! - Pending -> Failed (resolver failed)
//! - Resolved -> Pending (regenerate)
//! - Failed -> Pending (regenerate)

use std::fmt;

use serde::{Deserialize, Serialize};

use knowledge_core::config::ChatConfig;
use knowledge_core::types::{ErrorKind, Timestamp, TurnId};

use crate::error::ChatError;
use crate::input::Query;

/// Resolution status of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Waiting for the resolver.
    Pending,
    /// Answer available.
    Resolved,
    /// The resolver failed; retry via regenerate.
    Failed,
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnStatus::Pending => write!(f, "pending"),
            TurnStatus::Resolved => write!(f, "resolved"),
            TurnStatus::Failed => write!(f, "failed"),
        }
    }
}

impl TurnStatus {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &TurnStatus) -> bool {
        matches!(
            (self, target),
            (TurnStatus::Pending, TurnStatus::Resolved)
                | (TurnStatus::Pending, TurnStatus::Failed)
                // Regenerate
                | (TurnStatus::Resolved, TurnStatus::Pending)
                | (TurnStatus::Failed, TurnStatus::Pending)
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnStatus::Pending)
    }
}

/// Validate that a status transition is allowed for the given turn.
pub fn validate_transition(
    turn_id: TurnId,
    from: TurnStatus,
    to: TurnStatus,
) -> Result<(), ChatError> {
    if from.can_transition_to(&to) {
        Ok(())
    } else {
        Err(ChatError::InvalidState { turn_id, from, to })
    }
}

/// Why a turn ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnFailure {
    pub kind: ErrorKind,
    /// Diagnostic detail for logs. Not shown to the user.
    pub detail: String,
}

impl TurnFailure {
    pub fn resolution(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ResolutionFailure,
            detail: detail.into(),
        }
    }
}

/// One question/answer exchange.
///
/// Fields are read-only outside this crate; all mutation goes through
/// [`crate::store::ConversationStore`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    id: TurnId,
    query: Query,
    status: TurnStatus,
    answer: Option<String>,
    error: Option<TurnFailure>,
    created_at: Timestamp,
    attempt: u64,
}

impl Turn {
    pub(crate) fn new(query: Query) -> Self {
        Self {
            id: TurnId::new(),
            query,
            status: TurnStatus::Pending,
            answer: None,
            error: None,
            created_at: Timestamp::now(),
            attempt: 1,
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn status(&self) -> TurnStatus {
        self.status
    }

    /// Present only while `Resolved`.
    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    /// Present only while `Failed`.
    pub fn error(&self) -> Option<&TurnFailure> {
        self.error.as_ref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Resolution attempt counter, 1 for the initial resolution.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn is_regeneration(&self) -> bool {
        self.attempt > 1
    }

    /// The configured failure text for this turn's current attempt.
    pub fn failure_message<'a>(&self, config: &'a ChatConfig) -> &'a str {
        config.failure_message_for(self.is_regeneration())
    }

    pub(crate) fn resolve(&mut self, answer: String) -> Result<(), ChatError> {
        validate_transition(self.id, self.status, TurnStatus::Resolved)?;
        self.status = TurnStatus::Resolved;
        self.answer = Some(answer);
        self.error = None;
        Ok(())
    }

    pub(crate) fn fail(&mut self, failure: TurnFailure) -> Result<(), ChatError> {
        validate_transition(self.id, self.status, TurnStatus::Failed)?;
        self.status = TurnStatus::Failed;
        self.answer = None;
        self.error = Some(failure);
        Ok(())
    }

    /// Start a new resolution attempt.
    ///
    /// From `Resolved`/`Failed` this is the regenerate transition. A `Pending`
    /// turn keeps its status and only the attempt advances, which supersedes
    /// the outstanding resolution.
    pub(crate) fn begin_new_attempt(&mut self) -> u64 {
        if self.status.is_terminal() {
            tracing::debug!(turn_id = %self.id, from = %self.status, "Turn regenerated");
        } else {
            tracing::debug!(
                turn_id = %self.id,
                attempt = self.attempt,
                "Outstanding attempt superseded"
            );
        }
        self.status = TurnStatus::Pending;
        self.answer = None;
        self.error = None;
        self.attempt += 1;
        self.attempt
    }
}
