//! Error types for the conversational core.

use std::time::Duration;

use knowledge_core::error::KnowledgeError;
use knowledge_core::types::{ErrorKind, TurnId};

use crate::turn::TurnStatus;

/// Errors from the conversation store and session controller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("query cannot be empty")]
    InvalidInput,
    #[error("query exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("turn not found: {0}")]
    TurnNotFound(TurnId),
    #[error("turn {turn_id} cannot move from {from} to {to}")]
    InvalidState {
        turn_id: TurnId,
        from: TurnStatus,
        to: TurnStatus,
    },
    #[error("a previous question is still being answered")]
    Busy,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::InvalidInput | ChatError::MessageTooLong(_) => ErrorKind::InvalidInput,
            ChatError::TurnNotFound(_)
            | ChatError::InvalidState { .. }
            | ChatError::Busy => ErrorKind::InvalidState,
            ChatError::Config(_) | ChatError::Io(_) => ErrorKind::Configuration,
        }
    }
}

impl From<KnowledgeError> for ChatError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::Io(e) => ChatError::Io(e.to_string()),
            other => ChatError::Config(other.to_string()),
        }
    }
}

impl From<ChatError> for KnowledgeError {
    fn from(err: ChatError) -> Self {
        KnowledgeError::Chat(err.to_string())
    }
}

/// Failures on the resolver's error channel.
///
/// Kept apart from the answer channel: a resolver returns `Ok(answer)` or one
/// of these, never an error string dressed up as an answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("service returned {status}: {detail}")]
    Service { status: u16, detail: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ResolutionFailure
    }
}
