//! Input collection: the single validation point for user queries.
//!
//! Both typed text and speech transcripts pass through [`InputCollector`]
//! before anything reaches the conversation store.

use std::fmt;

use serde::Serialize;

use crate::error::ChatError;

/// A trimmed, non-empty query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    /// Trim `raw` and reject it if nothing is left.
    pub fn new(raw: &str) -> Result<Self, ChatError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ChatError::InvalidInput);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Query {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validates raw input from the form field or the speech recognizer.
#[derive(Debug, Clone)]
pub struct InputCollector {
    /// Maximum query length in characters, measured after trimming.
    pub max_chars: usize,
}

impl Default for InputCollector {
    fn default() -> Self {
        Self::new(2000)
    }
}

impl InputCollector {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Validate typed input.
    pub fn collect(&self, raw: &str) -> Result<Query, ChatError> {
        let query = Query::new(raw)?;
        if query.char_count() > self.max_chars {
            return Err(ChatError::MessageTooLong(self.max_chars));
        }
        Ok(query)
    }

    /// Validate a recognized speech transcript.
    pub fn from_transcript(&self, transcript: &str) -> Result<Query, ChatError> {
        let query = self.collect(transcript)?;
        tracing::debug!(chars = query.char_count(), "Transcript accepted as query");
        Ok(query)
    }
}
