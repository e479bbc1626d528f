//! Speech-to-text backends.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SpeechError;

/// A platform speech recognizer producing one transcript per capture.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Capture a single utterance in `language` and return its transcript.
    async fn recognize(&self, language: &str) -> Result<String, SpeechError>;
}

/// Replays queued outcomes, one per capture.
///
/// Once the queue is empty every capture reports that no speech was heard.
#[derive(Debug)]
pub struct ScriptedRecognizer {
    outcomes: Mutex<VecDeque<Result<String, SpeechError>>>,
    delay: Duration,
}

impl ScriptedRecognizer {
    pub fn new(delay: Duration) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            delay,
        }
    }

    /// Queue each transcript in order.
    pub fn with_transcripts<I, S>(delay: Duration, transcripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let recognizer = Self::new(delay);
        for t in transcripts {
            recognizer.push(Ok(t.into()));
        }
        recognizer
    }

    pub fn push(&self, outcome: Result<String, SpeechError>) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    pub fn remaining(&self) -> usize {
        self.outcomes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn recognize(&self, language: &str) -> Result<String, SpeechError> {
        tracing::debug!(language, "Listening");
        tokio::time::sleep(self.delay).await;
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Err(SpeechError::NoSpeechDetected))
    }
}

/// Stands in when the platform has no speech recognition.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedRecognizer;

#[async_trait]
impl SpeechRecognizer for UnsupportedRecognizer {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    async fn recognize(&self, _language: &str) -> Result<String, SpeechError> {
        Err(SpeechError::UnsupportedCapability("speech recognition"))
    }
}
