//! Text-to-speech backends.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use knowledge_core::config::SpeechConfig;

use crate::error::SpeechError;
use crate::voice::Voice;

/// Text plus the voice settings to speak it with.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            rate: 1.0,
            pitch: 1.0,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Played to the end.
    Completed,
    /// Cancelled by a newer utterance or an explicit stop.
    Interrupted,
}

/// A platform speech synthesizer.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Voices the platform offers. Empty when none are installed.
    fn voices(&self) -> Vec<Voice>;

    /// Play `utterance`, returning early with `Interrupted` once `cancel` fires.
    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: CancellationToken,
    ) -> Result<SpeechOutcome, SpeechError>;
}

/// Pretends to speak by waiting a fixed time per word.
#[derive(Debug, Clone)]
pub struct SimulatedSynthesizer {
    voices: Vec<Voice>,
    per_word: Duration,
}

impl SimulatedSynthesizer {
    pub fn new(voices: Vec<Voice>, per_word: Duration) -> Self {
        Self { voices, per_word }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        let voices = vec![
            Voice::new("Alex", "en-US"),
            Voice::new("Samantha", "en-US"),
            Voice::new("Thomas", "fr-FR"),
        ];
        Self::new(voices, Duration::from_millis(config.ms_per_word))
    }

    /// Playback time for `utterance`, scaled by its rate.
    pub fn duration_for(&self, utterance: &Utterance) -> Duration {
        let base = self.per_word * utterance.word_count() as u32;
        if utterance.rate > 0.0 {
            base.div_f32(utterance.rate)
        } else {
            base
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for SimulatedSynthesizer {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: CancellationToken,
    ) -> Result<SpeechOutcome, SpeechError> {
        let duration = self.duration_for(utterance);
        tokio::select! {
            _ = cancel.cancelled() => Ok(SpeechOutcome::Interrupted),
            _ = tokio::time::sleep(duration) => Ok(SpeechOutcome::Completed),
        }
    }
}

/// Stands in when the platform has no speech synthesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedSynthesizer;

#[async_trait]
impl SpeechSynthesizer for UnsupportedSynthesizer {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    async fn speak(
        &self,
        _utterance: &Utterance,
        _cancel: CancellationToken,
    ) -> Result<SpeechOutcome, SpeechError> {
        Err(SpeechError::UnsupportedCapability("speech synthesis"))
    }
}
