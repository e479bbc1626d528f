//! Session-owned speech bridge.
//!
//! Starting a new utterance cancels the active one before playback begins.
//! Only one capture may run at a time; a second `listen` is refused rather
//! than queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use knowledge_core::config::SpeechConfig;
use knowledge_core::events::SpeechEvent;

use crate::error::SpeechError;
use crate::recognize::{ScriptedRecognizer, SpeechRecognizer, UnsupportedRecognizer};
use crate::synth::{
    SimulatedSynthesizer, SpeechOutcome, SpeechSynthesizer, UnsupportedSynthesizer, Utterance,
};
use crate::voice::VoicePreference;

const EVENT_CAPACITY: usize = 64;
const PREVIEW_CHARS: usize = 30;
const SIMULATED_CAPTURE_DELAY: Duration = Duration::from_millis(1200);

/// First 30 characters of a transcript, with `...` when it was longer.
pub fn transcript_preview(transcript: &str) -> String {
    let mut chars = transcript.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Occupant of the playback or capture slot.
#[derive(Debug)]
struct ActiveRequest {
    id: u64,
    cancel: CancellationToken,
}

type Slot = Mutex<Option<ActiveRequest>>;

/// Empties a slot when its request ends, unless a newer request has taken it.
struct SlotRelease<'a> {
    slot: &'a Slot,
    id: u64,
}

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|a| a.id == self.id) {
            *slot = None;
        }
    }
}

/// Speech output and capture for one session.
pub struct SpeechBridge {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    recognizer: Arc<dyn SpeechRecognizer>,
    preference: VoicePreference,
    rate: f32,
    pitch: f32,
    active: Slot,
    capture: Slot,
    next_request: AtomicU64,
    next_capture: AtomicU64,
    events: broadcast::Sender<SpeechEvent>,
}

impl std::fmt::Debug for SpeechBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechBridge")
            .field("synthesizer", &self.synthesizer.name())
            .field("recognizer", &self.recognizer.name())
            .field("preference", &self.preference)
            .finish()
    }
}

impl SpeechBridge {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn SpeechRecognizer>,
        config: &SpeechConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            synthesizer,
            recognizer,
            preference: VoicePreference::from_config(config),
            rate: config.rate,
            pitch: config.pitch,
            active: Mutex::new(None),
            capture: Mutex::new(None),
            next_request: AtomicU64::new(1),
            next_capture: AtomicU64::new(1),
            events,
        }
    }

    /// Build the backends described by `config`.
    ///
    /// Disabled speech, or capture without scripted transcripts, is backed by
    /// the unsupported stand-ins.
    pub fn from_config(config: &SpeechConfig) -> Self {
        let synthesizer: Arc<dyn SpeechSynthesizer> = if config.enabled {
            Arc::new(SimulatedSynthesizer::from_config(config))
        } else {
            Arc::new(UnsupportedSynthesizer)
        };
        let recognizer: Arc<dyn SpeechRecognizer> =
            if config.enabled && !config.simulated_transcripts.is_empty() {
                Arc::new(ScriptedRecognizer::with_transcripts(
                    SIMULATED_CAPTURE_DELAY,
                    config.simulated_transcripts.iter().cloned(),
                ))
            } else {
                Arc::new(UnsupportedRecognizer)
            };
        tracing::info!(
            synthesizer = synthesizer.name(),
            recognizer = recognizer.name(),
            "Speech bridge ready"
        );
        Self::new(synthesizer, recognizer, config)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.events.subscribe()
    }

    /// Speak `text`, cancelling whatever is currently playing first.
    ///
    /// Resolves when playback ends, either naturally or because it was cancelled.
    pub async fn speak(&self, text: &str) -> Result<SpeechOutcome, SpeechError> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        {
            let mut active = self.lock_active();
            if let Some(previous) = active.replace(ActiveRequest {
                id: request_id,
                cancel: cancel.clone(),
            }) {
                tracing::debug!(previous = previous.id, "Cancelling active speech");
                previous.cancel.cancel();
            }
        }
        let release = SlotRelease {
            slot: &self.active,
            id: request_id,
        };

        let voice = self.preference.select(&self.synthesizer.voices()).cloned();
        let utterance = Utterance {
            text: text.to_string(),
            voice,
            rate: self.rate,
            pitch: self.pitch,
        };

        self.publish(SpeechEvent::SpeechStarted {
            request_id,
            voice: utterance.voice.as_ref().map(|v| v.name.clone()),
        });
        self.notify("Speaking...");
        let result = self.synthesizer.speak(&utterance, cancel).await;
        drop(release);

        match result {
            Ok(SpeechOutcome::Completed) => {
                tracing::debug!(request_id, "Speech finished");
                self.publish(SpeechEvent::SpeechFinished { request_id });
                self.notify("Audio playback complete");
            }
            Ok(SpeechOutcome::Interrupted) => {
                tracing::debug!(request_id, "Speech interrupted");
                self.publish(SpeechEvent::SpeechInterrupted { request_id });
            }
            Err(ref e) => {
                tracing::warn!(request_id, error = %e, "Speech failed");
                self.publish(SpeechEvent::SpeechInterrupted { request_id });
                if let Some(message) = e.notice() {
                    self.notify(message);
                }
            }
        }
        result
    }

    /// Stop the active utterance. Returns whether anything was playing.
    pub fn cancel_speech(&self) -> bool {
        match self.lock_active().take() {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Capture one spoken query and return its transcript.
    pub async fn listen(&self) -> Result<String, SpeechError> {
        let capture_id = self.next_capture.fetch_add(1, Ordering::Relaxed);
        let cancel = {
            let mut capture = self.lock_capture();
            if capture.is_some() {
                return Err(SpeechError::CaptureInProgress);
            }
            let token = CancellationToken::new();
            *capture = Some(ActiveRequest {
                id: capture_id,
                cancel: token.clone(),
            });
            token
        };
        let release = SlotRelease {
            slot: &self.capture,
            id: capture_id,
        };

        self.publish(SpeechEvent::CaptureStarted);
        self.notify("Listening to your question...");

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(SpeechError::CaptureCancelled),
            r = self.recognizer.recognize(&self.preference.language) => r,
        };
        drop(release);

        let result = result.and_then(|t| {
            let t = t.trim().to_string();
            if t.is_empty() {
                Err(SpeechError::NoSpeechDetected)
            } else {
                Ok(t)
            }
        });

        match &result {
            Ok(transcript) => {
                tracing::info!(chars = transcript.chars().count(), "Speech captured");
                self.publish(SpeechEvent::CaptureFinished {
                    transcript: Some(transcript.clone()),
                });
                self.notify(format!("Transcribed: \"{}\"", transcript_preview(transcript)));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Speech capture ended without a transcript");
                self.publish(SpeechEvent::CaptureFinished { transcript: None });
                if let Some(message) = e.notice() {
                    self.notify(message);
                }
            }
        }
        result
    }

    /// Cancel the running capture, if any.
    pub fn stop_listening(&self) -> bool {
        match self.lock_capture().take() {
            Some(capture) => {
                capture.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.lock_capture().is_some()
    }

    fn notify(&self, message: impl Into<String>) {
        self.publish(SpeechEvent::Notice {
            message: message.into(),
        });
    }

    fn publish(&self, event: SpeechEvent) {
        let _ = self.events.send(event);
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRequest>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_capture(&self) -> MutexGuard<'_, Option<ActiveRequest>> {
        self.capture.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
