//! Speech input and output for Knowledge.
//!
//! [`SpeechBridge`] owns one synthesizer and one recognizer for a session and
//! enforces at most one active utterance and at most one active capture.

pub mod bridge;
pub mod error;
pub mod recognize;
pub mod synth;
pub mod voice;

pub use bridge::{transcript_preview, SpeechBridge};
pub use error::SpeechError;
pub use recognize::{ScriptedRecognizer, SpeechRecognizer, UnsupportedRecognizer};
pub use synth::{
    SimulatedSynthesizer, SpeechOutcome, SpeechSynthesizer, UnsupportedSynthesizer, Utterance,
};
pub use voice::{Voice, VoicePreference};
