use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{KnowledgeError, Result};
use crate::types::SubmissionPolicy;

/// Top-level configuration for the Knowledge application.
///
/// Loaded from `~/.knowledge/config.toml` by default. Each section corresponds
/// to one subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

impl KnowledgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: KnowledgeConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.chat.max_query_chars == 0 {
            return Err(KnowledgeError::Config(
                "chat.max_query_chars must be greater than 0".to_string(),
            ));
        }
        if self.chat.event_capacity == 0 {
            return Err(KnowledgeError::Config(
                "chat.event_capacity must be greater than 0".to_string(),
            ));
        }
        if self.resolver.min_latency_ms > self.resolver.max_latency_ms {
            return Err(KnowledgeError::Config(format!(
                "resolver.min_latency_ms ({}) exceeds resolver.max_latency_ms ({})",
                self.resolver.min_latency_ms, self.resolver.max_latency_ms
            )));
        }
        if self.resolver.backend == ResolverBackend::Http
            && self.resolver.endpoint.trim().is_empty()
        {
            return Err(KnowledgeError::Config(
                "resolver.endpoint is required for the http backend".to_string(),
            ));
        }
        if self.resolver.timeout_secs == 0 {
            return Err(KnowledgeError::Config(
                "resolver.timeout_secs must be greater than 0".to_string(),
            ));
        }
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.speech.rate) || !positive(self.speech.pitch) {
            return Err(KnowledgeError::Config(
                "speech.rate and speech.pitch must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum query length in characters, after trimming.
    pub max_query_chars: usize,
    /// Whether submissions may overlap an unresolved turn.
    pub submission_policy: SubmissionPolicy,
    /// Shown in place of an answer when the first resolution fails.
    pub failure_message: String,
    /// Shown in place of an answer when a regeneration fails.
    pub regenerate_failure_message: String,
    /// Buffer size of the change-notification channel.
    pub event_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_query_chars: 2000,
            submission_policy: SubmissionPolicy::Concurrent,
            failure_message: "I'm having trouble connecting right now. Please try again later."
                .to_string(),
            regenerate_failure_message:
                "I'm having trouble regenerating a response. Please try again.".to_string(),
            event_capacity: 256,
        }
    }
}

impl ChatConfig {
    /// Text shown in place of a failed answer.
    pub fn failure_message_for(&self, regeneration: bool) -> &str {
        if regeneration {
            &self.regenerate_failure_message
        } else {
            &self.failure_message
        }
    }
}

/// Which response resolver backs the conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverBackend {
    /// Local keyword table with canned fallbacks.
    #[default]
    Demo,
    /// JSON over HTTP to an answering service.
    Http,
}

/// Response resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub backend: ResolverBackend,
    /// Lower bound of the demo resolver's simulated latency.
    pub min_latency_ms: u64,
    /// Upper bound of the demo resolver's simulated latency.
    pub max_latency_ms: u64,
    /// Answering service URL for the http backend.
    pub endpoint: String,
    /// Request timeout for the http backend.
    pub timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            backend: ResolverBackend::Demo,
            min_latency_ms: 600,
            max_latency_ms: 1400,
            endpoint: "http://127.0.0.1:8000/api/ask".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Text-to-speech and speech-to-text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether speech synthesis and capture are offered at all.
    pub enabled: bool,
    /// BCP 47 language tag used for voice fallback and recognition.
    pub language: String,
    /// Voice name fragments, most preferred first (case-insensitive substring).
    pub preferred_voices: Vec<String>,
    pub rate: f32,
    pub pitch: f32,
    /// Simulated playback time per word.
    pub ms_per_word: u64,
    /// Transcripts returned in order by the simulated recognizer.
    /// Empty means speech capture is unavailable.
    pub simulated_transcripts: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en-US".to_string(),
            preferred_voices: vec![
                "Samantha".to_string(),
                "Daniel".to_string(),
                "Google US English".to_string(),
                "Microsoft Zira".to_string(),
            ],
            rate: 1.0,
            pitch: 1.0,
            ms_per_word: 250,
            simulated_transcripts: vec![],
        }
    }
}
