//! Voice descriptions and preference-ordered selection.

use knowledge_core::config::SpeechConfig;

/// A synthesis voice offered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP 47 language tag, e.g. `en-US`.
    pub language: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
        }
    }
}

/// Which voice to use when several are available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePreference {
    /// Name fragments, most preferred first. Matched case-insensitively.
    pub name_fragments: Vec<String>,
    pub language: String,
}

impl VoicePreference {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            name_fragments: config.preferred_voices.clone(),
            language: config.language.clone(),
        }
    }

    /// Pick a voice: by name fragment in preference order, then by language,
    /// then the first one offered.
    pub fn select<'a>(&self, voices: &'a [Voice]) -> Option<&'a Voice> {
        self.name_fragments
            .iter()
            .find_map(|fragment| {
                let fragment = fragment.to_lowercase();
                voices
                    .iter()
                    .find(|v| v.name.to_lowercase().contains(&fragment))
            })
            .or_else(|| voices.iter().find(|v| v.language == self.language))
            .or_else(|| voices.first())
    }
}
