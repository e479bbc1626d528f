//! Keyword-table resolver with canned fallbacks.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use crate::error::{ChatError, ResolveError};
use crate::input::Query;
use crate::resolver::{FallbackPicker, Latency, RandomPicker, ResponseResolver};

/// Keyword -> answer pairs, scanned in this order.
pub const DEMO_RESPONSES: [(&str, &str); 5] = [
    (
        "hello",
        "Hello! I'm Knowledge, your learning companion. I'm designed to help you discover and understand new information. What would you like to learn about today?",
    ),
    (
        "who are you",
        "I'm Knowledge, an intelligent assistant designed to make learning enjoyable and accessible. I can answer questions, explain concepts, and even read information aloud with a natural-sounding voice.",
    ),
    (
        "what can you do",
        "I can help you learn about virtually any topic, provide explanations in a clear, conversational way, and even read my responses aloud so you can listen while multitasking. Think of me as your personal learning companion.",
    ),
    (
        "help",
        "I'm here to assist with your learning journey. You can ask me questions on any topic, request explanations of complex concepts, or have me read information aloud. Just type your question, and I'll help you explore.",
    ),
    (
        "thanks",
        "You're welcome! It's my pleasure to help you learn. If you have more questions or want to explore other topics, I'm here for you.",
    ),
];

/// Answers used when no keyword matches.
pub const DEMO_FALLBACKS: [&str; 5] = [
    "That's an excellent question. In the full version, I would connect to a knowledge database to provide you with a detailed and accurate answer.",
    "I'd love to help with that question. In this demo, I can respond to basic inquiries, but the complete version would offer an in-depth exploration of this topic.",
    "Great question! The full version of Knowledge would provide you with a comprehensive answer backed by reliable sources.",
    "I understand you're curious about this topic. While this is a demo with limited responses, the complete Knowledge experience would deliver thorough answers to questions like yours.",
    "Thanks for your question. In the full implementation, I would analyze various trusted sources to give you a well-rounded answer on this subject.",
];

static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,/#!$%^&*;:{}=\-_`~()]").unwrap());

/// Lowercase `query` and strip the punctuation set `. , / # ! $ % ^ & * ; : { } = - _ ` ~ ( )`.
///
/// Other characters, including `?` and apostrophes, are kept.
pub fn normalize(query: &str) -> String {
    PUNCTUATION_RE
        .replace_all(&query.to_lowercase(), "")
        .into_owned()
}

/// Resolves by substring match against a keyword table.
///
/// The first keyword (in table order) contained in the normalized query wins.
/// With no match, a fallback is chosen by the configured [`FallbackPicker`].
/// This resolver never fails.
pub struct KeywordResolver {
    table: Vec<(String, String)>,
    fallbacks: Vec<String>,
    picker: Arc<dyn FallbackPicker>,
    latency: Latency,
}

impl std::fmt::Debug for KeywordResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordResolver")
            .field("keywords", &self.table.len())
            .field("fallbacks", &self.fallbacks.len())
            .field("latency", &self.latency)
            .finish()
    }
}

impl KeywordResolver {
    /// Build a resolver from a keyword table and fallback list.
    ///
    /// Keywords are kept as given and matched against the normalized query,
    /// so they should be lowercase and free of the stripped punctuation. An
    /// empty keyword matches every query. Fails if there are no fallbacks.
    pub fn new<K, A, F>(
        table: impl IntoIterator<Item = (K, A)>,
        fallbacks: impl IntoIterator<Item = F>,
    ) -> Result<Self, ChatError>
    where
        K: AsRef<str>,
        A: Into<String>,
        F: Into<String>,
    {
        let table: Vec<(String, String)> = table
            .into_iter()
            .map(|(k, a)| (k.as_ref().to_string(), a.into()))
            .collect();
        let fallbacks: Vec<String> = fallbacks.into_iter().map(Into::into).collect();
        if fallbacks.is_empty() {
            return Err(ChatError::Config(
                "keyword resolver needs at least one fallback answer".to_string(),
            ));
        }
        Ok(Self {
            table,
            fallbacks,
            picker: Arc::new(RandomPicker),
            latency: Latency::none(),
        })
    }

    /// The demo table and fallbacks with the default simulated latency.
    pub fn demo() -> Self {
        Self {
            table: DEMO_RESPONSES
                .iter()
                .map(|(k, a)| (k.to_string(), a.to_string()))
                .collect(),
            fallbacks: DEMO_FALLBACKS.iter().map(|s| s.to_string()).collect(),
            picker: Arc::new(RandomPicker),
            latency: Latency::default(),
        }
    }

    pub fn with_picker(mut self, picker: impl FallbackPicker + 'static) -> Self {
        self.picker = Arc::new(picker);
        self
    }

    pub fn with_latency(mut self, latency: Latency) -> Self {
        self.latency = latency;
        self
    }

    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    /// The answer for `query`, without any delay.
    pub fn lookup(&self, query: &str) -> &str {
        let normalized = normalize(query);
        if let Some((keyword, answer)) = self
            .table
            .iter()
            .find(|(keyword, _)| normalized.contains(keyword.as_str()))
        {
            tracing::debug!(keyword = %keyword, "Keyword matched");
            return answer;
        }
        let index = self.picker.pick(self.fallbacks.len());
        tracing::debug!(index, "No keyword matched, using fallback");
        &self.fallbacks[index.min(self.fallbacks.len() - 1)]
    }
}

#[async_trait]
impl ResponseResolver for KeywordResolver {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn resolve(&self, query: &Query) -> Result<String, ResolveError> {
        if !self.latency.is_zero() {
            let delay = self.latency.sample();
            tracing::trace!(delay_ms = delay.as_millis() as u64, "Simulating latency");
            tokio::time::sleep(delay).await;
        }
        Ok(self.lookup(query.as_str()).to_string())
    }
}
