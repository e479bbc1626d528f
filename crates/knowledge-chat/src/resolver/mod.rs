//! Response resolvers: turn a query into an answer, asynchronously.
//!
//! The [`ResponseResolver`] trait is the seam where a real answering
//! service plugs in. Two implementations ship here:
//! - [`KeywordResolver`]: local keyword table with canned fallbacks and
//!   simulated latency.
//! - [`HttpResolver`]: JSON over HTTP (`{"query"}` in, `{"answer"}` out).
//!
//! [`ScriptedResolver`] replays canned outcomes for tests.

mod http;
mod keyword;
mod scripted;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use knowledge_core::config::{ResolverBackend, ResolverConfig};

use crate::error::{ChatError, ResolveError};
use crate::input::Query;

pub use http::HttpResolver;
pub use keyword::{normalize, KeywordResolver, DEMO_FALLBACKS, DEMO_RESPONSES};
pub use scripted::ScriptedResolver;

/// Produces an answer for a query.
///
/// Implementations must not report failures through the answer string;
/// timeouts and service errors go to the `Err` channel.
#[async_trait]
pub trait ResponseResolver: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn resolve(&self, query: &Query) -> Result<String, ResolveError>;
}

// =============================================================================
// Fallback selection
// =============================================================================

/// Strategy for choosing one of `len` fallback answers.
pub trait FallbackPicker: Send + Sync {
    /// Return an index in `0..len`. `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Uniformly random choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPicker;

impl FallbackPicker for RandomPicker {
    fn pick(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Always the same index, clamped to the list. For deterministic tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPicker(pub usize);

impl FallbackPicker for FixedPicker {
    fn pick(&self, len: usize) -> usize {
        self.0.min(len.saturating_sub(1))
    }
}

// =============================================================================
// Simulated latency
// =============================================================================

/// Uniform latency range applied before a simulated answer is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    pub min: Duration,
    pub max: Duration,
}

impl Latency {
    /// `min` and `max` are swapped if given in the wrong order.
    pub fn between(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.max.is_zero()
    }

    /// Draw a delay uniformly from the range, at millisecond resolution.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

impl Default for Latency {
    fn default() -> Self {
        Self::between(Duration::from_millis(600), Duration::from_millis(1400))
    }
}

/// Build the resolver selected by configuration.
pub fn build_resolver(config: &ResolverConfig) -> Result<Arc<dyn ResponseResolver>, ChatError> {
    let resolver: Arc<dyn ResponseResolver> = match config.backend {
        ResolverBackend::Demo => {
            let latency = Latency::between(
                Duration::from_millis(config.min_latency_ms),
                Duration::from_millis(config.max_latency_ms),
            );
            Arc::new(KeywordResolver::demo().with_latency(latency))
        }
        ResolverBackend::Http => Arc::new(HttpResolver::new(
            &config.endpoint,
            Duration::from_secs(config.timeout_secs),
        )?),
    };
    tracing::info!(resolver = resolver.name(), "Response resolver ready");
    Ok(resolver)
}
