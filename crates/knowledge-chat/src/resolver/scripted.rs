//! Scripted resolver for tests and demos.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ResolveError;
use crate::input::Query;
use crate::resolver::ResponseResolver;

#[derive(Debug, Clone)]
struct Step {
    delay: Duration,
    outcome: Result<String, ResolveError>,
}

/// Replays per-query outcomes with fixed delays.
///
/// Each query has a queue of steps consumed one per call; the last step
/// repeats once the queue is down to it. Unscripted queries fail with a
/// 404 service error.
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer for `query`, delivered after `delay`.
    pub fn answer(self, query: &str, delay: Duration, answer: &str) -> Self {
        self.push(query, delay, Ok(answer.to_string()))
    }

    /// Queue a failure for `query`, delivered after `delay`.
    pub fn fail(self, query: &str, delay: Duration, err: ResolveError) -> Self {
        self.push(query, delay, Err(err))
    }

    /// Total number of `resolve` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(self, query: &str, delay: Duration, outcome: Result<String, ResolveError>) -> Self {
        {
            let mut scripts = self
                .scripts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            scripts
                .entry(query.to_string())
                .or_default()
                .push_back(Step { delay, outcome });
        }
        self
    }

    fn next_step(&self, query: &str) -> Option<Step> {
        let mut scripts = self
            .scripts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let queue = scripts.get_mut(query)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl ResponseResolver for ScriptedResolver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn resolve(&self, query: &Query) -> Result<String, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(step) = self.next_step(query.as_str()) else {
            return Err(ResolveError::Service {
                status: 404,
                detail: format!("no scripted answer for {:?}", query.as_str()),
            });
        };
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Query {
        Query::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_steps_consumed_in_order_and_last_repeats() {
        let r = ScriptedResolver::new()
            .answer("hi", Duration::ZERO, "one")
            .answer("hi", Duration::ZERO, "two");
        assert_eq!(r.resolve(&q("hi")).await.unwrap(), "one");
        assert_eq!(r.resolve(&q("hi")).await.unwrap(), "two");
        assert_eq!(r.resolve(&q("hi")).await.unwrap(), "two");
        assert_eq!(r.calls(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let r = ScriptedResolver::new().fail(
            "hi",
            Duration::ZERO,
            ResolveError::Network("reset".to_string()),
        );
        assert_eq!(
            r.resolve(&q("hi")).await.unwrap_err(),
            ResolveError::Network("reset".to_string())
        );
    }

    #[tokio::test]
    async fn test_unscripted_query_is_service_error() {
        let r = ScriptedResolver::new();
        let err = r.resolve(&q("anything")).await.unwrap_err();
        assert!(matches!(err, ResolveError::Service { status: 404, .. }));
    }
}
