//! Chat session controller: central coordinator wiring input, store and resolver.
//!
//! Submission appends a pending turn and spawns its resolution on the tokio
//! runtime, so a slow answer never blocks the next question. Regeneration
//! aborts the turn's outstanding task and starts a new attempt; anything the
//! old attempt still delivers is dropped by the store's attempt check.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use knowledge_core::config::ChatConfig;
use knowledge_core::events::ConversationEvent;
use knowledge_core::types::{SubmissionPolicy, TurnId};

use crate::error::ChatError;
use crate::input::{InputCollector, Query};
use crate::resolver::ResponseResolver;
use crate::store::{Applied, ConversationStore};
use crate::turn::{Turn, TurnFailure, TurnStatus};

/// One conversational UI instance: its turns, resolver, and in-flight work.
///
/// Methods that start a resolution (`submit`, `regenerate`) must be called
/// from within a tokio runtime.
pub struct ChatSession {
    store: Arc<Mutex<ConversationStore>>,
    resolver: Arc<dyn ResponseResolver>,
    collector: InputCollector,
    policy: SubmissionPolicy,
    config: ChatConfig,
    in_flight: Mutex<HashMap<TurnId, JoinHandle<()>>>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("resolver", &self.resolver.name())
            .field("policy", &self.policy)
            .field("max_chars", &self.collector.max_chars)
            .finish()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl ChatSession {
    /// Create an empty session backed by `resolver`.
    pub fn new(resolver: Arc<dyn ResponseResolver>, config: &ChatConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(ConversationStore::new(config.event_capacity))),
            resolver,
            collector: InputCollector::new(config.max_query_chars),
            policy: config.submission_policy,
            config: config.clone(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> SubmissionPolicy {
        self.policy
    }

    pub fn collector(&self) -> &InputCollector {
        &self.collector
    }

    /// Subscribe to change notifications for this session.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.lock_store().subscribe()
    }

    /// Submit a query: validate, append as pending, start resolving.
    pub fn submit(&self, raw: &str) -> Result<TurnId, ChatError> {
        let query = self.collector.collect(raw)?;
        self.submit_query(query)
    }

    /// Submit an already validated query, e.g. a speech transcript.
    pub fn submit_query(&self, query: Query) -> Result<TurnId, ChatError> {
        let turn_id = {
            let mut store = self.lock_store();
            if self.policy == SubmissionPolicy::SingleFlight && store.has_pending() {
                tracing::debug!("Submission refused, a turn is still pending");
                return Err(ChatError::Busy);
            }
            store.append_query(query.clone())
        };

        tracing::info!(turn_id = %turn_id, chars = query.char_count(), "Query submitted");
        self.spawn_resolution(turn_id, 1, query);
        Ok(turn_id)
    }

    /// Request a fresh answer for an existing turn. Returns the new attempt number.
    pub fn regenerate(&self, turn_id: TurnId) -> Result<u64, ChatError> {
        let (attempt, query) = {
            let mut store = self.lock_store();
            if self.policy == SubmissionPolicy::SingleFlight
                && store
                    .turns()
                    .iter()
                    .any(|t| t.id() != turn_id && t.status() == TurnStatus::Pending)
            {
                return Err(ChatError::Busy);
            }
            let attempt = store.regenerate(turn_id)?;
            let query = store
                .get(turn_id)
                .map(|t| t.query().clone())
                .ok_or(ChatError::TurnNotFound(turn_id))?;
            (attempt, query)
        };

        tracing::info!(turn_id = %turn_id, attempt, "Regenerating answer");
        self.spawn_resolution(turn_id, attempt, query);
        Ok(attempt)
    }

    /// Cancel all outstanding resolutions and remove every turn.
    pub fn clear(&self) -> usize {
        self.abort_all();
        let removed = self.lock_store().clear();
        tracing::info!(removed, "New conversation");
        removed
    }

    /// Start over with an empty conversation.
    pub fn new_conversation(&self) {
        self.clear();
    }

    /// Snapshot of the turns in submission order.
    pub fn turns(&self) -> Vec<Turn> {
        self.lock_store().turns().to_vec()
    }

    pub fn turn(&self, turn_id: TurnId) -> Option<Turn> {
        self.lock_store().get(turn_id).cloned()
    }

    /// The turn at a zero-based position.
    pub fn turn_at(&self, index: usize) -> Option<Turn> {
        self.lock_store().turns().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_store().is_empty()
    }

    /// Whether any turn is still waiting for its answer.
    pub fn is_busy(&self) -> bool {
        self.lock_store().has_pending()
    }

    /// Text to show in place of the answer, if the turn has settled.
    ///
    /// Failed turns show a fixed message rather than the failure detail.
    pub fn display_text(&self, turn: &Turn) -> Option<String> {
        match turn.status() {
            TurnStatus::Pending => None,
            TurnStatus::Resolved => turn.answer().map(str::to_string),
            TurnStatus::Failed => Some(turn.failure_message(&self.config).to_string()),
        }
    }

    /// Wait until every outstanding resolution has finished or been aborted.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut in_flight = self.lock_in_flight();
                in_flight.drain().map(|(_, h)| h).collect()
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    if !e.is_cancelled() {
                        tracing::error!(error = %e, "Resolution task panicked");
                    }
                }
            }
        }
    }

    // -- Private helpers --

    fn spawn_resolution(&self, turn_id: TurnId, attempt: u64, query: Query) {
        let store = Arc::clone(&self.store);
        let resolver = Arc::clone(&self.resolver);

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let outcome = resolver.resolve(&query).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
            let applied = match outcome {
                Ok(answer) => store.resolve_attempt(turn_id, attempt, answer),
                Err(e) => {
                    tracing::warn!(turn_id = %turn_id, attempt, error = %e, "Resolution failed");
                    store.fail_attempt(turn_id, attempt, TurnFailure::resolution(e.to_string()))
                }
            };

            match applied {
                Ok(Applied::Current) => {
                    tracing::info!(turn_id = %turn_id, attempt, elapsed_ms, "Turn settled");
                }
                Ok(Applied::Stale) => {}
                Err(e) => {
                    // Turn was cleared while the answer was on its way.
                    tracing::debug!(turn_id = %turn_id, error = %e, "Resolution dropped");
                }
            }
        });

        let mut in_flight = self.lock_in_flight();
        in_flight.retain(|_, h| !h.is_finished());
        if let Some(previous) = in_flight.insert(turn_id, handle) {
            previous.abort();
            tracing::debug!(turn_id = %turn_id, "Previous attempt aborted");
        }
    }

    fn abort_all(&self) {
        let mut in_flight = self.lock_in_flight();
        for (_, handle) in in_flight.drain() {
            handle.abort();
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, ConversationStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<TurnId, JoinHandle<()>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use knowledge_core::types::ErrorKind;

    use crate::error::ResolveError;
    use crate::resolver::{
        FixedPicker, KeywordResolver, Latency, ScriptedResolver, DEMO_FALLBACKS, DEMO_RESPONSES,
    };

    fn demo_session(policy: SubmissionPolicy) -> ChatSession {
        let resolver = KeywordResolver::demo()
            .with_latency(Latency::none())
            .with_picker(FixedPicker(0));
        let config = ChatConfig {
            submission_policy: policy,
            ..ChatConfig::default()
        };
        ChatSession::new(Arc::new(resolver), &config)
    }

    fn scripted_session(resolver: ScriptedResolver, policy: SubmissionPolicy) -> ChatSession {
        let config = ChatConfig {
            submission_policy: policy,
            ..ChatConfig::default()
        };
        ChatSession::new(Arc::new(resolver), &config)
    }

    // ---- Submission ----

    #[tokio::test]
    async fn test_submit_hello_resolves_with_greeting() {
        let session = demo_session(SubmissionPolicy::Concurrent);
        let id = session.submit("hello").unwrap();
        session.settle().await;

        let turn = session.turn(id).unwrap();
        assert_eq!(turn.status(), TurnStatus::Resolved);
        assert_eq!(turn.answer(), Some(DEMO_RESPONSES[0].1));
    }

    #[tokio::test]
    async fn test_submit_whitespace_rejected() {
        let session = demo_session(SubmissionPolicy::Concurrent);
        let err = session.submit("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_submit_unknown_topic_uses_fallback() {
        let session = demo_session(SubmissionPolicy::Concurrent);
        let id = session.submit("xyzzy unknown topic").unwrap();
        session.settle().await;
        assert_eq!(session.turn(id).unwrap().answer(), Some(DEMO_FALLBACKS[0]));
    }

    #[tokio::test]
    async fn test_submit_too_long_rejected() {
        let resolver = KeywordResolver::demo().with_latency(Latency::none());
        let config = ChatConfig {
            max_query_chars: 10,
            ..ChatConfig::default()
        };
        let session = ChatSession::new(Arc::new(resolver), &config);
        assert!(matches!(
            session.submit("this is far too long"),
            Err(ChatError::MessageTooLong(10))
        ));
        assert!(session.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_order_kept_when_second_resolves_first() {
        let resolver = ScriptedResolver::new()
            .answer("Q1", Duration::from_millis(1000), "A1")
            .answer("Q2", Duration::from_millis(100), "A2");
        let session = scripted_session(resolver, SubmissionPolicy::Concurrent);

        let q1 = session.submit("Q1").unwrap();
        let q2 = session.submit("Q2").unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(session.turn(q1).unwrap().status(), TurnStatus::Pending);
        assert_eq!(session.turn(q2).unwrap().status(), TurnStatus::Resolved);

        session.settle().await;
        let turns = session.turns();
        assert_eq!(turns[0].id(), q1);
        assert_eq!(turns[1].id(), q2);
        assert_eq!(turns[0].answer(), Some("A1"));
        assert_eq!(turns[1].answer(), Some("A2"));
    }

    // ---- Policy ----

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_refuses_while_pending() {
        let resolver = ScriptedResolver::new()
            .answer("first", Duration::from_millis(500), "one")
            .answer("second", Duration::ZERO, "two");
        let session = scripted_session(resolver, SubmissionPolicy::SingleFlight);

        session.submit("first").unwrap();
        assert!(session.is_busy());
        assert!(matches!(session.submit("second"), Err(ChatError::Busy)));
        assert_eq!(session.len(), 1);

        session.settle().await;
        assert!(!session.is_busy());
        session.submit("second").unwrap();
        session.settle().await;
        assert_eq!(session.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_allows_overlapping_submissions() {
        let resolver = ScriptedResolver::new()
            .answer("first", Duration::from_millis(500), "one")
            .answer("second", Duration::from_millis(500), "two");
        let session = scripted_session(resolver, SubmissionPolicy::Concurrent);

        session.submit("first").unwrap();
        session.submit("second").unwrap();
        assert_eq!(session.len(), 2);
        session.settle().await;
        assert!(!session.is_busy());
    }

    // ---- Failure and regeneration ----

    #[tokio::test]
    async fn test_failed_resolution_shows_fixed_message() {
        let resolver = ScriptedResolver::new().fail(
            "hello",
            Duration::ZERO,
            ResolveError::Network("connection refused".to_string()),
        );
        let session = scripted_session(resolver, SubmissionPolicy::Concurrent);
        let id = session.submit("hello").unwrap();
        session.settle().await;

        let turn = session.turn(id).unwrap();
        assert_eq!(turn.status(), TurnStatus::Failed);
        assert_eq!(turn.error().unwrap().kind, ErrorKind::ResolutionFailure);
        assert!(turn.error().unwrap().detail.contains("connection refused"));
        assert_eq!(
            session.display_text(&turn).unwrap(),
            ChatConfig::default().failure_message
        );
    }

    #[tokio::test]
    async fn test_regenerate_after_failure_recovers() {
        let resolver = ScriptedResolver::new()
            .fail("hello", Duration::ZERO, ResolveError::Timeout(Duration::from_secs(30)))
            .answer("hello", Duration::ZERO, "Hi there!");
        let session = scripted_session(resolver, SubmissionPolicy::Concurrent);
        let id = session.submit("hello").unwrap();
        session.settle().await;
        assert_eq!(session.turn(id).unwrap().status(), TurnStatus::Failed);

        assert_eq!(session.regenerate(id).unwrap(), 2);
        session.settle().await;
        let turn = session.turn(id).unwrap();
        assert_eq!(turn.status(), TurnStatus::Resolved);
        assert_eq!(session.display_text(&turn).as_deref(), Some("Hi there!"));
    }

    #[tokio::test]
    async fn test_failed_regeneration_uses_regenerate_message() {
        let resolver = ScriptedResolver::new()
            .answer("hello", Duration::ZERO, "Hi!")
            .fail("hello", Duration::ZERO, ResolveError::Network("down".to_string()));
        let session = scripted_session(resolver, SubmissionPolicy::Concurrent);
        let id = session.submit("hello").unwrap();
        session.settle().await;
        session.regenerate(id).unwrap();
        session.settle().await;

        let turn = session.turn(id).unwrap();
        assert_eq!(turn.status(), TurnStatus::Failed);
        assert_eq!(
            session.display_text(&turn).unwrap(),
            ChatConfig::default().regenerate_failure_message
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_while_pending_keeps_only_new_outcome() {
        let resolver = ScriptedResolver::new()
            .answer("hello", Duration::from_millis(1000), "stale answer")
            .answer("hello", Duration::from_millis(10), "fresh answer");
        let session = scripted_session(resolver, SubmissionPolicy::Concurrent);

        let id = session.submit("hello").unwrap();
        // Let the first attempt start.
        tokio::time::sleep(Duration::from_millis(5)).await;
        session.regenerate(id).unwrap();
        session.settle().await;
        tokio::time::sleep(Duration::from_millis(2000)).await;

        let turn = session.turn(id).unwrap();
        assert_eq!(turn.attempt(), 2);
        assert_eq!(turn.answer(), Some("fresh answer"));
    }

    #[tokio::test]
    async fn test_regenerate_unknown_turn() {
        let session = demo_session(SubmissionPolicy::Concurrent);
        let err = session.regenerate(TurnId::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_regenerate_blocked_by_other_pending_turn() {
        let resolver = ScriptedResolver::new()
            .answer("one", Duration::ZERO, "1")
            .answer("two", Duration::from_millis(500), "2");
        let session = scripted_session(resolver, SubmissionPolicy::SingleFlight);
        let first = session.submit("one").unwrap();
        session.settle().await;
        session.submit("two").unwrap();

        assert!(matches!(session.regenerate(first), Err(ChatError::Busy)));
        session.settle().await;
        assert!(session.regenerate(first).is_ok());
        session.settle().await;
    }

    // ---- Clear ----

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_in_flight_resolutions() {
        let resolver = ScriptedResolver::new().answer("slow", Duration::from_millis(1000), "late");
        let session = scripted_session(resolver, SubmissionPolicy::Concurrent);
        session.submit("slow").unwrap();

        assert_eq!(session.clear(), 1);
        session.settle().await;
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(session.is_empty());
        assert!(!session.is_busy());
    }

    // ---- Events ----

    #[tokio::test]
    async fn test_events_follow_turn_lifecycle() {
        let session = demo_session(SubmissionPolicy::Concurrent);
        let mut rx = session.subscribe();
        let id = session.submit("thanks").unwrap();
        session.settle().await;

        assert!(matches!(
            rx.recv().await.unwrap(),
            ConversationEvent::TurnAppended { turn_id, .. } if turn_id == id
        ));
        assert_eq!(
            rx.recv().await.unwrap(),
            ConversationEvent::TurnResolved {
                turn_id: id,
                attempt: 1
            }
        );
    }

    #[tokio::test]
    async fn test_display_text_none_while_pending() {
        let resolver = ScriptedResolver::new().answer("wait", Duration::from_secs(60), "done");
        let session = scripted_session(resolver, SubmissionPolicy::Concurrent);
        let id = session.submit("wait").unwrap();
        let turn = session.turn(id).unwrap();
        assert!(session.display_text(&turn).is_none());
        session.clear();
    }
}
