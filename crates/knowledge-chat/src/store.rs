//! Conversation store: the ordered, append-only turn log of one session.
//!
//! Every mutation is synchronous and publishes a [`ConversationEvent`] on a
//! broadcast channel so the rendering layer can follow along.

use tokio::sync::broadcast;

use knowledge_core::events::ConversationEvent;
use knowledge_core::types::TurnId;

use crate::error::ChatError;
use crate::input::Query;
use crate::turn::{Turn, TurnFailure, TurnStatus};

/// Default buffer size of the change-notification channel.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Outcome of an attempt-scoped resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The attempt was current and the turn was updated.
    Current,
    /// The attempt had been superseded; nothing changed.
    Stale,
}

/// Ordered turn sequence for the active session.
pub struct ConversationStore {
    turns: Vec<Turn>,
    events: broadcast::Sender<ConversationEvent>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("turns", &self.turns.len())
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

impl ConversationStore {
    /// Create an empty store whose event channel buffers `event_capacity` events.
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            turns: Vec::new(),
            events,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, turn_id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id() == turn_id)
    }

    pub fn position(&self, turn_id: TurnId) -> Option<usize> {
        self.turns.iter().position(|t| t.id() == turn_id)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.turns.iter().any(|t| t.status() == TurnStatus::Pending)
    }

    /// Validate `raw` and append it as a pending turn.
    pub fn append_pending(&mut self, raw: &str) -> Result<TurnId, ChatError> {
        let query = Query::new(raw)?;
        Ok(self.append_query(query))
    }

    /// Append an already validated query as a pending turn.
    pub fn append_query(&mut self, query: Query) -> TurnId {
        let turn = Turn::new(query);
        let turn_id = turn.id();
        let timestamp = turn.created_at();
        let index = self.turns.len();
        self.turns.push(turn);

        tracing::debug!(turn_id = %turn_id, index, "Turn appended");
        self.publish(ConversationEvent::TurnAppended {
            turn_id,
            index,
            timestamp,
        });
        turn_id
    }

    /// Resolve the turn's current attempt with `answer`.
    pub fn resolve(
        &mut self,
        turn_id: TurnId,
        answer: impl Into<String>,
    ) -> Result<(), ChatError> {
        let attempt = self.current_attempt(turn_id)?;
        self.resolve_attempt(turn_id, attempt, answer).map(|_| ())
    }

    /// Fail the turn's current attempt.
    pub fn fail(&mut self, turn_id: TurnId, failure: TurnFailure) -> Result<(), ChatError> {
        let attempt = self.current_attempt(turn_id)?;
        self.fail_attempt(turn_id, attempt, failure).map(|_| ())
    }

    /// Resolve a specific attempt. Superseded attempts are discarded.
    pub fn resolve_attempt(
        &mut self,
        turn_id: TurnId,
        attempt: u64,
        answer: impl Into<String>,
    ) -> Result<Applied, ChatError> {
        let turn = self.turn_mut(turn_id)?;
        let current = turn.attempt();
        if current != attempt {
            self.discard_stale(turn_id, attempt, current);
            return Ok(Applied::Stale);
        }
        turn.resolve(answer.into())?;

        tracing::debug!(turn_id = %turn_id, attempt, "Turn resolved");
        self.publish(ConversationEvent::TurnResolved { turn_id, attempt });
        Ok(Applied::Current)
    }

    /// Fail a specific attempt. Superseded attempts are discarded.
    pub fn fail_attempt(
        &mut self,
        turn_id: TurnId,
        attempt: u64,
        failure: TurnFailure,
    ) -> Result<Applied, ChatError> {
        let turn = self.turn_mut(turn_id)?;
        let current = turn.attempt();
        if current != attempt {
            self.discard_stale(turn_id, attempt, current);
            return Ok(Applied::Stale);
        }
        let kind = failure.kind;
        turn.fail(failure)?;

        tracing::debug!(turn_id = %turn_id, attempt, kind = %kind, "Turn failed");
        self.publish(ConversationEvent::TurnFailed {
            turn_id,
            attempt,
            kind,
        });
        Ok(Applied::Current)
    }

    /// Reset a turn to pending for a fresh attempt, returning the new attempt number.
    ///
    /// Any outcome still in flight for an earlier attempt will be discarded
    /// when it arrives.
    pub fn regenerate(&mut self, turn_id: TurnId) -> Result<u64, ChatError> {
        let attempt = self.turn_mut(turn_id)?.begin_new_attempt();
        self.publish(ConversationEvent::TurnRegenerated { turn_id, attempt });
        Ok(attempt)
    }

    /// Remove every turn. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.turns.len();
        self.turns.clear();
        tracing::debug!(removed, "Conversation cleared");
        self.publish(ConversationEvent::SessionCleared { removed });
        removed
    }

    // -- Private helpers --

    fn current_attempt(&self, turn_id: TurnId) -> Result<u64, ChatError> {
        self.get(turn_id)
            .map(Turn::attempt)
            .ok_or(ChatError::TurnNotFound(turn_id))
    }

    fn turn_mut(&mut self, turn_id: TurnId) -> Result<&mut Turn, ChatError> {
        self.turns
            .iter_mut()
            .find(|t| t.id() == turn_id)
            .ok_or(ChatError::TurnNotFound(turn_id))
    }

    fn discard_stale(&self, turn_id: TurnId, stale_attempt: u64, current_attempt: u64) {
        tracing::debug!(
            turn_id = %turn_id,
            stale_attempt,
            current_attempt,
            "Stale resolution discarded"
        );
        self.publish(ConversationEvent::StaleResolutionDiscarded {
            turn_id,
            stale_attempt,
            current_attempt,
        });
    }

    fn publish(&self, event: ConversationEvent) {
        // No subscribers is fine; the store is the source of truth.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::types::ErrorKind;

    fn store_with(query: &str) -> (ConversationStore, TurnId) {
        let mut store = ConversationStore::default();
        let id = store.append_pending(query).unwrap();
        (store, id)
    }

    // ---- append_pending ----

    #[test]
    fn test_append_pending_creates_trimmed_pending_turn() {
        let (store, id) = store_with("  why is the sky blue?  ");
        let turn = store.get(id).unwrap();
        assert_eq!(turn.status(), TurnStatus::Pending);
        assert_eq!(turn.query().as_str(), "why is the sky blue?");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_append_pending_rejects_whitespace_and_leaves_store_unchanged() {
        let mut store = ConversationStore::default();
        let result = store.append_pending("   ");
        assert!(matches!(result, Err(ChatError::InvalidInput)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_append_preserves_submission_order() {
        let mut store = ConversationStore::default();
        let q1 = store.append_pending("Q1").unwrap();
        let q2 = store.append_pending("Q2").unwrap();

        // Resolve out of order.
        store.resolve(q2, "A2").unwrap();
        store.resolve(q1, "A1").unwrap();

        let queries: Vec<&str> = store.turns().iter().map(|t| t.query().as_str()).collect();
        assert_eq!(queries, vec!["Q1", "Q2"]);
        assert_eq!(store.position(q1), Some(0));
        assert_eq!(store.position(q2), Some(1));
    }

    // ---- resolve / fail ----

    #[test]
    fn test_double_resolve_is_invalid_state_and_keeps_first_answer() {
        let (mut store, id) = store_with("hello");
        store.resolve(id, "first").unwrap();
        let err = store.resolve(id, "second").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(store.get(id).unwrap().answer(), Some("first"));
    }

    #[test]
    fn test_resolve_unknown_turn_is_invalid_state() {
        let mut store = ConversationStore::default();
        let err = store.resolve(TurnId::new(), "answer").unwrap_err();
        assert!(matches!(err, ChatError::TurnNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_fail_then_resolve_rejected() {
        let (mut store, id) = store_with("hello");
        store.fail(id, TurnFailure::resolution("timeout")).unwrap();
        assert!(store.resolve(id, "late").is_err());
        let turn = store.get(id).unwrap();
        assert_eq!(turn.status(), TurnStatus::Failed);
        assert!(turn.answer().is_none());
    }

    #[test]
    fn test_double_fail_rejected() {
        let (mut store, id) = store_with("hello");
        store.fail(id, TurnFailure::resolution("a")).unwrap();
        let err = store.fail(id, TurnFailure::resolution("b")).unwrap_err();
        assert!(matches!(err, ChatError::InvalidState { .. }));
        assert_eq!(store.get(id).unwrap().error().unwrap().detail, "a");
    }

    // ---- regenerate ----

    #[test]
    fn test_regenerate_then_resolve_replaces_answer() {
        let (mut store, id) = store_with("hello");
        store.resolve(id, "old answer").unwrap();
        let attempt = store.regenerate(id).unwrap();
        assert_eq!(attempt, 2);
        assert_eq!(store.get(id).unwrap().status(), TurnStatus::Pending);
        assert!(store.get(id).unwrap().answer().is_none());

        store.resolve(id, "new answer").unwrap();
        assert_eq!(store.get(id).unwrap().answer(), Some("new answer"));
    }

    #[test]
    fn test_regenerate_failed_turn() {
        let (mut store, id) = store_with("hello");
        store.fail(id, TurnFailure::resolution("down")).unwrap();
        store.regenerate(id).unwrap();
        let turn = store.get(id).unwrap();
        assert_eq!(turn.status(), TurnStatus::Pending);
        assert!(turn.error().is_none());
    }

    #[test]
    fn test_regenerate_unknown_turn() {
        let mut store = ConversationStore::default();
        let err = store.regenerate(TurnId::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_stale_resolution_is_discarded() {
        let (mut store, id) = store_with("hello");
        let first = store.get(id).unwrap().attempt();
        let second = store.regenerate(id).unwrap();

        // Second attempt completes first, then the abandoned one arrives.
        assert_eq!(
            store.resolve_attempt(id, second, "fresh").unwrap(),
            Applied::Current
        );
        assert_eq!(
            store.resolve_attempt(id, first, "stale").unwrap(),
            Applied::Stale
        );
        assert_eq!(store.get(id).unwrap().answer(), Some("fresh"));
    }

    #[test]
    fn test_stale_failure_is_discarded_while_pending() {
        let (mut store, id) = store_with("hello");
        let first = store.get(id).unwrap().attempt();
        store.regenerate(id).unwrap();

        let applied = store
            .fail_attempt(id, first, TurnFailure::resolution("old timeout"))
            .unwrap();
        assert_eq!(applied, Applied::Stale);
        assert_eq!(store.get(id).unwrap().status(), TurnStatus::Pending);
    }

    // ---- clear ----

    #[test]
    fn test_clear_empties_store() {
        let mut store = ConversationStore::default();
        store.append_pending("a").unwrap();
        store.append_pending("b").unwrap();
        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert!(!store.has_pending());
    }

    // ---- events ----

    #[test]
    fn test_events_published_in_order() {
        let mut store = ConversationStore::default();
        let mut rx = store.subscribe();

        let id = store.append_pending("hello").unwrap();
        store.resolve(id, "hi").unwrap();
        store.regenerate(id).unwrap();
        store.fail(id, TurnFailure::resolution("x")).unwrap();
        store.clear();

        assert!(matches!(
            rx.try_recv().unwrap(),
            ConversationEvent::TurnAppended { index: 0, .. }
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            ConversationEvent::TurnResolved {
                turn_id: id,
                attempt: 1
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ConversationEvent::TurnRegenerated {
                turn_id: id,
                attempt: 2
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ConversationEvent::TurnFailed {
                turn_id: id,
                attempt: 2,
                kind: ErrorKind::ResolutionFailure
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ConversationEvent::SessionCleared { removed: 1 }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rejected_operation_publishes_nothing() {
        let (mut store, id) = store_with("hello");
        store.resolve(id, "one").unwrap();
        let mut rx = store.subscribe();
        assert!(store.resolve(id, "two").is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publishing_without_subscribers_is_fine() {
        let mut store = ConversationStore::new(1);
        for i in 0..5 {
            store.append_pending(&format!("question {}", i)).unwrap();
        }
        assert_eq!(store.len(), 5);
    }
}
