//! Conversational core for Knowledge.
//!
//! Collects queries, keeps the ordered turn log for a session, resolves
//! answers through a pluggable resolver, and renders the transcript.

pub mod error;
pub mod input;
pub mod resolver;
pub mod session;
pub mod store;
pub mod transcript;
pub mod turn;

pub use error::{ChatError, ResolveError};
pub use input::{InputCollector, Query};
pub use resolver::{
    build_resolver, FallbackPicker, FixedPicker, HttpResolver, KeywordResolver, Latency,
    RandomPicker, ResponseResolver, ScriptedResolver,
};
pub use session::ChatSession;
pub use store::{Applied, ConversationStore};
pub use transcript::{render_transcript, render_turn};
pub use turn::{Turn, TurnFailure, TurnStatus};
