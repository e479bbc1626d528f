pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::KnowledgeConfig;
pub use error::{KnowledgeError, Result};
pub use events::{ConversationEvent, SpeechEvent};
pub use types::*;
