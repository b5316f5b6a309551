pub mod actions;
pub mod client;
pub mod config;
pub mod history;
pub mod pipeline;
pub mod render;
pub mod storage;
pub mod transcript;

// Re-export main types for convenience
pub use actions::QuickAction;
pub use client::{ChatClient, ChatError, ChatRequest, ChatResponse};
pub use config::Config;
pub use history::{ConversationHistory, HistoryEntry};
pub use pipeline::{derive_topic, RequestState, Session};
pub use render::{render, Block, Inline, Markup};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use transcript::{ChatMessage, Sender, Transcript};
