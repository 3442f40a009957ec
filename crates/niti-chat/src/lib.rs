//! Scheme assistant chat.
//!
//! Each authenticated session gets one conversation whose system instruction
//! carries the flattened scheme catalog. Replies come from an external LLM
//! (Gemini by default, or an OpenAI-compatible API) in a single request per
//! turn.

pub mod assistant;
pub mod config;
pub mod providers;
pub mod session;
pub mod types;

pub use assistant::ChatAssistant;
pub use config::LLMConfig;
pub use providers::{ChatBackend, Endpoints, LlmBackend};
pub use session::{flatten_catalog, CatalogCache, ChatSession, ChatSessions, FALLBACK_REPLY};
pub use types::*;
