//! Conversation state: the catalog cache, per-session history and the
//! registry that holds one conversation per login session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use niti_core::{Error, Result, Scheme};

use crate::providers::ChatBackend;
use crate::types::{ChatMessage, ChatReply};

pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Flatten the catalog into the text block given to the model.
pub fn flatten_catalog(schemes: &[Scheme]) -> String {
    schemes
        .iter()
        .map(|scheme| {
            let mut lines = vec![format!("Scheme: {}", scheme.scheme_name)];
            let fields = [
                ("Details", &scheme.details),
                ("Benefits", &scheme.benefits),
                ("Documents Required", &scheme.documents_required),
                ("Application Process", &scheme.application_process),
            ];
            for (label, value) in fields {
                if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                    lines.push(format!("{}: {}", label, v));
                }
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The flattened catalog, fetched once and reused until invalidated.
#[derive(Default)]
pub struct CatalogCache {
    text: Mutex<Option<Arc<String>>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached text, calling `loader` if nothing is cached.
    /// A failed load caches nothing.
    pub fn get_or_load<F>(&self, loader: F) -> Result<Arc<String>>
    where
        F: FnOnce() -> Result<String>,
    {
        let mut text = self.text.lock();
        if let Some(cached) = text.as_ref() {
            return Ok(cached.clone());
        }
        let loaded = Arc::new(loader()?);
        info!("Loaded scheme catalog for chat ({} bytes)", loaded.len());
        *text = Some(loaded.clone());
        Ok(loaded)
    }

    pub fn invalidate(&self) {
        if self.text.lock().take().is_some() {
            debug!("Scheme catalog cache cleared");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.text.lock().is_some()
    }
}

/// One conversation: a fixed system instruction plus the turns so far.
#[derive(Debug, Clone)]
pub struct ChatSession {
    system_instruction: String,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    /// The catalog block goes ahead of the assistant instructions.
    pub fn new(catalog: &str, instructions: &str) -> Self {
        let system_instruction = format!(
            "Here is information about available government schemes:\n\n{}\n\n{}",
            catalog, instructions
        );
        Self {
            system_instruction,
            history: Vec::new(),
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Send one user turn and await the reply.
    ///
    /// A backend failure answers with `FALLBACK_REPLY` and drops the user
    /// turn, so the history only holds completed exchanges.
    pub async fn send(&mut self, backend: &dyn ChatBackend, message: &str) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::field("message", "Message is empty"));
        }

        self.history.push(ChatMessage::user(message));
        match backend
            .complete(&self.system_instruction, &self.history)
            .await
        {
            Ok(reply) => {
                self.history.push(ChatMessage::assistant(reply.clone()));
                Ok(ChatReply {
                    reply,
                    fallback: false,
                })
            }
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                self.history.pop();
                Ok(ChatReply {
                    reply: FALLBACK_REPLY.to_string(),
                    fallback: true,
                })
            }
        }
    }
}

type SharedSession = Arc<tokio::sync::Mutex<ChatSession>>;

struct Entry {
    session: SharedSession,
    last_used: Instant,
}

/// Conversations keyed by login-session token.
#[derive(Default)]
pub struct ChatSessions {
    sessions: Mutex<HashMap<String, Entry>>,
}

impl ChatSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The conversation for `token`, created with `create` on first use.
    ///
    /// `create` runs without the registry lock held. If two first messages
    /// race, the first insert wins and the other conversation is dropped.
    pub fn get_or_create<F>(&self, token: &str, create: F) -> Result<SharedSession>
    where
        F: FnOnce() -> Result<ChatSession>,
    {
        {
            let mut sessions = self.sessions.lock();
            if let Some(entry) = sessions.get_mut(token) {
                entry.last_used = Instant::now();
                return Ok(entry.session.clone());
            }
        }

        let created = Arc::new(tokio::sync::Mutex::new(create()?));
        let mut sessions = self.sessions.lock();
        let entry = sessions.entry(token.to_string()).or_insert_with(|| Entry {
            session: created,
            last_used: Instant::now(),
        });
        Ok(entry.session.clone())
    }

    /// Drop conversations untouched for longer than `max_idle`.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_used.elapsed() <= max_idle);
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!("Pruned {} idle chat sessions", pruned);
        }
        pruned
    }

    /// Drop the conversation for `token`. Returns whether one existed.
    pub fn remove(&self, token: &str) -> bool {
        self.sessions.lock().remove(token).is_some()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.sessions.lock().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
