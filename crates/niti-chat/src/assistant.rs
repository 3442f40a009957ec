//! The assistant as the server sees it: backend, catalog cache and
//! conversation registry behind one handle.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use niti_core::{Error, Result, Scheme};

use crate::providers::ChatBackend;
use crate::session::{flatten_catalog, CatalogCache, ChatSession, ChatSessions};
use crate::types::ChatReply;

pub const DEFAULT_INSTRUCTIONS: &str = "You are Niti-Mitra, a helpful assistant for Indian \
     government welfare schemes. Answer questions using the scheme information above. Explain \
     eligibility, benefits, required documents and how to apply in simple language. If a \
     question is not covered by the information, say so and suggest the official scheme portal.";

pub struct ChatAssistant {
    backend: Arc<dyn ChatBackend>,
    catalog: CatalogCache,
    sessions: ChatSessions,
    instructions: String,
    idle_limit: Option<Duration>,
}

impl ChatAssistant {
    pub fn new(backend: Arc<dyn ChatBackend>, instructions: Option<String>) -> Self {
        Self {
            backend,
            catalog: CatalogCache::new(),
            sessions: ChatSessions::new(),
            instructions: instructions.unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            idle_limit: None,
        }
    }

    /// Conversations idle for longer than `limit` are dropped on the next
    /// message to any conversation.
    pub fn with_idle_limit(mut self, limit: Duration) -> Self {
        self.idle_limit = Some(limit);
        self
    }

    /// Answer one message in the conversation tied to `token`.
    ///
    /// The first message for a token starts the conversation, loading the
    /// catalog through `load_schemes` unless it is already cached.
    pub async fn send<F>(&self, token: &str, message: &str, load_schemes: F) -> Result<ChatReply>
    where
        F: FnOnce() -> Result<Vec<Scheme>>,
    {
        if message.trim().is_empty() {
            return Err(Error::field("message", "Message is empty"));
        }
        if let Some(limit) = self.idle_limit {
            self.sessions.prune_idle(limit);
        }

        let session = self.sessions.get_or_create(token, || {
            let catalog = self
                .catalog
                .get_or_load(|| load_schemes().map(|schemes| flatten_catalog(&schemes)))?;
            info!("Starting chat session");
            Ok(ChatSession::new(&catalog, &self.instructions))
        })?;

        let mut session = session.lock().await;
        session.send(self.backend.as_ref(), message).await
    }

    /// Close the conversation for `token`.
    pub fn close(&self, token: &str) -> bool {
        self.sessions.remove(token)
    }

    /// Forget the cached catalog. Open conversations keep the text they
    /// started with; the next new conversation re-fetches.
    pub fn refresh_catalog(&self) {
        self.catalog.invalidate();
    }

    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    pub fn sessions(&self) -> &ChatSessions {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use async_trait::async_trait;
    use niti_core::SchemeEligibility;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records the system instruction of every call.
    #[derive(Default)]
    struct Recorder {
        systems: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatBackend for Recorder {
        async fn complete(&self, system: &str, history: &[ChatMessage]) -> Result<String> {
            self.systems.lock().push(system.to_string());
            Ok(format!("reply {}", history.len()))
        }
    }

    fn catalog(name: &str) -> Vec<Scheme> {
        vec![Scheme {
            id: "s1".into(),
            scheme_name: name.into(),
            details: None,
            benefits: None,
            documents_required: None,
            application_process: None,
            contact_info: None,
            eligibility: SchemeEligibility::default(),
        }]
    }

    #[tokio::test]
    async fn test_catalog_fetched_once_across_sessions() {
        let backend = Arc::new(Recorder::default());
        let assistant = ChatAssistant::new(backend.clone(), Some("Be kind.".into()));
        let fetches = AtomicUsize::new(0);
        let load = || {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(catalog("PMAY"))
        };

        assistant.send("tok-a", "hi", load).await.unwrap();
        let reply = assistant.send("tok-a", "more", load).await.unwrap();
        assert_eq!(reply.reply, "reply 3");
        assistant.send("tok-b", "hi", load).await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        let systems = backend.systems.lock().clone();
        assert!(systems[0].contains("Scheme: PMAY"));
        assert!(systems[0].ends_with("Be kind."));
    }

    #[tokio::test]
    async fn test_refresh_applies_to_new_sessions() {
        let backend = Arc::new(Recorder::default());
        let assistant = ChatAssistant::new(backend.clone(), None);

        assistant.send("tok-a", "hi", || Ok(catalog("Old"))).await.unwrap();
        assistant.refresh_catalog();
        assert!(!assistant.catalog().is_loaded());

        assistant.send("tok-a", "hi", || Ok(catalog("New"))).await.unwrap();
        assistant.send("tok-b", "hi", || Ok(catalog("New"))).await.unwrap();

        let systems = backend.systems.lock().clone();
        assert!(systems[1].contains("Scheme: Old"));
        assert!(systems[2].contains("Scheme: New"));
        assert!(systems[2].contains(DEFAULT_INSTRUCTIONS));
    }

    #[tokio::test]
    async fn test_close_and_catalog_failure() {
        let assistant = ChatAssistant::new(Arc::new(Recorder::default()), None);
        assert!(assistant
            .send("tok-a", "hi", || Err(Error::Database("locked".into())))
            .await
            .is_err());
        assert!(assistant.sessions().is_empty());

        assistant.send("tok-a", "hi", || Ok(catalog("PMAY"))).await.unwrap();
        assert!(assistant.close("tok-a"));
        assert!(!assistant.close("tok-a"));
    }

    #[tokio::test]
    async fn test_empty_message_starts_nothing() {
        let assistant = ChatAssistant::new(Arc::new(Recorder::default()), None);
        let fetches = AtomicUsize::new(0);
        let err = assistant
            .send("tok-a", "  \n ", || {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(catalog("PMAY"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert!(assistant.sessions().is_empty());
        assert!(!assistant.catalog().is_loaded());
    }

    #[tokio::test]
    async fn test_idle_conversations_are_dropped() {
        let assistant = ChatAssistant::new(Arc::new(Recorder::default()), None)
            .with_idle_limit(Duration::from_millis(30));

        assistant.send("tok-a", "hi", || Ok(catalog("PMAY"))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assistant.send("tok-b", "hi", || Ok(catalog("PMAY"))).await.unwrap();

        assert!(!assistant.sessions().contains("tok-a"));
        assert!(assistant.sessions().contains("tok-b"));
    }
}
