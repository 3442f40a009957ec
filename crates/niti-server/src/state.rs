//! Shared application state.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use niti_chat::{ChatAssistant, ChatBackend, LLMConfig, LlmBackend};
use niti_core::{NitiConfig, Result, ScorerMode};
use niti_intake::{HttpPostalLookup, PostalLookup};
use niti_match::{EligibilityMatcher, HttpScorer, RuleScorer, Scorer};
use niti_store::{PhotoBucket, SqliteStore};
use niti_verify::{HttpVerifier, Verifier};

/// The external services the server talks to.
pub struct Collaborators {
    pub scorer: Arc<dyn Scorer>,
    pub verifier: Arc<dyn Verifier>,
    pub postal: Arc<dyn PostalLookup>,
    pub chat: Arc<dyn ChatBackend>,
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: NitiConfig,
    pub store: Arc<SqliteStore>,
    pub photos: PhotoBucket,
    pub matcher: EligibilityMatcher,
    pub verifier: Arc<dyn Verifier>,
    pub postal: Arc<dyn PostalLookup>,
    pub llm_config: Arc<RwLock<LLMConfig>>,
    pub assistant: ChatAssistant,
}

impl AppState {
    /// Open the store and build HTTP clients from `config`.
    pub fn new(config: NitiConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.data_paths.database)?);
        let llm_config = Arc::new(RwLock::new(LLMConfig::load(
            &config.data_paths.llm_config_file,
        )));
        let timeout = config.http_timeout();

        let scorer: Arc<dyn Scorer> = match config.scorer_mode {
            ScorerMode::Http => Arc::new(HttpScorer::new(&config.scorer_url, timeout)?),
            ScorerMode::Rules => Arc::new(RuleScorer::new(store.clone())),
        };
        let collaborators = Collaborators {
            scorer,
            verifier: Arc::new(HttpVerifier::new(&config.verifier_url, timeout)?),
            postal: Arc::new(HttpPostalLookup::new(&config.postal_url, timeout)?),
            chat: Arc::new(LlmBackend::new(llm_config.clone(), timeout)?),
        };

        Self::with_collaborators(config, store, llm_config, collaborators)
    }

    /// Assemble state around an open store and explicit collaborators.
    pub fn with_collaborators(
        config: NitiConfig,
        store: Arc<SqliteStore>,
        llm_config: Arc<RwLock<LLMConfig>>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let photos = PhotoBucket::new(&config.data_paths.profile_photos)?;
        let matcher = EligibilityMatcher::new(store.clone(), collaborators.scorer);
        let assistant = ChatAssistant::new(collaborators.chat, config.system_prompt.clone())
            .with_idle_limit(config.session_idle_limit());

        info!(
            "State ready: {} profiles, {} schemes, scorer '{}'",
            store.count_profiles()?,
            store.count_schemes()?,
            matcher.scorer_name()
        );

        Ok(Self {
            config,
            store,
            photos,
            matcher,
            verifier: collaborators.verifier,
            postal: collaborators.postal,
            llm_config,
            assistant,
        })
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.config.session_ttl_hours)
    }
}
