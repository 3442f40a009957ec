//! LLM configuration persistence and provider selection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use niti_core::{Error, Result};

use crate::types::{GenerationConfig, LLMConfigResponse, LLMConfigUpdate, LLMProvider};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-8b";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

pub const GEMINI_MODELS: &[&str] = &["gemini-1.5-flash-8b", "gemini-1.5-flash", "gemini-1.5-pro"];
pub const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo"];
pub const GROQ_MODELS: &[&str] = &[
    "llama-3.3-70b-versatile",
    "llama-3.1-8b-instant",
    "gemma2-9b-it",
];

/// Stored LLM configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "auto".into(),
            gemini_api_key: None,
            openai_api_key: None,
            groq_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.into(),
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            groq_model: DEFAULT_GROQ_MODEL.into(),
            generation: GenerationConfig::default(),
            config_path: PathBuf::new(),
        }
    }
}

/// The resolved choice for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub provider: LLMProvider,
    pub model: String,
    pub api_key: String,
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: LLMConfig = match std::fs::read_to_string(config_path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring unreadable {}: {}", config_path.display(), e);
                LLMConfig::default()
            }),
            Err(_) => LLMConfig::default(),
        };

        config.config_path = config_path.to_path_buf();

        // Env vars as fallback for API keys
        if config.gemini_api_key.is_none() {
            config.gemini_api_key = non_empty_env("GEMINI_API_KEY");
        }
        if config.openai_api_key.is_none() {
            config.openai_api_key = non_empty_env("OPENAI_API_KEY");
        }
        if config.groq_api_key.is_none() {
            config.groq_api_key = non_empty_env("GROQ_API_KEY");
        }

        config
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved LLM config to {}", self.config_path.display());
        Ok(())
    }

    /// Apply an update, merging with existing config. An empty key clears it.
    pub fn apply_update(&mut self, update: &LLMConfigUpdate) -> Result<()> {
        if let Some(p) = &update.preferred_provider {
            if !matches!(p.as_str(), "auto" | "gemini" | "openai" | "groq") {
                return Err(Error::field(
                    "preferredProvider",
                    format!("Unknown provider: {}", p),
                ));
            }
            self.preferred_provider = p.clone();
        }
        if let Some(k) = &update.gemini_api_key {
            self.gemini_api_key = some_key(k);
        }
        if let Some(k) = &update.openai_api_key {
            self.openai_api_key = some_key(k);
        }
        if let Some(k) = &update.groq_api_key {
            self.groq_api_key = some_key(k);
        }
        if let Some(m) = &update.gemini_model {
            self.gemini_model = m.clone();
        }
        if let Some(m) = &update.openai_model {
            self.openai_model = m.clone();
        }
        if let Some(m) = &update.groq_model {
            self.groq_model = m.clone();
        }
        if let Some(g) = &update.generation {
            self.generation = g.clone();
        }
        Ok(())
    }

    /// Resolve which provider and model to use.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        let pick = |provider: LLMProvider| {
            let (key, model) = match provider {
                LLMProvider::Gemini => (&self.gemini_api_key, &self.gemini_model),
                LLMProvider::OpenAI => (&self.openai_api_key, &self.openai_model),
                LLMProvider::Groq => (&self.groq_api_key, &self.groq_model),
            };
            key.as_ref().map(|k| ResolvedProvider {
                provider,
                model: model.clone(),
                api_key: k.clone(),
            })
        };

        match self.preferred_provider.as_str() {
            "gemini" => pick(LLMProvider::Gemini),
            "openai" => pick(LLMProvider::OpenAI),
            "groq" => pick(LLMProvider::Groq),
            // Auto mode: Gemini > Groq > OpenAI
            _ => pick(LLMProvider::Gemini)
                .or_else(|| pick(LLMProvider::Groq))
                .or_else(|| pick(LLMProvider::OpenAI)),
        }
    }

    /// Build the public config response with keys masked.
    pub fn to_response(&self) -> LLMConfigResponse {
        LLMConfigResponse {
            preferred_provider: self.preferred_provider.clone(),
            gemini_key: self.gemini_api_key.as_deref().map(mask_key),
            openai_key: self.openai_api_key.as_deref().map(mask_key),
            groq_key: self.groq_api_key.as_deref().map(mask_key),
            gemini_model: self.gemini_model.clone(),
            openai_model: self.openai_model.clone(),
            groq_model: self.groq_model.clone(),
            generation: self.generation.clone(),
            active_provider: self.resolve_provider().map(|r| r.provider.to_string()),
            available_models: self.available_models(),
        }
    }

    /// Get available models for the active provider.
    pub fn available_models(&self) -> Vec<String> {
        let models: &[&str] = match self.resolve_provider().map(|r| r.provider) {
            Some(LLMProvider::Gemini) => GEMINI_MODELS,
            Some(LLMProvider::OpenAI) => OPENAI_MODELS,
            Some(LLMProvider::Groq) => GROQ_MODELS,
            None => &[],
        };
        models.iter().map(|s| s.to_string()).collect()
    }
}

/// Keep the last four characters of a key.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".into();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

fn some_key(k: &str) -> Option<String> {
    let k = k.trim();
    (!k.is_empty()).then(|| k.to_string())
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| some_key(&v))
}
