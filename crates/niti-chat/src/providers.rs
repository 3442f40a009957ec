//! External LLM providers.
//!
//! Gemini uses `generateContent` with a system instruction and
//! `user`/`model` turns. OpenAI and Groq share the chat-completions format.
//! One request per turn, no streaming.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use niti_core::{Error, Result};

use crate::config::{LLMConfig, ResolvedProvider};
use crate::types::{ChatMessage, GenerationConfig, LLMProvider};

/// Produces the next model turn for a conversation.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, system: &str, history: &[ChatMessage]) -> Result<String>;
}

/// Provider base URLs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub gemini: String,
    pub openai: String,
    pub groq: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gemini: "https://generativelanguage.googleapis.com/v1beta".into(),
            openai: "https://api.openai.com/v1".into(),
            groq: "https://api.groq.com/openai/v1".into(),
        }
    }
}

/// Backend that reads the shared `LLMConfig` on every call, so config
/// changes apply to the next turn.
pub struct LlmBackend {
    client: Client,
    config: Arc<RwLock<LLMConfig>>,
    endpoints: Endpoints,
}

impl LlmBackend {
    pub fn new(config: Arc<RwLock<LLMConfig>>, timeout: Duration) -> Result<Self> {
        Self::with_endpoints(config, timeout, Endpoints::default())
    }

    pub fn with_endpoints(
        config: Arc<RwLock<LLMConfig>>,
        timeout: Duration,
        endpoints: Endpoints,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("chat client: {}", e)))?;
        Ok(Self {
            client,
            config,
            endpoints,
        })
    }
}

#[async_trait]
impl ChatBackend for LlmBackend {
    async fn complete(&self, system: &str, history: &[ChatMessage]) -> Result<String> {
        let (resolved, generation) = {
            let config = self.config.read();
            let resolved = config
                .resolve_provider()
                .ok_or_else(|| Error::Chat("no LLM provider configured".into()))?;
            (resolved, config.generation.clone())
        };

        let ResolvedProvider {
            provider,
            model,
            api_key,
        } = resolved;
        debug!("Chat turn via {} ({})", provider, model);

        match provider {
            LLMProvider::Gemini => {
                complete_gemini(
                    &self.client,
                    &self.endpoints.gemini,
                    &model,
                    &api_key,
                    system,
                    history,
                    &generation,
                )
                .await
            }
            LLMProvider::OpenAI => {
                complete_openai_compat(
                    &self.client,
                    &self.endpoints.openai,
                    &model,
                    &api_key,
                    system,
                    history,
                    &generation,
                )
                .await
            }
            LLMProvider::Groq => {
                complete_openai_compat(
                    &self.client,
                    &self.endpoints.groq,
                    &model,
                    &api_key,
                    system,
                    history,
                    &generation,
                )
                .await
            }
        }
    }
}

async fn complete_gemini(
    client: &Client,
    base: &str,
    model: &str,
    api_key: &str,
    system: &str,
    history: &[ChatMessage],
    generation: &GenerationConfig,
) -> Result<String> {
    let url = format!("{}/models/{}:generateContent", base.trim_end_matches('/'), model);
    let contents: Vec<Value> = history
        .iter()
        .map(|m| {
            let role = if m.role == "assistant" { "model" } else { m.role.as_str() };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut generation_config = serde_json::to_value(generation)?;
    generation_config["responseMimeType"] = json!("text/plain");

    let body = json!({
        "systemInstruction": { "parts": [{ "text": system }] },
        "contents": contents,
        "generationConfig": generation_config,
    });

    let parsed = post_json(
        client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body),
    )
    .await?;

    let text: String = parsed["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        let reason = parsed["candidates"][0]["finishReason"]
            .as_str()
            .or_else(|| parsed["promptFeedback"]["blockReason"].as_str())
            .unwrap_or("no candidates");
        return Err(Error::Chat(format!("empty reply: {}", reason)));
    }
    Ok(text)
}

async fn complete_openai_compat(
    client: &Client,
    base: &str,
    model: &str,
    api_key: &str,
    system: &str,
    history: &[ChatMessage],
    generation: &GenerationConfig,
) -> Result<String> {
    let url = format!("{}/chat/completions", base.trim_end_matches('/'));
    let mut messages = vec![json!({ "role": "system", "content": system })];
    messages.extend(
        history
            .iter()
            .map(|m| json!({ "role": m.role, "content": m.content })),
    );

    let body = json!({
        "model": model,
        "messages": messages,
        "temperature": generation.temperature,
        "top_p": generation.top_p,
        "max_tokens": generation.max_output_tokens,
    });

    let parsed = post_json(client.post(&url).bearer_auth(api_key).json(&body)).await?;
    parsed["choices"][0]["message"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Chat("empty reply".into()))
}

async fn post_json(request: reqwest::RequestBuilder) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::Chat(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("LLM API error {}: {}", status, body);
        return Err(Error::Chat(format!("API error {}", status)));
    }

    response
        .json()
        .await
        .map_err(|e| Error::Chat(format!("invalid JSON: {}", e)))
}
