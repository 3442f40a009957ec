//! Scorer seam and the HTTP client for the external recommendation process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use niti_core::{Error, Result};

/// Maps a user's email to the ids of schemes they qualify for.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, email: &str) -> Result<Vec<String>>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Client for `POST /get_recommendations`.
pub struct HttpScorer {
    client: Client,
    base_url: String,
}

impl HttpScorer {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("scorer client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score(&self, email: &str) -> Result<Vec<String>> {
        let url = format!("{}/get_recommendations", self.base_url);
        debug!("Requesting recommendations from {}", url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(|e| Error::Scorer(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body["error"].as_str().map(str::to_string))
                .unwrap_or_else(|| "Failed to fetch recommendations".to_string());
            warn!("Scorer returned {}: {}", status, detail);
            return Err(Error::Scorer(format!("status {}: {}", status, detail)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Scorer(format!("invalid JSON: {}", e)))?;
        parse_scheme_ids(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Extract `eligible_scheme_ids`. Integer ids are accepted as their decimal form.
pub fn parse_scheme_ids(body: &Value) -> Result<Vec<String>> {
    let Some(items) = body.get("eligible_scheme_ids").and_then(Value::as_array) else {
        return Err(Error::Scorer(
            "malformed response: eligible_scheme_ids missing or not an array".into(),
        ));
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            other => Err(Error::Scorer(format!(
                "malformed response: unexpected scheme id {}",
                other
            ))),
        })
        .collect()
}
