//! Verifier seam and its HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use niti_core::{Error, Result};

/// Body of `POST /verify_aadhaar`. Images travel as standard base64.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyRequest {
    pub email: String,
    pub front_image: String,
    pub back_image: String,
}

impl VerifyRequest {
    pub fn encode(email: &str, front: &[u8], back: &[u8]) -> Self {
        Self {
            email: email.to_string(),
            front_image: STANDARD.encode(front),
            back_image: STANDARD.encode(back),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verified: bool,
}

/// Decides whether the card images match the stored profile.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn check(&self, request: &VerifyRequest) -> Result<bool>;
}

pub struct HttpVerifier {
    client: Client,
    base_url: String,
}

impl HttpVerifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("verifier client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    async fn check(&self, request: &VerifyRequest) -> Result<bool> {
        let url = format!("{}/verify_aadhaar", self.base_url);
        debug!(
            "Submitting {} + {} base64 bytes to {}",
            request.front_image.len(),
            request.back_image.len(),
            url
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Verifier(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Verifier returned {}", status);
            return Err(Error::Verifier(format!("status {}", status)));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| Error::Verifier(format!("malformed response: {}", e)))?;
        Ok(body.verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_request_encodes_images() {
        let request = VerifyRequest::encode("a@b.com", b"front", b"\xff\x00");
        assert_eq!(request.front_image, "ZnJvbnQ=");
        assert_eq!(request.back_image, "/wA=");
    }

    #[tokio::test]
    async fn test_http_verifier_passes_verdict_through() {
        let router = Router::new().route(
            "/verify_aadhaar",
            post(|Json(body): Json<Value>| async move {
                let ok = body["email"] == "a@b.com" && body["front_image"] == "ZnJvbnQ=";
                Json(json!({ "verified": ok }))
            }),
        );
        let verifier = HttpVerifier::new(&serve(router).await, Duration::from_secs(5)).unwrap();

        let yes = VerifyRequest::encode("a@b.com", b"front", b"back");
        assert!(verifier.check(&yes).await.unwrap());
        let no = VerifyRequest::encode("c@d.com", b"front", b"back");
        assert!(!verifier.check(&no).await.unwrap());
    }

    #[tokio::test]
    async fn test_http_verifier_errors() {
        let router = Router::new()
            .route(
                "/verify_aadhaar",
                post(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "verified": false })),
                    )
                }),
            );
        let verifier = HttpVerifier::new(&serve(router).await, Duration::from_secs(5)).unwrap();
        let request = VerifyRequest::encode("a@b.com", b"f", b"b");
        assert!(matches!(verifier.check(&request).await, Err(Error::Verifier(_))));

        let garbled = Router::new().route("/verify_aadhaar", post(|| async { "ok" }));
        let verifier = HttpVerifier::new(&serve(garbled).await, Duration::from_secs(5)).unwrap();
        assert!(matches!(verifier.check(&request).await, Err(Error::Verifier(_))));
    }
}
