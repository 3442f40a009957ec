//! Postal-code lookup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use niti_core::{Address, Error, Result};

/// Resolves a pincode to its state and city.
#[async_trait]
pub trait PostalLookup: Send + Sync {
    /// `Ok(None)` when the service does not recognise the code.
    async fn resolve(&self, pincode: &str) -> Result<Option<Address>>;
}

/// Client for `GET {base}/pincode/{code}`.
pub struct HttpPostalLookup {
    client: Client,
    base_url: String,
}

impl HttpPostalLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("postal client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PostalLookup for HttpPostalLookup {
    async fn resolve(&self, pincode: &str) -> Result<Option<Address>> {
        let url = format!("{}/pincode/{}", self.base_url, pincode);
        debug!("Resolving pincode via {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::PostalLookup(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Postal lookup returned {} for {}", status, pincode);
            return Err(Error::PostalLookup(format!("status {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::PostalLookup(format!("invalid JSON: {}", e)))?;
        Ok(parse_post_office(pincode, &body))
    }
}

/// Read the first post office out of a lookup response.
///
/// The body is an array whose first entry carries `Status` and
/// `PostOffice`. Anything other than `Status == "Success"` with at least one
/// post office is a rejection.
pub fn parse_post_office(pincode: &str, body: &Value) -> Option<Address> {
    let entry = body.as_array()?.first()?;
    if entry.get("Status").and_then(Value::as_str) != Some("Success") {
        return None;
    }
    let office = entry.get("PostOffice")?.as_array()?.first()?;
    let state = office.get("State")?.as_str()?;
    let city = office.get("District")?.as_str()?;
    Some(Address {
        pincode: pincode.to_string(),
        state: state.to_string(),
        city: city.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn delhi() -> Value {
        json!([{
            "Message": "Number of pincode(s) found:1",
            "Status": "Success",
            "PostOffice": [{
                "Name": "Connaught Place",
                "District": "Central Delhi",
                "State": "Delhi",
                "Country": "India"
            }]
        }])
    }

    #[test]
    fn test_parse_success() {
        let address = parse_post_office("110001", &delhi()).unwrap();
        assert_eq!(address.state, "Delhi");
        assert_eq!(address.city, "Central Delhi");
        assert_eq!(address.pincode, "110001");
    }

    #[test]
    fn test_parse_rejections() {
        let not_found = json!([{ "Message": "No records found", "Status": "Error", "PostOffice": null }]);
        assert!(parse_post_office("999999", &not_found).is_none());

        let empty = json!([{ "Status": "Success", "PostOffice": [] }]);
        assert!(parse_post_office("999999", &empty).is_none());

        assert!(parse_post_office("999999", &json!({})).is_none());
    }

    #[tokio::test]
    async fn test_http_lookup() {
        let router = Router::new().route(
            "/pincode/{code}",
            get(|Path(code): Path<String>| async move {
                if code == "110001" {
                    Json(delhi())
                } else {
                    Json(json!([{ "Status": "Error", "PostOffice": null }]))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let lookup =
            HttpPostalLookup::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let address = lookup.resolve("110001").await.unwrap().unwrap();
        assert_eq!(address.state, "Delhi");
        assert!(lookup.resolve("999999").await.unwrap().is_none());
    }
}
