//! HTTP client for channel endpoints and robots.txt.
//!
//! Thin wrapper over reqwest that applies the rotated request identity and a
//! per-request timeout, and maps transport failures onto [`FetchError`]
//! variants with the right retry classification.

mod response;

pub use response::HttpResponse;

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::FetchError;
use crate::ethics::Identity;

/// HTTP client shared by every channel pipeline.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client. Identity headers are applied per request.
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// GET a URL with query parameters, returning the body as text.
    ///
    /// Non-success statuses become [`FetchError::Status`]; 429 and 5xx are
    /// transient, other client errors permanent.
    pub async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        identity: &Identity,
        timeout: Duration,
    ) -> Result<HttpResponse, FetchError> {
        let mut request = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .header(reqwest::header::USER_AGENT, identity.user_agent.as_str());

        for (name, value) in &identity.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        debug!("GET {} -> {}", final_url, status);

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status,
                url: final_url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        Ok(HttpResponse {
            status,
            final_url,
            body,
        })
    }

    /// GET a URL and parse the body as JSON.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(String, String)],
        identity: &Identity,
        timeout: Duration,
    ) -> Result<serde_json::Value, FetchError> {
        let response = self.get(url, query, identity, timeout).await?;
        response.json()
    }
}

fn map_transport_error(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::from(err)
    }
}
