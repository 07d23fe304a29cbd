//! HTTP response wrapper.

use crate::error::FetchError;

/// A successful response with its body read as text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    pub body: String,
}

impl HttpResponse {
    /// Parse the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| {
            FetchError::Parse(format!("invalid JSON from {}: {}", self.final_url, e))
        })
    }
}
