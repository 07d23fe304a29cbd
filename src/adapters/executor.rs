//! Runs a [`ChannelRequest`] over HTTP or through the page renderer.

use std::sync::Arc;
use std::time::Duration;

use super::{ChannelRequest, RawResponse};
use crate::browser::{PageRenderer, RenderRequest};
use crate::error::FetchError;
use crate::ethics::Identity;
use crate::http_client::HttpClient;
use crate::models::Channel;

#[derive(Clone)]
pub struct RequestExecutor {
    http: HttpClient,
    renderer: Option<Arc<dyn PageRenderer>>,
}

impl RequestExecutor {
    pub fn new(http: HttpClient, renderer: Option<Arc<dyn PageRenderer>>) -> Self {
        Self { http, renderer }
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub async fn execute(
        &self,
        channel: Channel,
        request: &ChannelRequest,
        identity: &Identity,
        timeout: Duration,
    ) -> Result<RawResponse, FetchError> {
        match request {
            ChannelRequest::Api {
                url,
                query,
                headers,
            } => {
                let identity = with_headers(identity, headers);
                let json = self.http.get_json(url, query, &identity, timeout).await?;
                Ok(RawResponse::Json(json))
            }
            ChannelRequest::Page { url, query } => {
                let response = self.http.get(url, query, identity, timeout).await?;
                Ok(RawResponse::Html(response.body))
            }
            ChannelRequest::Rendered {
                url,
                wait_for,
                regions,
            } => {
                let renderer = self
                    .renderer
                    .as_ref()
                    .ok_or(FetchError::RendererUnavailable(channel))?;
                let texts = renderer
                    .render(&RenderRequest {
                        channel,
                        url: url.clone(),
                        wait_for: wait_for.clone(),
                        regions: regions.clone(),
                        user_agent: identity.user_agent.clone(),
                        timeout,
                    })
                    .await?;
                Ok(RawResponse::Rendered(texts))
            }
        }
    }
}

/// Identity with request-specific headers layered over its own.
fn with_headers(identity: &Identity, extra: &[(String, String)]) -> Identity {
    let mut merged = identity.clone();
    for (name, value) in extra {
        merged.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        merged.headers.push((name.clone(), value.clone()));
    }
    merged
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn identity() -> Identity {
        Identity {
            user_agent: "test-agent".to_string(),
            headers: vec![("Accept".to_string(), "text/html".to_string())],
        }
    }

    #[test]
    fn request_headers_override_identity_headers() {
        let merged = with_headers(
            &identity(),
            &[("accept".to_string(), "application/json".to_string())],
        );
        assert_eq!(
            merged.headers,
            vec![("accept".to_string(), "application/json".to_string())]
        );
    }

    #[tokio::test]
    async fn api_requests_return_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("listing_id", "1"))
            .and(header("x-api-key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let executor = RequestExecutor::new(HttpClient::new().unwrap(), None);
        let request = ChannelRequest::Api {
            url: format!("{}/api", server.uri()),
            query: vec![("listing_id".to_string(), "1".to_string())],
            headers: vec![("X-Api-Key".to_string(), "k".to_string())],
        };
        let raw = executor
            .execute(Channel::Airbnb, &request, &identity(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(raw, RawResponse::Json(serde_json::json!({"ok": true})));
    }

    #[tokio::test]
    async fn rendered_request_without_renderer_is_permanent() {
        let executor = RequestExecutor::new(HttpClient::new().unwrap(), None);
        let request = ChannelRequest::Rendered {
            url: "https://www.vrbo.com/1".to_string(),
            wait_for: None,
            regions: vec![],
        };
        let err = executor
            .execute(Channel::Vrbo, &request, &identity(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RendererUnavailable(Channel::Vrbo)));
        assert!(!err.is_retryable());
    }
}
