//! HTTP plumbing shared by discovery and invocation.
//!
//! Every upstream gets one `reqwest::Client` with its bearer token and JSON
//! content negotiation baked into the default headers. Bodies are streamed
//! into memory up to a fixed limit so a misbehaving upstream cannot make
//! us buffer without bound.

use crate::mcp::error::TransportError;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const MCP_JSON_CONTENT_TYPE: &str = "application/json";
pub const MCP_JSON_ACCEPT: &str = "application/json";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
pub const DEFAULT_DISCOVERY_CONCURRENCY: usize = 4;

/// Tunables applied to every upstream connection.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    /// Deadline for one HTTP attempt, body included.
    pub request_timeout: Duration,
    /// Extra discovery attempts after the first one.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Consecutive failures after which a connection is evicted.
    pub failure_threshold: u32,
    pub max_response_bytes: usize,
    /// Upstreams discovered at the same time by the aggregator.
    pub discovery_concurrency: usize,
    /// Whether an unparseable tool list yields the `mcp_tool` placeholder.
    pub synthesize_placeholder: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            discovery_concurrency: DEFAULT_DISCOVERY_CONCURRENCY,
            synthesize_placeholder: true,
        }
    }
}

/// Builds the per-upstream client with fixed auth and JSON headers.
pub fn build_http_client(api_key: &str) -> Result<reqwest::Client, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(MCP_JSON_CONTENT_TYPE));
    headers.insert(ACCEPT, HeaderValue::from_static(MCP_JSON_ACCEPT));

    if !api_key.trim().is_empty() {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim())).map_err(
            |err| TransportError::Other {
                url: String::new(),
                message: format!("Invalid API key header: {err}"),
            },
        )?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|err| TransportError::Other {
            url: String::new(),
            message: err.to_string(),
        })
}

/// Sends one JSON POST and returns the body text of a 2xx answer.
pub async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    settings: &TransportSettings,
) -> Result<String, TransportError> {
    let response = client
        .post(url)
        .json(body)
        .timeout(settings.request_timeout)
        .send()
        .await
        .map_err(|err| TransportError::from_reqwest(err, url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    read_bounded_body(response, url, settings.max_response_bytes).await
}

/// Like [`post_json`], retrying retryable failures with a fixed delay.
pub async fn post_json_with_retry<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    settings: &TransportSettings,
) -> Result<String, TransportError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match post_json(client, url, body, settings).await {
            Ok(text) => return Ok(text),
            Err(err) if err.is_retryable() && attempt <= settings.max_retries => {
                warn!(
                    url = %url,
                    attempt,
                    max_retries = settings.max_retries,
                    error = %err,
                    "Retrying MCP request"
                );
                tokio::time::sleep(settings.retry_delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn read_bounded_body(
    response: reqwest::Response,
    url: &str,
    limit: usize,
) -> Result<String, TransportError> {
    if let Some(length) = response.content_length() {
        if length > limit as u64 {
            return Err(TransportError::ResponseTooLarge { limit });
        }
    }

    let mut body: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| TransportError::from_reqwest(err, url))?;
        if body.len() + chunk.len() > limit {
            return Err(TransportError::ResponseTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }

    debug!(url = %url, bytes = body.len(), "Read MCP response body");
    Ok(String::from_utf8_lossy(&body).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::test_support::{MockResponse, MockServer};

    fn fast_settings() -> TransportSettings {
        TransportSettings {
            retry_delay: Duration::from_millis(5),
            request_timeout: Duration::from_secs(5),
            ..TransportSettings::default()
        }
    }

    #[tokio::test]
    async fn client_sends_bearer_token_and_json_headers() {
        let server = MockServer::start(vec![MockResponse::json(200, "{}")]).await;
        let client = build_http_client(" sk-test ").expect("client should build");

        post_json(
            &client,
            &server.url("/tools"),
            &serde_json::json!({}),
            &fast_settings(),
        )
        .await
        .expect("request should succeed");

        let requests = server.requests().await;
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
        assert_eq!(request.header("accept"), Some(MCP_JSON_ACCEPT));
        assert_eq!(request.header("content-type"), Some(MCP_JSON_CONTENT_TYPE));
    }

    #[tokio::test]
    async fn blank_api_key_sends_no_authorization() {
        let server = MockServer::start(vec![MockResponse::json(200, "{}")]).await;
        let client = build_http_client("  ").expect("client should build");

        post_json(
            &client,
            &server.url("/tools"),
            &serde_json::json!({}),
            &fast_settings(),
        )
        .await
        .expect("request should succeed");

        let requests = server.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("authorization"), None);
        assert_eq!(requests[0].header("accept"), Some(MCP_JSON_ACCEPT));
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start(vec![
            MockResponse::status(503, "busy"),
            MockResponse::status(500, "oops"),
            MockResponse::json(200, r#"{"tools":[]}"#),
        ])
        .await;
        let client = build_http_client("").unwrap();

        let body = post_json_with_retry(
            &client,
            &server.url("/tools"),
            &serde_json::json!({}),
            &fast_settings(),
        )
        .await
        .expect("third attempt should succeed");

        assert_eq!(body, r#"{"tools":[]}"#);
        assert_eq!(server.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_configured_retries() {
        let server = MockServer::start(vec![MockResponse::status(500, "down"); 5]).await;
        let client = build_http_client("").unwrap();

        let err = post_json_with_retry(
            &client,
            &server.url("/tools"),
            &serde_json::json!({}),
            &fast_settings(),
        )
        .await
        .expect_err("all attempts fail");

        assert!(matches!(err, TransportError::Status { status: 500, .. }));
        // one initial attempt plus three retries
        assert_eq!(server.requests().await.len(), 4);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_without_retry() {
        let big = "x".repeat(2048);
        let server = MockServer::start(vec![MockResponse::json(200, &big); 2]).await;
        let client = build_http_client("").unwrap();
        let settings = TransportSettings {
            max_response_bytes: 1024,
            ..fast_settings()
        };

        let err = post_json_with_retry(
            &client,
            &server.url("/tools"),
            &serde_json::json!({}),
            &settings,
        )
        .await
        .expect_err("body is over the limit");

        assert_eq!(err, TransportError::ResponseTooLarge { limit: 1024 });
        assert_eq!(server.requests().await.len(), 1);
    }
}
