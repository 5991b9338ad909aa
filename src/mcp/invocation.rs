//! `tools/call` against a single upstream.
//!
//! Calls are made exactly once. Tools may have side effects, so a failed
//! call is reported back to the model instead of being retried.

use crate::mcp::error::{InvocationError, TransportError};
use crate::mcp::protocol::{call_tool_request, rpc_error, tools_url};
use crate::mcp::registry::{ConnectionHandle, ConnectionRegistry};
use crate::mcp::transport::post_json;
use crate::mcp::types::{CallResult, ToolArguments};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Parses the raw argument string the chat layer hands over.
///
/// A JSON object is used as-is. Otherwise simple `key:value` pairs
/// separated by commas are accepted, with quotes and braces stripped. Anything
/// else yields an empty map.
pub fn parse_arguments(raw: &str) -> ToolArguments {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ToolArguments::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => return map,
        Ok(other) => {
            debug!(kind = json_kind(&other), "Tool arguments are JSON but not an object");
            return ToolArguments::new();
        }
        Err(_) => {}
    }

    let arguments = parse_loose_pairs(trimmed);
    if arguments.is_empty() {
        warn!(raw = %trimmed, "Could not parse tool arguments, calling with none");
    } else {
        debug!(count = arguments.len(), "Parsed tool arguments from key:value pairs");
    }
    arguments
}

fn parse_loose_pairs(raw: &str) -> ToolArguments {
    raw.split(',')
        .filter_map(|pair| {
            let parts: Vec<&str> = pair.split(':').collect();
            let [key, value] = parts.as_slice() else {
                return None;
            };
            let key = strip_loose(key);
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), Value::String(strip_loose(value).to_string())))
        })
        .collect()
}

fn strip_loose(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '{' | '}'))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub struct ToolInvocationClient {
    registry: Arc<ConnectionRegistry>,
}

impl ToolInvocationClient {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Calls `tool_name` with the raw argument string. Never fails: errors
    /// come back as [`CallResult::Error`].
    pub async fn invoke(
        &self,
        handle: &ConnectionHandle,
        base_url: &str,
        tool_name: &str,
        raw_arguments: &str,
    ) -> CallResult {
        match self
            .try_invoke(handle, base_url, tool_name, parse_arguments(raw_arguments))
            .await
        {
            Ok(result) => result,
            Err(err) => {
                warn!(connection = %handle.key(), tool = %tool_name, error = %err, "MCP tool call failed");
                CallResult::Error(err.to_string())
            }
        }
    }

    /// Same as [`invoke`](Self::invoke) but with parsed arguments and a typed
    /// error.
    pub async fn try_invoke(
        &self,
        handle: &ConnectionHandle,
        base_url: &str,
        tool_name: &str,
        arguments: ToolArguments,
    ) -> Result<CallResult, InvocationError> {
        let url = tools_url(base_url);
        let request = call_tool_request(tool_name, arguments);
        debug!(url = %url, request_id = %request.id, tool = %tool_name, "Sending MCP tools/call request");

        let body = match post_json(handle.client(), &url, &request, self.registry.settings()).await
        {
            Ok(body) => body,
            Err(err) => {
                self.count_failure(handle, &err);
                return Err(err.into());
            }
        };
        self.registry.record_success(handle.key());

        let result = match serde_json::from_str::<Value>(body.trim()) {
            Ok(value) => {
                if let Some((code, message)) = rpc_error(&value) {
                    return Err(InvocationError::Rpc { code, message });
                }
                CallResult::Structured(value)
            }
            Err(_) => CallResult::Text(body),
        };
        info!(connection = %handle.key(), tool = %tool_name, "MCP tool call completed");
        Ok(result)
    }

    fn count_failure(&self, handle: &ConnectionHandle, err: &TransportError) {
        let health = self.registry.record_failure(handle.key());
        debug!(connection = %handle.key(), error = %err, health = ?health, "Counted MCP call failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::test_support::{unreachable_base_url, MockResponse, MockServer};
    use serde_json::json;

    #[test]
    fn json_object_arguments_are_used_verbatim() {
        let args = parse_arguments(r#"{"order_id": "A-17", "limit": 3, "nested": {"x": true}}"#);
        assert_eq!(args["order_id"], "A-17");
        assert_eq!(args["limit"], 3);
        assert_eq!(args["nested"], json!({"x": true}));
    }

    #[test]
    fn loose_pairs_are_accepted() {
        let args = parse_arguments(r#"{order_id: "A-17", region:eu}"#);
        assert_eq!(args.len(), 2);
        assert_eq!(args["order_id"], "A-17");
        assert_eq!(args["region"], "eu");
    }

    #[test]
    fn pairs_with_extra_colons_are_dropped() {
        let args = parse_arguments("url:http://x, id:7");
        assert_eq!(args.len(), 1);
        assert_eq!(args["id"], "7");
    }

    #[test]
    fn unparseable_arguments_become_empty_map() {
        assert!(parse_arguments("not json").is_empty());
        assert!(parse_arguments("").is_empty());
        assert!(parse_arguments("[1, 2]").is_empty());
    }

    #[tokio::test]
    async fn unparseable_arguments_still_call_with_empty_map() {
        let server = MockServer::start(vec![MockResponse::json(200, r#"{"result":"ok"}"#)]).await;
        let registry = Arc::new(ConnectionRegistry::default());
        let client = ToolInvocationClient::new(Arc::clone(&registry));
        let handle = registry.get_or_create(&server.base_url(), "k").unwrap();

        let result = client
            .invoke(&handle, &server.base_url(), "lookup_order", "not json")
            .await;
        assert_eq!(result, CallResult::Structured(json!({"result": "ok"})));

        let requests = server.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method(), "tools/call");
        assert_eq!(requests[0].body["params"]["name"], "lookup_order");
        assert_eq!(requests[0].body["params"]["arguments"], json!({}));
        assert!(requests[0].body["id"]
            .as_str()
            .unwrap()
            .starts_with("call-tool-"));
    }

    #[tokio::test]
    async fn server_error_becomes_error_payload_without_retry() {
        let server = MockServer::start(vec![MockResponse::status(500, "boom")]).await;
        let registry = Arc::new(ConnectionRegistry::default());
        let client = ToolInvocationClient::new(Arc::clone(&registry));
        let handle = registry.get_or_create(&server.base_url(), "").unwrap();

        let result = client
            .invoke(&handle, &server.base_url(), "refund", r#"{"order_id":"A-17"}"#)
            .await;
        assert!(result.is_error());

        let payload: Value = serde_json::from_str(&result.into_payload()).unwrap();
        assert!(payload["error"].as_str().unwrap().contains("500"));
        assert_eq!(server.requests().await.len(), 1);
        assert_eq!(registry.failure_count(handle.key()), 1);
    }

    #[tokio::test]
    async fn rpc_error_envelope_becomes_error_payload() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"jsonrpc":"2.0","id":"1","error":{"code":-32602,"message":"bad order id"}}"#,
        )])
        .await;
        let registry = Arc::new(ConnectionRegistry::default());
        let client = ToolInvocationClient::new(Arc::clone(&registry));
        let handle = registry.get_or_create(&server.base_url(), "").unwrap();

        let err = client
            .try_invoke(&handle, &server.base_url(), "refund", ToolArguments::new())
            .await
            .expect_err("rpc error");
        assert_eq!(
            err,
            InvocationError::Rpc {
                code: -32602,
                message: "bad order id".to_string()
            }
        );
    }

    #[tokio::test]
    async fn text_body_is_returned_verbatim() {
        let server = MockServer::start(vec![MockResponse::text(200, "Order A-17 shipped")]).await;
        let registry = Arc::new(ConnectionRegistry::default());
        let client = ToolInvocationClient::new(Arc::clone(&registry));
        let handle = registry.get_or_create(&server.base_url(), "").unwrap();

        let result = client
            .invoke(&handle, &server.base_url(), "track", "{}")
            .await;
        assert_eq!(result.into_payload(), "Order A-17 shipped");
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_error_payload() {
        let base_url = unreachable_base_url().await;
        let registry = Arc::new(ConnectionRegistry::default());
        let client = ToolInvocationClient::new(Arc::clone(&registry));
        let handle = registry.get_or_create(&base_url, "").unwrap();

        let result = client.invoke(&handle, &base_url, "track", "{}").await;
        assert!(result.is_error());
    }
}
