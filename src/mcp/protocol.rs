//! JSON-RPC envelopes exchanged with upstream `/tools` endpoints.

use crate::mcp::types::ToolArguments;
use chrono::Utc;
use rust_mcp_schema::CallToolRequestParams;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

pub const JSONRPC_VERSION: &str = "2.0";
pub const TOOLS_LIST_METHOD: &str = "tools/list";
pub const TOOLS_CALL_METHOD: &str = "tools/call";

/// Path appended to every upstream base URL. Listing and calling share it
/// and are told apart by `method`.
pub const MCP_TOOLS_PATH: &str = "/tools";

const LIST_TOOLS_ID_PREFIX: &str = "list-tools";
const CALL_TOOL_ID_PREFIX: &str = "call-tool";

static NEXT_REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: &'static str,
    pub params: P,
}

/// Process-unique id of the form `<prefix>-<unix millis>-<seq>`.
pub fn next_request_id(prefix: &str) -> String {
    let seq = NEXT_REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{seq}", Utc::now().timestamp_millis())
}

pub fn list_tools_request() -> JsonRpcRequest<Value> {
    JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION,
        id: next_request_id(LIST_TOOLS_ID_PREFIX),
        method: TOOLS_LIST_METHOD,
        params: json!({}),
    }
}

pub fn call_tool_request(
    tool_name: &str,
    arguments: ToolArguments,
) -> JsonRpcRequest<CallToolRequestParams> {
    JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION,
        id: next_request_id(CALL_TOOL_ID_PREFIX),
        method: TOOLS_CALL_METHOD,
        params: CallToolRequestParams::new(tool_name).with_arguments(arguments),
    }
}

/// Joins a base URL and the tools path without doubling slashes.
pub fn tools_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), MCP_TOOLS_PATH)
}

/// Extracts `(code, message)` from a JSON-RPC error envelope that carries
/// no `result`.
pub fn rpc_error(body: &Value) -> Option<(i64, String)> {
    if body.get("result").is_some() {
        return None;
    }
    let error = body.get("error")?.as_object()?;
    let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string();
    Some((code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_request_has_empty_params_object() {
        let request = serde_json::to_value(list_tools_request()).unwrap();
        assert_eq!(request["jsonrpc"], "2.0");
        assert_eq!(request["method"], "tools/list");
        assert_eq!(request["params"], json!({}));
        assert!(request["id"].as_str().unwrap().starts_with("list-tools-"));
    }

    #[test]
    fn call_request_carries_name_and_arguments() {
        let mut arguments = ToolArguments::new();
        arguments.insert("order_id".into(), json!("A-17"));
        let request = serde_json::to_value(call_tool_request("lookup_order", arguments)).unwrap();

        assert_eq!(request["method"], "tools/call");
        assert_eq!(request["params"]["name"], "lookup_order");
        assert_eq!(request["params"]["arguments"]["order_id"], "A-17");
    }

    #[test]
    fn request_ids_are_unique() {
        let first = next_request_id("x");
        let second = next_request_id("x");
        assert_ne!(first, second);
    }

    #[test]
    fn tools_url_trims_trailing_slashes() {
        assert_eq!(tools_url("http://mcp.local/api/"), "http://mcp.local/api/tools");
        assert_eq!(tools_url("http://mcp.local/api"), "http://mcp.local/api/tools");
    }

    #[test]
    fn rpc_error_ignores_successful_envelopes() {
        assert_eq!(
            rpc_error(&json!({"error": {"code": -32601, "message": "no such method"}})),
            Some((-32601, "no such method".to_string()))
        );
        assert_eq!(rpc_error(&json!({"result": {}, "error": null})), None);
        assert_eq!(rpc_error(&json!({"error": "plain string"})), None);
    }
}
