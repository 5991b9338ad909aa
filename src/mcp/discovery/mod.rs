//! `tools/list` against a single upstream.

pub mod parse;


use crate::mcp::error::DiscoveryError;
use crate::mcp::protocol::{list_tools_request, tools_url};
use crate::mcp::registry::{ConnectionHandle, ConnectionRegistry};
use crate::mcp::transport::post_json_with_retry;
use crate::mcp::types::ToolSet;
use parse::{default_strategies, parse_with, ParseStrategy, ParseTier, ParsedTools};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ToolDiscoveryClient {
    registry: Arc<ConnectionRegistry>,
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl ToolDiscoveryClient {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_strategies(registry, default_strategies())
    }

    /// Uses a custom parse chain, tried in the given order.
    pub fn with_strategies(
        registry: Arc<ConnectionRegistry>,
        strategies: Vec<Box<dyn ParseStrategy>>,
    ) -> Self {
        Self {
            registry,
            strategies,
        }
    }

    /// Fetches and parses the upstream's tool list.
    pub async fn discover(
        &self,
        handle: &ConnectionHandle,
        base_url: &str,
    ) -> Result<ToolSet, DiscoveryError> {
        self.discover_parsed(handle, base_url)
            .await
            .map(|parsed| parsed.tools)
    }

    /// Like [`discover`](Self::discover), also reporting which parse tier
    /// matched.
    pub async fn discover_parsed(
        &self,
        handle: &ConnectionHandle,
        base_url: &str,
    ) -> Result<ParsedTools, DiscoveryError> {
        let settings = self.registry.settings();
        let url = tools_url(base_url);
        let request = list_tools_request();
        debug!(url = %url, request_id = %request.id, "Sending MCP tools/list request");

        let body = match post_json_with_retry(handle.client(), &url, &request, settings).await {
            Ok(body) => body,
            Err(err) => {
                let health = self.registry.record_failure(handle.key());
                warn!(
                    connection = %handle.key(),
                    error = %err,
                    health = ?health,
                    "MCP tool discovery failed"
                );
                return Err(err.into());
            }
        };

        if body.trim().is_empty() {
            let health = self.registry.record_failure(handle.key());
            warn!(connection = %handle.key(), health = ?health, "MCP server returned no tool list");
            return Err(DiscoveryError::EmptyResponse { url });
        }

        debug!(url = %url, bytes = body.len(), "Received MCP tools/list response");
        self.registry.record_success(handle.key());

        let parsed = parse_with(&self.strategies, &body, settings.synthesize_placeholder);
        if parsed.tier == ParseTier::Exhausted {
            let health = self.registry.record_failure(handle.key());
            warn!(connection = %handle.key(), health = ?health, "MCP tool list could not be parsed");
        }

        info!(
            connection = %handle.key(),
            tool_count = parsed.tools.len(),
            tier = ?parsed.tier,
            "Discovered MCP tools"
        );
        Ok(parsed)
    }
}
