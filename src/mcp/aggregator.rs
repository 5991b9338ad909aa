//! Fan-out discovery across every configured upstream.
//!
//! One upstream failing never affects the others. The worst outcome the
//! chat layer can see is "no tools", which is not an error.

use crate::core::config::McpConfig;
use crate::mcp::discovery::ToolDiscoveryClient;
use crate::mcp::error::ConfigurationError;
use crate::mcp::invocation::ToolInvocationClient;
use crate::mcp::provider::{AggregatedToolSet, CapabilityProvider, Upstream, UpstreamTools};
use crate::mcp::registry::{ConnectionKey, ConnectionRegistry, RegistryStats};
use crate::mcp::transport::TransportSettings;
use futures_util::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ToolAggregator {
    registry: Arc<ConnectionRegistry>,
    discovery: ToolDiscoveryClient,
    invoker: Arc<ToolInvocationClient>,
}

impl ToolAggregator {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            discovery: ToolDiscoveryClient::new(Arc::clone(&registry)),
            invoker: Arc::new(ToolInvocationClient::new(Arc::clone(&registry))),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Discovers every upstream and merges the results in the order given.
    ///
    /// Up to `discovery_concurrency` upstreams are queried at once, but
    /// results are merged in input order, so for colliding names the later
    /// upstream wins.
    pub async fn tools_for(&self, upstreams: &[Upstream]) -> AggregatedToolSet {
        let concurrency = self.registry.settings().discovery_concurrency.max(1);
        let discovered: Vec<Option<UpstreamTools>> = stream::iter(upstreams)
            .map(|upstream| self.discover_one(upstream))
            .buffered(concurrency)
            .collect()
            .await;

        let mut aggregated =
            AggregatedToolSet::new(Arc::clone(&self.registry), Arc::clone(&self.invoker));
        for tools in discovered.into_iter().flatten() {
            aggregated.merge(tools);
        }

        info!(
            upstreams = upstreams.len(),
            contributing = aggregated.upstream_count(),
            tool_count = aggregated.len(),
            "Aggregated MCP tools"
        );
        aggregated
    }

    async fn discover_one(&self, upstream: &Upstream) -> Option<UpstreamTools> {
        let handle = match self
            .registry
            .get_or_create(&upstream.base_url, &upstream.api_key)
        {
            Ok(handle) => handle,
            Err(err) => {
                warn!(connection = %upstream.name, error = %err, "Skipping MCP connection");
                return None;
            }
        };
        if !upstream.params.is_empty() {
            debug!(connection = %upstream.name, params = ?upstream.params, "MCP connection parameters");
        }

        match self.discovery.discover(&handle, &upstream.base_url).await {
            Ok(tools) if tools.is_empty() => {
                info!(connection = %upstream.name, "MCP connection offered no tools");
                None
            }
            Ok(tools) => Some(UpstreamTools {
                upstream: Arc::new(upstream.clone()),
                tools,
            }),
            Err(err) => {
                warn!(connection = %upstream.name, error = %err, "Skipping MCP connection");
                None
            }
        }
    }
}

/// Tool counts as seen by the chat layer for one configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolStats {
    pub mcp_tool_count: usize,
    pub default_tool_count: usize,
    pub mcp_available: bool,
    pub default_available: bool,
}

impl ToolStats {
    pub fn total(&self) -> usize {
        self.mcp_tool_count + self.default_tool_count
    }
}

impl fmt::Display for ToolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MCP tools: {} (available: {}), default tools: {} (available: {}), total: {}",
            self.mcp_tool_count,
            self.mcp_available,
            self.default_tool_count,
            self.default_available,
            self.total()
        )
    }
}

/// Entry point for the chat layer: configuration in, capability provider
/// out.
pub struct ToolProviderService {
    aggregator: ToolAggregator,
    default_provider: Option<Arc<dyn CapabilityProvider>>,
}

impl ToolProviderService {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            aggregator: ToolAggregator::new(registry),
            default_provider: None,
        }
    }

    pub fn from_settings(settings: TransportSettings) -> Self {
        Self::new(Arc::new(ConnectionRegistry::new(settings)))
    }

    /// Tools to fall back on when no upstream yields anything.
    pub fn with_default_provider(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.default_provider = Some(provider);
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.aggregator.registry()
    }

    /// Turns a configuration into the upstreams to query, in connection
    /// name order. Entries without a URL are skipped.
    pub fn resolve_upstreams(config: &McpConfig) -> Result<Vec<Upstream>, ConfigurationError> {
        if !config.tools_enabled() {
            return Err(ConfigurationError::Disabled);
        }
        if let Some(toolcallback) = &config.toolcallback {
            if !toolcallback.options.is_empty() {
                debug!(options = ?toolcallback.options, "Tool callback options");
            }
        }

        let upstreams: Vec<Upstream> = config
            .connections
            .iter()
            .filter_map(|(name, connection)| match Upstream::from_config(name, connection) {
                Ok(upstream) => Some(upstream),
                Err(err) => {
                    warn!(error = %err, "Ignoring MCP connection");
                    None
                }
            })
            .collect();

        if upstreams.is_empty() {
            return Err(ConfigurationError::NoConnections);
        }
        Ok(upstreams)
    }

    /// Discovers and aggregates the tools for `config`, or `None` when the
    /// configuration is disabled or no upstream yields a tool.
    pub async fn get_tools_for_config(
        &self,
        config: &McpConfig,
    ) -> Option<Arc<dyn CapabilityProvider>> {
        let upstreams = match Self::resolve_upstreams(config) {
            Ok(upstreams) => upstreams,
            Err(err) => {
                info!(reason = %err, "No MCP tools for this configuration");
                return None;
            }
        };

        let aggregated = self.aggregator.tools_for(&upstreams).await;
        if aggregated.is_empty() {
            info!(upstreams = upstreams.len(), "No MCP tools available");
            return None;
        }
        Some(Arc::new(aggregated))
    }

    pub fn get_default_tools(&self) -> Option<Arc<dyn CapabilityProvider>> {
        self.default_provider.clone()
    }

    /// MCP tools when there are any, otherwise the default provider.
    pub async fn tools_or_default(
        &self,
        config: &McpConfig,
    ) -> Option<Arc<dyn CapabilityProvider>> {
        match self.get_tools_for_config(config).await {
            Some(provider) => Some(provider),
            None => {
                if self.default_provider.is_some() {
                    info!("Falling back to default tools");
                }
                self.get_default_tools()
            }
        }
    }

    pub async fn tool_stats(&self, config: &McpConfig) -> ToolStats {
        let mcp_tool_count = self
            .get_tools_for_config(config)
            .await
            .map(|provider| provider.tool_count())
            .unwrap_or(0);
        let default_tool_count = self
            .default_provider
            .as_ref()
            .map(|provider| provider.tool_count())
            .unwrap_or(0);
        ToolStats {
            mcp_tool_count,
            default_tool_count,
            mcp_available: mcp_tool_count > 0,
            default_available: default_tool_count > 0,
        }
    }

    pub fn registry_stats(&self) -> RegistryStats {
        self.registry().stats()
    }

    pub fn is_healthy(&self) -> bool {
        self.registry().is_healthy()
    }

    pub fn refresh_connection(&self, base_url: &str, api_key: &str) {
        self.registry()
            .refresh_connection(&ConnectionKey::new(base_url, api_key));
    }

    pub fn clear_cache(&self) {
        self.registry().clear_all();
    }
}
