//! The capability-provider interface handed to the chat layer.

use crate::core::config::ConnectionConfig;
use crate::mcp::error::{ConfigurationError, InvocationError};
use crate::mcp::invocation::{parse_arguments, ToolInvocationClient};
use crate::mcp::registry::ConnectionRegistry;
use crate::mcp::types::{CallResult, ToolArguments, ToolDescriptor, ToolSet};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the chat layer sees: a flat list of tools and a way to call them.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Calls `name` with a raw argument string and returns the result
    /// payload. Failures come back as `{"error": "..."}`.
    async fn invoke(&self, name: &str, arguments: &str) -> String;

    fn tool_names(&self) -> Vec<String> {
        self.list_tools().into_iter().map(|tool| tool.name).collect()
    }

    fn tool_count(&self) -> usize {
        self.list_tools().len()
    }
}

/// One configured upstream server.
#[derive(Debug, Clone, PartialEq)]
pub struct Upstream {
    /// Connection name from the configuration.
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    /// Opaque per-connection parameters.
    pub params: HashMap<String, Value>,
}

impl Upstream {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            params: HashMap::new(),
        }
    }

    /// Builds an upstream from one `[connections.<name>]` entry.
    pub fn from_config(
        name: &str,
        connection: &ConnectionConfig,
    ) -> Result<Self, ConfigurationError> {
        let url = connection.url.trim();
        if url.is_empty() {
            return Err(ConfigurationError::MissingUrl {
                connection: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            base_url: url.to_string(),
            api_key: connection.api_key.trim().to_string(),
            params: connection.params.clone(),
        })
    }
}

/// Tools discovered on one upstream, tagged with where they came from.
#[derive(Debug, Clone)]
pub struct UpstreamTools {
    pub upstream: Arc<Upstream>,
    pub tools: ToolSet,
}

#[derive(Debug, Clone)]
struct RoutedTool {
    descriptor: ToolDescriptor,
    upstream: Arc<Upstream>,
}

/// Union of the tool sets of several upstreams.
///
/// Tool names are not namespaced. Merging a name that is already present
/// replaces the earlier entry, so the later upstream shadows the earlier
/// one.
pub struct AggregatedToolSet {
    entries: BTreeMap<String, RoutedTool>,
    upstream_count: usize,
    registry: Arc<ConnectionRegistry>,
    invoker: Arc<ToolInvocationClient>,
}

impl fmt::Debug for AggregatedToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatedToolSet")
            .field("tools", &self.entries.keys().collect::<Vec<_>>())
            .field("upstream_count", &self.upstream_count)
            .finish()
    }
}

impl AggregatedToolSet {
    pub fn new(registry: Arc<ConnectionRegistry>, invoker: Arc<ToolInvocationClient>) -> Self {
        Self {
            entries: BTreeMap::new(),
            upstream_count: 0,
            registry,
            invoker,
        }
    }

    /// Adds one upstream's tools. Returns the names that shadowed an entry
    /// from an earlier upstream.
    pub fn merge(&mut self, discovered: UpstreamTools) -> Vec<String> {
        let UpstreamTools { upstream, tools } = discovered;
        if tools.is_empty() {
            return Vec::new();
        }
        self.upstream_count += 1;

        let mut shadowed = Vec::new();
        for descriptor in tools.into_descriptors() {
            let name = descriptor.name.clone();
            let routed = RoutedTool {
                descriptor,
                upstream: Arc::clone(&upstream),
            };
            if let Some(previous) = self.entries.insert(name.clone(), routed) {
                warn!(
                    tool = %name,
                    previous = %previous.upstream.name,
                    current = %upstream.name,
                    "MCP tool name collision, later connection shadows earlier one"
                );
                shadowed.push(name);
            }
        }
        shadowed
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of upstreams that contributed at least one tool.
    pub fn upstream_count(&self) -> usize {
        self.upstream_count
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.entries.get(name).map(|routed| &routed.descriptor)
    }

    /// Name of the connection a tool is routed to.
    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name)
            .map(|routed| routed.upstream.name.as_str())
    }

    /// Routes a call to the upstream that owns `name`.
    pub async fn call(&self, name: &str, arguments: ToolArguments) -> CallResult {
        let Some(routed) = self.entries.get(name) else {
            return CallResult::Error(
                InvocationError::UnknownTool {
                    name: name.to_string(),
                }
                .to_string(),
            );
        };
        let upstream = &routed.upstream;
        debug!(tool = %name, connection = %upstream.name, "Routing MCP tool call");

        let handle = match self
            .registry
            .get_or_create(&upstream.base_url, &upstream.api_key)
        {
            Ok(handle) => handle,
            Err(err) => return CallResult::Error(InvocationError::from(err).to_string()),
        };
        match self
            .invoker
            .try_invoke(&handle, &upstream.base_url, name, arguments)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                warn!(tool = %name, connection = %upstream.name, error = %err, "MCP tool call failed");
                CallResult::Error(err.to_string())
            }
        }
    }
}

#[async_trait]
impl CapabilityProvider for AggregatedToolSet {
    fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.entries
            .values()
            .map(|routed| routed.descriptor.clone())
            .collect()
    }

    async fn invoke(&self, name: &str, arguments: &str) -> String {
        self.call(name, parse_arguments(arguments))
            .await
            .into_payload()
    }

    fn tool_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn tool_count(&self) -> usize {
        self.entries.len()
    }
}

type LocalHandler = Arc<dyn Fn(&ToolArguments) -> CallResult + Send + Sync>;

/// Statically configured tools answered in-process. Used as the fallback
/// when no upstream yields anything.
#[derive(Default, Clone)]
pub struct StaticToolProvider {
    tools: BTreeMap<String, (ToolDescriptor, LocalHandler)>,
}

impl StaticToolProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool<F>(mut self, descriptor: ToolDescriptor, handler: F) -> Self
    where
        F: Fn(&ToolArguments) -> CallResult + Send + Sync + 'static,
    {
        self.tools
            .insert(descriptor.name.clone(), (descriptor, Arc::new(handler)));
        self
    }
}

impl fmt::Debug for StaticToolProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticToolProvider")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl CapabilityProvider for StaticToolProvider {
    fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|(descriptor, _)| descriptor.clone())
            .collect()
    }

    async fn invoke(&self, name: &str, arguments: &str) -> String {
        let result = match self.tools.get(name) {
            Some((_, handler)) => handler(&parse_arguments(arguments)),
            None => CallResult::Error(
                InvocationError::UnknownTool {
                    name: name.to_string(),
                }
                .to_string(),
            ),
        };
        result.into_payload()
    }
}
