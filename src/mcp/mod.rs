//! Model Context Protocol tool discovery and invocation.
//!
//! Leaf first: [`registry`] caches one HTTP client per upstream identity,
//! [`discovery`] and [`invocation`] speak `tools/list` and `tools/call` to a
//! single upstream, and [`aggregator`] fans out across every configured
//! upstream and hands the chat layer one [`CapabilityProvider`].

pub mod aggregator;
pub mod discovery;
pub mod error;
pub mod failures;
pub mod invocation;
pub mod protocol;
pub mod provider;
pub mod registry;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod test_support;

pub use aggregator::{ToolAggregator, ToolProviderService, ToolStats};
pub use error::{ConfigurationError, DiscoveryError, InvocationError, TransportError};
pub use provider::{AggregatedToolSet, CapabilityProvider, StaticToolProvider, Upstream};
pub use registry::{ConnectionHandle, ConnectionKey, ConnectionRegistry, RegistryStats};
pub use types::{CallResult, ToolArguments, ToolDescriptor, ToolSet};
