//! Error types for tool discovery and invocation.
//!
//! Network failures are classified once, in [`TransportError`], and then
//! wrapped by the operation that observed them. None of these errors cross
//! into the chat layer: discovery errors drop a single upstream and
//! invocation errors are rendered as an error-shaped tool result.

use std::error::Error as StdError;
use std::fmt;

/// Failure talking HTTP to an upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Upstream answered with a non-success status code.
    Status { status: u16, url: String },
    /// The per-request deadline elapsed.
    Timeout { url: String },
    /// TCP/TLS connection could not be established.
    Connect { url: String, message: String },
    /// Body exceeded the in-memory buffering limit.
    ResponseTooLarge { limit: usize },
    /// Anything else reqwest reported (decode, redirect, builder).
    Other { url: String, message: String },
}

impl TransportError {
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            TransportError::Connect {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else {
            TransportError::Other {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Discovery retries HTTP 4xx/5xx answers, connect failures and
    /// timeouts. Everything else fails immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Status { status, .. } => (400..600).contains(status),
            TransportError::Timeout { .. } | TransportError::Connect { .. } => true,
            TransportError::ResponseTooLarge { .. } | TransportError::Other { .. } => false,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Status { status, url } => {
                write!(f, "HTTP {status} from {url}")
            }
            TransportError::Timeout { url } => write!(f, "Request to {url} timed out"),
            TransportError::Connect { url, message } => {
                write!(f, "Failed to connect to {url}: {message}")
            }
            TransportError::ResponseTooLarge { limit } => {
                write!(f, "Response exceeded the {limit} byte buffer limit")
            }
            TransportError::Other { url, message } => {
                write!(f, "Request to {url} failed: {message}")
            }
        }
    }
}

impl StdError for TransportError {}

/// Missing or disabled tool configuration. Treated as "no tools".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The toolcallback kill-switch is off.
    Disabled,
    /// No upstream connections are configured.
    NoConnections,
    /// A connection entry has a blank URL.
    MissingUrl { connection: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::Disabled => write!(f, "Tool callbacks are disabled"),
            ConfigurationError::NoConnections => {
                write!(f, "No MCP connections are configured")
            }
            ConfigurationError::MissingUrl { connection } => {
                write!(f, "MCP connection '{connection}' has no url")
            }
        }
    }
}

impl StdError for ConfigurationError {}

/// Discovery against one upstream failed after the retry policy ran out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    Transport(TransportError),
    /// Upstream answered successfully with a blank body.
    EmptyResponse { url: String },
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::Transport(err) => write!(f, "Tool discovery failed: {err}"),
            DiscoveryError::EmptyResponse { url } => {
                write!(f, "Tool discovery at {url} returned an empty body")
            }
        }
    }
}

impl StdError for DiscoveryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DiscoveryError::Transport(err) => Some(err),
            DiscoveryError::EmptyResponse { .. } => None,
        }
    }
}

impl From<TransportError> for DiscoveryError {
    fn from(err: TransportError) -> Self {
        DiscoveryError::Transport(err)
    }
}

/// A tool call that could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    Transport(TransportError),
    /// Upstream answered with a JSON-RPC error object.
    Rpc { code: i64, message: String },
    /// No provider route exists for the requested tool.
    UnknownTool { name: String },
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationError::Transport(err) => write!(f, "MCP tool call failed: {err}"),
            InvocationError::Rpc { code, message } => {
                write!(f, "MCP tool call failed: {message} (code {code})")
            }
            InvocationError::UnknownTool { name } => write!(f, "Unknown tool: {name}"),
        }
    }
}

impl StdError for InvocationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            InvocationError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for InvocationError {
    fn from(err: TransportError) -> Self {
        InvocationError::Transport(err)
    }
}
