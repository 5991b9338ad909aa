//! Cache of one HTTP client per upstream identity.
//!
//! Only connections are cached here. Tool lists are fetched fresh on every
//! discovery request.

use crate::mcp::error::TransportError;
use crate::mcp::failures::{ConnectionHealth, FailureTracker};
use crate::mcp::transport::{build_http_client, TransportSettings};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an upstream connection: base URL plus credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    base_url: String,
    api_key: String,
}

impl ConnectionKey {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl fmt::Display for ConnectionKey {
    /// Renders the URL with the credential masked down to its last four
    /// characters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.api_key.is_empty() {
            return write!(f, "{}", self.base_url);
        }
        let visible: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "{}_****{}", self.base_url, visible)
    }
}

/// Reusable client for one upstream. Cloning is cheap and shares the
/// underlying connection pool.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    key: ConnectionKey,
    client: reqwest::Client,
}

impl ConnectionHandle {
    fn connect(key: ConnectionKey, api_key: &str) -> Result<Self, TransportError> {
        let client = build_http_client(api_key).map_err(|err| match err {
            TransportError::Other { message, .. } => TransportError::Other {
                url: key.base_url.clone(),
                message,
            },
            other => other,
        })?;
        Ok(Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            key,
            client,
        })
    }

    /// Process-unique identity; a rebuilt handle always gets a new id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub fn base_url(&self) -> &str {
        self.key.base_url()
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Snapshot of the registry for operators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub handle_count: usize,
    pub handle_keys: Vec<String>,
    pub tracked_connections: usize,
    pub failing_connections: BTreeMap<String, u32>,
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cached connections: {}", self.handle_count)?;
        for key in &self.handle_keys {
            writeln!(f, "  {key}")?;
        }
        writeln!(f, "Tracked connections: {}", self.tracked_connections)?;
        for (key, failures) in &self.failing_connections {
            writeln!(f, "  {key}: {failures} consecutive failure(s)")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ConnectionRegistry {
    handles: RwLock<HashMap<ConnectionKey, ConnectionHandle>>,
    failures: FailureTracker,
    settings: TransportSettings,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(TransportSettings::default())
    }
}

impl ConnectionRegistry {
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
            failures: FailureTracker::new(settings.failure_threshold),
            settings,
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    fn handles_read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionKey, ConnectionHandle>> {
        self.handles.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn handles_write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionKey, ConnectionHandle>> {
        self.handles.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached handle for `(base_url, api_key)`, building it on
    /// first use. Creation happens under the write lock so concurrent
    /// callers never end up holding different handles for one key.
    pub fn get_or_create(
        &self,
        base_url: &str,
        api_key: &str,
    ) -> Result<ConnectionHandle, TransportError> {
        let key = ConnectionKey::new(base_url, api_key);
        if let Some(handle) = self.handles_read().get(&key) {
            return Ok(handle.clone());
        }

        let mut handles = self.handles_write();
        if let Some(handle) = handles.get(&key) {
            return Ok(handle.clone());
        }
        let handle = ConnectionHandle::connect(key.clone(), api_key)?;
        debug!(connection = %key, handle_id = handle.id(), "Created MCP connection handle");
        handles.insert(key, handle.clone());
        Ok(handle)
    }

    /// Drops the handle and its failure counter. Absent keys are a no-op.
    pub fn evict(&self, key: &ConnectionKey) {
        let removed = self.handles_write().remove(key);
        self.failures.reset(key);
        if removed.is_some() {
            info!(connection = %key, "Evicted MCP connection");
        }
    }

    /// Operator-triggered eviction so the next use reconnects.
    pub fn refresh_connection(&self, key: &ConnectionKey) {
        info!(connection = %key, "Refreshing MCP connection");
        self.evict(key);
    }

    pub fn clear_all(&self) {
        self.handles_write().clear();
        self.failures.clear();
        info!("Cleared MCP connection cache");
    }

    /// Counts a failure and evicts the connection once it hits the
    /// threshold.
    pub fn record_failure(&self, key: &ConnectionKey) -> ConnectionHealth {
        let health = self.failures.record_failure(key);
        if health == ConnectionHealth::Evicted {
            error!(
                connection = %key,
                threshold = self.failures.threshold(),
                "Too many consecutive MCP failures, dropping connection"
            );
            self.evict(key);
        }
        health
    }

    pub fn record_success(&self, key: &ConnectionKey) {
        self.failures.record_success(key);
    }

    pub fn failure_count(&self, key: &ConnectionKey) -> u32 {
        self.failures.failures(key)
    }

    pub fn health(&self, key: &ConnectionKey) -> ConnectionHealth {
        self.failures.health(key)
    }

    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.handles_read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.handles_read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles_read().is_empty()
    }

    /// Healthy means at least one connection has been established.
    pub fn is_healthy(&self) -> bool {
        !self.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut handle_keys: Vec<String> =
            self.handles_read().keys().map(ToString::to_string).collect();
        handle_keys.sort();
        RegistryStats {
            handle_count: handle_keys.len(),
            handle_keys,
            tracked_connections: self.failures.tracked(),
            failing_connections: self.failures.failing(),
        }
    }
}
