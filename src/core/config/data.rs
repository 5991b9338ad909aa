use crate::mcp::transport::{
    TransportSettings, DEFAULT_DISCOVERY_CONCURRENCY, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_MAX_RETRIES,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tool configuration for one logical chat configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolcallback: Option<ToolCallbackConfig>,
    /// Upstream servers keyed by connection name.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
    #[serde(default)]
    pub client: ClientSettings,
}

impl McpConfig {
    /// An absent `[toolcallback]` table means tools are on.
    pub fn tools_enabled(&self) -> bool {
        self.toolcallback
            .as_ref()
            .map(|toolcallback| toolcallback.enabled)
            .unwrap_or(true)
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings::from(&self.client)
    }

    /// Starter file written by `switchboard init`.
    pub fn sample() -> Self {
        let mut connections = BTreeMap::new();
        let mut params = HashMap::new();
        params.insert("region".to_string(), Value::String("eu".to_string()));
        connections.insert(
            "products".to_string(),
            ConnectionConfig {
                url: "http://localhost:9001/mcp".to_string(),
                api_key: "change-me".to_string(),
                params,
            },
        );
        connections.insert(
            "orders".to_string(),
            ConnectionConfig {
                url: "http://localhost:9002/mcp".to_string(),
                api_key: String::new(),
                params: HashMap::new(),
            },
        );

        Self {
            toolcallback: Some(ToolCallbackConfig::default()),
            connections,
            client: ClientSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallbackConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Opaque options, only logged.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl Default for ToolCallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            options: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "apiKey")]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, Value>,
}

/// `[client]` transport tuning as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub failure_threshold: u32,
    pub max_response_bytes: usize,
    pub discovery_concurrency: usize,
    pub synthesize_placeholder: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let transport = TransportSettings::default();
        Self {
            request_timeout_secs: transport.request_timeout.as_secs(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: transport.retry_delay.as_millis() as u64,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            discovery_concurrency: DEFAULT_DISCOVERY_CONCURRENCY,
            synthesize_placeholder: transport.synthesize_placeholder,
        }
    }
}

impl From<&ClientSettings> for TransportSettings {
    fn from(settings: &ClientSettings) -> Self {
        TransportSettings {
            request_timeout: Duration::from_secs(settings.request_timeout_secs.max(1)),
            max_retries: settings.max_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            failure_threshold: settings.failure_threshold.max(1),
            max_response_bytes: settings.max_response_bytes.max(1),
            discovery_concurrency: settings.discovery_concurrency.max(1),
            synthesize_placeholder: settings.synthesize_placeholder,
        }
    }
}

/// Renders a path with the home directory shortened to `~`.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
