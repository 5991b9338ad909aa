//! Tool descriptors and the per-discovery tool set.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Name of the placeholder tool synthesized when nothing else parses.
pub const PLACEHOLDER_TOOL_NAME: &str = "mcp_tool";
pub const PLACEHOLDER_TOOL_DESCRIPTION: &str = "Default MCP tool";
/// Description used when a scraped tool carries none.
pub const GENERIC_TOOL_DESCRIPTION: &str = "MCP tool";

/// Schema every tool falls back to when the upstream omits one.
pub fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// A single callable capability advertised by an upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Builds a descriptor, substituting the empty-object schema for a
    /// missing or null one.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Option<Value>,
    ) -> Self {
        let input_schema = match input_schema {
            Some(Value::Null) | None => empty_object_schema(),
            Some(schema) => schema,
        };
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_TOOL_NAME, PLACEHOLDER_TOOL_DESCRIPTION, None)
    }

    pub fn is_placeholder(&self) -> bool {
        self.name == PLACEHOLDER_TOOL_NAME
    }
}

/// Tools returned by one discovery call, keyed by name.
///
/// Inserting a name twice keeps the later descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSet {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a descriptor, skipping entries whose name is blank.
    pub fn insert(&mut self, tool: ToolDescriptor) -> bool {
        if tool.name.trim().is_empty() {
            return false;
        }
        self.tools.insert(tool.name.clone(), tool);
        true
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn into_descriptors(self) -> impl Iterator<Item = ToolDescriptor> {
        self.tools.into_values()
    }
}

impl FromIterator<ToolDescriptor> for ToolSet {
    fn from_iter<I: IntoIterator<Item = ToolDescriptor>>(iter: I) -> Self {
        let mut set = ToolSet::new();
        for tool in iter {
            set.insert(tool);
        }
        set
    }
}

/// Outcome of a single tool call as seen by the chat layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    /// Upstream returned a non-JSON body.
    Text(String),
    /// Upstream returned a JSON body.
    Structured(Value),
    Error(String),
}

impl CallResult {
    pub fn is_error(&self) -> bool {
        matches!(self, CallResult::Error(_))
    }

    /// Renders the result the way it is handed back to the model. Errors
    /// become `{"error": "..."}` so they read like any other tool output.
    pub fn into_payload(self) -> String {
        match self {
            CallResult::Text(text) => text,
            CallResult::Structured(value) => value.to_string(),
            CallResult::Error(message) => json!({ "error": message }).to_string(),
        }
    }
}

/// Argument map sent as `params.arguments` on a tool call.
pub type ToolArguments = Map<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_schema_defaults_to_empty_object() {
        let tool = ToolDescriptor::new("lookup", "Find things", None);
        assert_eq!(tool.input_schema, empty_object_schema());

        let tool = ToolDescriptor::new("lookup", "Find things", Some(Value::Null));
        assert_eq!(tool.input_schema["type"], "object");
        assert!(tool.input_schema["properties"].as_object().unwrap().is_empty());
    }

    #[test]
    fn tool_set_skips_blank_names_and_overwrites_duplicates() {
        let mut set = ToolSet::new();
        assert!(!set.insert(ToolDescriptor::new("  ", "blank", None)));
        set.insert(ToolDescriptor::new("search", "first", None));
        set.insert(ToolDescriptor::new("search", "second", None));

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("search").unwrap().description, "second");
    }

    #[test]
    fn error_payload_is_escaped_json() {
        let payload = CallResult::Error("bad \"quote\"".to_string()).into_payload();
        let parsed: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["error"], "bad \"quote\"");
    }

    #[test]
    fn structured_payload_is_compact_json() {
        let payload = CallResult::Structured(json!({ "ok": true })).into_payload();
        assert_eq!(payload, r#"{"ok":true}"#);
    }
}
