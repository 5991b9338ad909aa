//! Layered parsing of `tools/list` responses.
//!
//! Upstreams in the wild answer with anything from a proper JSON-RPC
//! envelope to half-broken text. Each tier below is an independent
//! [`ParseStrategy`]; [`parse_tool_list`] tries them in order and stops at
//! the first one that produces a tool.

use crate::mcp::types::{ToolDescriptor, ToolSet, GENERIC_TOOL_DESCRIPTION};
use serde_json::Value;
use tracing::{debug, warn};

/// Schema field names accepted on a tool entry, in priority order.
const SCHEMA_FIELDS: [&str; 3] = ["inputSchema", "input_schema", "parameters"];

/// The response body, decoded as JSON once up front when possible.
#[derive(Debug)]
pub struct ResponseBody<'a> {
    pub raw: &'a str,
    pub json: Option<Value>,
}

impl<'a> ResponseBody<'a> {
    pub fn new(raw: &'a str) -> Self {
        let json = serde_json::from_str::<Value>(raw.trim()).ok();
        Self { raw, json }
    }

    fn pointer(&self, path: &str) -> Option<&Value> {
        self.json.as_ref()?.pointer(path)
    }

    /// True when a structured tier's array is present and literally empty.
    fn declares_empty_list(&self) -> bool {
        ["/result/tools", "/tools", "/data"].iter().any(|path| {
            self.pointer(path)
                .and_then(Value::as_array)
                .is_some_and(|items| items.is_empty())
        })
    }
}

pub trait ParseStrategy: Send + Sync {
    fn tier(&self) -> ParseTier;

    /// Returns the tools this strategy recognises, or `None` when it does
    /// not apply or found nothing usable.
    fn try_parse(&self, body: &ResponseBody<'_>) -> Option<ToolSet>;
}

/// Which tier produced a [`ParsedTools`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTier {
    /// `{result: {tools: [...]}}`
    JsonRpcEnvelope,
    /// `{tools: [...]}`
    DirectTools,
    /// `{data: [...]}`
    DataArray,
    /// Bracket-matched `"tools": [...]` scraped from text.
    QuotedToolsArray,
    /// `tools:` followed by `name:` lines.
    YamlToolsList,
    /// Any line mentioning a name.
    LineScan,
    /// A structured list was present but empty.
    EmptyList,
    /// Nothing parsed; the `mcp_tool` placeholder was synthesized.
    Placeholder,
    /// Nothing parsed and placeholder synthesis is disabled.
    Exhausted,
}

impl ParseTier {
    /// Tiers that read decoded JSON rather than scraping text.
    pub fn is_structured(self) -> bool {
        matches!(
            self,
            ParseTier::JsonRpcEnvelope | ParseTier::DirectTools | ParseTier::DataArray
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTools {
    pub tools: ToolSet,
    pub tier: ParseTier,
}

/// Converts one JSON tool entry. Entries without a usable name are skipped.
fn tool_from_entry(entry: &Value) -> Option<ToolDescriptor> {
    let name = entry.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    let description = entry
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let schema = SCHEMA_FIELDS
        .iter()
        .filter_map(|field| entry.get(*field))
        .find(|schema| schema.is_object())
        .cloned();
    Some(ToolDescriptor::new(name, description, schema))
}

fn tools_from_array(items: &Value) -> Option<ToolSet> {
    let items = items.as_array()?;
    let mut skipped = 0_usize;
    let mut tools = ToolSet::new();
    for entry in items {
        match tool_from_entry(entry) {
            Some(tool) => {
                tools.insert(tool);
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "Skipped MCP tool entries without a name");
    }
    (!tools.is_empty()).then_some(tools)
}

pub struct JsonRpcEnvelope;

impl ParseStrategy for JsonRpcEnvelope {
    fn tier(&self) -> ParseTier {
        ParseTier::JsonRpcEnvelope
    }

    fn try_parse(&self, body: &ResponseBody<'_>) -> Option<ToolSet> {
        tools_from_array(body.pointer("/result/tools")?)
    }
}

pub struct DirectTools;

impl ParseStrategy for DirectTools {
    fn tier(&self) -> ParseTier {
        ParseTier::DirectTools
    }

    fn try_parse(&self, body: &ResponseBody<'_>) -> Option<ToolSet> {
        tools_from_array(body.pointer("/tools")?)
    }
}

pub struct DataArray;

impl ParseStrategy for DataArray {
    fn tier(&self) -> ParseTier {
        ParseTier::DataArray
    }

    fn try_parse(&self, body: &ResponseBody<'_>) -> Option<ToolSet> {
        tools_from_array(body.pointer("/data")?)
    }
}

/// Finds the `]` closing the `[` at `open`, ignoring brackets inside
/// string literals. An unterminated array runs to the end of the text.
fn matching_bracket(text: &str, open: usize) -> usize {
    let mut depth = 0_i32;
    let mut in_string = false;
    let mut escaped = false;
    for (index, ch) in text[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return open + index;
                }
            }
            _ => {}
        }
    }
    text.len()
}

/// Reads the string value following `"field"` in a loose JSON fragment.
fn scrape_quoted_field(fragment: &str, field: &str) -> Option<String> {
    let marker = format!("\"{field}\"");
    let after = &fragment[fragment.find(&marker)? + marker.len()..];
    let after = after.trim_start().strip_prefix(':')?.trim_start();
    let value = after.strip_prefix('"')?;

    let mut out = String::new();
    let mut escaped = false;
    for ch in value.chars() {
        match ch {
            _ if escaped => {
                out.push(ch);
                escaped = false;
            }
            '\\' => escaped = true,
            '"' => return Some(out),
            _ => out.push(ch),
        }
    }
    None
}

pub struct QuotedToolsArray;

impl ParseStrategy for QuotedToolsArray {
    fn tier(&self) -> ParseTier {
        ParseTier::QuotedToolsArray
    }

    fn try_parse(&self, body: &ResponseBody<'_>) -> Option<ToolSet> {
        let text = body.raw;
        let key = text.find("\"tools\"")?;
        let open = key + text[key..].find('[')?;
        let close = matching_bracket(text, open);
        let section = &text[open + 1..close];

        let tools: ToolSet = section
            .split('{')
            .filter(|chunk| !chunk.trim().is_empty())
            .filter_map(|chunk| {
                let name = scrape_quoted_field(chunk, "name")?;
                let description = scrape_quoted_field(chunk, "description")
                    .unwrap_or_else(|| GENERIC_TOOL_DESCRIPTION.to_string());
                Some(ToolDescriptor::new(name.trim(), description, None))
            })
            .collect();
        (!tools.is_empty()).then_some(tools)
    }
}

/// Strips quotes, separators and stray braces around a scraped value.
fn unquote(value: &str) -> &str {
    value.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | ',' | '{' | '}' | '[' | ']')
    })
}

pub struct YamlToolsList;

impl ParseStrategy for YamlToolsList {
    fn tier(&self) -> ParseTier {
        ParseTier::YamlToolsList
    }

    fn try_parse(&self, body: &ResponseBody<'_>) -> Option<ToolSet> {
        if !body.raw.contains("tools:") {
            return None;
        }

        let mut entries: Vec<(String, Option<String>)> = Vec::new();
        for line in body.raw.lines() {
            if let Some((_, rest)) = line.split_once("name:") {
                let name = unquote(rest);
                if !name.is_empty() {
                    entries.push((name.to_string(), None));
                }
            } else if let Some((_, rest)) = line.split_once("description:") {
                if let Some(last) = entries.last_mut() {
                    if last.1.is_none() {
                        last.1 = Some(unquote(rest).to_string());
                    }
                }
            }
        }

        let tools: ToolSet = entries
            .into_iter()
            .map(|(name, description)| {
                ToolDescriptor::new(
                    name,
                    description.unwrap_or_else(|| GENERIC_TOOL_DESCRIPTION.to_string()),
                    None,
                )
            })
            .collect();
        (!tools.is_empty()).then_some(tools)
    }
}

pub struct LineScan;

impl ParseStrategy for LineScan {
    fn tier(&self) -> ParseTier {
        ParseTier::LineScan
    }

    fn try_parse(&self, body: &ResponseBody<'_>) -> Option<ToolSet> {
        let tools: ToolSet = body
            .raw
            .lines()
            .map(str::trim)
            .filter(|line| line.contains("name") || line.contains("tool"))
            .filter_map(|line| {
                let (_, rest) = line.split_once("name")?;
                let name = rest
                    .trim_start_matches(|c: char| c == '"' || c == ':' || c.is_whitespace());
                let name = unquote(name);
                (!name.is_empty())
                    .then(|| ToolDescriptor::new(name, GENERIC_TOOL_DESCRIPTION, None))
            })
            .collect();
        (!tools.is_empty()).then_some(tools)
    }
}

/// The strategies in the order they are tried.
pub fn default_strategies() -> Vec<Box<dyn ParseStrategy>> {
    vec![
        Box::new(JsonRpcEnvelope),
        Box::new(DirectTools),
        Box::new(DataArray),
        Box::new(QuotedToolsArray),
        Box::new(YamlToolsList),
        Box::new(LineScan),
    ]
}

/// Runs `strategies` in order over `raw`.
///
/// A literally empty structured list yields an empty set before any text
/// scraping runs. When nothing produces a tool, the `mcp_tool` placeholder is synthesized unless
/// `synthesize_placeholder` is off.
pub fn parse_with(
    strategies: &[Box<dyn ParseStrategy>],
    raw: &str,
    synthesize_placeholder: bool,
) -> ParsedTools {
    let body = ResponseBody::new(raw);
    let empty_list = ParsedTools {
        tools: ToolSet::new(),
        tier: ParseTier::EmptyList,
    };

    for strategy in strategies {
        let tier = strategy.tier();
        // A well-formed but empty list must not be scraped for junk names.
        if !tier.is_structured() && body.declares_empty_list() {
            return empty_list;
        }
        if let Some(tools) = strategy.try_parse(&body) {
            if !tier.is_structured() {
                warn!(tier = ?tier, tool_count = tools.len(), "Parsed MCP tools with a fallback strategy");
            }
            return ParsedTools { tools, tier };
        }
    }

    if body.declares_empty_list() {
        return empty_list;
    }

    if synthesize_placeholder {
        warn!(
            bytes = raw.len(),
            "No recognisable tool list in MCP response, using placeholder tool"
        );
        let tools = std::iter::once(ToolDescriptor::placeholder()).collect();
        return ParsedTools {
            tools,
            tier: ParseTier::Placeholder,
        };
    }

    warn!(bytes = raw.len(), "No recognisable tool list in MCP response");
    ParsedTools {
        tools: ToolSet::new(),
        tier: ParseTier::Exhausted,
    }
}

pub fn parse_tool_list(raw: &str, synthesize_placeholder: bool) -> ParsedTools {
    parse_with(&default_strategies(), raw, synthesize_placeholder)
}
