use std::error::Error;

use crate::core::config::McpConfig;
use crate::mcp::{ToolDescriptor, ToolProviderService};

/// One line per tool: name, then description.
pub fn format_tool_lines(tools: &[ToolDescriptor]) -> Vec<String> {
    let width = tools.iter().map(|tool| tool.name.len()).max().unwrap_or(0);
    tools
        .iter()
        .map(|tool| {
            if tool.description.is_empty() {
                tool.name.clone()
            } else {
                format!("{:<width$}  {}", tool.name, tool.description)
            }
        })
        .collect()
}

pub async fn list_tools(
    service: &ToolProviderService,
    config: &McpConfig,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let tools = service
        .get_tools_for_config(config)
        .await
        .map(|provider| provider.list_tools())
        .unwrap_or_default();

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    if tools.is_empty() {
        println!("No MCP tools available.");
        return Ok(());
    }
    println!("Available MCP tools ({}):", tools.len());
    for line in format_tool_lines(&tools) {
        println!("  {line}");
    }
    Ok(())
}

pub async fn call_tool(
    service: &ToolProviderService,
    config: &McpConfig,
    tool: &str,
    arguments: &str,
) -> Result<(), Box<dyn Error>> {
    let Some(provider) = service.get_tools_for_config(config).await else {
        return Err("No MCP tools available for this configuration".into());
    };
    let payload = provider.invoke(tool, arguments).await;
    println!("{payload}");
    Ok(())
}

pub async fn print_stats(
    service: &ToolProviderService,
    config: &McpConfig,
) -> Result<(), Box<dyn Error>> {
    let stats = service.tool_stats(config).await;
    println!("{stats}");
    print!("{}", service.registry_stats());
    println!("Healthy: {}", service.is_healthy());
    Ok(())
}
