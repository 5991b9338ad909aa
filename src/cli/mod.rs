//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod tools;


use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::core::config::data::path_display;
use crate::core::config::McpConfig;
use crate::mcp::ToolProviderService;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Discover and call MCP tools across upstream servers")]
#[command(
    long_about = "Switchboard discovers the tools exposed by one or more MCP servers, merges \
them into a single tool set, and routes tool calls back to the server that owns them.\n\n\
Configuration:\n\
  Connections are read from config.toml in the platform config directory,\n\
  or from the file given with --config. Run 'switchboard init' to create one.\n\n\
Environment Variables:\n\
  RUST_LOG          Log filter (defaults to info, or debug with --verbose)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file to use instead of the default location
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write logs to the specified file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Discover and list the aggregated tool set
    Tools {
        /// Print the tool descriptors as JSON
        #[arg(long)]
        json: bool,
    },
    /// Discover tools, then call one of them
    Call {
        /// Name of the tool to call
        tool: String,
        /// Raw argument string, JSON or key:value pairs
        #[arg(default_value = "{}", allow_hyphen_values = true)]
        args: String,
    },
    /// Show tool and connection statistics
    Stats,
    /// Write a sample configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.log.as_deref(), args.verbose)?;

    let config_path = resolve_config_path(args.config)?;

    match args.command {
        Commands::Init { force } => init_config(&config_path, force),
        Commands::Tools { json } => {
            let (config, service) = load_service(&config_path)?;
            tools::list_tools(&service, &config, json).await
        }
        Commands::Call { tool, args: arguments } => {
            let (config, service) = load_service(&config_path)?;
            tools::call_tool(&service, &config, &tool, &arguments).await
        }
        Commands::Stats => {
            let (config, service) = load_service(&config_path)?;
            tools::print_stats(&service, &config).await
        }
    }
}

fn load_service(config_path: &Path) -> Result<(McpConfig, ToolProviderService), Box<dyn Error>> {
    let config = McpConfig::load_from_path(config_path)?;
    let service = ToolProviderService::from_settings(config.transport_settings());
    Ok((config, service))
}

fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf, Box<dyn Error>> {
    match explicit {
        Some(path) => Ok(path),
        None => McpConfig::default_config_path()
            .ok_or_else(|| "Could not determine the configuration directory; pass --config".into()),
    }
}

fn init_config(config_path: &Path, force: bool) -> Result<(), Box<dyn Error>> {
    if config_path.exists() && !force {
        return Err(format!(
            "{} already exists; use --force to overwrite it",
            path_display(config_path)
        )
        .into());
    }
    McpConfig::sample().save_to_path(config_path)?;
    println!("✅ Wrote sample configuration to {}", path_display(config_path));
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<(), Box<dyn Error>> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    installed.map_err(|err| -> Box<dyn Error> { err })
}
