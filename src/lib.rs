//! Switchboard discovers the tools exposed by remote MCP servers and makes
//! them callable from a support chat agent.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`mcp`] owns the connection registry, per-upstream discovery and
//!   invocation clients, failure tracking, and the aggregator that merges
//!   every upstream into one capability provider.
//! - [`core`] holds the TOML configuration model and its persistence.
//! - [`cli`] parses arguments, sets up logging, and drives the `tools`,
//!   `call`, `stats` and `init` commands.
//!
//! The binary entrypoint (`src/main.rs`) routes through [`crate::cli::main`].

pub mod cli;
pub mod core;
pub mod mcp;
