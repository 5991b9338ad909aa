pub mod data;
pub mod io;


pub use data::{ClientSettings, ConnectionConfig, McpConfig, ToolCallbackConfig};
pub use io::ConfigError;
