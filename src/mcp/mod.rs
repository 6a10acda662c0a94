//! MCP (Model Context Protocol) client for tool-provider subprocesses.
//!
//! Implements the client half of JSON-RPC 2.0 over stdio: the handshake,
//! tool discovery and tool invocation.

mod client;
mod connection;
mod protocol;

pub use client::{StdioLauncher, StdioMcpClient};
pub use connection::McpConnection;
pub use protocol::{Implementation, InitializeResult, ToolCallResult, ToolDescriptor};

use crate::error::Result;
use crate::llm::ToolSpec;
use crate::provider::LaunchSpec;
use async_trait::async_trait;
use serde_json::Value;

/// A source of callable tools.
#[async_trait]
pub trait ToolProvider: Send {
    /// List the tools this provider exposes.
    async fn discover(&mut self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool with structured input.
    async fn invoke(&mut self, name: &str, input: &Value) -> Result<ToolCallResult>;

    /// Release the provider. Called once per launch.
    async fn shutdown(&mut self) -> Result<()>;
}

/// Starts providers from a launch description.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start a provider and complete its handshake.
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ToolProvider>>;
}

impl From<&ToolDescriptor> for ToolSpec {
    fn from(tool: &ToolDescriptor) -> Self {
        ToolSpec {
            name: tool.name.clone(),
            description: tool.description.clone().unwrap_or_default(),
            input_schema: tool.input_schema.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_to_menu_entry() {
        let tool = ToolDescriptor {
            name: "tavily-search".to_string(),
            description: Some("Search the web".to_string()),
            input_schema: json!({"type": "object", "required": ["query"]}),
        };
        let spec = ToolSpec::from(&tool);
        assert_eq!(spec.name, "tavily-search");
        assert_eq!(spec.description, "Search the web");
        assert_eq!(spec.input_schema, tool.input_schema);

        let bare = ToolDescriptor {
            description: None,
            ..tool
        };
        assert_eq!(ToolSpec::from(&bare).description, "");
    }
}
