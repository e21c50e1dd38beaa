#![deny(warnings)]

// MCP server implementation

use crate::config::ServerConfig;
use crate::error::{McpError, Result};
use crate::tools::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18", "2025-11-25"];

/// MCP server state
pub struct McpServer {
    /// Tool registry
    tool_registry: Arc<ToolRegistry>,
    /// Initialized flag
    initialized: Arc<RwLock<bool>>,
    allowed_root: String,
}

impl McpServer {
    /// Create a new MCP server confined to the configured root
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            tool_registry: Arc::new(ToolRegistry::new(config.file_ops())),
            initialized: Arc::new(RwLock::new(false)),
            allowed_root: config.allowed_root.as_str().to_string(),
        }
    }

    /// Handle initialize request
    pub async fn handle_initialize(
        &self,
        protocol_version: &str,
        _client_capabilities: &Value,
    ) -> Result<Value> {
        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&protocol_version) {
            return Err(McpError::InvalidProtocolVersion(protocol_version.to_string()).into());
        }

        let capabilities = serde_json::json!({
            "protocolVersion": protocol_version,
            "serverInfo": {
                "name": "confined-fileio-mcp",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {
                "tools": {
                    "listChanged": false,
                },
            },
            "instructions": format!(
                "File tools (read_file, write_file, list_directory) confined to {}. Relative paths resolve against that directory.",
                self.allowed_root
            ),
        });

        Ok(capabilities)
    }

    /// Handle initialized notification
    pub async fn handle_initialized(&self) -> Result<()> {
        let mut initialized = self.initialized.write().await;
        *initialized = true;
        Ok(())
    }

    /// Handle tool call
    pub async fn handle_tool_call(&self, tool_name: &str, arguments: &Value) -> Result<Value> {
        self.tool_registry.execute_tool(tool_name, arguments).await
    }

    /// Handle shutdown request
    pub async fn handle_shutdown(&self) -> Result<()> {
        let mut initialized = self.initialized.write().await;
        *initialized = false;
        Ok(())
    }

    /// List tools in MCP schema format
    pub fn list_tools(&self) -> Value {
        self.tool_registry.list_tools()
    }

    /// Check if server is initialized
    pub async fn is_initialized(&self) -> bool {
        *self.initialized.read().await
    }
}
