#![deny(warnings)]

// Tool registry and MCP tool definitions

use crate::error::{McpError, Result};
use crate::operations::{DirectoryEntry, EntryKind, FileOps, OperationResult};
use serde_json::{Map, Value};

/// Tool registry that manages all available tools
pub struct ToolRegistry {
    ops: FileOps,
}

impl ToolRegistry {
    /// Create a new tool registry
    pub fn new(ops: FileOps) -> Self {
        Self { ops }
    }

    /// Get all tools in MCP format
    pub fn list_tools(&self) -> Value {
        serde_json::json!([
            {
                "name": "read_file",
                "description": "Read the complete contents of a text file. Paths are resolved relative to the allowed root directory; access outside it is denied.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the file to read"
                        }
                    },
                    "required": ["path"]
                }
            },
            {
                "name": "write_file",
                "description": "Create a new file or completely overwrite an existing one. Missing parent directories are created.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the file to write"
                        },
                        "content": {
                            "type": "string",
                            "description": "Content to write to the file"
                        }
                    },
                    "required": ["path", "content"]
                }
            },
            {
                "name": "list_directory",
                "description": "List the immediate entries of a directory, each marked [DIR] or [FILE]. Defaults to the allowed root directory.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the directory to list (default: allowed root)"
                        }
                    }
                }
            }
        ])
    }

    /// Execute a tool by name.
    ///
    /// Operation failures come back as `Ok` results with `isError` set; only
    /// unknown tools and malformed arguments are returned as `Err`.
    pub async fn execute_tool(&self, name: &str, arguments: &Value) -> Result<Value> {
        let empty = Map::new();
        let args = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return Err(McpError::InvalidToolParameters(
                    "Arguments must be an object".to_string(),
                )
                .into());
            }
        };

        tracing::debug!(tool = name, "tool call");

        match name {
            "read_file" => {
                let path = required_str(args, "path")?;
                let result = match self.ops.read(path).await {
                    OperationResult::Success(out) => serde_json::json!({
                        "content": [
                            { "type": "text", "text": format!("File: {}", out.requested_path) },
                            { "type": "text", "text": out.content }
                        ],
                        "isError": false
                    }),
                    OperationResult::Failure(msg) => error_result(&msg),
                };
                Ok(result)
            }
            "write_file" => {
                let path = required_str(args, "path")?;
                let content = required_str(args, "content")?;
                let result = match self.ops.write(path, content).await {
                    OperationResult::Success(msg) => text_result(&msg),
                    OperationResult::Failure(msg) => error_result(&msg),
                };
                Ok(result)
            }
            "list_directory" => {
                let path = optional_str(args, "path")?;
                let result = match self.ops.list(path).await {
                    OperationResult::Success(entries) => {
                        let mut result = text_result(&format_entries(&entries));
                        result["structuredContent"] = serde_json::json!({ "entries": entries });
                        result
                    }
                    OperationResult::Failure(msg) => error_result(&msg),
                };
                Ok(result)
            }
            _ => Err(McpError::ToolNotFound(name.to_string()).into()),
        }
    }
}

fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(McpError::InvalidToolParameters(format!(
            "Parameter must be a string: {}",
            key
        ))
        .into()),
        None => Err(McpError::InvalidToolParameters(format!(
            "Missing required parameter: {}",
            key
        ))
        .into()),
    }
}

fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_str(args, key).map(Some),
    }
}

fn format_entries(entries: &[DirectoryEntry]) -> String {
    if entries.is_empty() {
        return "(empty directory)".to_string();
    }
    entries
        .iter()
        .map(|e| match e.kind {
            EntryKind::Directory => format!("[DIR] {}", e.name),
            EntryKind::File => format!("[FILE] {}", e.name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn text_result(text: &str) -> Value {
    serde_json::json!({
        "content": [{
            "type": "text",
            "text": text
        }],
        "isError": false
    })
}

fn error_result(message: &str) -> Value {
    serde_json::json!({
        "content": [{
            "type": "text",
            "text": format!("Error: {}", message)
        }],
        "isError": true
    })
}
