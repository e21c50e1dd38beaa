#![deny(warnings)]

// Error types for the confined-fileio-mcp crate

use thiserror::Error;

/// Main error type for the confined-fileio-mcp application
#[derive(Error, Debug)]
pub enum FileIoMcpError {
    /// File I/O operation errors
    #[error("File I/O error: {0}")]
    FileIo(#[from] FileIoError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// Transport layer errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Startup configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// File I/O operation errors.
///
/// These never cross the protocol boundary as JSON-RPC errors; the tool layer
/// renders them as tool results with the failure flag set.
#[derive(Error, Debug)]
pub enum FileIoError {
    /// The requested path resolves outside the allowed root. Carries the
    /// caller's original string, never the resolved form.
    #[error("Access denied - path outside allowed directory: {0}")]
    AccessDenied(String),

    /// Path string is malformed (e.g. contains a NUL byte)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// File or directory not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Expected a file but found a directory
    #[error("Is a directory: {0}")]
    IsADirectory(String),

    /// Expected a directory but found something else
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// File content is not valid UTF-8 text
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Any other filesystem failure
    #[error("I/O error: {0}")]
    Io(String),
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    /// Invalid protocol version
    #[error("Unsupported protocol version: {0}")]
    InvalidProtocolVersion(String),

    /// Tool not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Invalid tool parameters
    #[error("Invalid tool parameters: {0}")]
    InvalidToolParameters(String),
}

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// IO error in transport
    #[error("Transport IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup configuration errors. Any of these aborts the process before it
/// starts serving.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Allowed root not supplied or blank
    #[error("allowed root directory is not configured")]
    MissingRoot,

    /// Allowed root could not be resolved
    #[error("cannot resolve allowed root {path}: {source}")]
    InvalidRoot {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, FileIoMcpError>;

impl FileIoError {
    /// Map a std::io::Error to a more specific FileIoError based on the error kind
    pub fn from_io_error(operation: &str, path: &str, error: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::NotFound => FileIoError::NotFound(format!("{} failed: {}", operation, path)),
            ErrorKind::PermissionDenied => FileIoError::PermissionDenied(format!(
                "Permission denied when {}: {}",
                operation, path
            )),
            ErrorKind::IsADirectory => {
                FileIoError::IsADirectory(format!("cannot {}: {}", operation, path))
            }
            ErrorKind::NotADirectory => {
                FileIoError::NotADirectory(format!("cannot {}: {}", operation, path))
            }
            ErrorKind::InvalidData => FileIoError::Encoding(format!(
                "{} is not valid UTF-8 text ({})",
                path, error
            )),
            ErrorKind::InvalidInput => FileIoError::InvalidPath(format!(
                "Invalid input for {}: {} ({})",
                operation, path, error
            )),
            _ => {
                // For other errors, include the original error message
                FileIoError::Io(format!("Failed to {} {}: {}", operation, path, error))
            }
        }
    }
}
