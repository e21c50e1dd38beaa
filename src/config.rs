#![deny(warnings)]

// Startup configuration

use crate::error::ConfigError;
use crate::operations::path_guard::{AllowedRoot, PathGuard};
use crate::operations::FileOps;

/// Immutable server configuration, built once at startup and handed down to
/// the tool registry.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub allowed_root: AllowedRoot,
    /// Append resolved paths to filesystem failure messages.
    pub diagnostics: bool,
}

impl ServerConfig {
    pub fn new(root: &str, resolve_symlinks: bool, diagnostics: bool) -> Result<Self, ConfigError> {
        Ok(Self {
            allowed_root: AllowedRoot::new(root, resolve_symlinks)?,
            diagnostics,
        })
    }

    pub fn file_ops(&self) -> FileOps {
        FileOps::new(PathGuard::new(self.allowed_root.clone()), self.diagnostics)
    }
}
