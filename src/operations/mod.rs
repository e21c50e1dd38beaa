#![deny(warnings)]

// Confined file operations

pub mod list_dir;
pub mod path_guard;
pub mod read_file;
pub mod write_file;

use crate::error::FileIoError;
use path_guard::PathGuard;
use serde::Serialize;

/// Outcome of a file operation. Failures are values, never panics or
/// propagated errors, so every caller gets a well-formed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult<T> {
    Success(T),
    Failure(String),
}

impl<T> OperationResult<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, OperationResult::Failure(_))
    }

    #[cfg(test)]
    pub fn into_result(self) -> std::result::Result<T, String> {
        match self {
            OperationResult::Success(v) => Ok(v),
            OperationResult::Failure(msg) => Err(msg),
        }
    }
}

/// Text read from a file, labeled with the path the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutput {
    pub requested_path: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// The read/write/list surface. Each call validates its path through the
/// guard before touching the filesystem.
#[derive(Debug, Clone)]
pub struct FileOps {
    guard: PathGuard,
    diagnostics: bool,
}

impl FileOps {
    pub fn new(guard: PathGuard, diagnostics: bool) -> Self {
        Self { guard, diagnostics }
    }

    #[cfg(test)]
    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub async fn read(&self, path: &str) -> OperationResult<ReadOutput> {
        match read_file::read_file(&self.guard, path).await {
            Ok(content) => OperationResult::Success(ReadOutput {
                requested_path: path.to_string(),
                content,
            }),
            Err(e) => self.failure(path, e),
        }
    }

    pub async fn write(&self, path: &str, content: &str) -> OperationResult<String> {
        match write_file::write_file(&self.guard, path, content).await {
            Ok(()) => OperationResult::Success(format!("Successfully wrote to {}", path)),
            Err(e) => self.failure(path, e),
        }
    }

    /// Lists the allowed root itself when `path` is `None`.
    pub async fn list(&self, path: Option<&str>) -> OperationResult<Vec<DirectoryEntry>> {
        let path = path.unwrap_or(".");
        match list_dir::list_directory(&self.guard, path).await {
            Ok(entries) => OperationResult::Success(entries),
            Err(e) => self.failure(path, e),
        }
    }

    fn failure<T>(&self, path: &str, error: FileIoError) -> OperationResult<T> {
        let mut message = error.to_string();
        match &error {
            FileIoError::AccessDenied(_) | FileIoError::InvalidPath(_) => {}
            _ => {
                tracing::debug!(path, %error, "file operation failed");
                if self.diagnostics
                    && let Ok(resolved) = self.guard.validate(path)
                {
                    message.push_str(&format!(" (resolved: {})", resolved.display()));
                }
            }
        }
        OperationResult::Failure(message)
    }
}
