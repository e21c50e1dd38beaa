#![deny(warnings)]

// Read a whole text file

use crate::error::FileIoError;
use crate::operations::path_guard::PathGuard;

/// Read the entire file at `path` as UTF-8 text.
pub async fn read_file(guard: &PathGuard, path: &str) -> Result<String, FileIoError> {
    let target = guard.authorize(path).await?;
    tokio::fs::read_to_string(&target)
        .await
        .map_err(|e| FileIoError::from_io_error("read file", path, e))
}
