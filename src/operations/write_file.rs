#![deny(warnings)]

// Write content to a file

use crate::error::FileIoError;
use crate::operations::path_guard::PathGuard;
use std::path::MAIN_SEPARATOR;

const SEPARATORS: [char; 2] = ['/', MAIN_SEPARATOR];

/// True when the caller's spelling can only mean a directory: a trailing
/// separator, or a final `.`/`..` component.
fn names_directory(path: &str) -> bool {
    if path.ends_with(SEPARATORS) {
        return true;
    }
    matches!(path.rsplit(SEPARATORS).next(), Some("." | ".."))
}

/// Create or fully overwrite the file at `path` with `content`.
///
/// Missing parent directories are created, but only along the parent chain
/// of the validated target, so directory creation stays inside the root.
pub async fn write_file(guard: &PathGuard, path: &str, content: &str) -> Result<(), FileIoError> {
    let target = guard.authorize(path).await?;

    if names_directory(path) {
        return Err(FileIoError::IsADirectory(format!(
            "cannot write file: {} names a directory",
            path
        )));
    }

    // Writing to the root itself fails below with IsADirectory; its parent is
    // outside the root and must not be created.
    if target.as_path() != guard.root().path()
        && let Some(parent) = target.as_path().parent()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FileIoError::from_io_error("create parent directories for", path, e))?;
    }

    tokio::fs::write(&target, content)
        .await
        .map_err(|e| FileIoError::from_io_error("write file", path, e))
}
