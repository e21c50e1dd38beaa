#![deny(warnings)]

// List directory contents

use crate::error::FileIoError;
use crate::operations::path_guard::PathGuard;
use crate::operations::{DirectoryEntry, EntryKind};

/// List the immediate children of the directory at `path`, in the order the
/// filesystem returns them.
///
/// Entry types come from the directory entry itself, so symlinks are not
/// followed; anything that is not a directory is reported as a file.
pub async fn list_directory(
    guard: &PathGuard,
    path: &str,
) -> Result<Vec<DirectoryEntry>, FileIoError> {
    let dir = guard.authorize(path).await?;

    let mut read_dir = tokio::fs::read_dir(&dir)
        .await
        .map_err(|e| FileIoError::from_io_error("list directory", path, e))?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| FileIoError::from_io_error("read directory entry in", path, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().await.map_err(|e| {
            FileIoError::from_io_error("read metadata for", &format!("{}/{}", path, name), e)
        })?;

        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        entries.push(DirectoryEntry { name, kind });
    }

    Ok(entries)
}
