#![deny(warnings)]

//! Path confinement.
//!
//! Every file operation passes the caller's path string through
//! [`PathGuard::authorize`] (or the pure [`PathGuard::validate`]) and only
//! touches the filesystem with the returned [`ValidatedPath`].
//!
//! Confinement is decided on the lexically normalized absolute path: the
//! candidate is accepted iff it equals the allowed root or starts with the
//! root followed by a path separator. Symbolic links are not followed unless
//! the guard was built with symlink resolution enabled, in which case the
//! real path of the deepest existing ancestor is checked as well.

use crate::error::{ConfigError, FileIoError};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

/// The directory subtree all operations are confined to. Fixed at startup.
#[derive(Debug, Clone)]
pub struct AllowedRoot {
    path: PathBuf,
    path_str: String,
    /// Canonical (symlink-free) form, present only when symlink resolution is on.
    real: Option<(PathBuf, String)>,
}

impl AllowedRoot {
    /// Resolve the configured root: relative roots are taken against the
    /// process working directory, then `.` and `..` are folded away.
    pub fn new(raw: &str, resolve_symlinks: bool) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::MissingRoot);
        }

        let raw_path = Path::new(raw);
        let absolute = if raw_path.is_absolute() {
            raw_path.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|source| ConfigError::InvalidRoot {
                path: raw.to_string(),
                source,
            })?;
            cwd.join(raw_path)
        };
        let path = normalize_lexical(&absolute);
        let path_str = path.to_string_lossy().into_owned();

        let real = if resolve_symlinks {
            let canonical =
                std::fs::canonicalize(&path).map_err(|source| ConfigError::InvalidRoot {
                    path: path_str.clone(),
                    source,
                })?;
            let canonical_str = canonical.to_string_lossy().into_owned();
            Some((canonical, canonical_str))
        } else {
            None
        };

        Ok(Self {
            path,
            path_str,
            real,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_str(&self) -> &str {
        &self.path_str
    }

    pub fn resolves_symlinks(&self) -> bool {
        self.real.is_some()
    }
}

/// An absolute path proven to lie inside the allowed root.
///
/// Only [`PathGuard`] can construct one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath(PathBuf);

impl ValidatedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn display(&self) -> std::path::Display<'_> {
        self.0.display()
    }
}

impl AsRef<Path> for ValidatedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Decides whether candidate paths lie within the allowed root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: AllowedRoot,
}

impl PathGuard {
    pub fn new(root: AllowedRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &AllowedRoot {
        &self.root
    }

    /// Lexical validation only; never touches the filesystem.
    ///
    /// Relative candidates (including `""` and `"."`) are resolved against
    /// the allowed root.
    pub fn validate(&self, candidate: &str) -> Result<ValidatedPath, FileIoError> {
        if candidate.contains('\0') {
            return Err(FileIoError::InvalidPath(
                "path contains NUL byte".to_string(),
            ));
        }

        let raw = Path::new(candidate);
        let joined = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.root.path.join(raw)
        };
        let resolved = normalize_lexical(&joined);

        if !is_within(&resolved.to_string_lossy(), &self.root.path_str) {
            tracing::warn!(candidate, "access denied: path outside allowed root");
            return Err(FileIoError::AccessDenied(candidate.to_string()));
        }

        Ok(ValidatedPath(resolved))
    }

    /// [`validate`](Self::validate), plus a real-path check when the root was
    /// configured with symlink resolution.
    pub async fn authorize(&self, candidate: &str) -> Result<ValidatedPath, FileIoError> {
        let validated = self.validate(candidate)?;

        let Some((_, real_root)) = &self.root.real else {
            return Ok(validated);
        };

        let real = resolve_existing_prefix(validated.as_path())
            .await
            .map_err(|e| FileIoError::from_io_error("resolve path", candidate, e))?;
        match real {
            Some(real) if is_within(&real.to_string_lossy(), real_root) => Ok(validated),
            _ => {
                tracing::warn!(candidate, "access denied: real path escapes allowed root");
                Err(FileIoError::AccessDenied(candidate.to_string()))
            }
        }
    }
}

/// Fold `.` and `..` components without consulting the filesystem.
/// `..` at the filesystem root stays at the root.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push(comp);
                }
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

/// Separator-boundary containment: `/allowed` contains `/allowed` and
/// `/allowed/x` but not `/allowed-evil/x`.
fn is_within(resolved: &str, root: &str) -> bool {
    if resolved == root {
        return true;
    }
    if root.ends_with(MAIN_SEPARATOR) {
        // filesystem root
        return resolved.starts_with(root);
    }
    resolved
        .strip_prefix(root)
        .is_some_and(|rest| rest.starts_with(MAIN_SEPARATOR))
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// missing tail. Returns `None` when some component is a dangling symlink,
/// since its target cannot be checked.
async fn resolve_existing_prefix(path: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut tail: Vec<OsString> = Vec::new();
    let mut current = path.to_path_buf();

    loop {
        match tokio::fs::canonicalize(&current).await {
            Ok(mut real) => {
                for name in tail.iter().rev() {
                    real.push(name);
                }
                return Ok(Some(real));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if tokio::fs::symlink_metadata(&current).await.is_ok() {
                    return Ok(None);
                }
                let (Some(parent), Some(name)) = (current.parent(), current.file_name()) else {
                    return Err(e);
                };
                tail.push(name.to_os_string());
                current = parent.to_path_buf();
            }
            Err(e) => return Err(e),
        }
    }
}
