//! Sandboxed operations on the shared workspace.
//!
//! Every path is resolved component-by-component against the configured
//! root: parent references, absolute components, and NUL bytes are rejected
//! outright, and existing paths are canonicalized and re-verified so a
//! symlink cannot lead outside the root.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("path escapes the shared root")]
    PathEscape,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("refusing to touch the shared root itself")]
    RootProtected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One directory entry in a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FsEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: Option<u64>,
}

/// Handle on the sandbox root.
#[derive(Debug, Clone)]
pub struct SharedFs {
    root: PathBuf,
}

impl SharedFs {
    /// Create the sandbox, making sure the root exists.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a file as bytes.
    pub async fn read(&self, rel: &str) -> Result<Vec<u8>, FsError> {
        let path = self.resolve_verified(rel)?;
        if !path.exists() {
            return Err(FsError::NotFound(rel.to_string()));
        }
        if path.is_dir() {
            return Err(FsError::NotAFile(rel.to_string()));
        }
        Ok(fs::read(&path).await?)
    }

    /// Write a file, creating parent directories as needed.
    pub async fn write(&self, rel: &str, contents: &[u8]) -> Result<(), FsError> {
        let path = self.resolve_verified(rel)?;
        if path == self.root {
            return Err(FsError::RootProtected);
        }
        if path.is_dir() {
            return Err(FsError::NotAFile(rel.to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, contents).await?;
        Ok(())
    }

    /// List a directory, one level deep, directories first.
    pub async fn list(&self, rel: &str) -> Result<Vec<FsEntry>, FsError> {
        let path = self.resolve_verified(rel)?;
        if !path.exists() {
            return Err(FsError::NotFound(rel.to_string()));
        }
        if !path.is_dir() {
            return Err(FsError::NotADirectory(rel.to_string()));
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let meta = entry.metadata().await?;
            entries.push(FsEntry {
                path: relative_path(&self.root, &entry.path()),
                is_dir: meta.is_dir(),
                size: if meta.is_dir() { None } else { Some(meta.len()) },
                name,
            });
        }

        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then(a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// Delete a file or directory tree.
    pub async fn delete(&self, rel: &str) -> Result<(), FsError> {
        let path = self.resolve_verified(rel)?;
        if !path.exists() {
            return Err(FsError::NotFound(rel.to_string()));
        }
        if path == self.root || path.canonicalize()? == self.root.canonicalize()? {
            return Err(FsError::RootProtected);
        }

        if path.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }

    /// Build the absolute path, rejecting traversal before touching the
    /// filesystem.
    fn resolve(&self, rel: &str) -> Result<PathBuf, FsError> {
        if rel.is_empty() || rel == "." {
            return Ok(self.root.clone());
        }

        let mut result = self.root.clone();
        for component in Path::new(rel).components() {
            match component {
                Component::Normal(name) => {
                    if name.to_string_lossy().contains('\0') {
                        warn!("path component contains NUL: {:?}", name);
                        return Err(FsError::PathEscape);
                    }
                    result.push(name);
                }
                // Parent references signal traversal even when they would
                // land back inside the root.
                Component::ParentDir => {
                    warn!("rejected parent reference in shared path: {:?}", rel);
                    return Err(FsError::PathEscape);
                }
                Component::CurDir => continue,
                Component::RootDir | Component::Prefix(_) => {
                    warn!("rejected absolute component in shared path: {:?}", rel);
                    return Err(FsError::PathEscape);
                }
            }
        }

        if !result.starts_with(&self.root) {
            return Err(FsError::PathEscape);
        }
        Ok(result)
    }

    /// Resolve, then canonicalize whatever already exists and confirm it is
    /// still under the root (symlink escape check).
    fn resolve_verified(&self, rel: &str) -> Result<PathBuf, FsError> {
        let built = self.resolve(rel)?;
        let canonical_root = self.root.canonicalize()?;

        if built.exists() {
            let canonical = built.canonicalize()?;
            if !canonical.starts_with(&canonical_root) {
                warn!("symlink escape: {:?} resolves outside the shared root", rel);
                return Err(FsError::PathEscape);
            }
            return Ok(canonical);
        }

        if let Some(parent) = built.parent() {
            if parent.exists() {
                let canonical_parent = parent.canonicalize()?;
                if !canonical_parent.starts_with(&canonical_root) {
                    warn!("parent escape: {:?} resolves outside the shared root", rel);
                    return Err(FsError::PathEscape);
                }
            }
        }
        Ok(built)
    }
}

/// Root-relative path with `/` separators.
fn relative_path(root: &Path, full: &Path) -> String {
    let Ok(relative) = full.strip_prefix(root) else {
        return String::new();
    };
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
