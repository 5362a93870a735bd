//! Local object store for uploaded images and chat attachments.
//!
//! Records only keep the stored *path* of an object. Turning that path into a
//! fetchable url happens at read time through [`Storage::resolve_url`], which
//! falls back to the placeholder image whenever the object cannot be served.

use sha2::{Digest, Sha256};
use std::{
    io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object path `{0}`")]
    InvalidPath(String),
    #[error("object `{0}` does not exist")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    public_url: String,
    placeholder: String,
}

impl Storage {
    pub fn new(
        root: impl Into<PathBuf>,
        public_url: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Storage {
        Storage {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            placeholder: placeholder.into(),
        }
    }

    /// Stores `bytes` under `prefix` and returns the new object path.
    ///
    /// Every upload gets its own object, even when two records upload the
    /// same file, so deleting one record's object never touches another's.
    pub async fn put(&self, prefix: &str, file_name: &str, bytes: &[u8]) -> StorageResult<String> {
        let digest = Sha256::digest(bytes);
        let hash: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
        let path = format!(
            "{}/{hash}-{}-{}",
            prefix.trim_matches('/'),
            nanoid::nanoid!(10),
            sanitize_file_name(file_name)
        );
        self.put_at(&path, bytes).await?;
        Ok(path)
    }

    /// Writes `bytes` to a fixed path, replacing any previous object.
    pub async fn put_at(&self, path: &str, bytes: &[u8]) -> StorageResult<()> {
        let full = self.full_path(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        tracing::debug!(path, size = bytes.len(), "stored object");
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> StorageResult<()> {
        let full = self.full_path(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes an object that is being replaced or orphaned. Failures are
    /// logged and otherwise ignored.
    pub async fn delete_quietly(&self, path: Option<&str>) {
        let Some(path) = path.filter(|p| !is_remote(p) && !p.is_empty()) else {
            return;
        };
        if let Err(e) = self.delete(path).await {
            tracing::warn!(path, error = %e, "failed to delete object");
        }
    }

    /// Removes everything stored under `prefix`. A missing directory is fine.
    pub async fn delete_dir_quietly(&self, prefix: &str) {
        let full = match self.full_path(prefix.trim_matches('/')) {
            Ok(full) => full,
            Err(e) => {
                tracing::warn!(prefix, error = %e, "refusing to delete directory");
                return;
            }
        };
        match tokio::fs::remove_dir_all(&full).await {
            Ok(()) => tracing::debug!(prefix, "deleted directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(prefix, error = %e, "failed to delete directory"),
        }
    }

    pub async fn exists(&self, path: &str) -> StorageResult<bool> {
        let full = self.full_path(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Url a client can fetch for a stored reference.
    pub async fn resolve_url(&self, reference: Option<&str>) -> String {
        let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
            return self.placeholder.clone();
        };
        if is_remote(reference) {
            return reference.to_string();
        }

        match self.exists(reference).await {
            Ok(true) => format!("{}/files/{}", self.public_url, reference),
            Ok(false) => {
                tracing::warn!(path = reference, "stored object is missing");
                self.placeholder.clone()
            }
            Err(e) => {
                tracing::warn!(path = reference, error = %e, "could not resolve object url");
                self.placeholder.clone()
            }
        }
    }

    fn full_path(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path);
        let valid = !path.is_empty()
            && !path.split('/').any(|s| s.is_empty() || s == "." || s == "..")
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("https://")
}

/// Keeps ascii letters, digits, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn is_image(bytes: &[u8]) -> bool {
    infer::is_image(bytes)
}

/// Mime type sniffed from content, if recognised.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}
