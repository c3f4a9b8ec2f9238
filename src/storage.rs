//! Object storage collaborator for uploaded document bytes.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object reference: {0}")]
    InvalidReference(String),
}

/// Stores original uploaded document bytes and hands back an opaque
/// reference for later retrieval or deletion.
pub trait ObjectStore {
    fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String, StorageError>;

    fn get(&self, reference: &str) -> Result<Vec<u8>, StorageError>;

    fn delete(&self, reference: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed store rooted at a directory. References are relative
/// paths with a uuid prefix so identical file names never collide.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, StorageError> {
        // References are crate-generated, but reject traversal anyway.
        let path = Path::new(reference);
        if path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(StorageError::InvalidReference(reference.to_string()));
        }
        Ok(self.root.join(path))
    }
}

/// Keep letters, digits, dot, dash, underscore; everything else becomes '_'.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let reference = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let path = self.root.join(&reference);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        tracing::debug!(reference, size = bytes.len(), "Stored document file");
        Ok(reference)
    }

    fn get(&self, reference: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(reference)?;
        Ok(fs::read(path)?)
    }

    fn delete(&self, reference: &str) -> Result<(), StorageError> {
        let path = self.resolve(reference)?;
        fs::remove_file(path)?;
        tracing::debug!(reference, "Deleted document file");
        Ok(())
    }
}
