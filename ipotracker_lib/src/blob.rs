//! Object storage for the CSV blobs passed from the collector to the reconciler.
//!
//! The store doubles as a durable work queue. Consumers `claim` a blob
//! before reading it, then `ack` (delete) or `release` (return) it, so two
//! overlapping reconciler runs never process the same blob.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum BlobError {
    #[error("blob store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid blob name '{0}'")]
    InvalidName(String),
}

/// A blob that this process has exclusive hold of until acked or released.
#[derive(Debug, PartialEq, Eq)]
pub struct ClaimedBlob {
    name: String,
}

impl ClaimedBlob {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Storage operations used by the collector (write) and reconciler (drain).
pub trait BlobStore {
    /// Stores a blob. It becomes visible to `list_pending` only once complete.
    fn put(&self, name: &str, data: &[u8]) -> Result<(), BlobError>;

    /// Names of all unclaimed blobs, sorted.
    fn list_pending(&self) -> Result<Vec<String>, BlobError>;

    /// Takes exclusive hold of a pending blob.
    ///
    /// Returns `Ok(None)` if the blob is gone, typically because another
    /// run claimed it first.
    fn claim(&self, name: &str) -> Result<Option<ClaimedBlob>, BlobError>;

    fn read(&self, claim: &ClaimedBlob) -> Result<Vec<u8>, BlobError>;

    /// Deletes a fully processed blob.
    fn ack(&self, claim: ClaimedBlob) -> Result<(), BlobError>;

    /// Returns a claimed blob to the pending set for a later retry.
    fn release(&self, claim: ClaimedBlob) -> Result<(), BlobError>;

    /// Moves every in-flight blob back to pending, for recovery after a
    /// crashed run. Returns how many were moved.
    fn requeue_inflight(&self) -> Result<usize, BlobError>;
}

/// A bucket backed by a local directory.
///
/// Pending blobs live in the root, claimed blobs in `.inflight/`, and
/// partially written uploads in `.incoming/`. Claims rely on `rename` being
/// atomic within one filesystem.
pub struct DirBlobStore {
    root: PathBuf,
}

const INFLIGHT_DIR: &str = ".inflight";
const INCOMING_DIR: &str = ".incoming";

impl DirBlobStore {
    /// Opens (creating if needed) a bucket rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, BlobError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(INFLIGHT_DIR))?;
        fs::create_dir_all(root.join(INCOMING_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pending_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn inflight_path(&self, name: &str) -> PathBuf {
        self.root.join(INFLIGHT_DIR).join(name)
    }
}

fn validate_name(name: &str) -> Result<(), BlobError> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(BlobError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl BlobStore for DirBlobStore {
    fn put(&self, name: &str, data: &[u8]) -> Result<(), BlobError> {
        validate_name(name)?;
        let staging = self.root.join(INCOMING_DIR).join(name);
        fs::write(&staging, data)?;
        fs::rename(&staging, self.pending_path(name))?;
        tracing::debug!(blob = name, bytes = data.len(), "Stored blob");
        Ok(())
    }

    fn list_pending(&self) -> Result<Vec<String>, BlobError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn claim(&self, name: &str) -> Result<Option<ClaimedBlob>, BlobError> {
        validate_name(name)?;
        match fs::rename(self.pending_path(name), self.inflight_path(name)) {
            Ok(()) => Ok(Some(ClaimedBlob {
                name: name.to_string(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self, claim: &ClaimedBlob) -> Result<Vec<u8>, BlobError> {
        Ok(fs::read(self.inflight_path(&claim.name))?)
    }

    fn ack(&self, claim: ClaimedBlob) -> Result<(), BlobError> {
        fs::remove_file(self.inflight_path(&claim.name))?;
        Ok(())
    }

    fn release(&self, claim: ClaimedBlob) -> Result<(), BlobError> {
        fs::rename(
            self.inflight_path(&claim.name),
            self.pending_path(&claim.name),
        )?;
        Ok(())
    }

    fn requeue_inflight(&self) -> Result<usize, BlobError> {
        let mut moved = 0;
        for entry in fs::read_dir(self.root.join(INFLIGHT_DIR))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            fs::rename(entry.path(), self.pending_path(&name))?;
            tracing::info!(blob = %name, "Requeued in-flight blob");
            moved += 1;
        }
        Ok(moved)
    }
}
