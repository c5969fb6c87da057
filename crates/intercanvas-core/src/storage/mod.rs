//! Storage abstraction for persistence.
//!
//! The editor treats its backend as a generic document store: slash-separated
//! paths name documents, a document's parent path names its collection, and
//! every document is a flat JSON object. Blobs (uploaded images and the like)
//! live in a separate [`BlobStore`].

mod file;
mod memory;
mod remote;
mod watch;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use remote::RemoteStore;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Field bag of a stored document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A stored document and where it lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(path: impl Into<String>, fields: Fields) -> Self {
        Self {
            path: path.into(),
            fields,
        }
    }

    /// Last path segment.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum WatchTarget {
    Document(String),
    Collection(String),
}

impl WatchTarget {
    /// Whether a write to `doc_path` changes what this target sees.
    pub fn is_affected_by(&self, doc_path: &str) -> bool {
        match self {
            WatchTarget::Document(path) => path == doc_path,
            WatchTarget::Collection(path) => parent_path(doc_path) == Some(path.as_str()),
        }
    }
}

/// Current contents of a watched document or collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
    Document {
        path: String,
        document: Option<Document>,
    },
    Collection {
        path: String,
        documents: Vec<Document>,
    },
}

/// Callback invoked with a fresh snapshot on every change.
pub type ChangeCallback = Box<dyn Fn(Snapshot) + Send + Sync>;

/// Handle to a live subscription. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving changes.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Trait for document store backends.
///
/// Subscriptions fire once immediately with the current snapshot and then
/// after every change to the watched document or collection. Callbacks may
/// run on any thread.
pub trait DocumentStore: Send + Sync {
    /// Read one document.
    fn get(&self, path: &str) -> BoxFuture<'_, StorageResult<Document>>;

    /// Write a document. `merge` patches the named top-level fields, with a
    /// `null` value deleting its field; otherwise the whole document is
    /// replaced.
    fn set(&self, path: &str, fields: Fields, merge: bool) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete a document. Deleting a missing document succeeds.
    fn delete(&self, path: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// All documents directly inside a collection.
    fn list(&self, collection: &str) -> BoxFuture<'_, StorageResult<Vec<Document>>>;

    /// Watch a document or collection.
    fn subscribe(&self, target: WatchTarget, on_change: ChangeCallback)
    -> StorageResult<Subscription>;

    fn subscribe_document(
        &self,
        path: &str,
        on_change: ChangeCallback,
    ) -> StorageResult<Subscription> {
        self.subscribe(WatchTarget::Document(path.to_string()), on_change)
    }

    fn subscribe_collection(
        &self,
        path: &str,
        on_change: ChangeCallback,
    ) -> StorageResult<Subscription> {
        self.subscribe(WatchTarget::Collection(path.to_string()), on_change)
    }
}

/// Trait for binary asset storage.
pub trait BlobStore: Send + Sync {
    fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BoxFuture<'_, StorageResult<()>>;

    /// Public URL for a stored blob.
    fn get_url(&self, path: &str) -> BoxFuture<'_, StorageResult<String>>;
}

/// Reject empty paths, empty segments and relative segments.
pub fn validate_path(path: &str) -> StorageResult<()> {
    let bad = path.is_empty()
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        Err(StorageError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}

/// Path of the collection that holds `path`.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// Shallow merge: every top-level field in `patch` overwrites `target`, and
/// a `null` deletes the field.
pub fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}
