//! In-memory storage implementation.

use super::watch::WatchRegistry;
use super::{
    BlobStore, BoxFuture, ChangeCallback, Document, DocumentStore, Fields, Snapshot, StorageError,
    StorageResult, Subscription, WatchTarget, merge_fields, validate_path,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
struct Blob {
    content_type: String,
    bytes: Vec<u8>,
}

/// In-memory document and blob store for tests and ephemeral sessions.
///
/// Clones share the same data, so one clone can be handed to the editor
/// while another plays the part of a second client.
#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<BTreeMap<String, Fields>>>,
    blobs: Arc<RwLock<HashMap<String, Blob>>>,
    watchers: Arc<WatchRegistry>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with an IO error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live subscriptions.
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Content type recorded for an uploaded blob.
    pub fn blob_content_type(&self, path: &str) -> Option<String> {
        let blobs = self.blobs.read().ok()?;
        blobs.get(path).map(|b| b.content_type.clone())
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::Io("store offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn snapshot(&self, target: &WatchTarget) -> StorageResult<Snapshot> {
        let docs = self
            .documents
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        Ok(match target {
            WatchTarget::Document(path) => Snapshot::Document {
                path: path.clone(),
                document: docs.get(path).map(|f| Document::new(path.clone(), f.clone())),
            },
            WatchTarget::Collection(path) => Snapshot::Collection {
                path: path.clone(),
                documents: collect_collection(&docs, path),
            },
        })
    }

    fn notify(&self, doc_path: &str) {
        for (target, callback) in self.watchers.interested(doc_path) {
            match self.snapshot(&target) {
                Ok(snapshot) => callback(snapshot),
                Err(e) => log::warn!("Failed to build snapshot for {:?}: {}", target, e),
            }
        }
    }
}

fn collect_collection(docs: &BTreeMap<String, Fields>, collection: &str) -> Vec<Document> {
    let prefix = format!("{collection}/");
    docs.range(prefix.clone()..)
        .take_while(|(path, _)| path.starts_with(&prefix))
        .filter(|(path, _)| !path[prefix.len()..].contains('/'))
        .map(|(path, fields)| Document::new(path.clone(), fields.clone()))
        .collect()
}

impl DocumentStore for MemoryStore {
    fn get(&self, path: &str) -> BoxFuture<'_, StorageResult<Document>> {
        let path = path.to_string();
        Box::pin(async move {
            validate_path(&path)?;
            let docs = self
                .documents
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            docs.get(&path)
                .cloned()
                .map(|fields| Document::new(path.clone(), fields))
                .ok_or(StorageError::NotFound(path))
        })
    }

    fn set(&self, path: &str, fields: Fields, merge: bool) -> BoxFuture<'_, StorageResult<()>> {
        let path = path.to_string();
        Box::pin(async move {
            validate_path(&path)?;
            self.check_online()?;
            {
                let mut docs = self
                    .documents
                    .write()
                    .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
                if merge {
                    merge_fields(docs.entry(path.clone()).or_default(), fields);
                } else {
                    docs.insert(path.clone(), fields);
                }
            }
            self.notify(&path);
            Ok(())
        })
    }

    fn delete(&self, path: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = path.to_string();
        Box::pin(async move {
            validate_path(&path)?;
            self.check_online()?;
            let removed = {
                let mut docs = self
                    .documents
                    .write()
                    .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
                docs.remove(&path).is_some()
            };
            if removed {
                self.notify(&path);
            }
            Ok(())
        })
    }

    fn list(&self, collection: &str) -> BoxFuture<'_, StorageResult<Vec<Document>>> {
        let collection = collection.to_string();
        Box::pin(async move {
            validate_path(&collection)?;
            let docs = self
                .documents
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            Ok(collect_collection(&docs, &collection))
        })
    }

    fn subscribe(
        &self,
        target: WatchTarget,
        on_change: ChangeCallback,
    ) -> StorageResult<Subscription> {
        match &target {
            WatchTarget::Document(path) | WatchTarget::Collection(path) => validate_path(path)?,
        }
        let initial = self.snapshot(&target)?;
        let (subscription, callback) = self.watchers.register(target, on_change)?;
        callback(initial);
        Ok(subscription)
    }
}

impl BlobStore for MemoryStore {
    fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let path = path.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            validate_path(&path)?;
            self.check_online()?;
            let mut blobs = self
                .blobs
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            blobs.insert(path, Blob { content_type, bytes });
            Ok(())
        })
    }

    fn get_url(&self, path: &str) -> BoxFuture<'_, StorageResult<String>> {
        let path = path.to_string();
        Box::pin(async move {
            let blobs = self
                .blobs
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            match blobs.get(&path) {
                Some(blob) if !blob.bytes.is_empty() => Ok(format!("memory://{}", path)),
                Some(_) => Err(StorageError::Other(format!("Empty blob: {}", path))),
                None => Err(StorageError::NotFound(path)),
            }
        })
    }
}
