//! File-based storage implementation.

use super::watch::WatchRegistry;
use super::{
    BlobStore, BoxFuture, ChangeCallback, Document, DocumentStore, Fields, Snapshot, StorageError,
    StorageResult, Subscription, WatchTarget, merge_fields, validate_path,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BLOB_DIR: &str = "_blobs";

/// File-based document store.
///
/// Each document is one JSON file mirroring its path, so
/// `interoperable-canvas/p/overlay/box_1` lands in
/// `<base>/interoperable-canvas/p/overlay/box_1.json`. Subscriptions see
/// writes made through this handle only.
pub struct FileStore {
    base_path: PathBuf,
    watchers: Arc<WatchRegistry>,
}

impl FileStore {
    /// Create a store rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self {
            base_path,
            watchers: Arc::default(),
        })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/intercanvas/store/`
    /// On Windows: `%LOCALAPPDATA%\intercanvas\store\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("intercanvas").join("store"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn document_file(&self, path: &str) -> PathBuf {
        let (dir, name) = match path.rsplit_once('/') {
            Some((parent, name)) => (segments_path(&self.base_path, parent), name),
            None => (self.base_path.clone(), path),
        };
        dir.join(format!("{}.json", sanitize(name)))
    }

    fn collection_dir(&self, path: &str) -> PathBuf {
        segments_path(&self.base_path, path)
    }

    fn blob_file(&self, path: &str) -> PathBuf {
        segments_path(&self.base_path.join(BLOB_DIR), path)
    }

    fn read_document(&self, path: &str) -> StorageResult<Option<Document>> {
        let file = self.document_file(path);
        if !file.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&file)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", file.display(), e)))?;
        serde_json::from_str(&json).map(Some).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", file.display(), e))
        })
    }

    fn write_document(&self, document: &Document) -> StorageResult<()> {
        let file = self.document_file(&document.path);
        if let Some(dir) = file.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                StorageError::Io(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&file, json)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", file.display(), e)))
    }

    fn read_collection(&self, collection: &str) -> StorageResult<Vec<Document>> {
        let dir = self.collection_dir(collection);
        if !dir.exists() {
            return Ok(vec![]);
        }
        let entries = fs::read_dir(&dir)
            .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;

        let mut documents = Vec::new();
        for entry in entries.flatten() {
            let file = entry.path();
            if file.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let json = match fs::read_to_string(&file) {
                Ok(json) => json,
                Err(e) => {
                    log::warn!("Skipping unreadable {}: {}", file.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<Document>(&json) {
                Ok(doc) => documents.push(doc),
                Err(e) => log::warn!("Skipping malformed {}: {}", file.display(), e),
            }
        }
        documents.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(documents)
    }

    fn snapshot(&self, target: &WatchTarget) -> StorageResult<Snapshot> {
        Ok(match target {
            WatchTarget::Document(path) => Snapshot::Document {
                path: path.clone(),
                document: self.read_document(path)?,
            },
            WatchTarget::Collection(path) => Snapshot::Collection {
                path: path.clone(),
                documents: self.read_collection(path)?,
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

fn segments_path(root: &Path, path: &str) -> PathBuf {
    path.split('/')
        .fold(root.to_path_buf(), |acc, segment| acc.join(sanitize(segment)))
}

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl DocumentStore for FileStore {
    fn get(&self, path: &str) -> BoxFuture<'_, StorageResult<Document>> {
        let path = path.to_string();
        Box::pin(async move {
            validate_path(&path)?;
            self.read_document(&path)?
                .ok_or(StorageError::NotFound(path))
        })
    }

    fn set(&self, path: &str, fields: Fields, merge: bool) -> BoxFuture<'_, StorageResult<()>> {
        let path = path.to_string();
        Box::pin(async move {
            validate_path(&path)?;
            let fields = if merge {
                let mut base = self
                    .read_document(&path)?
                    .map(|existing| existing.fields)
                    .unwrap_or_default();
                merge_fields(&mut base, fields);
                base
            } else {
                fields
            };
            self.write_document(&Document::new(path.clone(), fields))?;
            self.notify(&path);
            Ok(())
        })
    }

    fn delete(&self, path: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = path.to_string();
        Box::pin(async move {
            validate_path(&path)?;
            let file = self.document_file(&path);
            if file.exists() {
                fs::remove_file(&file).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", file.display(), e))
                })?;
                self.notify(&path);
            }
            Ok(())
        })
    }

    fn list(&self, collection: &str) -> BoxFuture<'_, StorageResult<Vec<Document>>> {
        let collection = collection.to_string();
        Box::pin(async move {
            validate_path(&collection)?;
            self.read_collection(&collection)
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

impl BlobStore for FileStore {
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
            let file = self.blob_file(&path);
            if let Some(dir) = file.parent() {
                fs::create_dir_all(dir).map_err(|e| {
                    StorageError::Io(format!("Failed to create {}: {}", dir.display(), e))
                })?;
            }
            fs::write(&file, bytes).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {}", file.display(), e))
            })?;
            log::debug!("Stored blob {} ({})", path, content_type);
            Ok(())
        })
    }

    fn get_url(&self, path: &str) -> BoxFuture<'_, StorageResult<String>> {
        let path = path.to_string();
        Box::pin(async move {
            validate_path(&path)?;
            let file = self.blob_file(&path);
            if !file.exists() {
                return Err(StorageError::NotFound(path));
            }
            let absolute = fs::canonicalize(&file).map_err(|e| {
                StorageError::Io(format!("Failed to resolve {}: {}", file.display(), e))
            })?;
            url::Url::from_file_path(&absolute)
                .map(|u| u.to_string())
                .map_err(|_| StorageError::InvalidPath(absolute.display().to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_file_store_set_get() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        pollster::block_on(store.set("c/p/overlay/b1", fields(json!({ "x": 10 })), false)).unwrap();
        let doc = pollster::block_on(store.get("c/p/overlay/b1")).unwrap();
        assert_eq!(doc.id(), "b1");
        assert_eq!(doc.fields, fields(json!({ "x": 10 })));
        assert!(dir.path().join("c/p/overlay/b1.json").exists());
    }

    #[test]
    fn test_file_store_merge() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        pollster::block_on(store.set("c/p", fields(json!({ "a": 1, "b": 2 })), false)).unwrap();
        pollster::block_on(store.set("c/p", fields(json!({ "b": 9 })), true)).unwrap();
        let doc = pollster::block_on(store.get("c/p")).unwrap();
        assert_eq!(doc.fields, fields(json!({ "a": 1, "b": 9 })));

        pollster::block_on(store.set("c/p", fields(json!({ "a": null })), true)).unwrap();
        pollster::block_on(store.set("c/q", fields(json!({ "x": 1, "y": null })), true)).unwrap();
        let doc = pollster::block_on(store.get("c/p")).unwrap();
        assert_eq!(doc.fields, fields(json!({ "b": 9 })));
        let doc = pollster::block_on(store.get("c/q")).unwrap();
        assert_eq!(doc.fields, fields(json!({ "x": 1 })));
    }

    #[test]
    fn test_file_store_document_and_subcollection_coexist() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        pollster::block_on(store.set("c/p", fields(json!({ "layers": [] })), false)).unwrap();
        pollster::block_on(store.set("c/p/overlay/a", Fields::new(), false)).unwrap();
        pollster::block_on(store.set("c/p/overlay/b", Fields::new(), false)).unwrap();

        assert!(pollster::block_on(store.get("c/p")).is_ok());
        let ids: Vec<String> = pollster::block_on(store.list("c/p/overlay"))
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_file_store_delete_and_missing() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        assert!(matches!(
            pollster::block_on(store.get("c/nope")),
            Err(StorageError::NotFound(_))
        ));
        pollster::block_on(store.set("c/p", Fields::new(), false)).unwrap();
        pollster::block_on(store.delete("c/p")).unwrap();
        pollster::block_on(store.delete("c/p")).unwrap();
        assert!(pollster::block_on(store.get("c/p")).is_err());
        assert!(pollster::block_on(store.list("c/empty")).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_subscription() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        let seen: Arc<Mutex<Vec<bool>>> = Arc::default();
        let sink = seen.clone();

        let _sub = store
            .subscribe_document(
                "c/p",
                Box::new(move |snapshot| {
                    if let Snapshot::Document { document, .. } = snapshot {
                        sink.lock().unwrap().push(document.is_some());
                    }
                }),
            )
            .unwrap();
        pollster::block_on(store.set("c/p", Fields::new(), true)).unwrap();
        pollster::block_on(store.delete("c/p")).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
    }

    #[test]
    fn test_file_store_blob_url() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        pollster::block_on(store.upload("assets/p/hero.png", vec![0x89, 0x50], "image/png"))
            .unwrap();
        let url = pollster::block_on(store.get_url("assets/p/hero.png")).unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("hero.png"));
        assert!(pollster::block_on(store.get_url("assets/p/missing.png")).is_err());
    }
}
