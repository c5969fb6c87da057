//! Keeps a [`BoxStore`] and a remote [`DocumentStore`] eventually consistent.
//!
//! Remote changes arrive on store callbacks, which may run on any thread.
//! They are queued on a channel and only touch the box store inside
//! [`SyncBridge::pump`], so every state transition happens on the caller's
//! thread. Local changes go the other way: they are queued as [`WriteOp`]s
//! and sent by [`SyncBridge::flush`]. Failed writes are not retried; they
//! become [`Notice`]s.
//!
//! Concurrent edits to the same box are last-write-wins. The editor assumes
//! one active editor per canvas.

use crate::boxes::{BoxPatch, CanvasBox};
use crate::document::{
    AspectRatio, Background, CanvasRecord, box_to_fields, boxes_from_documents, layer_fields,
    patch_to_fields, rect_fields,
};
use crate::schedule::Debouncer;
use crate::scope::CanvasScope;
use crate::storage::{
    Document, DocumentStore, Fields, Snapshot, StorageError, StorageResult, Subscription,
};
use crate::store::BoxStore;
use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A change reported by the remote store.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    /// Full contents of the box collection.
    Boxes(Vec<Document>),
    /// The canvas document, or `None` if it does not exist.
    Canvas(Option<Document>),
}

/// A pending remote write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        path: String,
        fields: Fields,
        merge: bool,
    },
    Delete {
        path: String,
    },
}

impl WriteOp {
    pub fn path(&self) -> &str {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Delete { path } => path,
        }
    }

    fn action(&self) -> &'static str {
        match self {
            WriteOp::Set { .. } => "save",
            WriteOp::Delete { .. } => "delete",
        }
    }
}

/// Non-blocking notification for the user about a failed remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub action: &'static str,
    pub path: String,
    pub error: StorageError,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to {} {}: {}", self.action, self.path, self.error)
    }
}

/// Canvas-level settings adopted from (or seeded into) the canvas document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanvasSettings {
    pub background: Background,
    pub aspect: AspectRatio,
}

/// Bridge between one canvas scope's box store and the remote document store.
pub struct SyncBridge<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    scope: CanvasScope,
    events: Option<Receiver<RemoteEvent>>,
    subscriptions: Vec<Subscription>,
    seeded: bool,
    boxes_loaded: bool,
    canvas_loaded: bool,
    layer_debounce: Debouncer,
    outbox: VecDeque<WriteOp>,
    notices: Vec<Notice>,
    canvas: CanvasSettings,
    defaults: CanvasSettings,
}

impl<S: DocumentStore + ?Sized> SyncBridge<S> {
    pub fn new(store: Arc<S>, scope: CanvasScope) -> Self {
        Self {
            store,
            scope,
            events: None,
            subscriptions: Vec::new(),
            seeded: false,
            boxes_loaded: false,
            canvas_loaded: false,
            layer_debounce: Debouncer::default(),
            outbox: VecDeque::new(),
            notices: Vec::new(),
            canvas: CanvasSettings::default(),
            defaults: CanvasSettings::default(),
        }
    }

    /// Settings written when a canvas document has no background yet.
    pub fn with_defaults(mut self, defaults: CanvasSettings) -> Self {
        self.canvas = defaults.clone();
        self.defaults = defaults;
        self
    }

    pub fn with_layer_debounce(mut self, delay: Duration) -> Self {
        self.layer_debounce.set_delay(delay);
        self
    }

    pub fn scope(&self) -> &CanvasScope {
        &self.scope
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn canvas(&self) -> &CanvasSettings {
        &self.canvas
    }

    pub fn is_attached(&self) -> bool {
        self.events.is_some()
    }

    /// Both the box collection and the canvas document have been received
    /// since the last attach.
    pub fn is_ready(&self) -> bool {
        self.boxes_loaded && self.canvas_loaded
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Subscribe to the scope's box collection and canvas document.
    ///
    /// Re-attaching tears down the previous subscriptions first.
    pub fn attach(&mut self) -> StorageResult<()> {
        if self.is_attached() {
            self.drop_subscriptions();
        }

        let (tx, rx) = channel::<RemoteEvent>();
        let boxes_tx = tx.clone();
        let boxes = self.store.subscribe_collection(
            &self.scope.boxes_collection_path(),
            Box::new(move |snapshot| {
                if let Snapshot::Collection { documents, .. } = snapshot {
                    let _ = boxes_tx.send(RemoteEvent::Boxes(documents));
                }
            }),
        )?;
        let canvas = self.store.subscribe_document(
            &self.scope.canvas_doc_path(),
            Box::new(move |snapshot| {
                if let Snapshot::Document { document, .. } = snapshot {
                    let _ = tx.send(RemoteEvent::Canvas(document));
                }
            }),
        )?;

        self.subscriptions = vec![boxes, canvas];
        self.events = Some(rx);
        self.seeded = false;
        self.boxes_loaded = false;
        self.canvas_loaded = false;
        log::info!("Attached to canvas {}", self.scope);
        Ok(())
    }

    /// Stop listening. A pending layer write is queued first; remote events
    /// not yet applied are discarded.
    pub fn detach(&mut self, store: &BoxStore) {
        self.flush_layers_now(store);
        if self.is_attached() {
            self.drop_subscriptions();
            log::info!("Detached from canvas {}", self.scope);
        }
    }

    fn drop_subscriptions(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.events = None;
    }

    /// Apply queued remote events, then queue the layer write if its
    /// debounce window has passed. Returns how many events were applied.
    pub fn pump(&mut self, store: &mut BoxStore, now: Instant) -> usize {
        let mut applied = 0;
        loop {
            let event = match &self.events {
                Some(rx) => match rx.try_recv() {
                    Ok(event) => event,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log::warn!("Remote event channel closed for {}", self.scope);
                        break;
                    }
                },
                None => break,
            };
            self.apply(store, event);
            applied += 1;
        }

        if self.layer_debounce.fire(now) {
            self.queue_layers(store);
        }
        applied
    }

    fn apply(&mut self, store: &mut BoxStore, event: RemoteEvent) {
        match event {
            RemoteEvent::Boxes(documents) => {
                let boxes = boxes_from_documents(&documents);
                log::debug!("Adopting {} remote boxes for {}", boxes.len(), self.scope);
                store.replace_boxes(boxes);
                self.boxes_loaded = true;
            }
            RemoteEvent::Canvas(document) => {
                self.canvas_loaded = true;
                let record = document
                    .as_ref()
                    .map(|doc| CanvasRecord::from_fields(&doc.path, &doc.fields))
                    .unwrap_or_default();
                self.adopt_canvas(store, record);
            }
        }
    }

    fn adopt_canvas(&mut self, store: &mut BoxStore, record: CanvasRecord) {
        if let Some(aspect) = record.aspect {
            self.canvas.aspect = aspect;
        }

        match &record.background {
            Some(background) => self.canvas.background = background.clone(),
            None if !self.seeded => self.seed(store, &record),
            None => {}
        }

        if let Some(ids) = &record.layers {
            if self.layer_debounce.is_armed() {
                log::debug!("Keeping local layer order for {} until it is written", self.scope);
            } else {
                store.apply_layer_order(ids);
            }
        }
    }

    /// First-run initialization: write the default background, plus aspect
    /// and layer order when the document lacks them.
    fn seed(&mut self, store: &BoxStore, record: &CanvasRecord) {
        self.seeded = true;
        self.canvas.background = self.defaults.background.clone();
        if record.aspect.is_none() {
            self.canvas.aspect = self.defaults.aspect;
        }

        let seed = CanvasRecord {
            background: Some(self.canvas.background.clone()),
            aspect: record.aspect.is_none().then_some(self.canvas.aspect),
            layers: record.layers.is_none().then(|| store.layers().ids()),
            z_index_map: record
                .layers
                .is_none()
                .then(|| store.layers().z_index_map()),
        };
        log::info!("Seeding canvas document for {}", self.scope);
        self.push(WriteOp::Set {
            path: self.scope.canvas_doc_path(),
            fields: seed.to_fields(),
            merge: true,
        });
    }

    // --- Local changes ---

    /// Queue a full write of a newly created (or replaced) box.
    pub fn record_box(&mut self, b: &CanvasBox) {
        self.push(WriteOp::Set {
            path: self.scope.box_doc_path(&b.id),
            fields: box_to_fields(b),
            merge: false,
        });
    }

    /// Queue a merge write of only the fields a patch touched.
    pub fn record_patch(&mut self, id: &str, patch: &BoxPatch) {
        let fields = patch_to_fields(patch);
        if fields.is_empty() {
            return;
        }
        self.push(WriteOp::Set {
            path: self.scope.box_doc_path(id),
            fields,
            merge: true,
        });
    }

    /// Queue geometry writes for every listed box, one per box.
    pub fn record_geometry(&mut self, store: &BoxStore, ids: &[String]) {
        for id in ids {
            if let Some(b) = store.get(id) {
                self.push(WriteOp::Set {
                    path: self.scope.box_doc_path(id),
                    fields: rect_fields(b.rect),
                    merge: true,
                });
            }
        }
    }

    pub fn record_delete(&mut self, ids: &[String]) {
        for id in ids {
            self.push(WriteOp::Delete {
                path: self.scope.box_doc_path(id),
            });
        }
    }

    /// Note a change to the layer order. Rapid successive calls coalesce
    /// into one write.
    pub fn layers_changed(&mut self, now: Instant) {
        self.layer_debounce.arm(now);
    }

    pub fn layer_write_pending(&self) -> bool {
        self.layer_debounce.is_armed()
    }

    /// Queue the pending layer write immediately, if there is one.
    pub fn flush_layers_now(&mut self, store: &BoxStore) {
        if self.layer_debounce.fire_now() {
            self.queue_layers(store);
        }
    }

    pub fn set_background(&mut self, background: Background) {
        self.canvas.background = background;
        let record = CanvasRecord {
            background: Some(self.canvas.background.clone()),
            ..Default::default()
        };
        self.push(WriteOp::Set {
            path: self.scope.canvas_doc_path(),
            fields: record.to_fields(),
            merge: true,
        });
    }

    pub fn set_aspect(&mut self, aspect: AspectRatio) {
        self.canvas.aspect = aspect;
        let record = CanvasRecord {
            aspect: Some(aspect),
            ..Default::default()
        };
        self.push(WriteOp::Set {
            path: self.scope.canvas_doc_path(),
            fields: record.to_fields(),
            merge: true,
        });
    }

    fn queue_layers(&mut self, store: &BoxStore) {
        self.push(WriteOp::Set {
            path: self.scope.canvas_doc_path(),
            fields: layer_fields(store.layers()),
            merge: true,
        });
    }

    fn push(&mut self, op: WriteOp) {
        self.outbox.push_back(op);
    }

    // --- Outbox ---

    pub fn pending_writes(&self) -> impl Iterator<Item = &WriteOp> {
        self.outbox.iter()
    }

    pub fn pending_write_count(&self) -> usize {
        self.outbox.len()
    }

    /// Send every queued write in order. Failures become notices.
    /// Returns how many writes succeeded.
    pub async fn flush(&mut self) -> usize {
        let mut written = 0;
        while let Some(op) = self.outbox.pop_front() {
            let result = match &op {
                WriteOp::Set {
                    path,
                    fields,
                    merge,
                } => self.store.set(path, fields.clone(), *merge).await,
                WriteOp::Delete { path } => self.store.delete(path).await,
            };
            match result {
                Ok(()) => written += 1,
                Err(error) => {
                    let notice = Notice {
                        action: op.action(),
                        path: op.path().to_string(),
                        error,
                    };
                    log::warn!("{}", notice);
                    self.notices.push(notice);
                }
            }
        }
        written
    }

    /// Drain accumulated notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

impl<S: DocumentStore + ?Sized> Drop for SyncBridge<S> {
    fn drop(&mut self) {
        if !self.outbox.is_empty() {
            log::warn!(
                "Dropping {} unsent writes for {}",
                self.outbox.len(),
                self.scope
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::{BoxContent, ContentType};
    use crate::geometry::BoxRect;
    use kurbo::Point;
    use crate::layers::BACKGROUND_LAYER_ID;
    use crate::storage::MemoryStore;
    use crate::store::NewBox;
    use serde_json::json;

    fn scope() -> CanvasScope {
        CanvasScope::root("gardens").unwrap()
    }

    fn bridge(store: &MemoryStore) -> SyncBridge<MemoryStore> {
        SyncBridge::new(Arc::new(store.clone()), scope())
    }

    fn put(store: &MemoryStore, path: &str, value: serde_json::Value) {
        pollster::block_on(store.set(path, value.as_object().cloned().unwrap(), false)).unwrap();
    }

    #[test]
    fn test_attach_seeds_missing_canvas_once() {
        let remote = MemoryStore::new();
        let mut bridge = bridge(&remote);
        let mut boxes = BoxStore::new();

        bridge.attach().unwrap();
        assert_eq!(bridge.pump(&mut boxes, Instant::now()), 2);
        assert!(bridge.is_ready());
        assert!(bridge.is_seeded());
        assert_eq!(bridge.pending_write_count(), 1);

        // A second empty snapshot before the seed lands does not seed again.
        bridge.apply(&mut boxes, RemoteEvent::Canvas(None));
        assert_eq!(bridge.pending_write_count(), 1);

        assert_eq!(pollster::block_on(bridge.flush()), 1);
        let doc = pollster::block_on(remote.get("interoperable-canvas/gardens")).unwrap();
        assert_eq!(doc.fields.get("aspect"), Some(&json!("16:9")));
        assert_eq!(doc.fields.get("layers"), Some(&json!(["background"])));
        assert_eq!(
            doc.fields.get("background"),
            Some(&json!({ "mode": "solid", "from": "#ffffff", "to": "#ffffff" }))
        );

        // The seed echoes back and is adopted without another write.
        bridge.pump(&mut boxes, Instant::now());
        assert_eq!(bridge.pending_write_count(), 0);
    }

    #[test]
    fn test_seed_preserves_existing_layers() {
        let remote = MemoryStore::new();
        put(&remote, "interoperable-canvas/gardens", json!({ "layers": ["a"] }));
        let mut bridge = bridge(&remote);
        let mut boxes = BoxStore::new();

        bridge.attach().unwrap();
        bridge.pump(&mut boxes, Instant::now());

        let op = bridge.pending_writes().next().cloned().unwrap();
        match op {
            WriteOp::Set { fields, merge, .. } => {
                assert!(merge);
                assert!(fields.get("background").is_some());
                assert!(fields.get("layers").is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(boxes.layers().ids(), vec![BACKGROUND_LAYER_ID, "a"]);
    }

    #[test]
    fn test_adopts_remote_canvas_and_boxes() {
        let remote = MemoryStore::new();
        put(
            &remote,
            "interoperable-canvas/gardens",
            json!({
                "background": { "mode": "linear", "from": "#000000", "to": "#ffffff" },
                "aspect": "4:3",
                "layers": ["b2", "b1"],
            }),
        );
        put(
            &remote,
            "interoperable-canvas/gardens/overlay/b1",
            json!({
                "id": "b1", "x": 0, "y": 0, "w": 10, "h": 10,
                "contentType": "text", "text": "hi"
            }),
        );
        put(
            &remote,
            "interoperable-canvas/gardens/overlay/b2",
            json!({ "id": "b2", "x": 5, "y": 5, "w": 10, "h": 10 }),
        );

        let mut bridge = bridge(&remote);
        let mut boxes = BoxStore::new();
        bridge.attach().unwrap();
        bridge.pump(&mut boxes, Instant::now());

        assert!(!bridge.is_seeded());
        assert_eq!(bridge.pending_write_count(), 0);
        assert_eq!(bridge.canvas().aspect, AspectRatio::new(4, 3).unwrap());
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes.layers().ids(), vec![BACKGROUND_LAYER_ID, "b2", "b1"]);
        assert_eq!(boxes.get("b1").unwrap().content, BoxContent::text("hi"));
    }

    #[test]
    fn test_remote_box_snapshot_replaces_local_set() {
        let remote = MemoryStore::new();
        let mut bridge = bridge(&remote);
        let mut boxes = BoxStore::new();
        bridge.attach().unwrap();
        bridge.pump(&mut boxes, Instant::now());

        boxes.create_box(NewBox::new(BoxRect::new(0, 0, 50, 50)).id("local-only"));
        put(
            &remote,
            "interoperable-canvas/gardens/overlay/remote",
            json!({ "x": 1, "y": 1, "w": 20, "h": 20 }),
        );
        bridge.pump(&mut boxes, Instant::now());

        assert!(boxes.get("local-only").is_none());
        assert!(boxes.get("remote").is_some());
    }

    #[test]
    fn test_pump_skips_degenerate_and_far_boxes() {
        let remote = MemoryStore::new();
        put(
            &remote,
            "interoperable-canvas/gardens/overlay/flat",
            json!({ "x": 0, "y": 0, "w": 0, "h": -5 }),
        );
        put(
            &remote,
            "interoperable-canvas/gardens/overlay/far",
            json!({ "x": 2147483647.0, "y": 0, "w": 10, "h": 10 }),
        );
        put(
            &remote,
            "interoperable-canvas/gardens/overlay/ok",
            json!({ "x": 0, "y": 0, "w": 10, "h": 10 }),
        );
        let mut bridge = bridge(&remote);
        let mut boxes = BoxStore::new();
        bridge.attach().unwrap();
        bridge.pump(&mut boxes, Instant::now());

        assert_eq!(boxes.len(), 1);
        assert!(boxes.get("flat").is_none());
        assert!(boxes.get("far").is_none());
        assert_eq!(boxes.box_at(Point::new(5.0, 5.0)).map(|b| b.id.as_str()), Some("ok"));
    }

    #[test]
    fn test_content_switch_survives_echo() {
        let remote = MemoryStore::new();
        let mut bridge = bridge(&remote);
        let mut boxes = BoxStore::new();
        bridge.attach().unwrap();
        bridge.pump(&mut boxes, Instant::now());

        let id = boxes.create_box(
            NewBox::new(BoxRect::new(0, 0, 50, 50))
                .id("media")
                .content(BoxContent::image("https://x/old.png")),
        );
        bridge.record_box(boxes.get(&id).unwrap());
        pollster::block_on(bridge.flush());
        bridge.pump(&mut boxes, Instant::now());

        let patch = BoxPatch::content(ContentType::Animation.empty_content());
        assert!(boxes.update_box(&id, &patch));
        bridge.record_patch(&id, &patch);
        pollster::block_on(bridge.flush());
        bridge.pump(&mut boxes, Instant::now());

        assert_eq!(boxes.get(&id).unwrap().content, ContentType::Animation.empty_content());
        assert_eq!(boxes.get(&id).unwrap().rect, BoxRect::new(0, 0, 50, 50));
    }

    #[test]
    fn test_layer_writes_are_debounced() {
        let remote = MemoryStore::new();
        let mut bridge = bridge(&remote).with_layer_debounce(Duration::from_millis(200));
        let mut boxes = BoxStore::new();
        for id in ["a", "b", "c"] {
            boxes.create_box(NewBox::new(BoxRect::new(0, 0, 20, 20)).id(id));
        }
        let start = Instant::now();

        boxes.layers_mut().move_up("a");
        bridge.layers_changed(start);
        boxes.layers_mut().move_up("a");
        bridge.layers_changed(start + Duration::from_millis(100));

        bridge.pump(&mut boxes, start + Duration::from_millis(250));
        assert_eq!(bridge.pending_write_count(), 0);

        bridge.pump(&mut boxes, start + Duration::from_millis(300));
        assert_eq!(bridge.pending_write_count(), 1);
        pollster::block_on(bridge.flush());

        let doc = pollster::block_on(remote.get("interoperable-canvas/gardens")).unwrap();
        assert_eq!(doc.fields.get("layers"), Some(&json!(["background", "b", "c", "a"])));
        assert_eq!(doc.fields.get("zIndexMap").and_then(|m| m.get("a")), Some(&json!(3)));
    }

    #[test]
    fn test_pending_local_order_survives_remote_canvas_change() {
        let remote = MemoryStore::new();
        let mut bridge = bridge(&remote);
        let mut boxes = BoxStore::new();
        for id in ["a", "b"] {
            boxes.create_box(NewBox::new(BoxRect::new(0, 0, 20, 20)).id(id));
        }
        boxes.layers_mut().move_up("a");
        bridge.layers_changed(Instant::now());

        bridge.apply(
            &mut boxes,
            RemoteEvent::Canvas(Some(Document::new(
                "interoperable-canvas/gardens",
                json!({
                    "background": { "mode": "solid", "from": "#fff", "to": "#fff" },
                    "layers": ["a", "b"]
                })
                .as_object()
                .cloned()
                .unwrap(),
            ))),
        );
        assert_eq!(boxes.layers().ids(), vec![BACKGROUND_LAYER_ID, "b", "a"]);
    }

    #[test]
    fn test_detach_fires_pending_layer_write_and_stops_events() {
        let remote = MemoryStore::new();
        let mut bridge = bridge(&remote);
        let mut boxes = BoxStore::new();
        bridge.attach().unwrap();
        bridge.pump(&mut boxes, Instant::now());
        pollster::block_on(bridge.flush());

        bridge.layers_changed(Instant::now());
        bridge.detach(&boxes);
        assert!(!bridge.layer_write_pending());
        assert_eq!(bridge.pending_write_count(), 1);
        assert_eq!(remote.watcher_count(), 0);

        put(
            &remote,
            "interoperable-canvas/gardens/overlay/late",
            json!({ "x": 1, "y": 1, "w": 20, "h": 20 }),
        );
        assert_eq!(bridge.pump(&mut boxes, Instant::now()), 0);
        assert!(boxes.get("late").is_none());
    }

    #[test]
    fn test_failed_writes_become_notices() {
        let remote = MemoryStore::new();
        let mut bridge = bridge(&remote);
        let b = CanvasBox::new("b1", BoxRect::new(0, 0, 20, 20));

        remote.set_offline(true);
        bridge.record_box(&b);
        bridge.record_delete(&["b2".to_string()]);
        assert_eq!(pollster::block_on(bridge.flush()), 0);

        let notices = bridge.take_notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].action, "save");
        assert_eq!(notices[1].action, "delete");
        assert!(notices[0].to_string().contains("interoperable-canvas/gardens/overlay/b1"));
        assert_eq!(bridge.pending_write_count(), 0);
        assert!(bridge.take_notices().is_empty());
    }

    #[test]
    fn test_patch_writes_only_touched_fields() {
        let remote = MemoryStore::new();
        let mut bridge = bridge(&remote);
        let b =
            CanvasBox::new("b1", BoxRect::new(0, 0, 20, 20)).with_content(BoxContent::text("x"));
        bridge.record_box(&b);
        bridge.record_patch("b1", &BoxPatch::position(7, 8));
        bridge.record_patch("b1", &BoxPatch::default());
        assert_eq!(bridge.pending_write_count(), 2);
        pollster::block_on(bridge.flush());

        let doc =
            pollster::block_on(remote.get("interoperable-canvas/gardens/overlay/b1")).unwrap();
        assert_eq!(doc.fields.get("x"), Some(&json!(7)));
        assert_eq!(doc.fields.get("w"), Some(&json!(20)));
        assert_eq!(doc.fields.get("text"), Some(&json!("x")));
    }

    #[test]
    fn test_last_write_wins_across_editors() {
        // Two editors on one canvas: the later write to the same box wins and
        // the earlier edit is lost. Accepted for single-editor canvases.
        let remote = MemoryStore::new();
        let mut alice = bridge(&remote);
        let mut bob = bridge(&remote);
        let mut alice_boxes = BoxStore::new();
        let mut bob_boxes = BoxStore::new();

        put(
            &remote,
            "interoperable-canvas/gardens/overlay/shared",
            json!({ "x": 0, "y": 0, "w": 40, "h": 40 }),
        );
        alice.attach().unwrap();
        bob.attach().unwrap();
        alice.pump(&mut alice_boxes, Instant::now());
        bob.pump(&mut bob_boxes, Instant::now());

        alice.record_patch("shared", &BoxPatch::position(10, 0));
        bob.record_patch("shared", &BoxPatch::position(20, 0));
        pollster::block_on(alice.flush());
        pollster::block_on(bob.flush());

        alice.pump(&mut alice_boxes, Instant::now());
        assert_eq!(alice_boxes.get("shared").unwrap().rect.x, 20);
    }

    #[test]
    fn test_background_change_is_written() {
        let remote = MemoryStore::new();
        let mut bridge = bridge(&remote);
        bridge.set_background(Background::solid("#123456"));
        bridge.set_aspect(AspectRatio::new(1, 1).unwrap());
        pollster::block_on(bridge.flush());

        let doc = pollster::block_on(remote.get("interoperable-canvas/gardens")).unwrap();
        assert_eq!(doc.fields.get("aspect"), Some(&json!("1:1")));
        assert_eq!(
            doc.fields.get("background").and_then(|b| b.get("from")),
            Some(&json!("#123456"))
        );
    }
}
