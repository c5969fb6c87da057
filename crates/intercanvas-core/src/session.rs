//! Editing session for one canvas scope.
//!
//! A [`CanvasSession`] is what a UI (or the CLI) drives: pointer events and
//! editor actions go in, the box store is updated synchronously, and the
//! matching remote writes are queued on the sync bridge. Call
//! [`tick`](CanvasSession::tick) from the event loop to apply remote changes
//! and release debounced layer writes, and [`flush`](CanvasSession::flush) to
//! send queued writes.

use crate::boxes::{BoxContent, BoxId, BoxPatch};
use crate::config::EditorConfig;
use crate::document::{AspectRatio, Background};
use crate::geometry::{Alignment, BoxRect, GeometryError};
use crate::report::{self, PlacedReport, Placement, ReportImage};
use crate::schedule::{Clock, SystemClock};
use crate::scope::CanvasScope;
use crate::storage::{DocumentStore, StorageResult};
use crate::store::{BoxStore, NewBox, Tool};
use crate::sync::{CanvasSettings, Notice, SyncBridge};
use crate::tools::CreateGesture;
use kurbo::Point;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct CanvasSession<S: DocumentStore + ?Sized> {
    config: EditorConfig,
    boxes: BoxStore,
    bridge: SyncBridge<S>,
    gesture: CreateGesture,
    clock: Arc<dyn Clock>,
}

impl<S: DocumentStore + ?Sized> CanvasSession<S> {
    /// Open a session on the wall clock and subscribe to the scope.
    pub fn open(store: Arc<S>, scope: CanvasScope, config: EditorConfig) -> StorageResult<Self> {
        Self::open_with_clock(store, scope, config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        store: Arc<S>,
        scope: CanvasScope,
        config: EditorConfig,
        clock: Arc<dyn Clock>,
    ) -> StorageResult<Self> {
        let defaults = CanvasSettings {
            background: config.default_background.clone(),
            aspect: config.default_aspect,
        };
        let mut bridge = SyncBridge::new(store, scope)
            .with_defaults(defaults)
            .with_layer_debounce(config.layer_debounce());
        bridge.attach()?;

        Ok(Self {
            gesture: CreateGesture::new(config.freehand_min_box_size),
            config,
            boxes: BoxStore::new(),
            bridge,
            clock,
        })
    }

    /// Stop listening for remote changes. Pending layer order is queued so a
    /// final [`flush`](Self::flush) still persists it.
    pub fn close(&mut self) {
        self.bridge.detach(&self.boxes);
    }

    pub fn boxes(&self) -> &BoxStore {
        &self.boxes
    }

    pub fn bridge(&self) -> &SyncBridge<S> {
        &self.bridge
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn scope(&self) -> &CanvasScope {
        self.bridge.scope()
    }

    pub fn canvas(&self) -> &CanvasSettings {
        self.bridge.canvas()
    }

    pub fn canvas_height(&self) -> i32 {
        self.canvas().aspect.canvas_height(self.config.canvas_width)
    }

    fn now(&self) -> Instant {
        self.clock.now()
    }

    // --- Event loop ---

    /// Apply remote changes and release due layer writes.
    pub fn tick(&mut self) -> usize {
        let now = self.now();
        self.bridge.pump(&mut self.boxes, now)
    }

    /// Tick until the first box and canvas snapshots have arrived.
    pub fn wait_until_ready(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            if self.bridge.is_ready() {
                return true;
            }
            if Instant::now() >= deadline {
                log::warn!("Timed out waiting for {} to load", self.scope());
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Queue any pending layer write without waiting for the debounce.
    pub fn flush_layers(&mut self) {
        self.bridge.flush_layers_now(&self.boxes);
    }

    /// Send every queued write. Returns how many succeeded.
    pub async fn flush(&mut self) -> usize {
        self.bridge.flush().await
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.bridge.take_notices()
    }

    // --- Tools ---

    pub fn set_tool(&mut self, tool: Tool) {
        self.boxes.set_tool(tool);
        if tool != Tool::AddBox {
            self.gesture.cancel();
        }
    }

    pub fn select(&mut self, id: Option<BoxId>) {
        self.boxes.set_selected(id);
    }

    /// Select the topmost box under the pointer, or start drawing when the
    /// add-box tool is active. Returns true if a gesture started.
    pub fn pointer_down(&mut self, point: Point) -> bool {
        if self.gesture.begin(self.boxes.tool(), point) {
            return true;
        }
        let hit = self.boxes.box_at(point).map(|b| b.id.clone());
        self.boxes.set_selected(hit);
        false
    }

    pub fn pointer_move(&mut self, point: Point) {
        self.gesture.update(point);
    }

    /// Rectangle being drawn, for rendering a preview.
    pub fn gesture_preview(&self) -> Option<BoxRect> {
        self.gesture.preview()
    }

    /// Finish a drag-to-create gesture and commit the box.
    pub fn pointer_up(&mut self, point: Point) -> Option<BoxId> {
        let rect = self.gesture.finish(point)?;
        let id = self
            .boxes
            .create_box(NewBox::new(rect).min_size(self.config.freehand_min_box_size));
        self.record_created(&id);
        Some(id)
    }

    // --- Box actions ---

    /// Create a box programmatically.
    pub fn add_box(&mut self, rect: BoxRect, content: BoxContent) -> BoxId {
        let id = self.boxes.create_box(
            NewBox::new(rect)
                .content(content)
                .min_size(self.config.min_box_size),
        );
        self.record_created(&id);
        id
    }

    fn record_created(&mut self, id: &str) {
        if let Some(b) = self.boxes.get(id) {
            self.bridge.record_box(b);
        }
        let now = self.now();
        self.bridge.layers_changed(now);
    }

    /// Commit a drag. Overlays follow their parent.
    pub fn drag_stop(&mut self, id: &str, x: i32, y: i32) -> Result<Vec<BoxId>, GeometryError> {
        let Some(rect) = self.boxes.get(id).map(|b| b.rect) else {
            return Ok(Vec::new());
        };
        self.commit_rect(id, rect.with_position(x, y))
    }

    /// Commit a resize. Overlays are rescaled with their parent.
    pub fn resize_stop(&mut self, id: &str, rect: BoxRect) -> Result<Vec<BoxId>, GeometryError> {
        self.commit_rect(id, rect)
    }

    fn commit_rect(&mut self, id: &str, rect: BoxRect) -> Result<Vec<BoxId>, GeometryError> {
        let changed = self.boxes.set_rect(id, rect)?;
        self.bridge.record_geometry(&self.boxes, &changed);
        Ok(changed)
    }

    /// Replace a box's content. Returns false for unknown ids.
    pub fn save_content(&mut self, id: &str, content: BoxContent) -> bool {
        self.apply_patch(id, BoxPatch::content(content))
    }

    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> bool {
        self.apply_patch(id, BoxPatch::default().named(name))
    }

    fn apply_patch(&mut self, id: &str, patch: BoxPatch) -> bool {
        if !self.boxes.update_box(id, &patch) {
            return false;
        }
        self.bridge.record_patch(id, &patch);
        true
    }

    /// Delete a box with all of its overlays.
    pub fn delete(&mut self, id: &str) -> Vec<BoxId> {
        let removed = self.boxes.delete_cascade(id);
        if !removed.is_empty() {
            self.bridge.record_delete(&removed);
            let now = self.now();
            self.bridge.layers_changed(now);
        }
        removed
    }

    // --- Layers ---

    pub fn layer_up(&mut self, id: &str) -> bool {
        let moved = self.boxes.layers_mut().move_up(id);
        self.layers_moved(moved)
    }

    pub fn layer_down(&mut self, id: &str) -> bool {
        let moved = self.boxes.layers_mut().move_down(id);
        self.layers_moved(moved)
    }

    pub fn bring_to_front(&mut self, id: &str) -> bool {
        let moved = self.boxes.layers_mut().bring_to_front(id);
        self.layers_moved(moved)
    }

    pub fn send_to_back(&mut self, id: &str) -> bool {
        let moved = self.boxes.layers_mut().send_to_back(id);
        self.layers_moved(moved)
    }

    fn layers_moved(&mut self, moved: bool) -> bool {
        if moved {
            let now = self.now();
            self.bridge.layers_changed(now);
        }
        moved
    }

    // --- Canvas ---

    pub fn set_background(&mut self, background: Background) {
        self.bridge.set_background(background);
    }

    pub fn set_aspect(&mut self, aspect: AspectRatio) {
        self.bridge.set_aspect(aspect);
    }

    // --- Reports ---

    /// Place a report image with its link overlays.
    pub fn send_report(
        &mut self,
        image: &ReportImage,
        width: i32,
        alignment: Alignment,
        top: i32,
    ) -> Result<PlacedReport, GeometryError> {
        let placement = Placement::new(width, self.config.canvas_width)
            .alignment(alignment)
            .top(top)
            .overlay_min_size(self.config.overlay_min_box_size);
        let placed = report::send_to_canvas(&mut self.boxes, image, placement)?;
        for id in placed.all_ids() {
            if let Some(b) = self.boxes.get(&id) {
                self.bridge.record_box(b);
            }
        }
        let now = self.now();
        self.bridge.layers_changed(now);
        Ok(placed)
    }

    pub fn realign(
        &mut self,
        parent: &str,
        alignment: Alignment,
    ) -> Result<Vec<BoxId>, GeometryError> {
        let width = self.config.canvas_width;
        let changed = report::realign(&mut self.boxes, parent, alignment, width)?;
        self.bridge.record_geometry(&self.boxes, &changed);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualClock;
    use crate::storage::MemoryStore;

    fn session() -> (CanvasSession<MemoryStore>, MemoryStore, ManualClock) {
        let remote = MemoryStore::new();
        let clock = ManualClock::new();
        let mut session = CanvasSession::open_with_clock(
            Arc::new(remote.clone()),
            CanvasScope::root("p").unwrap(),
            EditorConfig::default(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        session.tick();
        (session, remote, clock)
    }

    #[test]
    fn test_pointer_draw_creates_clamped_box() {
        let (mut session, _, _) = session();
        session.set_tool(Tool::AddBox);
        assert!(session.pointer_down(Point::new(100.0, 100.0)));
        session.pointer_move(Point::new(110.0, 105.0));
        assert_eq!(session.gesture_preview(), Some(BoxRect::new(100, 100, 10, 5)));

        let id = session.pointer_up(Point::new(110.0, 105.0)).unwrap();
        assert_eq!(session.boxes().get(&id).unwrap().rect, BoxRect::new(100, 100, 40, 40));
        assert_eq!(session.boxes().tool(), Tool::None);
        assert!(session.bridge().layer_write_pending());
    }

    #[test]
    fn test_pointer_down_selects_without_tool() {
        let (mut session, _, _) = session();
        let id = session.add_box(BoxRect::new(0, 0, 100, 100), BoxContent::None);
        session.select(None);
        assert!(!session.pointer_down(Point::new(50.0, 50.0)));
        assert_eq!(session.boxes().selected(), Some(id.as_str()));
        assert!(session.pointer_up(Point::new(60.0, 60.0)).is_none());
    }

    #[test]
    fn test_layer_write_released_by_tick() {
        let (mut session, remote, clock) = session();
        pollster::block_on(session.flush());
        let a = session.add_box(BoxRect::new(0, 0, 20, 20), BoxContent::None);
        let _b = session.add_box(BoxRect::new(0, 0, 20, 20), BoxContent::None);
        assert!(session.layer_up(&a));

        session.tick();
        pollster::block_on(session.flush());
        let doc = pollster::block_on(remote.get("interoperable-canvas/p")).unwrap();
        assert_eq!(doc.fields.get("layers").and_then(|l| l.as_array()).map(|l| l.len()), Some(1));

        clock.advance(Duration::from_millis(200));
        session.tick();
        pollster::block_on(session.flush());
        let doc = pollster::block_on(remote.get("interoperable-canvas/p")).unwrap();
        let layers = doc.fields.get("layers").and_then(|l| l.as_array()).cloned().unwrap();
        assert_eq!(layers.last().and_then(|v| v.as_str()), Some(a.as_str()));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let (mut session, _, _) = session();
        assert!(session.drag_stop("missing", 1, 1).unwrap().is_empty());
        assert!(!session.save_content("missing", BoxContent::text("x")));
        assert!(session.delete("missing").is_empty());
        assert!(!session.layer_up("missing"));
    }

    #[test]
    fn test_invalid_resize_is_rejected() {
        let (mut session, _, _) = session();
        let id = session.add_box(BoxRect::new(0, 0, 50, 50), BoxContent::None);
        assert!(session.resize_stop(&id, BoxRect::new(0, 0, -5, 50)).is_err());
        assert_eq!(session.boxes().get(&id).unwrap().rect, BoxRect::new(0, 0, 50, 50));
    }

    #[test]
    fn test_canvas_height_follows_aspect() {
        let (mut session, _, _) = session();
        assert_eq!(session.canvas_height(), 619);
        session.set_aspect(AspectRatio::new(4, 3).unwrap());
        assert_eq!(session.canvas_height(), 825);
    }
}
