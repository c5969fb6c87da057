//! In-memory authoritative state for the boxes of one canvas scope.

use crate::boxes::{BoxContent, BoxId, BoxPatch, CanvasBox, OVERLAY_INFIX, generate_box_id};
use crate::geometry::{BoxRect, GeometryError, clamp_min_size, rescale_proportional, validate_rect};
use crate::layers::{BACKGROUND_LAYER_ID, LayerStack};
use kurbo::Point;
use std::collections::{HashSet, VecDeque};

/// Minimum box size for programmatic creation.
pub const DEFAULT_MIN_BOX_SIZE: i32 = 16;
/// Minimum box size for boxes drawn by pointer drag.
pub const FREEHAND_MIN_BOX_SIZE: i32 = 40;

/// Active interaction tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    None,
    AddBox,
}

/// Editor dialogs that can be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalKind {
    Text,
    Image,
    Chart,
    Animation,
    Dune,
    Link,
    Background,
    GardensReport,
}

/// Ephemeral interaction state. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiMode {
    pub tool: Tool,
    pub selected: Option<BoxId>,
    pub modals: HashSet<ModalKind>,
}

/// Parameters for [`BoxStore::create_box`].
#[derive(Debug, Clone)]
pub struct NewBox {
    pub rect: BoxRect,
    pub content: BoxContent,
    pub id: Option<BoxId>,
    pub name: Option<String>,
    pub parent_id: Option<BoxId>,
    pub min_size: i32,
}

impl NewBox {
    pub fn new(rect: BoxRect) -> Self {
        Self {
            rect,
            content: BoxContent::None,
            id: None,
            name: None,
            parent_id: None,
            min_size: DEFAULT_MIN_BOX_SIZE,
        }
    }

    pub fn content(mut self, content: BoxContent) -> Self {
        self.content = content;
        self
    }

    pub fn id(mut self, id: impl Into<BoxId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn parent(mut self, parent: impl Into<BoxId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn min_size(mut self, min: i32) -> Self {
        self.min_size = min;
        self
    }
}

/// Boxes, their layer order, and the current UI mode.
#[derive(Debug, Clone, Default)]
pub struct BoxStore {
    boxes: Vec<CanvasBox>,
    layers: LayerStack,
    ui: UiMode,
}

impl BoxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a new box.
    ///
    /// The rectangle is grown to the requested minimum, a layer is appended
    /// on top, the box becomes the selection and the active tool is cleared.
    /// Supplying the id of an existing box replaces it and raises its layer to
    /// the top. The pinned background id is never used for a box; a fresh id
    /// is generated instead.
    pub fn create_box(&mut self, new: NewBox) -> BoxId {
        let min = new.min_size.max(1);
        let rect = clamp_min_size(new.rect, min, min);
        let id = match new.id {
            Some(id) if id == BACKGROUND_LAYER_ID => {
                let fresh = generate_box_id();
                log::warn!("Box id {} is reserved, using {}", id, fresh);
                fresh
            }
            Some(id) => id,
            None => generate_box_id(),
        };

        let b = CanvasBox {
            id: id.clone(),
            rect,
            content: new.content,
            name: new.name,
            name_key: None,
            parent_id: new.parent_id,
        };
        let layer_name = b.display_name();

        match self.get_mut(&id) {
            Some(existing) => *existing = b,
            None => self.boxes.push(b),
        }
        if !self.layers.append(id.clone(), layer_name.clone()) {
            self.layers.rename(&id, layer_name);
            self.layers.bring_to_front(&id);
        }

        self.ui.selected = Some(id.clone());
        self.ui.tool = Tool::None;
        log::debug!("Created box {} at {:?}", id, rect);
        id
    }

    /// Merge a partial update into an existing box.
    ///
    /// Returns false when the id is unknown or the merged geometry would have
    /// a non-positive size; the box is left untouched in both cases.
    pub fn update_box(&mut self, id: &str, patch: &BoxPatch) -> bool {
        let Some(b) = self.get_mut(id) else {
            return false;
        };

        let mut updated = b.clone();
        updated.apply(patch);
        if let Err(e) = validate_rect(updated.rect) {
            log::warn!("Rejected update to box {}: {}", id, e);
            return false;
        }
        *b = updated;

        if let Some(name) = &patch.name {
            self.layers.rename(id, name.clone());
        }
        true
    }

    /// Remove a single box. Layers and overlays are left to the caller;
    /// see [`BoxStore::delete_cascade`].
    pub fn delete_box(&mut self, id: &str) -> Option<CanvasBox> {
        let pos = self.boxes.iter().position(|b| b.id == id)?;
        if self.ui.selected.as_deref() == Some(id) {
            self.ui.selected = None;
        }
        Some(self.boxes.remove(pos))
    }

    /// Remove a box together with every overlay it owns and their layers.
    ///
    /// Companion layers named `<id>_overlay_*` are removed as well, even
    /// without a matching box. Returns every removed id.
    pub fn delete_cascade(&mut self, id: &str) -> Vec<BoxId> {
        let mut removed: Vec<BoxId> = Vec::new();
        if self.get(id).is_some() || self.layers.contains(id) {
            removed.push(id.to_string());
        }
        removed.extend(self.descendants(id));

        for doomed in &removed {
            self.delete_box(doomed);
        }
        self.layers.remove_many(removed.as_slice());

        let prefix = format!("{id}{OVERLAY_INFIX}");
        for companion in self.layers.remove_where(|layer| layer.starts_with(&prefix)) {
            if !removed.contains(&companion) {
                removed.push(companion);
            }
        }

        if !removed.is_empty() {
            log::debug!("Deleted {} ({} ids removed)", id, removed.len());
        }
        removed
    }

    /// Move or resize a box and rescale its overlays to match.
    ///
    /// Every overlay keeps its offset and size relative to its parent. The
    /// whole cascade is computed before anything is committed, so a failure
    /// leaves the store unchanged. Returns the ids whose geometry changed.
    pub fn set_rect(&mut self, id: &str, rect: BoxRect) -> Result<Vec<BoxId>, GeometryError> {
        validate_rect(rect)?;
        let Some(old) = self.get(id).map(|b| b.rect) else {
            return Ok(Vec::new());
        };

        let mut plan: Vec<(BoxId, BoxRect)> = vec![(id.to_string(), rect)];
        let mut queue: VecDeque<(BoxId, BoxRect, BoxRect)> = VecDeque::new();
        let mut visited: HashSet<BoxId> = HashSet::from([id.to_string()]);
        queue.push_back((id.to_string(), old, rect));

        while let Some((parent, old_parent, new_parent)) = queue.pop_front() {
            for child in self.children_of(&parent) {
                if !visited.insert(child.id.clone()) {
                    continue;
                }
                let scaled = rescale_proportional(old_parent, new_parent, child.rect)?;
                plan.push((child.id.clone(), scaled));
                queue.push_back((child.id.clone(), child.rect, scaled));
            }
        }

        let mut changed = Vec::with_capacity(plan.len());
        for (box_id, new_rect) in plan {
            if let Some(b) = self.get_mut(&box_id) {
                if b.rect != new_rect {
                    b.rect = new_rect;
                    changed.push(box_id);
                }
            }
        }
        Ok(changed)
    }

    /// Overlays directly owned by `id`.
    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a CanvasBox> + 'a {
        self.boxes
            .iter()
            .filter(move |b| b.parent_id.as_deref() == Some(id))
    }

    /// All overlays owned by `id`, directly or through other overlays.
    pub fn descendants(&self, id: &str) -> Vec<BoxId> {
        let mut found: Vec<BoxId> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut queue: VecDeque<&str> = VecDeque::from([id]);

        while let Some(parent) = queue.pop_front() {
            for child in self.children_of(parent) {
                if seen.insert(child.id.as_str()) {
                    found.push(child.id.clone());
                    queue.push_back(child.id.as_str());
                }
            }
        }
        found
    }

    /// Replace every box with a remote snapshot.
    ///
    /// Boxes missing from the layer stack get a layer on top; a selection
    /// pointing at a vanished box is dropped.
    pub fn replace_boxes(&mut self, boxes: Vec<CanvasBox>) {
        self.boxes = boxes;
        for b in &self.boxes {
            self.layers.append(b.id.clone(), b.display_name());
        }
        if let Some(selected) = self.ui.selected.clone() {
            if self.get(&selected).is_none() {
                self.ui.selected = None;
            }
        }
    }

    /// Adopt a persisted layer order. `background` is forced to the bottom and
    /// boxes the list does not mention are stacked on top.
    pub fn apply_layer_order<S: AsRef<str>>(&mut self, ids: &[S]) {
        let mut stack = LayerStack::from_ids(ids.iter().map(|id| id.as_ref()), |id| {
            self.get(id).map(CanvasBox::display_name)
        });
        for b in &self.boxes {
            stack.append(b.id.clone(), b.display_name());
        }
        self.layers = stack;
    }

    /// Topmost box under a point, by layer order.
    pub fn box_at(&self, point: Point) -> Option<&CanvasBox> {
        self.layers
            .iter()
            .rev()
            .filter_map(|layer| self.get(&layer.id))
            .find(|b| b.rect.contains(point))
    }

    /// Boxes back to front. Boxes without a layer are skipped.
    pub fn boxes_in_paint_order(&self) -> impl Iterator<Item = &CanvasBox> {
        self.layers.iter().filter_map(|layer| self.get(&layer.id))
    }

    pub fn get(&self, id: &str) -> Option<&CanvasBox> {
        self.boxes.iter().find(|b| b.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut CanvasBox> {
        self.boxes.iter_mut().find(|b| b.id == id)
    }

    pub fn boxes(&self) -> &[CanvasBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerStack {
        &mut self.layers
    }

    // --- UI mode ---

    pub fn ui(&self) -> &UiMode {
        &self.ui
    }

    pub fn set_selected(&mut self, id: Option<BoxId>) {
        self.ui.selected = id;
    }

    pub fn selected(&self) -> Option<&str> {
        self.ui.selected.as_deref()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.ui.tool = tool;
    }

    pub fn tool(&self) -> Tool {
        self.ui.tool
    }

    pub fn open_modal(&mut self, modal: ModalKind) {
        self.ui.modals.insert(modal);
    }

    pub fn close_modal(&mut self, modal: ModalKind) {
        self.ui.modals.remove(&modal);
    }

    pub fn is_modal_open(&self, modal: ModalKind) -> bool {
        self.ui.modals.contains(&modal)
    }
}
