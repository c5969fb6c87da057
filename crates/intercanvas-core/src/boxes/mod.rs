//! Box definitions for the canvas.

mod content;

pub use content::{
    AnimationContent, BoxContent, CONTENT_KEYS, ChartContent, ChartKind, ContentType, DuneContent,
    ImageContent, ImageFit, LinkContent, TextContent,
};

use crate::geometry::BoxRect;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Identifier of a box. Opaque; either caller-supplied or generated.
pub type BoxId = String;

/// Separator between a parent id and the overlay index in overlay ids.
pub const OVERLAY_INFIX: &str = "_overlay_";

/// Generate a fresh id of the form `box_<unix-millis>_<9 alphanumerics>`.
pub fn generate_box_id() -> BoxId {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("box_{millis}_{suffix}")
}

/// Id for the `index`-th overlay owned by `parent`.
pub fn overlay_id(parent: &str, index: usize) -> BoxId {
    format!("{parent}{OVERLAY_INFIX}{index}")
}

/// Parent id encoded in a legacy `<parent>_overlay_<n>` id, if any.
pub fn legacy_parent_of(id: &str) -> Option<&str> {
    let pos = id.rfind(OVERLAY_INFIX)?;
    let (parent, rest) = id.split_at(pos);
    let index = &rest[OVERLAY_INFIX.len()..];
    (!parent.is_empty() && !index.is_empty()).then_some(parent)
}

/// A positioned, sized, typed rectangle on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasBox {
    pub id: BoxId,
    pub rect: BoxRect,
    pub content: BoxContent,
    /// Display name (also used as the layer name).
    pub name: Option<String>,
    /// Stable key used by report generators to find a box again.
    pub name_key: Option<String>,
    /// Owning box for overlays; deleting or rescaling the parent cascades here.
    pub parent_id: Option<BoxId>,
}

impl CanvasBox {
    pub fn new(id: impl Into<BoxId>, rect: BoxRect) -> Self {
        Self {
            id: id.into(),
            rect,
            content: BoxContent::None,
            name: None,
            name_key: None,
            parent_id: None,
        }
    }

    pub fn with_content(mut self, content: BoxContent) -> Self {
        self.content = content;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<BoxId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn content_type(&self) -> ContentType {
        self.content.content_type()
    }

    /// Whether this box is an overlay owned by another box.
    pub fn is_overlay(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Name shown in the layer panel.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{} box", self.content_type()))
    }

    /// Merge a partial update into this box.
    pub fn apply(&mut self, patch: &BoxPatch) {
        if let Some(x) = patch.x {
            self.rect.x = x;
        }
        if let Some(y) = patch.y {
            self.rect.y = y;
        }
        if let Some(w) = patch.w {
            self.rect.w = w;
        }
        if let Some(h) = patch.h {
            self.rect.h = h;
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(name) = &patch.name {
            self.name = Some(name.clone());
        }
        if let Some(name_key) = &patch.name_key {
            self.name_key = Some(name_key.clone());
        }
    }
}

/// A partial update to a box. Unset fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoxPatch {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub w: Option<i32>,
    pub h: Option<i32>,
    pub content: Option<BoxContent>,
    pub name: Option<String>,
    pub name_key: Option<String>,
}

impl BoxPatch {
    pub fn position(x: i32, y: i32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn size(w: i32, h: i32) -> Self {
        Self {
            w: Some(w),
            h: Some(h),
            ..Self::default()
        }
    }

    pub fn rect(rect: BoxRect) -> Self {
        Self {
            x: Some(rect.x),
            y: Some(rect.y),
            w: Some(rect.w),
            h: Some(rect.h),
            ..Self::default()
        }
    }

    pub fn content(content: BoxContent) -> Self {
        Self {
            content: Some(content),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the patch touches position or size.
    pub fn touches_geometry(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.w.is_some() || self.h.is_some()
    }
}
