//! Persisted document schema.
//!
//! Box documents are flat: `{id, x, y, w, h, contentType, ...content fields,
//! name?, nameKey?, parentId?}`. The canvas document carries
//! `{background: {mode, from, to}, aspect, layers, zIndexMap}`.

use crate::boxes::{BoxContent, BoxPatch, CONTENT_KEYS, CanvasBox, legacy_parent_of};
use crate::geometry::{BoxRect, round_px, validate_rect};
use crate::layers::LayerStack;
use crate::storage::{Document, Fields};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Malformed document {path}: {message}")]
    Malformed { path: String, message: String },
    #[error("Invalid aspect ratio: {0}")]
    InvalidAspect(String),
}

/// Largest coordinate or size accepted from a stored box, in pixels.
pub const MAX_COORD: f64 = 1_000_000.0;

/// Geometry fields may be stored as floats; they are rounded on load.
fn de_px<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value.abs() > MAX_COORD {
        return Err(D::Error::custom(format!(
            "pixel value {value} outside ±{MAX_COORD}"
        )));
    }
    Ok(round_px(value))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoxHeader {
    #[serde(default)]
    id: Option<String>,
    #[serde(deserialize_with = "de_px")]
    x: i32,
    #[serde(deserialize_with = "de_px")]
    y: i32,
    #[serde(deserialize_with = "de_px")]
    w: i32,
    #[serde(deserialize_with = "de_px")]
    h: i32,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    name_key: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
}

/// Serialize a box to its persisted field set.
pub fn box_to_fields(b: &CanvasBox) -> Fields {
    let mut fields = content_fields(&b.content);
    fields.insert("id".into(), Value::from(b.id.clone()));
    fields.extend(rect_fields(b.rect));
    if let Some(name) = &b.name {
        fields.insert("name".into(), Value::from(name.clone()));
    }
    if let Some(key) = &b.name_key {
        fields.insert("nameKey".into(), Value::from(key.clone()));
    }
    if let Some(parent) = &b.parent_id {
        fields.insert("parentId".into(), Value::from(parent.clone()));
    }
    fields
}

/// Load a box from a stored document.
///
/// The id falls back to the document id, a missing `contentType` means an
/// empty box, unreadable content degrades to an empty box with a warning, and
/// legacy `<parent>_overlay_<n>` ids get their parent inferred. Geometry
/// outside ±[`MAX_COORD`] or with a non-positive size is malformed.
pub fn box_from_document(doc: &Document) -> Result<CanvasBox, DocumentError> {
    let malformed = |message: String| DocumentError::Malformed {
        path: doc.path.clone(),
        message,
    };
    let value = Value::Object(doc.fields.clone());
    let header: BoxHeader = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
    let rect = validate_rect(BoxRect::new(header.x, header.y, header.w, header.h))
        .map_err(|e| malformed(e.to_string()))?;

    let mut content_source = doc.fields.clone();
    content_source.retain(|_, value| !value.is_null());
    content_source
        .entry("contentType")
        .or_insert_with(|| Value::from("none"));
    let content = match serde_json::from_value::<BoxContent>(Value::Object(content_source)) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("Unreadable content in {}: {}", doc.path, e);
            BoxContent::None
        }
    };

    let id = header.id.unwrap_or_else(|| doc.id().to_string());
    let parent_id = header
        .parent_id
        .or_else(|| legacy_parent_of(&id).map(str::to_string));

    Ok(CanvasBox {
        rect,
        content,
        name: header.name,
        name_key: header.name_key,
        parent_id,
        id,
    })
}

/// Load every readable box in a collection snapshot, skipping malformed ones.
pub fn boxes_from_documents(docs: &[Document]) -> Vec<CanvasBox> {
    docs.iter()
        .filter_map(|doc| match box_from_document(doc) {
            Ok(b) => Some(b),
            Err(e) => {
                log::warn!("Skipping box: {}", e);
                None
            }
        })
        .collect()
}

/// Only the fields a patch touches, for merge writes.
///
/// A content change replaces the whole content: every content key the new
/// content does not set is sent as `null`, which a merge write deletes.
pub fn patch_to_fields(patch: &BoxPatch) -> Fields {
    let mut fields = Fields::new();
    if let Some(content) = &patch.content {
        fields.extend(content_fields(content));
        for key in CONTENT_KEYS {
            fields.entry(*key).or_insert(Value::Null);
        }
    }
    for (key, value) in [("x", patch.x), ("y", patch.y), ("w", patch.w), ("h", patch.h)] {
        if let Some(v) = value {
            fields.insert(key.into(), Value::from(v));
        }
    }
    if let Some(name) = &patch.name {
        fields.insert("name".into(), Value::from(name.clone()));
    }
    if let Some(key) = &patch.name_key {
        fields.insert("nameKey".into(), Value::from(key.clone()));
    }
    fields
}

pub fn rect_fields(rect: BoxRect) -> Fields {
    let mut fields = Fields::new();
    fields.insert("x".into(), Value::from(rect.x));
    fields.insert("y".into(), Value::from(rect.y));
    fields.insert("w".into(), Value::from(rect.w));
    fields.insert("h".into(), Value::from(rect.h));
    fields
}

fn content_fields(content: &BoxContent) -> Fields {
    match serde_json::to_value(content) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            let mut fields = Fields::new();
            fields.insert("contentType".into(), Value::from(content.content_type().as_str()));
            fields
        }
    }
}

// --- Canvas document ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    #[default]
    Solid,
    Linear,
    Radial,
}

/// Canvas fill: a solid color or a two-stop gradient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background {
    #[serde(default)]
    pub mode: BackgroundMode,
    pub from: String,
    pub to: String,
}

impl Default for Background {
    fn default() -> Self {
        Self::solid("#ffffff")
    }
}

impl Background {
    pub fn solid(color: impl Into<String>) -> Self {
        let color = color.into();
        Self {
            mode: BackgroundMode::Solid,
            from: color.clone(),
            to: color,
        }
    }
}

/// Canvas aspect ratio, persisted as `"W:H"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self {
            width: 16,
            height: 9,
        }
    }
}

impl AspectRatio {
    pub fn new(width: u32, height: u32) -> Result<Self, DocumentError> {
        if width == 0 || height == 0 {
            return Err(DocumentError::InvalidAspect(format!("{width}:{height}")));
        }
        Ok(Self { width, height })
    }

    pub fn parse(s: &str) -> Result<Self, DocumentError> {
        let invalid = || DocumentError::InvalidAspect(s.to_string());
        let (w, h) = s.split_once(':').ok_or_else(invalid)?;
        let width = w.trim().parse().map_err(|_| invalid())?;
        let height = h.trim().parse().map_err(|_| invalid())?;
        Self::new(width, height)
    }

    /// Canvas height for a given width, rounded to whole pixels.
    pub fn canvas_height(&self, width: i32) -> i32 {
        round_px(width as f64 * self.height as f64 / self.width as f64)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = DocumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.to_string()
    }
}

/// Canvas-level document contents. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanvasRecord {
    pub background: Option<Background>,
    pub aspect: Option<AspectRatio>,
    pub layers: Option<Vec<String>>,
    pub z_index_map: Option<BTreeMap<String, usize>>,
}

impl CanvasRecord {
    /// Read a canvas document field by field. A malformed field is treated
    /// as absent so one bad value does not hide the rest.
    pub fn from_fields(path: &str, fields: &Fields) -> Self {
        Self {
            background: field(path, fields, "background"),
            aspect: field(path, fields, "aspect"),
            layers: field(path, fields, "layers"),
            z_index_map: field(path, fields, "zIndexMap"),
        }
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(background) = &self.background {
            insert_json(&mut fields, "background", background);
        }
        if let Some(aspect) = &self.aspect {
            fields.insert("aspect".into(), Value::from(aspect.to_string()));
        }
        if let Some(layers) = &self.layers {
            insert_json(&mut fields, "layers", layers);
        }
        if let Some(map) = &self.z_index_map {
            insert_json(&mut fields, "zIndexMap", map);
        }
        fields
    }
}

fn field<T: DeserializeOwned>(path: &str, fields: &Fields, key: &str) -> Option<T> {
    let value = fields.get(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!("Ignoring malformed {} in {}: {}", key, path, e);
            None
        }
    }
}

fn insert_json<T: Serialize>(fields: &mut Fields, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(v) => {
            fields.insert(key.into(), v);
        }
        Err(e) => log::warn!("Failed to serialize {}: {}", key, e),
    }
}

/// The layer part of the canvas document: full id list plus id -> z map.
pub fn layer_fields(stack: &LayerStack) -> Fields {
    CanvasRecord {
        layers: Some(stack.ids()),
        z_index_map: Some(stack.z_index_map()),
        ..Default::default()
    }
    .to_fields()
}
