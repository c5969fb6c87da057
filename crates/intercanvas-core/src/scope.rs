//! Canvas scopes and the document-store paths they map to.
//!
//! A scope is either the root canvas of a project or one of its named child
//! canvases. Everything a scope owns lives under its canvas document:
//!
//! ```text
//! interoperable-canvas/<project>                         root canvas document
//! interoperable-canvas/<project>/overlay/<box>           root boxes
//! interoperable-canvas/<project>/child-canvases/<child>  child canvas document
//! interoperable-canvas/<project>/child-canvases/<child>/overlay/<box>
//! ```

use thiserror::Error;

/// Top-level collection holding every project.
pub const CANVAS_ROOT: &str = "interoperable-canvas";
/// Collection under a canvas document holding its boxes.
pub const BOXES_COLLECTION: &str = "overlay";
/// Collection under a project holding its child canvases.
pub const CHILD_CANVASES_COLLECTION: &str = "child-canvases";
/// Top-level prefix for uploaded assets.
pub const ASSETS_ROOT: &str = "interoperable-canvas/assets";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("Scope segment must not be empty")]
    Empty,
    #[error("Invalid scope segment: {0}")]
    InvalidSegment(String),
}

/// Which subtree a set of boxes and layers belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanvasScope {
    project: String,
    child: Option<String>,
}

impl CanvasScope {
    /// The root canvas of a project.
    pub fn root(project: impl Into<String>) -> Result<Self, ScopeError> {
        let project = checked_segment(project.into())?;
        Ok(Self {
            project,
            child: None,
        })
    }

    /// A named child canvas of a project.
    pub fn child(project: impl Into<String>, child: impl Into<String>) -> Result<Self, ScopeError> {
        let project = checked_segment(project.into())?;
        let child = checked_segment(child.into())?;
        Ok(Self {
            project,
            child: Some(child),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn child_name(&self) -> Option<&str> {
        self.child.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.child.is_none()
    }

    /// Path of the canvas-level document (background, aspect, layer order).
    pub fn canvas_doc_path(&self) -> String {
        match &self.child {
            None => format!("{CANVAS_ROOT}/{}", self.project),
            Some(child) => format!(
                "{CANVAS_ROOT}/{}/{CHILD_CANVASES_COLLECTION}/{child}",
                self.project
            ),
        }
    }

    /// Path of the collection holding this scope's boxes.
    pub fn boxes_collection_path(&self) -> String {
        format!("{}/{BOXES_COLLECTION}", self.canvas_doc_path())
    }

    /// Path of one box document.
    pub fn box_doc_path(&self, id: &str) -> String {
        format!("{}/{id}", self.boxes_collection_path())
    }

    /// Blob path for an uploaded asset.
    pub fn asset_path(&self, file_name: &str) -> String {
        match &self.child {
            None => format!("{ASSETS_ROOT}/{}/{file_name}", self.project),
            Some(child) => format!("{ASSETS_ROOT}/{}/{child}/{file_name}", self.project),
        }
    }
}

impl std::fmt::Display for CanvasScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.child {
            None => write!(f, "{}", self.project),
            Some(child) => write!(f, "{}/{}", self.project, child),
        }
    }
}

fn checked_segment(segment: String) -> Result<String, ScopeError> {
    if segment.is_empty() {
        return Err(ScopeError::Empty);
    }
    if segment.contains('/') || segment == "." || segment == ".." {
        return Err(ScopeError::InvalidSegment(segment));
    }
    Ok(segment)
}
