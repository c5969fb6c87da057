//! Interoperable Canvas Core Library
//!
//! Box model, geometry, layer ordering and remote synchronization for the
//! Interoperable Canvas overlay editor.

pub mod boxes;
pub mod config;
pub mod document;
pub mod geometry;
pub mod layers;
pub mod protocol;
pub mod report;
pub mod schedule;
pub mod scope;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;
pub mod tools;

pub use boxes::{BoxContent, BoxId, BoxPatch, CanvasBox, ContentType};
pub use config::{ConfigError, EditorConfig};
pub use document::{AspectRatio, Background, BackgroundMode, CanvasRecord};
pub use geometry::{Alignment, BoxRect, GeometryError, ResizeHandle};
pub use layers::{BACKGROUND_LAYER_ID, Layer, LayerStack};
pub use report::{PlacedReport, Placement, ReportImage, ReportLink};
pub use schedule::{Clock, Debouncer, ManualClock, SystemClock};
pub use scope::{CanvasScope, ScopeError};
pub use session::CanvasSession;
pub use storage::{
    BlobStore, Document, DocumentStore, FileStore, MemoryStore, RemoteStore, StorageError,
    StorageResult,
};
pub use store::{BoxStore, ModalKind, NewBox, Tool};
pub use sync::{Notice, SyncBridge};
pub use tools::CreateGesture;
