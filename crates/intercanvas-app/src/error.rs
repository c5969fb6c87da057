use intercanvas_core::document::DocumentError;
use intercanvas_core::{ConfigError, GeometryError, ScopeError, StorageError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Failed to read report {path}: {source}")]
    ReportRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid report {path}: {source}")]
    ReportParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("No box with id {0}")]
    UnknownBox(String),

    #[error("Timed out loading canvas {0}")]
    NotReady(String),

    #[error("{0} write(s) failed")]
    WritesFailed(usize),
}

pub type Result<T> = std::result::Result<T, AppError>;
