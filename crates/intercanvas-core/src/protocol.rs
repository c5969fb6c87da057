//! WebSocket protocol between a [`RemoteStore`](crate::storage::RemoteStore)
//! and the store server.
//!
//! Every message is a JSON object tagged by `type`. Requests carry a
//! client-chosen `request_id` echoed by the reply. Subscriptions use
//! client-chosen ids too, so change notifications can be routed before the
//! subscribe request has been acknowledged.

use crate::storage::{Document, Fields, Snapshot, StorageError, WatchTarget};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Client -> Server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Get {
        request_id: u64,
        path: String,
    },
    Set {
        request_id: u64,
        path: String,
        fields: Fields,
        #[serde(default)]
        merge: bool,
    },
    Delete {
        request_id: u64,
        path: String,
    },
    List {
        request_id: u64,
        collection: String,
    },
    Subscribe {
        request_id: u64,
        subscription_id: u64,
        target: WatchTarget,
    },
    Unsubscribe {
        subscription_id: u64,
    },
    /// Blob upload; `data` is base64.
    Upload {
        request_id: u64,
        path: String,
        content_type: String,
        data: String,
    },
    BlobUrl {
        request_id: u64,
        path: String,
    },
}

impl ClientMessage {
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ClientMessage::Get { request_id, .. }
            | ClientMessage::Set { request_id, .. }
            | ClientMessage::Delete { request_id, .. }
            | ClientMessage::List { request_id, .. }
            | ClientMessage::Subscribe { request_id, .. }
            | ClientMessage::Upload { request_id, .. }
            | ClientMessage::BlobUrl { request_id, .. } => Some(*request_id),
            ClientMessage::Unsubscribe { .. } => None,
        }
    }
}

/// Server -> Client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ok {
        request_id: u64,
    },
    Document {
        request_id: u64,
        document: Document,
    },
    Documents {
        request_id: u64,
        documents: Vec<Document>,
    },
    Url {
        request_id: u64,
        url: String,
    },
    Changed {
        subscription_id: u64,
        snapshot: Snapshot,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        kind: ErrorKind,
        message: String,
    },
}

impl ServerMessage {
    /// Error reply for a failed request.
    pub fn error(request_id: Option<u64>, error: &StorageError) -> Self {
        let (kind, message) = match error {
            StorageError::NotFound(m) => (ErrorKind::NotFound, m),
            StorageError::InvalidPath(m) => (ErrorKind::InvalidPath, m),
            StorageError::Serialization(m) => (ErrorKind::Serialization, m),
            StorageError::Io(m) => (ErrorKind::Io, m),
            StorageError::Other(m) => (ErrorKind::Other, m),
        };
        ServerMessage::Error {
            request_id,
            kind,
            message: message.clone(),
        }
    }

    /// The request this message answers, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ServerMessage::Ok { request_id }
            | ServerMessage::Document { request_id, .. }
            | ServerMessage::Documents { request_id, .. }
            | ServerMessage::Url { request_id, .. } => Some(*request_id),
            ServerMessage::Error { request_id, .. } => *request_id,
            ServerMessage::Changed { .. } => None,
        }
    }
}

/// Error categories carried over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidPath,
    Serialization,
    Io,
    Other,
}

impl ErrorKind {
    pub fn into_error(self, message: String) -> StorageError {
        match self {
            ErrorKind::NotFound => StorageError::NotFound(message),
            ErrorKind::InvalidPath => StorageError::InvalidPath(message),
            ErrorKind::Serialization => StorageError::Serialization(message),
            ErrorKind::Io => StorageError::Io(message),
            ErrorKind::Other => StorageError::Other(message),
        }
    }
}

pub fn encode_blob(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn decode_blob(data: &str) -> Result<Vec<u8>, StorageError> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| StorageError::Serialization(format!("Invalid blob data: {}", e)))
}
