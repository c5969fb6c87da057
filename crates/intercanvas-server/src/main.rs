//! Interoperable Canvas Store Server
//!
//! Serves one document store over WebSocket so several editors can share the
//! same canvases. Each connection may issue requests and hold any number of
//! subscriptions; change notifications are pushed as they happen.
//!
//! ## Protocol
//!
//! Messages are JSON tagged by `type`:
//! ```json
//! { "type": "set", "request_id": 1, "path": "interoperable-canvas/p", "fields": { "aspect": "16:9" }, "merge": true }
//! { "type": "subscribe", "request_id": 2, "subscription_id": 1, "target": { "kind": "collection", "path": "interoperable-canvas/p/overlay" } }
//! { "type": "unsubscribe", "subscription_id": 1 }
//! ```
//! Replies echo `request_id`; notifications carry `subscription_id`.

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use intercanvas_core::protocol::{ClientMessage, ServerMessage, decode_blob};
use intercanvas_core::storage::{
    BlobStore, DocumentStore, FileStore, MemoryStore, StorageError, Subscription,
};
use std::{collections::HashMap, net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_ADDR: &str = "0.0.0.0:3030";

/// Document and blob storage behind the server.
trait Backend: DocumentStore + BlobStore {}

impl<T: DocumentStore + BlobStore> Backend for T {}

/// Shared application state
struct AppState {
    store: Arc<dyn Backend>,
    /// Live subscription count per connected peer
    connections: DashMap<String, usize>,
}

impl AppState {
    fn new(store: Arc<dyn Backend>) -> Self {
        Self {
            store,
            connections: DashMap::new(),
        }
    }

    fn connect(&self, peer_id: &str) {
        self.connections.insert(peer_id.to_string(), 0);
    }

    fn disconnect(&self, peer_id: &str) {
        self.connections.remove(peer_id);
    }

    fn track_subscriptions(&self, peer_id: &str, count: usize) {
        if let Some(mut entry) = self.connections.get_mut(peer_id) {
            *entry = count;
        }
    }

    fn subscription_count(&self) -> usize {
        self.connections.iter().map(|entry| *entry.value()).sum()
    }
}

/// Per-connection state. Everything sent to the peer goes through
/// `outgoing`, so replies and notifications keep their order.
struct Connection {
    peer_id: String,
    outgoing: mpsc::UnboundedSender<ServerMessage>,
    subscriptions: HashMap<u64, Subscription>,
}

impl Connection {
    fn new(peer_id: String, outgoing: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            peer_id,
            outgoing,
            subscriptions: HashMap::new(),
        }
    }

    fn send(&self, msg: ServerMessage) {
        let _ = self.outgoing.send(msg);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intercanvas_server=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::new(open_store()?));
    let app = router(state);

    let addr: SocketAddr = std::env::var("INTERCANVAS_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    info!("Interoperable Canvas store server listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:{}/ws", addr.port());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// File-backed when `INTERCANVAS_DATA_DIR` is set, in-memory otherwise.
fn open_store() -> Result<Arc<dyn Backend>, StorageError> {
    match std::env::var_os("INTERCANVAS_DATA_DIR") {
        Some(dir) => {
            let store = FileStore::new(PathBuf::from(dir))?;
            info!("Persisting documents under {}", store.base_path().display());
            Ok(Arc::new(store))
        }
        None => {
            info!("INTERCANVAS_DATA_DIR not set, documents are kept in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "Interoperable Canvas Store Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "connections": state.connections.len(),
        "subscriptions": state.subscription_count(),
    }))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);
    state.connect(&peer_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut conn = Connection::new(peer_id.clone(), tx);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let reply = handle_message(&state, &mut conn, client_msg).await;
                                if let Some(reply) = reply {
                                    conn.send(reply);
                                }
                                state.track_subscriptions(&peer_id, conn.subscriptions.len());
                            }
                            Err(e) => {
                                warn!("Invalid message from {}: {}", peer_id, e);
                                let error =
                                    StorageError::Serialization(format!("Invalid message: {}", e));
                                conn.send(ServerMessage::error(None, &error));
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Ignoring binary frame from {}", peer_id);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            Some(out) = rx.recv() => {
                match serde_json::to_string(&out) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to encode message for {}: {}", peer_id, e),
                }
            }
        }
    }

    // Dropping the connection cancels its subscriptions
    drop(conn);
    state.disconnect(&peer_id);
    info!("Connection closed: {}", peer_id);
}

/// Execute one client request. Returns the reply, if the request has one.
///
/// Subscription notifications are pushed straight onto the connection's
/// outgoing channel, including the initial snapshot, which therefore
/// precedes the subscribe acknowledgement.
async fn handle_message(
    state: &AppState,
    conn: &mut Connection,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    let request_id = msg.request_id();
    let store = &state.store;

    let result = match msg {
        ClientMessage::Get { request_id, path } => store
            .get(&path)
            .await
            .map(|document| ServerMessage::Document {
                request_id,
                document,
            }),
        ClientMessage::Set {
            request_id,
            path,
            fields,
            merge,
        } => store
            .set(&path, fields, merge)
            .await
            .map(|()| ServerMessage::Ok { request_id }),
        ClientMessage::Delete { request_id, path } => store
            .delete(&path)
            .await
            .map(|()| ServerMessage::Ok { request_id }),
        ClientMessage::List {
            request_id,
            collection,
        } => store
            .list(&collection)
            .await
            .map(|documents| ServerMessage::Documents {
                request_id,
                documents,
            }),
        ClientMessage::Subscribe {
            request_id,
            subscription_id,
            target,
        } => {
            debug!("Peer {} subscribing {} to {:?}", conn.peer_id, subscription_id, target);
            let outgoing = conn.outgoing.clone();
            store
                .subscribe(
                    target,
                    Box::new(move |snapshot| {
                        let _ = outgoing.send(ServerMessage::Changed {
                            subscription_id,
                            snapshot,
                        });
                    }),
                )
                .map(|subscription| {
                    // Reusing an id replaces the old subscription
                    conn.subscriptions.insert(subscription_id, subscription);
                    ServerMessage::Ok { request_id }
                })
        }
        ClientMessage::Unsubscribe { subscription_id } => {
            if let Some(subscription) = conn.subscriptions.remove(&subscription_id) {
                subscription.unsubscribe();
                debug!("Peer {} unsubscribed {}", conn.peer_id, subscription_id);
            }
            return None;
        }
        ClientMessage::Upload {
            request_id,
            path,
            content_type,
            data,
        } => match decode_blob(&data) {
            Ok(bytes) => store
                .upload(&path, bytes, &content_type)
                .await
                .map(|()| ServerMessage::Ok { request_id }),
            Err(e) => Err(e),
        },
        ClientMessage::BlobUrl { request_id, path } => store
            .get_url(&path)
            .await
            .map(|url| ServerMessage::Url { request_id, url }),
    };

    Some(result.unwrap_or_else(|e| {
        debug!("Request {:?} from {} failed: {}", request_id, conn.peer_id, e);
        ServerMessage::error(request_id, &e)
    }))
}
