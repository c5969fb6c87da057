//! Document store backed by a store server over WebSocket.
//!
//! A background thread owns the socket. Requests are matched to replies by
//! request id; change notifications are routed to subscription callbacks on
//! that thread. Futures returned here block the polling thread until the
//! reply arrives, so drive them with a simple executor rather than inside an
//! async runtime's worker.

use super::{
    BlobStore, BoxFuture, ChangeCallback, Document, DocumentStore, Fields, Snapshot, StorageError,
    StorageResult, Subscription, WatchTarget,
};
use crate::protocol::{ClientMessage, ServerMessage, encode_blob};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tungstenite::Message;
use url::Url;

/// How long a request waits for its reply by default.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

type Callback = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// State shared with the socket thread.
#[derive(Default)]
struct Routes {
    pending: Mutex<HashMap<u64, Sender<ServerMessage>>>,
    watchers: Mutex<HashMap<u64, Callback>>,
}

impl Routes {
    fn dispatch(&self, msg: ServerMessage) {
        if let ServerMessage::Changed {
            subscription_id,
            snapshot,
        } = msg
        {
            let callback = self
                .watchers
                .lock()
                .ok()
                .and_then(|w| w.get(&subscription_id).cloned());
            match callback {
                Some(callback) => callback(snapshot),
                None => log::debug!("Change for unknown subscription {}", subscription_id),
            }
            return;
        }

        let Some(request_id) = msg.request_id() else {
            if let ServerMessage::Error { message, .. } = &msg {
                log::warn!("Server error: {}", message);
            }
            return;
        };
        let reply_to = self
            .pending
            .lock()
            .ok()
            .and_then(|mut p| p.remove(&request_id));
        match reply_to {
            Some(tx) => {
                let _ = tx.send(msg);
            }
            None => log::debug!("Reply for unknown request {}", request_id),
        }
    }

    fn fail_all(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
    }
}

struct Connection {
    cmd_tx: Sender<WsCommand>,
    routes: Arc<Routes>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

/// Client for a remote store server.
#[derive(Clone)]
pub struct RemoteStore {
    conn: Arc<Connection>,
}

impl RemoteStore {
    /// Connect to a `ws://` or `wss://` store server.
    pub fn connect(url: &str) -> StorageResult<Self> {
        Self::connect_with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn connect_with_timeout(url: &str, timeout: Duration) -> StorageResult<Self> {
        let parsed =
            Url::parse(url).map_err(|e| StorageError::InvalidPath(format!("Invalid URL: {}", e)))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(StorageError::InvalidPath(format!(
                "Invalid WebSocket URL scheme: {}",
                parsed.scheme()
            )));
        }

        log::info!("Connecting to store server at {}", url);
        let (mut socket, response) = tungstenite::connect(url)
            .map_err(|e| StorageError::Io(format!("Connection failed: {}", e)))?;
        log::info!("WebSocket connected, status: {}", response.status());

        match socket.get_mut() {
            tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
            }
            #[allow(unreachable_patterns)]
            _ => log::debug!("TLS or other stream - using default timeout handling"),
        }

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let routes = Arc::new(Routes::default());
        let thread_routes = routes.clone();
        thread::spawn(move || run_socket(socket, cmd_rx, thread_routes));

        Ok(Self {
            conn: Arc::new(Connection {
                cmd_tx,
                routes,
                next_id: AtomicU64::new(1),
                timeout,
            }),
        })
    }

    fn next_id(&self) -> u64 {
        self.conn.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn send(&self, msg: &ClientMessage) -> StorageResult<()> {
        let text =
            serde_json::to_string(msg).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.conn
            .cmd_tx
            .send(WsCommand::Send(text))
            .map_err(|_| StorageError::Io("Connection closed".to_string()))
    }

    /// Send a request and wait for its reply. Error replies become `Err`.
    fn request(&self, build: impl FnOnce(u64) -> ClientMessage) -> StorageResult<ServerMessage> {
        let request_id = self.next_id();
        let (tx, rx) = channel();
        self.conn
            .routes
            .pending
            .lock()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?
            .insert(request_id, tx);

        if let Err(e) = self.send(&build(request_id)) {
            self.forget(request_id);
            return Err(e);
        }

        let reply = match rx.recv_timeout(self.conn.timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                self.forget(request_id);
                return Err(StorageError::Io(format!("Request {} timed out", request_id)));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(StorageError::Io("Connection closed".to_string()));
            }
        };

        match reply {
            ServerMessage::Error { kind, message, .. } => Err(kind.into_error(message)),
            other => Ok(other),
        }
    }

    fn forget(&self, request_id: u64) {
        if let Ok(mut pending) = self.conn.routes.pending.lock() {
            pending.remove(&request_id);
        }
    }
}

fn unexpected(msg: ServerMessage) -> StorageError {
    StorageError::Other(format!("Unexpected reply: {:?}", msg))
}

fn run_socket(
    mut socket: tungstenite::WebSocket<tungstenite::stream::MaybeTlsStream<std::net::TcpStream>>,
    cmd_rx: Receiver<WsCommand>,
    routes: Arc<Routes>,
) {
    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(msg)) => {
                log::debug!("WebSocket sending: {}", msg.chars().take(100).collect::<String>());
                if let Err(e) = socket.send(Message::Text(msg)) {
                    log::error!("WebSocket send error: {}", e);
                    break;
                }
            }
            Ok(WsCommand::Close) => {
                log::info!("WebSocket close requested");
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => match serde_json::from_str::<ServerMessage>(&txt) {
                Ok(msg) => routes.dispatch(msg),
                Err(e) => log::warn!("Failed to parse server message: {}", e),
            },
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                log::error!("WebSocket read error: {}", e);
                break;
            }
        }
    }
    routes.fail_all();
    log::info!("WebSocket thread exiting");
}

impl DocumentStore for RemoteStore {
    fn get(&self, path: &str) -> BoxFuture<'_, StorageResult<Document>> {
        let path = path.to_string();
        Box::pin(async move {
            match self.request(|request_id| ClientMessage::Get { request_id, path })? {
                ServerMessage::Document { document, .. } => Ok(document),
                other => Err(unexpected(other)),
            }
        })
    }

    fn set(&self, path: &str, fields: Fields, merge: bool) -> BoxFuture<'_, StorageResult<()>> {
        let path = path.to_string();
        Box::pin(async move {
            match self.request(|request_id| ClientMessage::Set {
                request_id,
                path,
                fields,
                merge,
            })? {
                ServerMessage::Ok { .. } => Ok(()),
                other => Err(unexpected(other)),
            }
        })
    }

    fn delete(&self, path: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = path.to_string();
        Box::pin(async move {
            match self.request(|request_id| ClientMessage::Delete { request_id, path })? {
                ServerMessage::Ok { .. } => Ok(()),
                other => Err(unexpected(other)),
            }
        })
    }

    fn list(&self, collection: &str) -> BoxFuture<'_, StorageResult<Vec<Document>>> {
        let collection = collection.to_string();
        Box::pin(async move {
            match self.request(|request_id| ClientMessage::List {
                request_id,
                collection,
            })? {
                ServerMessage::Documents { documents, .. } => Ok(documents),
                other => Err(unexpected(other)),
            }
        })
    }

    fn subscribe(
        &self,
        target: WatchTarget,
        on_change: ChangeCallback,
    ) -> StorageResult<Subscription> {
        let subscription_id = self.next_id();
        self.conn
            .routes
            .watchers
            .lock()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?
            .insert(subscription_id, Arc::from(on_change));

        let acked = self.request(|request_id| ClientMessage::Subscribe {
            request_id,
            subscription_id,
            target,
        });
        if let Err(e) = acked {
            if let Ok(mut watchers) = self.conn.routes.watchers.lock() {
                watchers.remove(&subscription_id);
            }
            return Err(e);
        }

        let conn = Arc::downgrade(&self.conn);
        Ok(Subscription::new(move || {
            let Some(conn) = conn.upgrade() else {
                return;
            };
            if let Ok(mut watchers) = conn.routes.watchers.lock() {
                watchers.remove(&subscription_id);
            }
            let msg = ClientMessage::Unsubscribe { subscription_id };
            if let Ok(text) = serde_json::to_string(&msg) {
                let _ = conn.cmd_tx.send(WsCommand::Send(text));
            }
        }))
    }
}

impl BlobStore for RemoteStore {
    fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let path = path.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            let data = encode_blob(&bytes);
            match self.request(|request_id| ClientMessage::Upload {
                request_id,
                path,
                content_type,
                data,
            })? {
                ServerMessage::Ok { .. } => Ok(()),
                other => Err(unexpected(other)),
            }
        })
    }

    fn get_url(&self, path: &str) -> BoxFuture<'_, StorageResult<String>> {
        let path = path.to_string();
        Box::pin(async move {
            match self.request(|request_id| ClientMessage::BlobUrl { request_id, path })? {
                ServerMessage::Url { url, .. } => Ok(url),
                other => Err(unexpected(other)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_rejects_non_websocket_url() {
        assert!(matches!(
            RemoteStore::connect("http://localhost:3030"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(RemoteStore::connect("not a url").is_err());
    }

    #[test]
    fn test_routes_reply_to_pending_request() {
        let routes = Routes::default();
        let (tx, rx) = channel();
        routes.pending.lock().unwrap().insert(5, tx);

        routes.dispatch(ServerMessage::Ok { request_id: 5 });
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Ok { request_id: 5 });
        assert!(routes.pending.lock().unwrap().is_empty());
    }

    #[test]
    fn test_routes_change_to_watcher() {
        let routes = Routes::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        routes.watchers.lock().unwrap().insert(
            9,
            Arc::new(move |_: Snapshot| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let snapshot = Snapshot::Document {
            path: "c/p".into(),
            document: None,
        };
        routes.dispatch(ServerMessage::Changed {
            subscription_id: 9,
            snapshot: snapshot.clone(),
        });
        routes.dispatch(ServerMessage::Changed {
            subscription_id: 10,
            snapshot,
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
