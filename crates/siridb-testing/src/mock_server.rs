//! Mock SiriDB server for testing.
//!
//! This module provides a mock SiriDB server that speaks the package
//! protocol over real TCP, so connector behavior can be tested without a
//! database instance.
//!
//! ## Features
//!
//! - Authenticates against configured credentials (success, invalid
//!   credentials or unknown database)
//! - Configurable responses per query string
//! - Fragmented writes to exercise client reassembly
//! - Stray packages, garbage bytes and abrupt closes for failure paths
//! - Records every package it receives
//!
//! ## Example
//!
//! ```rust,ignore
//! use siridb_testing::mock_server::{MockSiriServer, MockResponse};
//!
//! #[tokio::test]
//! async fn test_query() {
//!     let server = MockSiriServer::builder()
//!         .with_response("list series", MockResponse::query(json!({"series": []})))
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let connection = Connection::new(server.client_config());
//!     // ...
//! }
//! ```

use bytes::Bytes;
use serde_json::{Value, json};
use siridb_client::Config;
use siridb_codec::{CodecError, Package, StreamBuffer};
use siridb_protocol::{RequestType, ResponseType};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast};

/// Error type for mock server operations.
#[derive(Debug, Error)]
pub enum MockServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The client sent bytes that do not frame.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type for mock server operations.
pub type Result<T> = std::result::Result<T, MockServerError>;

/// Mock response configuration.
#[derive(Clone)]
pub enum MockResponse {
    /// Answer with this type and payload, echoing the request pid.
    Payload {
        /// Response type tag.
        tp: u8,
        /// Raw payload.
        payload: Bytes,
    },

    /// Send a package with a fixed pid, regardless of the request.
    Stray {
        /// Package id to use.
        pid: u16,
        /// Response type tag.
        tp: u8,
        /// Raw payload.
        payload: Bytes,
    },

    /// Write raw bytes that need not frame.
    Garbage(Bytes),

    /// Do not answer.
    Silent,

    /// Close the connection.
    Close,

    /// Several responses in order.
    Sequence(Vec<MockResponse>),

    /// Build the response from the request.
    Custom(Arc<dyn Fn(&Package) -> MockResponse + Send + Sync>),
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload { tp, payload } => f
                .debug_struct("Payload")
                .field("tp", tp)
                .field("len", &payload.len())
                .finish(),
            Self::Stray { pid, tp, payload } => f
                .debug_struct("Stray")
                .field("pid", pid)
                .field("tp", tp)
                .field("len", &payload.len())
                .finish(),
            Self::Garbage(data) => f.debug_tuple("Garbage").field(&data.len()).finish(),
            Self::Silent => f.write_str("Silent"),
            Self::Close => f.write_str("Close"),
            Self::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl MockResponse {
    /// A response of type `tp` carrying a JSON payload.
    pub fn json(tp: ResponseType, value: &Value) -> Self {
        Self::Payload {
            tp: tp.into(),
            payload: Bytes::from(value.to_string()),
        }
    }

    /// A query result.
    pub fn query(value: Value) -> Self {
        Self::json(ResponseType::Query, &value)
    }

    /// A successful insert acknowledgement.
    pub fn insert_ok(points: usize) -> Self {
        Self::json(
            ResponseType::Insert,
            &json!({ "success_msg": format!("Successfully inserted {points} point(s).") }),
        )
    }

    /// A server error of type `tp` with a message.
    pub fn error(tp: ResponseType, message: impl Into<String>) -> Self {
        Self::json(tp, &json!({ "error_msg": message.into() }))
    }

    /// A package with a pid nobody asked for.
    pub fn stray(pid: u16, tp: ResponseType) -> Self {
        Self::Stray {
            pid,
            tp: tp.into(),
            payload: Bytes::from_static(b"{}"),
        }
    }

    /// Flatten this response into wire actions for `request`.
    fn plan(&self, request: &Package, actions: &mut Vec<Action>) {
        match self {
            Self::Payload { tp, payload } => {
                actions.push(Action::Send(Package::new(request.pid(), *tp, payload)));
            }
            Self::Stray { pid, tp, payload } => {
                actions.push(Action::Send(Package::new(*pid, *tp, payload)));
            }
            Self::Garbage(data) => actions.push(Action::Raw(data.clone())),
            Self::Silent => {}
            Self::Close => actions.push(Action::Close),
            Self::Sequence(items) => {
                for item in items {
                    item.plan(request, actions);
                }
            }
            Self::Custom(build) => build(request).plan(request, actions),
        }
    }
}

enum Action {
    Send(Package),
    Raw(Bytes),
    Close,
}

/// Configuration for the mock SiriDB server.
#[derive(Debug)]
pub struct MockServerConfig {
    /// Responses for specific query strings.
    responses: HashMap<String, MockResponse>,
    /// Response for unmatched queries.
    default_response: MockResponse,
    /// Response for inserts.
    insert_response: MockResponse,
    /// Accepted user.
    username: String,
    /// Accepted password.
    password: String,
    /// Existing database.
    database: String,
    /// Write every package in pieces of this many bytes.
    chunk_size: Option<usize>,
}

/// Builder for `MockSiriServer`.
pub struct MockServerBuilder {
    config: MockServerConfig,
}

impl MockServerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: MockServerConfig {
                responses: HashMap::new(),
                default_response: MockResponse::query(json!({})),
                insert_response: MockResponse::insert_ok(0),
                username: "iris".to_string(),
                password: "siri".to_string(),
                database: "dbtest".to_string(),
                chunk_size: None,
            },
        }
    }

    /// Add a response for a specific query.
    pub fn with_response(mut self, query: impl Into<String>, response: MockResponse) -> Self {
        self.config.responses.insert(query.into(), response);
        self
    }

    /// Set the response for unmatched queries.
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.config.default_response = response;
        self
    }

    /// Set the response for inserts.
    pub fn with_insert_response(mut self, response: MockResponse) -> Self {
        self.config.insert_response = response;
        self
    }

    /// Set the accepted credentials.
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    /// Set the database that exists on this server.
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.config.database = db.into();
        self
    }

    /// Write packages in pieces of `size` bytes.
    pub fn with_chunked_writes(mut self, size: usize) -> Self {
        self.config.chunk_size = Some(size.max(1));
        self
    }

    /// Build and start the mock server.
    pub async fn build(self) -> Result<MockSiriServer> {
        MockSiriServer::start(self.config).await
    }
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A mock SiriDB server for testing.
///
/// Each accepted connection is served on its own task until the client
/// disconnects, a response closes it, or the server is stopped.
pub struct MockSiriServer {
    /// Server address.
    addr: SocketAddr,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
    /// Server configuration.
    config: Arc<MockServerConfig>,
    /// Connection count.
    connection_count: Arc<Mutex<usize>>,
    /// Every package received, across connections.
    received: Arc<Mutex<Vec<Package>>>,
}

impl MockSiriServer {
    /// Create a new builder for the mock server.
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    /// Start the mock server on an available port.
    pub async fn start(config: MockServerConfig) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let config = Arc::new(config);
        let connection_count = Arc::new(Mutex::new(0usize));
        let received = Arc::new(Mutex::new(Vec::new()));

        let server = Self {
            addr,
            shutdown_tx: shutdown_tx.clone(),
            config: config.clone(),
            connection_count: connection_count.clone(),
            received: received.clone(),
        };

        // Spawn the accept loop
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _peer_addr)) => {
                                let config = config.clone();
                                let count = connection_count.clone();
                                let received = received.clone();
                                let mut shutdown_rx = shutdown_tx.subscribe();
                                tokio::spawn(async move {
                                    *count.lock().await += 1;
                                    tokio::select! {
                                        result = handle_connection(stream, config, received) => {
                                            if let Err(e) = result {
                                                tracing::debug!("Connection error: {}", e);
                                            }
                                        }
                                        _ = shutdown_rx.recv() => {}
                                    }
                                    let mut c = count.lock().await;
                                    *c = c.saturating_sub(1);
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Ok(server)
    }

    /// Get the server's listening address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the host string for connection configuration.
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Client configuration pointing at this server with its credentials.
    pub fn client_config(&self) -> Config {
        Config::new()
            .host(self.host())
            .port(self.port())
            .username(&self.config.username)
            .password(&self.config.password)
            .database(&self.config.database)
    }

    /// Get the current connection count.
    pub async fn connection_count(&self) -> usize {
        *self.connection_count.lock().await
    }

    /// Packages received so far, in arrival order.
    pub async fn received(&self) -> Vec<Package> {
        self.received.lock().await.clone()
    }

    /// Stop the server and drop every open connection.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for MockSiriServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle a single client connection.
async fn handle_connection(
    mut stream: TcpStream,
    config: Arc<MockServerConfig>,
    received: Arc<Mutex<Vec<Package>>>,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let mut buffer = StreamBuffer::new();
    let mut chunk = vec![0u8; 4096];
    let mut authenticated = false;

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            // Client disconnected
            return Ok(());
        }

        let packages = buffer
            .append(&chunk[..n])?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for package in packages {
            received.lock().await.push(package.clone());

            let mut actions = Vec::new();
            respond(&package, &config, &mut authenticated)?.plan(&package, &mut actions);

            for action in actions {
                match action {
                    Action::Send(reply) => write_frame(&mut stream, reply.frame(), config.chunk_size).await?,
                    Action::Raw(data) => write_frame(&mut stream, &data, config.chunk_size).await?,
                    Action::Close => return Ok(()),
                }
            }
        }
    }
}

/// Decide how to answer one request.
fn respond(
    package: &Package,
    config: &MockServerConfig,
    authenticated: &mut bool,
) -> Result<MockResponse> {
    let tp = RequestType::from_u8(package.tp()).ok();

    if tp == Some(RequestType::Auth) {
        let [username, password, database] = decode_auth(package.payload())?;
        let outcome = if username != config.username || password != config.password {
            ResponseType::ErrAuthCredentials
        } else if database != config.database {
            ResponseType::ErrAuthUnknownDb
        } else {
            ResponseType::AuthSuccess
        };
        *authenticated = outcome == ResponseType::AuthSuccess;
        tracing::debug!(pid = package.pid(), ?outcome, "mock handshake");
        return Ok(MockResponse::Payload {
            tp: outcome.into(),
            payload: Bytes::new(),
        });
    }

    if !*authenticated {
        return Ok(MockResponse::error(
            ResponseType::ErrNotAuthenticated,
            "not authenticated",
        ));
    }

    Ok(match tp {
        Some(RequestType::Query) => {
            let query = decode_query(package.payload())?;
            config
                .responses
                .get(&query)
                .cloned()
                .unwrap_or_else(|| config.default_response.clone())
        }
        Some(RequestType::Insert) => config.insert_response.clone(),
        Some(RequestType::Ping) => MockResponse::Payload {
            tp: ResponseType::Ack.into(),
            payload: Bytes::new(),
        },
        _ => MockResponse::error(ResponseType::Err, "unsupported request"),
    })
}

fn decode_auth(payload: &[u8]) -> Result<[String; 3]> {
    serde_json::from_slice(payload)
        .map_err(|e| MockServerError::Protocol(format!("invalid auth payload: {e}")))
}

fn decode_query(payload: &[u8]) -> Result<String> {
    let [query]: [String; 1] = serde_json::from_slice(payload)
        .map_err(|e| MockServerError::Protocol(format!("invalid query payload: {e}")))?;
    Ok(query)
}

/// Write `data`, optionally in pieces with a flush between each.
async fn write_frame(stream: &mut TcpStream, data: &[u8], chunk_size: Option<usize>) -> Result<()> {
    match chunk_size {
        Some(size) => {
            for piece in data.chunks(size) {
                stream.write_all(piece).await?;
                stream.flush().await?;
                tokio::task::yield_now().await;
            }
        }
        None => stream.write_all(data).await?,
    }
    Ok(())
}
