//! The connection handle.
//!
//! A [`Connection`] is a cheap, cloneable handle. Connecting spawns a driver
//! task that owns the socket; the handle only holds the sending side of the
//! driver's command channel. Every operation returns immediately and the
//! outcome is delivered later through the request's completion.
//!
//! ## Example
//!
//! ```rust,ignore
//! use siridb_client::{Config, Connection, JsonCodec};
//!
//! let connection = Connection::new(Config::new().database("dbtest"));
//!
//! let (request, reply) = connection.request_future();
//! connection.connect(request, &JsonCodec);
//! let auth = reply.await?;
//! assert!(auth.auth_outcome().is_authenticated());
//!
//! let (request, reply) = connection.request_future();
//! connection.query(request, &JsonCodec, "list series");
//! let series = reply.await?.decode(&JsonCodec)?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use parking_lot::Mutex;
use siridb_codec::Transport;
use siridb_protocol::RequestType;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::codec::Codec;
use crate::config::Config;
use crate::driver::{self, Driver};
use crate::error::{Error, Misuse, Result};
use crate::funnel;
use crate::hooks::{ConnectionHooks, NoopHooks};
use crate::pending::PendingWrite;
use crate::request::{Reply, Request, Response};

/// Message from a handle to its driver.
pub(crate) enum Command {
    Submit(PendingWrite),
    Close(Option<String>),
}

/// State shared between handles.
pub(crate) struct Shared {
    config: Config,
    hooks: Arc<dyn ConnectionHooks>,
    next_pid: AtomicU16,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

impl Shared {
    fn sender(&self) -> Option<mpsc::UnboundedSender<Command>> {
        self.commands.lock().clone()
    }

    /// Install a fresh command channel unless a live one exists.
    fn open_channel(&self) -> Option<mpsc::UnboundedReceiver<Command>> {
        let mut slot = self.commands.lock();
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        Some(rx)
    }

    /// Drop the installed sender if its driver has gone away.
    pub(crate) fn clear_closed_sender(&self) {
        let mut slot = self.commands.lock();
        if slot.as_ref().is_some_and(mpsc::UnboundedSender::is_closed) {
            *slot = None;
        }
    }
}

/// Handle to a SiriDB connection.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Create a disconnected handle.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_hooks(config, NoopHooks)
    }

    /// Create a disconnected handle with lifecycle hooks.
    #[must_use]
    pub fn with_hooks(config: Config, hooks: impl ConnectionHooks) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                hooks: Arc::new(hooks),
                next_pid: AtomicU16::new(0),
                commands: Mutex::new(None),
            }),
        }
    }

    /// The connection configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Whether a driver is running for this handle.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared
            .commands
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Allocate the next package id. Ids wrap around after `u16::MAX`.
    pub fn next_pid(&self) -> u16 {
        self.shared.next_pid.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a request completed through `callback`.
    pub fn request<F>(&self, callback: F) -> Request
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        Request::new(self.next_pid(), callback)
    }

    /// Create a request that hands `data` back to `callback`.
    pub fn request_with<T, F>(&self, data: T, callback: F) -> Request
    where
        T: Send + 'static,
        F: FnOnce(T, Result<Response>) + Send + 'static,
    {
        Request::with_data(self.next_pid(), data, callback)
    }

    /// Create a request completed through a future.
    pub fn request_future(&self) -> (Request, Reply) {
        Request::channel(self.next_pid())
    }

    /// Open a TCP connection and authenticate.
    ///
    /// `request` completes with the handshake response. A rejected handshake
    /// (wrong credentials, unknown database) is a successful completion; see
    /// [`Response::auth_outcome`]. Must be called from within a tokio
    /// runtime.
    pub fn connect<C: Codec + ?Sized>(&self, request: Request, codec: &C) {
        let Some((mut handshake, mut commands, runtime)) = self.prepare(request, codec) else {
            return;
        };
        let config = self.shared.config.clone();
        let hooks = Arc::clone(&self.shared.hooks);
        let shared = Arc::downgrade(&self.shared);

        runtime.spawn(async move {
            match open_stream(&config).await {
                Ok(stream) => {
                    let transport = Transport::with_limits(
                        stream,
                        config.max_package_size,
                        config.read_buffer_size,
                    );
                    Driver::new(transport, commands, hooks, shared)
                        .run(handshake)
                        .await;
                }
                Err(e) => {
                    tracing::debug!(addr = %config.addr(), error = %e, "connect failed");
                    funnel::fail(&mut handshake, e);
                    driver::release(&mut commands, &shared);
                }
            }
        });
    }

    /// Authenticate over an already established byte stream.
    ///
    /// Behaves like [`connect`](Self::connect) without opening a socket.
    pub fn attach<T, C>(&self, stream: T, request: Request, codec: &C)
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
        C: Codec + ?Sized,
    {
        let Some((handshake, commands, runtime)) = self.prepare(request, codec) else {
            return;
        };
        let config = &self.shared.config;
        let transport =
            Transport::with_limits(stream, config.max_package_size, config.read_buffer_size);
        let driver = Driver::new(
            transport,
            commands,
            Arc::clone(&self.shared.hooks),
            Arc::downgrade(&self.shared),
        );
        runtime.spawn(driver.run(handshake));
    }

    /// Submit a query.
    pub fn query<C: Codec + ?Sized>(&self, request: Request, codec: &C, query: &str) {
        match codec.encode_query(query) {
            Ok(payload) => self.submit(PendingWrite::new(request, RequestType::Query, payload)),
            Err(e) => funnel::reject(request, e),
        }
    }

    /// Submit an insert.
    pub fn insert<C: Codec + ?Sized>(&self, request: Request, codec: &C, series: &C::Series) {
        match codec.encode_insert(series) {
            Ok(payload) => self.submit(PendingWrite::new(request, RequestType::Insert, payload)),
            Err(e) => funnel::reject(request, e),
        }
    }

    /// Submit a prepared write.
    ///
    /// Fails with [`Error::NotConnected`] when no driver is running and with
    /// [`Misuse::NotAuthenticated`] before the handshake succeeded.
    pub fn submit(&self, write: PendingWrite) {
        let Some(sender) = self.shared.sender() else {
            let mut write = write;
            funnel::fail(&mut write, Error::NotConnected);
            return;
        };
        // The driver stopped between the lookup and the send.
        if let Err(mpsc::error::SendError(Command::Submit(mut write))) =
            sender.send(Command::Submit(write))
        {
            funnel::fail(&mut write, Error::NotConnected);
        }
    }

    /// Close the connection. Outstanding requests fail with
    /// [`Error::ConnectionClosed`] carrying `reason`, and the on-close hook
    /// receives it. Closing a closed connection does nothing.
    pub fn close(&self, reason: Option<&str>) {
        let Some(sender) = self.shared.sender() else {
            return;
        };
        if sender.send(Command::Close(reason.map(str::to_owned))).is_err() {
            tracing::trace!("close requested on a finished connection");
        }
    }

    /// Shared steps of `connect` and `attach`: validate, encode the
    /// handshake, find a runtime and claim the command channel.
    fn prepare<C: Codec + ?Sized>(
        &self,
        request: Request,
        codec: &C,
    ) -> Option<(PendingWrite, mpsc::UnboundedReceiver<Command>, Handle)> {
        let config = &self.shared.config;
        if let Err(e) = config.validate() {
            funnel::reject(request, e);
            return None;
        }
        let payload = match codec.encode_auth(&config.credentials) {
            Ok(payload) => payload,
            Err(e) => {
                funnel::reject(request, e);
                return None;
            }
        };
        let Ok(runtime) = Handle::try_current() else {
            funnel::reject(request, Misuse::NoRuntime.into());
            return None;
        };
        let Some(commands) = self.shared.open_channel() else {
            funnel::reject(request, Misuse::AlreadyConnected.into());
            return None;
        };

        tracing::debug!(
            addr = %config.addr(),
            user = %config.credentials.username,
            database = %config.credentials.database,
            "connecting"
        );
        Some((
            PendingWrite::new(request, RequestType::Auth, payload),
            commands,
            runtime,
        ))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.shared.config.addr())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

async fn open_stream(config: &Config) -> Result<TcpStream> {
    let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(config.addr()))
        .await
        .map_err(|_| Error::ConnectionTimeout)??;
    stream.set_nodelay(config.tcp_nodelay)?;
    Ok(stream)
}

#[cfg(all(test, feature = "json"))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::error::Status;
    use crate::request::AuthOutcome;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use siridb_codec::{Package, PackageStream};
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    #[derive(Clone, Default)]
    struct Recorder {
        closes: Arc<Mutex<Vec<String>>>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    impl ConnectionHooks for Recorder {
        fn on_close(&self, reason: &str) {
            self.closes.lock().push(reason.to_string());
        }

        fn on_error(&self, message: &str) {
            self.errors.lock().push(message.to_string());
        }
    }

    fn config() -> Config {
        Config::new().database("dbtest")
    }

    /// Attach `connection` to an in-memory peer and answer the handshake
    /// with `tp`.
    async fn handshake(connection: &Connection, tp: u8) -> (PackageStream<DuplexStream>, Response) {
        let (client, server) = tokio::io::duplex(4096);
        let mut server = PackageStream::new(server);

        let (request, reply) = connection.request_future();
        connection.attach(client, request, &JsonCodec);

        let auth = server.next().await.unwrap().unwrap();
        assert_eq!(auth.tp(), u8::from(RequestType::Auth));
        server.send(Package::new(auth.pid(), tp, b"")).await.unwrap();

        (server, reply.await.unwrap())
    }

    async fn wait_disconnected(connection: &Connection) {
        for _ in 0..200 {
            if !connection.is_connected() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_handshake_sends_credentials() {
        let connection = Connection::new(config());
        let (client, server) = tokio::io::duplex(4096);
        let mut server = PackageStream::new(server);

        let (request, reply) = connection.request_future();
        let pid = request.pid();
        connection.attach(client, request, &JsonCodec);

        let auth = server.next().await.unwrap().unwrap();
        assert_eq!(auth.pid(), pid);
        assert_eq!(auth.payload(), br#"["iris","siri","dbtest"]"#);
        server.send(Package::new(pid, 2, b"")).await.unwrap();

        let response = reply.await.unwrap();
        assert_eq!(response.auth_outcome(), AuthOutcome::Authenticated);
        assert!(connection.is_connected());
    }

    #[tokio::test]
    async fn test_query_roundtrip() {
        let connection = Connection::new(config());
        let (mut server, _) = handshake(&connection, 2).await;

        let (request, reply) = connection.request_future();
        connection.query(request, &JsonCodec, "list series");

        let query = server.next().await.unwrap().unwrap();
        assert_eq!(query.tp(), u8::from(RequestType::Query));
        assert_eq!(query.payload(), br#"["list series"]"#);
        server
            .send(Package::new(query.pid(), 0, br#"{"series":[["cpu"]]}"#))
            .await
            .unwrap();

        let response = reply.await.unwrap();
        assert!(!response.is_error());
        assert_eq!(
            response.decode(&JsonCodec).unwrap(),
            json!({"series": [["cpu"]]})
        );
    }

    #[tokio::test]
    async fn test_pipelined_requests_resolve_by_pid() {
        let connection = Connection::new(config());
        let (mut server, _) = handshake(&connection, 2).await;

        let (first, first_reply) = connection.request_future();
        let (second, second_reply) = connection.request_future();
        connection.query(first, &JsonCodec, "select * from 'a'");
        connection.insert(second, &JsonCodec, &json!({"a": [[1, 1]]}));

        let a = server.next().await.unwrap().unwrap();
        let b = server.next().await.unwrap().unwrap();
        assert_eq!(b.tp(), u8::from(RequestType::Insert));

        // Answer out of order.
        server.send(Package::new(b.pid(), 1, b"{}")).await.unwrap();
        server.send(Package::new(a.pid(), 0, b"{}")).await.unwrap();

        assert_eq!(first_reply.await.unwrap().pid(), a.pid());
        assert_eq!(second_reply.await.unwrap().tp(), 1);
    }

    #[tokio::test]
    async fn test_credentials_rejected_is_success_and_stays_open() {
        let connection = Connection::new(config());
        let (_server, response) = handshake(&connection, 72).await;

        assert_eq!(response.auth_outcome(), AuthOutcome::InvalidCredentials);
        assert!(response.is_error());
        assert!(connection.is_connected());

        let (request, reply) = connection.request_future();
        connection.query(request, &JsonCodec, "list series");
        assert_eq!(
            reply.await.unwrap_err(),
            Error::Misuse(Misuse::NotAuthenticated)
        );
    }

    #[tokio::test]
    async fn test_query_before_handshake_response_is_misuse() {
        let connection = Connection::new(config());
        let (client, _server) = tokio::io::duplex(4096);

        let (auth, _auth_reply) = connection.request_future();
        connection.attach(client, auth, &JsonCodec);

        let (request, reply) = connection.request_future();
        connection.query(request, &JsonCodec, "list series");
        assert!(reply.await.unwrap_err().is_misuse());
    }

    #[tokio::test]
    async fn test_submit_without_connection() {
        let connection = Connection::new(config());
        let (request, reply) = connection.request_future();
        connection.query(request, &JsonCodec, "list series");

        let err = reply.await.unwrap_err();
        assert_eq!(err, Error::NotConnected);
        assert_eq!(err.status(), Status::NotConnected);
    }

    #[tokio::test]
    async fn test_encode_failure_completes_immediately() {
        let connection = Connection::new(config());
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let request = connection.request_with("insert #1", move |tag, outcome| {
            *slot.lock() = Some((tag, outcome.unwrap_err().status()));
        });

        connection.insert(request, &JsonCodec, &json!("not an object"));
        assert_eq!(*seen.lock(), Some(("insert #1", Status::Encode)));
    }

    #[tokio::test]
    async fn test_unmatched_response_is_reported_not_fatal() {
        let hooks = Recorder::default();
        let connection = Connection::with_hooks(config(), hooks.clone());
        let (mut server, _) = handshake(&connection, 2).await;

        let (request, reply) = connection.request_future();
        connection.query(request, &JsonCodec, "list series");
        let query = server.next().await.unwrap().unwrap();
        assert_ne!(query.pid(), 7);

        server.send(Package::new(7, 0, b"{}")).await.unwrap();
        server.send(Package::new(query.pid(), 0, b"{}")).await.unwrap();

        assert_eq!(reply.await.unwrap().pid(), query.pid());
        assert_eq!(
            *hooks.errors.lock(),
            vec!["no request found for package id 7".to_string()]
        );
        assert!(hooks.closes.lock().is_empty());
        assert!(connection.is_connected());
    }

    #[tokio::test]
    async fn test_peer_eof_fails_outstanding_and_closes_once() {
        let hooks = Recorder::default();
        let connection = Connection::with_hooks(config(), hooks.clone());
        let (mut server, _) = handshake(&connection, 2).await;

        let (request, reply) = connection.request_future();
        connection.query(request, &JsonCodec, "list series");
        server.next().await.unwrap().unwrap();
        drop(server);

        assert_eq!(
            reply.await.unwrap_err(),
            Error::ConnectionClosed("connection closed".into())
        );
        wait_disconnected(&connection).await;
        connection.close(Some("again"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*hooks.closes.lock(), vec!["connection closed".to_string()]);
    }

    #[tokio::test]
    async fn test_framing_violation_closes_connection() {
        let hooks = Recorder::default();
        let connection = Connection::with_hooks(config(), hooks.clone());
        let (mut server, _) = handshake(&connection, 2).await;

        let (request, reply) = connection.request_future();
        connection.query(request, &JsonCodec, "list series");

        // The query must be in flight before the bad header arrives.
        let query = server.next().await.unwrap().unwrap();
        assert_eq!(query.tp(), u8::from(RequestType::Query));
        let mut raw = server.into_inner();

        // tp 0 with a check byte of 0 instead of 0xff.
        raw.write_all(&[0, 0, 0, 0, 1, 0, 0, 0]).await.unwrap();

        let err = reply.await.unwrap_err();
        assert_eq!(
            err,
            Error::ConnectionClosed("invalid package, connection closed".into())
        );
        wait_disconnected(&connection).await;
        assert_eq!(
            *hooks.closes.lock(),
            vec!["invalid package, connection closed".to_string()]
        );
    }

    #[tokio::test]
    async fn test_close_with_reason() {
        let hooks = Recorder::default();
        let connection = Connection::with_hooks(config(), hooks.clone());
        let (mut server, _) = handshake(&connection, 2).await;

        let (request, reply) = connection.request_future();
        connection.query(request, &JsonCodec, "list series");
        server.next().await.unwrap().unwrap();

        connection.close(Some("shutting down"));
        assert_eq!(
            reply.await.unwrap_err(),
            Error::ConnectionClosed("shutting down".into())
        );
        assert!(server.next().await.is_none());

        wait_disconnected(&connection).await;
        assert_eq!(*hooks.closes.lock(), vec!["shutting down".to_string()]);

        let (request, reply) = connection.request_future();
        connection.query(request, &JsonCodec, "list series");
        assert_eq!(reply.await.unwrap_err(), Error::NotConnected);
    }

    #[tokio::test]
    async fn test_connect_while_connected_is_misuse() {
        let connection = Connection::new(config());
        let (_server, _) = handshake(&connection, 2).await;

        let (client, _other) = tokio::io::duplex(64);
        let (request, reply) = connection.request_future();
        connection.attach(client, request, &JsonCodec);

        assert_eq!(
            reply.await.unwrap_err(),
            Error::Misuse(Misuse::AlreadyConnected)
        );
    }

    #[tokio::test]
    async fn test_reconnect_after_close() {
        let connection = Connection::new(config());
        let (server, _) = handshake(&connection, 2).await;
        drop(server);
        wait_disconnected(&connection).await;

        let (_server, response) = handshake(&connection, 2).await;
        assert!(response.auth_outcome().is_authenticated());
    }

    #[tokio::test]
    async fn test_dropping_every_handle_closes_connection() {
        let hooks = Recorder::default();
        let connection = Connection::with_hooks(config(), hooks.clone());
        let (mut server, _) = handshake(&connection, 2).await;

        drop(connection);
        assert!(server.next().await.is_none());
        assert_eq!(*hooks.closes.lock(), vec!["connection closed".to_string()]);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connection = Connection::new(config().host("127.0.0.1").port(port));
        let (request, reply) = connection.request_future();
        connection.connect(request, &JsonCodec);

        let err = reply.await.unwrap_err();
        assert_eq!(err.status(), Status::ConnectionRefused);
        assert!(err.is_transient());
        wait_disconnected(&connection).await;
    }

    #[tokio::test]
    async fn test_invalid_config_rejects_connect() {
        let connection = Connection::new(config().read_buffer_size(0));
        let (request, reply) = connection.request_future();
        connection.connect(request, &JsonCodec);

        assert!(matches!(reply.await.unwrap_err(), Error::Config(_)));
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_unsendable_handshake_closes_connection() {
        let hooks = Recorder::default();
        // The encoded credentials are longer than 10 bytes.
        let connection = Connection::with_hooks(config().max_package_size(10), hooks.clone());
        let (client, server) = tokio::io::duplex(4096);
        let mut server = PackageStream::new(server);

        let (request, reply) = connection.request_future();
        connection.attach(client, request, &JsonCodec);

        let err = reply.await.unwrap_err();
        assert_eq!(err.status(), Status::InvalidPackage);
        wait_disconnected(&connection).await;
        assert!(server.next().await.is_none());
        assert_eq!(
            *hooks.closes.lock(),
            vec!["invalid package, connection closed".to_string()]
        );

        let (request, reply) = connection.request_future();
        connection.query(request, &JsonCodec, "list series");
        assert_eq!(reply.await.unwrap_err(), Error::NotConnected);
    }

    #[test]
    fn test_connect_outside_runtime() {
        let connection = Connection::new(config());
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let request = connection.request(move |outcome| *slot.lock() = outcome.err());

        connection.connect(request, &JsonCodec);
        assert_eq!(*seen.lock(), Some(Error::Misuse(Misuse::NoRuntime)));
        assert!(!connection.is_connected());
    }

    #[test]
    fn test_pids_increment() {
        let connection = Connection::new(config());
        let a = connection.next_pid();
        let b = connection.next_pid();
        assert_eq!(b, a.wrapping_add(1));
    }
}
