//! Correlated requests and their responses.
//!
//! A [`Request`] pairs a package id with a single-shot completion: either a
//! callback or a oneshot channel feeding a [`Reply`] future. Completion
//! consumes the completion handle, so a request can complete at most once.
//! A request that is dropped before it ever completed is completed with
//! [`Error::Abandoned`], so it also completes at least once.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use siridb_codec::Package;
use siridb_protocol::{ProtocolError, ResponseType, errproto};
use tokio::sync::oneshot;

use crate::codec::Codec;
use crate::error::{Error, Result, Status};

/// Boxed completion callback.
pub type Callback = Box<dyn FnOnce(Result<Response>) + Send + 'static>;

enum Completion {
    Callback(Callback),
    Channel(oneshot::Sender<Result<Response>>),
}

impl Completion {
    fn deliver(self, outcome: Result<Response>) {
        match self {
            Self::Callback(callback) => callback(outcome),
            // The receiver may be gone; nobody is waiting then.
            Self::Channel(tx) => {
                let _ = tx.send(outcome);
            }
        }
    }
}

/// Observable status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Not yet completed.
    Pending,
    /// Completed with a response.
    Succeeded,
    /// Completed with an error.
    Failed(Status),
}

/// A request correlated with a response by package id.
pub struct Request {
    pid: u16,
    status: RequestStatus,
    completion: Option<Completion>,
}

impl Request {
    /// Create a request completed through a callback.
    pub fn new<F>(pid: u16, callback: F) -> Self
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        Self {
            pid,
            status: RequestStatus::Pending,
            completion: Some(Completion::Callback(Box::new(callback))),
        }
    }

    /// Create a request carrying opaque user data back to its callback.
    pub fn with_data<T, F>(pid: u16, data: T, callback: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce(T, Result<Response>) + Send + 'static,
    {
        Self::new(pid, move |outcome| callback(data, outcome))
    }

    /// Create a request completed through a future.
    pub fn channel(pid: u16) -> (Self, Reply) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            pid,
            status: RequestStatus::Pending,
            completion: Some(Completion::Channel(tx)),
        };
        (request, Reply { rx })
    }

    /// Correlation id.
    #[must_use]
    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Whether the completion already ran.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completion.is_none()
    }

    /// Deliver the outcome. Returns `false` if the request had already
    /// completed, in which case the outcome is discarded.
    pub(crate) fn complete(&mut self, outcome: Result<Response>) -> bool {
        let Some(completion) = self.completion.take() else {
            return false;
        };
        self.status = match &outcome {
            Ok(_) => RequestStatus::Succeeded,
            Err(e) => RequestStatus::Failed(e.status()),
        };
        completion.deliver(outcome);
        true
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            tracing::debug!(pid = self.pid, "request dropped before completion");
            completion.deliver(Err(Error::Abandoned));
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("pid", &self.pid)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Future resolving to the outcome of a [`Request`] created with
/// [`Request::channel`].
#[derive(Debug)]
pub struct Reply {
    rx: oneshot::Receiver<Result<Response>>,
}

impl Future for Reply {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Abandoned)))
    }
}

/// Outcome of the authentication handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The server accepted the credentials.
    Authenticated,
    /// Wrong user name or password.
    InvalidCredentials,
    /// The database does not exist on this server.
    UnknownDatabase,
    /// Any other response type.
    Other(u8),
}

impl AuthOutcome {
    /// Classify a response type tag.
    #[must_use]
    pub fn from_tp(tp: u8) -> Self {
        match ResponseType::from_u8(tp) {
            Ok(ResponseType::AuthSuccess) => Self::Authenticated,
            Ok(ResponseType::ErrAuthCredentials) => Self::InvalidCredentials,
            Ok(ResponseType::ErrAuthUnknownDb) => Self::UnknownDatabase,
            _ => Self::Other(tp),
        }
    }

    /// Whether the handshake succeeded.
    #[must_use]
    pub fn is_authenticated(self) -> bool {
        self == Self::Authenticated
    }
}

/// A response package matched to its request.
///
/// Server-side error types (`tp >= 64`) still arrive as successful
/// completions; inspect [`is_error`](Self::is_error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    package: Package,
}

impl Response {
    /// Wrap a decoded package.
    #[must_use]
    pub fn new(package: Package) -> Self {
        Self { package }
    }

    /// Correlation id.
    #[must_use]
    pub fn pid(&self) -> u16 {
        self.package.pid()
    }

    /// Raw type tag.
    #[must_use]
    pub fn tp(&self) -> u8 {
        self.package.tp()
    }

    /// Typed response type, if the tag is known.
    pub fn response_type(&self) -> std::result::Result<ResponseType, ProtocolError> {
        ResponseType::from_u8(self.tp())
    }

    /// Payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.package.payload()
    }

    /// Payload as a cheaply cloneable buffer.
    #[must_use]
    pub fn payload_bytes(&self) -> Bytes {
        self.package.payload_bytes()
    }

    /// The underlying package.
    #[must_use]
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Whether the server answered with an error type.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.tp() >= 64
    }

    /// Description of a server error type, see [`errproto`].
    #[must_use]
    pub fn error_description(&self) -> &'static str {
        errproto(self.tp())
    }

    /// Interpret this response as a handshake answer.
    #[must_use]
    pub fn auth_outcome(&self) -> AuthOutcome {
        AuthOutcome::from_tp(self.tp())
    }

    /// Decode the payload with a codec.
    pub fn decode<C: Codec + ?Sized>(&self, codec: &C) -> Result<C::Value> {
        codec.decode(self.tp(), self.payload())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn response(pid: u16, tp: u8) -> Response {
        Response::new(Package::new(pid, tp, b"[]"))
    }

    #[test]
    fn test_complete_runs_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut request = Request::new(4, move |outcome| {
            assert_eq!(outcome.unwrap().pid(), 4);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(request.complete(Ok(response(4, 0))));
        assert!(!request.complete(Err(Error::NotConnected)));
        drop(request);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_status_tracks_outcome() {
        let mut request = Request::new(1, |_| {});
        assert_eq!(request.status(), RequestStatus::Pending);
        request.complete(Err(Error::NotConnected));
        assert_eq!(request.status(), RequestStatus::Failed(Status::NotConnected));
        assert!(request.is_completed());
    }

    #[test]
    fn test_drop_completes_with_abandoned() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let slot = Arc::clone(&seen);
        let request = Request::with_data(2, "user data", move |data, outcome| {
            *slot.lock() = Some((data, outcome.unwrap_err()));
        });
        drop(request);

        assert_eq!(*seen.lock(), Some(("user data", Error::Abandoned)));
    }

    #[tokio::test]
    async fn test_reply_future() {
        let (mut request, reply) = Request::channel(9);
        request.complete(Ok(response(9, 2)));
        let response = reply.await.unwrap();
        assert_eq!(response.auth_outcome(), AuthOutcome::Authenticated);
    }

    #[tokio::test]
    async fn test_reply_of_dropped_request() {
        let (request, reply) = Request::channel(9);
        drop(request);
        assert_eq!(reply.await.unwrap_err(), Error::Abandoned);
    }

    #[test]
    fn test_auth_outcomes() {
        assert_eq!(response(1, 72).auth_outcome(), AuthOutcome::InvalidCredentials);
        assert_eq!(response(1, 73).auth_outcome(), AuthOutcome::UnknownDatabase);
        assert_eq!(response(1, 70).auth_outcome(), AuthOutcome::Other(70));
        assert!(response(1, 73).is_error());
        assert_eq!(response(1, 73).error_description(), "unknown database");
        assert!(!response(1, 0).is_error());
    }
}
