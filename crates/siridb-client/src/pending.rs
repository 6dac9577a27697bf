//! Pending writes and their lifecycle.
//!
//! ```text
//! Created -> Submitted -> Sent -> Completed
//!    |           |                   ^
//!    +-----------+-------------------+
//! ```
//!
//! Any non-completed state may move to `Completed`; every other transition
//! is rejected as misuse. The encoded frame is released on the transition
//! into `Completed`.

use bytes::Bytes;
use siridb_codec::Package;
use siridb_protocol::RequestType;

use crate::error::{Error, Misuse, Result};
use crate::request::{Request, Response};

/// Lifecycle state of a [`PendingWrite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// Built, not yet handed to a connection.
    Created,
    /// Accepted by the connection, being written.
    Submitted,
    /// Written to the transport, waiting for the response.
    Sent,
    /// Completed with a response or an error.
    Completed,
}

/// An encoded outbound frame bound to its request.
#[derive(Debug)]
pub struct PendingWrite {
    request: Request,
    package: Option<Package>,
    state: WriteState,
}

impl PendingWrite {
    /// Frame `payload` as a package of type `tp` for `request`.
    pub fn new(request: Request, tp: RequestType, payload: impl Into<Bytes>) -> Self {
        let payload: Bytes = payload.into();
        let package = Package::new(request.pid(), tp.into(), &payload);
        Self {
            request,
            package: Some(package),
            state: WriteState::Created,
        }
    }

    /// Correlation id, shared by the request and the frame.
    #[must_use]
    pub fn pid(&self) -> u16 {
        self.request.pid()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WriteState {
        self.state
    }

    /// The request this write belongs to.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The encoded frame, until the write completes.
    #[must_use]
    pub fn package(&self) -> Option<&Package> {
        self.package.as_ref()
    }

    /// Whether this write carries the authentication handshake.
    #[must_use]
    pub fn is_handshake(&self) -> bool {
        self.package
            .as_ref()
            .is_some_and(|package| package.tp() == u8::from(RequestType::Auth))
    }

    /// `Created -> Submitted`. Returns the frame to write.
    pub(crate) fn submit(&mut self) -> Result<Package> {
        self.transition(WriteState::Created, WriteState::Submitted)?;
        self.package
            .clone()
            .ok_or(Error::Misuse(Misuse::InvalidTransition {
                from: WriteState::Completed,
                to: WriteState::Submitted,
            }))
    }

    /// `Submitted -> Sent`.
    pub(crate) fn mark_sent(&mut self) -> Result<()> {
        self.transition(WriteState::Submitted, WriteState::Sent)
    }

    /// `* -> Completed`. Releases the frame and completes the request.
    ///
    /// Only the completion funnel calls this.
    pub(crate) fn complete(&mut self, outcome: Result<Response>) -> Result<()> {
        if self.state == WriteState::Completed {
            return Err(Misuse::InvalidTransition {
                from: WriteState::Completed,
                to: WriteState::Completed,
            }
            .into());
        }
        self.state = WriteState::Completed;
        self.package = None;
        self.request.complete(outcome);
        Ok(())
    }

    fn transition(&mut self, from: WriteState, to: WriteState) -> Result<()> {
        if self.state != from {
            return Err(Misuse::InvalidTransition {
                from: self.state,
                to,
            }
            .into());
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::request::RequestStatus;

    fn write(pid: u16, tp: RequestType) -> PendingWrite {
        PendingWrite::new(Request::new(pid, |_| {}), tp, &b"[\"x\"]"[..])
    }

    #[test]
    fn test_frame_carries_request_pid() {
        let write = write(12, RequestType::Query);
        let package = write.package().unwrap();
        assert_eq!(package.pid(), 12);
        assert_eq!(package.tp(), 0);
        assert!(!write.is_handshake());
        assert!(self::write(1, RequestType::Auth).is_handshake());
    }

    #[test]
    fn test_forward_transitions() {
        let mut write = write(1, RequestType::Query);
        assert_eq!(write.state(), WriteState::Created);

        let package = write.submit().unwrap();
        assert_eq!(package.pid(), 1);
        assert_eq!(write.state(), WriteState::Submitted);

        write.mark_sent().unwrap();
        assert_eq!(write.state(), WriteState::Sent);

        write
            .complete(Ok(Response::new(Package::new(1, 0, b"{}"))))
            .unwrap();
        assert_eq!(write.state(), WriteState::Completed);
        assert!(write.package().is_none());
        assert_eq!(write.request().status(), RequestStatus::Succeeded);
    }

    #[test]
    fn test_double_submit_is_misuse() {
        let mut write = write(1, RequestType::Query);
        write.submit().unwrap();
        let err = write.submit().unwrap_err();
        assert_eq!(
            err,
            Error::Misuse(Misuse::InvalidTransition {
                from: WriteState::Submitted,
                to: WriteState::Submitted,
            })
        );
    }

    #[test]
    fn test_sent_requires_submitted() {
        let mut write = write(1, RequestType::Query);
        assert!(write.mark_sent().unwrap_err().is_misuse());
    }

    #[test]
    fn test_complete_from_created_and_only_once() {
        let mut write = write(1, RequestType::Insert);
        write.complete(Err(Error::NotConnected)).unwrap();
        assert!(write.complete(Err(Error::NotConnected)).is_err());
        assert!(write.submit().unwrap_err().is_misuse());
    }
}
