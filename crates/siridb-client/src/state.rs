//! Runtime session state of a connection.
//!
//! ## State Transitions
//!
//! ```text
//! Handshaking -> Ready     (auth response with success type)
//! Handshaking -> Rejected  (any other auth response type)
//! *           -> Closed    (close request, EOF, transport or framing error)
//! ```
//!
//! Only the driver task holds this state, so no lock guards it.

use crate::error::{Error, Misuse, Result};
use crate::pending::PendingWrite;
use crate::request::AuthOutcome;

/// Session state as tracked by the connection driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake with this pid is outstanding.
    Handshaking {
        /// Correlation id of the handshake.
        pid: u16,
    },
    /// Authenticated; queries and inserts are accepted.
    Ready,
    /// The server answered the handshake with something other than
    /// success. The connection stays open until the caller closes it.
    Rejected(AuthOutcome),
    /// The connection is closed.
    Closed,
}

impl SessionState {
    /// Check if queries and inserts may be submitted.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if the connection is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Decide whether `write` may be sent in this state.
    pub(crate) fn admit(&self, write: &PendingWrite) -> Result<()> {
        if self.is_closed() {
            return Err(Error::NotConnected);
        }
        if write.is_handshake() {
            return Err(Misuse::AlreadyConnected.into());
        }
        if !self.is_authenticated() {
            return Err(Misuse::NotAuthenticated.into());
        }
        Ok(())
    }

    /// Observe an inbound package, settling the handshake if it answers it.
    pub(crate) fn observe(&mut self, pid: u16, tp: u8) {
        let Self::Handshaking { pid: expected } = *self else {
            return;
        };
        if expected != pid {
            return;
        }

        let outcome = AuthOutcome::from_tp(tp);
        if outcome.is_authenticated() {
            tracing::info!(pid, "authenticated");
            *self = Self::Ready;
        } else {
            tracing::warn!(pid, tp, ?outcome, "authentication rejected");
            *self = Self::Rejected(outcome);
        }
    }
}
