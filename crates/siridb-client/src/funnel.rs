//! The completion funnel.
//!
//! Every request completes through one of these functions, whether it
//! succeeds, fails on the wire, is rejected before submission, or is torn
//! down with its connection.

use crate::error::Error;
use crate::pending::PendingWrite;
use crate::request::{Request, Response};

/// Complete a write with its matched response.
pub(crate) fn succeed(write: &mut PendingWrite, response: Response) {
    let pid = write.pid();
    let tp = response.tp();
    match write.complete(Ok(response)) {
        Ok(()) => tracing::trace!(pid, tp, "request completed"),
        Err(e) => tracing::warn!(pid, error = %e, "response for an already completed request"),
    }
}

/// Complete a write with an error.
pub(crate) fn fail(write: &mut PendingWrite, error: Error) {
    let pid = write.pid();
    let status = error.status().code();
    tracing::debug!(pid, status, error = %error, "request failed");
    if let Err(e) = write.complete(Err(error)) {
        tracing::warn!(pid, error = %e, "failure for an already completed request");
    }
}

/// Complete a request that never became a write.
pub(crate) fn reject(mut request: Request, error: Error) {
    let pid = request.pid();
    tracing::debug!(pid, status = error.status().code(), error = %error, "request rejected");
    request.complete(Err(error));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Status;
    use crate::pending::WriteState;
    use crate::request::RequestStatus;
    use siridb_codec::Package;
    use siridb_protocol::RequestType;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fail_then_succeed_completes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let request = Request::new(3, move |outcome| {
            assert_eq!(outcome.unwrap_err(), Error::NotConnected);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut write = PendingWrite::new(request, RequestType::Query, &b"[]"[..]);

        fail(&mut write, Error::NotConnected);
        succeed(&mut write, Response::new(Package::new(3, 0, b"{}")));

        assert_eq!(write.state(), WriteState::Completed);
        assert_eq!(
            write.request().status(),
            RequestStatus::Failed(Status::NotConnected)
        );
        drop(write);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reject_delivers_error() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let slot = Arc::clone(&seen);
        reject(
            Request::new(1, move |outcome| *slot.lock() = outcome.err()),
            Error::Encode("bad".into()),
        );
        assert_eq!(*seen.lock(), Some(Error::Encode("bad".into())));
    }
}
