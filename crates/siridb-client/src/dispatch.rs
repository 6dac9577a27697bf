//! Correlation of responses with outstanding requests.

use std::collections::HashMap;

use siridb_codec::Package;

use crate::error::Error;
use crate::funnel;
use crate::pending::PendingWrite;
use crate::request::Response;

/// What became of an inbound package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The package completed the outstanding request with this pid.
    Completed {
        /// Correlation id.
        pid: u16,
        /// Response type tag.
        tp: u8,
    },
    /// No request with this pid was outstanding; the package was dropped.
    Unmatched {
        /// Correlation id.
        pid: u16,
        /// Response type tag.
        tp: u8,
    },
}

/// Outstanding writes keyed by package id.
///
/// Each inbound package resolves at most one entry, and an entry leaves the
/// table on the same step that completes it.
#[derive(Debug, Default)]
pub struct DispatchTable {
    pending: HashMap<u16, PendingWrite>,
}

impl DispatchTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether `pid` is outstanding.
    #[must_use]
    pub fn contains(&self, pid: u16) -> bool {
        self.pending.contains_key(&pid)
    }

    /// Register a sent write. A write whose pid is already outstanding is
    /// handed back untouched.
    pub fn insert(&mut self, write: PendingWrite) -> Result<(), PendingWrite> {
        if self.pending.contains_key(&write.pid()) {
            return Err(write);
        }
        self.pending.insert(write.pid(), write);
        Ok(())
    }

    /// Match an inbound package and complete its request.
    pub fn resolve(&mut self, package: Package) -> Resolution {
        let pid = package.pid();
        let tp = package.tp();
        match self.pending.remove(&pid) {
            Some(mut write) => {
                funnel::succeed(&mut write, Response::new(package));
                Resolution::Completed { pid, tp }
            }
            None => Resolution::Unmatched { pid, tp },
        }
    }

    /// Fail every outstanding write with `error` and empty the table.
    ///
    /// Returns how many writes were failed.
    pub fn fail_all(&mut self, error: &Error) -> usize {
        let count = self.pending.len();
        for (_, mut write) in self.pending.drain() {
            funnel::fail(&mut write, error.clone());
        }
        count
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Status;
    use crate::request::Request;
    use parking_lot::Mutex;
    use siridb_protocol::RequestType;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<(u16, Result<u8, Status>)>>>;

    fn sent_write(log: &Log, pid: u16) -> PendingWrite {
        let log = Arc::clone(log);
        let request = Request::new(pid, move |outcome| {
            log.lock()
                .push((pid, outcome.map(|r| r.tp()).map_err(|e| e.status())));
        });
        let mut write = PendingWrite::new(request, RequestType::Query, &b"[]"[..]);
        write.submit().unwrap();
        write.mark_sent().unwrap();
        write
    }

    #[test]
    fn test_resolve_completes_matching_request() {
        let log = Log::default();
        let mut table = DispatchTable::new();
        table.insert(sent_write(&log, 1)).unwrap();
        table.insert(sent_write(&log, 2)).unwrap();

        let resolution = table.resolve(Package::new(2, 0, b"{}"));
        assert_eq!(resolution, Resolution::Completed { pid: 2, tp: 0 });
        assert_eq!(table.len(), 1);
        assert!(table.contains(1));
        assert_eq!(*log.lock(), vec![(2, Ok(0))]);
    }

    #[test]
    fn test_unmatched_pid_completes_nothing() {
        let log = Log::default();
        let mut table = DispatchTable::new();
        table.insert(sent_write(&log, 1)).unwrap();

        let resolution = table.resolve(Package::new(7, 0, b"{}"));
        assert_eq!(resolution, Resolution::Unmatched { pid: 7, tp: 0 });
        assert_eq!(table.len(), 1);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_second_response_for_same_pid_is_unmatched() {
        let log = Log::default();
        let mut table = DispatchTable::new();
        table.insert(sent_write(&log, 5)).unwrap();

        table.resolve(Package::new(5, 0, b"{}"));
        let again = table.resolve(Package::new(5, 0, b"{}"));
        assert!(matches!(again, Resolution::Unmatched { pid: 5, .. }));
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_duplicate_pid_is_handed_back() {
        let log = Log::default();
        let mut table = DispatchTable::new();
        table.insert(sent_write(&log, 4)).unwrap();

        let rejected = table.insert(sent_write(&log, 4)).unwrap_err();
        assert_eq!(rejected.pid(), 4);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_fail_all_empties_table() {
        let log = Log::default();
        let mut table = DispatchTable::new();
        for pid in 0..5 {
            table.insert(sent_write(&log, pid)).unwrap();
        }

        let failed = table.fail_all(&Error::ConnectionClosed("connection closed".into()));
        assert_eq!(failed, 5);
        assert!(table.is_empty());

        let mut log = log.lock().clone();
        log.sort_by_key(|(pid, _)| *pid);
        assert_eq!(
            log,
            (0..5)
                .map(|pid| (pid, Err(Status::ConnectionClosed)))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_dropping_table_abandons_in_flight_requests() {
        let log = Log::default();
        let mut table = DispatchTable::new();
        table.insert(sent_write(&log, 3)).unwrap();

        drop(table);
        assert_eq!(*log.lock(), vec![(3, Err(Status::Abandoned))]);
    }
}
