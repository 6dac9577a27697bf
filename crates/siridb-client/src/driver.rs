//! The per-connection driver task.
//!
//! The driver owns the transport, the stream buffer inside it, the dispatch
//! table and the session state. It multiplexes two event sources: commands
//! from [`Connection`](crate::Connection) handles and reads from the socket.
//! Writes go out in the order commands arrive, inbound packages are
//! dispatched in arrival order.

use std::sync::{Arc, Weak};

use siridb_codec::{CodecError, Package, Transport};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::connection::{Command, Shared};
use crate::dispatch::{DispatchTable, Resolution};
use crate::error::{Error, INVALID_PACKAGE_CLOSE, Misuse};
use crate::funnel;
use crate::hooks::ConnectionHooks;
use crate::pending::PendingWrite;
use crate::state::SessionState;

/// Close reason when none was given.
pub const DEFAULT_CLOSE_REASON: &str = "connection closed";

pub(crate) struct Driver<T>
where
    T: AsyncRead + AsyncWrite,
{
    transport: Transport<T>,
    table: DispatchTable,
    commands: mpsc::UnboundedReceiver<Command>,
    hooks: Arc<dyn ConnectionHooks>,
    shared: Weak<Shared>,
    session: SessionState,
}

impl<T> Driver<T>
where
    T: AsyncRead + AsyncWrite,
{
    pub(crate) fn new(
        transport: Transport<T>,
        commands: mpsc::UnboundedReceiver<Command>,
        hooks: Arc<dyn ConnectionHooks>,
        shared: Weak<Shared>,
    ) -> Self {
        Self {
            transport,
            table: DispatchTable::new(),
            commands,
            hooks,
            shared,
            session: SessionState::Closed,
        }
    }

    /// Send the handshake, then serve commands and reads until closed.
    pub(crate) async fn run(mut self, handshake: PendingWrite) {
        self.session = SessionState::Handshaking {
            pid: handshake.pid(),
        };
        tracing::debug!(pid = handshake.pid(), "sending handshake");
        // No session can follow a handshake that never reached the wire.
        if let Some(error) = self.send(handshake).await {
            self.close(&close_reason(&error));
        }

        while !self.session.is_closed() {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Submit(write)) => self.submit(write).await,
                    Some(Command::Close(reason)) => {
                        self.close(reason.as_deref().unwrap_or(DEFAULT_CLOSE_REASON));
                    }
                    None => self.close(DEFAULT_CLOSE_REASON),
                },
                read = self.transport.read_chunk() => self.on_read(read),
            }
        }

        release(&mut self.commands, &self.shared);
        if let Err(e) = self.transport.shutdown().await {
            tracing::trace!(error = %e, "write half shutdown failed");
        }
    }

    async fn submit(&mut self, mut write: PendingWrite) {
        let admitted = self.session.admit(&write).and_then(|()| {
            if self.table.contains(write.pid()) {
                Err(Misuse::DuplicatePid(write.pid()).into())
            } else {
                Ok(())
            }
        });
        match admitted {
            Ok(()) => {
                if let Some(error) = self.send(write).await {
                    tracing::trace!(error = %error, "write failed");
                }
            }
            Err(e) => funnel::fail(&mut write, e),
        }
    }

    /// Write one package and track it. Returns the error the write failed
    /// with, after completing it.
    async fn send(&mut self, mut write: PendingWrite) -> Option<Error> {
        let package = match write.submit() {
            Ok(package) => package,
            Err(e) => return Some(fail(&mut write, e)),
        };
        let pid = write.pid();
        tracing::debug!(pid, tp = package.tp(), len = package.total_size(), "sending package");

        match self.transport.send(package).await {
            Ok(()) => {
                if let Err(e) = write.mark_sent() {
                    return Some(fail(&mut write, e));
                }
                if let Err(mut write) = self.table.insert(write) {
                    return Some(fail(&mut write, Misuse::DuplicatePid(pid).into()));
                }
                None
            }
            // Rejected by the encoder before any byte hit the wire.
            Err(CodecError::InvalidPackage(e)) => Some(fail(&mut write, e.into())),
            Err(e) => {
                let error = fail(&mut write, Error::from(e));
                self.close(&close_reason(&error));
                Some(error)
            }
        }
    }

    fn on_read(&mut self, read: Result<usize, CodecError>) {
        let error = match read {
            Ok(0) => {
                tracing::debug!("connection closed by peer");
                self.close(DEFAULT_CLOSE_REASON);
                return;
            }
            Ok(n) => match self.on_data(n) {
                Some(error) => error,
                None => return,
            },
            Err(e) => Error::from(e),
        };
        self.close(&close_reason(&error));
    }

    /// Dispatch every package completed by `n` fresh bytes. Returns the
    /// framing error that halted extraction, if any.
    fn on_data(&mut self, n: usize) -> Option<Error> {
        let Self {
            transport,
            table,
            session,
            hooks,
            ..
        } = self;

        for frame in transport.frames(n) {
            match frame {
                Ok(package) => dispatch(table, session, hooks.as_ref(), package),
                Err(e) => return Some(e.into()),
            }
        }
        None
    }

    fn close(&mut self, reason: &str) {
        if self.session.is_closed() {
            return;
        }
        self.session = SessionState::Closed;

        tracing::debug!(reason, outstanding = self.table.len(), "closing connection");
        self.hooks.on_close(reason);
        self.table
            .fail_all(&Error::ConnectionClosed(reason.to_string()));
    }
}

fn dispatch(
    table: &mut DispatchTable,
    session: &mut SessionState,
    hooks: &dyn ConnectionHooks,
    package: Package,
) {
    session.observe(package.pid(), package.tp());
    if let Resolution::Unmatched { pid, tp } = table.resolve(package) {
        tracing::warn!(pid, tp, "received package with no matching request");
        hooks.on_error(&format!("no request found for package id {pid}"));
    }
}

fn fail(write: &mut PendingWrite, error: Error) -> Error {
    funnel::fail(write, error.clone());
    error
}

fn close_reason(error: &Error) -> String {
    match error {
        Error::InvalidPackage(_) => INVALID_PACKAGE_CLOSE.to_string(),
        Error::ConnectionClosed(reason) => reason.clone(),
        other => other.to_string(),
    }
}

/// Detach a finished driver's command channel from its connection and fail
/// whatever was still queued on it.
pub(crate) fn release(commands: &mut mpsc::UnboundedReceiver<Command>, shared: &Weak<Shared>) {
    commands.close();
    if let Some(shared) = shared.upgrade() {
        shared.clear_closed_sender();
    }
    while let Ok(command) = commands.try_recv() {
        if let Command::Submit(mut write) = command {
            funnel::fail(&mut write, Error::NotConnected);
        }
    }
}
