//! Connection lifecycle hooks.

/// Callbacks for connection-level events.
///
/// Both methods default to doing nothing. They run on the connection's
/// driver task and should return quickly.
pub trait ConnectionHooks: Send + Sync + 'static {
    /// The connection closed. Called exactly once per established
    /// connection, with the close reason.
    fn on_close(&self, reason: &str) {
        let _ = reason;
    }

    /// A non-fatal anomaly occurred, such as a response nobody waits for.
    fn on_error(&self, message: &str) {
        let _ = message;
    }
}

/// Hooks that ignore every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ConnectionHooks for NoopHooks {}
