//! # siridb-client
//!
//! Async SiriDB connector.
//!
//! The connector speaks SiriDB's framed package protocol over TCP. It
//! authenticates, submits queries and inserts, and routes each response back
//! to the request that caused it by package id.
//!
//! ## Architecture
//!
//! ```text
//! Connection (handle, Clone)
//!     |  Command::Submit / Command::Close   (FIFO channel)
//!     v
//! driver task ── Transport ── TcpStream
//!     |   StreamBuffer reassembly, DispatchTable by pid
//!     v
//! completion funnel ── Request callback / Reply future
//! ```
//!
//! Every operation returns immediately. Each [`Request`] completes exactly
//! once: with a [`Response`] when its package id comes back, or with an
//! [`Error`] when encoding fails, the connection is not up, the call is
//! misuse, or the connection closes while it is outstanding.
//!
//! ## Example
//!
//! ```rust,ignore
//! use siridb_client::{Config, Connection, JsonCodec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_connection_string(
//!         "host=localhost;port=9000;user=iris;password=siri;database=dbtest",
//!     )?;
//!     let connection = Connection::new(config);
//!
//!     let (request, reply) = connection.request_future();
//!     connection.connect(request, &JsonCodec);
//!     if !reply.await?.auth_outcome().is_authenticated() {
//!         return Err("authentication failed".into());
//!     }
//!
//!     let (request, reply) = connection.request_future();
//!     connection.query(request, &JsonCodec, "list series");
//!     println!("{}", reply.await?.decode(&JsonCodec)?);
//!
//!     connection.close(None);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatch;
mod driver;
pub mod error;
mod funnel;
pub mod hooks;
pub mod pending;
pub mod request;
pub mod state;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use config::{Config, Credentials, DEFAULT_PORT};
pub use connection::Connection;
pub use dispatch::{DispatchTable, Resolution};
pub use driver::DEFAULT_CLOSE_REASON;
pub use error::{Error, Misuse, Result, Status, strerror};
pub use hooks::{ConnectionHooks, NoopHooks};
pub use pending::{PendingWrite, WriteState};
pub use request::{AuthOutcome, Callback, Reply, Request, RequestStatus, Response};
pub use state::SessionState;

// Re-export protocol vocabulary for convenience
pub use siridb_codec::Package;
pub use siridb_protocol::{RequestType, ResponseType, errproto};

/// Version of this connector.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
