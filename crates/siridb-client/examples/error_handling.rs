//! Error handling and reconnect example.
//!
//! This example shows how completions report failures and how to retry
//! on transient errors by reconnecting the same handle.
//!
//! # Running
//!
//! ```bash
//! export SIRIDB_HOST=localhost
//! export SIRIDB_DATABASE=dbtest
//!
//! cargo run --example error_handling
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use siridb_client::{
    AuthOutcome, Config, Connection, ConnectionHooks, Error, JsonCodec, Status, strerror,
};

struct LogHooks;

impl ConnectionHooks for LogHooks {
    fn on_close(&self, reason: &str) {
        println!("connection closed: {reason}");
    }

    fn on_error(&self, message: &str) {
        println!("connection anomaly: {message}");
    }
}

/// Connect and authenticate, retrying transient failures with backoff.
async fn connect_with_retry(connection: &Connection, max_retries: u32) -> Result<(), Error> {
    let mut attempt = 0;
    loop {
        let (request, reply) = connection.request_future();
        connection.connect(request, &JsonCodec);

        match reply.await {
            Ok(response) => {
                return match response.auth_outcome() {
                    AuthOutcome::Authenticated => Ok(()),
                    AuthOutcome::InvalidCredentials => {
                        Err(Error::Config("invalid credentials".into()))
                    }
                    AuthOutcome::UnknownDatabase => Err(Error::Config("unknown database".into())),
                    AuthOutcome::Other(tp) => Err(Error::Config(format!(
                        "unexpected handshake response: {}",
                        siridb_client::errproto(tp)
                    ))),
                };
            }
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let delay = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                println!("attempt {attempt} failed ({e}), retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Numeric status codes can be described without an error value.
    for status in [Status::NotConnected, Status::InvalidPackage, Status::Misuse] {
        println!("{:>4}: {}", status.code(), strerror(status.code()));
    }

    let host = std::env::var("SIRIDB_HOST").unwrap_or_else(|_| "localhost".into());
    let database = std::env::var("SIRIDB_DATABASE").unwrap_or_else(|_| "dbtest".into());
    let config = Config::new()
        .host(host)
        .database(database)
        .connect_timeout(Duration::from_secs(2));
    let connection = Connection::with_hooks(config, LogHooks);

    // Submitting before connecting fails without touching the network.
    let (request, reply) = connection.request_future();
    connection.query(request, &JsonCodec, "list series");
    let err = reply.await.unwrap_err();
    println!("query before connect: {err} (status {})", err.status().code());

    match connect_with_retry(&connection, 3).await {
        Ok(()) => println!("authenticated"),
        Err(e) => {
            println!("giving up: {e}");
            return;
        }
    }

    // Server-side errors arrive as successful completions with an error type.
    let (request, reply) = connection.request_future();
    connection.query(request, &JsonCodec, "this is not a query");
    match reply.await {
        Ok(response) if response.is_error() => {
            println!("server error: {}", response.error_description());
        }
        Ok(_) => println!("unexpectedly succeeded"),
        Err(e) => println!("request failed: {e}"),
    }

    connection.close(Some("example finished"));
}
