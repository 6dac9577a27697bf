//! Basic connection, query and insert example.
//!
//! # Running
//!
//! ```bash
//! # Set connection details via environment variables
//! export SIRIDB_HOST=localhost
//! export SIRIDB_DATABASE=dbtest
//! export SIRIDB_USER=iris
//! export SIRIDB_PASSWORD=siri
//!
//! cargo run --example basic
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use siridb_client::{Config, Connection, Error, JsonCodec};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let host = std::env::var("SIRIDB_HOST").unwrap_or_else(|_| "localhost".into());
    let database = std::env::var("SIRIDB_DATABASE").unwrap_or_else(|_| "dbtest".into());
    let user = std::env::var("SIRIDB_USER").unwrap_or_else(|_| "iris".into());
    let password = std::env::var("SIRIDB_PASSWORD").unwrap_or_else(|_| "siri".into());

    let config = Config::from_connection_string(&format!(
        "host={host};user={user};password={password};database={database}"
    ))?;

    println!("siridb-client {}", siridb_client::version());
    println!("Connecting to SiriDB at {}...", config.addr());

    let connection = Connection::new(config);
    let codec = JsonCodec::new();

    let (request, reply) = connection.request_future();
    connection.connect(request, &codec);
    let auth = reply.await?;
    if !auth.auth_outcome().is_authenticated() {
        println!("Authentication failed: {}", auth.error_description());
        return Ok(());
    }
    println!("Connected successfully!");

    // Insert two points into a series
    let (request, reply) = connection.request_future();
    connection.insert(
        request,
        &codec,
        &json!({ "example-series": [[1_700_000_000, 1.5], [1_700_000_010, 2.5]] }),
    );
    println!("Insert: {}", reply.await?.decode(&codec)?);

    // Callbacks work as well as futures
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let request = connection.request_with(done_tx, |done, outcome| {
        match outcome {
            Ok(response) if response.is_error() => {
                println!("Query error: {}", response.error_description());
            }
            Ok(response) => println!("Query returned {} bytes", response.payload().len()),
            Err(e) => println!("Query failed: {e}"),
        }
        let _ = done.send(());
    });
    connection.query(request, &codec, "select * from 'example-series'");
    done_rx.await.unwrap();

    connection.close(None);
    println!("Connection closed.");

    Ok(())
}
