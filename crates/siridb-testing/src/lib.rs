//! # siridb-testing
//!
//! Test infrastructure for SiriDB connector development.
//!
//! ## Features
//!
//! - Mock SiriDB server over real TCP (no database required)
//! - Failure injection: fragmented writes, stray packages, garbage bytes,
//!   abrupt closes
//! - Test fixture utilities
//!
//! ## Mock Server Example
//!
//! ```rust,ignore
//! use siridb_client::{Connection, JsonCodec};
//! use siridb_testing::mock_server::{MockResponse, MockSiriServer};
//!
//! #[tokio::test]
//! async fn test_with_mock_server() {
//!     let server = MockSiriServer::builder()
//!         .with_response("count series", MockResponse::query(json!({"series": 3})))
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let connection = Connection::new(server.client_config());
//!     let (request, reply) = connection.request_future();
//!     connection.connect(request, &JsonCodec);
//!     assert!(reply.await.unwrap().auth_outcome().is_authenticated());
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_server;

pub use fixtures::TestSeries;
pub use mock_server::{
    MockResponse, MockServerBuilder, MockServerConfig, MockServerError, MockSiriServer,
};
