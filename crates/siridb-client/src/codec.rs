//! Payload codecs.
//!
//! The connector moves opaque payload bytes; turning application values into
//! those bytes and back is the job of a [`Codec`]. The wire format SiriDB
//! speaks natively is `qpack`; [`JsonCodec`] is a serde_json based stand-in
//! for servers and test doubles that accept JSON payloads.

use bytes::Bytes;

use crate::config::Credentials;
use crate::error::Result;

/// Serializes request payloads and deserializes response payloads.
pub trait Codec: Send + Sync {
    /// Decoded response value.
    type Value;

    /// Series data accepted by [`encode_insert`](Self::encode_insert).
    type Series: ?Sized;

    /// Encode the handshake payload.
    fn encode_auth(&self, credentials: &Credentials) -> Result<Bytes>;

    /// Encode a query payload.
    fn encode_query(&self, query: &str) -> Result<Bytes>;

    /// Encode an insert payload.
    fn encode_insert(&self, series: &Self::Series) -> Result<Bytes>;

    /// Decode a response payload of type `tp`.
    fn decode(&self, tp: u8, payload: &[u8]) -> Result<Self::Value>;
}

#[cfg(feature = "json")]
pub use json::JsonCodec;

#[cfg(feature = "json")]
mod json {
    use bytes::Bytes;
    use serde::Serialize;
    use serde_json::Value;

    use super::Codec;
    use crate::config::Credentials;
    use crate::error::{Error, Result};

    /// Handshake payload, serialized as `[username, password, database]`.
    #[derive(Serialize)]
    struct AuthPayload<'a>(&'a str, &'a str, &'a str);

    /// Query payload, serialized as `[query]`.
    #[derive(Serialize)]
    struct QueryPayload<'a>((&'a str,));

    /// JSON payload codec.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct JsonCodec;

    impl JsonCodec {
        /// Create a new JSON codec.
        #[must_use]
        pub fn new() -> Self {
            Self
        }

        fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
            serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(|e| Error::Encode(e.to_string()))
        }
    }

    impl Codec for JsonCodec {
        type Value = Value;
        type Series = Value;

        fn encode_auth(&self, credentials: &Credentials) -> Result<Bytes> {
            Self::encode(&AuthPayload(
                &credentials.username,
                &credentials.password,
                &credentials.database,
            ))
        }

        fn encode_query(&self, query: &str) -> Result<Bytes> {
            Self::encode(&QueryPayload((query,)))
        }

        fn encode_insert(&self, series: &Value) -> Result<Bytes> {
            if !series.is_object() {
                return Err(Error::Encode(
                    "insert data must be an object of series".into(),
                ));
            }
            Self::encode(series)
        }

        fn decode(&self, _tp: u8, payload: &[u8]) -> Result<Value> {
            if payload.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_slice(payload).map_err(|e| Error::Decode(e.to_string()))
        }
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn test_auth_payload_is_array() {
            let bytes = JsonCodec
                .encode_auth(&Credentials::new("iris", "siri", "dbtest"))
                .unwrap();
            assert_eq!(bytes.as_ref(), br#"["iris","siri","dbtest"]"#);
        }

        #[test]
        fn test_query_payload() {
            let bytes = JsonCodec.encode_query("list series").unwrap();
            assert_eq!(bytes.as_ref(), br#"["list series"]"#);
        }

        #[test]
        fn test_insert_requires_object() {
            let ok = JsonCodec.encode_insert(&json!({"cpu": [[1, 0.5]]})).unwrap();
            assert_eq!(ok.as_ref(), br#"{"cpu":[[1,0.5]]}"#);

            let err = JsonCodec.encode_insert(&json!([1, 2])).unwrap_err();
            assert!(matches!(err, Error::Encode(_)));
        }

        #[test]
        fn test_decode() {
            assert_eq!(JsonCodec.decode(0, br#"{"a":1}"#).unwrap(), json!({"a": 1}));
            assert_eq!(JsonCodec.decode(3, b"").unwrap(), Value::Null);
            assert!(matches!(JsonCodec.decode(0, b"{"), Err(Error::Decode(_))));
        }
    }
}
