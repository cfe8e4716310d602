//! Codec for tailor messages
//!
//! Messages travel as JSON text. Encoding failures and client-side decode
//! failures surface as `Error::Serialization`. On the server side an
//! undecodable request becomes an [`RpcError`] with code `malformed` so it
//! can still be answered; [`request_id_hint`] recovers the id from a request
//! that failed to decode, when there is one.
//!
//! # Examples
//!
//! ```rust
//! use tailor_core::{codec, Request};
//!
//! let request = Request::new(1, "Haberdasher/MakeHat", None);
//! let json = codec::encode_request(&request).unwrap();
//!
//! let decoded = codec::decode_request(&json).unwrap();
//! assert_eq!(decoded.method, "Haberdasher/MakeHat");
//! ```

use crate::error::{Error, Result, RpcError};
use crate::types::{Request, Response};
use serde::{Deserialize, Serialize};

/// Encode any serializable message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a JSON string into a specific type
pub fn decode_as<'de, T: Deserialize<'de>>(data: &'de str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a request
pub fn encode_request(req: &Request) -> Result<String> {
    encode(req)
}

/// Encode a response
pub fn encode_response(resp: &Response) -> Result<String> {
    encode(resp)
}

/// Decode a request on the server side
///
/// # Errors
///
/// Returns a `malformed` [`RpcError`] describing why the text is not a
/// request.
pub fn decode_request(data: &str) -> std::result::Result<Request, RpcError> {
    serde_json::from_str(data)
        .map_err(|e| RpcError::malformed(format!("failed to decode request: {}", e)))
}

/// Decode a response on the client side
pub fn decode_response(data: &str) -> Result<Response> {
    decode_as(data)
}

/// Best-effort extraction of the `id` of a request that failed to decode
pub fn request_id_hint(data: &str) -> Option<u64> {
    #[derive(Deserialize)]
    struct IdOnly {
        id: u64,
    }

    serde_json::from_str::<IdOnly>(data).ok().map(|v| v.id)
}
