//! Core types for tailor
//!
//! This crate provides the foundation shared by the tailor client and server:
//!
//! - **Errors**: The structured [`RpcError`] (code, message, metadata) and the
//!   client/transport [`Error`]
//! - **Types**: The [`Request`] / [`Response`] wire envelope
//! - **Codec**: JSON encoding and decoding of those messages
//! - **Context**: The per-request [`RequestContext`] seen by hooks and handlers
//! - **Observability**: Explicit OpenTelemetry setup via [`TelemetryConfig`]
//!
//! # Example
//!
//! ```rust
//! use tailor_core::{codec, ErrorCode, Request, Response, RpcError};
//!
//! let request = Request::new(1, "Haberdasher/MakeHat", Some(serde_json::json!({"inches": 12})));
//! let json = codec::encode_request(&request).unwrap();
//! assert_eq!(codec::decode_request(&json).unwrap(), request);
//!
//! let response = Response::failure(1, RpcError::retryable(ErrorCode::Unavailable, "busy"));
//! assert!(response.into_result().unwrap_err().is_retryable());
//! ```

pub mod codec;
pub mod context;
pub mod error;
pub mod observability;
pub mod types;

pub use context::RequestContext;
pub use error::{
    downcast_rpc_error, AsRpcError, Error, ErrorCode, Result, RpcError, CAUSE_META_KEY,
    RETRYABLE_META_KEY,
};
pub use observability::{init_telemetry, Telemetry, TelemetryConfig, TelemetryError};
pub use types::{Request, Response};
