//! Error types for tailor
//!
//! This module defines the two error types that cross the RPC boundary:
//!
//! - **RpcError**: A structured error with a machine-readable [`ErrorCode`],
//!   a human-readable message and string metadata. This is what a server
//!   sends back and what a client inspects to decide whether to retry.
//! - **Error**: The client/transport error type (uses thiserror). Structured
//!   errors received from a server arrive as `Error::Rpc`; everything else
//!   (socket failures, timeouts, decode failures) is a plain error.
//!
//! # Retryable errors
//!
//! A server marks an error as safe to re-attempt by setting the `retryable`
//! metadata key to any non-empty value:
//!
//! ```rust
//! use tailor_core::{ErrorCode, RpcError};
//!
//! let err = RpcError::new(ErrorCode::Unavailable, "try again")
//!     .with_meta("retryable", "true");
//! assert!(err.is_retryable());
//!
//! // An empty value does not count
//! let err = RpcError::unavailable("try again").with_meta("retryable", "");
//! assert!(!err.is_retryable());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Metadata key a server sets to mark an error as retryable
pub const RETRYABLE_META_KEY: &str = "retryable";

/// Metadata key holding the original message of a wrapped handler error
pub const CAUSE_META_KEY: &str = "cause";

/// Result type for tailor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Client and transport error type
///
/// Only the `Rpc` variant carries structured metadata. All other variants
/// are plain errors and are never retried by the client.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Structured error returned by the remote service
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Input/output error
    #[error("IO error: {0}")]
    Io(String),

    /// Unexpected local failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Request operation timeout
    #[error("Request timeout")]
    Timeout,

    /// Connection was closed
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Machine-readable category of an [`RpcError`]
///
/// Serialized as its snake_case wire string. Unrecognised strings decode
/// to [`ErrorCode::Unknown`] so that a newer server cannot break an older
/// client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ErrorCode {
    /// The operation was cancelled
    Canceled,
    /// Unknown error, also used for unrecognised wire codes
    Unknown,
    /// The client specified an invalid argument
    InvalidArgument,
    /// The client sent a message that could not be decoded
    Malformed,
    /// The operation expired before completion
    DeadlineExceeded,
    /// Some requested entity was not found
    NotFound,
    /// The requested method does not exist
    BadRoute,
    /// An attempt to create an entity failed because it already exists
    AlreadyExists,
    /// The caller does not have permission
    PermissionDenied,
    /// The request does not have valid credentials
    Unauthenticated,
    /// Some resource has been exhausted
    ResourceExhausted,
    /// The system is not in a state required for the operation
    FailedPrecondition,
    /// The operation was aborted
    Aborted,
    /// The operation was attempted past the valid range
    OutOfRange,
    /// The operation is not implemented or supported
    Unimplemented,
    /// An invariant expected by the underlying system was broken
    Internal,
    /// The service is currently unavailable
    Unavailable,
    /// Unrecoverable data loss or corruption
    DataLoss,
}

impl ErrorCode {
    /// Every code, in declaration order
    pub const ALL: [ErrorCode; 18] = [
        ErrorCode::Canceled,
        ErrorCode::Unknown,
        ErrorCode::InvalidArgument,
        ErrorCode::Malformed,
        ErrorCode::DeadlineExceeded,
        ErrorCode::NotFound,
        ErrorCode::BadRoute,
        ErrorCode::AlreadyExists,
        ErrorCode::PermissionDenied,
        ErrorCode::Unauthenticated,
        ErrorCode::ResourceExhausted,
        ErrorCode::FailedPrecondition,
        ErrorCode::Aborted,
        ErrorCode::OutOfRange,
        ErrorCode::Unimplemented,
        ErrorCode::Internal,
        ErrorCode::Unavailable,
        ErrorCode::DataLoss,
    ];

    /// The wire representation of this code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Canceled => "canceled",
            ErrorCode::Unknown => "unknown",
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::Malformed => "malformed",
            ErrorCode::DeadlineExceeded => "deadline_exceeded",
            ErrorCode::NotFound => "not_found",
            ErrorCode::BadRoute => "bad_route",
            ErrorCode::AlreadyExists => "already_exists",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::ResourceExhausted => "resource_exhausted",
            ErrorCode::FailedPrecondition => "failed_precondition",
            ErrorCode::Aborted => "aborted",
            ErrorCode::OutOfRange => "out_of_range",
            ErrorCode::Unimplemented => "unimplemented",
            ErrorCode::Internal => "internal",
            ErrorCode::Unavailable => "unavailable",
            ErrorCode::DataLoss => "dataloss",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`ErrorCode::from_str`] for a string that names no code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ErrorCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownErrorCode(s.to_string()))
    }
}

impl From<String> for ErrorCode {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(ErrorCode::Unknown)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

/// Structured RPC error
///
/// Carries a [`ErrorCode`], a message and a map of string metadata. The
/// fields are private: an `RpcError` is assembled with [`RpcError::new`]
/// and [`RpcError::with_meta`] and never changes afterwards.
///
/// # Examples
///
/// ```rust
/// use tailor_core::{ErrorCode, RpcError};
///
/// let err = RpcError::invalid_argument("inches", "I can't make a hat that small!");
/// assert_eq!(err.code(), ErrorCode::InvalidArgument);
/// assert_eq!(err.meta("argument"), Some("inches"));
/// assert_eq!(err.to_string(), "rpc error invalid_argument: inches I can't make a hat that small!");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    code: ErrorCode,
    message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    meta: HashMap<String, String>,
}

impl RpcError {
    /// Create an error with a code and message and no metadata
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            meta: HashMap::new(),
        }
    }

    /// Return this error with one more metadata entry
    ///
    /// An existing value for the same key is replaced.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Internal error (`internal`)
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Wrap an arbitrary error as `internal`
    ///
    /// The message is the wrapped error's rendering, which is also kept
    /// under the `cause` metadata key.
    pub fn internal_with(err: &dyn std::error::Error) -> Self {
        let rendered = err.to_string();
        Self::new(ErrorCode::Internal, rendered.clone()).with_meta(CAUSE_META_KEY, rendered)
    }

    /// Invalid argument error naming the offending argument
    pub fn invalid_argument(argument: impl Into<String>, reason: impl AsRef<str>) -> Self {
        let argument = argument.into();
        Self::new(
            ErrorCode::InvalidArgument,
            format!("{} {}", argument, reason.as_ref()),
        )
        .with_meta("argument", argument)
    }

    /// Unknown method error (`bad_route`)
    pub fn bad_route(method: impl AsRef<str>) -> Self {
        Self::new(
            ErrorCode::BadRoute,
            format!("no handler for method {}", method.as_ref()),
        )
    }

    /// Undecodable message error (`malformed`)
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Malformed, message)
    }

    /// Service unavailable error (`unavailable`), not marked retryable
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unavailable, message)
    }

    /// Error marked as safe to retry
    pub fn retryable(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message).with_meta(RETRYABLE_META_KEY, "true")
    }

    /// The error category
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Look up a metadata value (exact, case-sensitive key)
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    /// All metadata entries
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.meta
    }

    /// Whether the server declared this error safe to retry
    ///
    /// True only when the `retryable` key is present with a non-empty value.
    pub fn is_retryable(&self) -> bool {
        self.meta(RETRYABLE_META_KEY)
            .is_some_and(|value| !value.is_empty())
    }
}

impl fmt::Display for RpcError {
    /// Formats as "rpc error <code>: <message>"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Interpret an error value as a structured [`RpcError`]
///
/// Returns `None` for plain errors. The client's retry loop uses this to
/// tell structured failures apart from transport failures.
pub trait AsRpcError {
    /// The structured error, if this is one
    fn as_rpc_error(&self) -> Option<&RpcError>;
}

impl AsRpcError for RpcError {
    fn as_rpc_error(&self) -> Option<&RpcError> {
        Some(self)
    }
}

impl AsRpcError for Error {
    fn as_rpc_error(&self) -> Option<&RpcError> {
        match self {
            Error::Rpc(err) => Some(err),
            _ => None,
        }
    }
}

/// Find a structured error inside a boxed error
///
/// Looks for an [`RpcError`] directly, or for an [`Error::Rpc`].
pub fn downcast_rpc_error<'a>(
    err: &'a (dyn std::error::Error + Send + Sync + 'static),
) -> Option<&'a RpcError> {
    if let Some(rpc) = err.downcast_ref::<RpcError>() {
        return Some(rpc);
    }
    err.downcast_ref::<Error>().and_then(AsRpcError::as_rpc_error)
}
