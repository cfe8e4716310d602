//! Wire types for tailor
//!
//! A call is one [`Request`] answered by one [`Response`] carrying the same
//! `id`. A response holds either a `result` or an `error`, never both; the
//! `error` is a structured [`RpcError`] so its code and metadata survive the
//! trip back to the client.
//!
//! # Examples
//!
//! ```rust
//! use tailor_core::{Request, Response, RpcError};
//! use serde_json::json;
//!
//! let request = Request::new(7, "Haberdasher/MakeHat", Some(json!({"inches": 12})));
//! assert_eq!(request.id, 7);
//!
//! let ok = Response::success(7, json!({"inches": 12}));
//! assert!(ok.is_success());
//!
//! let failed = Response::failure(7, RpcError::internal("boom"));
//! assert!(failed.into_result().is_err());
//! ```

use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A call to a remote method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlates this request with its response
    pub id: u64,
    /// Name of the remote method, e.g. `Haberdasher/MakeHat`
    pub method: String,
    /// Optional parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Relative deadline the caller is willing to wait, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Request {
    /// Create a request with no deadline
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            timeout_ms: None,
        }
    }

    /// Attach a relative deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    /// The deadline as a duration, if one was sent
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// The outcome of a [`Request`]
///
/// Exactly one of `result` and `error` is set. Use the constructors to
/// keep it that way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request this answers
    pub id: u64,
    /// Successful result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Structured failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Successful response
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Failed response
    pub fn failure(id: u64, error: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Build a response from a dispatch outcome
    pub fn from_result(id: u64, outcome: std::result::Result<serde_json::Value, RpcError>) -> Self {
        match outcome {
            Ok(value) => Self::success(id, value),
            Err(err) => Self::failure(id, err),
        }
    }

    /// Check if this is a success response
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Turn the response back into a result
    ///
    /// A success response with no result field yields `null`.
    pub fn into_result(self) -> std::result::Result<serde_json::Value, RpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_request_omits_empty_fields() {
        let request = Request::new(1, "ping", None);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"id": 1, "method": "ping"}));
    }

    #[test]
    fn test_request_timeout() {
        let request = Request::new(1, "ping", None).with_timeout(Duration::from_millis(1500));
        assert_eq!(request.timeout_ms, Some(1500));
        assert_eq!(request.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(Request::new(1, "ping", None).timeout(), None);
    }

    #[test]
    fn test_response_success_has_no_error() {
        let response = Response::success(3, json!({"ok": true}));
        assert!(response.is_success());
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(response.into_result().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_response_failure_keeps_metadata() {
        let err = RpcError::retryable(ErrorCode::Unavailable, "busy");
        let response = Response::failure(3, err.clone());
        assert!(!response.is_success());

        let text = serde_json::to_string(&response).unwrap();
        let decoded: Response = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded.into_result().unwrap_err(), err);
    }

    #[test]
    fn test_success_without_result_is_null() {
        let decoded: Response = serde_json::from_str(r#"{"id":9}"#).unwrap();
        assert_eq!(decoded.into_result().unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_from_result() {
        assert!(Response::from_result(1, Ok(json!(1))).is_success());
        assert!(!Response::from_result(1, Err(RpcError::internal("x"))).is_success());
    }
}
