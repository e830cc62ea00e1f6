//! Errors surfaced to callers of a proxied method.

use callwire_core::{CodecError, ResponseError};
use serde_json::Value;
use thiserror::Error;

/// Failure of a single proxied call.
#[derive(Error, Debug)]
pub enum CallError {
    /// The service ran and reported a failure in the response envelope.
    #[error("RPC Error: {message} (id: {id})")]
    Remote {
        id: String,
        code: i32,
        message: String,
        data: Value,
    },

    /// The server answered with a non-success HTTP status.
    #[error("Transport error: HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    /// The request never produced an HTTP response.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Arguments or result could not be converted.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The response body was not a valid envelope.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

pub type Result<T> = std::result::Result<T, CallError>;

impl CallError {
    pub(crate) fn remote(id: String, error: ResponseError) -> Self {
        CallError::Remote {
            id,
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }

    /// Correlation id of the failed call, when the server reported one.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            CallError::Remote { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Diagnostic payload of a remote failure.
    pub fn data(&self) -> Option<&Value> {
        match self {
            CallError::Remote { data, .. } => Some(data),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return CallError::InvalidResponse {
                message: err.to_string(),
            };
        }
        CallError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CallError {
    fn from(err: serde_json::Error) -> Self {
        CallError::InvalidResponse {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_display() {
        let err = CallError::remote(
            "abc".to_string(),
            ResponseError {
                code: 500,
                message: "boom".to_string(),
                data: json!({"name": "ServiceError"}),
            },
        );
        assert_eq!(err.to_string(), "RPC Error: boom (id: abc)");
        assert_eq!(err.call_id(), Some("abc"));
        assert_eq!(err.data().unwrap()["name"], "ServiceError");
    }

    #[test]
    fn test_transport_display() {
        let err = CallError::Transport {
            status: 404,
            body: "Service not found: Missing (id: x)".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("Missing"));
        assert_eq!(err.call_id(), None);
        assert!(err.data().is_none());
    }

    #[test]
    fn test_codec_is_transparent() {
        let err = CallError::from(CodecError::TypeMismatch {
            expected: "string".to_string(),
            found: "integer".to_string(),
        });
        assert_eq!(
            err.to_string(),
            CodecError::TypeMismatch {
                expected: "string".to_string(),
                found: "integer".to_string(),
            }
            .to_string()
        );
    }
}
