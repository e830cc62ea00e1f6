//! Error types for callwire.
//!
//! `CallwireError` covers everything the router can reject before a service
//! method runs, plus registry construction problems. Failures raised while a
//! method runs are not errors at this level: they become a response
//! envelope's `error` field (see [`crate::ServiceError`]).

use crate::codec::CodecError;
use thiserror::Error;

/// Main error type for the callwire core.
#[derive(Debug, Error)]
pub enum CallwireError {
    // Protocol errors
    #[error("Malformed request: {message} (id: {id})")]
    MalformedRequest { id: String, message: String },

    #[error("Invalid JSON-RPC version: {version} (id: {id})")]
    UnsupportedVersion { id: String, version: String },

    #[error("Invalid method target: {target:?} (id: {id})")]
    InvalidTarget { id: String, target: String },

    #[error("Invalid params: {source} (id: {id})")]
    InvalidParams {
        id: String,
        #[source]
        source: CodecError,
    },

    // Resolution errors
    #[error("Service not found: {service} (id: {id})")]
    ServiceNotFound { id: String, service: String },

    #[error("Method not found: {service}.{method} (id: {id})")]
    MethodNotFound {
        id: String,
        service: String,
        method: String,
    },

    #[error("Method not callable: {service}.{method} (id: {id})")]
    MethodNotCallable {
        id: String,
        service: String,
        method: String,
    },

    #[error("Service construction failed: {service}: {message} (id: {id})")]
    ServiceConstruction {
        id: String,
        service: String,
        message: String,
    },

    // Registry errors
    #[error("Service registered twice: {name}")]
    DuplicateService { name: String },

    #[error("Invalid service name: {name:?}")]
    InvalidServiceName { name: String },

    // Serialization errors
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for callwire operations.
pub type Result<T> = std::result::Result<T, CallwireError>;

impl From<serde_json::Error> for CallwireError {
    fn from(err: serde_json::Error) -> Self {
        CallwireError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl CallwireError {
    /// Convert to the HTTP status the host should answer with.
    ///
    /// - 400: the envelope could not be trusted (shape, version, params)
    /// - 404: unknown service or member
    /// - 405: member exists but is not callable
    /// - 500: anything that is not a per-request rejection
    pub fn to_rpc_status(&self) -> u16 {
        match self {
            CallwireError::MalformedRequest { .. }
            | CallwireError::UnsupportedVersion { .. }
            | CallwireError::InvalidTarget { .. }
            | CallwireError::InvalidParams { .. } => 400,

            CallwireError::ServiceNotFound { .. } | CallwireError::MethodNotFound { .. } => 404,

            CallwireError::MethodNotCallable { .. } => 405,

            CallwireError::ServiceConstruction { .. } => 500,

            _ => 500,
        }
    }

    /// The correlation id of the rejected call, when there was one.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            CallwireError::MalformedRequest { id, .. }
            | CallwireError::UnsupportedVersion { id, .. }
            | CallwireError::InvalidTarget { id, .. }
            | CallwireError::InvalidParams { id, .. }
            | CallwireError::ServiceNotFound { id, .. }
            | CallwireError::MethodNotFound { id, .. }
            | CallwireError::MethodNotCallable { id, .. }
            | CallwireError::ServiceConstruction { id, .. } => Some(id),
            _ => None,
        }
    }
}
