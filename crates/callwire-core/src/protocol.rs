//! Call and response envelopes.
//!
//! One call envelope goes out per HTTP request and exactly one response
//! envelope comes back:
//!
//! ```text
//! -> {"jsonrpc":"2.0","id":"abc","method":"Echo.say","params":["hi"],"meta":null}
//! <- {"id":"abc","jsonrpc":"2.0","result":"hi"}
//! ```
//!
//! Inbound calls are parsed in stages by [`CallEnvelope::from_slice`] so that
//! a bad protocol version is reported before anything else about the call is
//! looked at.

use crate::codec::{Encoded, Meta};
use crate::config::RpcConfig;
use crate::error::{CallwireError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// `<service>.<method>` split on the first separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub service: String,
    pub method: String,
}

impl Target {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }

    /// Split a target on its first `.`. Both halves must be non-empty.
    pub fn parse(target: &str) -> Option<Self> {
        let (service, method) = target.split_once(RpcConfig::TARGET_SEPARATOR)?;
        if service.is_empty() || method.is_empty() {
            return None;
        }
        Some(Self::new(service, method))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.service, RpcConfig::TARGET_SEPARATOR, self.method)
    }
}

/// Generate a correlation id for a new call.
pub fn new_call_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// JSON-RPC 2.0 call envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: Value,
    #[serde(default)]
    pub meta: Option<Meta>,
}

/// Untyped view of an inbound body; nothing in it is trusted yet.
#[derive(Debug, Deserialize)]
struct RawCall {
    jsonrpc: Option<Value>,
    id: Option<Value>,
    method: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    params: Option<Value>,
    #[serde(default)]
    meta: Option<Value>,
}

impl CallEnvelope {
    /// Create a call envelope with a fresh correlation id.
    pub fn new(target: &Target, params: Encoded) -> Self {
        Self {
            jsonrpc: RpcConfig::PROTOCOL_VERSION.to_string(),
            id: new_call_id(),
            method: target.to_string(),
            params: params.json,
            meta: params.meta,
        }
    }

    /// Parse and validate an inbound request body.
    ///
    /// Order of checks: body is a JSON object, `jsonrpc` is `"2.0"`, `id` is
    /// a string (a missing id is replaced by a generated one), `method` is a
    /// string, `params` is present, `meta` is valid metadata or `null`.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let malformed = |message: String| CallwireError::MalformedRequest {
            id: new_call_id(),
            message,
        };
        let body: Value = serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;
        if !body.is_object() {
            return Err(malformed("body must be a JSON object".to_string()));
        }
        let raw = RawCall::deserialize(&body).map_err(|e| malformed(e.to_string()))?;

        // Best-effort id for diagnostics until the envelope is validated.
        let id = match &raw.id {
            Some(Value::String(id)) => id.clone(),
            _ => new_call_id(),
        };

        match &raw.jsonrpc {
            Some(Value::String(v)) if v == RpcConfig::PROTOCOL_VERSION => {}
            other => {
                return Err(CallwireError::UnsupportedVersion {
                    id,
                    version: match other {
                        Some(Value::String(v)) => v.clone(),
                        Some(v) => v.to_string(),
                        None => "missing".to_string(),
                    },
                })
            }
        }

        if let Some(other) = raw.id.as_ref().filter(|v| !v.is_string()) {
            return Err(CallwireError::MalformedRequest {
                id,
                message: format!("id must be a string, got {}", other),
            });
        }

        let method = match raw.method {
            Some(Value::String(method)) => method,
            _ => {
                return Err(CallwireError::MalformedRequest {
                    id,
                    message: "method must be a string".to_string(),
                })
            }
        };

        let params = raw.params.ok_or_else(|| CallwireError::MalformedRequest {
            id: id.clone(),
            message: "params is required".to_string(),
        })?;

        let meta = match raw.meta {
            Some(meta) => Meta::from_json(&meta)
                .map_err(|source| CallwireError::InvalidParams {
                    id: id.clone(),
                    source,
                })?,
            None => None,
        };

        Ok(Self {
            jsonrpc: RpcConfig::PROTOCOL_VERSION.to_string(),
            id,
            method,
            params,
            meta,
        })
    }

    /// The parsed target, if `method` is well formed.
    pub fn target(&self) -> Option<Target> {
        Target::parse(&self.method)
    }
}

/// JSON-RPC 2.0 response envelope.
///
/// Exactly one of `result` and `error` is set. A `null` result is kept as
/// `Some(Value::Null)` so it can be told apart from a missing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    pub jsonrpc: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

/// Error object of a failed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl ResponseEnvelope {
    /// Create a success response from an encoded return value.
    pub fn success(id: impl Into<String>, result: Encoded) -> Self {
        Self {
            id: id.into(),
            jsonrpc: RpcConfig::PROTOCOL_VERSION.to_string(),
            result: Some(result.json),
            meta: result.meta,
            error: None,
        }
    }

    /// Create a failure response.
    pub fn failure(id: impl Into<String>, code: i32, message: String, data: Value) -> Self {
        Self {
            id: id.into(),
            jsonrpc: RpcConfig::PROTOCOL_VERSION.to_string(),
            result: None,
            meta: None,
            error: Some(ResponseError {
                code,
                message,
                data,
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Deserialize a field that may legitimately be `null` as `Some(Value::Null)`.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
