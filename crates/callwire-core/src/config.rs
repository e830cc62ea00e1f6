//! Centralized configuration for callwire.
//!
//! Protocol constants shared by the router and the call proxy, plus the
//! defaults used by the HTTP host and transport.

use std::time::Duration;

/// Protocol-level configuration.
pub struct RpcConfig;

impl RpcConfig {
    /// The only accepted value of the envelope's `jsonrpc` field.
    pub const PROTOCOL_VERSION: &'static str = "2.0";

    /// Code carried by every invocation failure envelope.
    ///
    /// A single application-level code rather than the reserved JSON-RPC
    /// numbering; the transport status already separates protocol problems
    /// from failed calls.
    pub const APPLICATION_ERROR_CODE: i32 = 500;

    /// Message used when a failure carries no message of its own.
    pub const FALLBACK_ERROR_MESSAGE: &'static str = "Internal Server Error";

    /// Separator between service and method in the envelope's `method` field.
    pub const TARGET_SEPARATOR: char = '.';

    /// Deepest nesting the codec accepts, in both values and metadata paths.
    ///
    /// Matches the recursion limit of `serde_json`'s parser.
    pub const MAX_NESTING_DEPTH: usize = 128;
}

/// HTTP host configuration.
pub struct ServerConfig;

impl ServerConfig {
    pub const ENDPOINT_PATH: &'static str = "/api";
    pub const HEALTH_PATH: &'static str = "/health";
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024; // 2MB
    pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 256;
}

/// Call proxy configuration.
pub struct ClientConfig;

impl ClientConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONTENT_TYPE: &'static str = "application/json";
}
