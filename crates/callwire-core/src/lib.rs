//! callwire core - envelopes, typed value codec, service registry and router.
//!
//! This crate holds everything both ends of a callwire connection share, plus
//! the transport-independent server half. The HTTP host lives in
//! `callwire-rpc` and the call proxy in `callwire-client`.
//!
//! # Example
//!
//! ```rust,ignore
//! use callwire_core::{impl_service, RequestContext, ServiceError, ServiceRegistry, ServiceRouter};
//!
//! struct Echo;
//!
//! impl Echo {
//!     async fn say(&self, text: String) -> Result<String, ServiceError> {
//!         Ok(text)
//!     }
//! }
//!
//! impl_service! {
//!     Echo {
//!         async fn say(text: String);
//!     }
//! }
//!
//! let registry = ServiceRegistry::builder()
//!     .register("Echo", |_: &RequestContext| Echo)
//!     .build()?;
//! let router = ServiceRouter::new(registry);
//!
//! let body = br#"{"jsonrpc":"2.0","id":"abc","method":"Echo.say","params":["hi"]}"#;
//! let outcome = router.dispatch(body, RequestContext::new()).await;
//! assert_eq!(outcome.status(), 200);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod service;
pub mod value;

// Re-export commonly used types
pub use codec::{decode, encode, CodecError, Encoded, Meta, TypeTag};
pub use config::{ClientConfig, RpcConfig, ServerConfig};
pub use error::{CallwireError, Result};
pub use protocol::{CallEnvelope, ResponseEnvelope, ResponseError, Target};
pub use registry::{ServiceConstructor, ServiceRegistry, ServiceRegistryBuilder};
pub use router::{DispatchOutcome, ServiceRouter};
pub use service::{Arguments, MemberKind, RequestContext, Service, ServiceError};
pub use value::{FromRpcValue, IntoArguments, Json, RpcValue, ToRpcValue};

// Used by `impl_service!` expansions in downstream crates.
pub use async_trait::async_trait;
