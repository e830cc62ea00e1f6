//! callwire client - call remote services as if they were local.
//!
//! ```rust,ignore
//! use callwire_client::RpcClient;
//!
//! let client = RpcClient::new("http://127.0.0.1:8080/api")?;
//! let text: String = client.service("Echo").method("say").call_as(("hi",)).await?;
//! ```
//!
//! Failures reported by the service come back as [`CallError::Remote`],
//! whose message reads `RPC Error: <message> (id: <id>)`. Rejections by the
//! host (unknown service, bad envelope) come back as
//! [`CallError::Transport`] with the HTTP status and plain-text body.

pub mod error;
pub mod proxy;
mod stub;
pub mod transport;

pub use error::{CallError, Result};
pub use proxy::{MethodProxy, RpcClient, ServiceProxy};
pub use transport::{HttpTransport, InProcessTransport, Transport};

pub use callwire_core::{FromRpcValue, IntoArguments, Json, RpcValue, ToRpcValue};
