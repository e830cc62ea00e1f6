//! The contract between the router and service implementations.
//!
//! A service is constructed per call from a [`RequestContext`], answers
//! whether a member name exists and is callable, and invokes methods with
//! positional [`RpcValue`] arguments. Most services do not implement
//! [`Service`] by hand but declare their methods with [`impl_service!`].
//!
//! [`impl_service!`]: crate::impl_service

use crate::codec::CodecError;
use crate::config::RpcConfig;
use crate::value::{FromRpcValue, RpcValue};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

/// What a member name refers to on a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Callable through the router.
    Method,
    /// Exists but cannot be called.
    Property,
}

/// A service instance, created fresh for every call.
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    /// Look up a member by exact name.
    fn member(&self, name: &str) -> Option<MemberKind>;

    /// Invoke a method with positional arguments.
    ///
    /// Only called for names that [`Service::member`] reports as
    /// [`MemberKind::Method`].
    async fn invoke(&self, method: &str, args: Vec<RpcValue>) -> Result<RpcValue, ServiceError>;
}

/// Per-request data handed to service constructors.
#[derive(Debug, Clone)]
pub struct RequestContext {
    received_at: DateTime<Utc>,
    peer_addr: Option<SocketAddr>,
    /// Header names are stored lower-cased.
    headers: BTreeMap<String, String>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            received_at: Utc::now(),
            peer_addr: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Failure raised by a service method.
///
/// `message` is what the caller sees in `error.message`; `data` is the raw
/// diagnostic value carried in `error.data`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceError {
    message: Option<String>,
    data: Value,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message_or_fallback())
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    /// A failure with a message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            data: json!({"name": "ServiceError", "message": message}),
            message: Some(message),
        }
    }

    /// A failure that carries no message.
    pub fn without_message() -> Self {
        Self {
            message: None,
            data: json!({"name": "ServiceError"}),
        }
    }

    /// Replace the diagnostic payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// An argument could not be converted to the parameter's type.
    pub fn invalid_argument(position: usize, name: &str, source: &CodecError) -> Self {
        let message = format!("Invalid argument {} ({}): {}", position, name, source);
        Self {
            data: json!({
                "name": "ArgumentError",
                "message": message,
                "position": position,
                "parameter": name,
            }),
            message: Some(message),
        }
    }

    /// A panic caught at the invocation boundary.
    pub fn panicked(detail: Option<String>) -> Self {
        Self {
            data: json!({"name": "Panic", "message": detail}),
            message: detail,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The message, or the fixed fallback when there is none.
    pub fn message_or_fallback(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or(RpcConfig::FALLBACK_ERROR_MESSAGE)
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_parts(self) -> (Option<String>, Value) {
        (self.message, self.data)
    }
}

impl From<CodecError> for ServiceError {
    fn from(err: CodecError) -> Self {
        let message = err.to_string();
        let name = match err {
            CodecError::Serialization { .. } => "SerializationError",
            _ => "CodecError",
        };
        Self {
            data: json!({"name": name, "message": message}),
            message: Some(message),
        }
    }
}

/// Positional argument reader used by generated dispatch code.
///
/// Missing trailing arguments read as `Undefined`, so `Option<T>` parameters
/// may be omitted by the caller. Extra arguments are ignored.
#[derive(Debug)]
pub struct Arguments {
    values: std::vec::IntoIter<RpcValue>,
    position: usize,
}

impl Arguments {
    pub fn new(values: Vec<RpcValue>) -> Self {
        Self {
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Read the next argument as `T`.
    pub fn next<T: FromRpcValue>(&mut self, name: &str) -> Result<T, ServiceError> {
        let position = self.position;
        self.position += 1;
        let value = self.values.next().unwrap_or(RpcValue::Undefined);
        T::from_rpc_value(value).map_err(|e| ServiceError::invalid_argument(position, name, &e))
    }
}

/// Implement [`Service`] for a type from a list of its async methods.
///
/// Each listed method must be an inherent `async fn` taking `&self` and
/// returning `Result<T, E>` where `T: ToRpcValue` and `ServiceError:
/// From<E>`. Parameters are converted with `FromRpcValue`. Names listed
/// under `property` exist on the service but are not callable.
///
/// ```rust,ignore
/// struct Echo;
///
/// impl Echo {
///     async fn say(&self, text: String) -> Result<String, ServiceError> {
///         Ok(text)
///     }
/// }
///
/// impl_service! {
///     Echo {
///         async fn say(text: String);
///         property greeting;
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_service {
    (
        $service:ty {
            $( async fn $method:ident ( $( $arg:ident : $arg_ty:ty ),* $(,)? ); )*
            $( property $property:ident; )*
        }
    ) => {
        #[$crate::async_trait]
        impl $crate::Service for $service {
            fn member(&self, name: &str) -> ::std::option::Option<$crate::MemberKind> {
                match name {
                    $( stringify!($method) => ::std::option::Option::Some($crate::MemberKind::Method), )*
                    $( stringify!($property) => ::std::option::Option::Some($crate::MemberKind::Property), )*
                    _ => ::std::option::Option::None,
                }
            }

            #[allow(unused_mut, unused_variables)]
            async fn invoke(
                &self,
                method: &str,
                args: ::std::vec::Vec<$crate::RpcValue>,
            ) -> ::std::result::Result<$crate::RpcValue, $crate::ServiceError> {
                let mut args = $crate::Arguments::new(args);
                match method {
                    $(
                        stringify!($method) => {
                            $( let $arg: $arg_ty = args.next(stringify!($arg))?; )*
                            let output = self.$method($($arg),*).await?;
                            $crate::ToRpcValue::to_rpc_value(&output)
                                .map_err($crate::ServiceError::from)
                        }
                    )*
                    other => ::std::result::Result::Err($crate::ServiceError::new(
                        ::std::format!("{} is not a method", other),
                    )),
                }
            }
        }
    };
}
