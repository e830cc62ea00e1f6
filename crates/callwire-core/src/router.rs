//! Server-side router: one inbound body in, one outcome out.
//!
//! The pipeline is linear and every failure is terminal for the call:
//!
//! 1. parse the call envelope (bad shape or version → 400)
//! 2. split the target, decode params with the codec (→ 400)
//! 3. resolve the service (→ 404)
//! 4. construct the instance with the request context (panic → 500)
//! 5. check the member (missing → 404, not callable → 405)
//! 6. invoke; any failure becomes the response's `error`, status 200
//! 7. encode the return value into `result`/`meta`, status 200
//!
//! Steps 1-5 are rejections ([`DispatchOutcome::Rejected`]) which the host
//! turns into plain-text transport errors. Steps 6-7 always produce a
//! [`ResponseEnvelope`].

use crate::codec::{self, CodecError};
use crate::config::RpcConfig;
use crate::error::{CallwireError, Result};
use crate::protocol::{CallEnvelope, ResponseEnvelope, Target};
use crate::registry::ServiceRegistry;
use crate::service::{MemberKind, RequestContext, ServiceError};
use crate::value::RpcValue;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of routing one request body.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The call was dispatched; the envelope holds a result or an error.
    Response(ResponseEnvelope),
    /// The envelope could not be dispatched.
    Rejected(CallwireError),
}

impl DispatchOutcome {
    /// HTTP status for this outcome.
    pub fn status(&self) -> u16 {
        match self {
            DispatchOutcome::Response(_) => 200,
            DispatchOutcome::Rejected(err) => err.to_rpc_status(),
        }
    }

    pub fn into_result(self) -> std::result::Result<ResponseEnvelope, CallwireError> {
        match self {
            DispatchOutcome::Response(envelope) => Ok(envelope),
            DispatchOutcome::Rejected(err) => Err(err),
        }
    }
}

/// Routes call envelopes to services of a registry.
///
/// Holds no per-request state; share it behind an `Arc` across requests.
#[derive(Debug, Clone)]
pub struct ServiceRouter {
    registry: Arc<ServiceRegistry>,
}

impl ServiceRouter {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Route one raw request body.
    pub async fn dispatch(&self, body: &[u8], ctx: RequestContext) -> DispatchOutcome {
        let call = match CallEnvelope::from_slice(body) {
            Ok(call) => call,
            Err(err) => {
                warn!("Rejected RPC envelope: {}", err);
                return DispatchOutcome::Rejected(err);
            }
        };
        self.dispatch_call(call, ctx).await
    }

    /// Route an already parsed call envelope.
    pub async fn dispatch_call(&self, call: CallEnvelope, ctx: RequestContext) -> DispatchOutcome {
        match self.route(call, ctx).await {
            Ok(response) => DispatchOutcome::Response(response),
            Err(err) => {
                warn!("Rejected RPC call: {}", err);
                DispatchOutcome::Rejected(err)
            }
        }
    }

    async fn route(&self, call: CallEnvelope, ctx: RequestContext) -> Result<ResponseEnvelope> {
        let CallEnvelope {
            jsonrpc,
            id,
            method,
            params,
            meta,
        } = call;

        if jsonrpc != RpcConfig::PROTOCOL_VERSION {
            return Err(CallwireError::UnsupportedVersion { id, version: jsonrpc });
        }

        let Some(target) = Target::parse(&method) else {
            return Err(CallwireError::InvalidTarget { id, target: method });
        };

        let args = match codec::decode(params, meta.as_ref()) {
            Ok(RpcValue::Array(args)) => args,
            Ok(other) => {
                return Err(CallwireError::InvalidParams {
                    id,
                    source: CodecError::TypeMismatch {
                        expected: "argument array".to_string(),
                        found: other.type_name().to_string(),
                    },
                })
            }
            Err(source) => return Err(CallwireError::InvalidParams { id, source }),
        };

        let Some(constructor) = self.registry.resolve(&target.service) else {
            return Err(CallwireError::ServiceNotFound {
                id,
                service: target.service,
            });
        };

        let instance = match std::panic::catch_unwind(AssertUnwindSafe(|| constructor(&ctx))) {
            Ok(instance) => instance,
            Err(payload) => {
                return Err(CallwireError::ServiceConstruction {
                    id,
                    service: target.service,
                    message: panic_message(payload.as_ref())
                        .unwrap_or_else(|| "constructor panicked".to_string()),
                })
            }
        };

        match self.registry.member_kind(instance.as_ref(), &target.method) {
            Some(MemberKind::Method) => {}
            Some(MemberKind::Property) => {
                return Err(CallwireError::MethodNotCallable {
                    id,
                    service: target.service,
                    method: target.method,
                })
            }
            None => {
                return Err(CallwireError::MethodNotFound {
                    id,
                    service: target.service,
                    method: target.method,
                })
            }
        }

        debug!("RPC call {} ({}) with {} args", target, id, args.len());

        let invocation = AssertUnwindSafe(instance.invoke(&target.method, args))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(ServiceError::panicked(panic_message(payload.as_ref()))));

        let encoded = invocation.and_then(|value| codec::encode(&value).map_err(ServiceError::from));

        Ok(match encoded {
            Ok(result) => ResponseEnvelope::success(id, result),
            Err(err) => {
                warn!("RPC call {} ({}) failed: {}", target, id, err);
                let (message, data) = err.into_parts();
                ResponseEnvelope::failure(
                    id,
                    RpcConfig::APPLICATION_ERROR_CODE,
                    message.unwrap_or_else(|| RpcConfig::FALLBACK_ERROR_MESSAGE.to_string()),
                    data,
                )
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
}
