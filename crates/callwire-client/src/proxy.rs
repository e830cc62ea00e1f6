//! Call proxy: `client.service("Echo").method("say").call(("hi",))`.
//!
//! Service and method proxies are cheap handles that only carry names; every
//! call builds a fresh envelope with a new correlation id and sends it
//! through the client's transport.

use crate::error::{CallError, Result};
use crate::transport::{HttpTransport, InProcessTransport, Transport};
use callwire_core::{
    codec, CallEnvelope, FromRpcValue, IntoArguments, RpcValue, ServiceRouter, Target,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Entry point for calling remote services.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient").finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Client posting to `endpoint` over HTTP.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new(endpoint)?))
    }

    /// Client calling a router in this process.
    pub fn in_process(router: ServiceRouter) -> Self {
        Self::with_transport(InProcessTransport::new(router))
    }

    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Proxy for the service registered under `name`.
    ///
    /// No request is made until a method is called.
    pub fn service(&self, name: impl Into<String>) -> ServiceProxy {
        ServiceProxy {
            client: self.clone(),
            name: name.into(),
        }
    }

    async fn post(&self, target: &Target, args: Vec<RpcValue>) -> Result<RpcValue> {
        let params = codec::encode(&RpcValue::Array(args))?;
        let call = CallEnvelope::new(target, params);
        debug!("Calling {} ({})", target, call.id);

        let response = self.transport.send(&call).await?;
        if response.id != call.id {
            warn!(
                "Response id {} does not match call id {} for {}",
                response.id, call.id, target
            );
        }

        if let Some(error) = response.error {
            return Err(CallError::remote(response.id, error));
        }

        match response.result {
            Some(json) => Ok(codec::decode(json, response.meta.as_ref())?),
            None => Ok(RpcValue::Undefined),
        }
    }
}

/// Handle for one named service.
#[derive(Debug, Clone)]
pub struct ServiceProxy {
    client: RpcClient,
    name: String,
}

impl ServiceProxy {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Proxy for a method of this service.
    pub fn method(&self, name: impl Into<String>) -> MethodProxy {
        MethodProxy {
            client: self.client.clone(),
            target: Target::new(self.name.clone(), name),
        }
    }
}

/// Handle for one `<service>.<method>` target.
#[derive(Debug, Clone)]
pub struct MethodProxy {
    client: RpcClient,
    target: Target,
}

impl MethodProxy {
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Call the method and return the decoded result.
    ///
    /// Arguments are positional: pass `()` for none, a tuple for several,
    /// or a `Vec<RpcValue>` built by hand.
    pub async fn call<A: IntoArguments>(&self, args: A) -> Result<RpcValue> {
        self.client.post(&self.target, args.into_arguments()?).await
    }

    /// Call the method and convert the result to `T`.
    pub async fn call_as<T: FromRpcValue, A: IntoArguments>(&self, args: A) -> Result<T> {
        let value = self.call(args).await?;
        Ok(T::from_rpc_value(value)?)
    }
}
