//! Service registry: the fixed mapping from service name to constructor.
//!
//! Built once at start-up through [`ServiceRegistryBuilder`] and never
//! modified afterwards. Lookups are exact and case-sensitive.

use crate::error::{CallwireError, Result};
use crate::service::{MemberKind, RequestContext, Service};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a fresh service instance for one call.
pub type ServiceConstructor = Arc<dyn Fn(&RequestContext) -> Box<dyn Service> + Send + Sync>;

/// Immutable name → constructor mapping.
#[derive(Clone)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceConstructor>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.service_names())
            .finish()
    }
}

impl ServiceRegistry {
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    /// Look up the constructor for a service.
    pub fn resolve(&self, name: &str) -> Option<&ServiceConstructor> {
        self.services.get(name)
    }

    /// Is this name registered?
    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Does `name` exist on the instance, and is it callable?
    pub fn member_kind(&self, instance: &dyn Service, name: &str) -> Option<MemberKind> {
        instance.member(name)
    }

    /// Registered names, sorted.
    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Collects registrations; duplicates are reported by [`build`](Self::build).
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    entries: Vec<(String, ServiceConstructor)>,
}

impl ServiceRegistryBuilder {
    /// Register a service under `name`.
    pub fn register<S, F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        S: Service + 'static,
        F: Fn(&RequestContext) -> S + Send + Sync + 'static,
    {
        let constructor: ServiceConstructor =
            Arc::new(move |ctx: &RequestContext| Box::new(constructor(ctx)) as Box<dyn Service>);
        self.entries.push((name.into(), constructor));
        self
    }

    /// Freeze the registry.
    pub fn build(self) -> Result<ServiceRegistry> {
        let mut services = HashMap::with_capacity(self.entries.len());
        for (name, constructor) in self.entries {
            if name.is_empty() || name.contains(crate::config::RpcConfig::TARGET_SEPARATOR) {
                return Err(CallwireError::InvalidServiceName { name });
            }
            if services.contains_key(&name) {
                return Err(CallwireError::DuplicateService { name });
            }
            services.insert(name, constructor);
        }
        Ok(ServiceRegistry { services })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceError;
    use crate::value::RpcValue;

    struct Ping;

    #[async_trait::async_trait]
    impl Service for Ping {
        fn member(&self, name: &str) -> Option<MemberKind> {
            match name {
                "ping" => Some(MemberKind::Method),
                "label" => Some(MemberKind::Property),
                _ => None,
            }
        }

        async fn invoke(&self, _method: &str, _args: Vec<RpcValue>) -> std::result::Result<RpcValue, ServiceError> {
            Ok(RpcValue::from("pong"))
        }
    }

    fn registry() -> ServiceRegistry {
        ServiceRegistry::builder()
            .register("Ping", |_ctx: &RequestContext| Ping)
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_is_exact() {
        let registry = registry();
        assert!(registry.contains("Ping"));
        assert!(registry.resolve("Ping").is_some());
        assert!(registry.resolve("ping").is_none());
        assert!(registry.resolve("Ping ").is_none());
        assert_eq!(registry.service_names(), vec!["Ping"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_member_kind() {
        let registry = registry();
        let ctor = registry.resolve("Ping").unwrap();
        let instance = ctor(&RequestContext::new());
        assert_eq!(
            registry.member_kind(instance.as_ref(), "ping"),
            Some(MemberKind::Method)
        );
        assert_eq!(
            registry.member_kind(instance.as_ref(), "label"),
            Some(MemberKind::Property)
        );
        assert_eq!(registry.member_kind(instance.as_ref(), "nope"), None);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ServiceRegistry::builder()
            .register("Ping", |_: &RequestContext| Ping)
            .register("Ping", |_: &RequestContext| Ping)
            .build()
            .unwrap_err();
        assert!(matches!(err, CallwireError::DuplicateService { ref name } if name == "Ping"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        for name in ["", "Ping.v2"] {
            let err = ServiceRegistry::builder()
                .register(name, |_: &RequestContext| Ping)
                .build()
                .unwrap_err();
            assert!(matches!(err, CallwireError::InvalidServiceName { .. }));
        }
    }
}
