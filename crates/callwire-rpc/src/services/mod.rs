//! Services hosted by the binary.

mod clock;
mod echo;

use callwire_core::{Result, ServiceRegistry};
use clock::Clock;
use echo::Echo;

/// Registry with every built-in service.
pub fn default_registry() -> Result<ServiceRegistry> {
    ServiceRegistry::builder()
        .register("Echo", Echo::new)
        .register("Clock", Clock::new)
        .build()
}
