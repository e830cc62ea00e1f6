//! Echo service: returns what it is given.

use callwire_core::{impl_service, RequestContext, RpcValue, ServiceError};
use tracing::debug;

/// Header a caller may set to change the greeting.
pub const GREETING_HEADER: &str = "x-greeting";

pub struct Echo {
    greeting: String,
}

impl Echo {
    pub fn new(ctx: &RequestContext) -> Self {
        Self {
            greeting: ctx.header(GREETING_HEADER).unwrap_or("Hello").to_string(),
        }
    }

    async fn say(&self, value: RpcValue) -> Result<RpcValue, ServiceError> {
        Ok(value)
    }

    async fn shout(&self, text: String, times: Option<u32>) -> Result<String, ServiceError> {
        let times = times.unwrap_or(1);
        if times > 100 {
            return Err(ServiceError::new(format!("Refusing to shout {} times", times)));
        }
        debug!("{} shouting {:?} x{}", self.greeting, text, times);
        Ok(vec![text.to_uppercase(); times as usize].join(" "))
    }

    async fn fail(&self, message: Option<String>) -> Result<(), ServiceError> {
        Err(match message {
            Some(message) => ServiceError::new(message),
            None => ServiceError::without_message(),
        })
    }
}

impl_service! {
    Echo {
        async fn say(value: RpcValue);
        async fn shout(text: String, times: Option<u32>);
        async fn fail(message: Option<String>);
        property greeting;
    }
}
