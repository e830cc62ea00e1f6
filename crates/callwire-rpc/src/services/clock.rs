//! Clock service: hands out and shifts dates.

use callwire_core::{impl_service, RequestContext, RpcValue, ServiceError};
use chrono::{DateTime, Datelike, Duration, Utc};

pub struct Clock {
    received_at: DateTime<Utc>,
}

impl Clock {
    pub fn new(ctx: &RequestContext) -> Self {
        Self {
            received_at: ctx.received_at(),
        }
    }

    async fn now(&self) -> Result<RpcValue, ServiceError> {
        Ok(RpcValue::object([("message", RpcValue::Date(Utc::now()))]))
    }

    async fn shift(&self, at: DateTime<Utc>, seconds: i64) -> Result<DateTime<Utc>, ServiceError> {
        Duration::try_seconds(seconds)
            .and_then(|delta| at.checked_add_signed(delta))
            .ok_or_else(|| ServiceError::new(format!("Cannot shift {} by {}s", at, seconds)))
    }

    async fn describe(&self, at: Option<DateTime<Utc>>) -> Result<RpcValue, ServiceError> {
        let at = at.unwrap_or(self.received_at);
        Ok(RpcValue::object([
            ("at", RpcValue::Date(at)),
            ("weekday", RpcValue::from(at.weekday().to_string())),
            ("unix_ms", RpcValue::BigInt(at.timestamp_millis() as i128)),
            ("received_at", RpcValue::Date(self.received_at)),
        ]))
    }
}

impl_service! {
    Clock {
        async fn now();
        async fn shift(at: DateTime<Utc>, seconds: i64);
        async fn describe(at: Option<DateTime<Utc>>);
        property received_at;
    }
}
