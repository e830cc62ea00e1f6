//! Call proxy against an in-process router.

use callwire_client::{client_stub, CallError, HttpTransport, RpcClient, RpcValue, Transport};
use callwire_core::{
    impl_service, CallEnvelope, Meta, RequestContext, ResponseEnvelope, ServiceError,
    ServiceRegistry, ServiceRouter, TypeTag,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::collections::BTreeSet;

struct Echo;

impl Echo {
    async fn say(&self, value: RpcValue) -> Result<RpcValue, ServiceError> {
        Ok(value)
    }

    async fn shout(&self, text: String, times: Option<u32>) -> Result<String, ServiceError> {
        Ok(text.to_uppercase().repeat(times.unwrap_or(1) as usize))
    }

    async fn fail(&self, message: String) -> Result<(), ServiceError> {
        Err(ServiceError::new(message).with_data(json!({"code": "E_FAIL"})))
    }

    async fn later(&self, at: DateTime<Utc>, seconds: i64) -> Result<DateTime<Utc>, ServiceError> {
        Ok(at + Duration::seconds(seconds))
    }

    async fn nothing(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

impl_service! {
    Echo {
        async fn say(value: RpcValue);
        async fn shout(text: String, times: Option<u32>);
        async fn fail(message: String);
        async fn later(at: DateTime<Utc>, seconds: i64);
        async fn nothing();
        property greeting;
    }
}

client_stub! {
    /// Typed view of the test Echo service.
    pub struct EchoClient for "Echo" {
        async fn shout(text: String, times: Option<u32>) -> String;
        async fn later(at: DateTime<Utc>, seconds: i64) -> DateTime<Utc>;
        async fn fail(message: String) -> ();
    }
}

fn client() -> RpcClient {
    let registry = ServiceRegistry::builder()
        .register("Echo", |_: &RequestContext| Echo)
        .build()
        .unwrap();
    RpcClient::in_process(ServiceRouter::new(registry))
}

#[tokio::test]
async fn test_call_returns_decoded_result() {
    let client = client();
    let out = client
        .service("Echo")
        .method("say")
        .call(("hi",))
        .await
        .unwrap();
    assert_eq!(out, RpcValue::from("hi"));

    let text: String = client
        .service("Echo")
        .method("shout")
        .call_as(("hey", 2u32))
        .await
        .unwrap();
    assert_eq!(text, "HEYHEY");
}

#[tokio::test]
async fn test_rich_values_survive_the_round_trip() {
    let client = client();
    let tags: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
    let value = RpcValue::object([
        ("when", RpcValue::Date(Utc.with_ymd_and_hms(2021, 6, 1, 8, 30, 0).unwrap())),
        ("big", RpcValue::BigInt(-(1 << 100))),
        ("nan", RpcValue::Float(f64::NAN)),
        ("missing", RpcValue::Undefined),
        (
            "lookup",
            RpcValue::Map(vec![(RpcValue::Integer(1), RpcValue::from("one"))]),
        ),
    ]);

    let out = client
        .service("Echo")
        .method("say")
        .call((value.clone(),))
        .await
        .unwrap();
    assert_eq!(out, value);

    let back: BTreeSet<String> = client
        .service("Echo")
        .method("say")
        .call_as((tags.clone(),))
        .await
        .unwrap();
    assert_eq!(back, tags);
}

#[tokio::test]
async fn test_unit_result_is_undefined() {
    let client = client();
    let out = client
        .service("Echo")
        .method("nothing")
        .call(())
        .await
        .unwrap();
    assert_eq!(out, RpcValue::Undefined);
}

#[tokio::test]
async fn test_remote_failure_carries_message_and_id() {
    let client = client();
    let err = client
        .service("Echo")
        .method("fail")
        .call(("boom",))
        .await
        .unwrap_err();

    let id = err.call_id().unwrap().to_string();
    let text = err.to_string();
    assert!(text.starts_with("RPC Error: boom"));
    assert!(text.contains(&id));
    assert_eq!(err.data().unwrap()["code"], "E_FAIL");
    match err {
        CallError::Remote { code, .. } => assert_eq!(code, 500),
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejections_are_transport_errors() {
    let client = client();

    let err = client
        .service("Missing")
        .method("say")
        .call(())
        .await
        .unwrap_err();
    match err {
        CallError::Transport { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("Missing"));
        }
        other => panic!("expected transport error, got {:?}", other),
    }

    let err = client
        .service("Echo")
        .method("greeting")
        .call(())
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Transport { status: 405, .. }));
}

#[tokio::test]
async fn test_result_type_mismatch_is_codec_error() {
    let client = client();
    let err = client
        .service("Echo")
        .method("say")
        .call_as::<i64, _>(("not a number",))
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Codec(_)));
}

#[tokio::test]
async fn test_stub_methods() {
    let client = client();
    let echo = EchoClient::new(&client);

    assert_eq!(echo.shout("a".to_string(), None).await.unwrap(), "A");
    assert_eq!(echo.shout("a".to_string(), Some(3)).await.unwrap(), "AAA");

    let at = Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 0).unwrap();
    assert_eq!(echo.later(at, 60).await.unwrap(), at + Duration::seconds(60));

    let err = echo.fail("nope".to_string()).await.unwrap_err();
    assert!(err.to_string().starts_with("RPC Error: nope (id: "));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_keep_their_results() {
    let client = client();
    let calls = (0..32).map(|i| {
        let method = client.service("Echo").method("say");
        async move { method.call_as::<i64, _>((i as i64,)).await }
    });

    let results = futures::future::join_all(calls).await;
    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), i as i64);
    }
}

#[tokio::test]
async fn test_http_transport_unreachable_endpoint() {
    // Nothing listens on port 1
    let transport =
        HttpTransport::with_timeout("http://127.0.0.1:1/api", std::time::Duration::from_secs(2))
            .unwrap();
    let client = RpcClient::with_transport(transport);

    let err = client
        .service("Echo")
        .method("say")
        .call(("hi",))
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Network { .. }));
    assert_eq!(err.call_id(), None);
}

/// Answers every call with a fixed result and metadata.
struct CannedTransport {
    meta: Meta,
}

#[async_trait::async_trait]
impl Transport for CannedTransport {
    async fn send(&self, call: &CallEnvelope) -> callwire_client::Result<ResponseEnvelope> {
        Ok(ResponseEnvelope {
            id: call.id.clone(),
            jsonrpc: "2.0".to_string(),
            result: Some(json!([])),
            meta: Some(self.meta.clone()),
            error: None,
        })
    }
}

#[tokio::test]
async fn test_deep_response_meta_is_codec_error() {
    let meta = Meta {
        root: None,
        values: [(".".repeat(200_000), TypeTag::Date)].into_iter().collect(),
    };
    let client = RpcClient::with_transport(CannedTransport { meta });

    let err = client
        .service("Echo")
        .method("say")
        .call(())
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Codec(_)));
}
