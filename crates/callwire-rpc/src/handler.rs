//! HTTP handlers.

use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use callwire_core::{DispatchOutcome, RequestContext};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Call endpoint: one call envelope in, one response envelope out.
///
/// Dispatched calls answer 200 with the envelope, including failed ones.
/// Rejected calls answer with their status and a plain-text message.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = request_context(connect_info, &headers);

    match state.router.dispatch(&body, ctx).await {
        DispatchOutcome::Response(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        DispatchOutcome::Rejected(err) => {
            let status = StatusCode::from_u16(err.to_rpc_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                err.to_string(),
            )
                .into_response()
        }
    }
}

fn request_context(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: &HeaderMap,
) -> RequestContext {
    let mut ctx = RequestContext::new();
    if let Some(ConnectInfo(addr)) = connect_info {
        ctx = ctx.with_peer_addr(addr);
    }
    for (name, value) in headers {
        // Non-UTF-8 header values are not exposed to services
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    ctx
}
