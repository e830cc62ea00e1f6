//! How a call envelope reaches a router.
//!
//! [`HttpTransport`] posts to a remote endpoint. [`InProcessTransport`]
//! hands the serialized envelope straight to a [`ServiceRouter`] in the same
//! process, which keeps the wire format in play without opening a socket.

use crate::error::{CallError, Result};
use async_trait::async_trait;
use callwire_core::{CallEnvelope, ClientConfig, DispatchOutcome, RequestContext, ResponseEnvelope, ServiceRouter};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Delivers one call envelope and returns the response envelope.
///
/// Non-success transport statuses are reported as
/// [`CallError::Transport`]; only a parsed envelope is returned as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, call: &CallEnvelope) -> Result<ResponseEnvelope>;
}

/// JSON over HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: String,
    http_client: Client,
}

impl HttpTransport {
    /// Create a transport for `endpoint` with the default request timeout.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, ClientConfig::REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CallError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }

    /// Use an existing reqwest client, e.g. one with custom headers.
    pub fn with_client(endpoint: impl Into<String>, http_client: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            http_client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, call: &CallEnvelope) -> Result<ResponseEnvelope> {
        debug!("POST {} {} ({})", self.endpoint, call.method, call.id);

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, ClientConfig::CONTENT_TYPE)
            .body(serde_json::to_vec(call)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Routes calls through a [`ServiceRouter`] in this process.
#[derive(Debug, Clone)]
pub struct InProcessTransport {
    router: ServiceRouter,
}

impl InProcessTransport {
    pub fn new(router: ServiceRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(&self, call: &CallEnvelope) -> Result<ResponseEnvelope> {
        let body = serde_json::to_vec(call)?;
        match self.router.dispatch(&body, RequestContext::new()).await {
            DispatchOutcome::Response(response) => {
                // Same bytes a remote caller would see.
                let bytes = serde_json::to_vec(&response)?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            rejected @ DispatchOutcome::Rejected(_) => {
                let status = rejected.status();
                let body = match rejected.into_result() {
                    Err(err) => err.to_string(),
                    Ok(_) => String::new(),
                };
                Err(CallError::Transport { status, body })
            }
        }
    }
}
