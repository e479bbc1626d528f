//! HTTP resolver for a remote answering service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ResolveError};
use crate::input::Query;
use crate::resolver::ResponseResolver;

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    answer: String,
}

/// Error body of the answering service, e.g. `{"detail": "Invalid input"}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Posts `{"query": ...}` to an endpoint and reads `{"answer": ...}` back.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpResolver {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ChatError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ChatError::Config(format!("invalid resolver endpoint {:?}: {}", endpoint, e))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("knowledge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn map_send_error(&self, err: reqwest::Error) -> ResolveError {
        if err.is_timeout() {
            ResolveError::Timeout(self.timeout)
        } else {
            ResolveError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl ResponseResolver for HttpResolver {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn resolve(&self, query: &Query) -> Result<String, ResolveError> {
        tracing::debug!(endpoint = %self.endpoint, "Requesting answer");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&AskRequest {
                query: query.as_str(),
            })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Answer request failed");
                self.map_send_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.detail)
                .unwrap_or(body);
            tracing::warn!(
                status = status.as_u16(),
                detail = %detail,
                "Answering service returned an error"
            );
            return Err(ResolveError::Service {
                status: status.as_u16(),
                detail,
            });
        }

        let body: AskResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ResolveError::Timeout(self.timeout)
            } else {
                ResolveError::MalformedResponse(e.to_string())
            }
        })?;
        Ok(body.answer)
    }
}
