// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp messages API.
//!
//! Provides [`HttpBackend`] which handles URL construction, bearer
//! authentication, response unwrapping, and transient error retry for list
//! queries.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use civica_config::model::BackendConfig;
use civica_core::{
    CivicaError, MessageBackend, MessageId, MessagePage, MessageQuery, Recipient, SendReceipt,
};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::types::{ApiErrorBody, ListResponse, SendRequest, SendResponse};

/// REST client implementing [`MessageBackend`].
///
/// List queries are retried on 429 and 5xx responses. Send and retry
/// requests are not idempotent and are never repeated.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    credential: RwLock<Option<String>>,
}

impl HttpBackend {
    /// Creates a client for `config.base_url`, authenticated with `credential` if given.
    pub fn new(config: &BackendConfig, credential: Option<String>) -> Result<Self, CivicaError> {
        let base_url = Url::parse(config.base_url.trim()).map_err(|e| {
            CivicaError::Config(format!("invalid backend.base_url `{}`: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CivicaError::Config(format!(
                "backend.base_url `{}` cannot be used as a base URL",
                config.base_url
            )));
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CivicaError::Backend {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            credential: RwLock::new(credential),
        })
    }

    /// Replaces the bearer credential used for subsequent requests.
    pub fn set_credential(&self, credential: Option<String>) {
        if let Ok(mut guard) = self.credential.write() {
            *guard = credential;
        }
    }

    /// `base_url` with `segments` appended as percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CivicaError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CivicaError::Internal("base URL cannot hold a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> Result<reqwest::RequestBuilder, CivicaError> {
        let mut builder = self.client.request(method, url);
        let credential = self
            .credential
            .read()
            .map_err(|_| CivicaError::Internal("credential lock poisoned".into()))?
            .clone();
        if let Some(token) = credential {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| CivicaError::Config(format!("invalid bearer token: {e}")))?;
            builder = builder.header(AUTHORIZATION, value);
        }
        Ok(builder)
    }

    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, CivicaError> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CivicaError::Timeout {
                    duration: self.timeout,
                }
            } else {
                CivicaError::Backend {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                }
            }
        })
    }
}

#[async_trait]
impl MessageBackend for HttpBackend {
    async fn list_messages(&self, query: &MessageQuery) -> Result<MessagePage, CivicaError> {
        let mut url = self.endpoint(&["whatsapp", "messages"])?;
        url.query_pairs_mut().extend_pairs(query.query_pairs());

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying message list after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let builder = self.request(Method::GET, url.clone())?;
            let response = match self.execute(builder).await {
                Ok(response) => response,
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let status = response.status();
            debug!(status = %status, attempt, page = query.page, "message list response received");

            if status.is_success() {
                let body: ListResponse = decode(response).await?;
                return Ok(MessagePage {
                    messages: body.data.data,
                    total_count: body.data.total_count,
                });
            }

            let err = error_from_response(status, response).await;
            if is_transient_status(status) && attempt < self.max_retries {
                warn!(status = %status, error = %err, "transient error, will retry");
                last_error = Some(err);
                continue;
            }
            return Err(err);
        }

        Err(last_error.unwrap_or_else(|| CivicaError::Backend {
            message: "message list failed after retries".into(),
            source: None,
        }))
    }

    async fn send_messages(&self, recipients: &[Recipient]) -> Result<SendReceipt, CivicaError> {
        let url = self.endpoint(&["whatsapp", "messages", "send"])?;
        let body = SendRequest {
            personas: recipients,
        };
        let response = self
            .execute(self.request(Method::POST, url)?.json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let body: SendResponse = decode(response).await?;
        info!(
            requested = recipients.len(),
            created = body.data.count,
            "send batch accepted"
        );
        Ok(body.data)
    }

    async fn retry_message(&self, id: &MessageId) -> Result<(), CivicaError> {
        let url = self.endpoint(&["whatsapp", "messages", id.as_str(), "retry"])?;
        let response = self.execute(self.request(Method::PATCH, url)?).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }
        info!(message_id = %id, "retry accepted");
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CivicaError> {
    let body = response.text().await.map_err(|e| CivicaError::Backend {
        message: format!("failed to read response body: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| CivicaError::Decode {
        message: format!("failed to parse backend response: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 4xx other than 429 is the backend refusing the request; everything else
/// is a backend failure worth retrying later.
async fn error_from_response(status: StatusCode, response: reqwest::Response) -> CivicaError {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.describe())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("no body").to_string()
            } else {
                body.clone()
            }
        });

    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        CivicaError::Rejected {
            status: status.as_u16(),
            message,
        }
    } else {
        CivicaError::Backend {
            message: format!("backend returned {status}: {message}"),
            source: None,
        }
    }
}

/// HTTP status codes that indicate transient errors worth retrying.
fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}
