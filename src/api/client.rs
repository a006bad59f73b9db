//! GraphQL-over-HTTP client for the Stacklet API.
//!
//! One shared [`ApiClient`] is constructed per provider instance. The auth
//! header is injected at construction and the client is never mutated
//! afterwards, so it can be shared read-only across concurrently reconciled
//! resources. Request variables may carry plaintext secrets and are never
//! logged; spans record only the operation name and a request id.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, Instrument};
use url::Url;

use crate::config::ProviderConfig;
use crate::errors::{ProviderError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A GraphQL request body: query document plus variables.
#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

/// One error from the response's `errors` array.
#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

/// Shared client for the remote GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl ApiClient {
    /// Build the client from provider configuration. The API key becomes a
    /// default header marked sensitive so reqwest redacts it from its own
    /// debug output.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose()))
            .map_err(|_| ProviderError::config("API key contains invalid header characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http, endpoint: config.endpoint.clone() })
    }

    /// Execute one GraphQL operation and decode `data` into `T`.
    ///
    /// Remote-signalled failures (non-success HTTP status, entries in the
    /// `errors` array) map to `RemoteReject` with the remote's message. A
    /// success response without `data` is a protocol violation and maps to
    /// `PartialResponse`.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<T> {
        let span = crate::api_span!(operation);
        async move {
            debug!("executing GraphQL operation");

            let response = self
                .http
                .post(self.endpoint.clone())
                .json(&GraphQlRequest { query, variables })
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::remote_reject(format!(
                    "{} returned HTTP {}: {}",
                    operation,
                    status.as_u16(),
                    truncate(&body, 512)
                )));
            }

            let envelope: GraphQlEnvelope<T> = response.json().await?;

            if let Some(errors) = envelope.errors {
                if !errors.is_empty() {
                    let message =
                        errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>().join("; ");
                    return Err(ProviderError::remote_reject(message));
                }
            }

            envelope.data.ok_or_else(|| ProviderError::partial_response(operation))
        }
        .instrument(span)
        .await
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
