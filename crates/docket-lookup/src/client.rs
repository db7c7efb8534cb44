//! HTTP client for the upstream data-sharing API.
//!
//! All endpoints are JSON POSTs answering with a `{code, message, data}`
//! envelope; `code == 200` means success. Requests use a fixed timeout
//! (30 seconds by default); there is no retry.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::{LookupError, LookupResult};

/// Envelope wrapping every upstream response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    /// Upstream status code; 200 is success.
    pub code: i64,
    /// Optional human-readable status message.
    pub message: Option<String>,
    /// Payload; shape depends on the endpoint.
    pub data: Option<Value>,
}

impl ApiEnvelope {
    /// Whether the envelope reports success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    /// The status message, or a placeholder when the upstream sent none.
    #[must_use]
    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or("no message")
    }
}

/// Thin JSON-POST client over the upstream base URL.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Builds a client from the upstream configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &UpstreamConfig) -> LookupResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| LookupError::upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POSTs `body` to `path` with the given extra headers and decodes the
    /// response envelope.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Upstream`] on transport failure, a non-2xx
    /// HTTP status, or an undecodable body. Envelope codes are not checked
    /// here; callers inspect [`ApiEnvelope::code`].
    pub async fn post(
        &self,
        path: &str,
        headers: HeaderMap,
        body: &Value,
    ) -> LookupResult<ApiEnvelope> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "upstream POST");

        let response = self
            .http
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| LookupError::upstream(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::upstream(format!(
                "{path} answered HTTP {status}"
            )));
        }

        response
            .json::<ApiEnvelope>()
            .await
            .map_err(|e| LookupError::upstream(format!("undecodable response from {path}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_success_check() {
        let envelope: ApiEnvelope =
            serde_json::from_value(json!({"code": 200, "message": "ok", "data": []})).unwrap();
        assert!(envelope.is_success());

        let envelope: ApiEnvelope =
            serde_json::from_value(json!({"code": 401, "message": null})).unwrap();
        assert!(!envelope.is_success());
        assert_eq!(envelope.message_or_default(), "no message");
    }
}
