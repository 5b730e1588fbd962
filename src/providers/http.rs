//! Shared HTTP plumbing for provider adapters
//!
//! One `reqwest::Client` per adapter with User-Agent and gzip enabled.
//! Every provider response is classified the same way:
//! - transport timeout → EXTERNAL_TIMEOUT
//! - connect failure → CONNECTION_FAILED
//! - 5xx → PROVIDER_SERVER_ERROR, 429 → RATE_LIMITED
//! - 401/403 → API_UNAUTHORIZED, 404 → TOKEN_NOT_FOUND
//! - body that does not parse → INVALID_RESPONSE

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::models::{AppError, AppResult, ErrorCode};
use crate::utils::constants::USER_AGENT as USER_AGENT_CONST;

/// Build HTTP client with default headers and gzip decompression
pub fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(|e| AppError::with_source(ErrorCode::ConfigInvalidValue, "Failed to build HTTP client", e))
}

/// Thin JSON GET client bound to one provider
#[derive(Clone)]
pub struct ProviderHttp {
    client: reqwest::Client,
    provider: &'static str,
    base_url: String,
    auth_header: Option<(HeaderName, HeaderValue)>,
}

impl ProviderHttp {
    pub fn new(provider: &'static str, base_url: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: None,
        })
    }

    /// Attach the provider API key under `header`
    pub fn with_api_key(mut self, header: &'static str, key: Option<&str>) -> AppResult<Self> {
        if let Some(key) = key {
            let mut value = HeaderValue::from_str(key).map_err(|_| {
                AppError::invalid_config(format!("{} API key contains invalid characters", self.provider))
            })?;
            value.set_sensitive(true);
            self.auth_header = Some((HeaderName::from_static(header), value));
        }
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(provider = self.provider, %url, "→ GET");

        let mut request = self.client.get(&url);
        if let Some((name, value)) = &self.auth_header {
            request = request.header(name.clone(), value.clone());
        }

        let response = request.send().await.map_err(AppError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::from_status(status.as_u16(), self.provider));
        }

        let body = response.text().await.map_err(AppError::from)?;
        decode_body(self.provider, &body)
    }
}

/// Parse a provider body; failures are definitive INVALID_RESPONSE errors
pub fn decode_body<T: DeserializeOwned>(provider: &str, body: &str) -> AppResult<T> {
    serde_json::from_str(body).map_err(|e| {
        AppError::with_source(
            ErrorCode::InvalidResponse,
            format!("{} returned an unparseable body", provider),
            e,
        )
    })
}

/// Addresses and handles go into URL paths verbatim, so anything outside
/// `[A-Za-z0-9_.-]` (or a bare `.`/`..`) is refused rather than rewritten
pub fn path_segment(raw: &str) -> AppResult<&str> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
    if raw.is_empty() || raw == "." || raw == ".." {
        return Err(AppError::missing_input(format!("'{}' is not a usable identifier", raw)));
    }
    if let Some(bad) = raw.chars().find(|c| !allowed(*c)) {
        return Err(AppError::missing_input(format!(
            "'{}' contains {:?}, which cannot be sent to a provider",
            raw, bad
        )));
    }
    Ok(raw)
}
