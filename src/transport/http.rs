use crate::config::{ClientConfig, API_KEY_ENV};
use crate::{Error, ErrorContext, Result};
use keyring::Entry;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::Value;
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

const KEYRING_SERVICE: &str = "intura-ai";
const KEYRING_USER: &str = "api-key";

pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_TIMESTAMP: &str = "x-timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Blocking HTTP transport that signs every request with the API key and a
/// fresh request id / timestamp pair.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    api_version: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref()).ok_or_else(|| {
            Error::authentication(format!(
                "Intura API key not found (pass one explicitly or set {})",
                API_KEY_ENV
            ))
        })?;

        let normalized = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(config.base_url.clone())
                    .with_source("transport"),
            )
        })?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                Error::configuration_with_context(
                    format!("Failed to build HTTP client: {}", e),
                    ErrorContext::new().with_source("transport"),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            api_version: config.api_version.trim_matches('/').to_string(),
            api_key,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// `{base_url}/{api_version}/{endpoint}`
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        self.base_url
            .join(&format!("{}/{}", self.api_version, endpoint))
            .map_err(|e| {
                Error::configuration_with_context(
                    format!("Cannot build endpoint URL: {}", e),
                    ErrorContext::new()
                        .with_details(endpoint.to_string())
                        .with_source("transport"),
                )
            })
    }

    /// Execute one request.
    ///
    /// - `Ok(Some(json))`: 200 with a JSON body
    /// - `Ok(Some({"status":"success","code":200}))`: 200 with any other content type
    /// - `Ok(None)`: non-200 status or an unparseable JSON body
    /// - `Err(Error::Transport)`: the request never completed
    pub fn execute(
        &self,
        method: Method,
        endpoint: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let url = self.endpoint_url(endpoint)?;
        debug!("Making {} request to {}", method.as_str(), url);

        // Sign before attaching the body: `json()` then keeps our content type.
        let mut request = self.sign(match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        });
        if let Some(params) = query {
            request = request.query(params);
        }
        if let Some(json) = body {
            request = request.json(json);
        }

        let response = request
            .send()
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = response.status();
        debug!("Response status code: {}", status.as_u16());

        if status != StatusCode::OK {
            let text = response.text().unwrap_or_default();
            warn!(
                "API request failed: {} - {}",
                status.as_u16(),
                text.chars().take(100).collect::<String>()
            );
            return Ok(None);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        if !is_json {
            return Ok(Some(serde_json::json!({
                "status": "success",
                "code": status.as_u16(),
            })));
        }

        match response.json::<Value>() {
            Ok(json) => Ok(Some(json)),
            Err(e) => {
                warn!("Malformed JSON response from {}: {}", endpoint, e);
                Ok(None)
            }
        }
    }

    fn sign(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(HEADER_REQUEST_ID, Uuid::new_v4().to_string())
            .header(HEADER_TIMESTAMP, timestamp_millis().to_string())
            .header(HEADER_API_KEY, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
    }
}

/// Explicit key, then `INTURA_API_KEY`, then the OS keyring.
pub fn resolve_api_key(explicit: Option<&str>) -> Option<String> {
    if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
        return Some(key.to_string());
    }

    if let Ok(key) = env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Some(key);
        }
    }

    Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .ok()
        .and_then(|entry| entry.get_password().ok())
        .filter(|k| !k.trim().is_empty())
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
