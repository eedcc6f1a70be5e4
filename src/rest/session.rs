//! Authenticated HTTP session against one control plane.

use crate::context::Credential;
use crate::{Error, Result};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

/// Per-request timeout. Long-running server work is tracked through task
/// UUIDs, so individual calls should always return promptly.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One authenticated client bound to a control plane's API root.
pub struct Session {
    base_url: String,
    credential: Credential,
    client: reqwest::Client,
}

impl Session {
    /// `base_url` is the API root, e.g. `https://10.0.0.5:9440/api/v3`.
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Appliances ship self-signed certificates.
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            credential,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, None).await
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(%method, %url, "control plane request");
        let mut request = self
            .client
            .request(method.clone(), &url)
            .basic_auth(&self.credential.username, Some(&self.credential.password));
        if let Some(body) = body {
            trace!(payload = %body, "request payload");
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::HttpStatus(format!(
                "{method} {url} returned {status}: {text}"
            )));
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(Error::from)
    }
}
