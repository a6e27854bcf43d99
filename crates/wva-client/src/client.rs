//! WVA web services HTTP client

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Result, WvaError};

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a WVA device
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Device hostname, optionally with `:port`
    pub hostname: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_https: bool,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: None,
            password: None,
            use_https: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for the `/ws/...` web services of a WVA device
///
/// Every call returns the decoded JSON document on HTTP 200. Bodies that
/// are not `application/json` come back as [`Value::String`].
#[derive(Debug, Clone)]
pub struct WvaClient {
    client: Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl WvaClient {
    /// Create a client for the given connection settings
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let scheme = if config.use_https { "https" } else { "http" };
        let base_url = Url::parse(&format!("{}://{}/ws/", scheme, config.hostname))?;

        Ok(Self {
            client,
            base_url,
            username: config.username,
            password: config.password,
        })
    }

    /// Get the base URL (`{scheme}://{hostname}/ws/`)
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Hostname of the device, without any port
    pub fn hostname(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    /// Build the URL for a path relative to `/ws/`
    pub fn ws_url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // =========================================================================
    // Raw web service calls
    // =========================================================================

    /// GET the specified web service path
    #[instrument(skip(self))]
    pub async fn get(&self, path: &str) -> Result<Value> {
        let url = self.ws_url(path)?;
        self.send(self.client.get(url)).await
    }

    /// DELETE the specified web service path
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Result<Value> {
        let url = self.ws_url(path)?;
        self.send(self.client.delete(url)).await
    }

    /// PUT a raw text body to the specified path
    #[instrument(skip(self, body))]
    pub async fn put(&self, path: &str, body: impl Into<String>) -> Result<Value> {
        let url = self.ws_url(path)?;
        self.send(self.client.put(url).body(body.into())).await
    }

    /// POST a raw text body to the specified path
    #[instrument(skip(self, body))]
    pub async fn post(&self, path: &str, body: impl Into<String>) -> Result<Value> {
        let url = self.ws_url(path)?;
        self.send(self.client.post(url).body(body.into())).await
    }

    /// PUT a JSON document to the specified path
    #[instrument(skip(self, body))]
    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.ws_url(path)?;
        self.send(self.client.put(url).json(body)).await
    }

    /// POST a JSON document to the specified path
    #[instrument(skip(self, body))]
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.ws_url(path)?;
        self.send(self.client.post(url).json(body)).await
    }

    /// GET a path and deserialize the document into `T`
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.get(path).await?;
        serde_json::from_value(value).map_err(|e| WvaError::Parse(format!("{}: {}", path, e)))
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let mut request = request.header(ACCEPT, "application/json");
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%status, url = %response.url(), "Web service response");

        if status != StatusCode::OK {
            return Err(WvaError::from_status(status.as_u16()));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let text = response.text().await?;
        if is_json {
            serde_json::from_str(&text).map_err(|e| WvaError::Parse(e.to_string()))
        } else {
            Ok(Value::String(text))
        }
    }
}
