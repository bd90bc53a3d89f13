//! HTTP Client
//!
//! Blocking `reqwest` client driven off the async executor's threads.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::transport::{FetchFuture, FetchMode, Transport};
use crate::NetError;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string
    pub user_agent: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max redirects to follow (0 = disable)
    pub max_redirects: u32,
    /// Serialized origin sent with CORS requests
    pub origin: Option<String>,
    /// Default headers
    pub default_headers: Vec<(String, String)>,
    /// Honor proxy settings from the environment
    pub use_env_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "fOS-Engine/0.1".into(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            max_redirects: 10,
            origin: None,
            default_headers: Vec::new(),
            use_env_proxy: true,
        }
    }
}

/// HTTP client builder
pub struct HttpClientBuilder {
    config: ClientConfig,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn user_agent(mut self, ua: &str) -> Self {
        self.config.user_agent = ua.to_string();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn max_redirects(mut self, max: u32) -> Self {
        self.config.max_redirects = max;
        self
    }

    pub fn origin(mut self, origin: &str) -> Self {
        self.config.origin = Some(origin.to_string());
        self
    }

    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        self.config.default_headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Connect directly, ignoring proxy environment variables
    pub fn no_proxy(mut self) -> Self {
        self.config.use_env_proxy = false;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build(self) -> Result<HttpClient, NetError> {
        HttpClient::with_config(self.config)
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client
#[derive(Clone)]
pub struct HttpClient {
    config: Arc<ClientConfig>,
    inner: reqwest::blocking::Client,
}

impl HttpClient {
    /// Create a client builder
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Create with custom config
    pub fn with_config(config: ClientConfig) -> Result<Self, NetError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NetError::Config(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| NetError::Config(format!("header value {value}: {e}")))?;
            headers.insert(name, value);
        }

        let redirect = if config.max_redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(config.max_redirects as usize)
        };

        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .redirect(redirect)
            .default_headers(headers);
        if !config.use_env_proxy {
            builder = builder.no_proxy();
        }

        let inner = builder
            .build()
            .map_err(|e| NetError::Network(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            inner,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET a URL and return the body
    fn get_blocking(
        client: &reqwest::blocking::Client,
        config: &ClientConfig,
        url: Url,
        mode: FetchMode,
    ) -> Result<Vec<u8>, NetError> {
        let mut req = client.get(url);

        // The client keeps no cookie store, so anonymous requests already
        // go out without credentials.
        if let (FetchMode::Cors(_), Some(origin)) = (mode, &config.origin) {
            req = req.header("Origin", origin.as_str());
        }

        let response = req.send().map_err(|e| NetError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetError::HttpError { status: status.as_u16() });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| NetError::Network(e.to_string()))
    }
}

impl Transport for HttpClient {
    fn fetch(&self, url: &Url, mode: FetchMode) -> FetchFuture {
        tracing::info!("HTTP GET {} ({:?})", url, mode);

        let client = self.inner.clone();
        let config = Arc::clone(&self.config);
        let url = url.clone();
        Box::pin(smol::unblock(move || {
            HttpClient::get_blocking(&client, &config, url, mode)
        }))
    }
}
