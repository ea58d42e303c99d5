//! REST transport shared by the venue adapters.

use std::time::Duration;

use reqwest::{Client, Method};
use tracing::{debug, trace, warn};

use crate::config::{HttpConfig, ProxyConfig};
use crate::domain::Platform;
use crate::error::{ApiError, Error, Result};

/// A fully signed request ready to be sent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Path below the base URL, starting with `/`.
    pub path: String,
    /// Encoded query string without the leading `?`.
    pub query: String,
    pub body: Option<String>,
    pub headers: Vec<(&'static str, String)>,
}

impl HttpRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: String::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Path plus `?query` when the query is not empty.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    /// Whether replaying this request cannot create a second side effect.
    #[must_use]
    pub fn is_idempotent(&self) -> bool {
        self.method == Method::GET
    }
}

/// HTTP client bound to one venue base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    platform: Platform,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport with the configured timeouts and optional proxy.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is invalid or the client cannot be
    /// built.
    pub fn new(
        platform: Platform,
        base_url: impl Into<String>,
        http: &HttpConfig,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_millis(http.timeout_ms))
            .connect_timeout(Duration::from_millis(http.connect_timeout_ms));

        if let Some(url) = proxy.and_then(ProxyConfig::url) {
            debug!(platform = %platform, "Routing REST traffic through proxy");
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }

        Ok(Self {
            client: builder.build()?,
            platform,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Send `request` and return the body text.
    ///
    /// # Errors
    ///
    /// Transport failures surface as [`Error::Http`]; any non-2xx status is
    /// parsed into an [`ApiError`].
    pub async fn send(&self, request: &HttpRequest) -> Result<String> {
        let url = format!("{}{}", self.base_url, request.path_and_query());
        trace!(platform = %self.platform, method = %request.method, url = %url, "REST request");

        let mut builder = self.client.request(request.method.clone(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let err = ApiError::from_response(self.platform, status.as_u16(), &text);
            warn!(
                platform = %self.platform,
                path = %request.path,
                status = status.as_u16(),
                code = %err.code,
                message = %err.message,
                "REST request failed"
            );
            return Err(Error::Api(err));
        }

        Ok(text)
    }
}
