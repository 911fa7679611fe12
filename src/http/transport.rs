//! The network seam: a [`Transport`] sends one fully prepared request.
//!
//! [`ReqwestTransport`] is the production implementation. Tests substitute
//! their own to observe ordering and nonces without a server.

use async_trait::async_trait;

/// A prepared HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and body text of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Why a transport could not produce a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset, TLS failure, unreadable body.
    Network(String),
    /// The request itself is unusable (bad URL, bad header value).
    InvalidRequest(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network failure: {msg}"),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

/// Sends requests. Timeouts and cancellation are applied by the caller, which
/// drops the returned future to abort.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(feature = "http")]
pub use reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use super::*;

    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
    use reqwest::{Client, Method};
    use url::Url;

    /// [`Transport`] backed by a pooled `reqwest` client.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
        /// Base for relative request URLs.
        origin: Option<Url>,
    }

    impl ReqwestTransport {
        pub fn new() -> Result<Self, TransportError> {
            let client = Client::builder()
                .pool_max_idle_per_host(10)
                .build()
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            Ok(Self::with_client(client))
        }

        /// Use an existing `reqwest` client.
        pub fn with_client(client: Client) -> Self {
            Self {
                client,
                origin: None,
            }
        }

        /// Resolve relative request URLs against `origin`.
        pub fn with_origin(mut self, origin: Url) -> Self {
            self.origin = Some(origin);
            self
        }

        fn resolve(&self, url: &str) -> Result<Url, TransportError> {
            match Url::parse(url) {
                Ok(absolute) => Ok(absolute),
                Err(url::ParseError::RelativeUrlWithoutBase) => self
                    .origin
                    .as_ref()
                    .ok_or_else(|| {
                        TransportError::InvalidRequest(format!(
                            "relative URL {url} but no origin configured"
                        ))
                    })?
                    .join(url)
                    .map_err(|e| TransportError::InvalidRequest(e.to_string())),
                Err(e) => Err(TransportError::InvalidRequest(e.to_string())),
            }
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let method = Method::from_bytes(request.method.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let url = self.resolve(&request.url)?;

            let mut headers = HeaderMap::new();
            for (name, value) in &request.headers {
                let header_name = HeaderName::try_from(name.as_str()).map_err(|e| {
                    TransportError::InvalidRequest(format!("Invalid header name '{}': {}", name, e))
                })?;
                let header_value = HeaderValue::from_str(value).map_err(|e| {
                    TransportError::InvalidRequest(format!("Invalid header value for '{}': {}", name, e))
                })?;
                headers.insert(header_name, header_value);
            }

            let mut builder = self.client.request(method, url).headers(headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_builder() {
                    TransportError::InvalidRequest(e.to_string())
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::Network(format!("failed to read body: {e}")))?;

            Ok(HttpResponse { status, body })
        }
    }

}
