//! Solidi REST API client.
//!
//! [`SolidiClient`] is the entry point: it validates a [`MethodCall`], waits
//! for the request lane and hands the call to the executor.
//!
//! # Example
//!
//! ```rust,ignore
//! use solidi_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> SdkResult<()> {
//!     let client = SolidiClient::builder()
//!         .config(ClientConfig::builder().for_tier(Tier::Prod).build()?)
//!         .credentials(Credentials::from_env()?)
//!         .build()?;
//!
//!     let ticker = client.public_method(MethodCall::get("ticker")).await?;
//!     println!("{}", ticker.to_json());
//!
//!     let balance = client.private_method(MethodCall::post("balance")).await?;
//!     println!("{}", balance.to_json());
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::{Credentials, NonceState, SessionObserver};
use crate::config::ClientConfig;
use crate::error::{ConfigError, SdkError, SdkResult};
use crate::http::executor::{validate_call, TransportExecutor};
use crate::http::queue::RequestLane;
use crate::http::transport::Transport;
use crate::network::DEFAULT_API_VERSION;
use crate::response::{ApiError, ApiResponse};

// ============================================================================
// HTTP methods
// ============================================================================

/// HTTP verbs the API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Whether requests with this method send a JSON body. Only POST does;
    /// params (and the nonce) travel in that body.
    pub fn carries_body(&self) -> bool {
        matches!(self, Self::Post)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            _ => Err(ConfigError::UnsupportedMethod(s.to_string())),
        }
    }
}

// ============================================================================
// Method calls
// ============================================================================

/// Argument properties accepted by [`MethodCall::from_value`].
const CALL_ARGUMENTS: &[&str] = &["httpMethod", "apiRoute", "params", "apiVersion"];

/// One API call: method, route, params, version and the token that aborts it.
///
/// ```rust,ignore
/// let call = MethodCall::post("buy")
///     .with_param("market", "BTC/GBP")
///     .with_param("baseAssetVolume", "0.01")
///     .with_cancel_token(token);
/// ```
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub(crate) http_method: HttpMethod,
    pub(crate) api_route: String,
    pub(crate) api_version: String,
    pub(crate) params: Map<String, Value>,
    pub(crate) cancel: CancellationToken,
}

impl MethodCall {
    /// A call with no params, API version `v1` and its own cancellation token.
    pub fn new(http_method: HttpMethod, api_route: impl Into<String>) -> Self {
        Self {
            http_method,
            api_route: api_route.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            params: Map::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn get(api_route: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, api_route)
    }

    pub fn head(api_route: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, api_route)
    }

    pub fn post(api_route: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, api_route)
    }

    pub fn put(api_route: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, api_route)
    }

    pub fn delete(api_route: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, api_route)
    }

    pub fn patch(api_route: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, api_route)
    }

    /// Parse the loose argument object used by app code:
    /// `{"httpMethod", "apiRoute", "params"?, "apiVersion"?}`.
    ///
    /// Any other property is rejected, as is a missing `httpMethod` or
    /// `apiRoute`.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Self::parse("MethodCall::from_value", value)
    }

    pub(crate) fn parse(caller: &'static str, value: Value) -> Result<Self, ConfigError> {
        let Value::Object(mut args) = value else {
            return Err(ConfigError::MalformedArgument {
                method: caller,
                reason: "arguments must be a JSON object".to_string(),
            });
        };

        if let Some(key) = args.keys().find(|key| !CALL_ARGUMENTS.contains(&key.as_str())) {
            return Err(ConfigError::UnexpectedArgument {
                method: caller,
                expected: CALL_ARGUMENTS.join(", "),
                key: key.clone(),
            });
        }

        let http_method = match args.remove("httpMethod") {
            Some(Value::String(method)) => method.parse::<HttpMethod>()?,
            Some(other) => return Err(malformed(caller, "httpMethod", &other)),
            None => {
                return Err(ConfigError::MissingArgument {
                    method: caller,
                    key: "httpMethod",
                })
            }
        };
        let api_route = match args.remove("apiRoute") {
            Some(Value::String(route)) if !route.is_empty() => route,
            Some(other) => return Err(malformed(caller, "apiRoute", &other)),
            None => {
                return Err(ConfigError::MissingArgument {
                    method: caller,
                    key: "apiRoute",
                })
            }
        };

        let mut call = Self::new(http_method, api_route);
        match args.remove("params") {
            None | Some(Value::Null) => {}
            Some(Value::Object(params)) => call.params = params,
            Some(other) => return Err(malformed(caller, "params", &other)),
        }
        match args.remove("apiVersion") {
            None | Some(Value::Null) => {}
            Some(Value::String(version)) if !version.is_empty() => call.api_version = version,
            Some(other) => return Err(malformed(caller, "apiVersion", &other)),
        }
        Ok(call)
    }

    /// Replace all params.
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Set one param. Params are sent in the POST body; any other method
    /// with params is rejected when the call is made.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Abort the call when `token` is cancelled. Cancelling before the call
    /// starts aborts it without touching the network.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn api_route(&self) -> &str {
        &self.api_route
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

fn malformed(caller: &'static str, key: &str, value: &Value) -> ConfigError {
    ConfigError::MalformedArgument {
        method: caller,
        reason: format!("unexpected value for {key}: {value}"),
    }
}

// ============================================================================
// Client builder
// ============================================================================

/// Builder for [`SolidiClient`].
#[derive(Default)]
pub struct SolidiClientBuilder {
    config: Option<ClientConfig>,
    credentials: Option<Credentials>,
    transport: Option<Arc<dyn Transport>>,
    session_observer: Option<Arc<dyn SessionObserver>>,
}

impl SolidiClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this configuration instead of the production defaults.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Credentials for private calls. They can also be set later.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Send requests through a custom [`Transport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Get told about authentication failures.
    pub fn session_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.session_observer = Some(observer);
        self
    }

    /// Build the client.
    pub fn build(self) -> SdkResult<SolidiClient> {
        let config = match self.config {
            Some(config) => config,
            None => ClientConfig::builder().build()?,
        };
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&config)?,
        };
        let config = Arc::new(config);

        let executor = TransportExecutor::new(
            config.clone(),
            transport,
            Arc::new(NonceState::new()),
            self.session_observer,
        );

        Ok(SolidiClient {
            config,
            lane: RequestLane::new(),
            executor: Arc::new(executor),
            credentials: Arc::new(RwLock::new(self.credentials)),
        })
    }
}

impl fmt::Debug for SolidiClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolidiClientBuilder")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .field("transport", &self.transport.is_some())
            .field("session_observer", &self.session_observer.is_some())
            .finish()
    }
}

#[cfg(feature = "http")]
fn default_transport(config: &ClientConfig) -> SdkResult<Arc<dyn Transport>> {
    use crate::config::UrlMode;
    use crate::http::transport::ReqwestTransport;

    let mut transport = ReqwestTransport::new().map_err(|e| SdkError::Transport(e.to_string()))?;
    if *config.url_mode() == UrlMode::Relative {
        let origin = url::Url::parse(&format!("https://{}", config.connection_domain()))
            .map_err(|e| ConfigError::InvalidValue {
                field: "connection_domain",
                reason: e.to_string(),
            })?;
        transport = transport.with_origin(origin);
    }
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "http"))]
fn default_transport(_config: &ClientConfig) -> SdkResult<Arc<dyn Transport>> {
    Err(SdkError::Transport(
        "no transport configured and the `http` feature is disabled".to_string(),
    ))
}

// ============================================================================
// Client
// ============================================================================

/// Solidi REST API client.
///
/// Clones share the request lane, the nonce counter and the credentials, so
/// they behave as one client. Use separate instances only for separate
/// credential sets.
#[derive(Clone)]
pub struct SolidiClient {
    config: Arc<ClientConfig>,
    lane: RequestLane,
    executor: Arc<TransportExecutor>,
    credentials: Arc<RwLock<Option<Credentials>>>,
}

impl SolidiClient {
    pub fn builder() -> SolidiClientBuilder {
        SolidiClientBuilder::new()
    }

    /// A client with this configuration and the default transport.
    pub fn new(config: ClientConfig) -> SdkResult<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The lane this client serializes requests through.
    pub fn lane(&self) -> &RequestLane {
        &self.lane
    }

    // ── Credentials ─────────────────────────────────────────────────────────

    /// Replace the credentials used for private calls. Calls already in
    /// flight keep the credentials they were signed with.
    pub async fn set_credentials(&self, credentials: Credentials) {
        debug!(api_key = %credentials.api_key(), "API credentials updated");
        *self.credentials.write().await = Some(credentials);
    }

    pub async fn clear_credentials(&self) {
        debug!("API credentials cleared");
        *self.credentials.write().await = None;
    }

    /// Whether private calls can be made.
    pub async fn has_credentials(&self) -> bool {
        self.credentials
            .read()
            .await
            .as_ref()
            .is_some_and(Credentials::has_secret)
    }

    // ── Calls ───────────────────────────────────────────────────────────────

    /// Make an unsigned call.
    pub async fn public_method(&self, call: MethodCall) -> SdkResult<ApiResponse> {
        self.call(call, false).await
    }

    /// Make a signed call. Requires credentials and POST.
    pub async fn private_method(&self, call: MethodCall) -> SdkResult<ApiResponse> {
        self.call(call, true).await
    }

    /// [`public_method`](Self::public_method) taking the loose JSON argument
    /// object (see [`MethodCall::from_value`]).
    pub async fn public_method_value(
        &self,
        args: Value,
        cancel: CancellationToken,
    ) -> SdkResult<ApiResponse> {
        let call = MethodCall::parse("publicMethod", args)?.with_cancel_token(cancel);
        self.public_method(call).await
    }

    /// [`private_method`](Self::private_method) taking the loose JSON argument
    /// object (see [`MethodCall::from_value`]).
    pub async fn private_method_value(
        &self,
        args: Value,
        cancel: CancellationToken,
    ) -> SdkResult<ApiResponse> {
        let call = MethodCall::parse("privateMethod", args)?.with_cancel_token(cancel);
        self.private_method(call).await
    }

    async fn call(&self, call: MethodCall, private: bool) -> SdkResult<ApiResponse> {
        validate_call(&call, private)?;

        let credentials = if private {
            let credentials = self.credentials.read().await.clone();
            match credentials {
                Some(creds) if creds.has_secret() => Some(creds),
                _ => return Err(SdkError::Config(ConfigError::MissingApiSecret)),
            }
        } else {
            None
        };

        let Some(lane) = self.lane.acquire(&call.cancel).await else {
            info!(route = %call.api_route, "Aborted while waiting for the request lane");
            return Ok(ApiResponse::Error(ApiError::Aborted));
        };

        self.executor
            .execute(&lane, call, private, credentials.as_ref())
            .await
    }
}

impl fmt::Debug for SolidiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolidiClient")
            .field("config", &self.config)
            .field("lane_busy", &self.lane.is_busy())
            .finish()
    }
}
