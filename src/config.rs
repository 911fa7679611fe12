//! Client configuration and its builder.
//!
//! A [`ClientConfig`] is immutable once built. Credentials are deliberately not
//! part of it: they rotate independently (see
//! [`SolidiClient::set_credentials`](crate::client::SolidiClient::set_credentials)).
//!
//! ```rust,ignore
//! use solidi_sdk::config::ClientConfig;
//! use solidi_sdk::network::Tier;
//!
//! // Connect to staging but sign as production.
//! let config = ClientConfig::builder()
//!     .for_tier(Tier::Stag)
//!     .signing_domain("www.solidi.co")
//!     .user_agent("SolidiMobileApp/1.0")
//!     .build()?;
//! ```

use std::env;
use std::time::Duration;

use crate::error::{ConfigError, SdkResult};
use crate::network::{
    Tier, API_PREFIX, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, LEGACY_BASIC_AUTH_CREDENTIAL,
    PROD_DOMAIN,
};

/// How request URLs are formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlMode {
    /// `{scheme}://{connection_domain}{path}`.
    Absolute { scheme: String },
    /// Path only, for same-origin proxied environments. The transport is
    /// responsible for resolving it.
    Relative,
}

impl Default for UrlMode {
    fn default() -> Self {
        UrlMode::Absolute {
            scheme: "https".to_string(),
        }
    }
}

/// Immutable client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    user_agent: String,
    connection_domain: String,
    signing_domain: String,
    url_mode: UrlMode,
    api_prefix: String,
    timeout: Duration,
    include_legacy_basic_auth_header: bool,
    legacy_basic_auth_credential: String,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Build a configuration from `SOLIDI_*` environment variables.
    ///
    /// `SOLIDI_TIER` picks the preset (default `prod`); `SOLIDI_DOMAIN`,
    /// `SOLIDI_SIGNING_DOMAIN` and `SOLIDI_USER_AGENT` override it.
    pub fn from_env() -> SdkResult<Self> {
        let mut builder = ClientConfig::builder();
        if let Ok(tier) = env::var("SOLIDI_TIER") {
            builder = builder.for_tier(tier.parse::<Tier>()?);
        }
        if let Ok(domain) = env::var("SOLIDI_DOMAIN") {
            builder = builder.connection_domain(domain);
        }
        if let Ok(domain) = env::var("SOLIDI_SIGNING_DOMAIN") {
            builder = builder.signing_domain(domain);
        }
        if let Ok(agent) = env::var("SOLIDI_USER_AGENT") {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn connection_domain(&self) -> &str {
        &self.connection_domain
    }

    pub fn signing_domain(&self) -> &str {
        &self.signing_domain
    }

    pub fn url_mode(&self) -> &UrlMode {
        &self.url_mode
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn include_legacy_basic_auth_header(&self) -> bool {
        self.include_legacy_basic_auth_header
    }

    pub(crate) fn legacy_basic_auth_credential(&self) -> &str {
        &self.legacy_basic_auth_credential
    }

    /// `/{api_prefix}/{api_version}/{route}`.
    pub fn path_for(&self, api_version: &str, route: &str) -> String {
        format!(
            "/{}/{}/{}",
            self.api_prefix,
            api_version,
            route.trim_start_matches('/')
        )
    }

    /// Full request URL for a path, according to the URL mode.
    pub fn url_for(&self, path: &str) -> String {
        match &self.url_mode {
            UrlMode::Absolute { scheme } => {
                format!("{}://{}{}", scheme, self.connection_domain, path)
            }
            UrlMode::Relative => path.to_string(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    user_agent: String,
    connection_domain: String,
    signing_domain: Option<String>,
    url_mode: UrlMode,
    api_prefix: String,
    timeout: Duration,
    include_legacy_basic_auth_header: bool,
    legacy_basic_auth_credential: String,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connection_domain: PROD_DOMAIN.to_string(),
            signing_domain: None,
            url_mode: UrlMode::default(),
            api_prefix: API_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
            include_legacy_basic_auth_header: false,
            legacy_basic_auth_credential: LEGACY_BASIC_AUTH_CREDENTIAL.to_string(),
        }
    }
}

impl ClientConfigBuilder {
    /// Apply a tier preset: its domain for both connecting and signing, and
    /// the legacy basic-auth header on non-production tiers.
    pub fn for_tier(mut self, tier: Tier) -> Self {
        self.connection_domain = tier.domain().to_string();
        self.signing_domain = None;
        self.include_legacy_basic_auth_header = !tier.is_production();
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Host the client connects to. Also used for signing unless
    /// [`signing_domain`](Self::signing_domain) is set.
    pub fn connection_domain(mut self, domain: impl Into<String>) -> Self {
        self.connection_domain = domain.into();
        self
    }

    /// Host the signature is computed against.
    pub fn signing_domain(mut self, domain: impl Into<String>) -> Self {
        self.signing_domain = Some(domain.into());
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.url_mode = UrlMode::Absolute {
            scheme: scheme.into(),
        };
        self
    }

    pub fn relative_urls(mut self) -> Self {
        self.url_mode = UrlMode::Relative;
        self
    }

    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn include_legacy_basic_auth_header(mut self, enabled: bool) -> Self {
        self.include_legacy_basic_auth_header = enabled;
        self
    }

    /// `user:password` pair encoded into the legacy basic-auth header.
    pub fn legacy_basic_auth_credential(mut self, credential: impl Into<String>) -> Self {
        self.legacy_basic_auth_credential = credential.into();
        self
    }

    pub fn build(self) -> SdkResult<ClientConfig> {
        let connection_domain = self.connection_domain.trim().trim_end_matches('/').to_string();
        if connection_domain.is_empty() {
            return Err(invalid("connection_domain", "cannot be empty").into());
        }
        if connection_domain.contains("://") {
            return Err(invalid(
                "connection_domain",
                "expected a host name without a scheme",
            )
            .into());
        }
        let signing_domain = match self.signing_domain {
            Some(domain) if domain.trim().is_empty() => {
                return Err(invalid("signing_domain", "cannot be empty").into());
            }
            Some(domain) => domain.trim().to_string(),
            None => connection_domain.clone(),
        };
        if let UrlMode::Absolute { scheme } = &self.url_mode {
            if scheme != "https" && scheme != "http" {
                return Err(invalid("scheme", &format!("unsupported scheme `{scheme}`")).into());
            }
        }
        let api_prefix = self.api_prefix.trim_matches('/').to_string();
        if api_prefix.is_empty() {
            return Err(invalid("api_prefix", "cannot be empty").into());
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout", "must be greater than zero").into());
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "cannot be empty").into());
        }

        Ok(ClientConfig {
            user_agent: self.user_agent,
            connection_domain,
            signing_domain,
            url_mode: self.url_mode,
            api_prefix,
            timeout: self.timeout,
            include_legacy_basic_auth_header: self.include_legacy_basic_auth_header,
            legacy_basic_auth_credential: self.legacy_basic_auth_credential,
        })
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}
