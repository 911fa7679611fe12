//! Network constants and deployment tiers for the Solidi API.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fixed first path segment of every API route.
pub const API_PREFIX: &str = "api2";

/// API version used when a call does not name one.
pub const DEFAULT_API_VERSION: &str = "v1";

/// Production API domain.
pub const PROD_DOMAIN: &str = "www.solidi.co";

/// Staging API domain.
pub const STAG_DOMAIN: &str = "t10.solidi.co";

/// Development API domain.
pub const DEV_DOMAIN: &str = "t3.solidi.co";

/// Default request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default `User-Agent` header value.
pub const DEFAULT_USER_AGENT: &str = concat!("solidi-sdk-rust/", env!("CARGO_PKG_VERSION"));

/// Placeholder credential sent in the legacy `Authorization: Basic` header on
/// non-production hosts.
pub const LEGACY_BASIC_AUTH_CREDENTIAL: &str = "dev: ";

/// Deployment tier. Each tier maps to a preset domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Dev,
    Stag,
    Prod,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Stag => "stag",
            Self::Prod => "prod",
        }
    }

    pub fn domain(&self) -> &'static str {
        match self {
            Self::Dev => DEV_DOMAIN,
            Self::Stag => STAG_DOMAIN,
            Self::Prod => PROD_DOMAIN,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "stag" | "staging" => Ok(Self::Stag),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(ConfigError::InvalidValue {
                field: "tier",
                reason: format!("unrecognised tier `{other}`; expected one of: dev|stag|prod"),
            }),
        }
    }
}
