use std::fmt;
use std::time::Duration;

use crate::{OilPriceError, PoolLimits, Result, RetryPolicy};

/// Environment variable read by `from_env` constructors.
pub const API_KEY_ENV: &str = "OILPRICEAPI_KEY";

pub const DEFAULT_BASE_URL: &str = "https://api.oilpriceapi.com";

/// API credential. Its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a credential, rejecting blank values.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(OilPriceError::Configuration(format!(
                "API key required: pass one explicitly or set {API_KEY_ENV}"
            )));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Reads the credential from [`API_KEY_ENV`].
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| {
            OilPriceError::Configuration(format!(
                "API key required: {API_KEY_ENV} environment variable is not set"
            ))
        })?;
        Self::new(key)
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Configures endpoint, timeout, retry and connection behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientOptions {
    pub base_url: String,
    /// Per-attempt timeout for calls that do not pick a route timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub pool: PoolLimits,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            pool: PoolLimits::default(),
            user_agent: concat!("oilprice-http/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl ClientOptions {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pool(mut self, pool: PoolLimits) -> Self {
        self.pool = pool;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(OilPriceError::Configuration(
                "timeout must be greater than zero".to_owned(),
            ));
        }
        let base_url = self.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(OilPriceError::Configuration(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        self.retry.validate()?;
        self.pool.validate()
    }
}
