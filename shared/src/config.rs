//! Runtime configuration for the inference service connection.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::debug;

use crate::capabilities::{InferenceEndpoint, RetryConfig, ValidatedUrl};
use crate::{ANALYSIS_TIMEOUT, REQUEST_TIMEOUT};

pub const ENV_API_KEY: &str = "RECYCLE_SCAN_API_KEY";
pub const ENV_MODEL: &str = "RECYCLE_SCAN_MODEL";
pub const ENV_ENDPOINT: &str = "RECYCLE_SCAN_ENDPOINT";
pub const ENV_MAX_ATTEMPTS: &str = "RECYCLE_SCAN_MAX_ATTEMPTS";
pub const ENV_BASE_DELAY_MS: &str = "RECYCLE_SCAN_BASE_DELAY_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "RECYCLE_SCAN_REQUEST_TIMEOUT_MS";
pub const ENV_ANALYSIS_TIMEOUT_MS: &str = "RECYCLE_SCAN_ANALYSIS_TIMEOUT_MS";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone)]
pub struct ScanConfig {
    pub api_key: SecretString,
    pub model: String,
    pub endpoint_base: String,
    pub retry: RetryConfig,
    /// Per HTTP call.
    pub request_timeout: Duration,
    /// Whole analysis, backoff included. `None` means unbounded.
    pub analysis_timeout: Option<Duration>,
}

impl ScanConfig {
    /// Defaults for everything except the credential.
    #[must_use]
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            endpoint_base: DEFAULT_ENDPOINT.to_string(),
            retry: RetryConfig::default(),
            request_timeout: REQUEST_TIMEOUT,
            analysis_timeout: Some(ANALYSIS_TIMEOUT),
        }
    }

    /// Load from a `.env` file, if present, then the process environment.
    ///
    /// | Env Var                            | Required | Default            |
    /// |------------------------------------|----------|--------------------|
    /// | `RECYCLE_SCAN_API_KEY`             | **yes**  | --                 |
    /// | `RECYCLE_SCAN_MODEL`               | no       | `gemini-2.5-flash` |
    /// | `RECYCLE_SCAN_ENDPOINT`            | no       | Generative Language v1beta models |
    /// | `RECYCLE_SCAN_MAX_ATTEMPTS`        | no       | `5`                |
    /// | `RECYCLE_SCAN_BASE_DELAY_MS`       | no       | `1000`             |
    /// | `RECYCLE_SCAN_REQUEST_TIMEOUT_MS`  | no       | `30000`            |
    /// | `RECYCLE_SCAN_ANALYSIS_TIMEOUT_MS` | no       | `120000`, `0` disables |
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(ENV_API_KEY).ok_or(ConfigError::Missing(ENV_API_KEY))?;
        let mut config = Self::new(SecretString::new(api_key));

        if let Some(model) = get(ENV_MODEL) {
            config.model = model;
        }
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            config.endpoint_base = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get(ENV_MAX_ATTEMPTS) {
            let attempts: u32 = parse(ENV_MAX_ATTEMPTS, &raw)?;
            if attempts == 0 {
                return Err(ConfigError::Invalid {
                    name: ENV_MAX_ATTEMPTS,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.retry.max_attempts = attempts;
        }
        if let Some(raw) = get(ENV_BASE_DELAY_MS) {
            config.retry.base_delay_ms = parse(ENV_BASE_DELAY_MS, &raw)?;
        }
        if let Some(raw) = get(ENV_REQUEST_TIMEOUT_MS) {
            let ms: u64 = parse(ENV_REQUEST_TIMEOUT_MS, &raw)?;
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    name: ENV_REQUEST_TIMEOUT_MS,
                    reason: "must be greater than 0".to_string(),
                });
            }
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = get(ENV_ANALYSIS_TIMEOUT_MS) {
            let ms: u64 = parse(ENV_ANALYSIS_TIMEOUT_MS, &raw)?;
            config.analysis_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        // Fail early on a bad endpoint rather than on the first analysis.
        config.endpoint()?;
        Ok(config)
    }

    /// `{endpoint_base}/{model}:generateContent` with the key attached at send time.
    pub fn endpoint(&self) -> Result<InferenceEndpoint, ConfigError> {
        let raw = format!(
            "{}/{}:generateContent",
            self.endpoint_base.trim_end_matches('/'),
            self.model
        );
        let base = ValidatedUrl::new(raw).map_err(|e| ConfigError::Invalid {
            name: ENV_ENDPOINT,
            reason: e.to_string(),
        })?;
        Ok(InferenceEndpoint::new(base, self.api_key.clone()))
    }

    #[cfg(feature = "native-client")]
    pub fn build_analyzer(
        &self,
    ) -> Result<crate::capabilities::Analyzer<crate::capabilities::ReqwestClient>, crate::AppError>
    {
        use crate::capabilities::{Analyzer, ReqwestClient, RetryingTransport};

        let client = ReqwestClient::new(self.request_timeout)?;
        let transport = RetryingTransport::new(client, self.retry.clone());
        Ok(Analyzer::new(transport, self.endpoint()?).with_timeout(self.analysis_timeout))
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_key_len", &self.api_key.expose_secret().len())
            .field("model", &self.model)
            .field("endpoint_base", &self.endpoint_base)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .field("analysis_timeout", &self.analysis_timeout)
            .finish()
    }
}

fn parse<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}
