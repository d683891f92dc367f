use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::http::{HttpClient, HttpError, HttpResponse, ValidatedUrl};
use crate::{ErrorKind, BASE_RETRY_DELAY_MS, DEFAULT_MAX_ATTEMPTS};

/// HTTP status the inference service uses for a malformed request.
pub const MALFORMED_REQUEST_STATUS: u16 = 400;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total calls made, the first one included. Zero behaves like one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Statuses that fail the call at once; retrying an invalid payload cannot succeed.
    pub terminal_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: BASE_RETRY_DELAY_MS,
            terminal_status_codes: vec![MALFORMED_REQUEST_STATUS],
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    #[must_use]
    pub fn is_terminal_status(&self, status: u16) -> bool {
        self.terminal_status_codes.contains(&status)
    }

    /// `base * 2^attempt`, the lower bound of the wait after 0-based `attempt`.
    #[must_use]
    pub fn backoff_floor(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(exponential)
    }

    #[must_use]
    pub fn delay_for(&self, attempt: u32, jitter_ms: u64) -> Duration {
        self.backoff_floor(attempt)
            .saturating_add(Duration::from_millis(jitter_ms))
    }
}

/// Uniform in `0..base_ms`; zero when there is no base unit.
#[must_use]
pub fn generate_jitter(base_ms: u64) -> u64 {
    if base_ms == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..base_ms)
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request rejected with status {status}: {message}")]
    TerminalRequest { status: u16, message: String },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: HttpError },
}

impl TransportError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TerminalRequest { .. } => ErrorKind::TerminalRequest,
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
        }
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&HttpError> {
        match self {
            Self::RetriesExhausted { last, .. } => Some(last),
            Self::TerminalRequest { .. } => None,
        }
    }
}

/// Delivers one request body with bounded exponential backoff.
///
/// Success statuses return at once. Terminal statuses fail after a single
/// call. Every other status, and every call that never completes, is retried
/// until the attempt budget runs out.
pub struct RetryingTransport<C> {
    client: C,
    config: RetryConfig,
}

impl<C: HttpClient> RetryingTransport<C> {
    pub fn new(client: C, config: RetryConfig) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    #[instrument(skip(self, url, body), fields(endpoint = %url.redacted(), body_len = body.len()))]
    pub async fn send(
        &self,
        url: &ValidatedUrl,
        mut body: Bytes,
    ) -> Result<HttpResponse, TransportError> {
        let max_attempts = self.config.effective_attempts();
        let mut attempt = 0u32;

        loop {
            // The last permitted call gets the body itself.
            let payload = if attempt + 1 >= max_attempts {
                std::mem::take(&mut body)
            } else {
                body.clone()
            };

            let last = match self.client.post_json(url, payload).await {
                Ok(response) if response.is_success() => {
                    if attempt > 0 {
                        info!(
                            attempts = attempt + 1,
                            duration_ms = response.duration_ms(),
                            "request succeeded after retry"
                        );
                    } else {
                        debug!(duration_ms = response.duration_ms(), "request succeeded");
                    }
                    return Ok(response);
                }
                Ok(response) if self.config.is_terminal_status(response.status()) => {
                    let status = response.status();
                    let message = response.error_message();
                    warn!(status, %message, "terminal request failure, not retrying");
                    return Err(TransportError::TerminalRequest { status, message });
                }
                Ok(response) => response.into_status_error(),
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %last, "retry budget exhausted");
                return Err(TransportError::RetriesExhausted {
                    attempts: attempt,
                    last,
                });
            }

            let delay = self
                .config
                .delay_for(attempt - 1, generate_jitter(self.config.base_delay_ms));
            warn!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %last,
                "transient failure, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
