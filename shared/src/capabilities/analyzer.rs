use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use super::http::{HttpClient, ValidatedUrl};
use super::retry::RetryingTransport;
use crate::event::AnalysisOutcome;
use crate::model::ScanFailure;
use crate::request::{AnalysisRequest, GenerateContentResponse};
use crate::{AppError, ErrorKind};

const API_KEY_PARAM: &str = "key";

/// Where analysis requests go and the static credential they carry.
#[derive(Clone)]
pub struct InferenceEndpoint {
    base: ValidatedUrl,
    api_key: SecretString,
}

impl InferenceEndpoint {
    #[must_use]
    pub fn new(base: ValidatedUrl, api_key: SecretString) -> Self {
        Self { base, api_key }
    }

    #[must_use]
    pub fn base(&self) -> &ValidatedUrl {
        &self.base
    }

    /// Full request URL, key included. Never log this; use [`ValidatedUrl::redacted`].
    #[must_use]
    pub fn request_url(&self) -> ValidatedUrl {
        self.base
            .with_query_pair(API_KEY_PARAM, self.api_key.expose_secret())
    }
}

impl fmt::Debug for InferenceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceEndpoint")
            .field("base", &self.base)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Runs one analysis attempt end to end and folds every failure into an
/// [`AnalysisOutcome`], so the caller only ever sees a completion.
pub struct Analyzer<C> {
    transport: RetryingTransport<C>,
    endpoint: InferenceEndpoint,
    timeout: Option<Duration>,
}

impl<C: HttpClient> Analyzer<C> {
    pub fn new(transport: RetryingTransport<C>, endpoint: InferenceEndpoint) -> Self {
        Self {
            transport,
            endpoint,
            timeout: None,
        }
    }

    /// Caps the whole attempt, backoff waits included. `None` disables the cap.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn transport(&self) -> &RetryingTransport<C> {
        &self.transport
    }

    #[must_use]
    pub fn endpoint(&self) -> &InferenceEndpoint {
        &self.endpoint
    }

    #[instrument(skip_all, fields(endpoint = %self.endpoint.base().redacted()))]
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisOutcome {
        match self.run(request).await {
            Ok(text) => {
                debug!(len = text.len(), "analysis text received");
                AnalysisOutcome::Success(text)
            }
            Err(e) => {
                warn!(error = %e, "analysis attempt failed");
                AnalysisOutcome::Failure(ScanFailure::from(e))
            }
        }
    }

    async fn run(&self, request: &AnalysisRequest) -> Result<String, AppError> {
        let body = request.to_json_bytes().map_err(|e| {
            AppError::new(ErrorKind::Internal, "Could not encode analysis request")
                .with_internal(e.to_string())
        })?;
        let url = self.endpoint.request_url();
        let send = self.transport.send(&url, Bytes::from(body));

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, send).await.map_err(|_| {
                AppError::new(ErrorKind::Timeout, "Analysis timed out").with_context(
                    "timeout_ms",
                    limit.as_millis().to_string(),
                )
            })?,
            None => send.await,
        }?;

        let parsed: GenerateContentResponse = response.json()?;
        Ok(parsed.first_text())
    }
}
