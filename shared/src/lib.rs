// lib.rs - Recycle Scan shared core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared core of the recycling scan tool.
//!
//! The rendering surface feeds user commands in as [`Event`]s. The crux
//! [`App`] updates the owned [`Model`] and asks for work through its
//! [`Capabilities`]. The [`ScanSession`] shell resolves those [`Effect`]s
//! against the inference service through a [`RetryingTransport`].

pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod image_processing;
pub mod logging;
pub mod model;
pub mod request;
pub mod session;
pub mod verdict;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use app::{AnalyzeRejection, App, PreviewView, UserFacingError, ViewModel, ViewState};
pub use capabilities::{
    Analyzer, Capabilities, Effect, HttpClient, HttpError, HttpResponse, InferenceEndpoint,
    InferenceOperation, RetryConfig, RetryingTransport, TransportError, ValidatedUrl,
};
pub use config::{ConfigError, ScanConfig};
pub use event::{AnalysisOutcome, Event};
pub use image_processing::{EncodedImage, ImageError, SelectedImage};
pub use model::{AttemptId, Model, ScanFailure, ScanState, StagedImage, Verdict};
pub use request::{AnalysisRequest, AnalysisRequestBuilder, GenerateContentResponse};
pub use session::ScanSession;
pub use verdict::{interpret, InterpretError};

#[cfg(feature = "native-client")]
pub use capabilities::ReqwestClient;

pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const BASE_RETRY_DELAY_MS: u64 = 1000;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NoImageSelected,
    ImageRejected,
    TerminalRequest,
    RetriesExhausted,
    Timeout,
    EmptyResponse,
    MalformedResponse,
    Configuration,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NoImageSelected => "NO_IMAGE_SELECTED",
            Self::ImageRejected => "IMAGE_REJECTED",
            Self::TerminalRequest => "TERMINAL_REQUEST",
            Self::RetriesExhausted => "RETRIES_EXHAUSTED",
            Self::Timeout => "TIMEOUT",
            Self::EmptyResponse => "EMPTY_RESPONSE",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Whether a fresh analyze attempt with the same image could succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RetriesExhausted | Self::Timeout | Self::EmptyResponse | Self::MalformedResponse
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::NoImageSelected => "Select a photo of the item first.".into(),
            ErrorKind::ImageRejected => self.message.clone(),
            ErrorKind::TerminalRequest => {
                "The analysis service could not read this photo. Please try a different one."
                    .into()
            }
            ErrorKind::RetriesExhausted => {
                "The analysis service is unavailable right now. Please try again in a moment."
                    .into()
            }
            ErrorKind::Timeout => "The analysis took too long. Please try again.".into(),
            ErrorKind::EmptyResponse => {
                "The analysis service returned no answer. Please try again.".into()
            }
            ErrorKind::MalformedResponse => {
                "The analysis service sent an unexpected answer. Please try again.".into()
            }
            ErrorKind::Configuration => {
                "The scanner is not configured correctly. Please check its settings.".into()
            }
            ErrorKind::Internal => "An unexpected error occurred. Please try again.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<ImageError> for AppError {
    fn from(e: ImageError) -> Self {
        AppError::new(ErrorKind::ImageRejected, e.to_string())
    }
}

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        match &e {
            HttpError::InvalidUrl { .. } => {
                AppError::new(ErrorKind::Configuration, "Invalid inference endpoint")
                    .with_internal(e.to_string())
            }
            HttpError::InvalidResponse { .. } => {
                AppError::new(ErrorKind::MalformedResponse, "Unreadable inference response")
                    .with_internal(e.to_string())
            }
            _ => AppError::new(ErrorKind::Internal, "Request failed").with_internal(e.to_string()),
        }
    }
}

impl From<TransportError> for AppError {
    fn from(e: TransportError) -> Self {
        let error = AppError::new(e.kind(), e.to_string());
        match &e {
            TransportError::TerminalRequest { status, .. } => {
                error.with_context("http_status", status.to_string())
            }
            TransportError::RetriesExhausted { attempts, .. } => {
                error.with_context("attempts", attempts.to_string())
            }
        }
    }
}

impl From<InterpretError> for AppError {
    fn from(e: InterpretError) -> Self {
        match e {
            InterpretError::EmptyResponse => AppError::new(ErrorKind::EmptyResponse, e.to_string()),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}
