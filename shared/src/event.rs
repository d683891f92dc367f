use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{AttemptId, ScanFailure};

/// Inputs to the app: user commands and capability completions.
#[derive(Clone, Serialize, Deserialize)]
pub enum Event {
    ImageSelected { bytes: Vec<u8>, media_type: String },
    AnalyzeRequested,
    AnalysisCompleted {
        attempt: AttemptId,
        outcome: AnalysisOutcome,
    },
    ResetRequested,
}

impl Event {
    #[must_use]
    pub fn image_selected(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self::ImageSelected {
            bytes,
            media_type: media_type.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ImageSelected { .. } => "image_selected",
            Self::AnalyzeRequested => "analyze_requested",
            Self::AnalysisCompleted { .. } => "analysis_completed",
            Self::ResetRequested => "reset_requested",
        }
    }
}

// Image bytes are summarized, not printed.
impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageSelected { bytes, media_type } => f
                .debug_struct("ImageSelected")
                .field("media_type", media_type)
                .field("size_bytes", &bytes.len())
                .finish(),
            Self::AnalyzeRequested => f.write_str("AnalyzeRequested"),
            Self::AnalysisCompleted { attempt, outcome } => f
                .debug_struct("AnalysisCompleted")
                .field("attempt", attempt)
                .field("outcome", outcome)
                .finish(),
            Self::ResetRequested => f.write_str("ResetRequested"),
        }
    }
}

/// Result of one analysis attempt as delivered back to the state machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisOutcome {
    /// The raw text the service answered with; may be empty.
    Success(String),
    Failure(ScanFailure),
}
