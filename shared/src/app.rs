//! The scan reducer: events in, effects out, plus the view projection.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crux_core::App as _;

use crate::capabilities::Capabilities;
use crate::event::{AnalysisOutcome, Event};
use crate::image_processing::SelectedImage;
use crate::model::{AttemptId, Model, ScanFailure, ScanState, StagedImage};
use crate::request::AnalysisRequestBuilder;
use crate::verdict::interpret;
use crate::AppError;

pub const SELECT_LABEL_EMPTY: &str = "Upload Item Photo";
pub const SELECT_LABEL_STAGED: &str = "Change Photo";

/// Why an analyze command was refused. Shown as a disabled action, never as
/// an error banner.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AnalyzeRejection {
    #[error("no image selected")]
    NoImageSelected,

    #[error("an analysis is already running")]
    AlreadyAnalyzing,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Empty,
    Previewing,
    Analyzing,
    Resolved {
        is_recyclable: bool,
        headline: String,
        explanation: String,
    },
    Failed {
        message: String,
        error_code: String,
        is_retryable: bool,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewView {
    pub data_url: String,
    pub media_type: String,
    pub size_bytes: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub state: ViewState,
    pub preview: Option<PreviewView>,
    pub analyze_enabled: bool,
    pub select_label: String,
    pub notice: Option<UserFacingError>,
}

impl ViewModel {
    /// Why analyze is disabled, if it is.
    #[must_use]
    pub fn analyze_rejection(&self) -> Option<AnalyzeRejection> {
        if self.state == ViewState::Analyzing {
            Some(AnalyzeRejection::AlreadyAnalyzing)
        } else if self.preview.is_none() {
            Some(AnalyzeRejection::NoImageSelected)
        } else {
            None
        }
    }
}

impl Default for ViewModel {
    fn default() -> Self {
        App::default().view(&Model::default())
    }
}

#[derive(Default)]
pub struct App {
    builder: AnalysisRequestBuilder,
}

impl App {
    #[must_use]
    pub fn new(builder: AnalysisRequestBuilder) -> Self {
        Self { builder }
    }

    pub fn check_analyze(model: &Model) -> Result<(), AnalyzeRejection> {
        if model.state.is_analyzing() {
            return Err(AnalyzeRejection::AlreadyAnalyzing);
        }
        if model.image.is_none() {
            return Err(AnalyzeRejection::NoImageSelected);
        }
        Ok(())
    }

    fn select_image(bytes: Vec<u8>, media_type: &str, model: &mut Model) {
        match SelectedImage::new(bytes, media_type) {
            Ok(selected) => {
                if model.in_flight.is_some() {
                    info!("new image selected during analysis, pending result will be ignored");
                }
                model.image = Some(StagedImage::new(selected));
                model.state = ScanState::Previewing;
                model.in_flight = None;
                model.notice = None;
            }
            Err(e) => {
                warn!(error = %e, media_type, "image rejected");
                model.notice = Some(AppError::from(e));
            }
        }
    }

    /// Returns `false` when the command was refused and nothing changed.
    fn start_analysis(&self, model: &mut Model, caps: &Capabilities) -> bool {
        if let Err(rejection) = Self::check_analyze(model) {
            debug!(%rejection, "analyze ignored");
            return false;
        }

        // A finished result is discarded before the next attempt starts.
        if matches!(model.state, ScanState::Resolved(_) | ScanState::Failed(_)) {
            model.state = ScanState::Previewing;
        }

        let Some(request) = self
            .builder
            .build(model.image.as_ref().map(|image| &image.encoded))
        else {
            return false;
        };

        let attempt = AttemptId::generate();
        info!(%attempt, "analysis started");
        model.state = ScanState::Analyzing;
        model.in_flight = Some(attempt);
        model.notice = None;

        caps.inference.analyze(attempt, request, move |outcome| {
            Event::AnalysisCompleted { attempt, outcome }
        });
        true
    }

    /// Returns `false` for a stale completion, which leaves the model untouched.
    fn complete_analysis(attempt: AttemptId, outcome: AnalysisOutcome, model: &mut Model) -> bool {
        if model.in_flight != Some(attempt) || !model.state.is_analyzing() {
            debug!(%attempt, state = %model.state, "stale analysis result dropped");
            return false;
        }

        model.in_flight = None;
        model.state = match outcome {
            AnalysisOutcome::Success(text) => match interpret(&text) {
                Ok(verdict) => {
                    info!(%attempt, is_recyclable = verdict.is_recyclable, "analysis resolved");
                    ScanState::Resolved(verdict)
                }
                Err(e) => {
                    warn!(%attempt, error = %e, "analysis returned no text");
                    ScanState::Failed(ScanFailure::from(AppError::from(e)))
                }
            },
            AnalysisOutcome::Failure(failure) => {
                warn!(%attempt, kind = failure.kind.code(), "analysis failed");
                ScanState::Failed(failure)
            }
        };
        true
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(event = event.name(), state = %model.state, "update");

        let changed = match event {
            Event::ImageSelected { bytes, media_type } => {
                Self::select_image(bytes, &media_type, model);
                true
            }
            Event::AnalyzeRequested => self.start_analysis(model, caps),
            Event::AnalysisCompleted { attempt, outcome } => {
                Self::complete_analysis(attempt, outcome, model)
            }
            Event::ResetRequested => {
                model.clear();
                true
            }
        };

        if changed {
            caps.render.render();
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let state = match &model.state {
            ScanState::Empty => ViewState::Empty,
            ScanState::Previewing => ViewState::Previewing,
            ScanState::Analyzing => ViewState::Analyzing,
            ScanState::Resolved(verdict) => ViewState::Resolved {
                is_recyclable: verdict.is_recyclable,
                headline: verdict.label().to_string(),
                explanation: verdict.explanation.clone(),
            },
            ScanState::Failed(failure) => ViewState::Failed {
                message: failure.message.clone(),
                error_code: failure.kind.code().to_string(),
                is_retryable: failure.kind.is_retryable(),
            },
        };

        let preview = model.image.as_ref().map(|image| PreviewView {
            data_url: image.encoded.data_url(),
            media_type: image.selected.media_type().to_string(),
            size_bytes: image.selected.len(),
        });

        let select_label = if model.image.is_some() {
            SELECT_LABEL_STAGED
        } else {
            SELECT_LABEL_EMPTY
        };

        ViewModel {
            state,
            preview,
            analyze_enabled: Self::check_analyze(model).is_ok(),
            select_label: select_label.to_string(),
            notice: model.notice.as_ref().map(UserFacingError::from),
        }
    }
}
