use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::image_processing::{EncodedImage, SelectedImage};
use crate::{AppError, ErrorKind};

/// Identifies one analysis attempt so late completions can be told apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(Uuid);

impl AttemptId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_recyclable: bool,
    pub explanation: String,
}

impl Verdict {
    #[must_use]
    pub fn label(&self) -> &'static str {
        if self.is_recyclable {
            "Recyclable"
        } else {
            "Not Recyclable"
        }
    }
}

/// What the user sees when an attempt fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl From<&AppError> for ScanFailure {
    fn from(e: &AppError) -> Self {
        Self {
            kind: e.kind,
            message: e.user_facing_message(),
            detail: Some(e.to_string()),
        }
    }
}

impl From<AppError> for ScanFailure {
    fn from(e: AppError) -> Self {
        Self::from(&e)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Empty,
    Previewing,
    Analyzing,
    Resolved(Verdict),
    Failed(ScanFailure),
}

impl ScanState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Previewing => "previewing",
            Self::Analyzing => "analyzing",
            Self::Resolved(_) => "resolved",
            Self::Failed(_) => "failed",
        }
    }

    #[must_use]
    pub fn is_analyzing(&self) -> bool {
        matches!(self, Self::Analyzing)
    }

    #[must_use]
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Self::Resolved(verdict) => Some(verdict),
            _ => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&ScanFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The selected photo together with its encoded form.
#[derive(Clone, Debug)]
pub struct StagedImage {
    pub selected: SelectedImage,
    pub encoded: EncodedImage,
}

impl StagedImage {
    #[must_use]
    pub fn new(selected: SelectedImage) -> Self {
        let encoded = selected.encode();
        Self { selected, encoded }
    }
}

/// Owned UI state. Only [`crate::App::update`] mutates it.
#[derive(Debug, Default)]
pub struct Model {
    pub(crate) state: ScanState,
    pub(crate) image: Option<StagedImage>,
    pub(crate) in_flight: Option<AttemptId>,
    pub(crate) notice: Option<AppError>,
}

impl Model {
    #[must_use]
    pub fn state(&self) -> &ScanState {
        &self.state
    }

    #[must_use]
    pub fn image(&self) -> Option<&StagedImage> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<AttemptId> {
        self.in_flight
    }

    /// Rejected selection waiting to be shown; not tied to any state.
    #[must_use]
    pub fn notice(&self) -> Option<&AppError> {
        self.notice.as_ref()
    }

    pub(crate) fn clear(&mut self) {
        self.state = ScanState::Empty;
        self.image = None;
        self.in_flight = None;
        self.notice = None;
    }
}
