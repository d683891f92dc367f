//! Wire format of the inference service and the builder for analysis requests.

use serde::{Deserialize, Serialize};

use crate::image_processing::EncodedImage;

pub const ANALYSIS_INSTRUCTION: &str =
    "Is this object recyclable? Look at the item in the photo and give your verdict.";

pub const SYSTEM_INSTRUCTION: &str = "You are a recycling assistant. Answer in exactly two \
sentences. The first sentence is only the verdict in bold: either **Recyclable** or \
**Not Recyclable**. The second sentence is a short caveat or explanation, for example whether \
the item must be rinsed, emptied or taken apart first.";

const USER_ROLE: &str = "user";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

/// One immutable request body; built once per analysis attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
}

impl AnalysisRequest {
    #[must_use]
    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    #[must_use]
    pub fn system_instruction(&self) -> &SystemInstruction {
        &self.system_instruction
    }

    /// The embedded image, if any.
    #[must_use]
    pub fn inline_data(&self) -> Option<&InlineData> {
        self.contents
            .iter()
            .flat_map(|content| content.parts.iter())
            .find_map(|part| match part {
                Part::InlineData { inline_data } => Some(inline_data),
                Part::Text { .. } => None,
            })
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Clone, Debug)]
pub struct AnalysisRequestBuilder {
    instruction: String,
    system_instruction: String,
}

impl Default for AnalysisRequestBuilder {
    fn default() -> Self {
        Self {
            instruction: ANALYSIS_INSTRUCTION.to_string(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl AnalysisRequestBuilder {
    /// Returns `None` while no image is staged; that means "not ready".
    #[must_use]
    pub fn build(&self, image: Option<&EncodedImage>) -> Option<AnalysisRequest> {
        let image = image?;
        Some(AnalysisRequest {
            contents: vec![Content {
                role: USER_ROLE.to_string(),
                parts: vec![
                    Part::Text {
                        text: self.instruction.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type().to_string(),
                            data: image.data().to_string(),
                        },
                    },
                ],
            }],
            system_instruction: SystemInstruction {
                parts: vec![Part::Text {
                    text: self.system_instruction.clone(),
                }],
            },
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate; empty when there is none.
    #[must_use]
    pub fn first_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}
