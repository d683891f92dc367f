//! Turns the service's free-text answer into a [`Verdict`].

use thiserror::Error;
use tracing::warn;

use crate::model::Verdict;

// Lowercase; matched against an ASCII-lowercased copy so byte offsets line up.
const NOT_RECYCLABLE_MARKER: &str = "**not recyclable**";
const RECYCLABLE_MARKER: &str = "**recyclable**";

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum InterpretError {
    #[error("inference service returned no text")]
    EmptyResponse,
}

/// Parses a response such as `**Recyclable** Rinse it first.`
///
/// The earliest bolded marker wins. Without any marker the whole text becomes
/// the explanation and the verdict falls back to not recyclable.
pub fn interpret(raw: &str) -> Result<Verdict, InterpretError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(InterpretError::EmptyResponse);
    }

    let lowered = text.to_ascii_lowercase();
    let marker = [(NOT_RECYCLABLE_MARKER, false), (RECYCLABLE_MARKER, true)]
        .into_iter()
        .filter_map(|(marker, is_recyclable)| {
            lowered
                .find(marker)
                .map(|start| (start, start + marker.len(), is_recyclable))
        })
        .min_by_key(|(start, _, _)| *start);

    match marker {
        Some((_, end, is_recyclable)) => Ok(Verdict {
            is_recyclable,
            explanation: text[end..]
                .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ':' | '-'))
                .trim_end()
                .to_string(),
        }),
        None => {
            warn!(len = text.len(), "no verdict marker in response, defaulting to not recyclable");
            Ok(Verdict {
                is_recyclable: false,
                explanation: text.to_string(),
            })
        }
    }
}
