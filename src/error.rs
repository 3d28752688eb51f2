//! Structured error types for the Quire layout engine.
//!
//! Most variants describe conditions the engine recovers from locally: a
//! unit that could not be resolved falls back to natural sizing, content
//! that overflows follows its container's overflow action, an oversized
//! span is clamped. Those are logged and recorded as [`Diagnostic`]s on the
//! finished tree. Only [`LayoutError::StructuralInconsistency`] aborts a
//! pass.

use serde::Serialize;
use thiserror::Error;

use crate::model::ContentId;

/// The unified error type returned by all public Quire API functions.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A relative unit had no definite reference to resolve against.
    #[error("cannot resolve {unit}: {reason}")]
    UnresolvedDimension { unit: String, reason: &'static str },

    /// Content was placed beyond the bounds of its page or container.
    #[error("content overflows its bounds: {0}")]
    OverflowBeyondBounds(String),

    /// A table span reached past the end of the table.
    #[error("invalid table span: {0}")]
    InvalidSpan(String),

    /// The layout state is corrupted. Fatal; no tree is returned.
    #[error("structural inconsistency: {0}")]
    StructuralInconsistency(String),

    /// JSON input failed to parse as a valid document.
    #[error("failed to parse document: {source}{}", hint_suffix(.hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    /// A custom font could not be decoded or parsed.
    #[error("font error: {0}")]
    Font(String),
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {hint}")
    }
}

impl LayoutError {
    /// Whether the pass has to stop. Everything else degrades gracefully.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LayoutError::StructuralInconsistency(_) | LayoutError::Parse { .. }
        )
    }

    fn kind(&self) -> DiagnosticKind {
        match self {
            LayoutError::UnresolvedDimension { .. } => DiagnosticKind::UnresolvedDimension,
            LayoutError::OverflowBeyondBounds(_) => DiagnosticKind::OverflowBeyondBounds,
            LayoutError::InvalidSpan(_) => DiagnosticKind::InvalidSpan,
            LayoutError::Font(_) => DiagnosticKind::Font,
            LayoutError::StructuralInconsistency(_) | LayoutError::Parse { .. } => {
                DiagnosticKind::Fatal
            }
        }
    }
}

impl From<serde_json::Error> for LayoutError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the document schema. Check node types and style names.".to_string()
            }
            serde_json::error::Category::Eof => "Unexpected end of input. Is the JSON truncated?".to_string(),
            serde_json::error::Category::Io => String::new(),
        };
        LayoutError::Parse { source: e, hint }
    }
}

/// Category of a recovered condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    UnresolvedDimension,
    OverflowBeyondBounds,
    InvalidSpan,
    Font,
    Fatal,
}

/// A recovered condition, kept on the finished layout tree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentId>,
}

impl Diagnostic {
    pub fn from_error(error: &LayoutError, content: Option<ContentId>) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_structural_errors_are_fatal() {
        assert!(LayoutError::StructuralInconsistency("orphan".into()).is_fatal());
        assert!(!LayoutError::InvalidSpan("rowspan 4".into()).is_fatal());
        assert!(!LayoutError::OverflowBeyondBounds("image".into()).is_fatal());
    }

    #[test]
    fn parse_error_carries_hint() {
        let err: LayoutError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.contains("Hint"), "missing hint in: {msg}");
    }

    #[test]
    fn diagnostic_keeps_kind() {
        let err = LayoutError::UnresolvedDimension {
            unit: "50%".into(),
            reason: "no container height",
        };
        let diag = Diagnostic::from_error(&err, Some(ContentId(3)));
        assert_eq!(diag.kind, DiagnosticKind::UnresolvedDimension);
        assert!(diag.message.contains("50%"));
    }
}
