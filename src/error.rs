//! Error types for the snote-convert library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`NoteError`] is **fatal for a document**: the container cannot be
//!   decoded at all (wrong magic, truncated footer, no pages) or the
//!   configuration is invalid. Returned as `Err(NoteError)` from the parser.
//!
//! * [`ConversionError`] is **fatal for a conversion attempt**: one phase of the
//!   orchestration (parse, OCR, generate, save) failed. The phase tag lets a
//!   host print a phase-specific message while the original cause stays
//!   reachable through [`std::error::Error::source`].
//!
//! Layer-level decode problems are neither: they are logged and the layer is
//! skipped (see [`crate::pipeline::container`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed error returned by host-side collaborators (OCR engines, generators,
/// metadata stores, output writers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All fatal errors raised while decoding a note container.
#[derive(Debug, Error)]
pub enum NoteError {
    // ── Format errors ─────────────────────────────────────────────────────
    /// The buffer is not a note container at all: too small, wrong file
    /// type tag, or a signature that does not match the vendor pattern.
    #[error("Invalid note container: {0}")]
    InvalidFormat(String),

    // ── Structural errors ─────────────────────────────────────────────────
    /// The container is recognised but internally inconsistent: footer out of
    /// bounds, no pages, truncated block, oversized inflate payload, or a page
    /// that cannot be encoded at its declared dimensions.
    #[error("Note parse error: {0}")]
    Parse(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a decode task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NoteError {
    pub(crate) fn parse(detail: impl Into<String>) -> Self {
        NoteError::Parse(detail.into())
    }

    pub(crate) fn invalid_format(detail: impl Into<String>) -> Self {
        NoteError::InvalidFormat(detail.into())
    }
}

/// The orchestration step in which a conversion attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionPhase {
    Parse,
    Ocr,
    Generate,
    Save,
}

impl fmt::Display for ConversionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversionPhase::Parse => "parse",
            ConversionPhase::Ocr => "ocr",
            ConversionPhase::Generate => "generate",
            ConversionPhase::Save => "save",
        };
        f.write_str(name)
    }
}

/// A conversion attempt failed in `phase`.
///
/// No [`crate::metadata::ConversionMetadata`] is produced for a failed
/// attempt, so whatever the host persisted last stays authoritative.
#[derive(Debug, Error)]
#[error("Conversion failed during {phase}: {source}")]
pub struct ConversionError {
    pub phase: ConversionPhase,
    #[source]
    pub source: BoxError,
}

impl ConversionError {
    pub fn new(phase: ConversionPhase, source: impl Into<BoxError>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }

    /// Attribute `source` to `phase`, unless it already is a
    /// `ConversionError`, in which case it keeps its original phase.
    pub fn wrap(phase: ConversionPhase, source: BoxError) -> Self {
        match source.downcast::<ConversionError>() {
            Ok(inner) => *inner,
            Err(source) => Self { phase, source },
        }
    }

    /// Short, phase-specific message suitable for a notification line.
    pub fn user_message(&self, file_name: &str) -> String {
        match self.phase {
            ConversionPhase::Parse => format!("Parse failed: {file_name}"),
            ConversionPhase::Ocr => format!("OCR failed: {file_name}"),
            ConversionPhase::Generate => format!("Generate failed: {file_name}"),
            ConversionPhase::Save => format!("Save failed: {file_name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn note_error_display() {
        let e = NoteError::Parse("footer address out of bounds".into());
        assert_eq!(e.to_string(), "Note parse error: footer address out of bounds");

        let e = NoteError::InvalidFormat("unsupported file type: mark".into());
        assert!(e.to_string().contains("mark"));
    }

    #[test]
    fn conversion_error_keeps_cause() {
        let e = ConversionError::new(ConversionPhase::Parse, NoteError::parse("no pages"));
        let cause = e.source().expect("cause preserved");
        assert!(cause.to_string().contains("no pages"));
        assert!(e.to_string().contains("parse"));
    }

    #[test]
    fn user_message_per_phase() {
        let cases = [
            (ConversionPhase::Parse, "Parse failed: a.note"),
            (ConversionPhase::Ocr, "OCR failed: a.note"),
            (ConversionPhase::Generate, "Generate failed: a.note"),
            (ConversionPhase::Save, "Save failed: a.note"),
        ];
        for (phase, expected) in cases {
            let e = ConversionError::new(phase, "boom");
            assert_eq!(e.user_message("a.note"), expected);
        }
    }

    #[test]
    fn wrap_keeps_existing_phase() {
        let inner: BoxError = Box::new(ConversionError::new(ConversionPhase::Ocr, "engine gone"));
        let e = ConversionError::wrap(ConversionPhase::Save, inner);
        assert_eq!(e.phase, ConversionPhase::Ocr);

        let e = ConversionError::wrap(ConversionPhase::Save, "disk full".into());
        assert_eq!(e.phase, ConversionPhase::Save);
        assert_eq!(e.source.to_string(), "disk full");
    }

    #[test]
    fn phase_serialises_lowercase() {
        let json = serde_json::to_string(&ConversionPhase::Generate).unwrap();
        assert_eq!(json, "\"generate\"");
    }
}
