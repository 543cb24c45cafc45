// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Rescan.

use std::fmt;

use thiserror::Error;

/// Pipeline steps that can fail a page, used to give fatal errors enough
/// context for a user-facing report. Detection stages degrade instead of
/// failing, so they have no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Decode,
    Assemble,
    Persist,
    Write,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Decode => "decode",
            Self::Assemble => "document assembly",
            Self::Persist => "payload persistence",
            Self::Write => "page writer",
        };
        f.write_str(name)
    }
}

/// Top-level error type for all Rescan operations.
#[derive(Debug, Error)]
pub enum RescanError {
    // -- Input errors --
    #[error("image decoding failed: {0}")]
    ImageError(String),

    #[error("source image not found: {0}")]
    SourceMissing(String),

    // -- Collaborator errors --
    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Model errors --
    #[error("invalid rectangle ({x}, {y}, {width}x{height}): width and height must be positive")]
    InvalidRect {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },

    #[error("invalid layout grid: {0}")]
    InvalidGrid(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Pipeline context --
    #[error("{stage} failed{}: {source}", .element.map(|i| format!(" at element {i}")).unwrap_or_default())]
    Stage {
        stage: PipelineStage,
        element: Option<usize>,
        #[source]
        source: Box<RescanError>,
    },

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RescanError {
    /// Attach the pipeline stage (and optionally the element index) to an error.
    pub fn in_stage(self, stage: PipelineStage, element: Option<usize>) -> Self {
        Self::Stage {
            stage,
            element,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any stage wrappers.
    pub fn root(&self) -> &RescanError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RescanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_names_stage_and_element() {
        let err = RescanError::ImageError("bad header".into())
            .in_stage(PipelineStage::Persist, Some(3));
        let msg = err.to_string();
        assert!(msg.contains("payload persistence"), "got {msg}");
        assert!(msg.contains("element 3"), "got {msg}");
        assert!(msg.contains("bad header"), "got {msg}");
    }

    #[test]
    fn stage_error_without_element() {
        let err = RescanError::SourceMissing("/nope.jpg".into()).in_stage(PipelineStage::Decode, None);
        assert_eq!(
            err.to_string(),
            "decode failed: source image not found: /nope.jpg"
        );
    }

    #[test]
    fn root_unwraps_nested_stages() {
        let err = RescanError::OcrError("model".into())
            .in_stage(PipelineStage::Assemble, None)
            .in_stage(PipelineStage::Write, None);
        assert!(matches!(err.root(), RescanError::OcrError(_)));
    }
}
