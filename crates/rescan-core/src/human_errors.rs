// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the people photographing their pages.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The severity drives how the caller presents it.

use crate::error::{PipelineStage, RescanError};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something flaky (OCR, disk); trying again may work.
    Transient,
    /// The user must do something (retake the photo, pick another file).
    ActionRequired,
    /// Cannot be fixed by retrying: a bug or unsupported input.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the caller may simply retry.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `RescanError` into a `HumanError`.
///
/// Stage wrappers are unwrapped; the stage name is appended to the
/// suggestion so that support reports carry it.
pub fn humanize_error(err: &RescanError) -> HumanError {
    match err {
        RescanError::Stage {
            stage,
            element,
            source,
        } => {
            let mut human = humanize_error(source);
            let location = match element {
                Some(index) => format!("{stage}, element {index}"),
                None => stage.to_string(),
            };
            human.suggestion = format!("{} (Step: {location})", human.suggestion);
            if *stage == PipelineStage::Decode {
                human.severity = Severity::ActionRequired;
            }
            human
        }

        // -- Input errors --
        RescanError::ImageError(_) => HumanError {
            message: "We couldn't open this photo.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        RescanError::SourceMissing(_) => HumanError {
            message: "The photo couldn't be found.".into(),
            suggestion: "It may have been moved or deleted. Try choosing the photo again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Collaborators --
        RescanError::OcrError(_) => HumanError {
            message: "Text recognition didn't work on this photo.".into(),
            suggestion: "Try photographing the page again with better lighting, making sure the text is sharp and the whole page is visible.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        RescanError::PdfError(_) => HumanError {
            message: "We couldn't create the PDF.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Model --
        RescanError::InvalidRect { .. } | RescanError::InvalidGrid(_) => HumanError {
            message: "The page layout couldn't be rebuilt.".into(),
            suggestion: "Try photographing the page again, straight on and filling the frame.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        RescanError::Config(detail) => HumanError {
            message: "The analysis settings are not valid.".into(),
            suggestion: format!("Fix the settings file or go back to a preset. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Storage --
        RescanError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "We don't have permission to use that file or folder.".into(),
                    suggestion: "Check the permissions, or choose a different location.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        RescanError::Serialization(_) => HumanError {
            message: "The saved page data couldn't be read or written.".into(),
            suggestion: "Try analysing the photo again. If this keeps happening, please report it.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecodable_photo_needs_action() {
        let human = humanize_error(&RescanError::ImageError("unsupported format".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn ocr_failure_is_transient() {
        let human = humanize_error(&RescanError::OcrError("model crashed".into()));
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn stage_context_reaches_the_suggestion() {
        let err = RescanError::Io(std::io::Error::other("disk full"))
            .in_stage(PipelineStage::Persist, Some(2));
        let human = humanize_error(&err);
        assert!(human.suggestion.contains("payload persistence, element 2"), "{}", human.suggestion);
        assert_eq!(human.severity, Severity::Transient);
    }

    #[test]
    fn decode_stage_is_always_action_required() {
        let err = RescanError::Io(std::io::Error::other("truncated"))
            .in_stage(PipelineStage::Decode, None);
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }

    #[test]
    fn missing_file_is_action_required() {
        let err = RescanError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }
}
