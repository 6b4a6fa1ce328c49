// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for API clients.
//
// Every technical error is mapped to a plain message, a suggestion, and the
// HTTP status the server answers with. The severity drives whether a client
// should retry unchanged.

use crate::error::SnapwerkError;

/// Severity of an error from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Server-side hiccup; retrying the same request may succeed.
    Transient,
    /// The request must be changed before it can succeed.
    ActionRequired,
    /// Cannot be fixed by retrying (damaged image, missing model).
    Permanent,
}

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain summary (the `error` field of JSON responses).
    pub message: String,
    /// What the caller should try next.
    pub suggestion: String,
    /// HTTP status code to answer with.
    pub status: u16,
    pub severity: Severity,
}

impl HumanError {
    pub fn retriable(&self) -> bool {
        self.severity == Severity::Transient
    }
}

/// Convert a `SnapwerkError` into a `HumanError`.
pub fn humanize_error(err: &SnapwerkError) -> HumanError {
    match err {
        // -- Image errors --
        SnapwerkError::Decode(_) => HumanError {
            message: "The uploaded file is not a readable image.".into(),
            suggestion: "Upload a JPEG, PNG, TIFF or WebP file.".into(),
            status: 422,
            severity: Severity::Permanent,
        },

        SnapwerkError::Encode(_) => HumanError {
            message: "The processed image could not be encoded.".into(),
            suggestion: "Try again; if this keeps happening, try a smaller image.".into(),
            status: 500,
            severity: Severity::Transient,
        },

        SnapwerkError::FaceLocator(_) => HumanError {
            message: "Face detection failed for this image.".into(),
            suggestion: "Try again without the `faces` action.".into(),
            status: 500,
            severity: Severity::Transient,
        },

        SnapwerkError::ModelUnavailable(_) => HumanError {
            message: "Face detection is not available on this server.".into(),
            suggestion: "Remove `faces` from the action list, or ask the operator to install the face model.".into(),
            status: 503,
            severity: Severity::Permanent,
        },

        // -- Batch / request errors --
        SnapwerkError::EmptyBatch => HumanError {
            message: "No valid images processed".into(),
            suggestion: "Check that the files are valid images and try again.".into(),
            status: 400,
            severity: Severity::ActionRequired,
        },

        SnapwerkError::InvalidRequest(detail) => HumanError {
            message: detail.clone(),
            suggestion: "Send a multipart/form-data POST with at least one file part.".into(),
            status: 400,
            severity: Severity::ActionRequired,
        },

        SnapwerkError::PayloadTooLarge { limit } => HumanError {
            message: "The upload is too large.".into(),
            suggestion: format!("Keep the whole request below {limit} bytes, or split it into several requests."),
            status: 413,
            severity: Severity::ActionRequired,
        },

        SnapwerkError::Archive(_) => HumanError {
            message: "The results could not be packaged.".into(),
            suggestion: "Try again with fewer images.".into(),
            status: 500,
            severity: Severity::Transient,
        },

        // -- Server / storage --
        SnapwerkError::Server(_)
        | SnapwerkError::Snapshot(_)
        | SnapwerkError::Config(_)
        | SnapwerkError::Serialization(_) => HumanError {
            message: "The server had an internal problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            status: 500,
            severity: Severity::Transient,
        },

        SnapwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "The server cannot write its output directory.".into(),
                    suggestion: "Ask the operator to check the permissions of the output directory.".into(),
                    status: 500,
                    severity: Severity::Permanent,
                }
            } else {
                HumanError {
                    message: "The server had a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, the server's disk may be full.".into(),
                    status: 500,
                    severity: Severity::Transient,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_is_a_bad_request() {
        let human = humanize_error(&SnapwerkError::EmptyBatch);
        assert_eq!(human.status, 400);
        assert_eq!(human.message, "No valid images processed");
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable());
    }

    #[test]
    fn invalid_request_keeps_detail() {
        let err = SnapwerkError::InvalidRequest("No image part in request".into());
        let human = humanize_error(&err);
        assert_eq!(human.status, 400);
        assert_eq!(human.message, "No image part in request");
    }

    #[test]
    fn oversized_body_mentions_limit() {
        let human = humanize_error(&SnapwerkError::PayloadTooLarge { limit: 1024 });
        assert_eq!(human.status, 413);
        assert!(human.suggestion.contains("1024"));
    }

    #[test]
    fn locator_fault_is_transient() {
        let human = humanize_error(&SnapwerkError::FaceLocator("cascade crashed".into()));
        assert!(human.retriable());
        assert_eq!(human.status, 500);
    }

    #[test]
    fn permission_denied_is_permanent() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let human = humanize_error(&SnapwerkError::Io(io));
        assert_eq!(human.severity, Severity::Permanent);
    }
}
