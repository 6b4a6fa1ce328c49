// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Snapwerk.

use thiserror::Error;

/// Top-level error type for all Snapwerk operations.
#[derive(Debug, Error)]
pub enum SnapwerkError {
    // -- Image errors --
    #[error("image decoding failed: {0}")]
    Decode(String),

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("face location failed: {0}")]
    FaceLocator(String),

    #[error("face model unavailable: {0}")]
    ModelUnavailable(String),

    // -- Batch / request errors --
    #[error("no uploaded image could be processed")]
    EmptyBatch,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("archive packaging failed: {0}")]
    Archive(String),

    // -- Server / storage --
    #[error("server error: {0}")]
    Server(String),

    #[error("snapshot retention failed: {0}")]
    Snapshot(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SnapwerkError>;
