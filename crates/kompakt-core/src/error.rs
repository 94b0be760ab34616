// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Kompakt.

use thiserror::Error;

/// Top-level error type for all Kompakt operations.
#[derive(Debug, Error)]
pub enum KompaktError {
    // -- Tooling --
    #[error("external tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    // -- Candidate generation --
    #[error("candidate generation failed for {strategy}: {detail}")]
    Generation { strategy: String, detail: String },

    // -- Measurement --
    #[error("rasterization failed: {0}")]
    Rasterization(String),

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("image decoding failed: {0}")]
    Image(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KompaktError>;

/// How an error is absorbed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A capability is missing; skip the affected profiles or gates.
    ToolUnavailable,
    /// One encoding attempt failed; the candidate is omitted.
    Generation,
    /// A measurement could not be taken; the metric stays unset.
    Measurement,
    /// No usable I/O path; surfaced to the caller.
    Fatal,
}

impl KompaktError {
    /// Classify this error into the degradation bucket the pipeline applies.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ToolUnavailable(_) => ErrorClass::ToolUnavailable,
            Self::Timeout { .. } | Self::Generation { .. } => ErrorClass::Generation,
            Self::Rasterization(_) | Self::Image(_) => ErrorClass::Measurement,
            Self::Pdf(_) => ErrorClass::Generation,
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) => ErrorClass::Fatal,
        }
    }

    /// Stable category name carrying no message text, paths or file names.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolUnavailable(_) => "tool_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Generation { .. } => "generation",
            Self::Rasterization(_) => "rasterization",
            Self::Pdf(_) => "pdf",
            Self::Image(_) => "image",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Convenience constructor for a failed strategy invocation.
    pub fn generation(strategy: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Generation {
            strategy: strategy.into(),
            detail: detail.into(),
        }
    }
}
