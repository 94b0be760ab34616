// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Kompakt compression engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Dominant visual mode of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    /// Pure black/white content, typical of scanned text.
    Bitonal,
    /// Neutral tones without meaningful chroma.
    Grayscale,
    /// Anything with real colour.
    Color,
}

impl ContentMode {
    /// Whether anti-noise (monochrome-first) strategies suit this mode.
    pub fn is_monochrome(&self) -> bool {
        matches!(self, Self::Bitonal | Self::Grayscale)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bitonal => "bitonal",
            Self::Grayscale => "grayscale",
            Self::Color => "color",
        }
    }
}

impl std::fmt::Display for ContentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-page classification tallies behind a [`ContentProfile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    pub color: u32,
    pub grayscale_like: u32,
    pub bitonal_like: u32,
    pub total: u32,
}

/// Classification of a document's content, produced once per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentProfile {
    pub mode: ContentMode,
    pub sample_counts: SampleCounts,
}

/// The closed set of compression strategies the engine knows about.
///
/// The declaration order is the canonical generation order, which the
/// selection engine uses as its tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Structural, lossless-leaning optimisation (qpdf or in-process).
    Conservative,
    HighQuality,
    Balanced,
    AggressiveSafe,
    /// Monochrome-first: CCITT for 1-bit images, gray conversion, no chroma.
    MonoLossless,
    /// Gray conversion with Flate-only image encoding.
    GrayscaleClean,
    /// No downsampling, high JPEG quality for small coloured detail.
    ColorPreserve,
    /// OCR-aware recompression via an external OCR/MRC backend.
    OcrMrc,
    /// Pixel pipeline: rasterize, binarize, rebuild.
    RasterBitonal,
    /// Pixel pipeline: rasterize, denoise gray, rebuild.
    RasterGrayscale,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 10] = [
        Self::Conservative,
        Self::HighQuality,
        Self::Balanced,
        Self::AggressiveSafe,
        Self::MonoLossless,
        Self::GrayscaleClean,
        Self::ColorPreserve,
        Self::OcrMrc,
        Self::RasterBitonal,
        Self::RasterGrayscale,
    ];

    /// Stable snake-case name used in logs, records and file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::HighQuality => "high_quality",
            Self::Balanced => "balanced",
            Self::AggressiveSafe => "aggressive_safe",
            Self::MonoLossless => "mono_lossless",
            Self::GrayscaleClean => "grayscale_clean",
            Self::ColorPreserve => "color_preserve",
            Self::OcrMrc => "ocr_mrc",
            Self::RasterBitonal => "raster_bitonal",
            Self::RasterGrayscale => "raster_grayscale",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Strategies that avoid chroma-introducing encoders for monochrome input.
    pub fn is_anti_noise(&self) -> bool {
        matches!(self, Self::MonoLossless | Self::GrayscaleClean)
    }

    /// Strategies that rebuild pages from pixels.
    pub fn is_pixel_pipeline(&self) -> bool {
        matches!(self, Self::RasterBitonal | Self::RasterGrayscale)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Size snapshot of the input document, taken once per run.
///
/// Every reduction figure in a run is computed against this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalSnapshot {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl OriginalSnapshot {
    /// Stat the file once and remember its size.
    pub fn capture(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let size_bytes = std::fs::metadata(path)?.len();
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes,
        })
    }

    /// Percent size reduction of `size_bytes` relative to this snapshot.
    pub fn reduction_percent(&self, size_bytes: u64) -> f64 {
        reduction_percent(self.size_bytes, size_bytes)
    }
}

/// Percent size reduction from `original` to `candidate`; 0 when the
/// original is empty.
pub fn reduction_percent(original: u64, candidate: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - candidate as f64) / original as f64 * 100.0
}

/// One encoded alternative of the input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub strategy: StrategyKind,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Fidelity of one candidate relative to its original. Unset fields mean the
/// metric could not be measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub psnr: Option<f64>,
    pub ssim: Option<f64>,
    pub lpips: Option<f64>,
    pub sharpness: Option<f64>,
}

impl QualityMetrics {
    pub fn is_empty(&self) -> bool {
        self.psnr.is_none() && self.ssim.is_none() && self.lpips.is_none() && self.sharpness.is_none()
    }
}

/// Metrics for one compared page pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// 1-indexed page number.
    pub page: u32,
    pub psnr: Option<f64>,
    pub ssim: Option<f64>,
    pub lpips: Option<f64>,
    pub sharpness: Option<f64>,
}

/// The chosen candidate and the evidence used to choose it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    pub candidate: Candidate,
    pub score: f64,
    pub reduction_percent: f64,
    pub metrics: Option<QualityMetrics>,
}

/// Why the original was kept unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreserveReason {
    /// Generation produced nothing usable.
    NoCandidates,
    /// The selection and every fallback failed the quality gate.
    QualityRejected,
    /// The surviving candidate was not smaller than the original.
    NotSmaller,
}

/// Terminal state of the quality gate for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateOutcome {
    Passed,
    Recovered { rejected: StrategyKind },
    Preserved { reason: PreserveReason },
}

/// Method name recorded when the original is kept.
pub const NO_CHANGE_METHOD: &str = "no_change";

/// Score table row for one generated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub method: String,
    pub size_bytes: u64,
    pub reduction_percent: f64,
    pub score: f64,
}

/// Result record for one processed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionRecord {
    pub original_file: String,
    pub final_file: String,
    pub original_size_bytes: u64,
    pub final_size_bytes: u64,
    pub reduction_percent: f64,
    pub method: String,
    pub score: f64,
    pub content_mode: Option<ContentMode>,
    pub gate: GateOutcome,
    pub psnr: Option<f64>,
    pub ssim: Option<f64>,
    pub lpips: Option<f64>,
    pub sharpness: Option<f64>,
    pub candidates: Vec<CandidateSummary>,
    pub elapsed_ms: u64,
}

impl CompressionRecord {
    pub fn original_mb(&self) -> f64 {
        bytes_to_mb(self.original_size_bytes)
    }

    pub fn final_mb(&self) -> f64 {
        bytes_to_mb(self.final_size_bytes)
    }

    pub fn is_unchanged(&self) -> bool {
        self.method == NO_CHANGE_METHOD
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
