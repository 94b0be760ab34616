// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration. Every tunable threshold of the profiler, assessor,
// scoring curve and quality gate lives here so none of it is hard-coded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{KompaktError, Result};
use crate::types::{ContentMode, StrategyKind};

/// Complete engine settings. Loadable from JSON; missing fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub profiler: ProfilerConfig,
    pub assessor: AssessorConfig,
    pub gate: GateConfig,
    pub scoring: ScoringPolicy,
    pub features: FeatureFlags,
    pub ocr: OcrConfig,
    pub limits: Limits,
}

impl EngineConfig {
    /// Load settings from a JSON file and validate them.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!("engine configuration loaded");
        Ok(config)
    }

    /// Reject settings that would make the policy meaningless.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        if !(s.low_cutoff < s.peak_cutoff && s.peak_cutoff < s.suspicious_cutoff) {
            return Err(KompaktError::Config(format!(
                "scoring cutoffs must increase: {} < {} < {}",
                s.low_cutoff, s.peak_cutoff, s.suspicious_cutoff
            )));
        }
        if self.ocr.language.trim().is_empty() {
            return Err(KompaktError::Config("ocr language must not be empty".into()));
        }
        if self.limits.max_workers == 0 {
            return Err(KompaktError::Config("max_workers must be at least 1".into()));
        }
        if self.assessor.pages == 0 || self.profiler.sample_pages == 0 {
            return Err(KompaktError::Config("page samples must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.gate.ssim_threshold) {
            return Err(KompaktError::Config(format!(
                "ssim_threshold {} outside [0, 1]",
                self.gate.ssim_threshold
            )));
        }
        Ok(())
    }
}

/// Content Profiler sampling and classification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Number of leading pages to sample.
    pub sample_pages: u32,
    /// Sampling resolution.
    pub dpi: u32,
    /// Normalised mean channel difference below which a page is grayscale-like.
    pub colorfulness_threshold: f64,
    /// Luma at or below this value counts as a dark tail sample.
    pub dark_tail: u8,
    /// Luma at or above this value counts as a light tail sample.
    pub light_tail: u8,
    /// Minimum tail fraction for a bitonal-like page.
    pub tail_fraction: f64,
    /// Midtone band, exclusive on both ends.
    pub midtone_low: u8,
    pub midtone_high: u8,
    /// Maximum midtone fraction for a bitonal-like page.
    pub midtone_fraction: f64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            sample_pages: 2,
            dpi: 50,
            colorfulness_threshold: 0.04,
            dark_tail: 48,
            light_tail: 208,
            tail_fraction: 0.90,
            midtone_low: 80,
            midtone_high: 176,
            midtone_fraction: 0.05,
        }
    }
}

/// Quality Assessor sampling and optional metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessorConfig {
    /// Leading pages compared per candidate.
    pub pages: u32,
    pub dpi: u32,
    /// Compute SSIM in addition to PSNR.
    pub ssim_enabled: bool,
    /// Path to an LPIPS model. LPIPS stays unset when absent.
    pub lpips_model: Option<PathBuf>,
}

impl Default for AssessorConfig {
    fn default() -> Self {
        Self {
            pages: 3,
            dpi: 200,
            ssim_enabled: false,
            lpips_model: None,
        }
    }
}

/// How individual metric gates combine into one verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// More than half of the evaluated gates must pass.
    Majority,
    /// Every evaluated gate must pass.
    Unanimous,
    /// One passing gate is enough.
    Any,
}

/// Quality Gate thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// PSNR floor for colour and unclassified documents.
    pub psnr_color_db: f64,
    pub psnr_grayscale_db: f64,
    pub psnr_bitonal_db: f64,
    pub ssim_threshold: f64,
    /// LPIPS ceiling (lower is better).
    pub lpips_threshold: f64,
    pub policy: GatePolicy,
}

impl GateConfig {
    /// PSNR floor for a document of the given mode; `None` means unknown.
    pub fn psnr_threshold(&self, mode: Option<ContentMode>) -> f64 {
        match mode {
            Some(ContentMode::Bitonal) => self.psnr_bitonal_db,
            Some(ContentMode::Grayscale) => self.psnr_grayscale_db,
            Some(ContentMode::Color) | None => self.psnr_color_db,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            psnr_color_db: 35.0,
            psnr_grayscale_db: 33.0,
            psnr_bitonal_db: 30.0,
            ssim_threshold: 0.85,
            lpips_threshold: 0.15,
            policy: GatePolicy::Majority,
        }
    }
}

/// Reduction curve breakpoints and bonuses for the Selection Engine.
///
/// The >80% "suspicious" cutoff is a tuning parameter; text-only documents
/// may legitimately exceed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub low_cutoff: f64,
    pub peak_cutoff: f64,
    pub suspicious_cutoff: f64,
    /// Score at zero reduction.
    pub low_base: f64,
    /// Score at `low_cutoff`.
    pub rising_base: f64,
    /// Score at `peak_cutoff` (rising_base + rising_gain).
    pub rising_gain: f64,
    /// Score just past `peak_cutoff`.
    pub falling_base: f64,
    /// Drop from `peak_cutoff` to `suspicious_cutoff`.
    pub falling_drop: f64,
    /// Score just past `suspicious_cutoff`; loses one point per extra percent.
    pub destructive_base: f64,
    /// Flat priors for the general-purpose profiles.
    pub conservative_prior: f64,
    pub high_quality_prior: f64,
    pub balanced_prior: f64,
    pub sharpness_penalty_max: f64,
    pub sharpness_reward_max: f64,
    pub anti_noise_bonus: f64,
    pub advanced_raster_bonus: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            low_cutoff: 5.0,
            peak_cutoff: 50.0,
            suspicious_cutoff: 80.0,
            low_base: 70.0,
            rising_base: 80.0,
            rising_gain: 20.0,
            falling_base: 95.0,
            falling_drop: 15.0,
            destructive_base: 60.0,
            conservative_prior: 10.0,
            high_quality_prior: 8.0,
            balanced_prior: 5.0,
            sharpness_penalty_max: 20.0,
            sharpness_reward_max: 10.0,
            anti_noise_bonus: 6.0,
            advanced_raster_bonus: 2.5,
        }
    }
}

impl ScoringPolicy {
    /// Prior bonus for a strategy, independent of its output.
    pub fn prior(&self, strategy: StrategyKind) -> f64 {
        match strategy {
            StrategyKind::Conservative => self.conservative_prior,
            StrategyKind::HighQuality => self.high_quality_prior,
            StrategyKind::Balanced => self.balanced_prior,
            _ => 0.0,
        }
    }
}

/// Opt-in behaviours.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Attempt monochrome-first profiles regardless of content mode.
    pub anti_noise: bool,
    /// Attempt pixel-level rebuild pipelines.
    pub advanced_raster: bool,
    /// Measure sharpness of every candidate and fold it into the score.
    pub sharpness_aware: bool,
    /// Additionally reward candidates sharper than the original.
    pub prefer_sharpness: bool,
}

/// Settings handed to the OCR/MRC backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language code(s), e.g. `eng` or `eng+spa`.
    pub language: String,
    /// Re-OCR pages that already carry a text layer.
    pub force: bool,
    /// Allow lossy JBIG2 when jbig2enc is installed.
    pub jbig2_lossy: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".into(),
            force: false,
            jbig2_lossy: true,
        }
    }
}

/// Resource bounds for external work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Concurrent encoder / assessor tasks per document.
    pub max_workers: usize,
    pub encode_timeout_secs: u64,
    pub raster_timeout_secs: u64,
    /// Resolution used by the pixel pipelines.
    pub raster_pipeline_dpi: u32,
}

impl Limits {
    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }

    pub fn raster_timeout(&self) -> Duration {
        Duration::from_secs(self.raster_timeout_secs)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_workers: 4,
            encode_timeout_secs: 300,
            raster_timeout_secs: 180,
            raster_pipeline_dpi: 300,
        }
    }
}
