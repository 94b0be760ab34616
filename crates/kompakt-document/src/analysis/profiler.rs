// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content profiler — classify a document as bitonal, grayscale or colour from
// a low-resolution render of its leading pages.

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use kompakt_core::config::ProfilerConfig;
use kompakt_core::{ContentMode, ContentProfile, SampleCounts};
use tracing::{debug, info, instrument, warn};

use crate::raster::Rasterizer;

/// Per-page classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageClass {
    /// Mean normalised channel spread in `[0, 1]`.
    pub colorfulness: f64,
    /// Fraction of pixels in the dark or light luma tails.
    pub tail_fraction: f64,
    /// Fraction of pixels strictly inside the midtone band.
    pub midtone_fraction: f64,
    pub grayscale_like: bool,
    pub bitonal_like: bool,
}

/// Measure one page against the profiler thresholds.
///
/// A page only counts as bitonal-like when it is also grayscale-like; a
/// saturated two-colour page is still colour content.
pub fn classify_page(image: &RgbImage, config: &ProfilerConfig) -> PageClass {
    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return PageClass {
            colorfulness: 0.0,
            tail_fraction: 0.0,
            midtone_fraction: 0.0,
            grayscale_like: false,
            bitonal_like: false,
        };
    }

    let mut spread_sum = 0.0f64;
    let (mut tails, mut midtones) = (0u64, 0u64);
    for pixel in image.pixels() {
        let [r, g, b] = pixel.0.map(i32::from);
        spread_sum += ((r - g).abs() + (g - b).abs() + (r - b).abs()) as f64 / 3.0 / 255.0;

        // ITU-R BT.601 luma, as used by `image` for grayscale conversion.
        let luma = (299 * r + 587 * g + 114 * b) / 1000;
        if luma <= config.dark_tail as i32 || luma >= config.light_tail as i32 {
            tails += 1;
        }
        if luma > config.midtone_low as i32 && luma < config.midtone_high as i32 {
            midtones += 1;
        }
    }

    let n = total as f64;
    let colorfulness = spread_sum / n;
    let tail_fraction = tails as f64 / n;
    let midtone_fraction = midtones as f64 / n;
    let grayscale_like = colorfulness < config.colorfulness_threshold;
    let bitonal_like = grayscale_like
        && tail_fraction >= config.tail_fraction
        && midtone_fraction <= config.midtone_fraction;

    PageClass {
        colorfulness,
        tail_fraction,
        midtone_fraction,
        grayscale_like,
        bitonal_like,
    }
}

/// Combine page classes: a bitonal-like majority wins, then a
/// grayscale-like majority, otherwise colour. `None` for no pages.
pub fn aggregate(classes: &[PageClass]) -> Option<ContentProfile> {
    if classes.is_empty() {
        return None;
    }
    let counts = SampleCounts {
        color: classes.iter().filter(|c| !c.grayscale_like).count() as u32,
        grayscale_like: classes.iter().filter(|c| c.grayscale_like).count() as u32,
        bitonal_like: classes.iter().filter(|c| c.bitonal_like).count() as u32,
        total: classes.len() as u32,
    };

    let mode = if counts.bitonal_like * 2 >= counts.total {
        ContentMode::Bitonal
    } else if counts.grayscale_like * 2 >= counts.total {
        ContentMode::Grayscale
    } else {
        ContentMode::Color
    };

    Some(ContentProfile {
        mode,
        sample_counts: counts,
    })
}

/// Samples the first pages of a document and classifies its content.
#[derive(Clone)]
pub struct ContentProfiler {
    rasterizer: Arc<dyn Rasterizer>,
    config: ProfilerConfig,
}

impl ContentProfiler {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, config: ProfilerConfig) -> Self {
        Self { rasterizer, config }
    }

    /// Classify `pdf`. Returns `None` (unknown mode) when nothing could be
    /// rendered; a partial render is classified from the pages that exist.
    #[instrument(skip(self, pdf), fields(pdf = %pdf.display()))]
    pub async fn profile(&self, pdf: &Path) -> Option<ContentProfile> {
        let last = self.config.sample_pages.max(1);
        let output = match self.rasterizer.rasterize(pdf, 1, last, self.config.dpi).await {
            Ok(output) => output,
            Err(err) => {
                warn!(%err, "content profiling unavailable");
                return None;
            }
        };
        if !output.missing().is_empty() {
            debug!(missing = ?output.missing(), "profiling from a partial render");
        }

        let pages = output.into_pages();
        let config = self.config.clone();
        let classes = tokio::task::spawn_blocking(move || {
            pages
                .iter()
                .map(|page| classify_page(&page.image, &config))
                .collect::<Vec<_>>()
        })
        .await
        .ok()?;

        let profile = aggregate(&classes)?;
        info!(
            mode = %profile.mode,
            color = profile.sample_counts.color,
            grayscale_like = profile.sample_counts.grayscale_like,
            bitonal_like = profile.sample_counts.bitonal_like,
            sampled = profile.sample_counts.total,
            "content profiled"
        );
        Some(profile)
    }
}
