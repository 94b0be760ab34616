// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quality assessor — measure how faithfully a candidate PDF reproduces the
// original by rasterizing both and comparing pages pairwise.
//
// Assessment never fails: anything that cannot be measured is left unset.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use image::{GrayImage, RgbImage};
use image::imageops::grayscale;
use kompakt_core::config::AssessorConfig;
use kompakt_core::{PageMetrics, QualityMetrics};
use tracing::{debug, instrument, warn};

use super::lpips::LpipsModel;
use super::psnr::psnr;
use super::sharpness::laplacian_variance;
use super::ssim::ssim;
use crate::raster::{RasterPage, Rasterizer, crop_to_common, pair_pages};

/// Averaged metrics plus the per-page breakdown they came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assessment {
    pub metrics: QualityMetrics,
    pub pages: Vec<PageMetrics>,
}

impl Assessment {
    /// Plain-text report: overall figures, then one line per page.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Quality assessment ({} page(s) compared)", self.pages.len());
        let _ = writeln!(out, "  PSNR:      {}", fmt_metric(self.metrics.psnr, " dB", 2));
        let _ = writeln!(out, "  SSIM:      {}", fmt_metric(self.metrics.ssim, "", 4));
        let _ = writeln!(out, "  LPIPS:     {}", fmt_metric(self.metrics.lpips, "", 4));
        let _ = writeln!(out, "  Sharpness: {}", fmt_metric(self.metrics.sharpness, "", 1));
        for page in &self.pages {
            let _ = writeln!(
                out,
                "  page {:>3}: psnr {} | ssim {} | lpips {} | sharpness {}",
                page.page,
                fmt_metric(page.psnr, " dB", 2),
                fmt_metric(page.ssim, "", 4),
                fmt_metric(page.lpips, "", 4),
                fmt_metric(page.sharpness, "", 1),
            );
        }
        out
    }
}

fn fmt_metric(value: Option<f64>, unit: &str, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}{unit}"),
        None => "n/a".to_string(),
    }
}

/// Which metrics to compute during a comparison.
#[derive(Debug, Clone, Default)]
pub struct MetricSelection {
    pub ssim: bool,
    pub sharpness: bool,
    pub lpips: Option<Arc<LpipsModel>>,
}

/// Rendered pages of the original, reused across every candidate.
#[derive(Debug, Clone)]
pub struct ReferenceRender {
    pages: Arc<Vec<RasterPage>>,
}

impl ReferenceRender {
    pub fn pages(&self) -> &[RasterPage] {
        &self.pages
    }

    /// Mean sharpness of the original pages.
    pub fn sharpness(&self) -> Option<f64> {
        mean(self.pages.iter().filter_map(|page| laplacian_variance(&luma(&page.image))))
    }
}

/// Compares candidates against an original through a [`Rasterizer`].
#[derive(Clone)]
pub struct QualityAssessor {
    rasterizer: Arc<dyn Rasterizer>,
    pages: u32,
    dpi: u32,
    selection: MetricSelection,
}

impl QualityAssessor {
    /// Build an assessor from configuration, loading the LPIPS model if one
    /// is configured.
    pub fn new(rasterizer: Arc<dyn Rasterizer>, config: &AssessorConfig) -> Self {
        let lpips = config
            .lpips_model
            .as_deref()
            .and_then(LpipsModel::load)
            .map(Arc::new);
        Self {
            rasterizer,
            pages: config.pages.max(1),
            dpi: config.dpi,
            selection: MetricSelection {
                ssim: config.ssim_enabled,
                sharpness: false,
                lpips,
            },
        }
    }

    /// Also measure candidate sharpness.
    pub fn with_sharpness(mut self, enabled: bool) -> Self {
        self.selection.sharpness = enabled;
        self
    }

    pub fn lpips_available(&self) -> bool {
        self.selection.lpips.is_some()
    }

    /// Render the leading pages of the original once.
    #[instrument(skip(self, original), fields(original = %original.display()))]
    pub async fn render_reference(&self, original: &Path) -> Option<ReferenceRender> {
        match self.rasterizer.rasterize(original, 1, self.pages, self.dpi).await {
            Ok(output) => Some(ReferenceRender {
                pages: Arc::new(output.into_pages()),
            }),
            Err(err) => {
                warn!(%err, "could not rasterize original; metrics will be unset");
                None
            }
        }
    }

    /// Compare `candidate` against a previously rendered original.
    #[instrument(skip(self, reference, candidate), fields(candidate = %candidate.display()))]
    pub async fn assess_against(&self, reference: &ReferenceRender, candidate: &Path) -> Assessment {
        let rendered = match self.rasterizer.rasterize(candidate, 1, self.pages, self.dpi).await {
            Ok(output) => output.into_pages(),
            Err(err) => {
                warn!(%err, "could not rasterize candidate; metrics will be unset");
                return Assessment::default();
            }
        };

        let reference = Arc::clone(&reference.pages);
        let selection = self.selection.clone();
        let joined = tokio::task::spawn_blocking(move || {
            compare_pages(&reference, &rendered, &selection)
        })
        .await;

        match joined {
            Ok(assessment) => {
                debug!(
                    psnr = ?assessment.metrics.psnr,
                    ssim = ?assessment.metrics.ssim,
                    pages = assessment.pages.len(),
                    "candidate assessed"
                );
                assessment
            }
            Err(err) => {
                warn!(%err, "metric computation aborted");
                Assessment::default()
            }
        }
    }

    /// Render the original and compare one candidate against it.
    pub async fn assess(&self, original: &Path, candidate: &Path) -> Assessment {
        match self.render_reference(original).await {
            Some(reference) => self.assess_against(&reference, candidate).await,
            None => Assessment::default(),
        }
    }
}

/// Pairwise comparison of two renders. Pages are paired by number and cropped
/// to their common size; each metric is the mean over compared pages.
pub fn compare_pages(
    reference: &[RasterPage],
    candidate: &[RasterPage],
    selection: &MetricSelection,
) -> Assessment {
    let mut pages = Vec::new();
    for (original, rendered) in pair_pages(reference, candidate) {
        let (a, b) = crop_to_common(&original.image, &rendered.image);
        if a.width() == 0 || a.height() == 0 {
            continue;
        }
        let (luma_a, luma_b) = (luma(&a), luma(&b));
        pages.push(PageMetrics {
            page: original.number,
            psnr: psnr(&luma_a, &luma_b),
            ssim: selection.ssim.then(|| ssim(&luma_a, &luma_b)).flatten(),
            lpips: selection.lpips.as_ref().and_then(|model| model.distance(&a, &b)),
            sharpness: selection.sharpness.then(|| laplacian_variance(&luma_b)).flatten(),
        });
    }

    let metrics = QualityMetrics {
        psnr: mean(pages.iter().filter_map(|p| p.psnr)),
        ssim: mean(pages.iter().filter_map(|p| p.ssim)),
        lpips: mean(pages.iter().filter_map(|p| p.lpips)),
        sharpness: mean(pages.iter().filter_map(|p| p.sharpness)),
    };
    Assessment { metrics, pages }
}

fn luma(image: &RgbImage) -> GrayImage {
    grayscale(image)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u32), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterOutput;
    use async_trait::async_trait;
    use image::Rgb;
    use kompakt_core::error::{KompaktError, Result};

    fn page(number: u32, shade: u8) -> RasterPage {
        RasterPage {
            number,
            image: RgbImage::from_fn(24, 24, |x, y| {
                if (x / 3 + y / 3) % 2 == 0 { Rgb([shade, shade, shade]) } else { Rgb([255, 255, 255]) }
            }),
        }
    }

    /// Serves pages keyed by file name: "a.pdf" renders dark, "b.pdf" lighter,
    /// anything else fails.
    struct FakeRasterizer;

    #[async_trait]
    impl Rasterizer for FakeRasterizer {
        async fn rasterize(&self, pdf: &Path, first: u32, last: u32, _dpi: u32) -> Result<RasterOutput> {
            let shade = match pdf.file_name().and_then(|n| n.to_str()) {
                Some("a.pdf") => 0,
                Some("b.pdf") => 40,
                Some("short.pdf") => return Ok(RasterOutput::from_range(vec![page(1, 0)], first, last)),
                _ => return Err(KompaktError::Rasterization("boom".into())),
            };
            Ok(RasterOutput::from_range((first..=last).map(|n| page(n, shade)).collect(), first, last))
        }
    }

    fn assessor(ssim_enabled: bool) -> QualityAssessor {
        let config = AssessorConfig {
            ssim_enabled,
            ..AssessorConfig::default()
        };
        QualityAssessor::new(Arc::new(FakeRasterizer), &config).with_sharpness(true)
    }

    #[tokio::test]
    async fn identical_renders_hit_the_ceiling() {
        let result = assessor(true).assess(Path::new("a.pdf"), Path::new("a.pdf")).await;
        assert_eq!(result.pages.len(), 3);
        assert_eq!(result.metrics.psnr, Some(100.0));
        assert!((result.metrics.ssim.unwrap() - 1.0).abs() < 1e-9);
        assert!(result.metrics.sharpness.unwrap() > 0.0);
        assert!(result.metrics.lpips.is_none());
    }

    #[tokio::test]
    async fn ssim_is_skipped_unless_enabled() {
        let result = assessor(false).assess(Path::new("a.pdf"), Path::new("b.pdf")).await;
        assert!(result.metrics.psnr.unwrap() < 100.0);
        assert!(result.metrics.ssim.is_none());
    }

    #[tokio::test]
    async fn rasterization_failure_leaves_metrics_unset() {
        let result = assessor(true).assess(Path::new("a.pdf"), Path::new("broken.pdf")).await;
        assert!(result.metrics.is_empty());
        assert!(result.pages.is_empty());

        let result = assessor(true).assess(Path::new("broken.pdf"), Path::new("a.pdf")).await;
        assert!(result.metrics.is_empty());
    }

    #[tokio::test]
    async fn partial_candidate_compares_shared_pages_only() {
        let result = assessor(false).assess(Path::new("a.pdf"), Path::new("short.pdf")).await;
        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.metrics.psnr, Some(100.0));
    }

    #[tokio::test]
    async fn reference_sharpness_is_positive_for_textured_pages() {
        let a = assessor(false);
        let reference = a.render_reference(Path::new("a.pdf")).await.unwrap();
        assert!(reference.sharpness().unwrap() > 0.0);
    }

    #[test]
    fn report_lists_every_page() {
        let assessment = Assessment {
            metrics: QualityMetrics {
                psnr: Some(41.5),
                ..QualityMetrics::default()
            },
            pages: vec![
                PageMetrics { page: 1, psnr: Some(40.0), ..PageMetrics::default() },
                PageMetrics { page: 2, psnr: Some(43.0), ..PageMetrics::default() },
            ],
        };
        let report = assessment.report();
        assert!(report.contains("PSNR:      41.50 dB"));
        assert!(report.contains("SSIM:      n/a"));
        assert!(report.contains("page   2"));
    }
}
