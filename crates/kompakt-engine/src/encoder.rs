// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Encoding port and its adapters.
//
// Every adapter turns one input PDF plus one `EncodingProfile` into one output
// PDF. Whatever goes wrong (tool missing, non-zero exit, timeout, no output)
// surfaces as `KompaktError::Generation` for that strategy.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use kompakt_core::config::OcrConfig;
use kompakt_core::error::{KompaktError, Result};
use kompakt_core::{ContentMode, StrategyKind};
use kompakt_document::cleanup::{clean_bitonal, clean_grayscale};
use kompakt_document::pdf::{PdfReader, RasterPdfWriter};
use kompakt_document::process::run_tool;
use kompakt_document::{RasterOutput, Rasterizer};
use tracing::{debug, info, instrument, warn};

use crate::profiles::{Backend, EncodingProfile};

/// qpdf exit status meaning "succeeded with warnings".
const QPDF_EXIT_WARNINGS: i32 = 3;

/// Produces one candidate file from the original.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, input: &Path, profile: &EncodingProfile, output: &Path) -> Result<()>;
}

/// Any error raised while encoding `strategy`, as a generation failure.
pub fn generation_failure(strategy: StrategyKind, err: KompaktError) -> KompaktError {
    match err {
        err @ KompaktError::Generation { .. } => err,
        other => KompaktError::generation(strategy.name(), other.to_string()),
    }
}

/// Fail unless `output` exists and is non-empty.
pub fn verify_output(strategy: StrategyKind, output: &Path) -> Result<u64> {
    match std::fs::metadata(output) {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(KompaktError::generation(strategy.name(), "output is empty")),
        Err(_) => Err(KompaktError::generation(strategy.name(), "no output written")),
    }
}

fn expect_backend(profile: &EncodingProfile, wanted: Backend) -> Result<()> {
    let matches = match (profile.backend, wanted) {
        (Backend::PixelPipeline(_), Backend::PixelPipeline(_)) => true,
        (have, want) => have == want,
    };
    if matches {
        Ok(())
    } else {
        Err(KompaktError::generation(
            profile.strategy.name(),
            format!("profile backend {:?} cannot be encoded here", profile.backend),
        ))
    }
}

// ---------------------------------------------------------------------------
// Ghostscript
// ---------------------------------------------------------------------------

/// Recompresses through Ghostscript `pdfwrite`.
#[derive(Debug, Clone)]
pub struct GhostscriptEncoder {
    binary: PathBuf,
    timeout: Duration,
}

impl GhostscriptEncoder {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Encoder for GhostscriptEncoder {
    #[instrument(skip_all, fields(strategy = %profile.strategy))]
    async fn encode(&self, input: &Path, profile: &EncodingProfile, output: &Path) -> Result<()> {
        expect_backend(profile, Backend::Ghostscript)?;
        let args = profile.ghostscript_args(input, output);
        let result = run_tool(&self.binary, args, self.timeout)
            .await
            .map_err(|err| generation_failure(profile.strategy, err))?;
        if !result.success() {
            return Err(KompaktError::generation(
                profile.strategy.name(),
                result.describe_failure(),
            ));
        }
        let size_bytes = verify_output(profile.strategy, output)?;
        debug!(size_bytes, "ghostscript candidate written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Structural optimizers
// ---------------------------------------------------------------------------

/// Lossless structural optimisation through qpdf.
#[derive(Debug, Clone)]
pub struct QpdfOptimizer {
    binary: PathBuf,
    timeout: Duration,
}

impl QpdfOptimizer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Encoder for QpdfOptimizer {
    #[instrument(skip_all, fields(strategy = %profile.strategy))]
    async fn encode(&self, input: &Path, profile: &EncodingProfile, output: &Path) -> Result<()> {
        expect_backend(profile, Backend::Structural)?;
        let args = [
            input.as_os_str().to_owned(),
            "--optimize-images".into(),
            "--compress-streams=y".into(),
            "--object-streams=generate".into(),
            output.as_os_str().to_owned(),
        ];
        let result = run_tool(&self.binary, args, self.timeout)
            .await
            .map_err(|err| generation_failure(profile.strategy, err))?;
        match result.status.code() {
            Some(0) => {}
            Some(QPDF_EXIT_WARNINGS) => warn!(detail = %result.stderr_tail(), "qpdf finished with warnings"),
            _ => {
                return Err(KompaktError::generation(
                    profile.strategy.name(),
                    result.describe_failure(),
                ));
            }
        }
        verify_output(profile.strategy, output)?;
        Ok(())
    }
}

/// In-process structural optimisation through lopdf. Always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfOptimizer;

#[async_trait]
impl Encoder for LopdfOptimizer {
    #[instrument(skip_all, fields(strategy = %profile.strategy))]
    async fn encode(&self, input: &Path, profile: &EncodingProfile, output: &Path) -> Result<()> {
        expect_backend(profile, Backend::Structural)?;
        let strategy = profile.strategy;
        let (input, output) = (input.to_path_buf(), output.to_path_buf());
        let report = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut reader = PdfReader::open(&input)?;
            let report = reader.optimize_structure();
            reader.save(&output)?;
            Ok(report)
        })
        .await
        .map_err(|err| KompaktError::generation(strategy.name(), err.to_string()))?
        .map_err(|err| generation_failure(strategy, err))?;
        debug!(?report, "lopdf candidate written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OCR / MRC
// ---------------------------------------------------------------------------

/// OCR-aware recompression through ocrmypdf.
#[derive(Debug, Clone)]
pub struct OcrMrcEncoder {
    binary: PathBuf,
    config: OcrConfig,
    jbig2: bool,
    timeout: Duration,
}

impl OcrMrcEncoder {
    pub fn new(binary: impl Into<PathBuf>, config: OcrConfig, jbig2: bool, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            config,
            jbig2,
            timeout,
        }
    }
}

#[async_trait]
impl Encoder for OcrMrcEncoder {
    #[instrument(skip_all, fields(strategy = %profile.strategy, language = %self.config.language))]
    async fn encode(&self, input: &Path, profile: &EncodingProfile, output: &Path) -> Result<()> {
        expect_backend(profile, Backend::OcrMrc)?;
        let args = profile.ocr_args(&self.config, self.jbig2, input, output);
        let result = run_tool(&self.binary, args, self.timeout)
            .await
            .map_err(|err| generation_failure(profile.strategy, err))?;
        if !result.success() {
            return Err(KompaktError::generation(
                profile.strategy.name(),
                result.describe_failure(),
            ));
        }
        verify_output(profile.strategy, output)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pixel pipeline
// ---------------------------------------------------------------------------

/// Rasterizes every page, cleans it as bitonal or grayscale and rebuilds an
/// image-only PDF. Text layers do not survive.
pub struct PixelPipelineEncoder {
    rasterizer: Arc<dyn Rasterizer>,
    dpi: u32,
}

impl PixelPipelineEncoder {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, dpi: u32) -> Self {
        Self { rasterizer, dpi }
    }
}

#[async_trait]
impl Encoder for PixelPipelineEncoder {
    #[instrument(skip_all, fields(strategy = %profile.strategy, dpi = self.dpi))]
    async fn encode(&self, input: &Path, profile: &EncodingProfile, output: &Path) -> Result<()> {
        let Backend::PixelPipeline(mode) = profile.backend else {
            return expect_backend(profile, Backend::PixelPipeline(ContentMode::Grayscale));
        };
        let strategy = profile.strategy;

        let source = input.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || kompakt_document::pdf::page_count(&source))
            .await
            .map_err(|err| KompaktError::generation(strategy.name(), err.to_string()))?
            .filter(|count| *count > 0)
            .ok_or_else(|| KompaktError::generation(strategy.name(), "page tree unreadable"))?;
        let last = u32::try_from(pages)
            .map_err(|_| KompaktError::generation(strategy.name(), "too many pages"))?;

        let rendered = self
            .rasterizer
            .rasterize(input, 1, last, self.dpi)
            .await
            .map_err(|err| generation_failure(strategy, err))?;
        if let RasterOutput::Partial { missing, .. } = &rendered {
            return Err(KompaktError::generation(
                strategy.name(),
                format!("pages {missing:?} did not render"),
            ));
        }

        let dpi = self.dpi;
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let cleaned: Vec<DynamicImage> = rendered
                .into_pages()
                .iter()
                .map(|page| match mode {
                    ContentMode::Bitonal => DynamicImage::ImageLuma8(clean_bitonal(&page.image)),
                    _ => DynamicImage::ImageLuma8(clean_grayscale(&page.image)),
                })
                .collect();
            let mut writer = RasterPdfWriter::new(dpi);
            writer.set_title(format!("Kompakt {strategy}"));
            writer.write_to_file(&cleaned, &output)
        })
        .await
        .map_err(|err| KompaktError::generation(strategy.name(), err.to_string()))?
        .map_err(|err| generation_failure(strategy, err))?;

        info!(pages, "pixel pipeline rebuilt document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kompakt_core::error::ErrorClass;
    use kompakt_document::RasterPage;
    use image::{Rgb, RgbImage};

    struct SolidRasterizer {
        drop_page: Option<u32>,
    }

    #[async_trait]
    impl Rasterizer for SolidRasterizer {
        async fn rasterize(&self, _pdf: &Path, first: u32, last: u32, _dpi: u32) -> Result<RasterOutput> {
            let pages = (first..=last)
                .filter(|n| Some(*n) != self.drop_page)
                .map(|number| RasterPage {
                    number,
                    image: RgbImage::from_fn(40, 50, |x, _| {
                        if x % 10 < 3 { Rgb([20, 20, 20]) } else { Rgb([240, 240, 240]) }
                    }),
                })
                .collect();
            Ok(RasterOutput::from_range(pages, first, last))
        }
    }

    fn write_sample(dir: &Path, pages: usize) -> PathBuf {
        crate::test_support::write_pdf(dir, "input.pdf", pages)
    }

    #[test]
    fn foreign_errors_become_generation_failures() {
        let err = generation_failure(StrategyKind::Balanced, KompaktError::ToolUnavailable("gs".into()));
        assert_eq!(err.class(), ErrorClass::Generation);
        assert!(err.to_string().contains("balanced"));
    }

    #[test]
    fn empty_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        std::fs::write(&path, b"").unwrap();
        assert!(verify_output(StrategyKind::Balanced, &path).is_err());
        assert!(verify_output(StrategyKind::Balanced, &dir.path().join("missing.pdf")).is_err());
        std::fs::write(&path, b"%PDF").unwrap();
        assert_eq!(verify_output(StrategyKind::Balanced, &path).unwrap(), 4);
    }

    #[tokio::test]
    async fn lopdf_optimizer_writes_a_readable_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), 2);
        let output = dir.path().join("conservative.pdf");
        let profile = EncodingProfile::for_strategy(StrategyKind::Conservative);

        LopdfOptimizer.encode(&input, &profile, &output).await.unwrap();
        assert_eq!(kompakt_document::pdf::page_count(&output), Some(2));
    }

    #[tokio::test]
    async fn lopdf_optimizer_refuses_ghostscript_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), 1);
        let profile = EncodingProfile::for_strategy(StrategyKind::Balanced);
        let err = LopdfOptimizer
            .encode(&input, &profile, &dir.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, KompaktError::Generation { .. }));
    }

    #[tokio::test]
    async fn missing_ghostscript_is_a_generation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), 1);
        let encoder = GhostscriptEncoder::new("/nonexistent/gs", Duration::from_secs(5));
        let profile = EncodingProfile::for_strategy(StrategyKind::Balanced);
        let err = encoder
            .encode(&input, &profile, &dir.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, KompaktError::Generation { .. }));
    }

    #[tokio::test]
    async fn pixel_pipeline_rebuilds_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), 3);
        let output = dir.path().join("raster.pdf");
        let encoder = PixelPipelineEncoder::new(Arc::new(SolidRasterizer { drop_page: None }), 100);
        let profile = EncodingProfile::for_strategy(StrategyKind::RasterBitonal);

        encoder.encode(&input, &profile, &output).await.unwrap();
        assert_eq!(kompakt_document::pdf::page_count(&output), Some(3));
    }

    #[tokio::test]
    async fn pixel_pipeline_rejects_partial_renders() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), 3);
        let output = dir.path().join("raster.pdf");
        let encoder = PixelPipelineEncoder::new(Arc::new(SolidRasterizer { drop_page: Some(2) }), 100);
        let profile = EncodingProfile::for_strategy(StrategyKind::RasterGrayscale);

        let err = encoder.encode(&input, &profile, &output).await.unwrap_err();
        assert!(err.to_string().contains("did not render"));
        assert!(!output.exists());
    }
}
