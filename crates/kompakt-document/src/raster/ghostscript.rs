// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ghostscript rasterizer (png16m device).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use kompakt_core::error::{KompaktError, Result};
use tracing::{debug, instrument, warn};

use super::{RasterOutput, RasterPage, Rasterizer};
use crate::process::run_tool;

/// Renders pages through `gs -sDEVICE=png16m` into a private temp directory.
#[derive(Debug, Clone)]
pub struct GhostscriptRasterizer {
    binary: PathBuf,
    timeout: Duration,
}

impl GhostscriptRasterizer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn arguments(pdf: &Path, first: u32, last: u32, dpi: u32, pattern: &Path) -> Vec<OsString> {
        let mut out_file = OsString::from("-sOutputFile=");
        out_file.push(pattern);
        vec![
            "-dSAFER".into(),
            "-dBATCH".into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-sDEVICE=png16m".into(),
            format!("-r{dpi}").into(),
            "-dTextAlphaBits=4".into(),
            "-dGraphicsAlphaBits=4".into(),
            format!("-dFirstPage={first}").into(),
            format!("-dLastPage={last}").into(),
            out_file,
            pdf.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl Rasterizer for GhostscriptRasterizer {
    #[instrument(skip(self, pdf), fields(pdf = %pdf.display()))]
    async fn rasterize(&self, pdf: &Path, first: u32, last: u32, dpi: u32) -> Result<RasterOutput> {
        if first == 0 || last < first {
            return Err(KompaktError::Rasterization(format!(
                "invalid page range {first}..={last}"
            )));
        }

        let workdir = tempfile::tempdir()?;
        let pattern = workdir.path().join("page-%03d.png");
        let args = Self::arguments(pdf, first, last, dpi, &pattern);

        let output = run_tool(&self.binary, args, self.timeout)
            .await
            .map_err(|err| KompaktError::Rasterization(err.to_string()))?;
        if !output.success() {
            warn!(detail = %output.describe_failure(), "ghostscript reported an error");
        }

        // Output files are numbered from 1 regardless of the first page.
        let mut pages = Vec::new();
        for (index, number) in (first..=last).enumerate() {
            let file = workdir.path().join(format!("page-{:03}.png", index + 1));
            if !file.exists() {
                continue;
            }
            match load_page(&file) {
                Ok(image) => pages.push(RasterPage { number, image }),
                Err(err) => warn!(page = number, %err, "unreadable raster page"),
            }
        }

        if pages.is_empty() {
            return Err(KompaktError::Rasterization(format!(
                "no pages rendered from {}: {}",
                pdf.display(),
                output.describe_failure()
            )));
        }

        debug!(rendered = pages.len(), "pages rasterized");
        Ok(RasterOutput::from_range(pages, first, last))
    }
}

/// Decode one rendered PNG.
fn load_page(file: &Path) -> Result<RgbImage> {
    image::open(file)
        .map(|image| image.to_rgb8())
        .map_err(|err| KompaktError::Image(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_request_antialiased_png16m() {
        let args = GhostscriptRasterizer::arguments(
            Path::new("in.pdf"),
            1,
            3,
            200,
            Path::new("/tmp/x/page-%03d.png"),
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert!(args.contains(&"-sDEVICE=png16m".to_string()));
        assert!(args.contains(&"-r200".to_string()));
        assert!(args.contains(&"-dTextAlphaBits=4".to_string()));
        assert!(args.contains(&"-dLastPage=3".to_string()));
        assert!(args.contains(&"-sOutputFile=/tmp/x/page-%03d.png".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("in.pdf"));
    }

    #[test]
    fn truncated_png_is_an_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page-001.png");
        std::fs::write(&file, b"\x89PNG\r\n\x1a\n").unwrap();
        let err = load_page(&file).unwrap_err();
        assert!(matches!(err, KompaktError::Image(_)));
    }

    #[tokio::test]
    async fn invalid_range_is_rejected() {
        let gs = GhostscriptRasterizer::new("gs", Duration::from_secs(1));
        let err = gs.rasterize(Path::new("in.pdf"), 3, 2, 72).await.unwrap_err();
        assert!(matches!(err, KompaktError::Rasterization(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_a_rasterization_error() {
        let gs = GhostscriptRasterizer::new("/nonexistent/gs", Duration::from_secs(1));
        let err = gs.rasterize(Path::new("in.pdf"), 1, 1, 72).await.unwrap_err();
        assert!(matches!(err, KompaktError::Rasterization(_)));
    }
}
