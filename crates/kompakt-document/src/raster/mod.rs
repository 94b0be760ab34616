// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterization port — render PDF pages to pixel images.
//
// The profiler, the assessor and the pixel pipelines all depend on the
// `Rasterizer` trait rather than on Ghostscript, so tests can substitute
// synthetic pages.

pub mod ghostscript;

use std::path::Path;

use async_trait::async_trait;
use image::RgbImage;
use image::imageops::crop_imm;
use kompakt_core::error::Result;

pub use ghostscript::GhostscriptRasterizer;

/// One rendered page.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// 1-indexed page number in the source document.
    pub number: u32,
    pub image: RgbImage,
}

/// Pages produced by a rasterization request.
#[derive(Debug, Clone)]
pub enum RasterOutput {
    /// Every requested page was rendered.
    Complete(Vec<RasterPage>),
    /// Some requested pages could not be rendered (or do not exist).
    Partial { pages: Vec<RasterPage>, missing: Vec<u32> },
}

impl RasterOutput {
    /// Classify `pages` against the requested `first..=last` range.
    pub fn from_range(mut pages: Vec<RasterPage>, first: u32, last: u32) -> Self {
        pages.sort_by_key(|page| page.number);
        let missing: Vec<u32> = (first..=last)
            .filter(|n| !pages.iter().any(|page| page.number == *n))
            .collect();
        if missing.is_empty() {
            Self::Complete(pages)
        } else {
            Self::Partial { pages, missing }
        }
    }

    pub fn pages(&self) -> &[RasterPage] {
        match self {
            Self::Complete(pages) | Self::Partial { pages, .. } => pages,
        }
    }

    pub fn into_pages(self) -> Vec<RasterPage> {
        match self {
            Self::Complete(pages) | Self::Partial { pages, .. } => pages,
        }
    }

    pub fn missing(&self) -> &[u32] {
        match self {
            Self::Complete(_) => &[],
            Self::Partial { missing, .. } => missing,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Renders a page range of a PDF at a given resolution.
///
/// Total failure (nothing rendered) is an `Err`; a partial render is
/// [`RasterOutput::Partial`].
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, pdf: &Path, first: u32, last: u32, dpi: u32) -> Result<RasterOutput>;
}

/// Crop two images to the intersection of their dimensions, anchored at the
/// top-left corner.
pub fn crop_to_common(a: &RgbImage, b: &RgbImage) -> (RgbImage, RgbImage) {
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    (
        crop_imm(a, 0, 0, width, height).to_image(),
        crop_imm(b, 0, 0, width, height).to_image(),
    )
}

/// Pair pages of two renders by page number.
pub fn pair_pages<'a>(
    left: &'a [RasterPage],
    right: &'a [RasterPage],
) -> Vec<(&'a RasterPage, &'a RasterPage)> {
    left.iter()
        .filter_map(|l| right.iter().find(|r| r.number == l.number).map(|r| (l, r)))
        .collect()
}
