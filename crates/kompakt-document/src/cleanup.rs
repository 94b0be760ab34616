// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page cleanup for the pixel-rebuild pipelines — speckle removal and global
// binarization of scanned pages.

use image::imageops::grayscale;
use image::{GrayImage, RgbImage};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::median_filter;
use tracing::{debug, instrument};

/// Median radius used to knock out scanner speckle.
const DENOISE_RADIUS: u32 = 1;

/// Luma with single-pixel noise removed.
#[instrument(skip(page), fields(width = page.width(), height = page.height()))]
pub fn clean_grayscale(page: &RgbImage) -> GrayImage {
    let gray = grayscale(page);
    median_filter(&gray, DENOISE_RADIUS, DENOISE_RADIUS)
}

/// Denoised, then Otsu-thresholded to pure black and white.
#[instrument(skip(page), fields(width = page.width(), height = page.height()))]
pub fn clean_bitonal(page: &RgbImage) -> GrayImage {
    let gray = clean_grayscale(page);
    let level = otsu_level(&gray);
    debug!(level, "Otsu level computed");
    threshold(&gray, level, ThresholdType::Binary)
}
