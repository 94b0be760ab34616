// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structural similarity (mean SSIM) on 8-bit luma.
//
// Uniform 7x7 window, K1 = 0.01, K2 = 0.03, L = 255, sample covariance.
// Only windows that lie fully inside the image contribute to the mean.
// Window statistics come from summed-area tables, so the cost is linear in
// the pixel count regardless of window size.

use image::GrayImage;
use image::imageops::crop_imm;

use crate::integral::IntegralImage;

const WINDOW: u32 = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DYNAMIC_RANGE: f64 = 255.0;

/// Mean SSIM over the overlapping region of two luma images, in `[-1, 1]`.
///
/// Images smaller than the window use a window as large as the smaller side.
/// Returns `None` when the overlap is smaller than 2x2.
pub fn ssim(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    let window = WINDOW.min(width).min(height);
    if window < 2 {
        return None;
    }

    let a = crop_imm(a, 0, 0, width, height).to_image();
    let b = crop_imm(b, 0, 0, width, height).to_image();

    let sum_a = IntegralImage::of(&a);
    let sum_b = IntegralImage::of(&b);
    let sum_aa = IntegralImage::of_squares(&a);
    let sum_bb = IntegralImage::of_squares(&b);
    let sum_ab = IntegralImage::of_products(&a, &b);

    let n = (window * window) as f64;
    let c1 = (K1 * DYNAMIC_RANGE).powi(2);
    let c2 = (K2 * DYNAMIC_RANGE).powi(2);

    let mut total = 0.0;
    let mut windows: u64 = 0;
    for y in 0..=(height - window) {
        for x in 0..=(width - window) {
            let (x2, y2) = (x + window, y + window);
            let sa = sum_a.sum(x, y, x2, y2) as f64;
            let sb = sum_b.sum(x, y, x2, y2) as f64;
            let saa = sum_aa.sum(x, y, x2, y2) as f64;
            let sbb = sum_bb.sum(x, y, x2, y2) as f64;
            let sab = sum_ab.sum(x, y, x2, y2) as f64;

            let mu_a = sa / n;
            let mu_b = sb / n;
            let var_a = (saa - sa * sa / n) / (n - 1.0);
            let var_b = (sbb - sb * sb / n) / (n - 1.0);
            let cov = (sab - sa * sb / n) / (n - 1.0);

            let numerator = (2.0 * mu_a * mu_b + c1) * (2.0 * cov + c2);
            let denominator = (mu_a * mu_a + mu_b * mu_b + c1) * (var_a + var_b + c2);
            total += numerator / denominator;
            windows += 1;
        }
    }

    Some(total / windows as f64)
}
