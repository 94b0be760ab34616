// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sharpness as variance of the 3x3 Laplacian response.

use image::GrayImage;
use imageproc::filter::laplacian_filter;

/// Variance of the Laplacian of `gray`. Higher means more edge energy.
pub fn laplacian_variance(gray: &GrayImage) -> Option<f64> {
    let count = gray.width() as u64 * gray.height() as u64;
    if count == 0 {
        return None;
    }

    let response = laplacian_filter(gray);
    let (mut sum, mut sum_sq) = (0.0f64, 0.0f64);
    for pixel in response.pixels() {
        let v = pixel.0[0] as f64;
        sum += v;
        sum_sq += v * v;
    }
    let n = count as f64;
    let mean = sum / n;
    Some((sum_sq / n - mean * mean).max(0.0))
}
