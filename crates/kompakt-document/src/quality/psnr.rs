// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Peak signal-to-noise ratio on 8-bit luma.

use image::GrayImage;

/// Value reported for pixel-identical images.
pub const IDENTICAL_PSNR_DB: f64 = 100.0;

/// Mean squared error over the overlapping region of two luma images.
///
/// Returns `None` when the overlap is empty.
pub fn mean_squared_error(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    let count = width as u64 * height as u64;
    if count == 0 {
        return None;
    }

    let mut sum: u64 = 0;
    for y in 0..height {
        for x in 0..width {
            let d = a.get_pixel(x, y).0[0] as i64 - b.get_pixel(x, y).0[0] as i64;
            sum += (d * d) as u64;
        }
    }
    Some(sum as f64 / count as f64)
}

/// PSNR in dB: `20·log10(255) − 10·log10(MSE)`, or 100 when MSE is zero.
pub fn psnr(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    let mse = mean_squared_error(a, b)?;
    if mse == 0.0 {
        return Some(IDENTICAL_PSNR_DB);
    }
    Some(20.0 * 255f64.log10() - 10.0 * mse.log10())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn identical_images_report_the_ceiling() {
        let img = GrayImage::from_fn(16, 16, |x, y| Luma([(x * y) as u8]));
        assert_eq!(psnr(&img, &img), Some(IDENTICAL_PSNR_DB));
    }

    #[test]
    fn uniform_offset_matches_closed_form() {
        let a = GrayImage::from_pixel(10, 10, Luma([100]));
        let b = GrayImage::from_pixel(10, 10, Luma([110]));
        // MSE = 100 -> 28.13 dB
        let value = psnr(&a, &b).unwrap();
        assert!((value - 28.130_803_608_679_1).abs() < 1e-6, "got {value}");
    }

    #[test]
    fn empty_overlap_has_no_value() {
        let a = GrayImage::new(0, 10);
        let b = GrayImage::new(10, 10);
        assert_eq!(psnr(&a, &b), None);
    }

    #[test]
    fn more_noise_means_lower_psnr() {
        let base = GrayImage::from_pixel(8, 8, Luma([128]));
        let slight = GrayImage::from_fn(8, 8, |x, _| Luma([128 + (x % 2) as u8]));
        let heavy = GrayImage::from_fn(8, 8, |x, _| Luma([128 + (x % 2) as u8 * 40]));
        assert!(psnr(&base, &slight).unwrap() > psnr(&base, &heavy).unwrap());
    }
}
