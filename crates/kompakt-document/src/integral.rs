// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Summed-area tables for constant-time window sums.

use image::GrayImage;

/// Summed-area table with a zero row and column, so the table is
/// `(width + 1) x (height + 1)`.
#[derive(Debug, Clone)]
pub struct IntegralImage {
    width: u32,
    height: u32,
    table: Vec<u64>,
}

impl IntegralImage {
    /// Build a table over `value(x, y)` for every pixel position.
    pub fn from_fn(width: u32, height: u32, mut value: impl FnMut(u32, u32) -> u64) -> Self {
        let stride = (width + 1) as usize;
        let mut table = vec![0u64; stride * (height + 1) as usize];

        for y in 0..height {
            let mut row_sum: u64 = 0;
            for x in 0..width {
                row_sum += value(x, y);
                let idx = (y + 1) as usize * stride + (x + 1) as usize;
                let above = y as usize * stride + (x + 1) as usize;
                table[idx] = row_sum + table[above];
            }
        }

        Self {
            width,
            height,
            table,
        }
    }

    /// Table over raw intensities.
    pub fn of(gray: &GrayImage) -> Self {
        Self::from_fn(gray.width(), gray.height(), |x, y| {
            gray.get_pixel(x, y).0[0] as u64
        })
    }

    /// Table over squared intensities.
    pub fn of_squares(gray: &GrayImage) -> Self {
        Self::from_fn(gray.width(), gray.height(), |x, y| {
            let v = gray.get_pixel(x, y).0[0] as u64;
            v * v
        })
    }

    /// Table over products of two equally sized images.
    pub fn of_products(a: &GrayImage, b: &GrayImage) -> Self {
        Self::from_fn(a.width(), a.height(), |x, y| {
            a.get_pixel(x, y).0[0] as u64 * b.get_pixel(x, y).0[0] as u64
        })
    }

    /// Sum over the half-open rectangle `[x1, x2) x [y1, y2)`, clamped to
    /// the image.
    pub fn sum(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> u64 {
        let stride = (self.width + 1) as usize;
        let x1 = x1.min(self.width) as usize;
        let y1 = y1.min(self.height) as usize;
        let x2 = (x2.min(self.width) as usize).max(x1);
        let y2 = (y2.min(self.height) as usize).max(y1);

        // S = I[y2][x2] - I[y1][x2] - I[y2][x1] + I[y1][x1]
        self.table[y2 * stride + x2] + self.table[y1 * stride + x1]
            - self.table[y1 * stride + x2]
            - self.table[y2 * stride + x1]
    }
}
