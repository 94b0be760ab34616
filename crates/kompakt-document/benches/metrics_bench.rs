// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the fidelity metric kernels in kompakt-document.
// Inputs are synthetic letter-size pages at 100 DPI (850x1100) so the numbers
// scale roughly linearly to the 200 DPI pages used during assessment.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma, Rgb, RgbImage};

use kompakt_core::config::ProfilerConfig;
use kompakt_document::analysis::classify_page;
use kompakt_document::quality::psnr::psnr;
use kompakt_document::quality::sharpness::laplacian_variance;
use kompakt_document::quality::ssim::ssim;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const WIDTH: u32 = 850;
const HEIGHT: u32 = 1100;

/// Text-like page: dark bars on white.
fn text_page() -> GrayImage {
    GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
        if y % 24 < 6 && x % 120 < 100 { Luma([15]) } else { Luma([245]) }
    })
}

/// The same page with light periodic noise, standing in for a lossy encode.
fn noisy_page() -> GrayImage {
    let base = text_page();
    GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let v = base.get_pixel(x, y).0[0];
        Luma([if (x * 7 + y * 3) % 11 == 0 { v.saturating_sub(9) } else { v }])
    })
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_psnr(c: &mut Criterion) {
    let (a, b) = (text_page(), noisy_page());
    c.bench_function("psnr (850x1100)", |bench| {
        bench.iter(|| black_box(psnr(black_box(&a), black_box(&b))));
    });
}

fn bench_ssim(c: &mut Criterion) {
    let (a, b) = (text_page(), noisy_page());
    c.bench_function("ssim 7x7 (850x1100)", |bench| {
        bench.iter(|| black_box(ssim(black_box(&a), black_box(&b))));
    });
}

fn bench_sharpness(c: &mut Criterion) {
    let page = noisy_page();
    c.bench_function("laplacian variance (850x1100)", |bench| {
        bench.iter(|| black_box(laplacian_variance(black_box(&page))));
    });
}

fn bench_classify(c: &mut Criterion) {
    // Profiling renders at 50 DPI.
    let page = RgbImage::from_fn(WIDTH / 2, HEIGHT / 2, |x, y| {
        if (x + y) % 9 == 0 { Rgb([200, 40, 40]) } else { Rgb([250, 250, 250]) }
    });
    let config = ProfilerConfig::default();
    c.bench_function("classify page (425x550)", |bench| {
        bench.iter(|| black_box(classify_page(black_box(&page), &config)));
    });
}

criterion_group!(benches, bench_psnr, bench_ssim, bench_sharpness, bench_classify);
criterion_main!(benches);
