// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for planning, scoring and gating in kompakt-engine.

use std::path::PathBuf;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use kompakt_core::config::{EngineConfig, FeatureFlags};
use kompakt_core::{Candidate, ContentMode, OriginalSnapshot, QualityMetrics, StrategyKind};
use kompakt_engine::QualityGate;
use kompakt_engine::generator::{Availability, plan};
use kompakt_engine::scoring::{ScoringContext, score_all, select};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn every_strategy(original: u64) -> Vec<Candidate> {
    StrategyKind::ALL
        .iter()
        .enumerate()
        .map(|(i, &strategy)| Candidate {
            strategy,
            path: PathBuf::from(format!("/scratch/{}.pdf", strategy.name())),
            size_bytes: original / 10 * (i as u64 % 9 + 1),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_plan(c: &mut Criterion) {
    let flags = FeatureFlags {
        anti_noise: true,
        advanced_raster: true,
        ..FeatureFlags::default()
    };
    let all = Availability {
        structural: true,
        ghostscript: true,
        ocr: true,
        raster: true,
    };
    c.bench_function("plan (all tools, all flags)", |b| {
        b.iter(|| black_box(plan(black_box(Some(ContentMode::Bitonal)), &flags, &all)));
    });
}

fn bench_score_and_select(c: &mut Criterion) {
    let config = EngineConfig::default();
    let original = OriginalSnapshot {
        path: PathBuf::from("/in/original.pdf"),
        size_bytes: 10_000_000,
    };
    let candidates = every_strategy(original.size_bytes);
    let context = ScoringContext {
        policy: &config.scoring,
        flags: &config.features,
        mode: Some(ContentMode::Grayscale),
        baseline_sharpness: Some(120.0),
    };

    c.bench_function("score_all + select (10 candidates)", |b| {
        b.iter(|| {
            let scored = score_all(&context, &original, black_box(&candidates), |_| {
                Some(QualityMetrics {
                    sharpness: Some(110.0),
                    ..QualityMetrics::default()
                })
            });
            black_box(select(&scored));
        });
    });
}

fn bench_gate(c: &mut Criterion) {
    let config = EngineConfig::default();
    let gate = QualityGate::new(config.gate, Some(ContentMode::Color));
    let metrics = QualityMetrics {
        psnr: Some(36.2),
        ssim: Some(0.91),
        lpips: Some(0.08),
        sharpness: None,
    };
    c.bench_function("gate evaluate (3 metrics)", |b| {
        b.iter(|| black_box(gate.evaluate(black_box(&metrics))));
    });
}

criterion_group!(benches, bench_plan, bench_score_and_select, bench_gate);
criterion_main!(benches);
