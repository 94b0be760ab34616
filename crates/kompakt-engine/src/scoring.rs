// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Selection engine: score every candidate and pick the best one.
//
// Scoring is a pure function of the candidate, the original size, the
// content mode, the feature flags and the policy constants. Ties resolve to
// the candidate generated first.

use kompakt_core::config::{FeatureFlags, ScoringPolicy};
use kompakt_core::{
    Candidate, CandidateSummary, ContentMode, OriginalSnapshot, QualityMetrics, SelectionResult,
    StrategyKind,
};
use tracing::debug;

/// Score of the size reduction alone, before priors and bonuses.
///
/// Rises to a peak at `peak_cutoff`, then falls: reductions past
/// `suspicious_cutoff` usually mean destroyed content.
pub fn reduction_score(reduction: f64, policy: &ScoringPolicy) -> f64 {
    if reduction < policy.low_cutoff {
        policy.low_base + reduction
    } else if reduction <= policy.peak_cutoff {
        let span = policy.peak_cutoff - policy.low_cutoff;
        policy.rising_base + (reduction - policy.low_cutoff) / span * policy.rising_gain
    } else if reduction <= policy.suspicious_cutoff {
        let span = policy.suspicious_cutoff - policy.peak_cutoff;
        policy.falling_base - (reduction - policy.peak_cutoff) / span * policy.falling_drop
    } else {
        policy.destructive_base - (reduction - policy.suspicious_cutoff)
    }
}

/// Everything the score depends on besides the candidate itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub policy: &'a ScoringPolicy,
    pub flags: &'a FeatureFlags,
    pub mode: Option<ContentMode>,
    /// Sharpness of the original; enables the sharpness terms when positive.
    pub baseline_sharpness: Option<f64>,
}

impl ScoringContext<'_> {
    /// Full score of a `strategy` output with the given reduction and
    /// (optional) measured sharpness.
    pub fn score(&self, strategy: StrategyKind, reduction: f64, sharpness: Option<f64>) -> f64 {
        let policy = self.policy;
        let mut score = reduction_score(reduction, policy) + policy.prior(strategy);

        if let (Some(baseline), Some(sharp)) = (self.baseline_sharpness, sharpness) {
            if baseline > 0.0 {
                let loss = ((baseline - sharp) / baseline).clamp(0.0, 1.0);
                score -= policy.sharpness_penalty_max * loss;
                if self.flags.prefer_sharpness {
                    let gain = ((sharp - baseline) / baseline).clamp(0.0, 1.0);
                    score += policy.sharpness_reward_max * gain;
                }
            }
        }

        if strategy.is_anti_noise() && self.mode.is_some_and(|m| m.is_monochrome()) {
            score += policy.anti_noise_bonus;
        }
        if strategy.is_pixel_pipeline() && self.flags.advanced_raster {
            score += policy.advanced_raster_bonus;
        }

        // Growth is never rewarded, whatever the bonuses.
        if reduction < 0.0 { 0.0 } else { score }
    }
}

/// One candidate with its score and the evidence behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub reduction_percent: f64,
    pub score: f64,
    pub metrics: Option<QualityMetrics>,
}

impl ScoredCandidate {
    pub fn summary(&self) -> CandidateSummary {
        CandidateSummary {
            method: self.candidate.strategy.name().to_string(),
            size_bytes: self.candidate.size_bytes,
            reduction_percent: self.reduction_percent,
            score: self.score,
        }
    }

    pub fn into_selection(self) -> SelectionResult {
        SelectionResult {
            candidate: self.candidate,
            score: self.score,
            reduction_percent: self.reduction_percent,
            metrics: self.metrics,
        }
    }
}

/// Score `candidates` (in generation order) against `original`. `metrics`
/// supplies whatever was measured for a candidate before selection.
pub fn score_all<F>(
    context: &ScoringContext<'_>,
    original: &OriginalSnapshot,
    candidates: &[Candidate],
    mut metrics: F,
) -> Vec<ScoredCandidate>
where
    F: FnMut(&Candidate) -> Option<QualityMetrics>,
{
    candidates
        .iter()
        .map(|candidate| {
            let reduction = original.reduction_percent(candidate.size_bytes);
            let measured = metrics(candidate);
            let score = context.score(
                candidate.strategy,
                reduction,
                measured.and_then(|m| m.sharpness),
            );
            debug!(
                strategy = %candidate.strategy,
                reduction_percent = reduction,
                score,
                "candidate scored"
            );
            ScoredCandidate {
                candidate: candidate.clone(),
                reduction_percent: reduction,
                score,
                metrics: measured,
            }
        })
        .collect()
}

/// Index of the first maximum score, or `None` for an empty slice.
pub fn select(scored: &[ScoredCandidate]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, candidate) in scored.iter().enumerate() {
        match best {
            Some(b) if scored[b].score >= candidate.score => {}
            _ => best = Some(index),
        }
    }
    best
}
