// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quality gate.
//
// `QualityGate::evaluate` turns measured metrics into a verdict. `GateMachine`
// walks the selected candidate and then the fallbacks through that verdict:
//
//   Unvalidated --pass--> Passed
//   Unvalidated --fail--> Failed --pass--> Recovered
//                               --none left--> Preserved

use std::collections::VecDeque;
use std::fmt;

use kompakt_core::config::{GateConfig, GatePolicy};
use kompakt_core::{ContentMode, GateOutcome, PreserveReason, QualityMetrics, StrategyKind};
use tracing::{debug, info, warn};

/// Strategies tried, in order, after the selection is rejected.
pub const FALLBACK_ORDER: [StrategyKind; 2] = [StrategyKind::HighQuality, StrategyKind::Conservative];

/// Result of one metric against its threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricCheck {
    pub metric: &'static str,
    pub value: f64,
    pub threshold: f64,
    pub passed: bool,
}

impl fmt::Display for MetricCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (relation, mark) = match (self.metric, self.passed) {
            ("lpips", true) => ("<=", "PASS"),
            ("lpips", false) => (">", "FAIL"),
            (_, true) => (">=", "PASS"),
            (_, false) => ("<", "FAIL"),
        };
        write!(
            f,
            "{:<6} {:>9.4} {relation} {:<8.4} {mark}",
            self.metric, self.value, self.threshold
        )
    }
}

/// Combined verdict over every evaluated metric.
#[derive(Debug, Clone, PartialEq)]
pub struct GateVerdict {
    pub checks: Vec<MetricCheck>,
    pub passed: bool,
}

impl GateVerdict {
    pub fn evaluated(&self) -> usize {
        self.checks.len()
    }

    pub fn passed_checks(&self) -> usize {
        self.checks.iter().filter(|check| check.passed).count()
    }
}

/// Metric thresholds for one document.
#[derive(Debug, Clone)]
pub struct QualityGate {
    config: GateConfig,
    mode: Option<ContentMode>,
}

impl QualityGate {
    pub fn new(config: GateConfig, mode: Option<ContentMode>) -> Self {
        Self { config, mode }
    }

    pub fn psnr_threshold(&self) -> f64 {
        self.config.psnr_threshold(self.mode)
    }

    /// Only measured metrics are gates. With none measured the gate passes.
    pub fn evaluate(&self, metrics: &QualityMetrics) -> GateVerdict {
        let mut checks = Vec::with_capacity(3);
        if let Some(psnr) = metrics.psnr {
            let threshold = self.psnr_threshold();
            checks.push(MetricCheck {
                metric: "psnr",
                value: psnr,
                threshold,
                passed: psnr >= threshold,
            });
        }
        if let Some(ssim) = metrics.ssim {
            checks.push(MetricCheck {
                metric: "ssim",
                value: ssim,
                threshold: self.config.ssim_threshold,
                passed: ssim >= self.config.ssim_threshold,
            });
        }
        if let Some(lpips) = metrics.lpips {
            checks.push(MetricCheck {
                metric: "lpips",
                value: lpips,
                threshold: self.config.lpips_threshold,
                passed: lpips <= self.config.lpips_threshold,
            });
        }

        let evaluated = checks.len();
        let passed_count = checks.iter().filter(|check| check.passed).count();
        let passed = evaluated == 0
            || match self.config.policy {
                GatePolicy::Majority => passed_count * 2 > evaluated,
                GatePolicy::Unanimous => passed_count == evaluated,
                GatePolicy::Any => passed_count > 0,
            };
        debug!(evaluated, passed_count, passed, policy = ?self.config.policy, "gate evaluated");
        GateVerdict { checks, passed }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Unvalidated { candidate: StrategyKind },
    Passed { candidate: StrategyKind },
    Failed { rejected: StrategyKind, remaining: VecDeque<StrategyKind> },
    Recovered { rejected: StrategyKind, candidate: StrategyKind },
    Preserved,
}

/// Drives one document through the gate and its fallbacks.
#[derive(Debug, Clone)]
pub struct GateMachine {
    state: GateState,
    fallbacks: VecDeque<StrategyKind>,
}

impl GateMachine {
    /// `generated` lists the strategies that produced a candidate; fallbacks
    /// that were not generated, or that equal the selection, are skipped.
    pub fn new(selected: StrategyKind, generated: &[StrategyKind]) -> Self {
        let fallbacks = FALLBACK_ORDER
            .into_iter()
            .filter(|kind| *kind != selected && generated.contains(kind))
            .collect();
        Self {
            state: GateState::Unvalidated { candidate: selected },
            fallbacks,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// The candidate awaiting a verdict, if any.
    pub fn pending(&self) -> Option<StrategyKind> {
        match &self.state {
            GateState::Unvalidated { candidate } => Some(*candidate),
            GateState::Failed { remaining, .. } => remaining.front().copied(),
            _ => None,
        }
    }

    /// Feed the verdict for [`pending`](Self::pending).
    pub fn record(&mut self, passed: bool) {
        let next = match std::mem::replace(&mut self.state, GateState::Preserved) {
            GateState::Unvalidated { candidate } if passed => {
                info!(strategy = %candidate, "quality gate passed");
                GateState::Passed { candidate }
            }
            GateState::Unvalidated { candidate } => {
                warn!(strategy = %candidate, "quality gate failed; trying fallbacks");
                let remaining = std::mem::take(&mut self.fallbacks);
                Self::after_failure(candidate, remaining)
            }
            GateState::Failed { rejected, mut remaining } => match remaining.pop_front() {
                Some(candidate) if passed => {
                    info!(strategy = %candidate, rejected = %rejected, "fallback passed");
                    GateState::Recovered { rejected, candidate }
                }
                Some(candidate) => {
                    warn!(strategy = %candidate, "fallback failed");
                    Self::after_failure(rejected, remaining)
                }
                None => GateState::Preserved,
            },
            terminal => terminal,
        };
        self.state = next;
    }

    fn after_failure(rejected: StrategyKind, remaining: VecDeque<StrategyKind>) -> GateState {
        if remaining.is_empty() {
            warn!(rejected = %rejected, "no candidate passed; keeping the original");
            GateState::Preserved
        } else {
            GateState::Failed { rejected, remaining }
        }
    }

    /// Terminal outcome and the accepted strategy (`None` when preserved).
    /// `None` while a verdict is still pending.
    pub fn outcome(&self) -> Option<(GateOutcome, Option<StrategyKind>)> {
        match &self.state {
            GateState::Passed { candidate } => Some((GateOutcome::Passed, Some(*candidate))),
            GateState::Recovered { rejected, candidate } => Some((
                GateOutcome::Recovered { rejected: *rejected },
                Some(*candidate),
            )),
            GateState::Preserved => Some((
                GateOutcome::Preserved {
                    reason: PreserveReason::QualityRejected,
                },
                None,
            )),
            GateState::Unvalidated { .. } | GateState::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(psnr: Option<f64>, ssim: Option<f64>, lpips: Option<f64>) -> QualityMetrics {
        QualityMetrics {
            psnr,
            ssim,
            lpips,
            sharpness: None,
        }
    }

    fn gate(policy: GatePolicy, mode: Option<ContentMode>) -> QualityGate {
        QualityGate::new(
            GateConfig {
                policy,
                ..GateConfig::default()
            },
            mode,
        )
    }

    #[test]
    fn unmeasured_metrics_fail_open() {
        let verdict = gate(GatePolicy::Unanimous, None).evaluate(&QualityMetrics::default());
        assert!(verdict.passed);
        assert_eq!(verdict.evaluated(), 0);
    }

    #[test]
    fn psnr_threshold_depends_on_mode() {
        let m = metrics(Some(31.0), None, None);
        assert!(!gate(GatePolicy::Majority, None).evaluate(&m).passed);
        assert!(!gate(GatePolicy::Majority, Some(ContentMode::Grayscale)).evaluate(&m).passed);
        assert!(gate(GatePolicy::Majority, Some(ContentMode::Bitonal)).evaluate(&m).passed);
    }

    #[test]
    fn combination_policies() {
        // PSNR passes, SSIM fails.
        let split = metrics(Some(40.0), Some(0.80), None);
        assert!(!gate(GatePolicy::Majority, None).evaluate(&split).passed);
        assert!(!gate(GatePolicy::Unanimous, None).evaluate(&split).passed);
        assert!(gate(GatePolicy::Any, None).evaluate(&split).passed);

        // Two of three pass.
        let mostly = metrics(Some(40.0), Some(0.90), Some(0.30));
        let verdict = gate(GatePolicy::Majority, None).evaluate(&mostly);
        assert!(verdict.passed);
        assert_eq!(verdict.passed_checks(), 2);
        assert!(!gate(GatePolicy::Unanimous, None).evaluate(&mostly).passed);
    }

    #[test]
    fn raising_the_threshold_never_turns_fail_into_pass() {
        let m = metrics(Some(36.0), Some(0.88), None);
        let mut last = true;
        for floor in [30.0, 34.0, 36.0, 36.5, 40.0, 50.0] {
            let config = GateConfig {
                psnr_color_db: floor,
                policy: GatePolicy::Unanimous,
                ..GateConfig::default()
            };
            let passed = QualityGate::new(config, None).evaluate(&m).passed;
            assert!(last || !passed, "floor {floor} flipped fail to pass");
            last = passed;
        }
        assert!(!last);
    }

    #[test]
    fn selection_passing_is_terminal() {
        let mut machine = GateMachine::new(StrategyKind::Balanced, &[StrategyKind::Balanced]);
        assert_eq!(machine.pending(), Some(StrategyKind::Balanced));
        machine.record(true);
        assert_eq!(machine.pending(), None);
        assert_eq!(
            machine.outcome(),
            Some((GateOutcome::Passed, Some(StrategyKind::Balanced)))
        );
    }

    #[test]
    fn fallbacks_run_in_order_and_recover() {
        let generated = [
            StrategyKind::Conservative,
            StrategyKind::HighQuality,
            StrategyKind::AggressiveSafe,
        ];
        let mut machine = GateMachine::new(StrategyKind::AggressiveSafe, &generated);
        machine.record(false);
        assert_eq!(machine.pending(), Some(StrategyKind::HighQuality));
        machine.record(false);
        assert_eq!(machine.pending(), Some(StrategyKind::Conservative));
        assert_eq!(machine.outcome(), None);
        machine.record(true);
        assert_eq!(
            machine.outcome(),
            Some((
                GateOutcome::Recovered {
                    rejected: StrategyKind::AggressiveSafe
                },
                Some(StrategyKind::Conservative)
            ))
        );
    }

    #[test]
    fn rejected_selection_is_not_retried_as_fallback() {
        let generated = [StrategyKind::Conservative, StrategyKind::HighQuality];
        let mut machine = GateMachine::new(StrategyKind::HighQuality, &generated);
        machine.record(false);
        assert_eq!(machine.pending(), Some(StrategyKind::Conservative));
        machine.record(false);
        assert_eq!(machine.state(), &GateState::Preserved);
        let (outcome, accepted) = machine.outcome().unwrap();
        assert_eq!(
            outcome,
            GateOutcome::Preserved {
                reason: PreserveReason::QualityRejected
            }
        );
        assert_eq!(accepted, None);
    }

    #[test]
    fn no_fallbacks_preserves_immediately() {
        let mut machine = GateMachine::new(StrategyKind::Balanced, &[StrategyKind::Balanced]);
        machine.record(false);
        assert_eq!(machine.pending(), None);
        assert!(matches!(machine.outcome(), Some((GateOutcome::Preserved { .. }, None))));
    }

    #[test]
    fn check_lines_render() {
        let check = MetricCheck {
            metric: "psnr",
            value: 36.25,
            threshold: 35.0,
            passed: true,
        };
        let line = check.to_string();
        assert!(line.contains("psnr"));
        assert!(line.ends_with("PASS"));
    }
}
