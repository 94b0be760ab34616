// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-document pipeline.
//
// snapshot -> profile -> generate -> (measure) -> score/select -> gate
//   -> fallbacks -> write output -> record
//
// Only an unreadable input or an unwritable output is an error; everything
// else degrades and ends up in the `CompressionRecord`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use kompakt_core::config::EngineConfig;
use kompakt_core::error::{KompaktError, Result};
use kompakt_core::{
    Candidate, CandidateSummary, CompressionRecord, ContentMode, ContentProfile, GateOutcome,
    NO_CHANGE_METHOD, OriginalSnapshot, PreserveReason, QualityMetrics, StrategyKind,
    ToolCapabilities,
};
use kompakt_document::{
    Assessment, ContentProfiler, GhostscriptRasterizer, QualityAssessor, Rasterizer,
    ReferenceRender,
};
use kompakt_telemetry::{NoopTelemetry, TelemetrySink};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::gate::{GateMachine, GateVerdict, QualityGate};
use crate::generator::{CandidateGenerator, EncoderSet};
use crate::scoring::{ScoredCandidate, ScoringContext, score_all, select};
use crate::scratch::ScratchArena;

/// Result of comparing two documents outside the compression flow.
#[derive(Debug, Clone)]
pub struct AssessmentReport {
    pub mode: Option<ContentMode>,
    pub assessment: Assessment,
    pub verdict: GateVerdict,
}

impl AssessmentReport {
    pub fn render(&self) -> String {
        let mut out = self.assessment.report();
        let mode = self.mode.map(|m| m.as_str()).unwrap_or("unknown");
        out.push_str(&format!("Content mode: {mode}\n"));
        for check in &self.verdict.checks {
            out.push_str(&format!("  {check}\n"));
        }
        out.push_str(if self.verdict.passed {
            "Verdict: PASS\n"
        } else {
            "Verdict: FAIL\n"
        });
        out
    }
}

/// The full compression engine for one configuration and tool set.
pub struct Pipeline {
    config: EngineConfig,
    generator: CandidateGenerator,
    profiler: Option<ContentProfiler>,
    assessor: Option<QualityAssessor>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators. Without a rasterizer
    /// the content mode stays unknown and metrics stay unset.
    pub fn new(
        config: EngineConfig,
        encoders: EncoderSet,
        rasterizer: Option<Arc<dyn Rasterizer>>,
    ) -> Self {
        let generator =
            CandidateGenerator::new(encoders, config.features.clone(), config.limits.max_workers);
        let profiler = rasterizer
            .clone()
            .map(|r| ContentProfiler::new(r, config.profiler.clone()));
        let assessor = rasterizer.map(|r| {
            QualityAssessor::new(r, &config.assessor).with_sharpness(config.features.sharpness_aware)
        });
        if config.assessor.lpips_model.is_some()
            && !assessor.as_ref().is_some_and(QualityAssessor::lpips_available)
        {
            warn!("LPIPS model configured but unavailable; LPIPS stays unset");
        }
        Self {
            config,
            generator,
            profiler,
            assessor,
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    /// Wire the real adapters for whatever was detected on this machine.
    pub fn from_capabilities(config: EngineConfig, caps: &ToolCapabilities) -> Self {
        let rasterizer = caps.ghostscript.as_ref().map(|gs| {
            Arc::new(GhostscriptRasterizer::new(gs.clone(), config.limits.raster_timeout()))
                as Arc<dyn Rasterizer>
        });
        let encoders = EncoderSet::from_capabilities(caps, &config, rasterizer.clone());
        Self::new(config, encoders, rasterizer)
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- Compression --------------------------------------------------------

    /// Compress `input` into `output`. The output is never larger than the
    /// input; when nothing better exists it is a byte-for-byte copy.
    #[instrument(skip_all, fields(input = %input.display()))]
    pub async fn compress(&self, input: &Path, output: &Path) -> Result<CompressionRecord> {
        let started = Instant::now();
        let document_id = self.analyze_for_telemetry(input).await;

        let result = self.run(input, output, started).await;
        if let Some(id) = &document_id {
            match &result {
                Ok(record) => self.telemetry.record_result(id, record),
                Err(err) => self.telemetry.record_failure(id, err),
            }
        }
        result
    }

    async fn analyze_for_telemetry(&self, input: &Path) -> Option<String> {
        let sink = Arc::clone(&self.telemetry);
        let path = input.to_path_buf();
        tokio::task::spawn_blocking(move || sink.analyze_document(&path))
            .await
            .ok()
            .flatten()
    }

    async fn run(&self, input: &Path, output: &Path, started: Instant) -> Result<CompressionRecord> {
        let original = OriginalSnapshot::capture(input)?;
        if !original.path.is_file() {
            return Err(KompaktError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "input is not a regular file",
            )));
        }
        info!(size_bytes = original.size_bytes, "processing document");

        let arena = ScratchArena::new()?;
        let profile = self.profile(input).await;
        let mode = profile.map(|p| p.mode);

        let candidates = self.generator.generate(&original, profile.as_ref(), &arena).await;
        if candidates.is_empty() {
            warn!("no candidate could be generated");
            let outcome = GateOutcome::Preserved {
                reason: PreserveReason::NoCandidates,
            };
            return self.preserve(&original, output, mode, outcome, Vec::new(), started);
        }

        let reference = match &self.assessor {
            Some(assessor) => assessor.render_reference(input).await,
            None => None,
        };

        let sharpness_aware = self.config.features.sharpness_aware;
        let mut measured: HashMap<StrategyKind, Assessment> = if sharpness_aware {
            self.assess_all(reference.as_ref(), &candidates).await
        } else {
            HashMap::new()
        };
        let baseline = if sharpness_aware {
            reference.as_ref().and_then(ReferenceRender::sharpness)
        } else {
            None
        };

        let context = ScoringContext {
            policy: &self.config.scoring,
            flags: &self.config.features,
            mode,
            baseline_sharpness: baseline,
        };
        let scored = score_all(&context, &original, &candidates, |candidate| {
            measured.get(&candidate.strategy).map(|a| a.metrics)
        });
        let summaries: Vec<CandidateSummary> = scored.iter().map(ScoredCandidate::summary).collect();
        let Some(best) = select(&scored) else {
            let outcome = GateOutcome::Preserved {
                reason: PreserveReason::NoCandidates,
            };
            return self.preserve(&original, output, mode, outcome, summaries, started);
        };
        info!(
            strategy = %scored[best].candidate.strategy,
            score = scored[best].score,
            reduction_percent = scored[best].reduction_percent,
            "candidate selected"
        );

        // Gate the selection, then the fallbacks.
        let gate = QualityGate::new(self.config.gate.clone(), mode);
        let generated: Vec<StrategyKind> = candidates.iter().map(|c| c.strategy).collect();
        let mut machine = GateMachine::new(scored[best].candidate.strategy, &generated);
        while let Some(strategy) = machine.pending() {
            if !measured.contains_key(&strategy) {
                let assessment = match scored.iter().find(|s| s.candidate.strategy == strategy) {
                    Some(entry) => self.assess_one(reference.as_ref(), &entry.candidate).await,
                    None => Assessment::default(),
                };
                measured.insert(strategy, assessment);
            }
            let metrics = measured
                .get(&strategy)
                .map(|a| a.metrics)
                .unwrap_or_default();
            let verdict = gate.evaluate(&metrics);
            for check in &verdict.checks {
                info!(%strategy, "{check}");
            }
            machine.record(verdict.passed);
        }

        let (outcome, accepted) = machine.outcome().unwrap_or((
            GateOutcome::Preserved {
                reason: PreserveReason::QualityRejected,
            },
            None,
        ));
        let chosen = accepted.and_then(|s| scored.iter().find(|c| c.candidate.strategy == s));

        match chosen {
            Some(chosen) if chosen.candidate.size_bytes < original.size_bytes => {
                let metrics = measured.get(&chosen.candidate.strategy).map(|a| a.metrics);
                self.ship(&original, output, chosen, metrics, mode, outcome, summaries, started)
            }
            Some(chosen) => {
                warn!(
                    strategy = %chosen.candidate.strategy,
                    size_bytes = chosen.candidate.size_bytes,
                    original_bytes = original.size_bytes,
                    "accepted candidate is not smaller; keeping the original"
                );
                let outcome = GateOutcome::Preserved {
                    reason: PreserveReason::NotSmaller,
                };
                self.preserve(&original, output, mode, outcome, summaries, started)
            }
            None => self.preserve(&original, output, mode, outcome, summaries, started),
        }
    }

    async fn profile(&self, input: &Path) -> Option<ContentProfile> {
        match &self.profiler {
            Some(profiler) => profiler.profile(input).await,
            None => {
                debug!("no rasterizer; content mode unknown");
                None
            }
        }
    }

    async fn assess_one(&self, reference: Option<&ReferenceRender>, candidate: &Candidate) -> Assessment {
        match (&self.assessor, reference) {
            (Some(assessor), Some(reference)) => assessor.assess_against(reference, &candidate.path).await,
            _ => Assessment::default(),
        }
    }

    /// Measure every candidate, bounded by `max_workers`.
    async fn assess_all(
        &self,
        reference: Option<&ReferenceRender>,
        candidates: &[Candidate],
    ) -> HashMap<StrategyKind, Assessment> {
        let (Some(assessor), Some(reference)) = (&self.assessor, reference) else {
            return HashMap::new();
        };
        let semaphore = Arc::new(Semaphore::new(self.config.limits.max_workers.max(1)));
        let mut tasks = JoinSet::new();
        for candidate in candidates {
            let assessor = assessor.clone();
            let reference = reference.clone();
            let semaphore = Arc::clone(&semaphore);
            let strategy = candidate.strategy;
            let path = candidate.path.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some((strategy, assessor.assess_against(&reference, &path).await))
            });
        }

        let mut measured = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((strategy, assessment))) => {
                    measured.insert(strategy, assessment);
                }
                Ok(None) => {}
                Err(err) => warn!(%err, "assessment task aborted"),
            }
        }
        measured
    }

    // -- Output -------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn ship(
        &self,
        original: &OriginalSnapshot,
        output: &Path,
        chosen: &ScoredCandidate,
        metrics: Option<QualityMetrics>,
        mode: Option<ContentMode>,
        gate: GateOutcome,
        candidates: Vec<CandidateSummary>,
        started: Instant,
    ) -> Result<CompressionRecord> {
        prepare_parent(output)?;
        std::fs::copy(&chosen.candidate.path, output)?;
        let final_size_bytes = std::fs::metadata(output)?.len();
        let metrics = metrics.unwrap_or_default();

        let record = CompressionRecord {
            original_file: original.path.display().to_string(),
            final_file: output.display().to_string(),
            original_size_bytes: original.size_bytes,
            final_size_bytes,
            reduction_percent: original.reduction_percent(final_size_bytes),
            method: chosen.candidate.strategy.name().to_string(),
            score: chosen.score,
            content_mode: mode,
            gate,
            psnr: metrics.psnr,
            ssim: metrics.ssim,
            lpips: metrics.lpips,
            sharpness: metrics.sharpness,
            candidates,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            method = %record.method,
            original_bytes = record.original_size_bytes,
            final_bytes = record.final_size_bytes,
            reduction_percent = record.reduction_percent,
            "document compressed"
        );
        Ok(record)
    }

    fn preserve(
        &self,
        original: &OriginalSnapshot,
        output: &Path,
        mode: Option<ContentMode>,
        gate: GateOutcome,
        candidates: Vec<CandidateSummary>,
        started: Instant,
    ) -> Result<CompressionRecord> {
        if !same_file(&original.path, output) {
            prepare_parent(output)?;
            std::fs::copy(&original.path, output)?;
        }
        info!(?gate, "original preserved");
        Ok(CompressionRecord {
            original_file: original.path.display().to_string(),
            final_file: output.display().to_string(),
            original_size_bytes: original.size_bytes,
            final_size_bytes: original.size_bytes,
            reduction_percent: 0.0,
            method: NO_CHANGE_METHOD.to_string(),
            score: 0.0,
            content_mode: mode,
            gate,
            psnr: None,
            ssim: None,
            lpips: None,
            sharpness: None,
            candidates,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    // -- Standalone assessment ---------------------------------------------

    /// Compare `candidate` against `original` and apply the quality gate.
    #[instrument(skip_all, fields(original = %original.display(), candidate = %candidate.display()))]
    pub async fn assess_pair(&self, original: &Path, candidate: &Path) -> Result<AssessmentReport> {
        let assessor = self.assessor.as_ref().ok_or_else(|| {
            KompaktError::ToolUnavailable("no rasterizer available for quality assessment".into())
        })?;
        for (role, path) in [("original", original), ("candidate", candidate)] {
            if !path.is_file() {
                return Err(KompaktError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{role} is not a regular file"),
                )));
            }
        }
        let mode = self.profile(original).await.map(|p| p.mode);
        let assessment = assessor.assess(original, candidate).await;
        let verdict = QualityGate::new(self.config.gate.clone(), mode).evaluate(&assessment.metrics);
        Ok(AssessmentReport {
            mode,
            assessment,
            verdict,
        })
    }
}

fn prepare_parent(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
