// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Candidate generation.
//
// `plan` decides which strategies to attempt from the content mode, the
// feature flags and what is installed. `CandidateGenerator` then encodes every
// planned strategy concurrently (bounded by a semaphore) into the scratch
// arena and hands back the survivors in plan order.

use std::sync::Arc;

use kompakt_core::config::{EngineConfig, FeatureFlags};
use kompakt_core::error::{KompaktError, Result};
use kompakt_core::{
    Candidate, ContentMode, ContentProfile, OriginalSnapshot, StrategyKind, ToolCapabilities,
};
use kompakt_document::Rasterizer;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::encoder::{
    Encoder, GhostscriptEncoder, LopdfOptimizer, OcrMrcEncoder, PixelPipelineEncoder,
    QpdfOptimizer, generation_failure, verify_output,
};
use crate::profiles::{Backend, EncodingProfile};
use crate::scratch::ScratchArena;

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Which encoder families can run in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub structural: bool,
    pub ghostscript: bool,
    pub ocr: bool,
    pub raster: bool,
}

impl Availability {
    /// The in-process optimizer means structural optimisation always works.
    pub fn from_capabilities(caps: &ToolCapabilities) -> Self {
        Self {
            structural: true,
            ghostscript: caps.ghostscript.is_some(),
            ocr: caps.ocrmypdf.is_some(),
            raster: caps.can_rasterize(),
        }
    }
}

/// Strategies to attempt, in canonical order.
pub fn plan(mode: Option<ContentMode>, flags: &FeatureFlags, available: &Availability) -> Vec<StrategyKind> {
    let monochrome = mode.is_some_and(|m| m.is_monochrome());
    let mut strategies = Vec::new();

    if available.structural {
        strategies.push(StrategyKind::Conservative);
    }
    if available.ghostscript {
        strategies.extend([
            StrategyKind::HighQuality,
            StrategyKind::Balanced,
            StrategyKind::AggressiveSafe,
        ]);
        if monochrome || flags.anti_noise {
            strategies.extend([StrategyKind::MonoLossless, StrategyKind::GrayscaleClean]);
        }
        if mode == Some(ContentMode::Color) {
            strategies.push(StrategyKind::ColorPreserve);
        }
    }
    if available.ocr && monochrome {
        strategies.push(StrategyKind::OcrMrc);
    }
    if available.raster && flags.advanced_raster {
        strategies.extend([StrategyKind::RasterBitonal, StrategyKind::RasterGrayscale]);
    }
    strategies
}

// ---------------------------------------------------------------------------
// Encoder routing
// ---------------------------------------------------------------------------

/// One encoder per backend family; `None` means the family is unavailable.
#[derive(Clone, Default)]
pub struct EncoderSet {
    pub structural: Option<Arc<dyn Encoder>>,
    pub ghostscript: Option<Arc<dyn Encoder>>,
    pub ocr: Option<Arc<dyn Encoder>>,
    pub pixel: Option<Arc<dyn Encoder>>,
}

impl EncoderSet {
    /// Real adapters for whatever `caps` found. The structural slot prefers
    /// qpdf and falls back to the in-process optimizer.
    pub fn from_capabilities(
        caps: &ToolCapabilities,
        config: &EngineConfig,
        rasterizer: Option<Arc<dyn Rasterizer>>,
    ) -> Self {
        let timeout = config.limits.encode_timeout();
        let structural: Arc<dyn Encoder> = match &caps.qpdf {
            Some(qpdf) => Arc::new(QpdfOptimizer::new(qpdf.clone(), timeout)),
            None => Arc::new(LopdfOptimizer),
        };
        Self {
            structural: Some(structural),
            ghostscript: caps
                .ghostscript
                .as_ref()
                .map(|gs| Arc::new(GhostscriptEncoder::new(gs.clone(), timeout)) as Arc<dyn Encoder>),
            ocr: caps.ocrmypdf.as_ref().map(|bin| {
                Arc::new(OcrMrcEncoder::new(
                    bin.clone(),
                    config.ocr.clone(),
                    caps.jbig2.is_some(),
                    timeout,
                )) as Arc<dyn Encoder>
            }),
            pixel: rasterizer.map(|r| {
                Arc::new(PixelPipelineEncoder::new(r, config.limits.raster_pipeline_dpi))
                    as Arc<dyn Encoder>
            }),
        }
    }

    pub fn availability(&self) -> Availability {
        Availability {
            structural: self.structural.is_some(),
            ghostscript: self.ghostscript.is_some(),
            ocr: self.ocr.is_some(),
            raster: self.pixel.is_some(),
        }
    }

    fn for_backend(&self, backend: Backend) -> Option<&Arc<dyn Encoder>> {
        match backend {
            Backend::Structural => self.structural.as_ref(),
            Backend::Ghostscript => self.ghostscript.as_ref(),
            Backend::OcrMrc => self.ocr.as_ref(),
            Backend::PixelPipeline(_) => self.pixel.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

pub struct CandidateGenerator {
    encoders: EncoderSet,
    flags: FeatureFlags,
    max_workers: usize,
}

impl CandidateGenerator {
    pub fn new(encoders: EncoderSet, flags: FeatureFlags, max_workers: usize) -> Self {
        Self {
            encoders,
            flags,
            max_workers: max_workers.max(1),
        }
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    /// The strategies `generate` would attempt for `mode`.
    pub fn plan_for(&self, mode: Option<ContentMode>) -> Vec<StrategyKind> {
        plan(mode, &self.flags, &self.encoders.availability())
    }

    /// Encode every planned strategy. Failures are logged and omitted; the
    /// result keeps plan order and may be empty.
    #[instrument(skip_all, fields(path = %original.path.display()))]
    pub async fn generate(
        &self,
        original: &OriginalSnapshot,
        profile: Option<&ContentProfile>,
        arena: &ScratchArena,
    ) -> Vec<Candidate> {
        let strategies = self.plan_for(profile.map(|p| p.mode));
        info!(
            planned = strategies.len(),
            strategies = ?strategies.iter().map(StrategyKind::name).collect::<Vec<_>>(),
            "candidate generation started"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks: JoinSet<(usize, StrategyKind, Result<Candidate>)> = JoinSet::new();

        for (index, strategy) in strategies.into_iter().enumerate() {
            let encoding = EncodingProfile::for_strategy(strategy);
            let Some(encoder) = self.encoders.for_backend(encoding.backend).cloned() else {
                debug!(%strategy, "no encoder for backend");
                continue;
            };
            let semaphore = Arc::clone(&semaphore);
            let input = original.path.clone();
            let output = arena.candidate_path(strategy);

            tasks.spawn(async move {
                let result = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|err| KompaktError::generation(strategy.name(), err.to_string()))?;
                    encoder
                        .encode(&input, &encoding, &output)
                        .await
                        .map_err(|err| generation_failure(strategy, err))?;
                    let size_bytes = verify_output(strategy, &output)?;
                    Ok::<Candidate, KompaktError>(Candidate {
                        strategy,
                        path: output,
                        size_bytes,
                    })
                }
                .await;
                (index, strategy, result)
            });
        }

        let mut finished = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(candidate))) => {
                    info!(
                        strategy = %candidate.strategy,
                        size_bytes = candidate.size_bytes,
                        reduction_percent = original.reduction_percent(candidate.size_bytes),
                        "candidate generated"
                    );
                    finished.push((index, candidate));
                }
                Ok((_, strategy, Err(err))) => {
                    warn!(%strategy, %err, "strategy failed; candidate omitted");
                }
                Err(err) => warn!(%err, "encoder task aborted"),
            }
        }

        finished.sort_by_key(|(index, _)| *index);
        finished.into_iter().map(|(_, candidate)| candidate).collect()
    }
}
