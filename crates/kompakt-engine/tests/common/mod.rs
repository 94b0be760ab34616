// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test doubles for driving the pipeline without Ghostscript.
//
// `FakeEncoder` writes a file of a fixed size per strategy whose first line
// names the strategy. `FakeRasterizer` reads that line back and renders a
// page shifted by a per-strategy luma offset, so a candidate's PSNR is
// 20 * log10(255 / offset).

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use kompakt_core::StrategyKind;
use kompakt_core::config::EngineConfig;
use kompakt_core::error::{KompaktError, Result};
use kompakt_document::{RasterOutput, RasterPage, Rasterizer};
use kompakt_engine::profiles::EncodingProfile;
use kompakt_engine::{Encoder, EncoderSet, Pipeline};

const MARKER: &[u8] = b"%FAKE ";

/// Encodes the strategies it knows at fixed sizes; fails on everything else.
/// Every path it writes is remembered in a shared list.
pub struct FakeEncoder {
    sizes: HashMap<StrategyKind, u64>,
    partial_on_failure: bool,
    written: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeEncoder {
    pub fn new(sizes: &[(StrategyKind, u64)]) -> Self {
        Self {
            sizes: sizes.iter().copied().collect(),
            partial_on_failure: false,
            written: Arc::default(),
        }
    }

    /// Leave a truncated file behind before failing, like a crashed tool.
    pub fn partial_on_failure(mut self) -> Self {
        self.partial_on_failure = true;
        self
    }

    /// Handle to the list of written paths; stays valid after the encoder
    /// moves into a pipeline.
    pub fn written(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.written)
    }

    fn write(&self, output: &Path, bytes: &[u8]) -> Result<()> {
        std::fs::write(output, bytes)?;
        self.written.lock().unwrap().push(output.to_path_buf());
        Ok(())
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode(&self, _input: &Path, profile: &EncodingProfile, output: &Path) -> Result<()> {
        let Some(&size) = self.sizes.get(&profile.strategy) else {
            if self.partial_on_failure {
                self.write(output, b"%PDF-1.4\n")?;
            }
            return Err(KompaktError::generation(profile.strategy.name(), "exited with 1"));
        };
        let mut bytes = format!("%FAKE {}\n", profile.strategy.name()).into_bytes();
        bytes.resize(size as usize, b'x');
        self.write(output, &bytes)
    }
}

/// Page appearance used for every render.
#[derive(Debug, Clone, Copy)]
pub enum PageStyle {
    /// Black bars on white: classifies as bitonal.
    Text,
    /// Red blocks on white: classifies as colour.
    Color,
}

pub struct FakeRasterizer {
    style: PageStyle,
    pages: u32,
    offsets: HashMap<String, u8>,
}

impl FakeRasterizer {
    pub fn new(style: PageStyle, offsets: &[(StrategyKind, u8)]) -> Self {
        Self {
            style,
            pages: 3,
            offsets: offsets
                .iter()
                .map(|(kind, offset)| (kind.name().to_string(), *offset))
                .collect(),
        }
    }

    fn offset_for(&self, pdf: &Path) -> u8 {
        let bytes = std::fs::read(pdf).unwrap_or_default();
        if !bytes.starts_with(MARKER) {
            return 0;
        }
        let line_end = bytes.iter().position(|b| *b == b'\n').unwrap_or(bytes.len());
        let name = String::from_utf8_lossy(&bytes[MARKER.len()..line_end]).into_owned();
        self.offsets.get(&name).copied().unwrap_or(0)
    }

    fn page(&self, offset: u8) -> RgbImage {
        RgbImage::from_fn(64, 64, |x, y| {
            let base = match self.style {
                PageStyle::Text => {
                    if y % 8 < 2 && x % 16 < 12 {
                        [20, 20, 20]
                    } else {
                        [235, 235, 235]
                    }
                }
                PageStyle::Color => {
                    if (x / 8 + y / 8) % 3 == 0 {
                        [200, 60, 60]
                    } else {
                        [235, 235, 235]
                    }
                }
            };
            Rgb(base.map(|v: u8| v + offset))
        })
    }
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(&self, pdf: &Path, first: u32, last: u32, _dpi: u32) -> Result<RasterOutput> {
        if !pdf.exists() {
            return Err(KompaktError::Rasterization("no such file".into()));
        }
        let offset = self.offset_for(pdf);
        let pages = (first..=last.min(self.pages))
            .map(|number| RasterPage {
                number,
                image: self.page(offset),
            })
            .collect();
        Ok(RasterOutput::from_range(pages, first, last.min(self.pages)))
    }
}

/// A pipeline whose structural and Ghostscript slots are `encoder`.
pub fn pipeline(config: EngineConfig, encoder: FakeEncoder, rasterizer: Option<FakeRasterizer>) -> Pipeline {
    let encoder: Arc<dyn Encoder> = Arc::new(encoder);
    let encoders = EncoderSet {
        structural: Some(Arc::clone(&encoder)),
        ghostscript: Some(encoder),
        ocr: None,
        pixel: None,
    };
    Pipeline::new(
        config,
        encoders,
        rasterizer.map(|r| Arc::new(r) as Arc<dyn Rasterizer>),
    )
}

/// Write an opaque "original" of exactly `size` bytes.
pub fn write_original(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    let mut bytes = b"%ORIGINAL\n".to_vec();
    bytes.resize(size, b'o');
    std::fs::write(&path, bytes).expect("write original");
    path
}
