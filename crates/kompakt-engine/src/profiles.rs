// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Encoding profile catalog.
//
// One immutable `EncodingProfile` per `StrategyKind`. A profile only describes
// *what* to produce; the encoders in `encoder.rs` decide *how* to invoke their
// backend with it.

use std::ffi::OsString;
use std::path::Path;

use kompakt_core::config::OcrConfig;
use kompakt_core::{ContentMode, StrategyKind};

/// Which encoder family realises a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// qpdf when installed, the in-process lopdf optimizer otherwise.
    Structural,
    /// Ghostscript `pdfwrite`.
    Ghostscript,
    /// ocrmypdf.
    OcrMrc,
    /// Rasterize, clean up as the given mode, rebuild.
    PixelPipeline(ContentMode),
}

/// Image compression filter forced on one image class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    /// Let Ghostscript choose per image.
    Auto,
    /// JPEG.
    Dct,
    /// Lossless deflate.
    Flate,
    /// CCITT Group 4 (1-bit images only).
    Ccitt,
}

impl ImageFilter {
    fn ghostscript_name(&self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            Self::Dct => Some("/DCTEncode"),
            Self::Flate => Some("/FlateEncode"),
            Self::Ccitt => Some("/CCITTFaxEncode"),
        }
    }
}

/// Downsampling and filter settings for one image class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSettings {
    /// Target resolution; `None` disables downsampling.
    pub resolution: Option<u32>,
    /// Only images above `resolution * threshold` are downsampled.
    pub threshold: f64,
    pub filter: ImageFilter,
}

impl ImageSettings {
    const fn downsample(resolution: u32, threshold: f64, filter: ImageFilter) -> Self {
        Self {
            resolution: Some(resolution),
            threshold,
            filter,
        }
    }

    const fn keep(filter: ImageFilter) -> Self {
        Self {
            resolution: None,
            threshold: 1.0,
            filter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorConversion {
    Keep,
    /// Convert everything to DeviceGray; no chroma survives.
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontPolicy {
    pub embed_all: bool,
    pub subset: bool,
    pub compress: bool,
}

const SUBSET_COMPRESSED: FontPolicy = FontPolicy {
    embed_all: true,
    subset: true,
    compress: true,
};

/// Everything an encoder needs to know to produce one candidate.
///
/// The profile carries no priority weight. Each strategy's prior is part of
/// the tunable scoring configuration instead, see
/// [`ScoringPolicy::prior`](kompakt_core::config::ScoringPolicy::prior).
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingProfile {
    pub strategy: StrategyKind,
    pub backend: Backend,
    /// PDF compatibility level written by Ghostscript.
    pub compatibility: &'static str,
    /// `-dPDFSETTINGS` preset the explicit settings refine.
    pub preset: &'static str,
    pub color: ImageSettings,
    pub gray: ImageSettings,
    pub mono: ImageSettings,
    pub color_conversion: ColorConversion,
    pub fonts: FontPolicy,
    pub jpeg_quality: Option<u8>,
    pub detect_duplicates: bool,
    pub preserve_annotations: bool,
}

impl EncodingProfile {
    /// The catalog entry for `strategy`.
    pub fn for_strategy(strategy: StrategyKind) -> Self {
        use ImageFilter::*;

        let base = Self {
            strategy,
            backend: Backend::Ghostscript,
            compatibility: "1.6",
            preset: "/printer",
            color: ImageSettings::downsample(200, 1.5, Auto),
            gray: ImageSettings::downsample(200, 1.5, Auto),
            mono: ImageSettings::downsample(600, 1.5, Auto),
            color_conversion: ColorConversion::Keep,
            fonts: SUBSET_COMPRESSED,
            jpeg_quality: None,
            detect_duplicates: false,
            preserve_annotations: false,
        };

        match strategy {
            StrategyKind::Conservative => Self {
                backend: Backend::Structural,
                ..base
            },
            StrategyKind::HighQuality => Self {
                compatibility: "1.7",
                preset: "/prepress",
                color: ImageSettings::downsample(300, 2.0, Auto),
                gray: ImageSettings::downsample(300, 2.0, Auto),
                mono: ImageSettings::downsample(1200, 2.0, Auto),
                fonts: FontPolicy {
                    compress: false,
                    ..SUBSET_COMPRESSED
                },
                preserve_annotations: true,
                ..base
            },
            StrategyKind::Balanced => base,
            StrategyKind::AggressiveSafe => Self {
                compatibility: "1.5",
                preset: "/ebook",
                color: ImageSettings::downsample(150, 1.2, Auto),
                gray: ImageSettings::downsample(150, 1.2, Auto),
                mono: ImageSettings::downsample(600, 1.2, Auto),
                detect_duplicates: true,
                ..base
            },
            StrategyKind::MonoLossless => Self {
                compatibility: "1.5",
                color: ImageSettings::downsample(300, 1.5, Flate),
                gray: ImageSettings::downsample(300, 1.5, Flate),
                mono: ImageSettings::downsample(600, 1.5, Ccitt),
                color_conversion: ColorConversion::Gray,
                detect_duplicates: true,
                ..base
            },
            StrategyKind::GrayscaleClean => Self {
                compatibility: "1.5",
                color: ImageSettings::downsample(200, 1.5, Flate),
                gray: ImageSettings::downsample(200, 1.5, Flate),
                mono: ImageSettings::downsample(600, 1.5, Flate),
                color_conversion: ColorConversion::Gray,
                detect_duplicates: true,
                ..base
            },
            StrategyKind::ColorPreserve => Self {
                compatibility: "1.7",
                preset: "/prepress",
                color: ImageSettings::keep(Dct),
                gray: ImageSettings::keep(Dct),
                mono: ImageSettings::keep(Auto),
                jpeg_quality: Some(95),
                preserve_annotations: true,
                ..base
            },
            StrategyKind::OcrMrc => Self {
                backend: Backend::OcrMrc,
                ..base
            },
            StrategyKind::RasterBitonal => Self {
                backend: Backend::PixelPipeline(ContentMode::Bitonal),
                ..base
            },
            StrategyKind::RasterGrayscale => Self {
                backend: Backend::PixelPipeline(ContentMode::Grayscale),
                ..base
            },
        }
    }

    /// `pdfwrite` argument list realising this profile.
    pub fn ghostscript_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-dSAFER".into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-dBATCH".into(),
            "-sDEVICE=pdfwrite".into(),
            format!("-dCompatibilityLevel={}", self.compatibility).into(),
            format!("-dPDFSETTINGS={}", self.preset).into(),
        ];

        push_image_class(&mut args, "Color", &self.color);
        push_image_class(&mut args, "Gray", &self.gray);
        push_image_class(&mut args, "Mono", &self.mono);

        if self.color_conversion == ColorConversion::Gray {
            args.push("-sColorConversionStrategy=Gray".into());
            args.push("-dProcessColorModel=/DeviceGray".into());
        }
        if let Some(quality) = self.jpeg_quality {
            args.push(format!("-dJPEGQ={quality}").into());
        }
        if self.detect_duplicates {
            args.push("-dDetectDuplicateImages=true".into());
        }
        if self.preserve_annotations {
            args.push("-dPreserveAnnots=true".into());
        }
        args.push("-dOptimize=true".into());
        args.push(format!("-dEmbedAllFonts={}", self.fonts.embed_all).into());
        args.push(format!("-dSubsetFonts={}", self.fonts.subset).into());
        args.push(format!("-dCompressFonts={}", self.fonts.compress).into());

        let mut out_file = OsString::from("-sOutputFile=");
        out_file.push(output);
        args.push(out_file);
        args.push(input.as_os_str().to_owned());
        args
    }

    /// ocrmypdf argument list; `jbig2` says whether jbig2enc is installed.
    pub fn ocr_args(&self, ocr: &OcrConfig, jbig2: bool, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--language".into(),
            ocr.language.as_str().into(),
            "--deskew".into(),
            "--clean".into(),
            "--remove-background".into(),
            "--optimize".into(),
            "3".into(),
        ];
        args.push(if ocr.force { "--force-ocr" } else { "--skip-text" }.into());
        if ocr.jbig2_lossy && jbig2 {
            args.push("--jbig2-lossy".into());
        }
        args.push(input.as_os_str().to_owned());
        args.push(output.as_os_str().to_owned());
        args
    }
}

fn push_image_class(args: &mut Vec<OsString>, class: &str, settings: &ImageSettings) {
    match settings.resolution {
        Some(dpi) => {
            args.push(format!("-dDownsample{class}Images=true").into());
            args.push(format!("-d{class}ImageResolution={dpi}").into());
            args.push(format!("-d{class}ImageDownsampleThreshold={:.1}", settings.threshold).into());
            let kind = if class == "Mono" { "/Subsample" } else { "/Bicubic" };
            args.push(format!("-d{class}ImageDownsampleType={kind}").into());
        }
        None => args.push(format!("-dDownsample{class}Images=false").into()),
    }
    if let Some(filter) = settings.filter.ghostscript_name() {
        // Mono images have no auto-filter switch in pdfwrite.
        if class != "Mono" {
            args.push(format!("-dAutoFilter{class}Images=false").into());
        }
        args.push(format!("-dEncode{class}Images=true").into());
        args.push(format!("-d{class}ImageFilter={filter}").into());
    }
}
