// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments and their mapping onto `EngineConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kompakt_core::config::EngineConfig;
use kompakt_core::error::Result;

#[derive(Debug, Parser)]
#[command(name = "kompakt", version)]
#[command(about = "Quality-gated PDF size optimizer", long_about = None)]
pub struct Cli {
    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compress every PDF in a directory
    Batch {
        /// Directory holding the PDFs to compress
        #[arg(default_value = "input")]
        input_dir: PathBuf,

        /// Directory receiving `<name>_optimized.pdf` files
        #[arg(default_value = "output")]
        output_dir: PathBuf,

        /// Leave originals in place instead of moving them to `processed/`
        #[arg(long)]
        keep_originals: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Compress a single PDF
    File {
        input: PathBuf,

        /// Defaults to `<stem>_optimized.pdf` beside the input
        output: Option<PathBuf>,

        /// Print the result record as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Compare two PDFs and gate the candidate against the original
    Assess {
        original: PathBuf,
        candidate: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Show which external tools were found
    Tools,
    /// Summarise a telemetry log
    Stats {
        log: PathBuf,
    },
}

/// Engine tuning shared by every command that runs the pipeline.
#[derive(Debug, Default, Args)]
pub struct EngineArgs {
    /// JSON configuration file; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also gate on SSIM
    #[arg(long)]
    pub ssim: bool,

    /// LPIPS model file (needs the `lpips` feature)
    #[arg(long)]
    pub lpips_model: Option<PathBuf>,

    /// Try monochrome-first profiles on every document
    #[arg(long)]
    pub anti_noise: bool,

    /// Try rasterize-and-rebuild pipelines
    #[arg(long)]
    pub advanced_raster: bool,

    /// Fold candidate sharpness into the score
    #[arg(long)]
    pub sharpness_aware: bool,

    /// Reward candidates sharper than the original (implies --sharpness-aware)
    #[arg(long)]
    pub prefer_sharpness: bool,

    /// Concurrent encoder and assessment tasks
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// OCR language for the OCR/MRC strategy, e.g. `eng+spa`
    #[arg(long)]
    pub ocr_language: Option<String>,

    /// Append anonymous results to this JSON-lines file
    #[arg(long)]
    pub telemetry_log: Option<PathBuf>,
}

impl EngineArgs {
    /// Load the configuration file, if any, then apply flag overrides.
    pub fn resolve(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut EngineConfig) {
        if self.ssim {
            config.assessor.ssim_enabled = true;
        }
        if let Some(model) = &self.lpips_model {
            config.assessor.lpips_model = Some(model.clone());
        }
        let features = &mut config.features;
        features.anti_noise |= self.anti_noise;
        features.advanced_raster |= self.advanced_raster;
        features.prefer_sharpness |= self.prefer_sharpness;
        features.sharpness_aware |= self.sharpness_aware || self.prefer_sharpness;
        if let Some(workers) = self.workers {
            config.limits.max_workers = workers;
        }
        if let Some(language) = &self.ocr_language {
            config.ocr.language = language.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "kompakt",
            "file",
            "in.pdf",
            "--ssim",
            "--prefer-sharpness",
            "--workers",
            "2",
            "--ocr-language",
            "deu",
        ]);
        let Command::File { engine, output, .. } = cli.command else {
            panic!("expected file command");
        };
        assert!(output.is_none());

        let config = engine.resolve().unwrap();
        assert!(config.assessor.ssim_enabled);
        assert!(config.features.sharpness_aware);
        assert!(config.features.prefer_sharpness);
        assert!(!config.features.anti_noise);
        assert_eq!(config.limits.max_workers, 2);
        assert_eq!(config.ocr.language, "deu");
    }

    #[test]
    fn zero_workers_is_rejected() {
        let args = EngineArgs {
            workers: Some(0),
            ..EngineArgs::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn config_file_is_overridden_by_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kompakt.json");
        std::fs::write(
            &path,
            r#"{ "features": { "anti_noise": true }, "limits": { "max_workers": 8 } }"#,
        )
        .unwrap();

        let args = EngineArgs {
            config: Some(path),
            workers: Some(3),
            ..EngineArgs::default()
        };
        let config = args.resolve().unwrap();
        assert!(config.features.anti_noise);
        assert_eq!(config.limits.max_workers, 3);
    }

    #[test]
    fn batch_directories_default() {
        let cli = Cli::parse_from(["kompakt", "-v", "batch"]);
        assert!(cli.verbose);
        let Command::Batch {
            input_dir,
            output_dir,
            keep_originals,
            ..
        } = cli.command
        else {
            panic!("expected batch command");
        };
        assert_eq!(input_dir, PathBuf::from("input"));
        assert_eq!(output_dir, PathBuf::from("output"));
        assert!(!keep_originals);
    }
}
