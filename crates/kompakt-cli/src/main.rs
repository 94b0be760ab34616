// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kompakt — quality-gated PDF size optimizer
//
// Entry point. Initialises logging, detects external tools once, builds the
// pipeline and dispatches the subcommand.

mod args;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use kompakt_core::ToolCapabilities;
use kompakt_core::error::Result;
use kompakt_document::process::tool_version;
use kompakt_engine::batch::optimized_file_name;
use kompakt_engine::{BatchRunner, Pipeline};
use kompakt_telemetry::{JsonlTelemetry, TelemetrySink};
use tracing::{error, info, warn};

use args::{Cli, Command, EngineArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "kompakt failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Batch {
            input_dir,
            output_dir,
            keep_originals,
            engine,
        } => {
            let pipeline = build_pipeline(&engine)?;
            let mut runner = BatchRunner::new(&pipeline);
            if keep_originals {
                runner = runner.keep_originals();
            }
            let summary = runner.run(&input_dir, &output_dir).await?;
            print!("{}", summary.render());
            Ok(if summary.failures.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::File {
            input,
            output,
            json,
            engine,
        } => {
            let pipeline = build_pipeline(&engine)?;
            let output = output.unwrap_or_else(|| default_output(&input));
            let record = pipeline.compress(&input, &output).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print!("{}", report::record(&record));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Assess {
            original,
            candidate,
            engine,
        } => {
            let pipeline = build_pipeline(&engine)?;
            let report = pipeline.assess_pair(&original, &candidate).await?;
            print!("{}", report.render());
            Ok(if report.verdict.passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Tools => {
            let caps = ToolCapabilities::detect();
            for (name, path) in caps.entries() {
                match path {
                    Some(path) => {
                        let version = tool_version(path)
                            .await
                            .unwrap_or_else(|| "version unknown".into());
                        println!("{name:<12} {}  ({version})", path.display());
                    }
                    None => println!("{name:<12} not found"),
                }
            }
            println!(
                "{:<12} {}",
                "lpips",
                if kompakt_document::quality::lpips::compiled_in() {
                    "compiled in"
                } else {
                    "not compiled in"
                }
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats { log } => {
            let summary = kompakt_telemetry::summarize(&log)?;
            print!("{}", report::telemetry(&summary));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_pipeline(args: &EngineArgs) -> Result<Pipeline> {
    let config = args.resolve()?;
    let caps = ToolCapabilities::detect();
    if caps.ghostscript.is_none() {
        warn!("Ghostscript not found: only structural optimisation is available, quality is not measured");
    }
    info!(
        workers = config.limits.max_workers,
        anti_noise = config.features.anti_noise,
        advanced_raster = config.features.advanced_raster,
        sharpness_aware = config.features.sharpness_aware,
        "engine configured"
    );

    let pipeline = Pipeline::from_capabilities(config, &caps);
    Ok(match &args.telemetry_log {
        Some(path) => {
            let sink = JsonlTelemetry::open(path)?;
            info!(run_id = %sink.run_id(), path = %path.display(), "telemetry enabled");
            pipeline.with_telemetry(Arc::new(sink) as Arc<dyn TelemetrySink>)
        }
        None => pipeline,
    })
}

fn default_output(input: &Path) -> PathBuf {
    let name = optimized_file_name(input);
    match input.parent() {
        Some(parent) => parent.join(name),
        None => name,
    }
}
