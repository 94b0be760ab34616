// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text rendering of results for the terminal.

use std::fmt::Write as _;

use kompakt_core::{CompressionRecord, GateOutcome, PreserveReason, bytes_to_mb};
use kompakt_telemetry::TelemetrySummary;

fn gate_label(gate: &GateOutcome) -> String {
    match gate {
        GateOutcome::Passed => "passed".into(),
        GateOutcome::Recovered { rejected } => format!("recovered ({} rejected)", rejected.name()),
        GateOutcome::Preserved { reason } => {
            let why = match reason {
                PreserveReason::NoCandidates => "no candidates",
                PreserveReason::QualityRejected => "quality rejected",
                PreserveReason::NotSmaller => "nothing smaller",
            };
            format!("original kept: {why}")
        }
    }
}

fn metric(value: Option<f64>, unit: &str) -> String {
    value
        .map(|v| format!("{v:.3}{unit}"))
        .unwrap_or_else(|| "-".into())
}

/// One document's outcome with its candidate score table.
pub fn record(record: &CompressionRecord) -> String {
    let mut out = String::new();
    let mode = record.content_mode.map(|m| m.as_str()).unwrap_or("unknown");
    let _ = writeln!(out, "{} -> {}", record.original_file, record.final_file);
    let _ = writeln!(
        out,
        "  {:.2} MB -> {:.2} MB ({:.1}%)",
        record.original_mb(),
        record.final_mb(),
        record.reduction_percent
    );
    let _ = writeln!(out, "  method: {}  score: {:.1}", record.method, record.score);
    let _ = writeln!(out, "  content mode: {mode}");
    let _ = writeln!(out, "  gate: {}", gate_label(&record.gate));
    let _ = writeln!(
        out,
        "  psnr: {}  ssim: {}  lpips: {}",
        metric(record.psnr, " dB"),
        metric(record.ssim, ""),
        metric(record.lpips, "")
    );
    if !record.candidates.is_empty() {
        let _ = writeln!(out, "  candidates:");
        for candidate in &record.candidates {
            let _ = writeln!(
                out,
                "    {:<18} {:>10.2} MB {:>7.1}% {:>7.1}",
                candidate.method,
                bytes_to_mb(candidate.size_bytes),
                candidate.reduction_percent,
                candidate.score
            );
        }
    }
    let _ = writeln!(out, "  took {} ms", record.elapsed_ms);
    out
}

/// Aggregate telemetry in the batch summary's style.
pub fn telemetry(summary: &TelemetrySummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Documents analysed: {}", summary.documents);
    let _ = writeln!(out, "Compressions:       {}", summary.compressions);
    let _ = writeln!(out, "Unchanged:          {}", summary.unchanged);
    let _ = writeln!(out, "Failures:           {}", summary.failures);
    let _ = writeln!(
        out,
        "Total:              {:.2} MB -> {:.2} MB ({:.1}%)",
        bytes_to_mb(summary.bytes_before),
        bytes_to_mb(summary.bytes_after),
        kompakt_core::reduction_percent(summary.bytes_before, summary.bytes_after)
    );
    if !summary.methods.is_empty() {
        let _ = writeln!(out, "Methods:");
        for (method, stats) in &summary.methods {
            let _ = writeln!(
                out,
                "  {method}: {} ({:.1}% mean reduction)",
                stats.count, stats.mean_reduction_percent
            );
        }
    }
    if summary.skipped_lines > 0 {
        let _ = writeln!(out, "Unreadable lines skipped: {}", summary.skipped_lines);
    }
    out
}
