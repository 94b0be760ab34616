// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result recording — append-only JSON-lines log of anonymous compression
// outcomes.
//
// Each line is one `TelemetryEvent`:
//   { "run_id": uuid, "timestamp": RFC 3339, "document_id": sha256-hex,
//     "event": "document" | "compression" | "failure", ...payload }
//
// No file names, paths or document content ever reach the log. Telemetry
// failures are logged and swallowed; they never affect compression.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use kompakt_core::error::{KompaktError, Result};
use kompakt_core::{CompressionRecord, ContentMode, GateOutcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::fingerprint::DocumentFingerprint;

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Optional collaborator that observes processed documents.
pub trait TelemetrySink: Send + Sync {
    /// Fingerprint `path` and return its anonymous ID.
    fn analyze_document(&self, path: &Path) -> Option<String>;

    /// Record the outcome for a previously analysed document.
    fn record_result(&self, document_id: &str, record: &CompressionRecord);

    /// Record that processing a document failed outright. Only the error's
    /// kind is kept; its message may name the file.
    fn record_failure(&self, document_id: &str, error: &KompaktError);
}

/// Telemetry disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn analyze_document(&self, _path: &Path) -> Option<String> {
        None
    }

    fn record_result(&self, _document_id: &str, _record: &CompressionRecord) {}

    fn record_failure(&self, _document_id: &str, _error: &KompaktError) {}
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One line of the telemetry log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub run_id: Uuid,
    pub timestamp: String,
    pub document_id: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventPayload {
    Document {
        file_size_bytes: u64,
        pdf_version: String,
        page_count: usize,
    },
    Compression {
        original_size_bytes: u64,
        final_size_bytes: u64,
        reduction_percent: f64,
        method: String,
        score: f64,
        content_mode: Option<ContentMode>,
        gate: GateOutcome,
        psnr: Option<f64>,
        ssim: Option<f64>,
        lpips: Option<f64>,
        candidates: usize,
        elapsed_ms: u64,
    },
    Failure {
        kind: String,
    },
}

impl EventPayload {
    fn from_record(record: &CompressionRecord) -> Self {
        Self::Compression {
            original_size_bytes: record.original_size_bytes,
            final_size_bytes: record.final_size_bytes,
            reduction_percent: record.reduction_percent,
            method: record.method.clone(),
            score: record.score,
            content_mode: record.content_mode,
            gate: record.gate,
            psnr: record.psnr,
            ssim: record.ssim,
            lpips: record.lpips,
            candidates: record.candidates.len(),
            elapsed_ms: record.elapsed_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON-lines sink
// ---------------------------------------------------------------------------

/// Appends events to a JSON-lines file, tagging each with one run ID.
pub struct JsonlTelemetry {
    path: PathBuf,
    run_id: Uuid,
    write_lock: Mutex<()>,
}

impl JsonlTelemetry {
    /// Log to `path`, creating parent directories as needed.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let run_id = Uuid::new_v4();
        debug!(%run_id, "telemetry log opened");
        Ok(Self {
            path,
            run_id,
            write_lock: Mutex::new(()),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, document_id: &str, payload: EventPayload) -> Result<()> {
        let event = TelemetryEvent {
            run_id: self.run_id,
            timestamp: Utc::now().to_rfc3339(),
            document_id: document_id.to_string(),
            payload,
        };
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn append_or_warn(&self, document_id: &str, payload: EventPayload) {
        if let Err(err) = self.append(document_id, payload) {
            warn!(%err, path = %self.path.display(), "telemetry write failed");
        }
    }
}

impl TelemetrySink for JsonlTelemetry {
    fn analyze_document(&self, path: &Path) -> Option<String> {
        let fingerprint = match DocumentFingerprint::of(path) {
            Ok(fp) => fp,
            Err(err) => {
                warn!(%err, "telemetry fingerprint failed");
                return crate::fingerprint::anonymous_id(path);
            }
        };
        let id = match fingerprint.anonymous_id() {
            Ok(id) => id,
            Err(err) => {
                warn!(%err, "telemetry id encoding failed");
                return None;
            }
        };
        self.append_or_warn(
            &id,
            EventPayload::Document {
                file_size_bytes: fingerprint.file_size,
                pdf_version: fingerprint.pdf_version,
                page_count: fingerprint.page_count,
            },
        );
        Some(id)
    }

    fn record_result(&self, document_id: &str, record: &CompressionRecord) {
        self.append_or_warn(document_id, EventPayload::from_record(record));
    }

    fn record_failure(&self, document_id: &str, error: &KompaktError) {
        self.append_or_warn(
            document_id,
            EventPayload::Failure {
                kind: error.kind().to_string(),
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Per-method tallies across a telemetry log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MethodStats {
    pub count: u64,
    pub mean_reduction_percent: f64,
}

/// Aggregate view of a telemetry log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySummary {
    pub documents: u64,
    pub compressions: u64,
    pub failures: u64,
    pub unchanged: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub methods: BTreeMap<String, MethodStats>,
    /// Lines that did not parse.
    pub skipped_lines: u64,
}

/// Read a JSON-lines log and aggregate it.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn summarize(path: impl AsRef<Path>) -> Result<TelemetrySummary> {
    let file = std::fs::File::open(path.as_ref())?;
    let mut summary = TelemetrySummary::default();
    let mut reduction_sums: BTreeMap<String, f64> = BTreeMap::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: TelemetryEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(_) => {
                summary.skipped_lines += 1;
                continue;
            }
        };
        match event.payload {
            EventPayload::Document { .. } => summary.documents += 1,
            EventPayload::Failure { .. } => summary.failures += 1,
            EventPayload::Compression {
                original_size_bytes,
                final_size_bytes,
                reduction_percent,
                method,
                ..
            } => {
                summary.compressions += 1;
                summary.bytes_before += original_size_bytes;
                summary.bytes_after += final_size_bytes;
                if method == kompakt_core::NO_CHANGE_METHOD {
                    summary.unchanged += 1;
                }
                *reduction_sums.entry(method.clone()).or_default() += reduction_percent;
                summary.methods.entry(method).or_default().count += 1;
            }
        }
    }

    for (method, stats) in summary.methods.iter_mut() {
        let total = reduction_sums.get(method).copied().unwrap_or(0.0);
        stats.mean_reduction_percent = total / stats.count.max(1) as f64;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kompakt_core::{CandidateSummary, PreserveReason};

    fn record(method: &str, original: u64, final_size: u64) -> CompressionRecord {
        CompressionRecord {
            original_file: "secret-name.pdf".into(),
            final_file: "out/secret-name_optimized.pdf".into(),
            original_size_bytes: original,
            final_size_bytes: final_size,
            reduction_percent: kompakt_core::reduction_percent(original, final_size),
            method: method.into(),
            score: 90.0,
            content_mode: Some(ContentMode::Grayscale),
            gate: if method == kompakt_core::NO_CHANGE_METHOD {
                GateOutcome::Preserved {
                    reason: PreserveReason::QualityRejected,
                }
            } else {
                GateOutcome::Passed
            },
            psnr: Some(38.2),
            ssim: None,
            lpips: None,
            sharpness: None,
            candidates: vec![CandidateSummary {
                method: method.into(),
                size_bytes: final_size,
                reduction_percent: 0.0,
                score: 90.0,
            }],
            elapsed_ms: 1200,
        }
    }

    #[test]
    fn noop_sink_records_nothing() {
        let sink = NoopTelemetry;
        assert!(sink.analyze_document(Path::new("whatever.pdf")).is_none());
        sink.record_result("id", &record("balanced", 10, 5));
    }

    #[test]
    fn jsonl_log_is_anonymous_and_summarizable() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("secret-name.pdf");
        std::fs::write(&doc, b"%PDF-1.6\nbody\n%%EOF\n").unwrap();
        let log_path = dir.path().join("telemetry/events.jsonl");

        let sink = JsonlTelemetry::open(&log_path).unwrap();
        let id = sink.analyze_document(&doc).unwrap();
        sink.record_result(&id, &record("balanced", 1000, 400));
        sink.record_result(&id, &record("balanced", 1000, 600));
        sink.record_result(&id, &record(kompakt_core::NO_CHANGE_METHOD, 1000, 1000));
        sink.record_failure(
            &id,
            &KompaktError::Pdf("cannot parse /home/me/secret-name.pdf".into()),
        );

        let raw = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(raw.lines().count(), 5);
        assert!(!raw.contains("secret-name"));
        assert!(raw.contains(r#""kind":"pdf""#));
        assert!(raw.contains(&sink.run_id().to_string()));

        let summary = summarize(&log_path).unwrap();
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.compressions, 3);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.bytes_before, 3000);
        assert_eq!(summary.bytes_after, 2000);
        let balanced = &summary.methods["balanced"];
        assert_eq!(balanced.count, 2);
        assert!((balanced.mean_reduction_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn summarize_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("events.jsonl");
        std::fs::write(&log_path, "not json\n\n").unwrap();
        let summary = summarize(&log_path).unwrap();
        assert_eq!(summary.skipped_lines, 1);
        assert_eq!(summary.compressions, 0);
    }
}
