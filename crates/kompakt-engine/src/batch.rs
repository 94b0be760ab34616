// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch mode: compress every PDF in a directory, one document at a time.
//
// Each `name.pdf` becomes `<output>/name_optimized.pdf`. Originals that were
// handled are moved to `<input>/processed/`; a failing file is recorded and
// left in place, and the batch carries on.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use kompakt_core::error::Result;
use kompakt_core::{CompressionRecord, bytes_to_mb};
use tracing::{error, info, instrument, warn};

use crate::pipeline::Pipeline;

/// Subdirectory of the input directory receiving handled originals.
pub const PROCESSED_DIR: &str = "processed";

/// `report.pdf` -> `report_optimized.pdf`.
pub fn optimized_file_name(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    PathBuf::from(format!("{stem}_optimized.pdf"))
}

/// Every `*.pdf` (any case) directly inside `dir`, sorted by name.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// A file the batch could not process.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub file: PathBuf,
    pub error: String,
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub records: Vec<CompressionRecord>,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn attempted(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    pub fn bytes_before(&self) -> u64 {
        self.records.iter().map(|r| r.original_size_bytes).sum()
    }

    pub fn bytes_after(&self) -> u64 {
        self.records.iter().map(|r| r.final_size_bytes).sum()
    }

    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before().saturating_sub(self.bytes_after())
    }

    pub fn total_reduction_percent(&self) -> f64 {
        kompakt_core::reduction_percent(self.bytes_before(), self.bytes_after())
    }

    /// How many documents each method won, most frequent first.
    pub fn methods(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.method.as_str()).or_default() += 1;
        }
        let mut methods: Vec<(String, usize)> =
            counts.into_iter().map(|(m, c)| (m.to_string(), c)).collect();
        methods.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        methods
    }

    /// Human-readable end-of-run summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(72);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "KOMPAKT BATCH SUMMARY");
        let _ = writeln!(out, "{rule}");

        for record in &self.records {
            let name = Path::new(&record.original_file)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| record.original_file.clone());
            let _ = writeln!(out, "OK   {name}");
            let _ = writeln!(
                out,
                "     {:.2} MB -> {:.2} MB ({:.1}%)  method: {}  score: {:.1}",
                record.original_mb(),
                record.final_mb(),
                record.reduction_percent,
                record.method,
                record.score
            );
        }
        for failure in &self.failures {
            let _ = writeln!(out, "FAIL {}: {}", failure.file.display(), failure.error);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Processed: {}/{}", self.records.len(), self.attempted());
        if !self.records.is_empty() {
            let _ = writeln!(out, "Total before: {:.2} MB", bytes_to_mb(self.bytes_before()));
            let _ = writeln!(out, "Total after:  {:.2} MB", bytes_to_mb(self.bytes_after()));
            let _ = writeln!(out, "Reduction:    {:.1}%", self.total_reduction_percent());
            let _ = writeln!(out, "Saved:        {:.2} MB", bytes_to_mb(self.bytes_saved()));
            let _ = writeln!(out, "Methods:");
            for (method, count) in self.methods() {
                let _ = writeln!(out, "  {method}: {count} file(s)");
            }
        }
        out
    }
}

/// Runs a [`Pipeline`] over a directory.
pub struct BatchRunner<'a> {
    pipeline: &'a Pipeline,
    move_originals: bool,
}

impl<'a> BatchRunner<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self {
            pipeline,
            move_originals: true,
        }
    }

    /// Leave originals where they are instead of moving them to `processed/`.
    pub fn keep_originals(mut self) -> Self {
        self.move_originals = false;
        self
    }

    #[instrument(skip(self), fields(input = %input_dir.display(), output = %output_dir.display()))]
    pub async fn run(&self, input_dir: &Path, output_dir: &Path) -> Result<BatchSummary> {
        let files = discover_pdfs(input_dir)?;
        std::fs::create_dir_all(output_dir)?;
        info!(files = files.len(), "batch started");

        let mut summary = BatchSummary::default();
        for (index, file) in files.iter().enumerate() {
            info!(file = index + 1, of = files.len(), path = %file.display(), "next document");
            let output = output_dir.join(optimized_file_name(file));
            match self.pipeline.compress(file, &output).await {
                Ok(record) => {
                    if self.move_originals {
                        if let Err(err) = move_to_processed(input_dir, file) {
                            warn!(%err, path = %file.display(), "could not move original");
                        }
                    }
                    summary.records.push(record);
                }
                Err(err) => {
                    error!(%err, path = %file.display(), "document failed");
                    summary.failures.push(BatchFailure {
                        file: file.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            processed = summary.records.len(),
            failed = summary.failures.len(),
            bytes_saved = summary.bytes_saved(),
            "batch finished"
        );
        Ok(summary)
    }
}

/// Move `file` into `<input_dir>/processed/`, copying across filesystems.
pub fn move_to_processed(input_dir: &Path, file: &Path) -> Result<PathBuf> {
    let target_dir = input_dir.join(PROCESSED_DIR);
    std::fs::create_dir_all(&target_dir)?;
    let name = file.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    let target = target_dir.join(name);
    if std::fs::rename(file, &target).is_err() {
        std::fs::copy(file, &target)?;
        std::fs::remove_file(file)?;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kompakt_core::{GateOutcome, NO_CHANGE_METHOD};

    fn record(name: &str, method: &str, before: u64, after: u64) -> CompressionRecord {
        CompressionRecord {
            original_file: format!("/in/{name}"),
            final_file: format!("/out/{name}"),
            original_size_bytes: before,
            final_size_bytes: after,
            reduction_percent: kompakt_core::reduction_percent(before, after),
            method: method.into(),
            score: 90.0,
            content_mode: None,
            gate: GateOutcome::Passed,
            psnr: None,
            ssim: None,
            lpips: None,
            sharpness: None,
            candidates: Vec::new(),
            elapsed_ms: 10,
        }
    }

    #[test]
    fn output_names_use_the_stem() {
        assert_eq!(
            optimized_file_name(Path::new("/scans/Report 2024.PDF")),
            PathBuf::from("Report 2024_optimized.pdf")
        );
    }

    #[test]
    fn discovery_is_case_insensitive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "A.PDF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("folder.pdf")).unwrap();

        let found = discover_pdfs(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["A.PDF", "b.pdf"]);
    }

    #[test]
    fn originals_move_to_processed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.pdf");
        std::fs::write(&file, b"%PDF").unwrap();

        let moved = move_to_processed(dir.path(), &file).unwrap();
        assert!(!file.exists());
        assert_eq!(moved, dir.path().join(PROCESSED_DIR).join("doc.pdf"));
        assert_eq!(std::fs::read(moved).unwrap(), b"%PDF");
    }

    #[test]
    fn summary_totals() {
        let summary = BatchSummary {
            records: vec![
                record("a.pdf", "balanced", 4_000_000, 1_000_000),
                record("b.pdf", NO_CHANGE_METHOD, 1_000_000, 1_000_000),
                record("c.pdf", "balanced", 3_000_000, 2_000_000),
            ],
            failures: vec![BatchFailure {
                file: PathBuf::from("/in/d.pdf"),
                error: "file I/O error: denied".into(),
            }],
        };
        assert_eq!(summary.attempted(), 4);
        assert_eq!(summary.bytes_saved(), 4_000_000);
        assert!((summary.total_reduction_percent() - 50.0).abs() < 1e-9);
        assert_eq!(
            summary.methods(),
            vec![("balanced".to_string(), 2), (NO_CHANGE_METHOD.to_string(), 1)]
        );

        let text = summary.render();
        assert!(text.contains("Processed: 3/4"));
        assert!(text.contains("FAIL /in/d.pdf"));
        assert!(text.contains("balanced: 2 file(s)"));
    }
}
