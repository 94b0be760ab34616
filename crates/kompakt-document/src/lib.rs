// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kompakt-document — Document inspection and measurement for Kompakt.
//
// Provides PDF inspection and structural optimisation (lopdf), raster PDF
// rebuilding (printpdf), the rasterization port with its Ghostscript adapter,
// content profiling, fidelity metrics, page cleanup filters and a bounded
// external process runner.

pub mod analysis;
pub mod cleanup;
pub mod integral;
pub mod pdf;
pub mod process;
pub mod quality;
pub mod raster;

// Re-export the primary structs so callers can use `kompakt_document::PdfReader` etc.
pub use analysis::ContentProfiler;
pub use pdf::{PdfReader, RasterPdfWriter};
pub use quality::{Assessment, QualityAssessor, ReferenceRender};
pub use raster::{GhostscriptRasterizer, RasterOutput, RasterPage, Rasterizer};
