// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — inspecting and structurally optimising existing PDFs, and
// rebuilding PDFs from page rasters.

pub mod reader;
pub mod writer;

pub use reader::{PdfReader, StructuralReport, page_count};
pub use writer::RasterPdfWriter;
