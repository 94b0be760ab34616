// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content analysis.

pub mod profiler;

pub use profiler::{ContentProfiler, PageClass, aggregate, classify_page};
