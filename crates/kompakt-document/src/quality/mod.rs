// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quality module — fidelity metrics and the assessor that applies them.

pub mod assessor;
pub mod lpips;
pub mod psnr;
pub mod sharpness;
pub mod ssim;

pub use assessor::{Assessment, MetricSelection, QualityAssessor, ReferenceRender, compare_pages};
pub use lpips::LpipsModel;
