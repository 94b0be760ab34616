// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kompakt — core types, errors, configuration and tool capabilities shared
// across all crates.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod types;

pub use capabilities::ToolCapabilities;
pub use config::EngineConfig;
pub use error::{KompaktError, Result};
pub use types::*;
