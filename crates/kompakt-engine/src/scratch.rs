// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-document scratch arena. Every candidate of one run lives in a single
// temporary directory that is removed when the arena is dropped, whichever
// way the run ends.

use std::path::{Path, PathBuf};

use kompakt_core::StrategyKind;
use kompakt_core::error::Result;
use tempfile::TempDir;
use tracing::debug;

pub struct ScratchArena {
    dir: TempDir,
}

impl ScratchArena {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("kompakt-").tempdir()?;
        debug!(path = %dir.path().display(), "scratch arena created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the candidate for `strategy` is written.
    pub fn candidate_path(&self, strategy: StrategyKind) -> PathBuf {
        self.dir.path().join(format!("{}.pdf", strategy.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_is_removed_on_drop() {
        let arena = ScratchArena::new().unwrap();
        let root = arena.path().to_path_buf();
        let candidate = arena.candidate_path(StrategyKind::Balanced);
        std::fs::write(&candidate, b"%PDF").unwrap();
        assert!(candidate.starts_with(&root));
        assert!(candidate.ends_with("balanced.pdf"));

        drop(arena);
        assert!(!root.exists());
    }
}
