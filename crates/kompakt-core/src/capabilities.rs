// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External tool discovery.
//
// Resolved once at startup into an immutable value that is passed to the
// generator and assessor explicitly. Nothing re-probes the filesystem later.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

/// Extra locations searched after `PATH` (Homebrew on Apple Silicon and Intel).
const EXTRA_SEARCH_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin"];

/// Executable names tried for Ghostscript, in order.
const GHOSTSCRIPT_NAMES: &[&str] = &["gs", "gswin64c", "gswin32c", "ghostscript"];

/// Which external collaborators are installed, and where.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolCapabilities {
    /// Ghostscript: pdfwrite encoding and png16m rasterization.
    pub ghostscript: Option<PathBuf>,
    /// qpdf: structural optimisation for the conservative profile.
    pub qpdf: Option<PathBuf>,
    /// ocrmypdf: OCR-aware recompression.
    pub ocrmypdf: Option<PathBuf>,
    /// jbig2enc: lets ocrmypdf use lossy JBIG2 for bitonal pages.
    pub jbig2: Option<PathBuf>,
}

impl ToolCapabilities {
    /// Probe `PATH` and the common package-manager directories.
    pub fn detect() -> Self {
        let caps = match search_path(env::var_os("PATH")) {
            Some(path) => Self::detect_on(&path),
            None => Self::none(),
        };
        info!(
            ghostscript = caps.ghostscript.is_some(),
            qpdf = caps.qpdf.is_some(),
            ocrmypdf = caps.ocrmypdf.is_some(),
            jbig2 = caps.jbig2.is_some(),
            "external tools detected"
        );
        caps
    }

    /// Probe an explicit list of directories.
    pub fn detect_in(dirs: &[PathBuf]) -> Self {
        match env::join_paths(dirs) {
            Ok(path) => Self::detect_on(&path),
            Err(err) => {
                warn!(%err, "search directories cannot be joined; no tools detected");
                Self::none()
            }
        }
    }

    fn detect_on(path: &OsStr) -> Self {
        let find = |name: &str| {
            let found = which::which_in(name, Some(path), ".").ok()?;
            debug!(tool = name, path = %found.display(), "found executable");
            Some(found)
        };
        Self {
            ghostscript: GHOSTSCRIPT_NAMES.iter().find_map(|name| find(*name)),
            qpdf: find("qpdf"),
            ocrmypdf: find("ocrmypdf"),
            jbig2: find("jbig2"),
        }
    }

    /// No external tools at all. Only the in-process optimizer remains.
    pub fn none() -> Self {
        Self::default()
    }

    /// A rasterizer is available (both profiling and assessment need one).
    pub fn can_rasterize(&self) -> bool {
        self.ghostscript.is_some()
    }

    /// Name / path pairs for display.
    pub fn entries(&self) -> [(&'static str, Option<&Path>); 4] {
        [
            ("ghostscript", self.ghostscript.as_deref()),
            ("qpdf", self.qpdf.as_deref()),
            ("ocrmypdf", self.ocrmypdf.as_deref()),
            ("jbig2", self.jbig2.as_deref()),
        ]
    }
}

/// `PATH` followed by the package-manager directories it does not already list.
fn search_path(path_var: Option<OsString>) -> Option<OsString> {
    let mut dirs: Vec<PathBuf> = path_var
        .map(|p| env::split_paths(&p).collect())
        .unwrap_or_default();
    for extra in EXTRA_SEARCH_DIRS.iter().map(PathBuf::from) {
        if !dirs.contains(&extra) {
            dirs.push(extra);
        }
    }
    match env::join_paths(&dirs) {
        Ok(joined) => Some(joined),
        Err(err) => {
            warn!(%err, "PATH cannot be rejoined; no tools detected");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_executable(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn detects_tools_in_given_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let gs = touch_executable(dir.path(), "gs");
        let qpdf = touch_executable(dir.path(), "qpdf");

        let caps = ToolCapabilities::detect_in(&[dir.path().to_path_buf()]);
        assert_eq!(caps.ghostscript, Some(gs));
        assert_eq!(caps.qpdf, Some(qpdf));
        assert!(caps.ocrmypdf.is_none());
        assert!(caps.can_rasterize());
    }

    #[test]
    fn falls_back_to_alternate_ghostscript_names() {
        let dir = tempfile::tempdir().unwrap();
        let gs = touch_executable(dir.path(), "ghostscript");
        let caps = ToolCapabilities::detect_in(&[dir.path().to_path_buf()]);
        assert_eq!(caps.ghostscript, Some(gs));
    }

    #[cfg(unix)]
    #[test]
    fn ignores_non_executable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("qpdf"), "not a program").unwrap();
        let caps = ToolCapabilities::detect_in(&[dir.path().to_path_buf()]);
        assert!(caps.qpdf.is_none());
    }

    #[test]
    fn homebrew_dirs_are_appended_once() {
        let joined = search_path(Some(OsString::from("/usr/local/bin"))).unwrap();
        let dirs: Vec<PathBuf> = env::split_paths(&joined).collect();
        let count = dirs
            .iter()
            .filter(|d| d.as_path() == Path::new("/usr/local/bin"))
            .count();
        assert_eq!(count, 1);
        assert!(dirs.contains(&PathBuf::from("/opt/homebrew/bin")));
    }

    #[test]
    fn missing_path_still_searches_homebrew() {
        let joined = search_path(None).unwrap();
        let dirs: Vec<PathBuf> = env::split_paths(&joined).collect();
        assert_eq!(dirs.len(), EXTRA_SEARCH_DIRS.len());
    }

    #[test]
    fn unjoinable_dirs_detect_nothing() {
        let sep = if cfg!(windows) { "a;b" } else { "a:b" };
        let caps = ToolCapabilities::detect_in(&[PathBuf::from(sep)]);
        assert_eq!(caps, ToolCapabilities::none());
    }
}
