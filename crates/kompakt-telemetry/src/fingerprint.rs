// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Anonymous document fingerprinting — SHA-256 over technical characteristics
// only. Document text, file names and metadata are never read or stored.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use kompakt_core::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

/// Bytes sampled from each end of the file.
const EDGE_BYTES: u64 = 1024;

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Technical characteristics of a PDF file. Fields are declared in
/// alphabetical order so the JSON encoding is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub file_size: u64,
    pub filename_length: usize,
    /// SHA-256 of the last KiB.
    pub footer_hash: String,
    /// SHA-256 of the first KiB.
    pub header_hash: String,
    /// 0 when the page tree cannot be read.
    pub page_count: usize,
    /// First header line, e.g. `%PDF-1.7`, or `unknown`.
    pub pdf_version: String,
}

impl DocumentFingerprint {
    /// Sample `path` and build its fingerprint.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn of(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        let mut header = Vec::with_capacity(EDGE_BYTES as usize);
        (&mut file).take(EDGE_BYTES).read_to_end(&mut header)?;

        let tail = EDGE_BYTES.min(file_size);
        file.seek(SeekFrom::End(-(tail as i64)))?;
        let mut footer = Vec::with_capacity(tail as usize);
        file.read_to_end(&mut footer)?;

        let fingerprint = Self {
            file_size,
            filename_length: path
                .file_name()
                .map(|name| name.to_string_lossy().chars().count())
                .unwrap_or(0),
            footer_hash: hash_bytes(&footer),
            header_hash: hash_bytes(&header),
            page_count: lopdf::Document::load(path)
                .map(|doc| doc.get_pages().len())
                .unwrap_or(0),
            pdf_version: header_version(&header),
        };
        debug!(?fingerprint, "document fingerprinted");
        Ok(fingerprint)
    }

    /// SHA-256 over the canonical JSON encoding.
    pub fn anonymous_id(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        Ok(hash_bytes(canonical.as_bytes()))
    }
}

/// Anonymous ID for `path`. Falls back to size, extension and name length
/// when the file cannot be sampled; `None` only if it cannot even be stat'ed.
pub fn anonymous_id(path: &Path) -> Option<String> {
    match DocumentFingerprint::of(path).and_then(|fp| fp.anonymous_id()) {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(%err, "fingerprinting failed; using fallback id");
            let size = std::fs::metadata(path).ok()?.len();
            let extension = path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default();
            let name_len = path
                .file_name()
                .map(|name| name.to_string_lossy().chars().count())
                .unwrap_or(0);
            Some(hash_bytes(format!("{size}_.{extension}_{name_len}").as_bytes()))
        }
    }
}

fn header_version(header: &[u8]) -> String {
    if !header.starts_with(b"%PDF-") {
        return "unknown".to_string();
    }
    let line_end = header
        .iter()
        .position(|b| *b == b'\n' || *b == b'\r')
        .unwrap_or(header.len());
    String::from_utf8_lossy(&header[..line_end]).trim().to_string()
}
