// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open and inspect existing PDF documents, and apply in-process
// structural optimisation, using the `lopdf` crate.

use std::path::Path;

use kompakt_core::error::{KompaktError, Result};
use lopdf::Document;
use tracing::{debug, info, instrument};

/// Reads and structurally rewrites existing PDF files.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
}

/// Object counts before and after a structural rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralReport {
    pub objects_before: usize,
    pub objects_after: usize,
    pub pruned: usize,
    pub empty_streams_removed: usize,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let document = Document::load(path_ref).map_err(|err| {
            KompaktError::Pdf(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self { document })
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            KompaktError::Pdf(format!("failed to load PDF from memory: {}", err))
        })?;

        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Header version, e.g. "1.7".
    pub fn version(&self) -> &str {
        &self.document.version
    }

    // -- Structural optimisation ---------------------------------------------

    /// Drop unreachable objects and empty streams, Flate-compress every
    /// uncompressed stream and renumber the object table.
    ///
    /// Never touches image data already carrying a filter, so it is lossless.
    #[instrument(skip(self))]
    pub fn optimize_structure(&mut self) -> StructuralReport {
        let objects_before = self.document.objects.len();
        let pruned = self.document.prune_objects().len();
        let empty_streams_removed = self.document.delete_zero_length_streams().len();
        self.document.compress();
        self.document.renumber_objects();
        let objects_after = self.document.objects.len();

        let report = StructuralReport {
            objects_before,
            objects_after,
            pruned,
            empty_streams_removed,
        };
        debug!(?report, "structural optimisation applied");
        report
    }

    /// Serialise the (possibly rewritten) document to `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.document.save(path).map_err(|err| {
            KompaktError::Pdf(format!("failed to write {}: {}", path.display(), err))
        })?;
        info!("PDF written");
        Ok(())
    }

    /// Serialise the document into memory.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|err| KompaktError::Pdf(format!("failed to serialise PDF: {}", err)))?;
        Ok(output)
    }
}

/// Page count of a PDF on disk, or `None` if its structure cannot be read.
pub fn page_count(path: impl AsRef<Path>) -> Option<usize> {
    PdfReader::open(path).ok().map(|reader| reader.page_count())
}
