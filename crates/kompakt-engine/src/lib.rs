// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kompakt-engine — Candidate generation, scoring, quality gating and the
// per-document and batch pipelines. This crate turns the measurement
// primitives of `kompakt-document` into the adaptive selection engine.

pub mod batch;
pub mod encoder;
pub mod gate;
pub mod generator;
pub mod pipeline;
pub mod profiles;
pub mod scoring;
pub mod scratch;

pub use batch::{BatchRunner, BatchSummary};
pub use encoder::Encoder;
pub use gate::{GateMachine, GateVerdict, QualityGate};
pub use generator::{CandidateGenerator, EncoderSet, plan};
pub use pipeline::{AssessmentReport, Pipeline};
pub use profiles::EncodingProfile;
pub use scratch::ScratchArena;

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    /// Write a minimal valid PDF with `pages` pages to `dir/name`.
    pub(crate) fn write_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for i in 0..pages {
            let content = format!("BT /F1 12 Tf 72 712 Td (Page {}) Tj ET\n", i + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let path = dir.join(name);
        doc.save(&path).expect("write sample pdf");
        path
    }
}
