// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — rebuild a document from page rasters using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::path::Path;

use image::DynamicImage;
use kompakt_core::error::{KompaktError, Result};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};

/// Millimetres per inch.
const MM_PER_INCH: f32 = 25.4;

/// Builds image-only PDFs, one full-bleed page per raster.
///
/// Page dimensions are derived from the pixel size and the raster DPI so the
/// rebuilt document keeps the geometry of the one that was rasterized.
pub struct RasterPdfWriter {
    dpi: f32,
    title: String,
}

impl RasterPdfWriter {
    pub fn new(dpi: u32) -> Self {
        Self {
            dpi: dpi.max(1) as f32,
            title: "Kompakt Document".to_string(),
        }
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Physical page size for a raster of `width` x `height` pixels.
    pub fn page_size(&self, width: u32, height: u32) -> (Mm, Mm) {
        (
            Mm(width as f32 / self.dpi * MM_PER_INCH),
            Mm(height as f32 / self.dpi * MM_PER_INCH),
        )
    }

    /// Serialise `pages` into a PDF. Luma images are embedded as 8-bit gray,
    /// everything else as RGB.
    #[instrument(skip(self, pages), fields(pages = pages.len(), dpi = self.dpi))]
    pub fn build(&self, pages: &[DynamicImage]) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(KompaktError::Pdf("no pages to write".into()));
        }

        let mut doc = PdfDocument::new(&self.title);
        let mut pdf_pages = Vec::with_capacity(pages.len());

        for image in pages {
            let raw = to_raw_image(image);
            let (page_w, page_h) = self.page_size(image.width(), image.height());
            let xobject_id = doc.add_image(&raw);

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(0.0)),
                    translate_y: Some(Pt(0.0)),
                    scale_x: None,
                    scale_y: None,
                    dpi: Some(self.dpi),
                    rotate: None,
                },
            }];
            pdf_pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pdf_pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(bytes = output.len(), warnings = warnings.len(), "raster PDF serialised");
        Ok(output)
    }

    /// Build and write directly to a file.
    pub fn write_to_file(&self, pages: &[DynamicImage], path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.build(pages)?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!(path = %path.as_ref().display(), "raster PDF written");
        Ok(())
    }
}

fn to_raw_image(image: &DynamicImage) -> RawImage {
    let width = image.width() as usize;
    let height = image.height() as usize;
    match image {
        DynamicImage::ImageLuma8(gray) => RawImage {
            pixels: RawImageData::U8(gray.as_raw().clone()),
            width,
            height,
            data_format: RawImageFormat::R8,
            tag: Vec::new(),
        },
        other => RawImage {
            pixels: RawImageData::U8(other.to_rgb8().into_raw()),
            width,
            height,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        },
    }
}
