//! Searchable PDF generation
//!
//! Every page is rendered to an image, OCR'd into a one-page PDF that carries
//! the image plus an invisible text layer, and the pages are joined back into
//! one document in their original order.

use crate::error::{Error, Result};
use crate::extraction::{DEFAULT_MAX_IMAGE_PIXELS, DEFAULT_RENDER_SCALE};
use crate::ocr::{OcrConfig, PdfOcrEngine, TesseractOcr};
use crate::pdf::{PageRasterizer, PdfMerger, PdfiumRasterizer, QpdfMerger};
use crate::region::Deadline;
use std::sync::Arc;
use std::time::Duration;

/// Tuning for searchable PDF generation
#[derive(Debug, Clone)]
pub struct SearchableOptions {
    /// Pixels per PDF point for the page images (default: 200 DPI)
    pub render_scale: f32,
    /// Refuse to render a page whose bitmap would be larger than this
    pub max_image_pixels: u64,
    /// Give up after this long
    pub timeout: Option<Duration>,
}

impl Default for SearchableOptions {
    fn default() -> Self {
        Self {
            render_scale: DEFAULT_RENDER_SCALE,
            max_image_pixels: DEFAULT_MAX_IMAGE_PIXELS,
            timeout: None,
        }
    }
}

impl SearchableOptions {
    /// Rendering resolution in dots per inch
    pub fn dpi(&self) -> u32 {
        (self.render_scale * 72.0).round().max(1.0) as u32
    }
}

/// A searchable document
#[derive(Debug, Clone, PartialEq)]
pub struct SearchablePdf {
    pub data: Vec<u8>,
    pub page_count: usize,
}

/// Turns image-only PDFs into PDFs with a text layer
#[derive(Clone)]
pub struct SearchablePdfBuilder {
    rasterizer: Arc<dyn PageRasterizer>,
    ocr: Arc<dyn PdfOcrEngine>,
    merger: Arc<dyn PdfMerger>,
    options: SearchableOptions,
}

impl SearchablePdfBuilder {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        ocr: Arc<dyn PdfOcrEngine>,
        merger: Arc<dyn PdfMerger>,
        options: SearchableOptions,
    ) -> Self {
        Self {
            rasterizer,
            ocr,
            merger,
            options,
        }
    }

    /// PDFium for rendering, Tesseract for OCR, qpdf for merging
    pub fn with_pdfium(ocr_config: OcrConfig, options: SearchableOptions) -> Self {
        Self::new(
            Arc::new(PdfiumRasterizer),
            Arc::new(TesseractOcr::new(ocr_config)),
            Arc::new(QpdfMerger),
            options,
        )
    }

    /// OCR every page of `data` and return the merged result
    pub fn make_searchable(&self, data: &[u8], password: Option<&str>) -> Result<SearchablePdf> {
        let deadline = self.options.timeout.map(Deadline::after);
        let page_count = self.rasterizer.page_count(data, password)?;
        if page_count == 0 {
            return Err(Error::EmptyDocument);
        }

        let dpi = self.options.dpi();
        tracing::info!(pages = page_count, dpi, "making PDF searchable");

        let mut pages = Vec::with_capacity(page_count);
        for page_index in 0..page_count {
            if let Some(deadline) = &deadline {
                deadline.check()?;
            }

            let page = self.rasterizer.rasterize_bounded(
                data,
                password,
                page_index,
                self.options.render_scale,
                self.options.max_image_pixels,
            )?;
            let pdf = self.ocr.page_to_pdf(page.image(), dpi).map_err(|e| {
                tracing::warn!(page = page_index + 1, error = %e, "page OCR failed");
                e
            })?;
            tracing::debug!(page = page_index + 1, bytes = pdf.len(), "OCR'd page");
            pages.push(pdf);
        }

        if let Some(deadline) = &deadline {
            deadline.check()?;
        }

        let data = self.merger.merge(&pages)?;
        tracing::info!(pages = page_count, bytes = data.len(), "searchable PDF ready");

        Ok(SearchablePdf { data, page_count })
    }
}
