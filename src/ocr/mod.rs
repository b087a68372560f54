//! OCR backends
//!
//! The extraction pipeline only needs "image in, text out"; the engine is
//! pluggable through [`OcrEngine`]. Searchable PDF output needs "image in,
//! PDF page out" through [`PdfOcrEngine`]. [`TesseractOcr`] drives the
//! `tesseract` command-line tool for both.

mod tesseract;

pub use tesseract::TesseractOcr;

use crate::error::Result;
use image::DynamicImage;

/// Converts image content to text
pub trait OcrEngine: Send + Sync {
    /// Recognize the text in `image`.
    ///
    /// Blank or near-blank input must produce empty text, not an error.
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// Converts a page image to a one-page PDF: the image with an invisible text layer
pub trait PdfOcrEngine: Send + Sync {
    /// `dpi` is the resolution `image` was rendered at
    fn page_to_pdf(&self, image: &DynamicImage, dpi: u32) -> Result<Vec<u8>>;
}

/// OCR configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Tesseract executable
    pub command: String,
    /// Tesseract language(s), e.g. "eng" or "eng+fra"
    pub language: String,
    /// Page segmentation mode (6 = single uniform block of text)
    pub page_segmentation_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            language: "eng".to_string(),
            page_segmentation_mode: 6,
        }
    }
}
