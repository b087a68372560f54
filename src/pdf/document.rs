//! PDFium binding, document loading, and document inspection

use crate::error::{Error, Result};
use pdfium_render::prelude::*;
use schemars::JsonSchema;
use serde::Serialize;

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
pub(crate) fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to system library or use static linking
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Reject data that does not start with the `%PDF` magic
pub fn validate_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Load a document from bytes, mapping password failures to [`Error::PasswordRequired`]
pub(crate) fn load_document<'a>(
    pdfium: &'a Pdfium,
    data: &'a [u8],
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>> {
    validate_pdf_header(data)?;

    pdfium
        .load_pdf_from_byte_slice(data, password)
        .map_err(map_pdfium_error)
}

/// Map PDFium errors to our error type
pub(crate) fn map_pdfium_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        _ => Error::Pdfium {
            reason: format!("{}", err),
        },
    }
}

/// Number of pages in the document
pub fn page_count(data: &[u8], password: Option<&str>) -> Result<usize> {
    validate_pdf_header(data)?;
    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data, password)?;
    Ok(document.pages().len() as usize)
}

/// Kind of PDF, judged by whether its pages carry a text layer, images, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PdfType {
    /// Text only: tables can be read from the text layer
    Digital,
    /// Images only: OCR (manual region mode) is required
    Scanned,
    /// Both text and images (e.g. an OCR'd scan)
    Mixed,
    /// Neither text nor images
    Unknown,
}

impl PdfType {
    pub fn classify(has_text: bool, has_images: bool) -> Self {
        match (has_text, has_images) {
            (true, false) => PdfType::Digital,
            (true, true) => PdfType::Mixed,
            (false, true) => PdfType::Scanned,
            (false, false) => PdfType::Unknown,
        }
    }
}

/// Result of inspecting a document's content
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PdfTypeInfo {
    pub pdf_type: PdfType,
    pub page_count: usize,
    pub has_text: bool,
    pub has_images: bool,
}

/// Classify a document as digital, scanned, or mixed
pub fn detect_pdf_type(data: &[u8], password: Option<&str>) -> Result<PdfTypeInfo> {
    validate_pdf_header(data)?;
    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data, password)?;

    let pages = document.pages();
    let mut has_text = false;
    let mut has_images = false;

    for page_index in 0..pages.len() {
        let page = pages.get(page_index).map_err(|e| Error::Pdfium {
            reason: format!("Failed to get page {}: {}", page_index + 1, e),
        })?;

        if !has_text {
            has_text = page
                .text()
                .map(|t| !t.all().trim().is_empty())
                .unwrap_or(false);
        }

        if !has_images {
            has_images = page
                .objects()
                .iter()
                .any(|obj| obj.as_image_object().is_some());
        }

        if has_text && has_images {
            break;
        }
    }

    let info = PdfTypeInfo {
        pdf_type: PdfType::classify(has_text, has_images),
        page_count: pages.len() as usize,
        has_text,
        has_images,
    };
    tracing::debug!(?info, "classified PDF");

    Ok(info)
}
