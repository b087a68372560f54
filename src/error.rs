//! Error types for the PDF table extractor

use thiserror::Error;

/// Result type alias for the PDF table extractor
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF table extractor
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected and no password was provided
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Document has no pages
    #[error("PDF has no pages")]
    EmptyDocument,

    /// Page index outside `[0, page_count)`
    #[error("Page index {index} out of bounds (page count: {page_count})")]
    InvalidPageIndex { index: usize, page_count: usize },

    /// Page selection string produced no usable page numbers
    #[error("No valid pages selected: {selection:?}")]
    NoPagesSelected { selection: String },

    /// Nothing to put in a workbook
    #[error("No tables found")]
    NoTablesFound,

    /// Manual mode without any rectangle
    #[error("No region selected")]
    NoRegionSelected,

    /// Region has zero area once mapped and clamped to the page image
    #[error("Degenerate region {x0},{y0},{x1},{y1}: {reason}")]
    DegenerateRegion {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        reason: String,
    },

    /// Display transform factors are unusable
    #[error("Invalid display transform: {reason}")]
    InvalidTransform { reason: String },

    /// Render scale is not a positive finite number
    #[error("Invalid render scale: {scale}")]
    InvalidScale { scale: f32 },

    /// OCR failed for a single region
    #[error("OCR failed for region {index}: {reason}")]
    RegionOcrFailed { index: usize, reason: String },

    /// OCR engine error (not tied to a region)
    #[error("OCR error: {reason}")]
    Ocr { reason: String },

    /// Page PDFs could not be joined
    #[error("PDF merge failed: {reason}")]
    Merge { reason: String },

    /// Caller-imposed deadline elapsed
    #[error("Extraction timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u128 },

    /// Source resolution error
    #[error("Failed to resolve source: {reason}")]
    SourceResolution { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Workbook writer error
    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// SSRF blocked (URL resolves to private/reserved IP)
    #[error("SSRF blocked: {url}")]
    SsrfBlocked { url: String },

    /// Download too large
    #[error("Download too large: {size} bytes (max: {max_size} bytes)")]
    DownloadTooLarge { size: u64, max_size: u64 },

    /// Image dimension exceeded
    #[error("Image dimension exceeded: {detail}")]
    ImageDimensionExceeded { detail: String },

    /// Request parameters are inconsistent with the selected mode
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, file sizes) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::EmptyDocument => "PDF has no pages".to_string(),
            Error::InvalidPageIndex { index, page_count } => {
                format!("Page index {} out of bounds (page count: {})", index, page_count)
            }
            Error::NoPagesSelected { selection } => {
                format!("No valid pages selected: {:?}", selection)
            }
            Error::NoTablesFound => "No tables found".to_string(),
            Error::NoRegionSelected => "Please select a region to extract tables from".to_string(),
            Error::DegenerateRegion { .. } => {
                "Selected region does not overlap the page".to_string()
            }
            Error::InvalidTransform { reason } => format!("Invalid display transform: {}", reason),
            Error::InvalidScale { scale } => format!("Invalid render scale: {}", scale),
            Error::RegionOcrFailed { index, .. } => format!("OCR failed for region {}", index),
            Error::Ocr { .. } => "OCR error".to_string(),
            Error::Merge { .. } => "Failed to assemble PDF".to_string(),
            Error::Timeout { .. } => "Extraction timed out".to_string(),
            Error::SourceResolution { .. } => "Failed to resolve PDF source".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::HttpRequest(_) => "HTTP request failed".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Image(_) => "Image processing error".to_string(),
            Error::Workbook(_) => "Failed to write workbook".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::SsrfBlocked { .. } => "URL not allowed".to_string(),
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Download exceeds maximum size of {} bytes", max_size)
            }
            Error::ImageDimensionExceeded { detail } => {
                format!("Image dimension exceeded: {}", detail)
            }
            Error::InvalidRequest { reason } => format!("Invalid request: {}", reason),
        }
    }

    /// Whether this error only affects a single region of a manual request.
    pub fn is_region_level(&self) -> bool {
        matches!(self, Error::RegionOcrFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_internal_details() {
        let err = Error::PdfNotFound {
            path: "/secret/location/report.pdf".to_string(),
        };
        assert!(!err.client_message().contains("/secret"));

        let err = Error::Ocr {
            reason: "tesseract: /usr/share/tessdata missing".to_string(),
        };
        assert_eq!(err.client_message(), "OCR error");
    }

    #[test]
    fn test_region_level_classification() {
        assert!(Error::RegionOcrFailed {
            index: 2,
            reason: "boom".to_string()
        }
        .is_region_level());
        assert!(!Error::Timeout { elapsed_ms: 10 }.is_region_level());
        assert!(!Error::NoRegionSelected.is_region_level());
        assert!(!Error::EmptyDocument.is_region_level());
    }
}
