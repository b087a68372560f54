//! PDF Table Extractor Library
//!
//! Pulls tables out of PDF documents into rows of cells and Excel workbooks:
//! - all pages or a page selection, using the document's text layer
//! - manual regions drawn on a page preview, using OCR
//!
//! It can also turn scanned PDFs into searchable ones by adding an OCR text layer.
//!
//! The same pipeline is exposed as MCP tools by [`server`]:
//! - `extract_tables`: Extract tables in any of the three modes
//! - `render_page`: Render a page preview for drawing regions
//! - `detect_pdf_type`: Classify a document as digital, scanned, or mixed
//! - `make_searchable`: Add an OCR text layer to every page

pub mod error;
pub mod extraction;
pub mod ocr;
pub mod pdf;
pub mod region;
pub mod searchable;
pub mod server;
pub mod source;
pub mod table;
pub mod workbook;

pub use error::{Error, Result};
pub use extraction::{
    ExtractionMode, ExtractionOptions, ExtractionOrchestrator, ExtractionOutcome,
    ExtractionRequest, ExtractionStage, ExtractionWarning,
};
pub use region::{DisplayRect, DisplayTransform, PixelRect};
pub use searchable::{SearchableOptions, SearchablePdf, SearchablePdfBuilder};
pub use server::{
    run_server, run_server_with_config, run_server_with_dirs, ExtractTablesParams,
    ExtractTablesResult, PdfServer, ServerConfig,
};
pub use source::PdfSource;
pub use table::TableRecord;
