//! PDF processing layer
//!
//! This module provides PDF rendering, inspection, and layout-based table
//! extraction using PDFium, and page merging using qpdf.

mod document;
mod layout;
mod merge;
mod pages;
mod rasterizer;

pub use document::{detect_pdf_type, page_count, validate_pdf_header, PdfType, PdfTypeInfo};
pub use layout::{
    detect_tables, CharInfo, PdfiumTableExtractor, TableDetectionConfig, TableExtractor,
};
pub use merge::{PdfMerger, QpdfMerger};
pub use pages::parse_page_selection;
pub use rasterizer::{
    check_pixel_area, encode_png, PageImage, PageRasterizer, PdfiumRasterizer,
};
