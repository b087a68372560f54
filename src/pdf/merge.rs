//! Concatenating single-page PDFs with qpdf

use crate::error::{Error, Result};
use qpdf::QPdf;

/// Joins PDF documents page by page, in order
pub trait PdfMerger: Send + Sync {
    fn merge(&self, documents: &[Vec<u8>]) -> Result<Vec<u8>>;
}

/// [`PdfMerger`] backed by qpdf (vendored FFI)
#[derive(Debug, Clone, Copy, Default)]
pub struct QpdfMerger;

impl PdfMerger for QpdfMerger {
    fn merge(&self, documents: &[Vec<u8>]) -> Result<Vec<u8>> {
        if documents.is_empty() {
            return Err(Error::Merge {
                reason: "No input PDFs provided".to_string(),
            });
        }

        let dest = QPdf::empty();

        for (i, document) in documents.iter().enumerate() {
            let source = QPdf::read_from_memory(document).map_err(|e| Error::Merge {
                reason: format!("Failed to read input PDF {}: {}", i, e),
            })?;

            let pages = source.get_pages().map_err(|e| Error::Merge {
                reason: format!("Failed to get pages from input PDF {}: {}", i, e),
            })?;

            for page in &pages {
                let copied = dest.copy_from_foreign(page);
                dest.add_page(&copied, false).map_err(|e| Error::Merge {
                    reason: format!("Failed to add page from input PDF {}: {}", i, e),
                })?;
            }
        }

        dest.writer().write_to_memory().map_err(|e| Error::Merge {
            reason: e.to_string(),
        })
    }
}
