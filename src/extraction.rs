//! Extraction orchestration
//!
//! One [`ExtractionRequest`] goes through
//! `Received -> ModeDispatched -> {AllPages | PageSubset | Manual} -> Collected -> Done`
//! (or `Failed`). Nothing survives the request: the page image, the mapped
//! rectangles, and the OCR text are all local to [`ExtractionOrchestrator::run_extraction`].

use crate::error::{Error, Result};
use crate::ocr::{OcrConfig, OcrEngine, TesseractOcr};
use crate::pdf::{
    parse_page_selection, PageRasterizer, PdfiumRasterizer, PdfiumTableExtractor, TableExtractor,
};
use crate::region::{map_to_pixels, Deadline, DisplayRect, DisplayTransform, RegionExtractor};
use crate::table::{reconstruct, TableRecord};
use schemars::JsonSchema;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default rasterization scale for OCR: 200 DPI
pub const DEFAULT_RENDER_SCALE: f32 = 200.0 / 72.0;

/// Default cap on the pixel area of a rendered page
pub const DEFAULT_MAX_IMAGE_PIXELS: u64 = 100_000_000;

/// What to extract
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionMode {
    /// Every table in the document
    All,
    /// Tables on the pages named by a selection string such as "1,3,5-7"
    Pages { selection: String },
    /// OCR of user-drawn rectangles on one page
    Manual {
        /// 0-based page index
        page_index: usize,
        regions: Vec<DisplayRect>,
        transform: DisplayTransform,
    },
}

impl ExtractionMode {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractionMode::All => "all",
            ExtractionMode::Pages { .. } => "pages",
            ExtractionMode::Manual { .. } => "manual",
        }
    }
}

/// A single extraction request
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    data: Vec<u8>,
    password: Option<String>,
    mode: ExtractionMode,
}

impl ExtractionRequest {
    /// Extract all tables
    pub fn all(data: Vec<u8>) -> Self {
        Self {
            data,
            password: None,
            mode: ExtractionMode::All,
        }
    }

    /// Extract tables from a page selection (e.g. "1,3,5-7")
    pub fn pages(data: Vec<u8>, selection: impl Into<String>) -> Self {
        Self {
            data,
            password: None,
            mode: ExtractionMode::Pages {
                selection: selection.into(),
            },
        }
    }

    /// OCR the given rectangles of one page
    pub fn manual(
        data: Vec<u8>,
        page_index: usize,
        regions: Vec<DisplayRect>,
        transform: DisplayTransform,
    ) -> Result<Self> {
        if regions.is_empty() {
            return Err(Error::NoRegionSelected);
        }
        transform.validate()?;

        Ok(Self {
            data,
            password: None,
            mode: ExtractionMode::Manual {
                page_index,
                regions,
                transform,
            },
        })
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn mode(&self) -> &ExtractionMode {
        &self.mode
    }
}

/// Tuning for a pipeline run
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Pixels per PDF point for the page image used by OCR
    pub render_scale: f32,
    /// Regions OCR'd concurrently
    pub region_workers: usize,
    /// Give up after this long
    pub timeout: Option<Duration>,
    /// Save every region crop here (diagnostics)
    pub crop_dir: Option<PathBuf>,
    /// Refuse to render a page whose bitmap would be larger than this
    pub max_image_pixels: u64,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            render_scale: DEFAULT_RENDER_SCALE,
            region_workers: 1,
            timeout: None,
            crop_dir: None,
            max_image_pixels: DEFAULT_MAX_IMAGE_PIXELS,
        }
    }
}

/// A region that failed without failing the request
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ExtractionWarning {
    pub region_index: usize,
    pub message: String,
}

/// Tables in request order, plus anything that went wrong along the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionOutcome {
    pub tables: Vec<TableRecord>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Lifecycle of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStage {
    Received,
    ModeDispatched,
    AllPages,
    PageSubset,
    Manual,
    Collected,
    Done,
    Failed(String),
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStage::Received => write!(f, "received"),
            ExtractionStage::ModeDispatched => write!(f, "mode_dispatched"),
            ExtractionStage::AllPages => write!(f, "all_pages"),
            ExtractionStage::PageSubset => write!(f, "page_subset"),
            ExtractionStage::Manual => write!(f, "manual"),
            ExtractionStage::Collected => write!(f, "collected"),
            ExtractionStage::Done => write!(f, "done"),
            ExtractionStage::Failed(reason) => write!(f, "failed({})", reason),
        }
    }
}

struct StageTracker {
    stage: ExtractionStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: ExtractionStage::Received,
        }
    }

    fn advance(&mut self, next: ExtractionStage) {
        tracing::debug!(from = %self.stage, to = %next, "extraction stage");
        self.stage = next;
    }
}

/// Runs extraction requests against pluggable PDF, OCR, and table backends
#[derive(Clone)]
pub struct ExtractionOrchestrator {
    rasterizer: Arc<dyn PageRasterizer>,
    ocr: Arc<dyn OcrEngine>,
    table_extractor: Arc<dyn TableExtractor>,
    options: ExtractionOptions,
}

impl ExtractionOrchestrator {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        ocr: Arc<dyn OcrEngine>,
        table_extractor: Arc<dyn TableExtractor>,
        options: ExtractionOptions,
    ) -> Self {
        Self {
            rasterizer,
            ocr,
            table_extractor,
            options,
        }
    }

    /// PDFium for rendering and layout, Tesseract for OCR
    pub fn with_pdfium(ocr_config: OcrConfig, options: ExtractionOptions) -> Self {
        Self::new(
            Arc::new(PdfiumRasterizer),
            Arc::new(TesseractOcr::new(ocr_config)),
            Arc::new(PdfiumTableExtractor::default()),
            options,
        )
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    pub fn rasterizer(&self) -> &Arc<dyn PageRasterizer> {
        &self.rasterizer
    }

    /// Run one request to completion
    pub fn run_extraction(&self, request: &ExtractionRequest) -> Result<ExtractionOutcome> {
        let mut tracker = StageTracker::new();
        tracing::info!(mode = request.mode().name(), "extraction request received");

        match self.dispatch(request, &mut tracker) {
            Ok(outcome) => {
                tracker.advance(ExtractionStage::Done);
                tracing::info!(
                    tables = outcome.tables.len(),
                    warnings = outcome.warnings.len(),
                    "extraction finished"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracker.advance(ExtractionStage::Failed(e.to_string()));
                tracing::warn!(error = %e, "extraction failed");
                Err(e)
            }
        }
    }

    fn dispatch(
        &self,
        request: &ExtractionRequest,
        tracker: &mut StageTracker,
    ) -> Result<ExtractionOutcome> {
        let deadline = self.options.timeout.map(Deadline::after);
        let data = request.data();
        let password = request.password();

        let page_count = self.rasterizer.page_count(data, password)?;
        if page_count == 0 {
            return Err(Error::EmptyDocument);
        }
        tracker.advance(ExtractionStage::ModeDispatched);

        let outcome = match request.mode() {
            ExtractionMode::All => {
                tracker.advance(ExtractionStage::AllPages);
                ExtractionOutcome {
                    tables: self.table_extractor.extract_all_tables(data, password)?,
                    warnings: Vec::new(),
                }
            }
            ExtractionMode::Pages { selection } => {
                tracker.advance(ExtractionStage::PageSubset);
                let pages = parse_page_selection(selection, page_count);
                if pages.is_empty() {
                    return Err(Error::NoPagesSelected {
                        selection: selection.clone(),
                    });
                }
                tracing::debug!(?pages, "selected pages");
                ExtractionOutcome {
                    tables: self
                        .table_extractor
                        .extract_tables_for_pages(data, password, &pages)?,
                    warnings: Vec::new(),
                }
            }
            ExtractionMode::Manual {
                page_index,
                regions,
                transform,
            } => {
                tracker.advance(ExtractionStage::Manual);
                if *page_index >= page_count {
                    return Err(Error::InvalidPageIndex {
                        index: *page_index,
                        page_count,
                    });
                }
                self.extract_manual(request, *page_index, regions, transform, deadline)?
            }
        };

        if let Some(deadline) = &deadline {
            deadline.check()?;
        }
        tracker.advance(ExtractionStage::Collected);

        Ok(outcome)
    }

    fn extract_manual(
        &self,
        request: &ExtractionRequest,
        page_index: usize,
        regions: &[DisplayRect],
        transform: &DisplayTransform,
        deadline: Option<Deadline>,
    ) -> Result<ExtractionOutcome> {
        if regions.is_empty() {
            return Err(Error::NoRegionSelected);
        }

        let page = self.rasterizer.rasterize_bounded(
            request.data(),
            request.password(),
            page_index,
            self.options.render_scale,
            self.options.max_image_pixels,
        )?;

        let rects = regions
            .iter()
            .map(|region| map_to_pixels(region, &page, transform))
            .collect::<Result<Vec<_>>>()?;

        let texts = RegionExtractor::new(self.ocr.as_ref())
            .with_workers(self.options.region_workers)
            .with_deadline(deadline)
            .with_crop_dir(self.options.crop_dir.as_deref())
            .extract_regions(&page, &rects)?;

        collect_region_texts(texts)
    }
}

/// One table per region. A region-level failure becomes an empty table plus a
/// warning; any other error fails the request.
fn collect_region_texts(texts: Vec<Result<String>>) -> Result<ExtractionOutcome> {
    let mut outcome = ExtractionOutcome::default();
    for (index, text) in texts.into_iter().enumerate() {
        match text {
            Ok(text) => outcome.tables.push(reconstruct(&text)),
            Err(e) if e.is_region_level() => {
                tracing::warn!(region = index, error = %e, "region extraction failed");
                outcome.warnings.push(ExtractionWarning {
                    region_index: index,
                    message: e.client_message(),
                });
                outcome.tables.push(TableRecord::empty());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(outcome)
}
