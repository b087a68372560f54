//! MCP Server implementation using rmcp

use crate::extraction::{
    ExtractionOptions, ExtractionOrchestrator, ExtractionRequest, ExtractionWarning,
    DEFAULT_MAX_IMAGE_PIXELS, DEFAULT_RENDER_SCALE,
};
use crate::ocr::OcrConfig;
use crate::pdf::{detect_pdf_type, PdfType};
use crate::region::{DisplayRect, DisplayTransform};
use crate::searchable::{SearchableOptions, SearchablePdfBuilder};
use crate::source::{resolve_base64, resolve_path, resolve_url, PdfSource, ResolvedPdf, UrlPolicy};
use crate::table::TableRecord;
use crate::workbook::{write_workbook, XLSX_MIME_TYPE};
use anyhow::Result;
use base64::Engine;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Security, resource, and extraction configuration for the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories PDFs may be read from and workbooks written to (empty: no restriction)
    pub resource_dirs: Vec<String>,
    /// Allow URLs that resolve to private/reserved IPs (default: false)
    pub allow_private_urls: bool,
    /// Maximum download size in bytes for URL sources (default: 100MB)
    pub max_download_bytes: u64,
    /// Maximum scale factor for render_page (default: 10.0)
    pub max_image_scale: f32,
    /// Maximum pixel area of any rendered page (default: 100_000_000)
    pub max_image_pixels: u64,
    /// Rasterization scale used for region OCR (default: 200 DPI)
    pub render_scale: f32,
    /// Regions OCR'd concurrently per request (default: 1)
    pub region_workers: usize,
    /// Per-source extraction time limit (default: none)
    pub request_timeout: Option<Duration>,
    /// Tesseract invocation
    pub ocr: OcrConfig,
    /// Keep region crops here for debugging (default: none)
    pub crop_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            allow_private_urls: false,
            max_download_bytes: 100 * 1024 * 1024, // 100MB
            max_image_scale: 10.0,
            max_image_pixels: DEFAULT_MAX_IMAGE_PIXELS,
            render_scale: DEFAULT_RENDER_SCALE,
            region_workers: 1,
            request_timeout: None,
            ocr: OcrConfig::default(),
            crop_dir: None,
        }
    }
}

impl ServerConfig {
    fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            render_scale: self.render_scale,
            region_workers: self.region_workers,
            timeout: self.request_timeout,
            crop_dir: self.crop_dir.clone(),
            max_image_pixels: self.max_image_pixels,
        }
    }

    fn searchable_options(&self) -> SearchableOptions {
        SearchableOptions {
            render_scale: self.render_scale,
            max_image_pixels: self.max_image_pixels,
            timeout: self.request_timeout,
        }
    }

    fn url_policy(&self) -> UrlPolicy {
        UrlPolicy {
            allow_private_urls: self.allow_private_urls,
            max_download_bytes: self.max_download_bytes,
            ..UrlPolicy::default()
        }
    }
}

/// PDF table extraction MCP server
#[derive(Clone)]
pub struct PdfServer {
    tool_router: ToolRouter<Self>,
    config: Arc<ServerConfig>,
    orchestrator: ExtractionOrchestrator,
    searchable: SearchablePdfBuilder,
}

// ============================================================================
// Request/Response types for extract_tables
// ============================================================================

/// Extraction mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModeParam {
    /// Every table in the document
    #[default]
    All,
    /// Tables on selected pages
    Pages,
    /// OCR of drawn regions on one page
    Manual,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractTablesParams {
    /// PDF sources to process
    pub sources: Vec<PdfSource>,
    /// "all" (default), "pages", or "manual"
    #[serde(default)]
    pub mode: ModeParam,
    /// Page selection for "pages" mode (e.g., "1,3,5-7"), 1-indexed
    #[serde(default)]
    pub pages: Option<String>,
    /// Page for "manual" mode, 0-indexed
    #[serde(default)]
    pub page_index: Option<usize>,
    /// Rectangles for "manual" mode, in display coordinates
    #[serde(default)]
    pub regions: Vec<DisplayRect>,
    /// How display coordinates relate to PDF points (default: points, top-left origin)
    #[serde(default)]
    pub display: Option<DisplayTransform>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Write the workbook here (suffixed per source when several are given)
    #[serde(default)]
    pub output_path: Option<String>,
    /// Return the workbook as base64 in the response
    #[serde(default)]
    pub include_workbook: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ExtractTablesResult {
    pub source: String,
    /// Tables in order; sheet `Table_<n>` of the workbook holds `tables[n]`
    pub tables: Vec<TableRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ExtractionWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workbook_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for render_page
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenderPageParams {
    /// PDF sources to process
    pub sources: Vec<PdfSource>,
    /// Page to render, 0-indexed (default: 0)
    #[serde(default)]
    pub page_index: usize,
    /// Pixels per PDF point (default: 1.0)
    #[serde(default)]
    pub scale: Option<f32>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct RenderPageResult {
    pub source: String,
    pub page_index: usize,
    /// Pixels per PDF point; use as `units_per_point` in `display`
    pub scale: f32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Page width in PDF points
    pub page_width: f64,
    /// Page height in PDF points
    pub page_height: f64,
    /// Base64-encoded PNG image data
    pub data_base64: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for detect_pdf_type
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DetectPdfTypeParams {
    /// PDF sources to process
    pub sources: Vec<PdfSource>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DetectPdfTypeResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_type: Option<PdfType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_text: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_images: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for make_searchable
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MakeSearchableParams {
    /// PDF sources to process
    pub sources: Vec<PdfSource>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Write the result here (suffixed per source when several are given);
    /// without it the PDF is returned as base64
    #[serde(default)]
    pub output_path: Option<String>,
    /// Replace an existing file at output_path instead of skipping the source
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MakeSearchableResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_base64: Option<String>,
    /// The output file already existed and was left alone
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl PdfServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a server restricted to the given resource directories
    pub fn with_resource_dirs(dirs: Vec<String>) -> Self {
        Self::with_config(ServerConfig {
            resource_dirs: dirs,
            ..ServerConfig::default()
        })
    }

    /// Create a server backed by PDFium and Tesseract
    pub fn with_config(config: ServerConfig) -> Self {
        let orchestrator =
            ExtractionOrchestrator::with_pdfium(config.ocr.clone(), config.extraction_options());
        Self::with_orchestrator(config, orchestrator)
    }

    /// Create a server with custom extraction backends
    pub fn with_orchestrator(config: ServerConfig, orchestrator: ExtractionOrchestrator) -> Self {
        let searchable =
            SearchablePdfBuilder::with_pdfium(config.ocr.clone(), config.searchable_options());
        Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
            orchestrator,
            searchable,
        }
    }

    /// Replace the searchable PDF backends
    pub fn with_searchable(mut self, searchable: SearchablePdfBuilder) -> Self {
        self.searchable = searchable;
        self
    }

    /// Extract tables into structured rows and an Excel workbook
    #[tool(
        description = "Extract tables from PDF files into rows of cells and an Excel workbook (one sheet per table, named Table_0, Table_1, ...).

Modes:
- all: every table found in the document's text layer
- pages: tables on the pages in `pages` (e.g. \"1,3,5-7\", 1-indexed; invalid entries are ignored)
- manual: OCR of rectangles drawn on page `page_index` (0-indexed). `regions` are in display coordinates; `display` tells how they relate to the page (units_per_point_x/y, origin_x/y, y_up). Use render_page to get a preview and its scale.

Set output_path to write the workbook to disk, or include_workbook to receive it as base64.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, or {\"base64\": \"...\"}"
    )]
    async fn extract_tables(&self, Parameters(params): Parameters<ExtractTablesParams>) -> String {
        let mut results = Vec::new();

        for (index, source) in params.sources.iter().enumerate() {
            let result = self
                .process_extract_tables(source, &params, index)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "extract_tables failed");
                    ExtractTablesResult {
                        source: Self::source_name(source),
                        tables: vec![],
                        warnings: vec![],
                        output_path: None,
                        workbook_base64: None,
                        mime_type: None,
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Render a page preview
    #[tool(
        description = "Render one PDF page to a PNG preview for drawing table regions.

Returns the image with its scale (pixels per PDF point) and the page size in points. For manual extraction on this preview, pass display = {\"units_per_point_x\": scale, \"units_per_point_y\": scale}.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, or {\"base64\": \"...\"}"
    )]
    async fn render_page(&self, Parameters(params): Parameters<RenderPageParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_render_page(source, &params)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "render_page failed");
                    RenderPageResult {
                        source: Self::source_name(source),
                        page_index: params.page_index,
                        scale: params.scale.unwrap_or(1.0),
                        width: 0,
                        height: 0,
                        page_width: 0.0,
                        page_height: 0.0,
                        data_base64: String::new(),
                        mime_type: "image/png".to_string(),
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Classify a PDF as digital, scanned, or mixed
    #[tool(
        description = "Classify PDFs as digital (text layer only), scanned (images only), mixed, or unknown. Digital documents suit the all/pages modes of extract_tables; scanned ones need manual mode.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, or {\"base64\": \"...\"}"
    )]
    async fn detect_pdf_type(&self, Parameters(params): Parameters<DetectPdfTypeParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_detect_pdf_type(source, &params)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "detect_pdf_type failed");
                    DetectPdfTypeResult {
                        source: Self::source_name(source),
                        pdf_type: None,
                        page_count: None,
                        has_text: None,
                        has_images: None,
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// OCR scanned PDFs into searchable ones
    #[tool(
        description = "Make scanned PDFs searchable: every page is rendered at 200 DPI, OCR'd with Tesseract, and rebuilt as the page image with an invisible text layer.

Set output_path to write the result to disk (an existing file is skipped unless overwrite is true); otherwise the PDF is returned as base64.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, or {\"base64\": \"...\"}"
    )]
    async fn make_searchable(
        &self,
        Parameters(params): Parameters<MakeSearchableParams>,
    ) -> String {
        let mut results = Vec::new();

        for (index, source) in params.sources.iter().enumerate() {
            let result = self
                .process_make_searchable(source, &params, index)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "make_searchable failed");
                    MakeSearchableResult {
                        source: Self::source_name(source),
                        page_count: None,
                        output_path: None,
                        pdf_base64: None,
                        skipped: false,
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }
}

impl PdfServer {
    fn source_name(source: &PdfSource) -> String {
        source.name()
    }

    async fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<ResolvedPdf> {
        match source {
            PdfSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                resolve_path(path)
            }
            PdfSource::Base64 { base64 } => resolve_base64(base64),
            PdfSource::Url { url } => resolve_url(url, &self.config.url_policy()).await,
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let denied = || crate::error::Error::PathAccessDenied {
            path: path.to_string(),
        };
        let canonical = std::fs::canonicalize(path).map_err(|_| denied())?;

        if self.is_within_resource_dirs(&canonical) {
            Ok(canonical)
        } else {
            Err(denied())
        }
    }

    /// Like [`Self::validate_path_access`], for a file that may not exist yet.
    /// The parent directory must exist.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let denied = || crate::error::Error::PathAccessDenied {
            path: path.to_string(),
        };
        let target = Path::new(path);
        let file_name = target.file_name().ok_or_else(denied)?;
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let canonical = std::fs::canonicalize(parent)
            .map_err(|_| denied())?
            .join(file_name);

        if self.is_within_resource_dirs(&canonical) {
            Ok(canonical)
        } else {
            Err(denied())
        }
    }

    fn is_within_resource_dirs(&self, canonical: &Path) -> bool {
        self.config.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|d| canonical.starts_with(d))
                .unwrap_or(false)
        })
    }

    /// Write output data to a file path, with sandbox validation.
    fn write_output(&self, path: &str, data: &[u8]) -> crate::error::Result<String> {
        let target = self.validate_output_path_access(path)?;

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&target, data)?;
        Ok(target.display().to_string())
    }

    /// Build the request for one source; validation errors surface before any PDF work
    fn build_request(
        params: &ExtractTablesParams,
        data: Vec<u8>,
    ) -> crate::error::Result<ExtractionRequest> {
        let request = match params.mode {
            ModeParam::All => ExtractionRequest::all(data),
            ModeParam::Pages => {
                let selection = params.pages.as_deref().unwrap_or("").trim();
                if selection.is_empty() {
                    return Err(crate::error::Error::NoPagesSelected {
                        selection: selection.to_string(),
                    });
                }
                ExtractionRequest::pages(data, selection)
            }
            ModeParam::Manual => {
                let page_index =
                    params
                        .page_index
                        .ok_or_else(|| crate::error::Error::InvalidRequest {
                            reason: "page_index is required in manual mode".to_string(),
                        })?;
                ExtractionRequest::manual(
                    data,
                    page_index,
                    params.regions.clone(),
                    params.display.unwrap_or_default(),
                )?
            }
        };

        Ok(request.with_password(params.password.clone()))
    }

    /// `out.xlsx` for a single source, `out_1.xlsx`, `out_2.xlsx`, ... for several
    fn output_path_for(path: &str, index: usize, source_count: usize) -> String {
        if source_count <= 1 {
            return path.to_string();
        }
        let path = Path::new(path);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match path.extension() {
            Some(ext) => format!("{}_{}.{}", stem, index + 1, ext.to_string_lossy()),
            None => format!("{}_{}", stem, index + 1),
        };
        path.with_file_name(name).display().to_string()
    }

    pub async fn process_extract_tables(
        &self,
        source: &PdfSource,
        params: &ExtractTablesParams,
        index: usize,
    ) -> crate::error::Result<ExtractTablesResult> {
        let resolved = self.resolve_source(source).await?;
        let source_name = resolved.source_name;
        let request = Self::build_request(params, resolved.data)?;

        tracing::info!(source = %source_name, mode = request.mode().name(), "extracting tables");

        let orchestrator = self.orchestrator.clone();
        let task = tokio::task::spawn_blocking(move || orchestrator.run_extraction(&request));

        let joined = match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
                crate::error::Error::Timeout {
                    elapsed_ms: limit.as_millis(),
                }
            })?,
            None => task.await,
        };
        let outcome = joined.map_err(|e| crate::error::Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;

        let wants_workbook = params.include_workbook || params.output_path.is_some();
        let workbook = if !wants_workbook {
            None
        } else if outcome.tables.is_empty() {
            tracing::info!(source = %source_name, "no tables found, no workbook written");
            None
        } else {
            Some(write_workbook(&outcome.tables)?)
        };
        let mime_type = workbook.as_ref().map(|_| XLSX_MIME_TYPE.to_string());

        let output_path = match (&params.output_path, &workbook) {
            (Some(path), Some(bytes)) => {
                let path = Self::output_path_for(path, index, params.sources.len());
                Some(self.write_output(&path, bytes)?)
            }
            _ => None,
        };

        let workbook_base64 = workbook
            .filter(|_| params.include_workbook)
            .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes));

        Ok(ExtractTablesResult {
            source: source_name,
            tables: outcome.tables,
            warnings: outcome.warnings,
            mime_type,
            output_path,
            workbook_base64,
            error: None,
        })
    }

    pub async fn process_make_searchable(
        &self,
        source: &PdfSource,
        params: &MakeSearchableParams,
        index: usize,
    ) -> crate::error::Result<MakeSearchableResult> {
        let output_path = params
            .output_path
            .as_deref()
            .map(|path| Self::output_path_for(path, index, params.sources.len()));

        if let Some(path) = &output_path {
            let target = self.validate_output_path_access(path)?;
            if target.exists() && !params.overwrite {
                tracing::info!(path = %target.display(), "output exists, skipping");
                return Ok(MakeSearchableResult {
                    source: Self::source_name(source),
                    page_count: None,
                    output_path: Some(target.display().to_string()),
                    pdf_base64: None,
                    skipped: true,
                    error: None,
                });
            }
        }

        let resolved = self.resolve_source(source).await?;
        let source_name = resolved.source_name;
        let data = resolved.data;
        let password = params.password.clone();

        tracing::info!(source = %source_name, "making searchable PDF");

        let searchable = self.searchable.clone();
        let task = tokio::task::spawn_blocking(move || {
            searchable.make_searchable(&data, password.as_deref())
        });

        let joined = match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
                crate::error::Error::Timeout {
                    elapsed_ms: limit.as_millis(),
                }
            })?,
            None => task.await,
        };
        let pdf = joined.map_err(|e| crate::error::Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;

        let (output_path, pdf_base64) = match output_path {
            Some(path) => (Some(self.write_output(&path, &pdf.data)?), None),
            None => (
                None,
                Some(base64::engine::general_purpose::STANDARD.encode(&pdf.data)),
            ),
        };

        Ok(MakeSearchableResult {
            source: source_name,
            page_count: Some(pdf.page_count),
            output_path,
            pdf_base64,
            skipped: false,
            error: None,
        })
    }

    pub async fn process_render_page(
        &self,
        source: &PdfSource,
        params: &RenderPageParams,
    ) -> crate::error::Result<RenderPageResult> {
        let scale = params.scale.unwrap_or(1.0);
        if !scale.is_finite() || scale <= 0.0 || scale > self.config.max_image_scale {
            return Err(crate::error::Error::ImageDimensionExceeded {
                detail: format!(
                    "scale must be between 0.0 (exclusive) and {} (inclusive), got {}",
                    self.config.max_image_scale, scale
                ),
            });
        }

        let resolved = self.resolve_source(source).await?;
        let source_name = resolved.source_name;
        let data = resolved.data;
        let password = params.password.clone();
        let page_index = params.page_index;
        let rasterizer = Arc::clone(self.orchestrator.rasterizer());

        let max_pixels = self.config.max_image_pixels;

        let page = tokio::task::spawn_blocking(move || {
            rasterizer.rasterize_bounded(
                &data,
                password.as_deref(),
                page_index,
                scale,
                max_pixels,
            )
        })
        .await
        .map_err(|e| crate::error::Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;

        let (page_width, page_height) = page.size_in_points();

        Ok(RenderPageResult {
            source: source_name,
            page_index,
            scale: page.scale(),
            width: page.width(),
            height: page.height(),
            page_width,
            page_height,
            data_base64: page.to_png_base64()?,
            mime_type: "image/png".to_string(),
            error: None,
        })
    }

    pub async fn process_detect_pdf_type(
        &self,
        source: &PdfSource,
        params: &DetectPdfTypeParams,
    ) -> crate::error::Result<DetectPdfTypeResult> {
        let resolved = self.resolve_source(source).await?;
        let source_name = resolved.source_name;
        let data = resolved.data;
        let password = params.password.clone();

        let info =
            tokio::task::spawn_blocking(move || detect_pdf_type(&data, password.as_deref()))
                .await
                .map_err(|e| crate::error::Error::Pdfium {
                    reason: format!("Task join error: {}", e),
                })??;

        Ok(DetectPdfTypeResult {
            source: source_name,
            pdf_type: Some(info.pdf_type),
            page_count: Some(info.page_count),
            has_text: Some(info.has_text),
            has_images: Some(info.has_images),
            error: None,
        })
    }
}

impl Default for PdfServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF table extractor: pulls tables out of PDFs into rows and Excel workbooks. \
                 Use detect_pdf_type to choose a mode, render_page to preview a page, and \
                 extract_tables with mode all, pages, or manual (OCR of drawn regions). \
                 make_searchable adds an OCR text layer to scanned PDFs."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server without resource directories
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with specified resource directories
pub async fn run_server_with_dirs(resource_dirs: Vec<String>) -> Result<()> {
    run_server_with_config(ServerConfig {
        resource_dirs,
        ..ServerConfig::default()
    })
    .await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let server = PdfServer::with_config(config);

    tracing::info!("PDF table extractor ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
