//! Page rasterization
//!
//! A [`PageImage`] always carries the scale it was rendered at. Coordinate
//! mapping reads the pixel-per-point ratio from here and nowhere else, so a
//! crop can never be computed against a different resolution than the one
//! the pixels were produced at.

use crate::error::{Error, Result};
use crate::pdf::document::{create_pdfium, load_document, validate_pdf_header};
use base64::Engine;
use image::DynamicImage;
use pdfium_render::prelude::*;

/// A rendered PDF page
#[derive(Debug, Clone)]
pub struct PageImage {
    image: DynamicImage,
    page_index: usize,
    scale: f32,
}

impl PageImage {
    /// Wrap an already rendered image. `scale` is pixels per PDF point.
    pub fn new(image: DynamicImage, page_index: usize, scale: f32) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidScale { scale });
        }
        Ok(Self {
            image,
            page_index,
            scale,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 0-based index of the source page
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Pixels per PDF point used when rendering
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Page size in PDF points, derived from the pixel size and scale
    pub fn size_in_points(&self) -> (f64, f64) {
        let scale = f64::from(self.scale);
        (
            f64::from(self.width()) / scale,
            f64::from(self.height()) / scale,
        )
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Encode as PNG bytes
    pub fn to_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    /// Encode as base64 PNG
    pub fn to_png_base64(&self) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_png()?))
    }
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image.write_to(
        &mut std::io::Cursor::new(&mut png_bytes),
        image::ImageFormat::Png,
    )?;
    Ok(png_bytes)
}

/// Pixel dimensions of a page of `size_in_points` rendered at `scale`,
/// or [`Error::ImageDimensionExceeded`] when their product is above `max_pixels`
pub fn check_pixel_area(
    size_in_points: (f64, f64),
    scale: f32,
    max_pixels: u64,
) -> Result<(u64, u64)> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::InvalidScale { scale });
    }
    let scale = f64::from(scale);
    let width = (size_in_points.0 * scale).ceil().max(0.0);
    let height = (size_in_points.1 * scale).ceil().max(0.0);

    // Compared in f64 so absurd page sizes cannot overflow
    if width * height > max_pixels as f64 {
        return Err(Error::ImageDimensionExceeded {
            detail: format!(
                "pixel area {}x{} exceeds maximum {} pixels",
                width, height, max_pixels
            ),
        });
    }
    Ok((width as u64, height as u64))
}

/// Renders PDF pages to pixel images
pub trait PageRasterizer: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self, data: &[u8], password: Option<&str>) -> Result<usize>;

    /// Width and height of one page (0-based `page_index`) in PDF points
    fn page_size(&self, data: &[u8], password: Option<&str>, page_index: usize)
        -> Result<(f64, f64)>;

    /// Render one page (0-based `page_index`) at `scale` pixels per point
    fn rasterize(
        &self,
        data: &[u8],
        password: Option<&str>,
        page_index: usize,
        scale: f32,
    ) -> Result<PageImage>;

    /// [`Self::rasterize`], refused before any bitmap is allocated when the
    /// result would exceed `max_pixels`
    fn rasterize_bounded(
        &self,
        data: &[u8],
        password: Option<&str>,
        page_index: usize,
        scale: f32,
        max_pixels: u64,
    ) -> Result<PageImage> {
        let size = self.page_size(data, password, page_index)?;
        check_pixel_area(size, scale, max_pixels)?;
        self.rasterize(data, password, page_index, scale)
    }
}

/// [`PageRasterizer`] backed by PDFium
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumRasterizer;

impl PdfiumRasterizer {
    /// Open the document and run `f` on one of its pages
    fn with_page<T>(
        data: &[u8],
        password: Option<&str>,
        page_index: usize,
        f: impl FnOnce(&PdfPage) -> Result<T>,
    ) -> Result<T> {
        validate_pdf_header(data)?;

        let pdfium = create_pdfium()?;
        let document = load_document(&pdfium, data, password)?;

        let pages = document.pages();
        let page_count = pages.len() as usize;
        if page_index >= page_count {
            return Err(Error::InvalidPageIndex {
                index: page_index,
                page_count,
            });
        }

        let page = pages.get(page_index as u16).map_err(|e| Error::Pdfium {
            reason: format!("Failed to get page {}: {}", page_index + 1, e),
        })?;
        f(&page)
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn page_count(&self, data: &[u8], password: Option<&str>) -> Result<usize> {
        crate::pdf::document::page_count(data, password)
    }

    fn page_size(
        &self,
        data: &[u8],
        password: Option<&str>,
        page_index: usize,
    ) -> Result<(f64, f64)> {
        Self::with_page(data, password, page_index, |page| {
            Ok((
                f64::from(page.width().value),
                f64::from(page.height().value),
            ))
        })
    }

    fn rasterize(
        &self,
        data: &[u8],
        password: Option<&str>,
        page_index: usize,
        scale: f32,
    ) -> Result<PageImage> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidScale { scale });
        }
        Self::with_page(data, password, page_index, |page| {
            render_at_scale(page, page_index, scale)
        })
    }
}

fn render_at_scale(page: &PdfPage, page_index: usize, scale: f32) -> Result<PageImage> {
    let config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to render page {}: {}", page_index + 1, e),
        })?;

    let image = bitmap.as_image();
    tracing::debug!(
        page_index,
        scale,
        width = image.width(),
        height = image.height(),
        "rasterized page"
    );

    PageImage::new(image, page_index, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255; 4])))
    }

    #[test]
    fn test_page_image_records_scale() {
        let page = PageImage::new(blank(200, 100), 1, 2.0).unwrap();
        assert_eq!(page.width(), 200);
        assert_eq!(page.height(), 100);
        assert_eq!(page.page_index(), 1);
        assert_eq!(page.scale(), 2.0);
        assert_eq!(page.size_in_points(), (100.0, 50.0));
    }

    #[test]
    fn test_page_image_rejects_bad_scale() {
        assert!(matches!(
            PageImage::new(blank(1, 1), 0, 0.0),
            Err(Error::InvalidScale { .. })
        ));
        assert!(matches!(
            PageImage::new(blank(1, 1), 0, f32::NAN),
            Err(Error::InvalidScale { .. })
        ));
        assert!(PageImage::new(blank(1, 1), 0, -1.5).is_err());
    }

    #[test]
    fn test_png_encoding() {
        let page = PageImage::new(blank(4, 3), 0, 1.0).unwrap();
        let png = page.to_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert!(!page.to_png_base64().unwrap().is_empty());
    }

    #[test]
    fn test_pixel_area_limit() {
        assert_eq!(check_pixel_area((100.0, 50.0), 2.0, 20_000).unwrap(), (200, 100));
        assert!(matches!(
            check_pixel_area((100.0, 50.0), 2.0, 19_999),
            Err(Error::ImageDimensionExceeded { .. })
        ));
        // 14400pt square at 200 DPI is 40000x40000
        assert!(matches!(
            check_pixel_area((14400.0, 14400.0), 200.0 / 72.0, 100_000_000),
            Err(Error::ImageDimensionExceeded { .. })
        ));
        assert!(matches!(
            check_pixel_area((100.0, 50.0), f32::INFINITY, u64::MAX),
            Err(Error::InvalidScale { .. })
        ));
    }

    #[test]
    fn test_pdfium_rasterizer_rejects_invalid_input_early() {
        let rasterizer = PdfiumRasterizer;
        assert!(matches!(
            rasterizer.rasterize(b"not a pdf", None, 0, 1.0),
            Err(Error::InvalidPdf { .. })
        ));
        assert!(matches!(
            rasterizer.rasterize(b"%PDF-1.4", None, 0, 0.0),
            Err(Error::InvalidScale { .. })
        ));
        assert!(matches!(
            rasterizer.page_size(b"not a pdf", None, 0),
            Err(Error::InvalidPdf { .. })
        ));
    }
}
