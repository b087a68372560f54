//! Mapping rectangles from preview coordinates to page-image pixels
//!
//! The preview a user draws on and the image that gets OCR'd are different
//! coordinate systems: the preview may be in PDF points or preview pixels,
//! panned, and have its y-axis pointing up, while the page image is in pixels
//! at the rasterization scale with the origin at the top-left. The relation
//! between the two is always spelled out by a [`DisplayTransform`]; the
//! pixel-per-unit ratio is derived from the [`PageImage`]'s recorded scale.

use crate::error::{Error, Result};
use crate::pdf::PageImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Rectangle in the preview's coordinate space. May be unnormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DisplayRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl DisplayRect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Same rectangle with `x0 <= x1` and `y0 <= y1`
    pub fn normalized(&self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    fn is_finite(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Rectangle in a page image's pixel space.
///
/// Always satisfies `x0 < x1 <= width` and `y0 < y1 <= height` for the image
/// it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl PixelRect {
    /// Checked constructor against an image of `width` x `height` pixels
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32, width: u32, height: u32) -> Result<Self> {
        if x0 >= x1 || y0 >= y1 || x1 > width || y1 > height {
            return Err(Error::DegenerateRegion {
                x0: f64::from(x0),
                y0: f64::from(y0),
                x1: f64::from(x1),
                y1: f64::from(y1),
                reason: format!("not a non-empty rectangle inside {}x{}", width, height),
            });
        }
        Ok(Self { x0, y0, x1, y1 })
    }

    /// Whole-image rectangle
    pub fn full(page: &PageImage) -> Result<Self> {
        Self::new(0, 0, page.width(), page.height(), page.width(), page.height())
    }

    pub fn x0(&self) -> u32 {
        self.x0
    }

    pub fn y0(&self) -> u32 {
        self.y0
    }

    pub fn x1(&self) -> u32 {
        self.x1
    }

    pub fn y1(&self) -> u32 {
        self.y1
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

/// How preview coordinates relate to PDF points.
///
/// `units_per_point_*` is how many display units one PDF point spans (1.0
/// when the preview is drawn in points, `s` when it is an image rendered at
/// scale `s`). `origin_*` is where the page's top-left (or bottom-left, with
/// `y_up`) corner sits in display units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DisplayTransform {
    #[serde(default = "default_units_per_point")]
    pub units_per_point_x: f64,
    #[serde(default = "default_units_per_point")]
    pub units_per_point_y: f64,
    #[serde(default)]
    pub origin_x: f64,
    #[serde(default)]
    pub origin_y: f64,
    /// Display y-axis grows upward (origin at the bottom-left of the page)
    #[serde(default)]
    pub y_up: bool,
}

fn default_units_per_point() -> f64 {
    1.0
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self::points()
    }
}

impl DisplayTransform {
    /// Preview in PDF points, origin top-left
    pub fn points() -> Self {
        Self {
            units_per_point_x: 1.0,
            units_per_point_y: 1.0,
            origin_x: 0.0,
            origin_y: 0.0,
            y_up: false,
        }
    }

    /// Preview is an image of the page rendered at `scale` pixels per point
    pub fn preview_pixels(scale: f64) -> Self {
        Self {
            units_per_point_x: scale,
            units_per_point_y: scale,
            ..Self::points()
        }
    }

    /// Preview stretched to `display_width` x `display_height` units for a
    /// page of `page_width` x `page_height` points
    pub fn fitted(display_width: f64, display_height: f64, page_width: f64, page_height: f64) -> Self {
        Self {
            units_per_point_x: display_width / page_width,
            units_per_point_y: display_height / page_height,
            ..Self::points()
        }
    }

    pub fn with_origin(mut self, origin_x: f64, origin_y: f64) -> Self {
        self.origin_x = origin_x;
        self.origin_y = origin_y;
        self
    }

    pub fn with_y_up(mut self, y_up: bool) -> Self {
        self.y_up = y_up;
        self
    }

    /// Reject factors that cannot describe a real mapping
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("units_per_point_x", self.units_per_point_x),
            ("units_per_point_y", self.units_per_point_y),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidTransform {
                    reason: format!("{} must be positive and finite, got {}", name, value),
                });
            }
        }
        if !self.origin_x.is_finite() || !self.origin_y.is_finite() {
            return Err(Error::InvalidTransform {
                reason: "origin must be finite".to_string(),
            });
        }
        Ok(())
    }
}

/// Map a preview rectangle onto `page`'s pixel grid.
///
/// Fails with [`Error::DegenerateRegion`] when nothing of the rectangle is
/// left after clamping to the image, so callers never get an empty crop.
pub fn map_to_pixels(
    rect: &DisplayRect,
    page: &PageImage,
    transform: &DisplayTransform,
) -> Result<PixelRect> {
    transform.validate()?;

    let degenerate = |reason: &str| Error::DegenerateRegion {
        x0: rect.x0,
        y0: rect.y0,
        x1: rect.x1,
        y1: rect.y1,
        reason: reason.to_string(),
    };

    if !rect.is_finite() {
        return Err(degenerate("non-finite coordinate"));
    }

    let r = rect.normalized();
    let (mut x0, mut x1) = (r.x0 - transform.origin_x, r.x1 - transform.origin_x);
    let (mut y0, mut y1) = (r.y0 - transform.origin_y, r.y1 - transform.origin_y);

    let scale = f64::from(page.scale());
    let width = f64::from(page.width());
    let height = f64::from(page.height());

    if transform.y_up {
        let display_height = height / scale * transform.units_per_point_y;
        (y0, y1) = (display_height - y1, display_height - y0);
    }

    let sx = scale / transform.units_per_point_x;
    let sy = scale / transform.units_per_point_y;
    x0 = (x0 * sx).clamp(0.0, width);
    x1 = (x1 * sx).clamp(0.0, width);
    y0 = (y0 * sy).clamp(0.0, height);
    y1 = (y1 * sy).clamp(0.0, height);

    if x1 - x0 <= 0.0 || y1 - y0 <= 0.0 {
        return Err(degenerate("no overlap with the page image"));
    }

    // Round outward so partially covered edge pixels stay in the crop
    let px0 = x0.floor() as u32;
    let py0 = y0.floor() as u32;
    let px1 = (x1.ceil() as u32).min(page.width());
    let py1 = (y1.ceil() as u32).min(page.height());

    tracing::debug!(
        display = ?rect,
        pixels = ?(px0, py0, px1, py1),
        scale,
        "mapped region"
    );

    PixelRect::new(px0, py0, px1, py1, page.width(), page.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use rstest::rstest;

    /// 200x100 pixel image of a 100x50 point page rendered at scale 2
    fn page() -> PageImage {
        PageImage::new(DynamicImage::ImageRgb8(RgbImage::new(200, 100)), 0, 2.0).unwrap()
    }

    fn assert_invariant(r: &PixelRect, page: &PageImage) {
        assert!(r.x0() < r.x1() && r.x1() <= page.width());
        assert!(r.y0() < r.y1() && r.y1() <= page.height());
    }

    #[test]
    fn test_full_page_in_points_maps_to_full_image() {
        let page = page();
        let rect = DisplayRect::new(0.0, 0.0, 100.0, 50.0);
        let mapped = map_to_pixels(&rect, &page, &DisplayTransform::points()).unwrap();
        assert_eq!(mapped, PixelRect::full(&page).unwrap());
    }

    #[test]
    fn test_scale_is_applied() {
        let page = page();
        let rect = DisplayRect::new(10.0, 5.0, 20.0, 15.0);
        let mapped = map_to_pixels(&rect, &page, &DisplayTransform::points()).unwrap();
        assert_eq!((mapped.x0(), mapped.y0(), mapped.x1(), mapped.y1()), (20, 10, 40, 30));
    }

    #[test]
    fn test_preview_at_other_resolution() {
        // Preview rendered at scale 1 (72 DPI), OCR image at scale 2
        let page = page();
        let rect = DisplayRect::new(50.0, 25.0, 100.0, 50.0);
        let mapped = map_to_pixels(&rect, &page, &DisplayTransform::preview_pixels(1.0)).unwrap();
        assert_eq!((mapped.x0(), mapped.y0(), mapped.x1(), mapped.y1()), (100, 50, 200, 100));

        // Preview at scale 4: the same area is twice as many preview units
        let rect = DisplayRect::new(200.0, 100.0, 400.0, 200.0);
        let mapped = map_to_pixels(&rect, &page, &DisplayTransform::preview_pixels(4.0)).unwrap();
        assert_eq!((mapped.x0(), mapped.y0(), mapped.x1(), mapped.y1()), (100, 50, 200, 100));
    }

    #[test]
    fn test_y_up_flip() {
        let page = page();
        // Bottom strip of the page in a y-up preview (points)
        let rect = DisplayRect::new(0.0, 0.0, 100.0, 10.0);
        let transform = DisplayTransform::points().with_y_up(true);
        let mapped = map_to_pixels(&rect, &page, &transform).unwrap();
        assert_eq!((mapped.x0(), mapped.y0(), mapped.x1(), mapped.y1()), (0, 80, 200, 100));
    }

    #[test]
    fn test_origin_offset() {
        let page = page();
        // Page drawn at (30, 40) inside a larger canvas
        let transform = DisplayTransform::points().with_origin(30.0, 40.0);
        let rect = DisplayRect::new(30.0, 40.0, 40.0, 50.0);
        let mapped = map_to_pixels(&rect, &page, &transform).unwrap();
        assert_eq!((mapped.x0(), mapped.y0(), mapped.x1(), mapped.y1()), (0, 0, 20, 20));
    }

    #[test]
    fn test_fitted_non_uniform_preview() {
        let page = page();
        // 100x50pt page stretched into a 400x400 canvas
        let transform = DisplayTransform::fitted(400.0, 400.0, 100.0, 50.0);
        let rect = DisplayRect::new(0.0, 0.0, 200.0, 200.0);
        let mapped = map_to_pixels(&rect, &page, &transform).unwrap();
        assert_eq!((mapped.x0(), mapped.y0(), mapped.x1(), mapped.y1()), (0, 0, 100, 50));
    }

    #[rstest]
    #[case(DisplayRect::new(10.0, 5.0, 20.0, 15.0))]
    #[case(DisplayRect::new(20.0, 5.0, 10.0, 15.0))]
    #[case(DisplayRect::new(10.0, 15.0, 20.0, 5.0))]
    #[case(DisplayRect::new(20.0, 15.0, 10.0, 5.0))]
    fn test_order_invariance(#[case] rect: DisplayRect) {
        let page = page();
        let mapped = map_to_pixels(&rect, &page, &DisplayTransform::points()).unwrap();
        let expected = map_to_pixels(
            &DisplayRect::new(10.0, 5.0, 20.0, 15.0),
            &page,
            &DisplayTransform::points(),
        )
        .unwrap();
        assert_eq!(mapped, expected);
    }

    #[rstest]
    #[case(DisplayRect::new(-50.0, 10.0, -10.0, 20.0))]
    #[case(DisplayRect::new(150.0, 10.0, 300.0, 20.0))]
    #[case(DisplayRect::new(10.0, 60.0, 20.0, 90.0))]
    #[case(DisplayRect::new(10.0, -40.0, 20.0, -1.0))]
    #[case(DisplayRect::new(10.0, 10.0, 10.0, 20.0))]
    #[case(DisplayRect::new(10.0, 10.0, 20.0, 10.0))]
    #[case(DisplayRect::new(f64::NAN, 0.0, 10.0, 10.0))]
    #[case(DisplayRect::new(0.0, 0.0, f64::INFINITY, 10.0))]
    fn test_outside_or_empty_is_degenerate(#[case] rect: DisplayRect) {
        let result = map_to_pixels(&rect, &page(), &DisplayTransform::points());
        assert!(matches!(result, Err(Error::DegenerateRegion { .. })));
    }

    #[rstest]
    #[case(DisplayRect::new(-500.0, -500.0, 500.0, 500.0))]
    #[case(DisplayRect::new(99.9, 49.9, 100.0, 50.0))]
    #[case(DisplayRect::new(0.0, 0.0, 0.01, 0.01))]
    #[case(DisplayRect::new(33.3, 12.7, 66.6, 44.4))]
    fn test_output_satisfies_invariant(#[case] rect: DisplayRect) {
        let page = page();
        for transform in [
            DisplayTransform::points(),
            DisplayTransform::points().with_y_up(true),
            DisplayTransform::preview_pixels(0.5),
        ] {
            if let Ok(mapped) = map_to_pixels(&rect, &page, &transform) {
                assert_invariant(&mapped, &page);
            }
        }
        let mapped = map_to_pixels(&rect, &page, &DisplayTransform::points()).unwrap();
        assert_invariant(&mapped, &page);
    }

    #[test]
    fn test_partial_overlap_is_clamped() {
        let page = page();
        let rect = DisplayRect::new(-20.0, -20.0, 10.0, 10.0);
        let mapped = map_to_pixels(&rect, &page, &DisplayTransform::points()).unwrap();
        assert_eq!((mapped.x0(), mapped.y0(), mapped.x1(), mapped.y1()), (0, 0, 20, 20));
    }

    #[test]
    fn test_invalid_transform_rejected() {
        let transform = DisplayTransform {
            units_per_point_x: 0.0,
            ..DisplayTransform::points()
        };
        let result = map_to_pixels(&DisplayRect::new(0.0, 0.0, 1.0, 1.0), &page(), &transform);
        assert!(matches!(result, Err(Error::InvalidTransform { .. })));
    }

    #[test]
    fn test_pixel_rect_checked_constructor() {
        assert!(PixelRect::new(0, 0, 10, 10, 10, 10).is_ok());
        assert!(PixelRect::new(5, 0, 5, 10, 10, 10).is_err());
        assert!(PixelRect::new(0, 0, 11, 10, 10, 10).is_err());
    }

    #[test]
    fn test_transform_deserializes_with_defaults() {
        let transform: DisplayTransform = serde_json::from_str(r#"{"y_up": true}"#).unwrap();
        assert_eq!(transform, DisplayTransform::points().with_y_up(true));
    }
}
