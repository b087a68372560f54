//! Manual region extraction: coordinate mapping and per-region OCR

mod extractor;
mod geometry;

pub use extractor::{Deadline, RegionExtractor};
pub use geometry::{map_to_pixels, DisplayRect, DisplayTransform, PixelRect};
