//! Cropping regions out of a page image and running OCR on them

use crate::error::{Error, Result};
use crate::ocr::OcrEngine;
use crate::pdf::PageImage;
use crate::region::PixelRect;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// A point in time after which extraction gives up
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    /// Deadline `limit` from now
    pub fn after(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.started.elapsed() >= self.limit
    }

    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            return Err(Error::Timeout {
                elapsed_ms: self.started.elapsed().as_millis(),
            });
        }
        Ok(())
    }
}

/// Runs OCR over rectangular regions of one page image
pub struct RegionExtractor<'a> {
    ocr: &'a dyn OcrEngine,
    workers: usize,
    deadline: Option<Deadline>,
    crop_dir: Option<&'a Path>,
}

impl<'a> RegionExtractor<'a> {
    pub fn new(ocr: &'a dyn OcrEngine) -> Self {
        Self {
            ocr,
            workers: 1,
            deadline: None,
            crop_dir: None,
        }
    }

    /// Number of regions OCR'd concurrently (1 = sequential)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Keep a PNG of every crop in `dir` for debugging
    pub fn with_crop_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.crop_dir = dir;
        self
    }

    /// OCR every rectangle of `page`.
    ///
    /// The returned vector matches `rects` index for index. A region whose
    /// OCR fails yields [`Error::RegionOcrFailed`] in its slot without
    /// affecting the others. The call as a whole fails only with
    /// [`Error::Timeout`] once the deadline has passed.
    pub fn extract_regions(
        &self,
        page: &PageImage,
        rects: &[PixelRect],
    ) -> Result<Vec<Result<String>>> {
        let workers = self.workers.min(rects.len()).max(1);

        let results = if workers == 1 {
            rects
                .iter()
                .enumerate()
                .map(|(index, rect)| self.extract_one(index, page, rect))
                .collect()
        } else {
            self.extract_parallel(page, rects, workers)
        };

        let mut out = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Err(e @ Error::Timeout { .. }) => return Err(e),
                other => out.push(other),
            }
        }
        Ok(out)
    }

    fn extract_parallel(
        &self,
        page: &PageImage,
        rects: &[PixelRect],
        workers: usize,
    ) -> Vec<Result<String>> {
        let next = AtomicUsize::new(0);
        let mut slots: Vec<Option<Result<String>>> = (0..rects.len()).map(|_| None).collect();

        thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    s.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(rect) = rects.get(index) else {
                                break;
                            };
                            done.push((index, self.extract_one(index, page, rect)));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(done) => {
                        for (index, result) in done {
                            slots[index] = Some(result);
                        }
                    }
                    Err(_) => tracing::warn!("region OCR worker panicked"),
                }
            }
        });

        // Results are placed by index, never by completion order
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    Err(Error::RegionOcrFailed {
                        index,
                        reason: "OCR worker terminated unexpectedly".to_string(),
                    })
                })
            })
            .collect()
    }

    fn extract_one(&self, index: usize, page: &PageImage, rect: &PixelRect) -> Result<String> {
        if let Some(deadline) = &self.deadline {
            deadline.check()?;
        }

        let crop = page
            .image()
            .crop_imm(rect.x0(), rect.y0(), rect.width(), rect.height());

        tracing::debug!(
            region = index,
            x0 = rect.x0(),
            y0 = rect.y0(),
            x1 = rect.x1(),
            y1 = rect.y1(),
            "cropped region"
        );

        if let Some(dir) = self.crop_dir {
            let path = dir.join(format!("region_{}.png", index + 1));
            if let Err(e) = crop.save(&path) {
                tracing::warn!(region = index, error = %e, "failed to save region crop");
            }
        }

        self.ocr
            .recognize(&crop)
            .map_err(|e| Error::RegionOcrFailed {
                index,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
    use std::sync::Mutex;

    /// Reports the crop size and the red channel of its top-left pixel
    struct ProbeOcr {
        fail_on_red: Option<u8>,
        delay: Duration,
    }

    impl OcrEngine for ProbeOcr {
        fn recognize(&self, image: &DynamicImage) -> Result<String> {
            thread::sleep(self.delay);
            let red = image.get_pixel(0, 0)[0];
            if Some(red) == self.fail_on_red {
                return Err(Error::Ocr {
                    reason: "engine crashed".to_string(),
                });
            }
            Ok(format!("{}x{} {}", image.width(), image.height(), red))
        }
    }

    /// Records the sizes it was asked to OCR
    struct RecordingOcr {
        seen: Mutex<Vec<(u32, u32)>>,
    }

    impl OcrEngine for RecordingOcr {
        fn recognize(&self, image: &DynamicImage) -> Result<String> {
            self.seen.lock().unwrap().push(image.dimensions());
            Ok(String::new())
        }
    }

    /// 100x10 image whose red channel equals the x coordinate
    fn gradient_page() -> PageImage {
        let img = RgbImage::from_fn(100, 10, |x, _| Rgb([x as u8, 0, 0]));
        PageImage::new(DynamicImage::ImageRgb8(img), 0, 1.0).unwrap()
    }

    fn rect(x0: u32, x1: u32) -> PixelRect {
        PixelRect::new(x0, 0, x1, 10, 100, 10).unwrap()
    }

    #[test]
    fn test_crops_exact_region() {
        let ocr = RecordingOcr {
            seen: Mutex::new(Vec::new()),
        };
        let page = gradient_page();
        RegionExtractor::new(&ocr)
            .extract_regions(&page, &[rect(10, 30), PixelRect::full(&page).unwrap()])
            .unwrap();
        assert_eq!(*ocr.seen.lock().unwrap(), vec![(20, 10), (100, 10)]);
    }

    #[test]
    fn test_results_follow_input_order_with_failure() {
        let ocr = ProbeOcr {
            fail_on_red: Some(40),
            delay: Duration::ZERO,
        };
        let page = gradient_page();
        let rects = [rect(70, 80), rect(40, 50), rect(0, 5)];

        let results = RegionExtractor::new(&ocr)
            .extract_regions(&page, &rects)
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), "10x10 70");
        assert!(matches!(
            results[1],
            Err(Error::RegionOcrFailed { index: 1, .. })
        ));
        assert_eq!(results[2].as_ref().unwrap(), "5x10 0");
    }

    #[test]
    fn test_parallel_results_follow_input_order() {
        let ocr = ProbeOcr {
            fail_on_red: Some(30),
            delay: Duration::from_millis(5),
        };
        let page = gradient_page();
        let rects: Vec<PixelRect> = (0..9).map(|i| rect(i * 10, i * 10 + 5)).collect();

        let results = RegionExtractor::new(&ocr)
            .with_workers(4)
            .extract_regions(&page, &rects)
            .unwrap();

        assert_eq!(results.len(), rects.len());
        for (i, result) in results.iter().enumerate() {
            if i == 3 {
                assert!(matches!(result, Err(Error::RegionOcrFailed { index: 3, .. })));
            } else {
                assert_eq!(result.as_ref().unwrap(), &format!("5x10 {}", i * 10));
            }
        }
    }

    #[test]
    fn test_expired_deadline_is_timeout() {
        let ocr = ProbeOcr {
            fail_on_red: None,
            delay: Duration::ZERO,
        };
        let page = gradient_page();
        let result = RegionExtractor::new(&ocr)
            .with_deadline(Some(Deadline::after(Duration::ZERO)))
            .extract_regions(&page, &[rect(0, 10)]);
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[test]
    fn test_no_regions() {
        let ocr = ProbeOcr {
            fail_on_red: None,
            delay: Duration::ZERO,
        };
        let results = RegionExtractor::new(&ocr)
            .with_workers(8)
            .extract_regions(&gradient_page(), &[])
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_crop_retention() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = ProbeOcr {
            fail_on_red: None,
            delay: Duration::ZERO,
        };
        RegionExtractor::new(&ocr)
            .with_crop_dir(Some(dir.path()))
            .extract_regions(&gradient_page(), &[rect(0, 10), rect(20, 40)])
            .unwrap();
        assert!(dir.path().join("region_1.png").exists());
        assert!(dir.path().join("region_2.png").exists());
    }
}
