//! Performance benchmarks for the PDF table extractor
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdf_table_extractor::pdf::{detect_tables, CharInfo, PageImage, TableDetectionConfig};
use pdf_table_extractor::region::{map_to_pixels, DisplayRect, DisplayTransform};
use pdf_table_extractor::table::reconstruct;
use pdf_table_extractor::workbook::write_workbook;
use pdf_table_extractor::TableRecord;

/// OCR-like text: `rows` lines of `cols` whitespace-separated cells
fn ocr_text(rows: usize, cols: usize) -> String {
    (0..rows)
        .map(|r| {
            (0..cols)
                .map(|c| format!("r{}c{}", r, c))
                .collect::<Vec<_>>()
                .join("   ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Characters of a `rows` x `cols` grid laid out like a PDF text layer
fn grid_chars(rows: usize, cols: usize) -> Vec<CharInfo> {
    let mut chars = Vec::new();
    for r in 0..rows {
        let y = 780.0 - r as f32 * 12.0;
        for c in 0..cols {
            let x = 40.0 + c as f32 * 90.0;
            for (i, ch) in format!("v{}", r * cols + c).chars().enumerate() {
                chars.push(CharInfo {
                    char: ch,
                    x: x + i as f32 * 6.0,
                    y,
                    width: 6.0,
                    height: 10.0,
                });
            }
        }
    }
    chars
}

fn bench_reconstruct(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruct");

    for rows in [10, 100, 1000] {
        let text = ocr_text(rows, 6);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &text, |b, text| {
            b.iter(|| reconstruct(black_box(text)));
        });
    }

    group.finish();
}

fn bench_map_to_pixels(c: &mut Criterion) {
    let page = PageImage::new(
        image::DynamicImage::ImageRgb8(image::RgbImage::new(1700, 2200)),
        0,
        200.0 / 72.0,
    )
    .unwrap();
    let rect = DisplayRect::new(520.0, 40.0, 30.0, 410.0);
    let transform = DisplayTransform::preview_pixels(1.5)
        .with_origin(12.0, 8.0)
        .with_y_up(true);

    c.bench_function("map_to_pixels", |b| {
        b.iter(|| map_to_pixels(black_box(&rect), black_box(&page), black_box(&transform)));
    });
}

fn bench_detect_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_tables");
    let config = TableDetectionConfig::default();

    for rows in [20, 60] {
        let chars = grid_chars(rows, 6);
        group.throughput(Throughput::Elements(chars.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &chars, |b, chars| {
            b.iter(|| detect_tables(black_box(chars.clone()), &config));
        });
    }

    group.finish();
}

fn bench_write_workbook(c: &mut Criterion) {
    let tables: Vec<TableRecord> = (0..5).map(|_| reconstruct(&ocr_text(200, 8))).collect();

    c.bench_function("write_workbook_5x200x8", |b| {
        b.iter(|| write_workbook(black_box(&tables)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_reconstruct,
    bench_map_to_pixels,
    bench_detect_tables,
    bench_write_workbook,
);

criterion_main!(benches);
