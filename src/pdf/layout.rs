//! Layout-aware table extraction from the PDF text layer
//!
//! Used by the all-pages and page-subset modes. Characters are grouped into
//! lines by their vertical position, each line is cut into cells at wide
//! horizontal gaps, and runs of consecutive multi-cell lines become tables.
//! This only works for documents with a text layer; scanned pages need the
//! manual OCR region mode instead.

use crate::error::{Error, Result};
use crate::pdf::document::{create_pdfium, load_document, validate_pdf_header};
use crate::table::TableRecord;
use pdfium_render::prelude::*;

/// Extracts tables from whole pages using document layout
pub trait TableExtractor: Send + Sync {
    /// Extract tables from every page
    fn extract_all_tables(&self, data: &[u8], password: Option<&str>)
        -> Result<Vec<TableRecord>>;

    /// Extract tables from the given 1-based page numbers
    fn extract_tables_for_pages(
        &self,
        data: &[u8],
        password: Option<&str>,
        pages: &[usize],
    ) -> Result<Vec<TableRecord>>;
}

/// Character information for layout analysis
#[derive(Debug, Clone)]
pub struct CharInfo {
    /// The character
    pub char: char,
    /// X coordinate (left)
    pub x: f32,
    /// Y coordinate (top, PDF space: grows upward)
    pub y: f32,
    /// Character width
    pub width: f32,
    /// Character height (used for font size estimation)
    pub height: f32,
}

/// A line of characters sharing a baseline
#[derive(Debug, Clone)]
struct LineInfo {
    chars: Vec<CharInfo>,
    y: f32,
    avg_height: f32,
}

/// A line cut into cells
#[derive(Debug, Clone)]
struct CellLine {
    cells: Vec<String>,
    y: f32,
    avg_height: f32,
}

/// Tuning for stream-mode table detection
#[derive(Debug, Clone)]
pub struct TableDetectionConfig {
    /// Horizontal gap, in multiples of the median glyph height, that separates cells
    pub column_gap_factor: f32,
    /// Vertical gap, in multiples of line height, that ends a table
    pub row_gap_factor: f32,
    /// Minimum cells for a line to count as a table row
    pub min_columns: usize,
    /// Minimum rows for a run of lines to count as a table
    pub min_rows: usize,
}

impl Default for TableDetectionConfig {
    fn default() -> Self {
        Self {
            column_gap_factor: 1.0,
            row_gap_factor: 2.5,
            min_columns: 2,
            min_rows: 2,
        }
    }
}

/// [`TableExtractor`] backed by PDFium character geometry
#[derive(Debug, Clone, Default)]
pub struct PdfiumTableExtractor {
    config: TableDetectionConfig,
}

impl PdfiumTableExtractor {
    pub fn new(config: TableDetectionConfig) -> Self {
        Self { config }
    }

    fn extract(
        &self,
        data: &[u8],
        password: Option<&str>,
        page_numbers: Option<&[usize]>,
    ) -> Result<Vec<TableRecord>> {
        validate_pdf_header(data)?;
        let pdfium = create_pdfium()?;
        let document = load_document(&pdfium, data, password)?;

        let pages = document.pages();
        let page_count = pages.len() as usize;

        let pages_to_process: Vec<usize> = match page_numbers {
            Some(nums) => nums
                .iter()
                .filter(|&&n| n >= 1 && n <= page_count)
                .copied()
                .collect(),
            None => (1..=page_count).collect(),
        };

        let mut tables = Vec::new();
        for page_num in pages_to_process {
            let page = pages.get((page_num - 1) as u16).map_err(|e| Error::Pdfium {
                reason: format!("Failed to get page {}: {}", page_num, e),
            })?;

            let chars = chars_or_skip(
                page_num,
                page.text().map(|text| collect_chars_with_info(&text)),
            );

            let page_tables = detect_tables(chars, &self.config);
            tracing::debug!(page = page_num, tables = page_tables.len(), "scanned page");
            tables.extend(page_tables);
        }

        Ok(tables)
    }
}

impl TableExtractor for PdfiumTableExtractor {
    fn extract_all_tables(
        &self,
        data: &[u8],
        password: Option<&str>,
    ) -> Result<Vec<TableRecord>> {
        self.extract(data, password, None)
    }

    fn extract_tables_for_pages(
        &self,
        data: &[u8],
        password: Option<&str>,
        pages: &[usize],
    ) -> Result<Vec<TableRecord>> {
        self.extract(data, password, Some(pages))
    }
}

/// A page whose text layer cannot be read contributes no characters
fn chars_or_skip<E: std::fmt::Display>(
    page_num: usize,
    chars: std::result::Result<Vec<CharInfo>, E>,
) -> Vec<CharInfo> {
    chars.unwrap_or_else(|e| {
        tracing::warn!(page = page_num, error = %e, "page text unavailable, skipping");
        Vec::new()
    })
}

/// Collect character information from page text
fn collect_chars_with_info(text_obj: &PdfPageText) -> Vec<CharInfo> {
    let mut chars = Vec::new();

    for segment in text_obj.segments().iter() {
        if let Ok(char_iter) = segment.chars() {
            for char_result in char_iter.iter() {
                if let Some(c) = char_result.unicode_char() {
                    if let Ok(bounds) = char_result.loose_bounds() {
                        chars.push(CharInfo {
                            char: c,
                            x: bounds.left().value,
                            y: bounds.top().value,
                            width: bounds.width().value,
                            height: bounds.height().value,
                        });
                    }
                }
            }
        }
    }

    chars
}

/// Find tables in a page's characters
pub fn detect_tables(chars: Vec<CharInfo>, config: &TableDetectionConfig) -> Vec<TableRecord> {
    if chars.is_empty() {
        return Vec::new();
    }

    let (y_tolerance, space_threshold, median_height) = calculate_dynamic_thresholds(&chars);
    let column_gap = (median_height * config.column_gap_factor).max(space_threshold * 2.0);

    let lines: Vec<CellLine> = group_into_lines(chars, y_tolerance)
        .into_iter()
        .map(|line| CellLine {
            cells: split_cells(&line.chars, space_threshold, column_gap),
            y: line.y,
            avg_height: line.avg_height,
        })
        .collect();

    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();
    let mut prev: Option<(f32, f32)> = None;

    for line in lines {
        let is_row = line.cells.len() >= config.min_columns;
        let too_far = prev.is_some_and(|(py, ph)| {
            py - line.y > ph.max(line.avg_height) * config.row_gap_factor
        });

        if !is_row || too_far {
            flush_table(&mut current, &mut tables, config.min_rows);
        }

        if is_row {
            current.push(line.cells);
            prev = Some((line.y, line.avg_height));
        } else {
            prev = None;
        }
    }
    flush_table(&mut current, &mut tables, config.min_rows);

    tables
}

fn flush_table(current: &mut Vec<Vec<String>>, tables: &mut Vec<TableRecord>, min_rows: usize) {
    if current.len() >= min_rows {
        tables.push(TableRecord::new(std::mem::take(current)));
    } else {
        current.clear();
    }
}

/// Line tolerance, word-space threshold, and median glyph height
fn calculate_dynamic_thresholds(chars: &[CharInfo]) -> (f32, f32, f32) {
    // Calculate median height as the representative font size
    let mut heights: Vec<f32> = chars
        .iter()
        .filter(|c| c.height > 0.0)
        .map(|c| c.height)
        .collect();

    if heights.is_empty() {
        return (5.0, 3.0, 10.0);
    }

    heights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_height = heights[heights.len() / 2];

    // ~40% of font height absorbs baseline jitter; ~30% separates words
    let y_tolerance = median_height * 0.4;
    let space_threshold = median_height * 0.3;

    (y_tolerance.max(2.0), space_threshold.max(1.0), median_height)
}

/// Group characters into lines based on Y-coordinate proximity
fn group_into_lines(chars: Vec<CharInfo>, y_tolerance: f32) -> Vec<LineInfo> {
    // Sort by Y descending (top to bottom), then X ascending
    let mut sorted_chars = chars;
    sorted_chars.sort_by(|a, b| {
        let y_cmp = b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal);
        if y_cmp == std::cmp::Ordering::Equal {
            a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            y_cmp
        }
    });

    let mut lines: Vec<LineInfo> = Vec::new();
    let mut current_chars: Vec<CharInfo> = Vec::new();
    let mut current_y: Option<f32> = None;

    for char_info in sorted_chars {
        match current_y {
            Some(cur_y) if (cur_y - char_info.y).abs() <= y_tolerance => {
                current_chars.push(char_info);
            }
            _ => {
                if !current_chars.is_empty() {
                    lines.push(create_line_info(std::mem::take(&mut current_chars)));
                }
                current_y = Some(char_info.y);
                current_chars.push(char_info);
            }
        }
    }

    if !current_chars.is_empty() {
        lines.push(create_line_info(current_chars));
    }

    lines
}

fn create_line_info(mut chars: Vec<CharInfo>) -> LineInfo {
    chars.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));

    let avg_height = chars.iter().map(|c| c.height).sum::<f32>() / chars.len() as f32;
    let y = chars.iter().map(|c| c.y).fold(f32::MIN, f32::max);

    LineInfo {
        chars,
        y,
        avg_height,
    }
}

/// Cut a line (sorted by x) into cells at gaps wider than `column_gap`
fn split_cells(chars: &[CharInfo], space_threshold: f32, column_gap: f32) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut prev_right: Option<f32> = None;

    for c in chars.iter().filter(|c| !c.char.is_whitespace()) {
        if let Some(right) = prev_right {
            let gap = c.x - right;
            if gap > column_gap {
                cells.push(std::mem::take(&mut cell));
            } else if gap > space_threshold {
                cell.push(' ');
            }
        }
        cell.push(c.char);
        prev_right = Some(c.x + c.width);
    }

    if !cell.is_empty() {
        cells.push(cell);
    }

    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SIZE: f32 = 10.0;
    const ADVANCE: f32 = 6.0;

    /// Lay out `text` starting at `x` on a line whose top is `y`
    fn word(text: &str, x: f32, y: f32) -> Vec<CharInfo> {
        text.chars()
            .enumerate()
            .map(|(i, c)| CharInfo {
                char: c,
                x: x + i as f32 * ADVANCE,
                y,
                width: ADVANCE,
                height: SIZE,
            })
            .collect()
    }

    fn row(cells: &[(&str, f32)], y: f32) -> Vec<CharInfo> {
        cells.iter().flat_map(|(t, x)| word(t, *x, y)).collect()
    }

    #[test]
    fn test_detect_simple_table() {
        let mut chars = Vec::new();
        chars.extend(row(&[("Item", 50.0), ("Qty", 200.0)], 700.0));
        chars.extend(row(&[("Bolt", 50.0), ("12", 200.0)], 686.0));
        chars.extend(row(&[("Nut", 50.0), ("7", 200.0)], 672.0));

        let tables = detect_tables(chars, &TableDetectionConfig::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0],
            TableRecord::from(vec![
                vec!["Item", "Qty"],
                vec!["Bolt", "12"],
                vec!["Nut", "7"],
            ])
        );
    }

    #[test]
    fn test_words_within_cell_keep_spaces() {
        let mut chars = Vec::new();
        // "Hex bolt" has a small (word) gap; the quantity column is far away.
        chars.extend(word("Hex", 50.0, 700.0));
        chars.extend(word("bolt", 50.0 + 3.0 * ADVANCE + 4.0, 700.0));
        chars.extend(word("3", 250.0, 700.0));
        chars.extend(row(&[("Washer", 50.0), ("9", 250.0)], 686.0));

        let tables = detect_tables(chars, &TableDetectionConfig::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[0], vec!["Hex bolt".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_prose_lines_are_not_tables() {
        let mut chars = Vec::new();
        chars.extend(word("Introduction", 50.0, 700.0));
        chars.extend(word("Paragraph", 50.0, 686.0));
        assert!(detect_tables(chars, &TableDetectionConfig::default()).is_empty());
    }

    #[test]
    fn test_vertical_gap_splits_tables() {
        let mut chars = Vec::new();
        chars.extend(row(&[("A", 50.0), ("1", 200.0)], 700.0));
        chars.extend(row(&[("B", 50.0), ("2", 200.0)], 686.0));
        // Large gap before the second table
        chars.extend(row(&[("C", 50.0), ("3", 200.0)], 500.0));
        chars.extend(row(&[("D", 50.0), ("4", 200.0)], 486.0));

        let tables = detect_tables(chars, &TableDetectionConfig::default());
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].rows[0], vec!["C".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_single_row_is_not_a_table() {
        let chars = row(&[("Total", 50.0), ("42", 200.0)], 700.0);
        assert!(detect_tables(chars, &TableDetectionConfig::default()).is_empty());
    }

    #[test]
    fn test_unreadable_page_text_contributes_nothing() {
        let chars = chars_or_skip(4, Err::<Vec<CharInfo>, _>("text layer is corrupt"));
        assert!(chars.is_empty());

        let readable = chars_or_skip(1, Ok::<_, String>(word("ok", 0.0, 10.0)));
        assert_eq!(readable.len(), 2);
    }

    #[test]
    fn test_empty_page() {
        assert!(detect_tables(Vec::new(), &TableDetectionConfig::default()).is_empty());
    }

    #[test]
    fn test_group_into_lines_tolerates_baseline_jitter() {
        let mut chars = word("ab", 0.0, 100.0);
        chars.extend(word("cd", 30.0, 101.5));
        let lines = group_into_lines(chars, 4.0);
        assert_eq!(lines.len(), 1);
        let text: String = lines[0].chars.iter().map(|c| c.char).collect();
        assert_eq!(text, "abcd");
    }
}
