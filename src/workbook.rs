//! XLSX serialization of extracted tables

use crate::error::{Error, Result};
use crate::table::TableRecord;
use rust_xlsxwriter::Workbook;
use std::path::Path;

/// MIME type of the generated workbook
pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Worksheet name for the table at `index`
pub fn sheet_name(index: usize) -> String {
    format!("Table_{}", index)
}

fn build_workbook(tables: &[TableRecord]) -> Result<Workbook> {
    // An XLSX file needs at least one sheet, which would have no table behind it
    if tables.is_empty() {
        return Err(Error::NoTablesFound);
    }

    let mut workbook = Workbook::new();

    // One sheet per table, empty tables included, so sheet N is always table N
    for (index, table) in tables.iter().enumerate() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name(index))?;

        for (row_index, row) in table.rows.iter().enumerate() {
            let row_num = u32::try_from(row_index).map_err(|_| Error::InvalidRequest {
                reason: format!("table {} has too many rows", index),
            })?;
            for (col_index, cell) in row.iter().enumerate() {
                let col_num = u16::try_from(col_index).map_err(|_| Error::InvalidRequest {
                    reason: format!("table {} has too many columns", index),
                })?;
                worksheet.write_string(row_num, col_num, cell)?;
            }
        }
    }

    Ok(workbook)
}

/// Serialize tables to an in-memory XLSX file
pub fn write_workbook(tables: &[TableRecord]) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(tables)?;
    let bytes = workbook.save_to_buffer()?;
    tracing::debug!(sheets = tables.len(), bytes = bytes.len(), "wrote workbook");
    Ok(bytes)
}

/// Serialize tables to an XLSX file at `path`
pub fn write_workbook_to_path(tables: &[TableRecord], path: &Path) -> Result<()> {
    let mut workbook = build_workbook(tables)?;
    workbook.save(path)?;
    Ok(())
}
