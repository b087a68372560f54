//! Tabular records and reconstruction of tables from OCR text

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An extracted table: ordered rows of cell text.
///
/// Rows may have different lengths. OCR output carries no column
/// information, so ragged rows are expected rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableRecord {
    pub rows: Vec<Vec<String>>,
}

impl TableRecord {
    /// Create an empty table (zero rows)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Length of the longest row
    pub fn max_columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

impl<R, C> From<R> for TableRecord
where
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: Into<String>,
{
    fn from(rows: R) -> Self {
        TableRecord {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

/// Rebuild a table from raw OCR text.
///
/// Each non-blank line becomes a row; cells are the whitespace-separated
/// tokens of that line. No cross-row column alignment is attempted.
pub fn reconstruct(raw_text: &str) -> TableRecord {
    let rows = raw_text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect();

    TableRecord { rows }
}
