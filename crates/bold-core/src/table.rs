//! In-memory tabular model for BOLD specimen exports
//!
//! BOLD exports are consumed untyped: every cell is a string, and empty or
//! whitespace-only cells count as missing values for merge purposes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A parsed table from a single TSV/CSV file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// File name (e.g. "taxonomy.tsv"), used in collision suffixes and logs
    pub name: String,
    /// Source file path
    pub source_path: PathBuf,
    /// Column headers, in file order
    pub columns: Vec<String>,
    /// Row data; every row has exactly `columns.len()` cells
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table, padding short rows and truncating long ones so that
    /// every row matches the header width.
    pub fn new(
        name: impl Into<String>,
        source_path: PathBuf,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut cells| {
                while cells.len() < width {
                    cells.push(String::new());
                }
                cells.truncate(width);
                cells
            })
            .collect();

        Self {
            name: name.into(),
            source_path,
            columns,
            rows,
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Find a column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Check whether a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Find a column index by name, or fail with the available columns listed
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| Error::MissingColumn {
            column: name.to_string(),
            path: self.source_path.clone(),
            available: self.columns.join(", "),
        })
    }

    /// Get a cell by row index and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(|s| s.as_str())
    }

    /// Rename a column in place; returns false if the column does not exist
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Check whether any row has a non-empty value in the given column
    pub fn column_has_values(&self, name: &str) -> bool {
        match self.column_index(name) {
            Some(idx) => self.rows.iter().any(|r| !is_empty_cell(&r[idx])),
            None => false,
        }
    }

    /// Drop rows whose key-column value repeats, keeping the first
    /// occurrence. Returns the number of rows removed.
    pub fn dedup_by_column(&mut self, key: &str) -> Result<usize> {
        let idx = self.require_column(key)?;
        let before = self.rows.len();
        let mut seen = std::collections::HashSet::new();
        self.rows.retain(|row| seen.insert(row[idx].clone()));
        Ok(before - self.rows.len())
    }
}

/// Empty or whitespace-only cells count as missing values
pub fn is_empty_cell(s: &str) -> bool {
    s.trim().is_empty()
}

/// Write a table as TSV, creating parent directories as needed. When a
/// machine-readable row is given it is written before the header.
pub fn write_tsv(
    path: &Path,
    machine_row: Option<&[String]>,
    columns: &[String],
    rows: &[Vec<String>],
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = std::fs::File::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(std::io::BufWriter::new(file));

    if let Some(machine_row) = machine_row {
        writer
            .write_record(machine_row)
            .map_err(|e| Error::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
    }
    writer.write_record(columns).map_err(|e| Error::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;
    for row in rows {
        writer.write_record(row).map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            "test.tsv",
            PathBuf::from("test.tsv"),
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_rows_padded_to_header_width() {
        let t = table(&["A", "B", "C"], &[&["1"], &["1", "2", "3", "4"]]);
        assert_eq!(t.rows[0], vec!["1", "", ""]);
        assert_eq!(t.rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_column_lookup() {
        let t = table(&["Sample ID", "Country"], &[&["S1", "Norway"]]);
        assert_eq!(t.column_index("Country"), Some(1));
        assert_eq!(t.get(0, "Country"), Some("Norway"));
        assert!(t.column_index("Region").is_none());
    }

    #[test]
    fn test_require_column_lists_available() {
        let t = table(&["A", "B"], &[]);
        let err = t.require_column("C").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'C'"));
        assert!(msg.contains("A, B"));
    }

    #[test]
    fn test_dedup_keeps_first() {
        let mut t = table(
            &["Sample ID", "Value"],
            &[&["S1", "a"], &["S2", "b"], &["S1", "c"]],
        );
        let removed = t.dedup_by_column("Sample ID").unwrap();
        assert_eq!(removed, 1);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.get(0, "Value"), Some("a"));
    }

    #[test]
    fn test_is_empty_cell() {
        assert!(is_empty_cell(""));
        assert!(is_empty_cell("   "));
        assert!(!is_empty_cell("x"));
    }
}
