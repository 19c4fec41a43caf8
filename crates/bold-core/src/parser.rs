//! TSV/CSV readers for BOLD specimen exports
//!
//! Two file flavors exist in the wild:
//! - plain exports with headers in the first row;
//! - BOLD custom-field exports carrying a *machine-readable header row* of
//!   column UUIDs in row 1, with the human-readable headers in row 2.

use crate::error::{Error, Result};
use crate::table::Table;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Canonical name of the sample identifier column after standardization
pub const SAMPLE_ID: &str = "Sample ID";

/// Accepted spellings of the sample identifier column
pub const SAMPLE_ID_VARIANTS: &[&str] = &["Sample ID", "SampleID", "sample_id", "sampleid"];

/// Cross-dataset merges additionally accept process identifiers as the key
pub const EXTENDED_SAMPLE_ID_VARIANTS: &[&str] = &[
    "Sample ID",
    "SampleID",
    "sample_id",
    "sampleid",
    "Process ID",
    "ProcessID",
];

/// Mapping from human-readable header to column UUID
pub type UuidMap = BTreeMap<String, String>;

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => b',',
        _ => b'\t',
    }
}

/// Read every record of a delimited file as raw string cells
pub fn read_records(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        records.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(records)
}

fn records_from_str(content: &str, delimiter: u8, path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        records.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(records)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unnamed>")
        .to_string()
}

/// Build a table from raw records, taking `records[header_row]` as the
/// header and everything after it as data.
pub fn table_from_records(
    path: &Path,
    records: &[Vec<String>],
    header_row: usize,
) -> Result<Table> {
    let columns = records.get(header_row).cloned().ok_or_else(|| Error::EmptyTable {
        path: path.to_path_buf(),
        message: format!("expected a header in row {}", header_row + 1),
    })?;

    if columns.is_empty() {
        return Err(Error::EmptyTable {
            path: path.to_path_buf(),
            message: "no columns found".to_string(),
        });
    }

    let rows = records[header_row + 1..].to_vec();
    Ok(Table::new(file_name_of(path), path.to_path_buf(), columns, rows))
}

/// Read a table with headers in the first row. Delimiter is inferred from
/// the extension (`.csv` -> comma, anything else -> tab).
pub fn read_table(path: &Path) -> Result<Table> {
    let records = read_records(path)?;
    table_from_records(path, &records, 0)
}

/// Parse a table from an in-memory string (useful for testing)
pub fn read_table_str(content: &str, name: &str, delimiter: u8) -> Result<Table> {
    let path = PathBuf::from(name);
    let records = records_from_str(content, delimiter, &path)?;
    table_from_records(&path, &records, 0)
}

/// Read a BOLD-flavor table: machine-readable row 1, headers in row 2.
/// Returns the table and the raw machine-readable row.
pub fn read_bold_table(path: &Path) -> Result<(Table, Vec<String>)> {
    let records = read_records(path)?;
    bold_table_from_records(path, &records)
}

/// BOLD-flavor parse over raw records (see [`read_bold_table`])
pub fn bold_table_from_records(
    path: &Path,
    records: &[Vec<String>],
) -> Result<(Table, Vec<String>)> {
    if records.len() < 2 {
        return Err(Error::EmptyTable {
            path: path.to_path_buf(),
            message: "expected a machine-readable row and a header row".to_string(),
        });
    }
    let machine_row = records[0].clone();
    let table = table_from_records(path, records, 1)?;
    Ok((table, machine_row))
}

/// A 36-character hyphenated value like `d9356cb2-07f4-4b5a-9ab2-0d6d0e01b3f2`
pub fn looks_like_uuid(s: &str) -> bool {
    let t = s.trim();
    t.len() == 36 && t.chars().filter(|c| *c == '-').count() == 4
}

/// Number of UUID-shaped cells in a machine-readable row
pub fn count_uuids(row: &[String]) -> usize {
    row.iter().filter(|c| looks_like_uuid(c)).count()
}

/// Build a header -> UUID mapping by zipping a machine-readable row with
/// the header row. Empty headers and empty UUID cells are skipped.
pub fn uuid_map(machine_row: &[String], headers: &[String]) -> UuidMap {
    let mut map = UuidMap::new();
    for (header, uuid) in headers.iter().zip(machine_row.iter()) {
        let header = header.trim();
        let uuid = uuid.trim();
        if !header.is_empty() && !uuid.is_empty() {
            map.insert(header.to_string(), uuid.to_string());
        }
    }
    map
}

/// Rename the first matching sample-ID variant to the canonical
/// `Sample ID`. Returns the original name of the renamed column, or None if
/// no variant is present.
pub fn standardize_sample_id(table: &mut Table, variants: &[&str]) -> Option<String> {
    for variant in variants {
        if table.has_column(variant) {
            if *variant != SAMPLE_ID {
                table.rename_column(variant, SAMPLE_ID);
                return Some(variant.to_string());
            }
            return Some(SAMPLE_ID.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_table_str_tsv() {
        let tsv = "Sample ID\tCountry\nS1\tNorway\nS2\tSpain\n";
        let table = read_table_str(tsv, "test.tsv", b'\t').unwrap();

        assert_eq!(table.columns, vec!["Sample ID", "Country"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(1, "Country"), Some("Spain"));
    }

    #[test]
    fn test_read_table_str_flexible_rows() {
        let tsv = "A\tB\tC\n1\t2\nx\ty\tz\textra\n";
        let table = read_table_str(tsv, "test.tsv", b'\t').unwrap();

        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        assert_eq!(table.rows[1], vec!["x", "y", "z"]);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let err = read_table_str("", "empty.tsv", b'\t').unwrap_err();
        assert!(matches!(err, Error::EmptyTable { .. }));
    }

    #[test]
    fn test_bold_table_headers_in_row_two() {
        let tsv = "d9356cb2-07f4-4b5a-9ab2-0d6d0e01b3f2\t\nSampleID\tPlate ID\nS1\tP1\n";
        let path = PathBuf::from("merged_custom_fields.tsv");
        let records = records_from_str(tsv, b'\t', &path).unwrap();
        let (table, machine_row) = bold_table_from_records(&path, &records).unwrap();

        assert_eq!(table.columns, vec!["SampleID", "Plate ID"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(count_uuids(&machine_row), 1);
    }

    #[test]
    fn test_looks_like_uuid() {
        assert!(looks_like_uuid("d9356cb2-07f4-4b5a-9ab2-0d6d0e01b3f2"));
        assert!(!looks_like_uuid("Sample ID"));
        assert!(!looks_like_uuid("a-b-c-d-e"));
    }

    #[test]
    fn test_uuid_map_skips_blank_pairs() {
        let machine = vec![
            "d9356cb2-07f4-4b5a-9ab2-0d6d0e01b3f2".to_string(),
            String::new(),
        ];
        let headers = vec!["Plate ID".to_string(), "Well Position".to_string()];
        let map = uuid_map(&machine, &headers);

        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get("Plate ID").map(|s| s.as_str()),
            Some("d9356cb2-07f4-4b5a-9ab2-0d6d0e01b3f2")
        );
    }

    #[test]
    fn test_standardize_sample_id_variants() {
        let tsv = "sample_id\tCountry\nS1\tNorway\n";
        let mut table = read_table_str(tsv, "test.tsv", b'\t').unwrap();
        let renamed = standardize_sample_id(&mut table, SAMPLE_ID_VARIANTS);

        assert_eq!(renamed.as_deref(), Some("sample_id"));
        assert!(table.has_column(SAMPLE_ID));
    }

    #[test]
    fn test_standardize_accepts_process_id_in_extended_set() {
        let tsv = "Process ID\tBIN\nP1\tB1\n";
        let mut table = read_table_str(tsv, "out.tsv", b'\t').unwrap();

        assert!(standardize_sample_id(&mut table, SAMPLE_ID_VARIANTS).is_none());
        let renamed = standardize_sample_id(&mut table, EXTENDED_SAMPLE_ID_VARIANTS);
        assert_eq!(renamed.as_deref(), Some("Process ID"));
    }
}
