//! Country-keyed aggregation feeding the choropleth tool

use crate::error::Result;
use crate::table::{is_empty_cell, Table};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// What to count per country
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountMode {
    /// Count rows per country
    Rows,
    /// Count non-empty values of a column per country
    Values(String),
    /// Count distinct non-empty values of a column per country
    Unique(String),
}

/// Per-country counts, sorted by count descending (ties by name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryCounts {
    entries: Vec<(String, u64)>,
}

impl CountryCounts {
    pub fn iter(&self) -> impl Iterator<Item = &(String, u64)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, country: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(name, _)| name == country)
            .map(|(_, count)| *count)
    }

    /// Largest single count, or 0 when empty
    pub fn max(&self) -> u64 {
        self.entries.first().map(|(_, c)| *c).unwrap_or(0)
    }

    /// The top `n` entries
    pub fn top(&self, n: usize) -> &[(String, u64)] {
        &self.entries[..self.entries.len().min(n)]
    }
}

/// Format a count with thousands separators (1234567 -> "1,234,567")
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Aggregate a table into per-country counts. Rows with an empty country
/// cell are dropped first.
pub fn country_counts(table: &Table, country_column: &str, mode: &CountMode) -> Result<CountryCounts> {
    let country_idx = table.require_column(country_column)?;
    let value_idx = match mode {
        CountMode::Rows => None,
        CountMode::Values(col) | CountMode::Unique(col) => Some(table.require_column(col)?),
    };

    let total = table.row_count();
    let kept = table
        .rows
        .iter()
        .filter(|r| !is_empty_cell(&r[country_idx]))
        .count();
    info!(
        "{} rows in dataset, {} after removing empty countries",
        total, kept
    );

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut unique: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for row in &table.rows {
        let country = row[country_idx].trim();
        if country.is_empty() {
            continue;
        }

        match (mode, value_idx) {
            (CountMode::Rows, _) => {
                *counts.entry(country.to_string()).or_insert(0) += 1;
            }
            (CountMode::Values(_), Some(idx)) => {
                if !is_empty_cell(&row[idx]) {
                    *counts.entry(country.to_string()).or_insert(0) += 1;
                }
            }
            (CountMode::Unique(_), Some(idx)) => {
                if !is_empty_cell(&row[idx]) {
                    unique
                        .entry(country.to_string())
                        .or_default()
                        .insert(row[idx].trim().to_string());
                }
            }
            _ => unreachable!("value column resolved above"),
        }
    }

    if matches!(mode, CountMode::Unique(_)) {
        for (country, values) in unique {
            counts.insert(country, values.len() as u64);
        }
    }

    let mut entries: Vec<(String, u64)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(CountryCounts { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_table_str;

    fn table() -> Table {
        let csv = "Sample ID,Country,Species\n\
                   S1,Norway,Salmo salar\n\
                   S2,Norway,Salmo salar\n\
                   S3,Norway,\n\
                   S4,Spain,Lynx pardinus\n\
                   S5,,Unplaced\n";
        read_table_str(csv, "samples.csv", b',').unwrap()
    }

    #[test]
    fn test_row_counts_drop_empty_countries() {
        let counts = country_counts(&table(), "Country", &CountMode::Rows).unwrap();

        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get("Norway"), Some(3));
        assert_eq!(counts.get("Spain"), Some(1));
    }

    #[test]
    fn test_value_counts_skip_empty_cells() {
        let counts =
            country_counts(&table(), "Country", &CountMode::Values("Species".to_string()))
                .unwrap();

        assert_eq!(counts.get("Norway"), Some(2));
        assert_eq!(counts.get("Spain"), Some(1));
    }

    #[test]
    fn test_unique_counts_distinct_values() {
        let counts =
            country_counts(&table(), "Country", &CountMode::Unique("Species".to_string()))
                .unwrap();

        // Two Norway rows share one species
        assert_eq!(counts.get("Norway"), Some(1));
        assert_eq!(counts.get("Spain"), Some(1));
    }

    #[test]
    fn test_sorted_descending_then_by_name() {
        let csv = "Country\nB\nA\nA\nC\n";
        let t = read_table_str(csv, "x.csv", b',').unwrap();
        let counts = country_counts(&t, "Country", &CountMode::Rows).unwrap();

        let names: Vec<&str> = counts.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(counts.max(), 2);
    }

    #[test]
    fn test_missing_country_column_is_an_error() {
        let err = country_counts(&table(), "Region", &CountMode::Rows).unwrap_err();
        assert!(err.to_string().contains("Region"));
        assert!(err.to_string().contains("Country"));
    }

    #[test]
    fn test_missing_count_column_is_an_error() {
        let err =
            country_counts(&table(), "Country", &CountMode::Values("Missing".to_string()))
                .unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }
}
