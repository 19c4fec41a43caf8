//! Plate-ID-keyed taxonomy extraction
//!
//! Searches subdirectories for the `merged_custom_fields.tsv` /
//! `taxonomy.tsv` / `lab.tsv` triplet, selects custom-field rows belonging
//! to the requested plates, and joins them with taxonomy and lab data to
//! recover the Process ID for each well.

use crate::error::{Error, Result};
use crate::parser;
use crate::scanner::{scan_triplets, Triplet};
use crate::table::{is_empty_cell, write_tsv, Table};
use std::path::Path;
use tracing::{info, warn};

/// Leading columns of the extractor output, in order
const LEAD_COLUMNS: &[&str] = &["Process ID", "Plate_Well", "Sample ID"];

/// One matched record: process/plate/sample identifiers plus the taxonomy
/// columns of the matched row.
#[derive(Debug, Clone)]
pub struct TaxonomyMatch {
    pub process_id: String,
    pub plate_well: String,
    pub sample_id: String,
    /// (column name, value) pairs from taxonomy.tsv, excluding Sample ID
    pub taxonomy: Vec<(String, String)>,
}

/// Accumulated extraction result across all triplet directories
#[derive(Debug, Clone, Default)]
pub struct TaxonomyExtract {
    /// Final column order: the lead columns, then taxonomy columns in
    /// first-seen order
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Directories that were processed
    pub directories: usize,
}

impl TaxonomyExtract {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Write the extraction as a TSV file
    pub fn write(&self, path: &Path) -> Result<()> {
        write_tsv(path, None, &self.columns, &self.rows)
    }
}

/// Extract taxonomy records for the given plate IDs from every triplet
/// directory under `base_dir`.
pub fn extract_taxonomy(base_dir: &Path, plate_ids: &[String]) -> Result<TaxonomyExtract> {
    let triplets = scan_triplets(base_dir)?;
    if triplets.is_empty() {
        return Err(Error::NoTriplets(base_dir.to_path_buf()));
    }
    info!(
        "found {} directories with all three required TSV files",
        triplets.len()
    );

    let mut matches: Vec<TaxonomyMatch> = Vec::new();
    let mut directories = 0;
    for triplet in &triplets {
        info!("processing {}", triplet.dir.display());
        match extract_from_triplet(triplet, plate_ids) {
            Ok(found) => {
                directories += 1;
                if !found.is_empty() {
                    info!("found {} matching records", found.len());
                }
                matches.extend(found);
            }
            Err(e) => warn!("skipping {}: {}", triplet.dir.display(), e),
        }
    }

    Ok(collect_rows(matches, directories))
}

/// Match records within a single triplet directory
pub fn extract_from_triplet(triplet: &Triplet, plate_ids: &[String]) -> Result<Vec<TaxonomyMatch>> {
    // The custom-fields file carries the machine-readable row; skip it
    let (custom, _machine_row) = parser::read_bold_table(&triplet.custom_fields)?;
    let taxonomy = parser::read_table(&triplet.taxonomy)?;
    let lab = parser::read_table(&triplet.lab)?;

    Ok(match_records(&custom, &taxonomy, &lab, plate_ids))
}

/// Join custom-field rows against taxonomy and lab tables.
///
/// Two custom-field layouts exist: either `Plate ID` is populated, or the
/// plate must be derived from a `SampleID` shaped like `BGE_00841_A1`.
pub fn match_records(
    custom: &Table,
    taxonomy: &Table,
    lab: &Table,
    plate_ids: &[String],
) -> Vec<TaxonomyMatch> {
    let mut results = Vec::new();

    let Some(sample_idx) = custom.column_index("SampleID") else {
        warn!(
            "no SampleID column in {} (available: {})",
            custom.name,
            custom.columns.join(", ")
        );
        return results;
    };

    // (sample_id, plate_well) pairs for rows on the requested plates
    let mut selected: Vec<(String, String)> = Vec::new();

    if custom.column_has_values("Plate ID") {
        let plate_idx = custom.column_index("Plate ID").expect("checked above");
        let well_idx = custom.column_index("Well Position");
        for row in &custom.rows {
            let plate = row[plate_idx].trim();
            if plate_ids.iter().any(|p| p == plate) {
                let well = well_idx.map(|i| row[i].trim()).unwrap_or("");
                selected.push((row[sample_idx].clone(), format!("{}_{}", plate, well)));
            }
        }
    } else {
        for row in &custom.rows {
            let sample_id = row[sample_idx].trim();
            if let Some(plate) = plate_from_sample_id(sample_id) {
                if plate_ids.iter().any(|p| *p == plate) {
                    // SampleID is already in Plate_Well form here
                    selected.push((sample_id.to_string(), sample_id.to_string()));
                }
            }
        }
    }

    let tax_key = taxonomy.column_index("Sample ID");
    let lab_key = lab.column_index("Sample ID");
    let lab_process = lab.column_index("Process ID");

    for (sample_id, plate_well) in selected {
        let Some(tax_key) = tax_key else { continue };

        // SampleID first, then the Plate_Well form
        let tax_row = taxonomy
            .rows
            .iter()
            .find(|r| r[tax_key] == sample_id)
            .or_else(|| taxonomy.rows.iter().find(|r| r[tax_key] == plate_well));

        let Some(tax_row) = tax_row else { continue };
        let tax_sample_id = tax_row[tax_key].clone();

        let process_id = match (lab_key, lab_process) {
            (Some(k), Some(p)) => lab
                .rows
                .iter()
                .find(|r| r[k] == tax_sample_id)
                .map(|r| r[p].clone())
                .unwrap_or_default(),
            _ => String::new(),
        };

        let taxonomy_cells: Vec<(String, String)> = taxonomy
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != tax_key)
            .map(|(i, col)| (col.clone(), tax_row[i].clone()))
            .collect();

        results.push(TaxonomyMatch {
            process_id,
            plate_well,
            sample_id: tax_sample_id,
            taxonomy: taxonomy_cells,
        });
    }

    results
}

/// Extract the plate prefix from a sample ID like `BGE_00841_A1`
pub fn plate_from_sample_id(sample_id: &str) -> Option<String> {
    if is_empty_cell(sample_id) {
        return None;
    }
    let parts: Vec<&str> = sample_id.split('_').collect();
    if parts.len() >= 2 && parts[0] == "BGE" {
        Some(format!("{}_{}", parts[0], parts[1]))
    } else {
        None
    }
}

/// Assemble matches into a single table, unioning taxonomy columns in
/// first-seen order.
fn collect_rows(matches: Vec<TaxonomyMatch>, directories: usize) -> TaxonomyExtract {
    let mut columns: Vec<String> = LEAD_COLUMNS.iter().map(|c| c.to_string()).collect();
    for m in &matches {
        for (col, _) in &m.taxonomy {
            if !columns.iter().any(|c| c == col) {
                columns.push(col.clone());
            }
        }
    }

    let rows = matches
        .into_iter()
        .map(|m| {
            let mut row = vec![String::new(); columns.len()];
            row[0] = m.process_id;
            row[1] = m.plate_well;
            row[2] = m.sample_id;
            for (col, value) in m.taxonomy {
                if let Some(idx) = columns.iter().position(|c| *c == col) {
                    row[idx] = value;
                }
            }
            row
        })
        .collect();

    TaxonomyExtract {
        columns,
        rows,
        directories,
    }
}
