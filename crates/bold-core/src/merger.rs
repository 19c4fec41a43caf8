//! Dataset-level merge: N related BOLD export TSVs -> one merged TSV
//!
//! All exports in a folder are outer-joined on the `Sample ID` column, in
//! the fixed BOLD file order. Colliding column names from later files get a
//! `_<filename>` suffix, duplicate fields are reconciled (the non-lab.tsv
//! version wins), and the machine-readable UUID row of
//! `merged_custom_fields.tsv` is re-aligned to the final column order.

use crate::error::{Error, Result};
use crate::parser::{
    self, UuidMap, SAMPLE_ID, SAMPLE_ID_VARIANTS,
};
use crate::scanner::{scan_tsv_folder, CUSTOM_FIELDS_FILE};
use crate::table::{is_empty_cell, write_tsv, Table};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Fields that several exports carry; the non-lab.tsv version is kept
const DUPLICATE_PREFERENCE_FIELDS: &[&str] = &[
    "Collection Date",
    "Life Stage",
    "Extra Info",
    "Notes",
    "Field ID",
];

/// A growing outer-join frame keyed by `Sample ID`
#[derive(Debug, Clone)]
pub struct MergedFrame {
    /// Column headers, in merge order
    pub columns: Vec<String>,
    /// Row data; every row has exactly `columns.len()` cells
    pub rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl MergedFrame {
    /// Seed the frame with the first table. The table must carry a
    /// `Sample ID` column.
    pub fn from_table(table: Table) -> Result<Self> {
        let key = table.require_column(SAMPLE_ID)?;
        let mut index = HashMap::new();
        for (i, row) in table.rows.iter().enumerate() {
            index.entry(row[key].clone()).or_insert(i);
        }
        Ok(Self {
            columns: table.columns,
            rows: table.rows,
            index,
        })
    }

    fn key_index(&self) -> usize {
        // Sample ID is guaranteed by construction and never dropped
        self.columns
            .iter()
            .position(|c| c == SAMPLE_ID)
            .expect("merged frame lost its Sample ID column")
    }

    /// Number of distinct `Sample ID` values
    pub fn unique_keys(&self) -> usize {
        self.index.len()
    }

    /// Find a column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Outer-join another table on `Sample ID`. Columns whose name already
    /// exists in the frame are added under `<name><suffix>`; rows whose key
    /// is new are appended with empty cells for all prior columns.
    pub fn outer_join(&mut self, table: &Table, suffix: &str) -> Result<()> {
        let in_key = table.require_column(SAMPLE_ID)?;
        let self_key = self.key_index();

        let mut incoming: Vec<(usize, String)> = Vec::new();
        for (i, col) in table.columns.iter().enumerate() {
            if i == in_key {
                continue;
            }
            let name = if self.columns.iter().any(|c| c == col) {
                format!("{}{}", col, suffix)
            } else {
                col.clone()
            };
            incoming.push((i, name));
        }

        let old_width = self.columns.len();
        for (_, name) in &incoming {
            self.columns.push(name.clone());
        }
        let new_width = self.columns.len();
        for row in &mut self.rows {
            row.resize(new_width, String::new());
        }

        for row in &table.rows {
            let key = &row[in_key];
            match self.index.get(key) {
                Some(&r) => {
                    for (j, (i, _)) in incoming.iter().enumerate() {
                        self.rows[r][old_width + j] = row[*i].clone();
                    }
                }
                None => {
                    let mut cells = vec![String::new(); new_width];
                    cells[self_key] = key.clone();
                    for (j, (i, _)) in incoming.iter().enumerate() {
                        cells[old_width + j] = row[*i].clone();
                    }
                    self.index.insert(key.clone(), self.rows.len());
                    self.rows.push(cells);
                }
            }
        }

        Ok(())
    }

    /// Drop a column by name; returns false if it does not exist
    pub fn drop_column(&mut self, name: &str) -> bool {
        match self.column_index(name) {
            Some(idx) => {
                self.columns.remove(idx);
                for row in &mut self.rows {
                    row.remove(idx);
                }
                true
            }
            None => false,
        }
    }

    /// Rename a column in place; returns false if it does not exist
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Reorder columns to the given permutation of the current names
    pub fn reorder_columns(&mut self, order: &[String]) {
        let perm: Vec<usize> = order
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        debug_assert_eq!(perm.len(), self.columns.len());

        self.columns = perm.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = perm.iter().map(|&i| row[i].clone()).collect();
        }
    }

    /// Move a column to the front, preserving the rest of the order
    pub fn move_column_first(&mut self, name: &str) {
        if self.column_index(name).is_none() {
            return;
        }
        let mut order: Vec<String> = vec![name.to_string()];
        order.extend(self.columns.iter().filter(|c| *c != name).cloned());
        self.reorder_columns(&order);
    }
}

/// Summary of a merge run
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    /// File names that contributed to the merge, in merge order
    pub files_processed: Vec<String>,
    /// Distinct `Sample ID` values in the output
    pub unique_sample_ids: usize,
    /// Rows in the output
    pub row_count: usize,
    /// Columns in the output
    pub column_count: usize,
    /// Columns with a machine-readable UUID mapping
    pub uuid_columns: usize,
}

/// A finished merge, ready to be written as TSV
#[derive(Debug, Clone)]
pub struct DatasetMerge {
    /// Final column order
    pub columns: Vec<String>,
    /// Merged rows
    pub rows: Vec<Vec<String>>,
    /// Machine-readable UUID row aligned to `columns`, if any source
    /// carried one
    pub uuid_row: Option<Vec<String>>,
    /// Merge summary
    pub report: MergeReport,
}

impl DatasetMerge {
    /// Write the merge as a TSV file, machine-readable row first when present
    pub fn write(&self, path: &Path) -> Result<()> {
        write_tsv(path, self.uuid_row.as_deref(), &self.columns, &self.rows)
    }
}

/// One input to [`merge_tables`]: a parsed export and, for
/// `merged_custom_fields.tsv`, its header -> UUID mapping.
#[derive(Debug, Clone)]
pub struct MergeInput {
    pub table: Table,
    pub uuid_map: Option<UuidMap>,
}

/// Merge all TSV exports in a folder (see module docs)
pub fn merge_dataset_folder(dir: &Path) -> Result<DatasetMerge> {
    let files = scan_tsv_folder(dir)?;
    info!("found {} TSV files to merge in {}", files.len(), dir.display());

    let mut inputs = Vec::new();
    for path in &files {
        let is_custom_fields = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.eq_ignore_ascii_case(CUSTOM_FIELDS_FILE));

        let input = if is_custom_fields {
            parser::read_bold_table(path).map(|(table, machine_row)| {
                let map = parser::uuid_map(&machine_row, &table.columns);
                info!(
                    "found machine-readable row in {} ({} mapped columns)",
                    table.name,
                    map.len()
                );
                MergeInput {
                    table,
                    uuid_map: Some(map),
                }
            })
        } else {
            parser::read_table(path).map(|table| MergeInput {
                table,
                uuid_map: None,
            })
        };

        match input {
            Ok(input) => inputs.push(input),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }

    merge_tables(inputs, dir)
}

/// Merge pre-parsed tables in order. Tables without a `Sample ID` column
/// (after standardization) are skipped with a warning.
pub fn merge_tables(inputs: Vec<MergeInput>, folder: &Path) -> Result<DatasetMerge> {
    let mut frame: Option<MergedFrame> = None;
    let mut custom_fields_map: Option<UuidMap> = None;
    let mut processed: Vec<String> = Vec::new();

    for MergeInput { mut table, uuid_map } in inputs {
        let name = table.name.clone();
        info!(
            "processing {}: {} rows, {} columns",
            name,
            table.row_count(),
            table.column_count()
        );

        match parser::standardize_sample_id(&mut table, SAMPLE_ID_VARIANTS) {
            Some(original) if original != SAMPLE_ID => {
                info!("in {}: renamed '{}' to '{}'", name, original, SAMPLE_ID);
            }
            Some(_) => {}
            None => {
                warn!(
                    "skipping {}: no Sample ID column found (available: {})",
                    name,
                    table.columns.join(", ")
                );
                continue;
            }
        }

        let removed = table.dedup_by_column(SAMPLE_ID)?;
        if removed > 0 {
            info!("removed {} duplicate Sample IDs from {}", removed, name);
        }

        if uuid_map.is_some() {
            custom_fields_map = uuid_map;
        }

        match frame.as_mut() {
            None => {
                frame = Some(MergedFrame::from_table(table)?);
                info!("initialized merged dataset with {}", name);
            }
            Some(frame) => {
                let before = frame.rows.len();
                frame.outer_join(&table, &format!("_{}", name))?;
                info!("merged {}: {} -> {} rows", name, before, frame.rows.len());
            }
        }
        processed.push(name);
    }

    let mut frame = match frame {
        Some(frame) if !frame.rows.is_empty() => frame,
        _ => return Err(Error::NothingToMerge(folder.to_path_buf())),
    };

    drop_source_file_columns(&mut frame);
    resolve_duplicate_fields(&mut frame);
    drop_stray_key_columns(&mut frame);
    reorder_by_file_origin(&mut frame);

    let uuid_row = custom_fields_map.as_ref().map(|map| align_uuid_row(&frame, map));
    let uuid_columns = custom_fields_map.as_ref().map_or(0, |m| m.len());

    let report = MergeReport {
        files_processed: processed,
        unique_sample_ids: frame.unique_keys(),
        row_count: frame.rows.len(),
        column_count: frame.columns.len(),
        uuid_columns,
    };

    Ok(DatasetMerge {
        columns: frame.columns,
        rows: frame.rows,
        uuid_row,
        report,
    })
}

/// Drop bookkeeping `Source_File` columns, plain or per-file suffixed
fn drop_source_file_columns(frame: &mut MergedFrame) {
    let targets: Vec<String> = frame
        .columns
        .iter()
        .filter(|c| *c == "Source_File" || c.starts_with("Source_File_"))
        .cloned()
        .collect();
    for col in targets {
        frame.drop_column(&col);
        info!("removed column: {}", col);
    }
}

/// Keep one version of each shared field, preferring the copy that did not
/// come from lab.tsv, and rename the survivor back to the base name.
fn resolve_duplicate_fields(frame: &mut MergedFrame) {
    for base in DUPLICATE_PREFERENCE_FIELDS {
        let versions: Vec<String> = frame
            .columns
            .iter()
            .filter(|c| c.starts_with(base))
            .cloned()
            .collect();
        if versions.len() < 2 {
            continue;
        }

        let preferred = versions
            .iter()
            .find(|c| !c.ends_with("_lab.tsv"))
            .unwrap_or(&versions[0])
            .clone();

        for col in &versions {
            if *col != preferred {
                frame.drop_column(col);
                info!("removing duplicate column: {} (keeping {})", col, preferred);
            }
        }
        if preferred != *base {
            frame.rename_column(&preferred, base);
            info!("renamed {} to {}", preferred, base);
        }
    }
}

/// Joins can leave suffixed copies of the key column; they are redundant
fn drop_stray_key_columns(frame: &mut MergedFrame) {
    let strays: Vec<String> = frame
        .columns
        .iter()
        .filter(|c| c.starts_with("Sample ID_"))
        .cloned()
        .collect();
    for col in strays {
        frame.drop_column(&col);
        info!("removed duplicate Sample ID column: {}", col);
    }
}

/// Final column order: Sample ID, Process ID, then suffixed columns grouped
/// by the BOLD file order, then everything else in merge order.
fn reorder_by_file_origin(frame: &mut MergedFrame) {
    let mut ordered: Vec<String> = vec![SAMPLE_ID.to_string()];
    if frame.column_index("Process ID").is_some() {
        ordered.push("Process ID".to_string());
    }

    const FILE_KEYS: &[&str] = &[
        "voucher",
        "taxonomy",
        "specimen_details",
        "collection_data",
        "merged_custom_fields",
        "lab",
        "tags",
    ];

    for key in FILE_KEYS {
        let suffix = format!("_{}.tsv", key);
        let mut from_file = 0;
        for col in &frame.columns {
            if ordered.iter().any(|c| c == col) {
                continue;
            }
            if col.ends_with(&suffix) {
                ordered.push(col.clone());
                from_file += 1;
            }
        }
        if from_file > 0 {
            info!("grouped {} columns from {}.tsv", from_file, key);
        }
    }

    let remaining: Vec<String> = frame
        .columns
        .iter()
        .filter(|c| !ordered.iter().any(|o| o == *c))
        .cloned()
        .collect();
    ordered.extend(remaining);

    frame.reorder_columns(&ordered);
}

/// Build the machine-readable row for the final column order. The mapping
/// covers both the plain header names and their
/// `_merged_custom_fields.tsv`-suffixed aliases; other columns get blanks.
fn align_uuid_row(frame: &MergedFrame, map: &UuidMap) -> Vec<String> {
    let mut extended = map.clone();
    for (header, uuid) in map {
        extended.insert(format!("{}_{}", header, CUSTOM_FIELDS_FILE), uuid.clone());
    }

    frame
        .columns
        .iter()
        .map(|col| extended.get(col).cloned().unwrap_or_default())
        .collect()
}

/// Fill empty cells in `base` from `dup`, count non-empty disagreements,
/// used when folding duplicate columns back together.
pub(crate) fn fold_duplicate_cells(
    rows: &mut [Vec<String>],
    base_idx: usize,
    dup_idx: usize,
) -> usize {
    let mut conflicts = 0;
    for row in rows.iter_mut() {
        let dup_val = row[dup_idx].clone();
        let base_empty = is_empty_cell(&row[base_idx]);
        let dup_empty = is_empty_cell(&dup_val);
        if base_empty && !dup_empty {
            row[base_idx] = dup_val;
        } else if !base_empty && !dup_empty && row[base_idx] != dup_val {
            conflicts += 1;
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_table_str;
    use std::path::PathBuf;

    fn input(content: &str, name: &str) -> MergeInput {
        MergeInput {
            table: read_table_str(content, name, b'\t').unwrap(),
            uuid_map: None,
        }
    }

    fn merge(inputs: Vec<MergeInput>) -> DatasetMerge {
        merge_tables(inputs, &PathBuf::from("test_folder")).unwrap()
    }

    fn column_value<'a>(m: &'a DatasetMerge, row: usize, col: &str) -> &'a str {
        let idx = m.columns.iter().position(|c| c == col).unwrap();
        &m.rows[row][idx]
    }

    #[test]
    fn test_merge_outer_join_keeps_all_samples() {
        let voucher = "Sample ID\tField ID\nS1\tF1\nS2\tF2\n";
        let taxonomy = "Sample ID\tPhylum\nS2\tChordata\nS3\tArthropoda\n";

        let m = merge(vec![
            input(voucher, "voucher.tsv"),
            input(taxonomy, "taxonomy.tsv"),
        ]);

        assert_eq!(m.report.row_count, 3);
        assert_eq!(m.report.unique_sample_ids, 3);
        assert_eq!(column_value(&m, 1, "Phylum"), "Chordata");
        // S3 came only from taxonomy.tsv, so its voucher fields are empty
        assert_eq!(column_value(&m, 2, "Field ID"), "");
    }

    #[test]
    fn test_merge_collision_gets_file_suffix() {
        let voucher = "Sample ID\tNotes\tExtra\nS1\tfrom voucher\tx\n";
        let tags = "Sample ID\tExtra\nS1\tfrom tags\n";

        let m = merge(vec![input(voucher, "voucher.tsv"), input(tags, "tags.tsv")]);

        assert!(m.columns.iter().any(|c| c == "Extra"));
        assert!(m.columns.iter().any(|c| c == "Extra_tags.tsv"));
        assert_eq!(column_value(&m, 0, "Extra_tags.tsv"), "from tags");
    }

    #[test]
    fn test_duplicate_field_prefers_non_lab_version() {
        let specimen = "Sample ID\tLife Stage\nS1\tadult\n";
        let lab = "Sample ID\tLife Stage\nS1\tlarva\n";

        let m = merge(vec![
            input(specimen, "specimen_details.tsv"),
            input(lab, "lab.tsv"),
        ]);

        // Only the base name survives and it holds the non-lab value
        assert_eq!(
            m.columns.iter().filter(|c| c.starts_with("Life Stage")).count(),
            1
        );
        assert_eq!(column_value(&m, 0, "Life Stage"), "adult");
    }

    #[test]
    fn test_file_without_sample_id_is_skipped() {
        let voucher = "Sample ID\tField ID\nS1\tF1\n";
        let broken = "Specimen\tValue\nX\tY\n";

        let m = merge(vec![
            input(voucher, "voucher.tsv"),
            input(broken, "broken.tsv"),
        ]);

        assert_eq!(m.report.files_processed, vec!["voucher.tsv"]);
        assert!(!m.columns.iter().any(|c| c == "Specimen"));
    }

    #[test]
    fn test_within_file_duplicates_dropped() {
        let voucher = "Sample ID\tField ID\nS1\tfirst\nS1\tsecond\n";

        let m = merge(vec![input(voucher, "voucher.tsv")]);

        assert_eq!(m.report.row_count, 1);
        assert_eq!(column_value(&m, 0, "Field ID"), "first");
    }

    #[test]
    fn test_sample_id_variants_standardized_before_join() {
        let voucher = "SampleID\tField ID\nS1\tF1\n";
        let taxonomy = "sample_id\tPhylum\nS1\tChordata\n";

        let m = merge(vec![
            input(voucher, "voucher.tsv"),
            input(taxonomy, "taxonomy.tsv"),
        ]);

        assert_eq!(m.report.row_count, 1);
        assert_eq!(m.columns[0], SAMPLE_ID);
        assert_eq!(column_value(&m, 0, "Phylum"), "Chordata");
    }

    #[test]
    fn test_source_file_columns_removed() {
        let voucher = "Sample ID\tSource_File\nS1\tvoucher\n";
        let lab = "Sample ID\tSource_File\nS1\tlab\n";

        let m = merge(vec![input(voucher, "voucher.tsv"), input(lab, "lab.tsv")]);

        assert!(!m.columns.iter().any(|c| c.starts_with("Source_File")));
    }

    #[test]
    fn test_column_order_groups_suffixed_columns_by_file() {
        let voucher = "Sample ID\tProcess ID\tShared\nS1\tP1\tv\n";
        let lab = "Sample ID\tShared\nS1\tl\n";
        let tags = "Sample ID\tShared\nS1\tt\n";

        let m = merge(vec![
            input(voucher, "voucher.tsv"),
            input(lab, "lab.tsv"),
            input(tags, "tags.tsv"),
        ]);

        assert_eq!(m.columns[0], "Sample ID");
        assert_eq!(m.columns[1], "Process ID");
        let lab_pos = m.columns.iter().position(|c| c == "Shared_lab.tsv").unwrap();
        let tags_pos = m.columns.iter().position(|c| c == "Shared_tags.tsv").unwrap();
        assert!(lab_pos < tags_pos);
    }

    #[test]
    fn test_uuid_row_aligned_to_final_columns() {
        let voucher = "Sample ID\tField ID\nS1\tF1\n";
        let custom = "Sample ID\tPlate ID\nS1\tP01\n";

        let mut map = UuidMap::new();
        map.insert(
            "Plate ID".to_string(),
            "d9356cb2-07f4-4b5a-9ab2-0d6d0e01b3f2".to_string(),
        );

        let m = merge_tables(
            vec![
                input(voucher, "voucher.tsv"),
                MergeInput {
                    table: read_table_str(custom, "merged_custom_fields.tsv", b'\t').unwrap(),
                    uuid_map: Some(map),
                },
            ],
            &PathBuf::from("test_folder"),
        )
        .unwrap();

        let uuid_row = m.uuid_row.as_ref().unwrap();
        assert_eq!(uuid_row.len(), m.columns.len());
        let plate_idx = m.columns.iter().position(|c| c == "Plate ID").unwrap();
        assert_eq!(uuid_row[plate_idx], "d9356cb2-07f4-4b5a-9ab2-0d6d0e01b3f2");
        let key_idx = m.columns.iter().position(|c| c == SAMPLE_ID).unwrap();
        assert_eq!(uuid_row[key_idx], "");
    }

    #[test]
    fn test_merge_nothing_is_an_error() {
        let err = merge_tables(vec![], &PathBuf::from("empty")).unwrap_err();
        assert!(matches!(err, Error::NothingToMerge(_)));
    }

    #[test]
    fn test_fold_duplicate_cells() {
        let mut rows = vec![
            vec!["a".to_string(), "a".to_string()],
            vec![String::new(), "b".to_string()],
            vec!["c".to_string(), "d".to_string()],
        ];
        let conflicts = fold_duplicate_cells(&mut rows, 0, 1);

        assert_eq!(conflicts, 1);
        assert_eq!(rows[1][0], "b");
        assert_eq!(rows[2][0], "c");
    }
}
