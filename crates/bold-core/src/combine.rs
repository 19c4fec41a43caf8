//! Cross-dataset merge: N merged BOLD TSVs -> one unified TSV
//!
//! Inputs are merged outputs for different datasets (plants, animals, ...)
//! with overlapping but not identical field sets. Every file is read in the
//! BOLD flavor (machine-readable UUID row, headers in row 2), falling back
//! to plain headers when the key column is not found. Shared columns are
//! folded together: the first-seen value wins and empty cells are filled
//! from later files.

use crate::error::{Error, Result};
use crate::merger::{
    fold_duplicate_cells, DatasetMerge, MergeReport, MergedFrame,
};
use crate::parser::{
    self, UuidMap, EXTENDED_SAMPLE_ID_VARIANTS, SAMPLE_ID,
};
use crate::scanner::scan_tsv_folder;
use crate::table::Table;
use std::path::Path;
use tracing::{info, warn};

const DUPLICATE_MARKER: &str = "_DUPLICATE_FROM_";

/// One input to [`combine_tables`]
#[derive(Debug, Clone)]
pub struct CombineInput {
    pub table: Table,
    pub uuid_map: Option<UuidMap>,
}

/// Combine all merged TSVs in a folder (see module docs)
pub fn combine_folder(dir: &Path) -> Result<DatasetMerge> {
    let files = scan_tsv_folder(dir)?;
    info!("found {} TSV files to combine in {}", files.len(), dir.display());

    let mut inputs = Vec::new();
    for path in &files {
        match read_combine_input(path) {
            Ok(Some(input)) => inputs.push(input),
            Ok(None) => {}
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }

    combine_tables(inputs, dir)
}

/// Read one merged TSV: BOLD flavor first, plain headers as fallback.
/// Returns None when no sample-ID column can be found either way.
fn read_combine_input(path: &Path) -> Result<Option<CombineInput>> {
    let records = parser::read_records(path)?;
    let (mut table, machine_row) = parser::bold_table_from_records(path, &records)?;

    let uuid_map = if parser::count_uuids(&machine_row) > 0
        && machine_row.len() == table.columns.len()
    {
        let map = parser::uuid_map(&machine_row, &table.columns);
        info!(
            "found {} UUIDs in first row of {} - treating as machine-readable header",
            parser::count_uuids(&machine_row),
            table.name
        );
        Some(map)
    } else {
        info!("no UUIDs detected in first row of {}", table.name);
        None
    };

    if parser::standardize_sample_id(&mut table, EXTENDED_SAMPLE_ID_VARIANTS).is_some() {
        return Ok(Some(CombineInput { table, uuid_map }));
    }

    // Header structure may have been misdetected; retry with headers in
    // the first row (and without a machine-readable mapping).
    warn!(
        "no Sample ID found in {} - attempting fallback reading",
        table.name
    );
    let mut fallback = parser::table_from_records(path, &records, 0)?;
    if parser::standardize_sample_id(&mut fallback, EXTENDED_SAMPLE_ID_VARIANTS).is_some() {
        info!("fallback successful - found Sample ID in first-row headers");
        return Ok(Some(CombineInput {
            table: fallback,
            uuid_map: None,
        }));
    }

    warn!(
        "skipping {}: no Sample ID column found even in fallback",
        table.name
    );
    Ok(None)
}

/// Combine pre-parsed merged tables in order
pub fn combine_tables(inputs: Vec<CombineInput>, folder: &Path) -> Result<DatasetMerge> {
    let mut frame: Option<MergedFrame> = None;
    let mut maps: Vec<(String, UuidMap)> = Vec::new();
    let mut processed: Vec<String> = Vec::new();

    for CombineInput { mut table, uuid_map } in inputs {
        let name = table.name.clone();
        info!(
            "processing {}: {} rows, {} columns",
            name,
            table.row_count(),
            table.column_count()
        );

        let removed = table.dedup_by_column(SAMPLE_ID)?;
        if removed > 0 {
            info!("removed {} duplicate Sample IDs from {}", removed, name);
        }

        if let Some(map) = uuid_map {
            info!("stored UUID mapping for {} columns from {}", map.len(), name);
            maps.push((name.clone(), map));
        }

        match frame.as_mut() {
            None => {
                frame = Some(MergedFrame::from_table(table)?);
                info!("initialized combined dataset with {}", name);
            }
            Some(frame) => {
                let before = frame.rows.len();
                frame.outer_join(&table, &format!("{}{}", DUPLICATE_MARKER, name))?;
                info!("merged {}: {} -> {} rows", name, before, frame.rows.len());
            }
        }
        processed.push(name);
    }

    let mut frame = match frame {
        Some(frame) if !frame.rows.is_empty() => frame,
        _ => return Err(Error::NothingToMerge(folder.to_path_buf())),
    };

    resolve_duplicate_columns(&mut frame);
    frame.move_column_first(SAMPLE_ID);

    let unified = unify_uuid_maps(&maps);
    let uuid_row = if unified.is_empty() {
        None
    } else {
        Some(
            frame
                .columns
                .iter()
                .map(|col| unified.get(col).cloned().unwrap_or_default())
                .collect(),
        )
    };

    let report = MergeReport {
        files_processed: processed,
        unique_sample_ids: frame.unique_keys(),
        row_count: frame.rows.len(),
        column_count: frame.columns.len(),
        uuid_columns: unified.len(),
    };

    Ok(DatasetMerge {
        columns: frame.columns,
        rows: frame.rows,
        uuid_row,
        report,
    })
}

/// Fold `_DUPLICATE_FROM_` columns back into their base column: the base
/// value wins, empty base cells are filled from the duplicate, and
/// disagreements are counted and logged.
fn resolve_duplicate_columns(frame: &mut MergedFrame) {
    let dup_cols: Vec<String> = frame
        .columns
        .iter()
        .filter(|c| c.contains(DUPLICATE_MARKER))
        .cloned()
        .collect();

    for dup in dup_cols {
        let base = match dup.split(DUPLICATE_MARKER).next() {
            Some(base) if !base.is_empty() => base.to_string(),
            _ => continue,
        };

        let (base_idx, dup_idx) = match (frame.column_index(&base), frame.column_index(&dup)) {
            (Some(b), Some(d)) => (b, d),
            _ => continue,
        };

        let conflicts = fold_duplicate_cells(&mut frame.rows, base_idx, dup_idx);
        if conflicts > 0 {
            warn!(
                "found {} conflicts for column '{}' - keeping original values",
                conflicts, base
            );
        }

        frame.drop_column(&dup);
        info!("merged duplicate column: {} -> {}", dup, base);
    }
}

/// Unify header -> UUID mappings across files: the first-seen UUID wins and
/// disagreements are logged.
fn unify_uuid_maps(maps: &[(String, UuidMap)]) -> UuidMap {
    let mut unified = UuidMap::new();
    let mut conflicts = 0;

    for (file, map) in maps {
        for (col, uuid) in map {
            match unified.get(col) {
                Some(existing) if existing != uuid => {
                    conflicts += 1;
                    warn!(
                        "UUID conflict for column '{}': {} has '{}', previous had '{}'",
                        col, file, uuid, existing
                    );
                }
                Some(_) => {}
                None => {
                    unified.insert(col.clone(), uuid.clone());
                }
            }
        }
    }

    if conflicts > 0 {
        info!(
            "{} column(s) had UUID conflicts; first encountered value kept",
            conflicts
        );
    }
    unified
}
