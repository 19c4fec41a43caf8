//! Input discovery for the merge and extraction tools

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// BOLD export files are merged in this order; anything else comes after
pub const BOLD_FILE_ORDER: &[&str] = &[
    "voucher.tsv",
    "taxonomy.tsv",
    "specimen_details.tsv",
    "collection_data.tsv",
    "merged_custom_fields.tsv",
    "lab.tsv",
    "tags.tsv",
];

/// The custom-fields export, which carries the machine-readable UUID row
pub const CUSTOM_FIELDS_FILE: &str = "merged_custom_fields.tsv";

/// Merge priority of a file name: position in [`BOLD_FILE_ORDER`], with
/// unrecognized names sorted after every known one.
pub fn file_priority(file_name: &str) -> usize {
    let lower = file_name.to_lowercase();
    BOLD_FILE_ORDER
        .iter()
        .position(|known| *known == lower)
        .unwrap_or(BOLD_FILE_ORDER.len())
}

/// Find all `*.tsv` files directly inside a folder, sorted by BOLD merge
/// priority and then by name.
pub fn scan_tsv_folder(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(Error::MissingFolder(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(Error::NotADirectory(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "tsv") {
            files.push(path.to_path_buf());
        }
    }

    if files.is_empty() {
        return Err(Error::NoInputFiles(dir.to_path_buf()));
    }

    files.sort_by(|a, b| {
        let pa = a.file_name().and_then(|n| n.to_str()).map_or(usize::MAX, file_priority);
        let pb = b.file_name().and_then(|n| n.to_str()).map_or(usize::MAX, file_priority);
        pa.cmp(&pb).then_with(|| a.cmp(b))
    });

    Ok(files)
}

/// A subdirectory holding the three files the taxonomy extractor joins
#[derive(Debug, Clone)]
pub struct Triplet {
    /// The subdirectory itself
    pub dir: PathBuf,
    /// merged_custom_fields.tsv
    pub custom_fields: PathBuf,
    /// taxonomy.tsv
    pub taxonomy: PathBuf,
    /// lab.tsv
    pub lab: PathBuf,
}

/// Find immediate subdirectories of `base` that contain all of
/// merged_custom_fields.tsv, taxonomy.tsv, and lab.tsv.
pub fn scan_triplets(base: &Path) -> Result<Vec<Triplet>> {
    if !base.exists() {
        return Err(Error::MissingFolder(base.to_path_buf()));
    }
    if !base.is_dir() {
        return Err(Error::NotADirectory(base.to_path_buf()));
    }

    let mut triplets = Vec::new();
    for entry in WalkDir::new(base)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }

        let custom_fields = dir.join(CUSTOM_FIELDS_FILE);
        let taxonomy = dir.join("taxonomy.tsv");
        let lab = dir.join("lab.tsv");

        if custom_fields.exists() && taxonomy.exists() && lab.exists() {
            triplets.push(Triplet {
                dir: dir.to_path_buf(),
                custom_fields,
                taxonomy,
                lab,
            });
        }
    }

    triplets.sort_by(|a, b| a.dir.cmp(&b.dir));
    Ok(triplets)
}
