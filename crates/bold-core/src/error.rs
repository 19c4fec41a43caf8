//! Error types for bold-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bold-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV/TSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A table has no header row or no columns
    #[error("no tabular data in '{path}': {message}")]
    EmptyTable { path: PathBuf, message: String },

    /// A required column is missing from an input table
    #[error("column '{column}' not found in '{path}' (available: {available})")]
    MissingColumn {
        column: String,
        path: PathBuf,
        available: String,
    },

    /// Input folder does not exist
    #[error("folder does not exist: {0}")]
    MissingFolder(PathBuf),

    /// Input path exists but is not a directory
    #[error("path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// No TSV files found in an input folder
    #[error("no TSV files found in {0}")]
    NoInputFiles(PathBuf),

    /// Every input file was skipped or empty
    #[error("no data to merge in {0}: all files were skipped or empty")]
    NothingToMerge(PathBuf),

    /// No subdirectories with the required TSV triplet
    #[error(
        "no directories under {0} contain merged_custom_fields.tsv, taxonomy.tsv, and lab.tsv"
    )]
    NoTriplets(PathBuf),

    /// Invalid CLI-level argument combination
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Chart rendering failed
    #[error("rendering failed: {0}")]
    Render(String),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error (world map files, reports)
    #[error("JSON error in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
