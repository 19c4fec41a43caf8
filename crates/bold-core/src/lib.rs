//! bold-core: Library for merging and visualizing BOLD specimen exports
//!
//! This library provides functionality to:
//! - Parse BOLD TSV/CSV exports, including the machine-readable UUID header
//!   row of custom-field files
//! - Merge the related exports of one dataset on `Sample ID`
//! - Combine merged datasets with heterogeneous field sets into one table
//! - Extract taxonomy records by plate ID across export directories
//! - Aggregate per-country and hierarchical category counts
//! - Render choropleth maps and sunburst charts as PNG/SVG

pub mod choropleth;
pub mod combine;
pub mod counts;
pub mod countries;
pub mod error;
pub mod hierarchy;
pub mod merger;
pub mod palette;
pub mod parser;
pub mod scanner;
pub mod sunburst;
pub mod table;
pub mod taxonomy;
pub mod worldmap;

pub use choropleth::{render_fallback_charts, render_map, MapRender, MapStyle};
pub use combine::{combine_folder, combine_tables, CombineInput};
pub use counts::{country_counts, CountMode, CountryCounts};
pub use error::{Error, Result};
pub use hierarchy::{build_hierarchy, AggregatedSlice, Hierarchy, HierarchyNode};
pub use merger::{merge_dataset_folder, merge_tables, DatasetMerge, MergeInput, MergeReport};
pub use palette::ColorScheme;
pub use parser::{read_bold_table, read_table, read_table_str, SAMPLE_ID};
pub use scanner::{scan_triplets, scan_tsv_folder, Triplet};
pub use sunburst::{render_sunburst, ColorMode, SunburstStyle};
pub use table::Table;
pub use taxonomy::{extract_taxonomy, TaxonomyExtract};
pub use worldmap::{Bounds, WorldMap};
