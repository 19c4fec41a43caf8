//! BOLD specimen data toolkit CLI
//!
//! Command-line tools for merging BOLD TSV exports, extracting taxonomy
//! records, and rendering choropleth maps and sunburst charts.

use bold_core::{
    build_hierarchy, combine_folder, country_counts, extract_taxonomy, merge_dataset_folder,
    read_table, render_fallback_charts, render_map, render_sunburst, Bounds, ColorMode,
    ColorScheme, CountMode, DatasetMerge, Hierarchy, MapStyle, SunburstStyle, WorldMap,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "bold-cli")]
#[command(about = "BOLD specimen data toolkit", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the TSV exports of one dataset on Sample ID
    Merge {
        /// Folder containing the TSV exports
        folder: PathBuf,

        /// Output file (default: merged_output.tsv in the folder)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Log file (default: timestamped file in the folder)
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// Combine merged datasets with different field sets into one TSV
    Combine {
        /// Folder containing the merged TSV files
        folder: PathBuf,

        /// Output file (default: bold_final_merged.tsv in the folder)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Log file (default: timestamped file in the folder)
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// Extract taxonomy records for the given plate IDs
    ExtractTaxonomy {
        /// Plate IDs to extract (e.g. BGE_00647)
        #[arg(required = true)]
        plate_ids: Vec<String>,

        /// Base directory to search for TSV triplets
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,

        /// Output file
        #[arg(long, default_value = "extracted_taxonomy.tsv")]
        output: PathBuf,
    },

    /// Create a choropleth map of per-country counts
    Map {
        /// Input CSV file
        input_csv: PathBuf,

        /// Directory for the output images
        output_dir: PathBuf,

        /// World map GeoJSON file
        #[arg(short, long)]
        map_data: PathBuf,

        /// Column containing country names
        #[arg(short = 'c', long, default_value = "Country")]
        country_column: String,

        /// Column to count values from (default: count rows per country)
        #[arg(long)]
        count_column: Option<String>,

        /// Count unique values only
        #[arg(short, long)]
        unique_count: bool,

        /// Degrees to extend map borders beyond the data countries
        #[arg(short, long, default_value_t = 5.0)]
        border_extension: f64,

        /// Map title
        #[arg(short, long, default_value = "Sample Distribution by Country")]
        title: String,

        /// Color scheme
        #[arg(long, default_value = "blue", value_parser = ColorScheme::from_str)]
        colour: ColorScheme,

        /// Map boundaries: min_lon min_lat max_lon max_lat
        #[arg(long, num_args = 4, value_names = ["MIN_LON", "MIN_LAT", "MAX_LON", "MAX_LAT"])]
        bounds: Option<Vec<f64>>,
    },

    /// Create a sunburst chart of nested category counts
    Sunburst {
        /// Input CSV file
        csv_file: PathBuf,

        /// Column name for sample IDs
        #[arg(long, default_value = "Sample-ID")]
        sample_id: String,

        /// Column for level 1
        #[arg(long, default_value = "Partner_sub")]
        level1: String,

        /// Column for level 2 (empty to disable)
        #[arg(long, default_value = "partner")]
        level2: String,

        /// Column for level 3 (empty to disable)
        #[arg(long, default_value = "Project-Code")]
        level3: String,

        /// Column for level 4
        #[arg(long)]
        level4: Option<String>,

        /// Column for level 5
        #[arg(long)]
        level5: Option<String>,

        /// Level from which colors are inherited (1-based)
        #[arg(long, default_value_t = 1)]
        color_inherit_level: usize,

        /// Color inheritance mode: variations or same
        #[arg(long, default_value = "variations", value_parser = ColorMode::from_str)]
        color_mode: ColorMode,

        /// Count unique sample IDs instead of records
        #[arg(long)]
        count_unique: bool,

        /// Output file (.png or .svg)
        #[arg(long, default_value = "sunburst_chart.png")]
        output: PathBuf,

        /// Chart title
        #[arg(long, default_value = "Data Sunburst Analysis")]
        title: String,

        /// Image width in pixels
        #[arg(long, default_value_t = 1800)]
        width: u32,

        /// Image height in pixels
        #[arg(long, default_value_t = 1800)]
        height: u32,

        /// Skip the automatic sibling PNG/SVG version
        #[arg(long)]
        no_auto_formats: bool,

        /// Width of the separators between segments
        #[arg(long, default_value_t = 0.5)]
        line_width: f64,

        /// Percentage threshold for folding small slices into "Other"
        #[arg(long, default_value_t = 0.0)]
        threshold: f64,

        /// Label for the folded small slices
        #[arg(long, default_value = "Other")]
        other_label: String,

        /// Minimum angle in degrees for segment labels
        #[arg(long, default_value_t = 5.0)]
        label_threshold: f64,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> bold_core::Result<()> {
    let cli = Cli::parse();

    // merge/combine log to a file as well; the folder must exist before
    // the log file can be created there
    let log_file = match &cli.command {
        Commands::Merge { folder, log, .. } => {
            check_folder(folder)?;
            Some(resolve_in_folder(
                folder,
                log.as_deref(),
                &timestamped("tsv_merge_log"),
            ))
        }
        Commands::Combine { folder, log, .. } => {
            check_folder(folder)?;
            Some(resolve_in_folder(
                folder,
                log.as_deref(),
                &timestamped("bold_merge_log"),
            ))
        }
        _ => None,
    };
    init_logging(log_file.as_deref())?;

    match cli.command {
        Commands::Merge { folder, output, .. } => {
            let output = resolve_in_folder(&folder, output.as_deref(), "merged_output.tsv");
            cmd_merge(&folder, &output, log_file.as_deref())
        }
        Commands::Combine { folder, output, .. } => {
            let output = resolve_in_folder(&folder, output.as_deref(), "bold_final_merged.tsv");
            cmd_combine(&folder, &output, log_file.as_deref())
        }
        Commands::ExtractTaxonomy {
            plate_ids,
            base_dir,
            output,
        } => cmd_extract_taxonomy(&plate_ids, &base_dir, &output),
        Commands::Map {
            input_csv,
            output_dir,
            map_data,
            country_column,
            count_column,
            unique_count,
            border_extension,
            title,
            colour,
            bounds,
        } => cmd_map(
            &input_csv,
            &output_dir,
            &map_data,
            &country_column,
            count_column,
            unique_count,
            border_extension,
            &title,
            colour,
            bounds,
        ),
        Commands::Sunburst {
            csv_file,
            sample_id,
            level1,
            level2,
            level3,
            level4,
            level5,
            color_inherit_level,
            color_mode,
            count_unique,
            output,
            title,
            width,
            height,
            no_auto_formats,
            line_width,
            threshold,
            other_label,
            label_threshold,
        } => {
            let levels: Vec<String> = [
                Some(level1),
                Some(level2),
                Some(level3),
                level4,
                level5,
            ]
            .into_iter()
            .flatten()
            .filter(|c| !c.trim().is_empty())
            .collect();

            cmd_sunburst(SunburstArgs {
                csv_file,
                sample_id,
                levels,
                color_inherit_level,
                color_mode,
                count_unique,
                output,
                title,
                width,
                height,
                auto_formats: !no_auto_formats,
                line_width,
                threshold,
                other_label,
                label_threshold,
            })
        }
    }
}

fn check_folder(folder: &Path) -> bold_core::Result<()> {
    if !folder.exists() {
        return Err(bold_core::Error::MissingFolder(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(bold_core::Error::NotADirectory(folder.to_path_buf()));
    }
    Ok(())
}

/// Relative paths land inside the input folder, absolute ones are kept
fn resolve_in_folder(folder: &Path, path: Option<&Path>, default_name: &str) -> PathBuf {
    match path {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => folder.join(path),
        None => folder.join(default_name),
    }
}

fn timestamped(prefix: &str) -> String {
    format!("{}_{}.log", prefix, Local::now().format("%Y%m%d_%H%M%S"))
}

/// Stderr logging always; a plain-text file layer when a log path is given
fn init_logging(log_file: Option<&Path>) -> bold_core::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(std::sync::Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn print_merge_summary(merge: &DatasetMerge, output: &Path, log_file: Option<&Path>) {
    println!("Merge complete: {}", output.display());
    println!("  input files processed: {}", merge.report.files_processed.len());
    println!("  unique sample IDs: {}", merge.report.unique_sample_ids);
    println!("  rows: {}", merge.report.row_count);
    println!("  columns: {}", merge.report.column_count);
    if merge.report.uuid_columns > 0 {
        println!("  columns with UUID mappings: {}", merge.report.uuid_columns);
    }
    if let Some(log_file) = log_file {
        println!("  log file: {}", log_file.display());
    }
}

fn cmd_merge(folder: &Path, output: &Path, log_file: Option<&Path>) -> bold_core::Result<()> {
    let merge = merge_dataset_folder(folder)?;
    merge.write(output)?;
    print_merge_summary(&merge, output, log_file);
    Ok(())
}

fn cmd_combine(folder: &Path, output: &Path, log_file: Option<&Path>) -> bold_core::Result<()> {
    let merge = combine_folder(folder)?;
    merge.write(output)?;
    print_merge_summary(&merge, output, log_file);
    Ok(())
}

fn cmd_extract_taxonomy(
    plate_ids: &[String],
    base_dir: &Path,
    output: &Path,
) -> bold_core::Result<()> {
    println!("Searching for plate IDs: {}", plate_ids.join(", "));
    println!("Base directory: {}", base_dir.display());

    let extract = extract_taxonomy(base_dir, plate_ids)?;

    if extract.is_empty() {
        println!(
            "No matching records found for plate IDs: {}",
            plate_ids.join(", ")
        );
        return Ok(());
    }

    extract.write(output)?;
    println!(
        "Extracted {} total records to {}",
        extract.row_count(),
        output.display()
    );
    println!("Columns in output: {}", extract.columns.join(", "));

    // Plates actually present in the output
    let plates: BTreeSet<String> = extract
        .rows
        .iter()
        .filter_map(|row| {
            let parts: Vec<&str> = row[1].split('_').collect();
            if parts.len() >= 2 {
                Some(format!("{}_{}", parts[0], parts[1]))
            } else {
                None
            }
        })
        .collect();
    let plates: Vec<String> = plates.into_iter().collect();
    println!("Unique plate IDs found: {}", plates.join(", "));

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_map(
    input_csv: &Path,
    output_dir: &Path,
    map_data: &Path,
    country_column: &str,
    count_column: Option<String>,
    unique_count: bool,
    border_extension: f64,
    title: &str,
    colour: ColorScheme,
    bounds: Option<Vec<f64>>,
) -> bold_core::Result<()> {
    let table = read_table(input_csv)?;
    let mode = match (count_column, unique_count) {
        (Some(col), true) => CountMode::Unique(col),
        (Some(col), false) => CountMode::Values(col),
        (None, _) => CountMode::Rows,
    };
    let counts = country_counts(&table, country_column, &mode)?;

    println!("Counts by country:");
    for (name, count) in counts.top(10) {
        println!("  {}: {}", name, count);
    }
    if counts.len() > 10 {
        println!("  ... and {} more countries", counts.len() - 10);
    }

    let mut style = MapStyle::new(title, colour);
    style.border_extension = border_extension;
    style.bounds = bounds.map(|v| Bounds {
        min_lon: v[0],
        min_lat: v[1],
        max_lon: v[2],
        max_lat: v[3],
    });

    let result = WorldMap::load(map_data).and_then(|map| render_map(&counts, &map, output_dir, &style));
    match result {
        Ok(render) => {
            println!("Mapping complete!");
            println!("  map: {}", render.png.display());
            println!("  map: {}", render.svg.display());
            if !render.unmatched.is_empty() {
                println!(
                    "  unmatched countries: {}",
                    render.unmatched[..render.unmatched.len().min(10)].join(", ")
                );
            }
        }
        Err(e) => {
            warn!("map creation failed: {}; creating fallback charts", e);
            let fallback = render_fallback_charts(&counts, output_dir, title, colour)?;
            println!("Map creation failed. Created fallback charts instead:");
            println!("  charts: {}", fallback.png.display());
            println!("  charts: {}", fallback.svg.display());
        }
    }

    Ok(())
}

struct SunburstArgs {
    csv_file: PathBuf,
    sample_id: String,
    levels: Vec<String>,
    color_inherit_level: usize,
    color_mode: ColorMode,
    count_unique: bool,
    output: PathBuf,
    title: String,
    width: u32,
    height: u32,
    auto_formats: bool,
    line_width: f64,
    threshold: f64,
    other_label: String,
    label_threshold: f64,
}

fn cmd_sunburst(args: SunburstArgs) -> bold_core::Result<()> {
    if !(0.0..=100.0).contains(&args.threshold) {
        return Err(bold_core::Error::InvalidArgument(format!(
            "--threshold must be between 0 and 100 (got {})",
            args.threshold
        )));
    }
    if args.levels.is_empty() {
        return Err(bold_core::Error::InvalidArgument(
            "at least one level column is required".to_string(),
        ));
    }
    if args.color_inherit_level < 1 || args.color_inherit_level > args.levels.len() {
        return Err(bold_core::Error::InvalidArgument(format!(
            "--color-inherit-level must be between 1 and {} (number of active levels)",
            args.levels.len()
        )));
    }

    let table = read_table(&args.csv_file)?;
    println!("Loaded {} rows from {}", table.row_count(), args.csv_file.display());

    let mut hierarchy = build_hierarchy(&table, &args.sample_id, &args.levels, args.count_unique)?;

    if args.threshold > 0.0 {
        let folded = hierarchy.aggregate_small(args.threshold, &args.other_label);
        if !folded.is_empty() {
            println!(
                "Small slice aggregation (threshold: {}%):",
                args.threshold
            );
            let max_level = folded.iter().map(|f| f.level).max().unwrap_or(0);
            for level in 1..=max_level {
                let at_level: Vec<&str> = folded
                    .iter()
                    .filter(|f| f.level == level)
                    .map(|f| f.path.as_str())
                    .collect();
                if !at_level.is_empty() {
                    println!(
                        "  level {}: {} items folded into '{}'",
                        level,
                        at_level.len(),
                        args.other_label
                    );
                    for path in at_level.iter().take(5) {
                        println!("    - {}", path);
                    }
                    if at_level.len() > 5 {
                        println!("    ... and {} more", at_level.len() - 5);
                    }
                }
            }
        }
    }

    let mut style = SunburstStyle::new(args.title.as_str());
    style.width = args.width;
    style.height = args.height;
    style.color_inherit_level = args.color_inherit_level;
    style.color_mode = args.color_mode;
    style.line_width = args.line_width;
    style.label_threshold = args.label_threshold;
    style.center_label = if args.count_unique {
        "Unique Values".to_string()
    } else {
        "Total Samples".to_string()
    };

    let written = render_sunburst(&hierarchy, &style, &args.output, args.auto_formats)?;
    for path in &written {
        println!("Saved: {}", path.display());
    }

    print_sunburst_summary(&hierarchy, args.count_unique);
    Ok(())
}

fn print_sunburst_summary(hierarchy: &Hierarchy, count_unique: bool) {
    let count_type = if count_unique { "unique values" } else { "samples" };
    println!();
    println!("Summary:");
    println!("  total {}: {}", count_type, hierarchy.total);
    println!("  levels: {}", hierarchy.levels.len());

    for (i, name) in hierarchy.levels.iter().enumerate() {
        let mut nodes = 0;
        count_at_depth(&hierarchy.roots, i, &mut nodes);
        println!("  level {} ({}): {} categories", i + 1, name, nodes);
    }

    for node in &hierarchy.roots {
        let percentage = if hierarchy.total > 0 {
            node.count as f64 / hierarchy.total as f64 * 100.0
        } else {
            0.0
        };
        println!(
            "  {}: {} {} ({:.1}%)",
            node.label, node.count, count_type, percentage
        );
    }
}

fn count_at_depth(nodes: &[bold_core::HierarchyNode], depth: usize, total: &mut usize) {
    if depth == 0 {
        *total += nodes.len();
        return;
    }
    for node in nodes {
        count_at_depth(&node.children, depth - 1, total);
    }
}
