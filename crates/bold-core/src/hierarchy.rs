//! Nested category counts feeding the sunburst tool
//!
//! Rows are bucketed through up to five level columns; leaves count either
//! records or distinct sample IDs. Children are kept sorted by count
//! descending so downstream layout is deterministic.

use crate::error::Result;
use crate::table::{is_empty_cell, Table};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// One node of the category tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub label: String,
    /// Leaf count, or sum of child counts for interior nodes
    pub count: u64,
    /// Child nodes, sorted by count descending (ties by label)
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    fn leaf(label: String, count: u64) -> Self {
        Self {
            label,
            count,
            children: Vec::new(),
        }
    }
}

/// The full category tree plus bookkeeping
#[derive(Debug, Clone)]
pub struct Hierarchy {
    /// Top-level nodes, sorted by count descending
    pub roots: Vec<HierarchyNode>,
    /// Grand total (records, or summed unique counts per leaf)
    pub total: u64,
    /// Active level column names, outermost first
    pub levels: Vec<String>,
    /// Rows used after dropping incomplete ones
    pub rows_used: usize,
}

/// A slice path folded into the "Other" bucket by aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedSlice {
    /// 1-based level the fold happened at
    pub level: usize,
    /// Slash-joined path of the folded child
    pub path: String,
}

// Intermediate counting tree; leaves carry either a record count or the
// set of sample IDs seen.
enum Builder {
    Interior(BTreeMap<String, Builder>),
    CountLeaf(u64),
    UniqueLeaf(BTreeSet<String>),
}

/// Build the category tree from a table.
///
/// `level_columns` lists the active hierarchy columns, outermost first.
/// Rows with an empty value in the sample-ID column or any level column are
/// dropped.
pub fn build_hierarchy(
    table: &Table,
    sample_id_column: &str,
    level_columns: &[String],
    count_unique: bool,
) -> Result<Hierarchy> {
    let sample_idx = table.require_column(sample_id_column)?;
    let mut level_idx = Vec::with_capacity(level_columns.len());
    for col in level_columns {
        level_idx.push(table.require_column(col)?);
    }

    let depth = level_idx.len();
    let mut root: BTreeMap<String, Builder> = BTreeMap::new();
    let mut rows_used = 0;

    'rows: for row in &table.rows {
        if is_empty_cell(&row[sample_idx]) {
            continue;
        }
        for &idx in &level_idx {
            if is_empty_cell(&row[idx]) {
                continue 'rows;
            }
        }
        rows_used += 1;

        let mut current = &mut root;
        for (level, &idx) in level_idx.iter().enumerate() {
            let key = row[idx].trim().to_string();
            if level == depth - 1 {
                let leaf = current.entry(key).or_insert_with(|| {
                    if count_unique {
                        Builder::UniqueLeaf(BTreeSet::new())
                    } else {
                        Builder::CountLeaf(0)
                    }
                });
                match leaf {
                    Builder::CountLeaf(n) => *n += 1,
                    Builder::UniqueLeaf(set) => {
                        set.insert(row[sample_idx].trim().to_string());
                    }
                    Builder::Interior(_) => {}
                }
            } else {
                let node = current
                    .entry(key)
                    .or_insert_with(|| Builder::Interior(BTreeMap::new()));
                current = match node {
                    Builder::Interior(map) => map,
                    // A key cannot be both leaf and interior: level columns
                    // are fixed per run
                    _ => continue 'rows,
                };
            }
        }
    }

    info!(
        "{} of {} rows kept after dropping incomplete hierarchy values",
        rows_used,
        table.row_count()
    );

    let roots = finish_level(root);
    let total = roots.iter().map(|n| n.count).sum();

    Ok(Hierarchy {
        roots,
        total,
        levels: level_columns.to_vec(),
        rows_used,
    })
}

fn finish_level(level: BTreeMap<String, Builder>) -> Vec<HierarchyNode> {
    let mut nodes: Vec<HierarchyNode> = level
        .into_iter()
        .map(|(label, builder)| match builder {
            Builder::CountLeaf(n) => HierarchyNode::leaf(label, n),
            Builder::UniqueLeaf(set) => HierarchyNode::leaf(label, set.len() as u64),
            Builder::Interior(map) => {
                let children = finish_level(map);
                let count = children.iter().map(|c| c.count).sum();
                HierarchyNode {
                    label,
                    count,
                    children,
                }
            }
        })
        .collect();

    nodes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    nodes
}

impl Hierarchy {
    /// Fold children below `threshold_percent` of their level total into an
    /// `other_label` leaf, at every level. A fold only happens when at
    /// least two children fall below the threshold and their sum is
    /// positive. Returns the folded slice paths.
    pub fn aggregate_small(
        &mut self,
        threshold_percent: f64,
        other_label: &str,
    ) -> Vec<AggregatedSlice> {
        let mut folded = Vec::new();
        if threshold_percent <= 0.0 {
            return folded;
        }

        aggregate_children(&mut self.roots, threshold_percent, other_label, 1, "", &mut folded);
        folded
    }
}

fn aggregate_children(
    children: &mut Vec<HierarchyNode>,
    threshold_percent: f64,
    other_label: &str,
    level: usize,
    path: &str,
    folded: &mut Vec<AggregatedSlice>,
) {
    let total: u64 = children.iter().map(|c| c.count).sum();
    let threshold = threshold_percent / 100.0 * total as f64;

    let (kept, small): (Vec<HierarchyNode>, Vec<HierarchyNode>) = children
        .drain(..)
        .partition(|c| c.count as f64 >= threshold);

    let other_total: u64 = small.iter().map(|c| c.count).sum();
    if small.len() > 1 && other_total > 0 {
        *children = kept;
        for node in &small {
            let child_path = if path.is_empty() {
                node.label.clone()
            } else {
                format!("{}/{}", path, node.label)
            };
            folded.push(AggregatedSlice {
                level,
                path: child_path,
            });
        }
        children.push(HierarchyNode::leaf(other_label.to_string(), other_total));
        children.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    } else {
        // Not enough small slices to make a meaningful bucket
        *children = kept;
        children.extend(small);
        children.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    }

    for node in children.iter_mut() {
        if node.label == other_label && node.children.is_empty() {
            continue;
        }
        if !node.children.is_empty() {
            let child_path = if path.is_empty() {
                node.label.clone()
            } else {
                format!("{}/{}", path, node.label)
            };
            aggregate_children(
                &mut node.children,
                threshold_percent,
                other_label,
                level + 1,
                &child_path,
                folded,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_table_str;

    fn table() -> Table {
        let csv = "Sample-ID,Partner,Project\n\
                   S1,MuseumA,P1\n\
                   S2,MuseumA,P1\n\
                   S3,MuseumA,P2\n\
                   S4,MuseumB,P3\n\
                   S5,,P4\n\
                   S6,MuseumB,\n";
        read_table_str(csv, "museum.csv", b',').unwrap()
    }

    fn levels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_incomplete_rows_dropped() {
        let h = build_hierarchy(&table(), "Sample-ID", &levels(&["Partner", "Project"]), false)
            .unwrap();

        assert_eq!(h.rows_used, 4);
        assert_eq!(h.total, 4);
    }

    #[test]
    fn test_tree_shape_and_ordering() {
        let h = build_hierarchy(&table(), "Sample-ID", &levels(&["Partner", "Project"]), false)
            .unwrap();

        // MuseumA (3) sorts before MuseumB (1)
        assert_eq!(h.roots[0].label, "MuseumA");
        assert_eq!(h.roots[0].count, 3);
        assert_eq!(h.roots[0].children[0].label, "P1");
        assert_eq!(h.roots[0].children[0].count, 2);
        assert_eq!(h.roots[1].label, "MuseumB");
    }

    #[test]
    fn test_unique_counting_dedups_sample_ids() {
        let csv = "Sample-ID,Partner\nS1,MuseumA\nS1,MuseumA\nS2,MuseumA\n";
        let t = read_table_str(csv, "dup.csv", b',').unwrap();
        let h = build_hierarchy(&t, "Sample-ID", &levels(&["Partner"]), true).unwrap();

        assert_eq!(h.roots[0].count, 2);
        assert_eq!(h.total, 2);
    }

    #[test]
    fn test_missing_level_column_is_an_error() {
        let err =
            build_hierarchy(&table(), "Sample-ID", &levels(&["Nope"]), false).unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn test_aggregate_small_folds_into_other() {
        let mut h = Hierarchy {
            roots: vec![
                HierarchyNode::leaf("Big".to_string(), 90),
                HierarchyNode::leaf("Tiny1".to_string(), 6),
                HierarchyNode::leaf("Tiny2".to_string(), 4),
            ],
            total: 100,
            levels: vec!["Partner".to_string()],
            rows_used: 100,
        };

        let folded = h.aggregate_small(10.0, "Other");

        assert_eq!(folded.len(), 2);
        assert!(folded.iter().any(|f| f.path == "Tiny1" && f.level == 1));
        let other = h.roots.iter().find(|n| n.label == "Other").unwrap();
        assert_eq!(other.count, 10);
        assert_eq!(h.roots.len(), 2);
    }

    #[test]
    fn test_aggregate_single_small_slice_left_alone() {
        let mut h = Hierarchy {
            roots: vec![
                HierarchyNode::leaf("Big".to_string(), 95),
                HierarchyNode::leaf("Tiny".to_string(), 5),
            ],
            total: 100,
            levels: vec!["Partner".to_string()],
            rows_used: 100,
        };

        let folded = h.aggregate_small(10.0, "Other");

        assert!(folded.is_empty());
        assert_eq!(h.roots.len(), 2);
        assert!(h.roots.iter().any(|n| n.label == "Tiny"));
    }

    #[test]
    fn test_aggregate_zero_threshold_is_a_no_op() {
        let mut h = build_hierarchy(&table(), "Sample-ID", &levels(&["Partner"]), false).unwrap();
        let before = h.roots.clone();
        let folded = h.aggregate_small(0.0, "Other");

        assert!(folded.is_empty());
        assert_eq!(h.roots, before);
    }

    #[test]
    fn test_aggregate_recurses_into_children() {
        let mut h = Hierarchy {
            roots: vec![HierarchyNode {
                label: "Root".to_string(),
                count: 100,
                children: vec![
                    HierarchyNode::leaf("Big".to_string(), 90),
                    HierarchyNode::leaf("Small1".to_string(), 6),
                    HierarchyNode::leaf("Small2".to_string(), 4),
                ],
            }],
            total: 100,
            levels: vec!["A".to_string(), "B".to_string()],
            rows_used: 100,
        };

        let folded = h.aggregate_small(10.0, "Other");

        assert_eq!(folded.len(), 2);
        assert!(folded.iter().all(|f| f.level == 2));
        assert!(folded.iter().any(|f| f.path == "Root/Small1"));
        let other = h.roots[0]
            .children
            .iter()
            .find(|n| n.label == "Other")
            .unwrap();
        assert_eq!(other.count, 10);
    }
}
