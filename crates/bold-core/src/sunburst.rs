//! Sunburst chart rendering
//!
//! The hierarchy is laid out as concentric rings: a fixed center hole, one
//! ring per level, wedges sized by count. Layout is pure geometry and kept
//! separate from drawing so it can be tested without a backend.

use crate::counts::group_thousands;
use crate::error::{Error, Result};
use crate::hierarchy::{Hierarchy, HierarchyNode};
use crate::palette::{color_variations, distinct_colors, Rgb};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontStyle;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Radius of the center hole
pub const CENTER_RADIUS: f64 = 0.15;
/// Outer radius of the outermost ring
pub const OUTER_RADIUS: f64 = 0.85;

/// How colors behave past the inheritance level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Children get brightness variations of the parent color
    Variations,
    /// Children reuse the parent color exactly
    Same,
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "variations" => Ok(ColorMode::Variations),
            "same" => Ok(ColorMode::Same),
            other => Err(format!(
                "unknown color mode '{}' (expected 'variations' or 'same')",
                other
            )),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Variations => write!(f, "variations"),
            ColorMode::Same => write!(f, "same"),
        }
    }
}

/// Rendering options for the sunburst
#[derive(Debug, Clone)]
pub struct SunburstStyle {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// 1-based level up to which slices get distinct colors; deeper levels
    /// inherit from their parent
    pub color_inherit_level: usize,
    pub color_mode: ColorMode,
    /// Width of the white separators between wedges, in pixels
    pub line_width: f64,
    /// Minimum wedge angle in degrees for a label to be drawn
    pub label_threshold: f64,
    /// Caption for the center total ("Total Samples" / "Unique Values")
    pub center_label: String,
}

impl SunburstStyle {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            width: 1800,
            height: 1800,
            color_inherit_level: 1,
            color_mode: ColorMode::Variations,
            line_width: 0.5,
            label_threshold: 5.0,
            center_label: "Total Samples".to_string(),
        }
    }
}

/// One wedge of the chart
#[derive(Debug, Clone)]
pub struct Segment {
    /// 1-based ring level
    pub level: usize,
    /// Degrees, counter-clockwise from the positive x axis
    pub start_angle: f64,
    pub end_angle: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub color: Rgb,
    pub label: String,
    pub value: u64,
}

impl Segment {
    pub fn angle_size(&self) -> f64 {
        self.end_angle - self.start_angle
    }
}

/// Lay the hierarchy out as wedges. `inherit_level` is 1-based; levels at
/// or below it get distinct colors, deeper ones inherit per `mode`.
pub fn layout_segments(hierarchy: &Hierarchy, inherit_level: usize, mode: ColorMode) -> Vec<Segment> {
    let n_levels = hierarchy.levels.len().max(1);
    let ring_width = (OUTER_RADIUS - CENTER_RADIUS) / n_levels as f64;
    let radii: Vec<f64> = (0..=n_levels)
        .map(|i| CENTER_RADIUS + i as f64 * ring_width)
        .collect();

    let mut segments = Vec::new();
    process_level(
        &hierarchy.roots,
        0,
        0.0,
        360.0,
        None,
        inherit_level,
        mode,
        &radii,
        &mut segments,
    );
    segments
}

#[allow(clippy::too_many_arguments)]
fn process_level(
    nodes: &[HierarchyNode],
    level: usize,
    angle_start: f64,
    angle_size: f64,
    parent_color: Option<Rgb>,
    inherit_level: usize,
    mode: ColorMode,
    radii: &[f64],
    segments: &mut Vec<Segment>,
) {
    if level + 1 >= radii.len() || nodes.is_empty() {
        return;
    }

    let total: u64 = nodes.iter().map(|n| n.count).sum();
    if total == 0 {
        return;
    }

    let colors: Vec<Rgb> = if level + 1 <= inherit_level {
        distinct_colors(nodes.len())
    } else {
        // Inherited levels always have a colored parent
        let parent = parent_color.unwrap_or(crate::palette::DISTINCT_COLORS[0]);
        match mode {
            ColorMode::Same => vec![parent; nodes.len()],
            ColorMode::Variations => color_variations(parent, nodes.len()),
        }
    };

    let mut current = angle_start;
    for (i, node) in nodes.iter().enumerate() {
        let share = node.count as f64 / total as f64 * angle_size;
        let color = colors[i];

        segments.push(Segment {
            level: level + 1,
            start_angle: current,
            end_angle: current + share,
            inner_radius: radii[level],
            outer_radius: radii[level + 1],
            color,
            label: node.label.clone(),
            value: node.count,
        });

        if !node.children.is_empty() {
            process_level(
                &node.children,
                level + 1,
                current,
                share,
                Some(color),
                inherit_level,
                mode,
                radii,
                segments,
            );
        }
        current += share;
    }
}

/// Approximate a wedge as a polygon, sampling the arcs every ~2 degrees
pub fn wedge_points(inner: f64, outer: f64, start_deg: f64, end_deg: f64) -> Vec<(f64, f64)> {
    let span = (end_deg - start_deg).abs();
    let steps = ((span / 2.0).ceil() as usize).max(1);

    let arc = |radius: f64, reverse: bool| {
        (0..=steps).map(move |i| {
            let frac = if reverse {
                1.0 - i as f64 / steps as f64
            } else {
                i as f64 / steps as f64
            };
            let angle = (start_deg + span * frac).to_radians();
            (radius * angle.cos(), radius * angle.sin())
        })
    };

    let mut points: Vec<(f64, f64)> = arc(outer, false).collect();
    points.extend(arc(inner, true));
    points
}

/// Render the sunburst to `output` (`.png` or `.svg`). With `auto_formats`
/// the sibling format is written as well, so an editable vector version
/// always exists. Returns the files written.
pub fn render_sunburst(
    hierarchy: &Hierarchy,
    style: &SunburstStyle,
    output: &Path,
    auto_formats: bool,
) -> Result<Vec<PathBuf>> {
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if ext != "png" && ext != "svg" {
        return Err(Error::InvalidArgument(format!(
            "unsupported output format '{}' (supported: png, svg)",
            ext
        )));
    }

    let segments = layout_segments(hierarchy, style.color_inherit_level, style.color_mode);
    info!(
        "creating {} level sunburst with {} segments",
        hierarchy.levels.len(),
        segments.len()
    );

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut written = Vec::new();
    draw_to(output, &ext, &segments, hierarchy, style)?;
    info!("sunburst chart saved as {}", output.display());
    written.push(output.to_path_buf());

    if auto_formats {
        let sibling_ext = if ext == "png" { "svg" } else { "png" };
        let sibling = output.with_extension(sibling_ext);
        draw_to(&sibling, sibling_ext, &segments, hierarchy, style)?;
        info!("also saved {} version: {}", sibling_ext.to_uppercase(), sibling.display());
        written.push(sibling);
    }

    Ok(written)
}

fn draw_to(
    path: &Path,
    ext: &str,
    segments: &[Segment],
    hierarchy: &Hierarchy,
    style: &SunburstStyle,
) -> Result<()> {
    if ext == "png" {
        let root = BitMapBackend::new(path, (style.width, style.height)).into_drawing_area();
        draw_sunburst(&root, segments, hierarchy.total, style).map_err(Error::Render)
    } else {
        let root = SVGBackend::new(path, (style.width, style.height)).into_drawing_area();
        draw_sunburst(&root, segments, hierarchy.total, style).map_err(Error::Render)
    }
}

fn centered(style: TextStyle<'_>) -> TextStyle<'_> {
    style.pos(Pos::new(HPos::Center, VPos::Center))
}

fn draw_sunburst<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    segments: &[Segment],
    total: u64,
    style: &SunburstStyle,
) -> std::result::Result<(), String> {
    root.fill(&WHITE).map_err(|e| e.to_string())?;

    let mut chart = ChartBuilder::on(root)
        .caption(&style.title, ("sans-serif", 40).into_font().style(FontStyle::Bold))
        .margin(20)
        .build_cartesian_2d(-1.0..1.0, -1.0..1.0)
        .map_err(|e| e.to_string())?;

    let separator = WHITE.stroke_width(style.line_width.round().max(1.0) as u32);

    for segment in segments {
        let points = wedge_points(
            segment.inner_radius,
            segment.outer_radius,
            segment.start_angle,
            segment.end_angle,
        );
        let (r, g, b) = segment.color;

        chart
            .draw_series(std::iter::once(Polygon::new(
                points.clone(),
                RGBColor(r, g, b).filled(),
            )))
            .map_err(|e| e.to_string())?;

        let mut border = points;
        border.push(border[0]);
        chart
            .draw_series(std::iter::once(PathElement::new(border, separator)))
            .map_err(|e| e.to_string())?;

        if segment.angle_size() > style.label_threshold {
            let mid_angle = (segment.start_angle + segment.end_angle) / 2.0;
            let mid_radius = (segment.inner_radius + segment.outer_radius) / 2.0;
            let rad = mid_angle.to_radians();
            let (x, y) = (mid_radius * rad.cos(), mid_radius * rad.sin());

            let base_size = (14 - segment.level as i32).clamp(6, 12);
            let size = if segment.angle_size() < 10.0 {
                (base_size - 2).max(6)
            } else {
                base_size
            };
            // Scale font with the canvas (sizes were picked for ~600px)
            let size = size as f64 * style.width as f64 / 600.0;
            let font_style = if segment.level <= 2 {
                FontStyle::Bold
            } else {
                FontStyle::Normal
            };

            let name_style = centered(
                ("sans-serif", size)
                    .into_font()
                    .style(font_style)
                    .color(&BLACK),
            );
            chart
                .draw_series(std::iter::once(Text::new(
                    segment.label.clone(),
                    (x, y + 0.015),
                    name_style,
                )))
                .map_err(|e| e.to_string())?;

            let value_style = centered(("sans-serif", size).into_font().color(&BLACK));
            chart
                .draw_series(std::iter::once(Text::new(
                    group_thousands(segment.value),
                    (x, y - 0.015),
                    value_style,
                )))
                .map_err(|e| e.to_string())?;
        }
    }

    // Center hole with the grand total
    let center: Vec<(f64, f64)> = (0..=180)
        .map(|i| {
            let a = (i as f64 * 2.0).to_radians();
            (CENTER_RADIUS * a.cos(), CENTER_RADIUS * a.sin())
        })
        .collect();
    chart
        .draw_series(std::iter::once(Polygon::new(center.clone(), WHITE.filled())))
        .map_err(|e| e.to_string())?;
    chart
        .draw_series(std::iter::once(PathElement::new(center, BLACK.stroke_width(3))))
        .map_err(|e| e.to_string())?;

    let center_size = 14.0 * style.width as f64 / 600.0;
    let center_style = centered(
        ("sans-serif", center_size)
            .into_font()
            .style(FontStyle::Bold)
            .color(&BLACK),
    );
    chart
        .draw_series(std::iter::once(Text::new(
            style.center_label.clone(),
            (0.0, 0.025),
            center_style.clone(),
        )))
        .map_err(|e| e.to_string())?;
    chart
        .draw_series(std::iter::once(Text::new(
            group_thousands(total),
            (0.0, -0.025),
            center_style,
        )))
        .map_err(|e| e.to_string())?;

    root.present().map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> Hierarchy {
        Hierarchy {
            roots: vec![
                HierarchyNode {
                    label: "A".to_string(),
                    count: 75,
                    children: vec![
                        HierarchyNode {
                            label: "A1".to_string(),
                            count: 50,
                            children: Vec::new(),
                        },
                        HierarchyNode {
                            label: "A2".to_string(),
                            count: 25,
                            children: Vec::new(),
                        },
                    ],
                },
                HierarchyNode {
                    label: "B".to_string(),
                    count: 25,
                    children: Vec::new(),
                },
            ],
            total: 100,
            levels: vec!["Partner".to_string(), "Project".to_string()],
            rows_used: 100,
        }
    }

    #[test]
    fn test_layout_angles_are_proportional() {
        let segments = layout_segments(&hierarchy(), 1, ColorMode::Variations);
        let level1: Vec<&Segment> = segments.iter().filter(|s| s.level == 1).collect();

        assert_eq!(level1.len(), 2);
        assert!((level1[0].angle_size() - 270.0).abs() < 1e-9);
        assert!((level1[1].angle_size() - 90.0).abs() < 1e-9);
        // Level 1 covers the full circle
        assert!((level1.iter().map(|s| s.angle_size()).sum::<f64>() - 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_children_nest_inside_parent_angles() {
        let segments = layout_segments(&hierarchy(), 1, ColorMode::Variations);
        let parent = segments.iter().find(|s| s.label == "A").unwrap();
        let child = segments.iter().find(|s| s.label == "A1").unwrap();

        assert!(child.start_angle >= parent.start_angle - 1e-9);
        assert!(child.end_angle <= parent.end_angle + 1e-9);
        assert_eq!(child.level, 2);
        assert!(child.inner_radius > parent.inner_radius);
    }

    #[test]
    fn test_ring_radii_partition_evenly() {
        let segments = layout_segments(&hierarchy(), 1, ColorMode::Variations);
        let level1 = segments.iter().find(|s| s.level == 1).unwrap();
        let level2 = segments.iter().find(|s| s.level == 2).unwrap();

        assert!((level1.inner_radius - CENTER_RADIUS).abs() < 1e-9);
        assert!((level1.outer_radius - level2.inner_radius).abs() < 1e-9);
        assert!((level2.outer_radius - OUTER_RADIUS).abs() < 1e-9);
    }

    #[test]
    fn test_same_mode_inherits_parent_color_exactly() {
        let segments = layout_segments(&hierarchy(), 1, ColorMode::Same);
        let parent = segments.iter().find(|s| s.label == "A").unwrap();
        let child = segments.iter().find(|s| s.label == "A1").unwrap();

        assert_eq!(child.color, parent.color);
    }

    #[test]
    fn test_variations_mode_lightens_children() {
        let segments = layout_segments(&hierarchy(), 1, ColorMode::Variations);
        let parent = segments.iter().find(|s| s.label == "A").unwrap();
        let a1 = segments.iter().find(|s| s.label == "A1").unwrap();
        let a2 = segments.iter().find(|s| s.label == "A2").unwrap();

        // Children differ from each other; the last variation is the base
        assert_ne!(a1.color, a2.color);
        assert_eq!(a2.color, parent.color);
    }

    #[test]
    fn test_inherit_level_two_gives_children_distinct_colors() {
        let segments = layout_segments(&hierarchy(), 2, ColorMode::Same);
        let a1 = segments.iter().find(|s| s.label == "A1").unwrap();
        let a2 = segments.iter().find(|s| s.label == "A2").unwrap();

        assert_ne!(a1.color, a2.color);
    }

    #[test]
    fn test_wedge_points_on_radii() {
        let points = wedge_points(0.5, 1.0, 0.0, 90.0);

        let first = points.first().unwrap();
        assert!((first.0 - 1.0).abs() < 1e-9 && first.1.abs() < 1e-9);
        let last = points.last().unwrap();
        assert!(((last.0.powi(2) + last.1.powi(2)).sqrt() - 0.5).abs() < 1e-9);
        // All points sit on one of the two radii
        for (x, y) in &points {
            let r = (x.powi(2) + y.powi(2)).sqrt();
            assert!((r - 1.0).abs() < 1e-9 || (r - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_color_mode_from_str() {
        assert_eq!("same".parse::<ColorMode>().unwrap(), ColorMode::Same);
        assert_eq!(
            "Variations".parse::<ColorMode>().unwrap(),
            ColorMode::Variations
        );
        assert!("rainbow".parse::<ColorMode>().is_err());
    }

    #[test]
    fn test_render_rejects_unknown_extension() {
        let style = SunburstStyle::new("t");
        let err = render_sunburst(&hierarchy(), &style, Path::new("chart.bmp"), false).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
