//! Choropleth map rendering
//!
//! Country counts are shaded onto a Natural Earth world map. Countries
//! without data stay light gray; shaded fills are taken from the selected
//! scheme on a log10 scale, since counts commonly span orders of
//! magnitude. When the map cannot be drawn at all, a pair of bar charts is
//! rendered instead so the run still produces something usable.

use crate::counts::{group_thousands, CountryCounts};
use crate::countries::match_country;
use crate::error::{Error, Result};
use crate::palette::{ColorScheme, NO_DATA_FILL};
use crate::worldmap::{map_bounds, Bounds, WorldMap};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn anchored<'a>(style: TextStyle<'a>, h: HPos, v: VPos) -> TextStyle<'a> {
    style.pos(Pos::new(h, v))
}

/// Minimum distance in degrees between two count labels
const LABEL_MIN_DISTANCE: f64 = 1.5;

/// Rendering options for the map
#[derive(Debug, Clone)]
pub struct MapStyle {
    pub title: String,
    pub scheme: ColorScheme,
    /// Degrees to extend the bounds beyond the matched countries
    pub border_extension: f64,
    /// Explicit bounds override
    pub bounds: Option<Bounds>,
    pub width: u32,
    pub height: u32,
}

impl MapStyle {
    pub fn new(title: impl Into<String>, scheme: ColorScheme) -> Self {
        Self {
            title: title.into(),
            scheme,
            border_extension: 5.0,
            bounds: None,
            width: 1800,
            height: 1400,
        }
    }
}

/// Result of a successful map render
#[derive(Debug, Clone)]
pub struct MapRender {
    pub png: PathBuf,
    pub svg: PathBuf,
    /// Countries matched to a map feature
    pub matched: usize,
    /// Countries (with counts) that matched nothing
    pub unmatched: Vec<String>,
}

/// Countries matched against the map, ready for shading
struct ShadedMap {
    /// feature index -> count
    by_feature: HashMap<usize, u64>,
    /// matched feature indices, in data order
    features: Vec<usize>,
    unmatched: Vec<String>,
}

fn shade(map: &WorldMap, counts: &CountryCounts) -> ShadedMap {
    let mut by_feature = HashMap::new();
    let mut features = Vec::new();
    let mut unmatched = Vec::new();

    for (country, count) in counts.iter() {
        match match_country(map, country) {
            Some(m) => {
                if m.fuzzy {
                    info!("fuzzy matched: {} -> {} ({} counts)", country, m.matched_name, count);
                } else {
                    info!("matched: {} -> {} ({} counts)", country, m.matched_name, count);
                }
                by_feature.insert(m.feature, *count);
                features.push(m.feature);
            }
            None => unmatched.push(format!("{} ({})", country, count)),
        }
    }

    ShadedMap {
        by_feature,
        features,
        unmatched,
    }
}

/// Render the choropleth as PNG and SVG into `out_dir`
pub fn render_map(
    counts: &CountryCounts,
    map: &WorldMap,
    out_dir: &Path,
    style: &MapStyle,
) -> Result<MapRender> {
    if counts.is_empty() {
        return Err(Error::Render("no country counts to draw".to_string()));
    }
    if map.features.is_empty() {
        return Err(Error::Render("world map has no features".to_string()));
    }

    let shaded = shade(map, counts);
    info!(
        "matched {} countries out of {} in dataset",
        shaded.features.len(),
        counts.len()
    );
    if !shaded.unmatched.is_empty() {
        warn!(
            "unmatched countries: {}",
            shaded.unmatched[..shaded.unmatched.len().min(10)].join(", ")
        );
    }

    let bounds = map_bounds(map, &shaded.features, style.border_extension, style.bounds)
        .ok_or_else(|| Error::Render("world map has no drawable geometry".to_string()))?;
    info!(
        "map bounds: lon {:.1}..{:.1}, lat {:.1}..{:.1}",
        bounds.min_lon, bounds.max_lon, bounds.min_lat, bounds.max_lat
    );

    std::fs::create_dir_all(out_dir)?;
    let png = out_dir.join("sample_map.png");
    let svg = out_dir.join("sample_map.svg");

    {
        let root = BitMapBackend::new(&png, (style.width, style.height)).into_drawing_area();
        draw_map(&root, counts, map, &shaded, &bounds, style).map_err(Error::Render)?;
    }
    info!("map saved as PNG: {}", png.display());

    {
        let root = SVGBackend::new(&svg, (style.width, style.height)).into_drawing_area();
        draw_map(&root, counts, map, &shaded, &bounds, style).map_err(Error::Render)?;
    }
    info!("map saved as SVG: {}", svg.display());

    Ok(MapRender {
        png,
        svg,
        matched: shaded.features.len(),
        unmatched: shaded.unmatched,
    })
}

fn draw_map<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    counts: &CountryCounts,
    map: &WorldMap,
    shaded: &ShadedMap,
    bounds: &Bounds,
    style: &MapStyle,
) -> std::result::Result<(), String> {
    root.fill(&WHITE).map_err(|e| e.to_string())?;

    let mut chart = ChartBuilder::on(root)
        .caption(&style.title, ("sans-serif", 44).into_font())
        .margin(20)
        .build_cartesian_2d(bounds.min_lon..bounds.max_lon, bounds.min_lat..bounds.max_lat)
        .map_err(|e| e.to_string())?;

    let log_max = ((counts.max() + 1) as f64).log10();

    for (idx, feature) in map.features.iter().enumerate() {
        // Features entirely outside the window never show
        let visible = feature
            .bounding_box()
            .is_some_and(|b| !(b.max_lon < bounds.min_lon
                || b.min_lon > bounds.max_lon
                || b.max_lat < bounds.min_lat
                || b.min_lat > bounds.max_lat));
        if !visible {
            continue;
        }

        let fill = match shaded.by_feature.get(&idx) {
            Some(count) if log_max > 0.0 => {
                let t = ((count + 1) as f64).log10() / log_max;
                let (r, g, b) = style.scheme.ramp(t);
                RGBColor(r, g, b)
            }
            Some(_) => {
                let (r, g, b) = style.scheme.ramp(1.0);
                RGBColor(r, g, b)
            }
            None => {
                let (r, g, b) = NO_DATA_FILL;
                RGBColor(r, g, b)
            }
        };

        for polygon in feature.polygons() {
            let Some(outer) = polygon.first() else { continue };
            let points: Vec<(f64, f64)> = outer
                .iter()
                .filter_map(|pos| match pos.as_slice() {
                    [lon, lat, ..] => Some((*lon, *lat)),
                    _ => None,
                })
                .collect();
            if points.len() < 3 {
                continue;
            }

            chart
                .draw_series(std::iter::once(Polygon::new(points.clone(), fill.filled())))
                .map_err(|e| e.to_string())?;

            let mut border = points;
            border.push(border[0]);
            chart
                .draw_series(std::iter::once(PathElement::new(border, WHITE.stroke_width(1))))
                .map_err(|e| e.to_string())?;
        }
    }

    // Count labels at country centroids, largest counts placed first so
    // they win the space
    let mut labeled: Vec<(f64, f64)> = Vec::new();
    let mut by_count: Vec<(usize, u64)> = shaded
        .by_feature
        .iter()
        .map(|(idx, count)| (*idx, *count))
        .collect();
    by_count.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    for (idx, count) in by_count {
        let Some((cx, cy)) = map.features[idx].centroid() else { continue };
        if !bounds.contains(cx, cy) {
            continue;
        }
        if labeled
            .iter()
            .any(|(x, y)| ((cx - x).powi(2) + (cy - y).powi(2)).sqrt() < LABEL_MIN_DISTANCE)
        {
            continue;
        }

        let label = group_thousands(count);
        let style = anchored(
            ("sans-serif", 18).into_font().color(&BLACK),
            HPos::Center,
            VPos::Center,
        );
        chart
            .draw_series(std::iter::once(Text::new(label, (cx, cy), style)))
            .map_err(|e| e.to_string())?;
        labeled.push((cx, cy));
    }

    root.present().map_err(|e| e.to_string())?;
    Ok(())
}

/// Result of a fallback render
#[derive(Debug, Clone)]
pub struct FallbackRender {
    pub png: PathBuf,
    pub svg: PathBuf,
}

/// Bar-chart fallback when the map cannot be drawn: a top-15 panel and an
/// all-countries log-scale panel, side by side.
pub fn render_fallback_charts(
    counts: &CountryCounts,
    out_dir: &Path,
    title: &str,
    scheme: ColorScheme,
) -> Result<FallbackRender> {
    if counts.is_empty() {
        return Err(Error::Render("no country counts to draw".to_string()));
    }

    std::fs::create_dir_all(out_dir)?;
    let png = out_dir.join("sample_charts.png");
    let svg = out_dir.join("sample_charts.svg");

    {
        let root = BitMapBackend::new(&png, (2000, 1000)).into_drawing_area();
        draw_fallback(&root, counts, title, scheme).map_err(Error::Render)?;
    }
    {
        let root = SVGBackend::new(&svg, (2000, 1000)).into_drawing_area();
        draw_fallback(&root, counts, title, scheme).map_err(Error::Render)?;
    }

    info!("charts saved as PNG: {}", png.display());
    info!("charts saved as SVG: {}", svg.display());

    Ok(FallbackRender { png, svg })
}

fn draw_fallback<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    counts: &CountryCounts,
    title: &str,
    scheme: ColorScheme,
) -> std::result::Result<(), String> {
    root.fill(&WHITE).map_err(|e| e.to_string())?;
    let panels = root.split_evenly((1, 2));

    // Left panel: top 15 countries, largest on top
    let top: Vec<(String, u64)> = counts.top(15).to_vec();
    draw_bar_panel(
        &panels[0],
        &top,
        &format!("Top 15 Countries - {}", title),
        scheme,
        false,
    )?;

    // Right panel: every country on a log scale
    let all: Vec<(String, u64)> = counts.iter().cloned().collect();
    draw_bar_panel(&panels[1], &all, "All Countries - Log Scale", scheme, true)?;

    root.present().map_err(|e| e.to_string())?;
    Ok(())
}

fn draw_bar_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    entries: &[(String, u64)],
    caption: &str,
    scheme: ColorScheme,
    log_scale: bool,
) -> std::result::Result<(), String> {
    let n = entries.len();
    if n == 0 {
        return Ok(());
    }

    let value = |count: u64| -> f64 {
        if log_scale {
            ((count + 1) as f64).log10()
        } else {
            count as f64
        }
    };
    let max = entries.iter().map(|(_, c)| value(*c)).fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 28).into_font())
        .margin(20)
        .build_cartesian_2d(0.0..max * 1.2, 0.0..n as f64)
        .map_err(|e| e.to_string())?;

    // Label every bar on the short panel, every nth on the long one
    let label_step = (n / 20).max(1);

    for (i, (name, count)) in entries.iter().enumerate() {
        let y = (n - 1 - i) as f64;
        let v = value(*count);
        let t = 0.3 + 0.7 * (n - 1 - i) as f64 / n.max(2) as f64;
        let (r, g, b) = scheme.ramp(t);

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(0.0, y + 0.15), (v, y + 0.85)],
                RGBColor(r, g, b).filled(),
            )))
            .map_err(|e| e.to_string())?;

        if i % label_step == 0 {
            let style = anchored(
                ("sans-serif", 14).into_font().color(&BLACK),
                HPos::Left,
                VPos::Center,
            );
            chart
                .draw_series(std::iter::once(Text::new(
                    name.clone(),
                    (max * 0.01, y + 0.5),
                    style,
                )))
                .map_err(|e| e.to_string())?;
        }
        if !log_scale {
            let style = anchored(
                ("sans-serif", 14).into_font().color(&BLACK),
                HPos::Left,
                VPos::Center,
            );
            chart
                .draw_series(std::iter::once(Text::new(
                    group_thousands(*count),
                    (v + max * 0.02, y + 0.5),
                    style,
                )))
                .map_err(|e| e.to_string())?;
        }
    }

    Ok(())
}
