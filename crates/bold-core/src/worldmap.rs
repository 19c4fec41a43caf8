//! Natural Earth world map, read from GeoJSON
//!
//! Only the pieces the choropleth needs are modeled: features with string
//! properties and (Multi)Polygon geometry. Positions may carry altitude;
//! anything past longitude/latitude is ignored.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// A GeoJSON position: `[lon, lat]` or `[lon, lat, alt]`
pub type Position = Vec<f64>;
/// A closed ring of positions
pub type Ring = Vec<Position>;

/// A GeoJSON FeatureCollection of country outlines
#[derive(Debug, Clone, Deserialize)]
pub struct WorldMap {
    pub features: Vec<Feature>,
}

/// One country feature
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    /// GeoJSON allows `"properties": null`
    #[serde(default)]
    pub properties: Option<BTreeMap<String, serde_json::Value>>,
    pub geometry: Option<Geometry>,
}

/// Supported geometry kinds; anything else is carried but never drawn
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
    #[serde(other)]
    Unsupported,
}

/// A lon/lat bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    /// An inverted box that any `include` call will overwrite
    pub fn empty() -> Self {
        Self {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_lon > self.max_lon || self.min_lat > self.max_lat
    }

    pub fn include(&mut self, lon: f64, lat: f64) {
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
    }

    pub fn union(mut self, other: Bounds) -> Bounds {
        self.include(other.min_lon, other.min_lat);
        self.include(other.max_lon, other.max_lat);
        self
    }

    /// Grow the box by `degrees` on every side
    pub fn expand(self, degrees: f64) -> Bounds {
        Bounds {
            min_lon: self.min_lon - degrees,
            min_lat: self.min_lat - degrees,
            max_lon: self.max_lon + degrees,
            max_lat: self.max_lat + degrees,
        }
    }

    /// Clamp to the valid lon/lat range
    pub fn clamp_world(self) -> Bounds {
        Bounds {
            min_lon: self.min_lon.max(-180.0),
            min_lat: self.min_lat.max(-90.0),
            max_lon: self.max_lon.min(180.0),
            max_lat: self.max_lat.min(90.0),
        }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

impl Feature {
    /// A string property by key
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_str())
    }

    /// The polygons of this feature, each as its ring list (outer first)
    pub fn polygons(&self) -> Vec<&Vec<Ring>> {
        match &self.geometry {
            Some(Geometry::Polygon { coordinates }) => vec![coordinates],
            Some(Geometry::MultiPolygon { coordinates }) => coordinates.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.polygons()
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|pos| match pos.as_slice() {
                [lon, lat, ..] => Some((*lon, *lat)),
                _ => None,
            })
    }

    /// Bounding box over every ring, or None for empty geometry
    pub fn bounding_box(&self) -> Option<Bounds> {
        let mut bounds = Bounds::empty();
        for (lon, lat) in self.points() {
            bounds.include(lon, lat);
        }
        if bounds.is_empty() {
            None
        } else {
            Some(bounds)
        }
    }

    /// Area-weighted centroid over the outer rings, falling back to the
    /// vertex average for degenerate geometry.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let mut total_area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;

        for polygon in self.polygons() {
            let Some(outer) = polygon.first() else { continue };
            let (area, x, y) = ring_centroid(outer);
            total_area += area;
            cx += x * area;
            cy += y * area;
        }

        if total_area.abs() > f64::EPSILON {
            return Some((cx / total_area, cy / total_area));
        }

        // Degenerate (zero-area) geometry: average the vertices
        let mut n = 0u64;
        let (mut sx, mut sy) = (0.0, 0.0);
        for (lon, lat) in self.points() {
            sx += lon;
            sy += lat;
            n += 1;
        }
        if n == 0 {
            None
        } else {
            Some((sx / n as f64, sy / n as f64))
        }
    }
}

/// Shoelace area and centroid of a single ring
fn ring_centroid(ring: &Ring) -> (f64, f64, f64) {
    let pts: Vec<(f64, f64)> = ring
        .iter()
        .filter_map(|pos| match pos.as_slice() {
            [lon, lat, ..] => Some((*lon, *lat)),
            _ => None,
        })
        .collect();
    if pts.len() < 3 {
        return (0.0, 0.0, 0.0);
    }

    let mut area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..pts.len() {
        let (x0, y0) = pts[i];
        let (x1, y1) = pts[(i + 1) % pts.len()];
        let cross = x0 * y1 - x1 * y0;
        area += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }
    area /= 2.0;
    if area.abs() < f64::EPSILON {
        return (0.0, 0.0, 0.0);
    }
    (area.abs(), cx / (6.0 * area), cy / (6.0 * area))
}

impl WorldMap {
    /// Parse a GeoJSON FeatureCollection
    pub fn from_path(path: &Path) -> Result<WorldMap> {
        let file = File::open(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load a world map and drop features the choropleth never shades
    /// (French Guiana appears as a separate feature in some datasets).
    pub fn load(path: &Path) -> Result<WorldMap> {
        let mut map = Self::from_path(path)?;
        let before = map.features.len();
        map.features.retain(|f| {
            !["NAME", "NAME_EN"].iter().any(|key| {
                f.property(key)
                    .is_some_and(|v| v.to_lowercase().contains("french guiana"))
            })
        });
        if map.features.len() < before {
            info!("filtered {} French Guiana feature(s)", before - map.features.len());
        }
        info!("loaded world data with {} features", map.features.len());
        Ok(map)
    }

    /// Bounding box over all features
    pub fn total_bounds(&self) -> Option<Bounds> {
        self.features
            .iter()
            .filter_map(|f| f.bounding_box())
            .fold(None, |acc, b| Some(acc.map_or(b, |a| a.union(b))))
    }
}

/// Map bounds for rendering: the user-supplied box when given, otherwise
/// the matched features' bounds grown by `border_extension` degrees and
/// clamped to the world. Falls back to the whole map when nothing matched.
pub fn map_bounds(
    map: &WorldMap,
    matched_features: &[usize],
    border_extension: f64,
    custom: Option<Bounds>,
) -> Option<Bounds> {
    if let Some(custom) = custom {
        info!(
            "using custom map bounds: {}, {}, {}, {}",
            custom.min_lon, custom.min_lat, custom.max_lon, custom.max_lat
        );
        return Some(custom);
    }

    let mut bounds: Option<Bounds> = None;
    for &idx in matched_features {
        if let Some(b) = map.features.get(idx).and_then(|f| f.bounding_box()) {
            bounds = Some(bounds.map_or(b, |a| a.union(b)));
        }
    }

    let bounds = match bounds {
        Some(b) => b,
        None => {
            warn!("no countries matched in map data; using world bounds");
            map.total_bounds()?
        }
    };

    Some(bounds.expand(border_extension).clamp_world())
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// A map of unit squares, one per name, offset along the x axis
    pub fn world_with_names(names: &[&str]) -> WorldMap {
        let features = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let x = i as f64 * 10.0;
                let ring: Ring = vec![
                    vec![x, 0.0],
                    vec![x + 2.0, 0.0],
                    vec![x + 2.0, 2.0],
                    vec![x, 2.0],
                    vec![x, 0.0],
                ];
                let mut properties = BTreeMap::new();
                properties.insert(
                    "NAME".to_string(),
                    serde_json::Value::String(name.to_string()),
                );
                Feature {
                    properties: Some(properties),
                    geometry: Some(Geometry::Polygon {
                        coordinates: vec![ring],
                    }),
                }
            })
            .collect();
        WorldMap { features }
    }

    #[test]
    fn test_parse_feature_collection() {
        let geojson = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"NAME": "Norway", "POP_EST": 5347896},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[5.0, 58.0], [31.0, 58.0], [31.0, 71.0], [5.0, 71.0], [5.0, 58.0]]]
                }
            }]
        }"#;
        let map: WorldMap = serde_json::from_str(geojson).unwrap();

        assert_eq!(map.features.len(), 1);
        assert_eq!(map.features[0].property("NAME"), Some("Norway"));
        // Non-string properties are simply not visible as names
        assert_eq!(map.features[0].property("POP_EST"), None);
    }

    #[test]
    fn test_parse_unsupported_geometry() {
        let geojson = r#"{
            "features": [{
                "properties": {"NAME": "Point place"},
                "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}
            }]
        }"#;
        let map: WorldMap = serde_json::from_str(geojson).unwrap();

        assert!(map.features[0].polygons().is_empty());
        assert!(map.features[0].bounding_box().is_none());
    }

    #[test]
    fn test_bounding_box() {
        let map = world_with_names(&["A", "B"]);
        let b = map.features[1].bounding_box().unwrap();

        assert_eq!(b.min_lon, 10.0);
        assert_eq!(b.max_lon, 12.0);
        assert_eq!(b.max_lat, 2.0);
    }

    #[test]
    fn test_centroid_of_square() {
        let map = world_with_names(&["A"]);
        let (cx, cy) = map.features[0].centroid().unwrap();

        assert!((cx - 1.0).abs() < 1e-9);
        assert!((cy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_expand_and_clamp() {
        let b = Bounds {
            min_lon: -179.0,
            min_lat: -89.0,
            max_lon: 179.0,
            max_lat: 89.0,
        }
        .expand(5.0)
        .clamp_world();

        assert_eq!(b.min_lon, -180.0);
        assert_eq!(b.min_lat, -90.0);
        assert_eq!(b.max_lon, 180.0);
        assert_eq!(b.max_lat, 90.0);
    }

    #[test]
    fn test_map_bounds_prefers_custom() {
        let map = world_with_names(&["A"]);
        let custom = Bounds {
            min_lon: -10.0,
            min_lat: 35.0,
            max_lon: 45.0,
            max_lat: 70.0,
        };
        let b = map_bounds(&map, &[0], 5.0, Some(custom)).unwrap();

        assert_eq!(b, custom);
    }

    #[test]
    fn test_map_bounds_from_matched_features() {
        let map = world_with_names(&["A", "B"]);
        let b = map_bounds(&map, &[1], 1.0, None).unwrap();

        assert_eq!(b.min_lon, 9.0);
        assert_eq!(b.max_lon, 13.0);
    }

    #[test]
    fn test_map_bounds_falls_back_to_world() {
        let map = world_with_names(&["A", "B"]);
        let b = map_bounds(&map, &[], 0.0, None).unwrap();

        assert_eq!(b.min_lon, 0.0);
        assert_eq!(b.max_lon, 12.0);
    }
}
