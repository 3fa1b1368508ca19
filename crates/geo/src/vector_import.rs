//! # Point Data Import
//!
//! Loads fountain locations from an Overpass API JSON dump or from GeoJSON,
//! and converts Overpass dumps into GeoJSON for tile tooling.
//!
//! ## Table of Contents
//! 1. Overpass dump — Raw element model
//! 2. Overpass import / conversion
//! 3. GeoJSON import
//! 4. Feature property extraction

use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde::Deserialize;
use std::path::Path;

use crate::coords::PointOfInterest;
use crate::error::{GeoError, Result};

// ============================================================================
// 1. Overpass dump — Raw element model
// ============================================================================

/// Top level of an Overpass `[out:json]` response
#[derive(Debug, Deserialize)]
struct OverpassDump {
    elements: Vec<OverpassElement>,
}

/// One node, way or relation. Ways and relations carry a `center` when the
/// query used `out center`.
#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: JsonObject,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

impl OverpassElement {
    /// (lat, lon) from the node itself or its center
    fn location(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon, &self.center) {
            (Some(lat), Some(lon), _) => Some((lat, lon)),
            (_, _, Some(center)) => Some((center.lat, center.lon)),
            _ => None,
        }
    }
}

// ============================================================================
// 2. Overpass import / conversion
// ============================================================================

/// Parse an Overpass JSON dump into points. Elements without coordinates are
/// skipped.
pub fn parse_overpass(json: &str) -> Result<Vec<PointOfInterest>> {
    let dump: OverpassDump = serde_json::from_str(json)?;
    let total = dump.elements.len();

    let points: Vec<PointOfInterest> = dump
        .elements
        .into_iter()
        .filter_map(|element| {
            let (lat, lon) = element.location()?;
            let mut point = PointOfInterest::new(lat, lon);
            point.name = extract_name(&element.tags);
            point.osm_id = element.id;
            Some(point)
        })
        .collect();

    if points.len() < total {
        tracing::debug!("Skipped {} Overpass elements without coordinates", total - points.len());
    }
    tracing::info!("Parsed {} points from Overpass dump", points.len());
    Ok(points)
}

/// Convert an Overpass JSON dump into a GeoJSON FeatureCollection of Point
/// features, keeping element tags as properties.
pub fn overpass_to_geojson(json: &str) -> Result<FeatureCollection> {
    let dump: OverpassDump = serde_json::from_str(json)?;

    let features: Vec<Feature> = dump
        .elements
        .into_iter()
        .filter_map(|element| {
            let (lat, lon) = element.location()?;
            Some(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![lon, lat]))),
                id: element.id.map(|id| Id::Number(id.into())),
                properties: Some(element.tags),
                foreign_members: None,
            })
        })
        .collect();

    tracing::info!("Converted {} Overpass elements to GeoJSON", features.len());
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

// ============================================================================
// 3. GeoJSON import
// ============================================================================

/// Import a GeoJSON file of Point features
pub fn import_geojson(path: &Path) -> Result<Vec<PointOfInterest>> {
    let content = std::fs::read_to_string(path).map_err(|source| GeoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let points = parse_geojson(&content)?;

    tracing::info!("Imported {} points from {}", points.len(), path.display());
    Ok(points)
}

/// Parse GeoJSON text. Point features become points; every other geometry
/// type is skipped.
pub fn parse_geojson(content: &str) -> Result<Vec<PointOfInterest>> {
    let geojson: GeoJson = content.parse()?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let total = features.len();
    let points: Vec<PointOfInterest> = features.iter().filter_map(feature_to_point).collect();
    if points.len() < total {
        tracing::debug!("Skipped {} non-point features", total - points.len());
    }
    Ok(points)
}

fn feature_to_point(feature: &Feature) -> Option<PointOfInterest> {
    let geometry = feature.geometry.as_ref()?;
    let Value::Point(coord) = &geometry.value else {
        return None;
    };
    // GeoJSON positions are [lon, lat, ...]
    let (lon, lat) = match coord.as_slice() {
        [lon, lat, ..] => (*lon, *lat),
        _ => return None,
    };

    let mut point = PointOfInterest::new(lat, lon);
    if let Some(properties) = &feature.properties {
        point.name = extract_name(properties);
        point.osm_id = extract_osm_id(properties);
    }
    if point.osm_id.is_none() {
        if let Some(Id::Number(n)) = &feature.id {
            point.osm_id = n.as_i64();
        }
    }
    Some(point)
}

// ============================================================================
// 4. Feature property extraction
// ============================================================================

/// Extract a "name" property from feature properties or element tags
fn extract_name(properties: &JsonObject) -> Option<String> {
    properties
        .get("name")
        .or_else(|| properties.get("Name"))
        .or_else(|| properties.get("NAME"))
        .and_then(|v| v.as_str().map(|s| s.to_string()))
}

/// OSM id from an `osm_id` property or an `@id` of the form `node/123`
fn extract_osm_id(properties: &JsonObject) -> Option<i64> {
    if let Some(id) = properties.get("osm_id").and_then(|v| v.as_i64()) {
        return Some(id);
    }
    properties
        .get("@id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.rsplit('/').next())
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DUMP: &str = r#"{
        "version": 0.6,
        "elements": [
            {"type": "node", "id": 101, "lat": 48.8566, "lon": 2.3522,
             "tags": {"amenity": "drinking_water", "name": "Wallace"}},
            {"type": "node", "id": 102, "lat": 48.86, "lon": 2.36,
             "tags": {"amenity": "drinking_water"}},
            {"type": "way", "id": 203, "center": {"lat": 48.87, "lon": 2.37}},
            {"type": "relation", "id": 304}
        ]
    }"#;

    #[test]
    fn test_parse_overpass() {
        let points = parse_overpass(DUMP).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].name.as_deref(), Some("Wallace"));
        assert_eq!(points[0].osm_id, Some(101));
        assert_eq!(points[1].display_name(), "Drinking water");
        assert_eq!(points[2].position.latitude, 48.87);
        assert_eq!(points[2].osm_id, Some(203));
    }

    #[test]
    fn test_overpass_requires_elements() {
        assert!(matches!(parse_overpass(r#"{"version": 0.6}"#), Err(GeoError::Json(_))));
        assert!(matches!(overpass_to_geojson("not json"), Err(GeoError::Json(_))));
    }

    #[test]
    fn test_overpass_to_geojson_round_trips_through_import() {
        let collection = overpass_to_geojson(DUMP).unwrap();
        assert_eq!(collection.features.len(), 3);

        let first = &collection.features[0];
        match &first.geometry.as_ref().unwrap().value {
            Value::Point(coord) => assert_eq!(coord, &vec![2.3522, 48.8566]),
            other => panic!("expected a point, got {other:?}"),
        }
        let properties = first.properties.as_ref().unwrap();
        assert_eq!(properties.get("amenity").and_then(|v| v.as_str()), Some("drinking_water"));

        let text = serde_json::to_string(&collection).unwrap();
        let points = parse_geojson(&text).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].name.as_deref(), Some("Wallace"));
        assert_eq!(points[0].osm_id, Some(101));
    }

    #[test]
    fn test_parse_geojson_skips_non_points() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"NAME": "Fontaine", "@id": "node/77"},
                 "geometry": {"type": "Point", "coordinates": [4.83, 45.76]}},
                {"type": "Feature", "properties": null,
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
                {"type": "Feature", "properties": {}, "geometry": null}
            ]
        }"#;
        let points = parse_geojson(text).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].position.latitude, 45.76);
        assert_eq!(points[0].position.longitude, 4.83);
        assert_eq!(points[0].name.as_deref(), Some("Fontaine"));
        assert_eq!(points[0].osm_id, Some(77));
    }

    #[test]
    fn test_parse_bare_geometry() {
        let points = parse_geojson(r#"{"type": "Point", "coordinates": [10.0, 20.0]}"#).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].position.latitude, 20.0);
    }

    #[test]
    fn test_import_geojson_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let collection = overpass_to_geojson(DUMP).unwrap();
        write!(file, "{}", serde_json::to_string(&collection).unwrap()).unwrap();
        assert_eq!(import_geojson(file.path()).unwrap().len(), 3);

        assert!(matches!(
            import_geojson(Path::new("/nonexistent/fountains.geojson")),
            Err(GeoError::Io { .. })
        ));
        assert!(matches!(parse_geojson("{\"type\": \"Nope\"}"), Err(GeoError::GeoJson(_))));
    }
}
