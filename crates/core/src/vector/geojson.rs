//! GeoJSON input via the `geojson` crate, plus the legacy `crs` member

use crate::crs::CRS;
use crate::error::{Error, Result};
use geo_types::Geometry;
use ::geojson::{GeoJson, JsonObject, JsonValue};

/// Geometries of a GeoJSON document and the CRS it declares
#[derive(Debug, Clone)]
pub struct GeoJsonDocument {
    /// One geometry per feature that has one, in document order. A bare
    /// geometry document yields exactly one.
    pub geometries: Vec<Geometry<f64>>,
    /// CRS named by the legacy `crs` member, if any
    pub crs: Option<CRS>,
}

/// Parse a GeoJSON FeatureCollection, Feature or bare geometry.
pub fn parse_geojson(text: &str) -> Result<GeoJsonDocument> {
    let geojson: GeoJson = text.parse().map_err(malformed)?;

    let (raw, foreign) = match geojson {
        GeoJson::FeatureCollection(fc) => (
            fc.features.into_iter().filter_map(|f| f.geometry).collect(),
            fc.foreign_members,
        ),
        GeoJson::Feature(f) => (f.geometry.into_iter().collect(), f.foreign_members),
        GeoJson::Geometry(g) => {
            let foreign = g.foreign_members.clone();
            (vec![g], foreign)
        }
    };

    let crs = foreign.as_ref().map(crs_member).transpose()?.flatten();
    let geometries = raw
        .into_iter()
        .map(|g| Geometry::<f64>::try_from(g).map_err(malformed))
        .collect::<Result<Vec<_>>>()?;

    Ok(GeoJsonDocument { geometries, crs })
}

/// `{"crs": {"type": "name", "properties": {"name": "EPSG:32756"}}}`
fn crs_member(members: &JsonObject) -> Result<Option<CRS>> {
    let value = match members.get("crs") {
        Some(JsonValue::Null) | None => return Ok(None),
        Some(value) => value,
    };
    let name = value
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::DataFormat("GeoJSON: 'crs' member without properties.name".into()))?;
    CRS::from_identifier(name).map(Some)
}

fn malformed(e: ::geojson::Error) -> Error {
    Error::DataFormat(format!("GeoJSON: {}", e))
}
