//! Vector input: GeoJSON and the area of interest built from it

mod aoi;
mod geojson;

pub use self::aoi::Aoi;
pub use self::geojson::{parse_geojson, GeoJsonDocument};
