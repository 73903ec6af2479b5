//! Area of interest: polygons plus the CRS they are expressed in

use super::geojson::parse_geojson;
use crate::crs::{transformer, CRS};
use crate::error::{Error, Result};
use geo::{Area, BoundingRect, Contains};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use std::path::Path;

/// Polygonal area of interest.
///
/// Polygons are grouped per source feature so that [`Aoi::first_only`] can
/// keep exactly the first feature, multi-polygons included.
#[derive(Debug, Clone)]
pub struct Aoi {
    features: Vec<MultiPolygon<f64>>,
    crs: CRS,
}

impl Aoi {
    /// Build an AOI from polygons already expressed in `crs`.
    pub fn new(polygons: Vec<Polygon<f64>>, crs: CRS) -> Self {
        Self {
            features: vec![MultiPolygon::new(polygons)],
            crs,
        }
    }

    /// Parse a GeoJSON document and normalise it to EPSG:4326.
    ///
    /// A document without a `crs` member is taken to be EPSG:4326 already.
    /// Features without geometry are ignored; any non-polygonal geometry is
    /// rejected.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let doc = parse_geojson(text)?;
        let crs = doc.crs.unwrap_or_else(CRS::wgs84);

        let mut features = Vec::with_capacity(doc.geometries.len());
        for geometry in &doc.geometries {
            let mut polygons = Vec::new();
            collect_polygons(geometry, &mut polygons)?;
            features.push(MultiPolygon::new(polygons));
        }

        if features.iter().all(|mp| mp.0.is_empty()) {
            return Err(Error::DataFormat(
                "GeoJSON contains no polygon geometry".into(),
            ));
        }

        Self { features, crs }.to_epsg4326()
    }

    /// Read and parse a GeoJSON file, see [`Aoi::from_geojson_str`].
    pub fn from_geojson_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_geojson_str(&text)
    }

    /// Reproject to EPSG:4326. Already-geographic input is returned unchanged.
    pub fn to_epsg4326(self) -> Result<Self> {
        if self.crs.is_wgs84() {
            return Ok(self);
        }
        self.reprojected(&CRS::wgs84())
    }

    /// Copy of this AOI with every vertex reprojected to `target`.
    pub fn reprojected(&self, target: &CRS) -> Result<Self> {
        if self.crs.is_equivalent(target) {
            return Ok(self.clone());
        }

        let project = transformer(&self.crs, target)?;
        let features = self
            .features
            .iter()
            .map(|mp| MultiPolygon::new(mp.iter().map(|p| map_polygon(p, &project)).collect()))
            .collect();

        Ok(Self {
            features,
            crs: target.clone(),
        })
    }

    /// AOI restricted to the first feature's polygons
    pub fn first_only(&self) -> Self {
        Self {
            features: self.features.iter().take(1).cloned().collect(),
            crs: self.crs.clone(),
        }
    }

    /// All polygons, in feature order
    pub fn polygons(&self) -> impl Iterator<Item = &Polygon<f64>> {
        self.features.iter().flat_map(|mp| mp.iter())
    }

    pub fn polygon_count(&self) -> usize {
        self.features.iter().map(|mp| mp.0.len()).sum()
    }

    /// Number of source features that carried polygons
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Bounding box (min_x, min_y, max_x, max_y), `None` when there are no
    /// vertices
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.features
            .iter()
            .filter_map(|mp| mp.bounding_rect())
            .map(|r| (r.min().x, r.min().y, r.max().x, r.max().y))
            .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)))
    }

    /// Total unsigned area in CRS units squared
    pub fn area(&self) -> f64 {
        self.features.iter().map(|mp| mp.unsigned_area()).sum()
    }

    /// Whether the point lies strictly inside any polygon
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let point = Point::new(x, y);
        self.polygons().any(|p| p.contains(&point))
    }
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.iter() {
                collect_polygons(g, out)?;
            }
        }
        other => {
            return Err(Error::DataFormat(format!(
                "AOI geometry must be polygonal, got {}",
                geometry_name(other)
            )))
        }
    }
    Ok(())
}

fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::Triangle(_) => "Triangle",
        _ => "geometry",
    }
}

fn map_polygon(polygon: &Polygon<f64>, f: &impl Fn(f64, f64) -> (f64, f64)) -> Polygon<f64> {
    let ring = |ls: &LineString<f64>| {
        LineString::new(
            ls.coords()
                .map(|c| {
                    let (x, y) = f(c.x, c.y);
                    Coord { x, y }
                })
                .collect(),
        )
    };
    Polygon::new(
        ring(polygon.exterior()),
        polygon.interiors().iter().map(ring).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Projection;
    use approx::assert_relative_eq;

    const SQUARE_4326: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {},
             "geometry": {"type": "Polygon",
                          "coordinates": [[[151.20, -33.87], [151.21, -33.87],
                                           [151.21, -33.86], [151.20, -33.86],
                                           [151.20, -33.87]]]}},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "MultiPolygon",
                          "coordinates": [[[[151.30, -33.80], [151.31, -33.80],
                                            [151.31, -33.79], [151.30, -33.80]]],
                                          [[[151.40, -33.70], [151.41, -33.70],
                                            [151.41, -33.69], [151.40, -33.70]]]]}}
        ]
    }"#;

    #[test]
    fn test_epsg4326_input_is_untouched() {
        let aoi = Aoi::from_geojson_str(SQUARE_4326).unwrap();
        assert!(aoi.crs().is_wgs84());
        assert_eq!(aoi.polygon_count(), 3);
        assert_eq!(aoi.feature_count(), 2);

        let first = aoi.polygons().next().unwrap();
        assert_eq!(first.exterior().0[1], Coord { x: 151.21, y: -33.87 });

        let again = aoi.clone().to_epsg4326().unwrap();
        let a: Vec<_> = aoi.polygons().flat_map(|p| p.exterior().0.clone()).collect();
        let b: Vec<_> = again.polygons().flat_map(|p| p.exterior().0.clone()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_utm_geojson_is_reprojected() {
        let utm = Projection::from_epsg(32756).unwrap();
        let corners = [(151.20, -33.87), (151.21, -33.87), (151.21, -33.86), (151.20, -33.87)];
        let coords: Vec<String> = corners
            .iter()
            .map(|&(lon, lat)| {
                let (x, y) = utm.from_wgs84(lon, lat);
                format!("[{:.6}, {:.6}]", x, y)
            })
            .collect();
        let text = format!(
            r#"{{"type": "Feature",
                "crs": {{"type": "name", "properties": {{"name": "EPSG:32756"}}}},
                "properties": {{}},
                "geometry": {{"type": "Polygon", "coordinates": [[{}]]}}}}"#,
            coords.join(", ")
        );

        let aoi = Aoi::from_geojson_str(&text).unwrap();
        assert!(aoi.crs().is_wgs84());
        let ring = &aoi.polygons().next().unwrap().exterior().0;
        for (c, &(lon, lat)) in ring.iter().zip(corners.iter()) {
            assert_relative_eq!(c.x, lon, epsilon = 1e-6);
            assert_relative_eq!(c.y, lat, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reproject_round_trip() {
        let aoi = Aoi::from_geojson_str(SQUARE_4326).unwrap();
        let back = aoi
            .reprojected(&CRS::from_epsg(32756))
            .unwrap()
            .to_epsg4326()
            .unwrap();
        for (a, b) in aoi.polygons().zip(back.polygons()) {
            for (p, q) in a.exterior().coords().zip(b.exterior().coords()) {
                assert_relative_eq!(p.x, q.x, epsilon = 1e-6);
                assert_relative_eq!(p.y, q.y, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_first_only_and_bounds() {
        let aoi = Aoi::from_geojson_str(SQUARE_4326).unwrap();
        let (min_x, min_y, max_x, max_y) = aoi.bounds().unwrap();
        assert_relative_eq!(min_x, 151.20);
        assert_relative_eq!(min_y, -33.87);
        assert_relative_eq!(max_x, 151.41);
        assert_relative_eq!(max_y, -33.69);

        let first = aoi.first_only();
        assert_eq!(first.polygon_count(), 1);
        assert_relative_eq!(first.bounds().unwrap().2, 151.21);
        assert!(first.contains(151.205, -33.865));
        assert!(!first.contains(151.305, -33.795));
    }

    #[test]
    fn test_rejects_non_polygonal_input() {
        let point = r#"{"type": "Point", "coordinates": [1, 2]}"#;
        assert!(matches!(Aoi::from_geojson_str(point), Err(Error::DataFormat(_))));

        let empty = r#"{"type": "FeatureCollection", "features": []}"#;
        assert!(matches!(Aoi::from_geojson_str(empty), Err(Error::DataFormat(_))));

        let bad_crs = r#"{"type": "Polygon",
            "crs": {"type": "name", "properties": {"name": "EPSG:2193"}},
            "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}"#;
        assert!(matches!(Aoi::from_geojson_str(bad_crs), Err(Error::UnsupportedCrs(_))));
    }
}
