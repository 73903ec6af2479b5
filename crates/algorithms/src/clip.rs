//! Clip a raster to an area of interest
//!
//! The AOI is reprojected to the raster's CRS, the raster is cropped to the
//! pixels whose centre falls inside the AOI, and every remaining pixel
//! outside the AOI polygons is set to NaN.

use crate::maybe_rayon::*;
use greenstack_core::raster::Raster;
use greenstack_core::{Aoi, Error, Result};
use tracing::debug;

/// Clip `raster` to `aoi`.
///
/// A raster without a CRS is assumed to share the AOI's CRS. The output
/// window covers the rows and columns holding at least one pixel centre
/// inside the AOI; its transform is shifted to the window origin and its
/// no-data value is NaN.
///
/// # Errors
/// - [`Error::EmptyGeometry`] when the AOI has no polygon or zero area
/// - [`Error::NoOverlap`] when no pixel centre of the raster lies in the AOI
pub fn clip_raster(raster: &Raster<f32>, aoi: &Aoi) -> Result<Raster<f32>> {
    if aoi.polygon_count() == 0 {
        return Err(Error::EmptyGeometry);
    }

    let aoi = match raster.crs() {
        Some(crs) => aoi.reprojected(crs)?,
        None => aoi.clone(),
    };

    let Some((min_x, min_y, max_x, max_y)) = aoi.bounds() else {
        return Err(Error::EmptyGeometry);
    };
    if !(aoi.area() > 0.0) {
        return Err(Error::EmptyGeometry);
    }

    let (rows, cols) = raster.shape();
    let gt = raster.transform();

    // Pixel-space bounding box of the AOI, snapped outward
    let corners = [
        gt.geo_to_pixel(min_x, min_y),
        gt.geo_to_pixel(min_x, max_y),
        gt.geo_to_pixel(max_x, min_y),
        gt.geo_to_pixel(max_x, max_y),
    ];
    if corners.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
        return Err(Error::Algorithm("raster has a degenerate geotransform".into()));
    }
    let (mut col_lo, mut col_hi) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut row_lo, mut row_hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(c, r) in &corners {
        col_lo = col_lo.min(c);
        col_hi = col_hi.max(c);
        row_lo = row_lo.min(r);
        row_hi = row_hi.max(r);
    }
    let col_lo = col_lo.floor().max(0.0);
    let col_hi = col_hi.ceil().min(cols as f64);
    let row_lo = row_lo.floor().max(0.0);
    let row_hi = row_hi.ceil().min(rows as f64);

    if col_hi <= col_lo || row_hi <= row_lo {
        return Err(Error::NoOverlap);
    }

    let (col_start, row_start) = (col_lo as usize, row_lo as usize);
    let win_cols = col_hi as usize - col_start;
    let win_rows = row_hi as usize - row_start;

    debug!(col_start, row_start, win_cols, win_rows, "AOI bounding window");

    // Pixel-centre mask over the bounding window
    let inside: Vec<bool> = (0..win_rows)
        .into_par_iter()
        .flat_map(|r| {
            let mut row_mask = vec![false; win_cols];
            for (c, cell) in row_mask.iter_mut().enumerate() {
                let (x, y) = gt.pixel_to_geo(col_start + c, row_start + r);
                *cell = aoi.contains(x, y);
            }
            row_mask
        })
        .collect();

    // Trim to the rows and columns that hold data
    let mut r_min = usize::MAX;
    let mut r_max = 0;
    let mut c_min = usize::MAX;
    let mut c_max = 0;
    for (i, _) in inside.iter().enumerate().filter(|&(_, &v)| v) {
        let (r, c) = (i / win_cols, i % win_cols);
        r_min = r_min.min(r);
        r_max = r_max.max(r);
        c_min = c_min.min(c);
        c_max = c_max.max(c);
    }
    if r_min == usize::MAX {
        return Err(Error::NoOverlap);
    }

    let mut out = raster.crop(
        row_start + r_min,
        col_start + c_min,
        r_max - r_min + 1,
        c_max - c_min + 1,
    )?;

    for ((r, c), value) in out.data_mut().indexed_iter_mut() {
        if !inside[(r_min + r) * win_cols + (c_min + c)] {
            *value = f32::NAN;
        }
    }
    out.set_nodata(Some(f32::NAN));

    debug!(shape = ?out.shape(), "clipped raster");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::{polygon, Polygon};
    use greenstack_core::crs::Projection;
    use greenstack_core::{GeoTransform, CRS};

    const ORIGIN_X: f64 = 334_000.0;
    const ORIGIN_Y: f64 = 6_252_000.0;

    /// 10 x 10 raster of 10 m pixels in UTM 56S; value = row * 10 + col
    fn utm_raster() -> Raster<f32> {
        let data = (0..100).map(|i| i as f32).collect();
        let mut r = Raster::from_vec(data, 10, 10).unwrap();
        r.set_transform(GeoTransform::new(ORIGIN_X, ORIGIN_Y, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32756)));
        r
    }

    fn utm_square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![
            (x: ORIGIN_X + x0, y: ORIGIN_Y - y0),
            (x: ORIGIN_X + x1, y: ORIGIN_Y - y0),
            (x: ORIGIN_X + x1, y: ORIGIN_Y - y1),
            (x: ORIGIN_X + x0, y: ORIGIN_Y - y1),
            (x: ORIGIN_X + x0, y: ORIGIN_Y - y0),
        ]
    }

    #[test]
    fn test_square_window() {
        let raster = utm_raster();
        let aoi = Aoi::new(vec![utm_square(20.0, 20.0, 60.0, 60.0)], CRS::from_epsg(32756));

        let out = clip_raster(&raster, &aoi).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert_eq!(out.get(0, 0).unwrap(), 22.0);
        assert_eq!(out.get(3, 3).unwrap(), 55.0);
        assert_relative_eq!(out.transform().origin_x, ORIGIN_X + 20.0);
        assert_relative_eq!(out.transform().origin_y, ORIGIN_Y - 20.0);
        assert_eq!(out.crs().unwrap().epsg(), Some(32756));
        assert!(out.nodata().unwrap().is_nan());
    }

    #[test]
    fn test_outside_polygon_is_nan() {
        let raster = utm_raster();
        // Right triangle over pixels (0..5, 0..5), hypotenuse from top-right to bottom-left
        let triangle = polygon![
            (x: ORIGIN_X, y: ORIGIN_Y),
            (x: ORIGIN_X + 50.0, y: ORIGIN_Y),
            (x: ORIGIN_X, y: ORIGIN_Y - 50.0),
            (x: ORIGIN_X, y: ORIGIN_Y),
        ];
        let aoi = Aoi::new(vec![triangle], CRS::from_epsg(32756));

        let out = clip_raster(&raster, &aoi).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert_eq!(out.get(0, 0).unwrap(), 0.0);
        assert_eq!(out.get(0, 3).unwrap(), 3.0);
        assert!(out.get(3, 3).unwrap().is_nan());
        assert!(out.get(1, 3).unwrap().is_nan());
        assert_eq!(out.get(3, 0).unwrap(), 30.0);
    }

    #[test]
    fn test_wgs84_aoi_is_reprojected() {
        let raster = utm_raster();
        let utm = Projection::from_epsg(32756).unwrap();
        let square = utm_square(20.0, 20.0, 60.0, 60.0);
        let lonlat: Polygon<f64> = Polygon::new(
            square
                .exterior()
                .coords()
                .map(|c| utm.to_wgs84(c.x, c.y))
                .collect::<Vec<_>>()
                .into(),
            vec![],
        );
        let aoi = Aoi::new(vec![lonlat], CRS::wgs84());

        let out = clip_raster(&raster, &aoi).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert_eq!(out.get(0, 0).unwrap(), 22.0);
    }

    #[test]
    fn test_raster_without_crs_uses_aoi_crs() {
        let mut raster = utm_raster();
        raster.set_crs(None);
        let aoi = Aoi::new(vec![utm_square(0.0, 0.0, 20.0, 20.0)], CRS::from_epsg(32756));
        let out = clip_raster(&raster, &aoi).unwrap();
        assert_eq!(out.shape(), (2, 2));
    }

    #[test]
    fn test_no_overlap() {
        let raster = utm_raster();
        let far = utm_square(500.0, 500.0, 600.0, 600.0);
        let aoi = Aoi::new(vec![far], CRS::from_epsg(32756));
        assert!(matches!(clip_raster(&raster, &aoi), Err(Error::NoOverlap)));
    }

    #[test]
    fn test_empty_or_degenerate_aoi() {
        let raster = utm_raster();

        let empty = Aoi::new(vec![], CRS::from_epsg(32756));
        assert!(matches!(clip_raster(&raster, &empty), Err(Error::EmptyGeometry)));

        let flat = utm_square(20.0, 20.0, 60.0, 20.0);
        let flat = Aoi::new(vec![flat], CRS::from_epsg(32756));
        assert!(matches!(clip_raster(&raster, &flat), Err(Error::EmptyGeometry)));
    }
}
