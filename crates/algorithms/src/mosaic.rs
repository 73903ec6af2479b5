//! Mosaic co-gridded tiles onto their union extent
//!
//! Earlier tiles take precedence: a cell takes the value of the first tile
//! holding a non-NaN value there. Cells covered by no tile are NaN.

use crate::maybe_rayon::*;
use greenstack_core::raster::{GeoTransform, Raster};
use greenstack_core::{Error, Result};
use ndarray::Array2;
use tracing::{debug, warn};

/// Relative tolerance when comparing pixel sizes
const PIXEL_SIZE_TOLERANCE: f64 = 1e-9;

/// Merge `tiles` into a single raster.
///
/// All tiles must be north-up, share the same pixel size and have
/// equivalent CRSs (tiles without a CRS are assumed to match).
pub fn mosaic(tiles: &[Raster<f32>]) -> Result<Raster<f32>> {
    let Some(first) = tiles.first() else {
        return Err(Error::NoInput("mosaic needs at least one tile".into()));
    };

    let reference = *first.transform();
    let crs = tiles.iter().find_map(Raster::crs).cloned();

    for tile in tiles {
        check_compatible(&reference, tile.transform())?;
        if let (Some(a), Some(b)) = (crs.as_ref(), tile.crs()) {
            if !a.is_equivalent(b) {
                return Err(Error::CrsMismatch(a.identifier(), b.identifier()));
            }
        }
    }

    let pixel_w = reference.pixel_width;
    let pixel_h = reference.pixel_height.abs();

    // Union extent
    let (mut min_x, mut min_y, mut max_x, mut max_y) = first.bounds();
    for tile in &tiles[1..] {
        let (x0, y0, x1, y1) = tile.bounds();
        min_x = min_x.min(x0);
        min_y = min_y.min(y0);
        max_x = max_x.max(x1);
        max_y = max_y.max(y1);
    }

    let cols = ((max_x - min_x) / pixel_w).round() as usize;
    let rows = ((max_y - min_y) / pixel_h).round() as usize;

    // Placement of every tile on the output grid: (row_off, col_off)
    let offsets: Vec<(usize, usize)> = tiles
        .iter()
        .map(|tile| {
            let gt = tile.transform();
            let col = (gt.origin_x - min_x) / pixel_w;
            let row = (max_y - gt.origin_y) / pixel_h;
            if (col - col.round()).abs() > 1e-6 || (row - row.round()).abs() > 1e-6 {
                warn!(col, row, "tile is not aligned to the mosaic grid, snapping");
            }
            (row.round() as usize, col.round() as usize)
        })
        .collect();

    debug!(rows, cols, tiles = tiles.len(), "mosaic grid");

    let data: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f32::NAN; cols];
            for (tile, &(row_off, col_off)) in tiles.iter().zip(&offsets) {
                if row < row_off || row >= row_off + tile.rows() {
                    continue;
                }
                let tile_row = row - row_off;
                for tile_col in 0..tile.cols() {
                    let Some(out) = row_data.get_mut(col_off + tile_col) else {
                        break;
                    };
                    if out.is_nan() {
                        *out = unsafe { tile.get_unchecked(tile_row, tile_col) };
                    }
                }
            }
            row_data
        })
        .collect();

    let mut output = Raster::from_array(
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?,
    );
    output.set_transform(GeoTransform::new(
        min_x,
        max_y,
        reference.pixel_width,
        reference.pixel_height,
    ));
    output.set_crs(crs);
    output.set_nodata(Some(f32::NAN));
    Ok(output)
}

fn check_compatible(reference: &GeoTransform, other: &GeoTransform) -> Result<()> {
    if !other.is_north_up() {
        return Err(Error::InvalidParameter {
            name: "transform",
            value: format!("{:?}", other.to_gdal()),
            reason: "mosaic tiles must be north-up".into(),
        });
    }

    let tol = reference.pixel_width.abs() * PIXEL_SIZE_TOLERANCE;
    if (reference.pixel_width - other.pixel_width).abs() > tol
        || (reference.pixel_height - other.pixel_height).abs() > tol
    {
        return Err(Error::InvalidParameter {
            name: "pixel size",
            value: format!("{} x {}", other.pixel_width, other.pixel_height),
            reason: format!(
                "expected {} x {}",
                reference.pixel_width, reference.pixel_height
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use greenstack_core::CRS;

    fn tile(origin_x: f64, origin_y: f64, values: Vec<f32>, rows: usize, cols: usize) -> Raster<f32> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(origin_x, origin_y, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32756)));
        r
    }

    #[test]
    fn test_side_by_side() {
        let west = tile(0.0, 20.0, vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let east = tile(20.0, 20.0, vec![5.0, 6.0, 7.0, 8.0], 2, 2);

        let out = mosaic(&[west, east]).unwrap();
        assert_eq!(out.shape(), (2, 4));
        assert_eq!(out.get(0, 0).unwrap(), 1.0);
        assert_eq!(out.get(1, 3).unwrap(), 8.0);
        assert_relative_eq!(out.transform().origin_x, 0.0);
        assert_relative_eq!(out.transform().origin_y, 20.0);
        assert_eq!(out.crs().unwrap().epsg(), Some(32756));
    }

    #[test]
    fn test_first_valid_wins() {
        let first = tile(0.0, 20.0, vec![1.0, f32::NAN, 1.0, 1.0], 2, 2);
        let second = tile(0.0, 20.0, vec![2.0, 2.0, 2.0, 2.0], 2, 2);

        let out = mosaic(&[first, second]).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 1.0);
        assert_eq!(out.get(0, 1).unwrap(), 2.0);
    }

    #[test]
    fn test_union_extent_has_nan_gaps() {
        let nw = tile(0.0, 40.0, vec![1.0; 4], 2, 2);
        let se = tile(20.0, 20.0, vec![2.0; 4], 2, 2);

        let out = mosaic(&[nw, se]).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert_eq!(out.get(0, 0).unwrap(), 1.0);
        assert_eq!(out.get(3, 3).unwrap(), 2.0);
        assert!(out.get(0, 3).unwrap().is_nan());
        assert!(out.get(3, 0).unwrap().is_nan());
    }

    #[test]
    fn test_rejects_incompatible_tiles() {
        assert!(matches!(mosaic(&[]), Err(Error::NoInput(_))));

        let a = tile(0.0, 20.0, vec![1.0; 4], 2, 2);
        let mut b = tile(20.0, 20.0, vec![1.0; 4], 2, 2);
        b.set_crs(Some(CRS::from_epsg(32755)));
        assert!(matches!(
            mosaic(&[a.clone(), b]),
            Err(Error::CrsMismatch(_, _))
        ));

        let mut c = tile(20.0, 20.0, vec![1.0; 4], 2, 2);
        c.set_transform(GeoTransform::new(20.0, 20.0, 20.0, -20.0));
        assert!(matches!(
            mosaic(&[a, c]),
            Err(Error::InvalidParameter { name: "pixel size", .. })
        ));
    }
}
