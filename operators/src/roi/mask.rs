use rastercalc_datatypes::primitives::Shape;
use rastercalc_datatypes::raster::{
    Grid2D, GridGeometry, GridIdx2D, GridIndexAccess, GridShape2D, TileInformation,
};
use rastercalc_expression::{ExpressionParser, is_true};
use rayon::prelude::*;
use snafu::ensure;

use super::PointInPolygonTester;
use crate::engine::ExecutionContext;
use crate::error::{self, Error};
use crate::product::Product;
use crate::util::Result;

/// A region of interest: one flag per pixel of a grid
#[derive(Debug, Clone, PartialEq)]
pub struct RoiMask {
    mask: Grid2D<bool>,
}

impl RoiMask {
    pub fn new(mask: Grid2D<bool>) -> Self {
        Self { mask }
    }

    /// A mask of `shape` with every pixel set to `included`
    pub fn filled(shape: GridShape2D, included: bool) -> Self {
        Self::new(Grid2D::new_filled(shape, included))
    }

    /// Includes every pixel whose centre lies inside `shape`.
    ///
    /// Only pixels inside the bounding box of the shape are tested.
    ///
    /// # Errors
    ///
    /// Fails with `IncompatibleGeocoding` if the spatial references of shape and grid differ or
    /// the geocoding of the grid cannot be inverted.
    ///
    pub fn rasterize(shape: &Shape, grid: &GridGeometry) -> Result<Self> {
        if !shape
            .spatial_reference()
            .is_compatible_with(&grid.spatial_reference())
        {
            return Err(Error::IncompatibleGeocoding {
                source: rastercalc_datatypes::error::Error::IncompatibleSpatialReference {
                    shape: shape.spatial_reference(),
                    grid: grid.spatial_reference(),
                },
            });
        }

        let inverse = grid.inverse_geo_transform()?;

        let mut mask = Self::filled(grid.shape(), false);

        let Some(bounding_box) = shape.bounding_box() else {
            tracing::debug!("rasterizing a degenerate shape");
            return Ok(mask);
        };

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for corner in bounding_box.corners() {
            let pixel = inverse.world_to_pixel(corner);
            min_x = min_x.min(pixel.x);
            min_y = min_y.min(pixel.y);
            max_x = max_x.max(pixel.x);
            max_y = max_y.max(pixel.y);
        }

        let Some((x_range, y_range)) = candidate_ranges(grid, [min_x, max_x], [min_y, max_y])
        else {
            return Ok(mask);
        };

        let tester = PointInPolygonTester::new(shape);
        let width = grid.width();

        for y in y_range {
            for x in x_range.clone() {
                let center = grid.pixel_center_to_world(GridIdx2D::new_y_x(y as isize, x as isize));
                if tester.any_polygon_contains_coordinate(&center) {
                    mask.mask.data[y * width + x] = true;
                }
            }
        }

        tracing::debug!(included = mask.count(), "rasterized shape");

        Ok(mask)
    }

    /// Includes every pixel for which `formula` is true, i.e. neither zero nor NaN.
    ///
    /// # Errors
    ///
    /// Fails for invalid formulas, unknown bands and cyclic virtual bands.
    ///
    pub fn from_expression(product: &Product, formula: &str, ctx: &ExecutionContext) -> Result<Self> {
        let expression = ExpressionParser::default().parse(formula)?;
        product.check_references(expression.referenced_variables())?;

        let tiles: Vec<TileInformation> = ctx
            .tiling_strategy(product.shape())
            .tile_information_iter()
            .collect();

        let evaluated = ctx.thread_pool().install(|| {
            tiles
                .par_iter()
                .map(|tile| product.evaluate_tile_prechecked(&expression, tile))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut mask = Grid2D::new_filled(product.shape(), false);
        for tile in evaluated {
            let flags = tile.grid_array.map(is_true);
            mask.grid_blit_from(&flags, tile.tile_information.global_upper_left_pixel_idx)?;
        }

        Ok(Self::new(mask))
    }

    pub fn shape(&self) -> GridShape2D {
        self.mask.shape
    }

    pub fn grid(&self) -> &Grid2D<bool> {
        &self.mask
    }

    pub fn into_grid(self) -> Grid2D<bool> {
        self.mask
    }

    /// Is the pixel included? Pixels outside the mask are not.
    pub fn is_included(&self, pixel: GridIdx2D) -> bool {
        self.mask.get_at_grid_index(pixel).unwrap_or(false)
    }

    /// The number of included pixels
    pub fn count(&self) -> usize {
        self.mask.data.iter().filter(|included| **included).count()
    }

    /// Pixels included in both masks
    pub fn and(&self, other: &Self) -> Result<Self> {
        self.combine(other, |a, b| a && b)
    }

    /// Pixels included in either mask
    pub fn or(&self, other: &Self) -> Result<Self> {
        self.combine(other, |a, b| a || b)
    }

    #[must_use]
    pub fn invert(&self) -> Self {
        Self::new(self.mask.clone().map(|included| !included))
    }

    fn combine(&self, other: &Self, f: impl Fn(bool, bool) -> bool) -> Result<Self> {
        self.ensure_shape(other.shape())?;

        let data = self
            .mask
            .data
            .iter()
            .zip(&other.mask.data)
            .map(|(a, b)| f(*a, *b))
            .collect();

        Ok(Self::new(Grid2D {
            shape: self.shape(),
            data,
        }))
    }

    /// # Errors
    ///
    /// Fails with `MaskShapeMismatch` if the mask does not have the given shape.
    ///
    pub fn ensure_shape(&self, expected: GridShape2D) -> Result<()> {
        ensure!(
            self.shape() == expected,
            error::MaskShapeMismatch {
                expected: expected.into_inner(),
                found: self.shape().into_inner(),
            }
        );
        Ok(())
    }
}

/// The pixel columns and rows whose centres may lie inside `[min_x, max_x] × [min_y, max_y]`
fn candidate_ranges(
    grid: &GridGeometry,
    [min_x, max_x]: [f64; 2],
    [min_y, max_y]: [f64; 2],
) -> Option<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let axis = |min: f64, max: f64, size: usize| -> Option<std::ops::Range<usize>> {
        if !(min.is_finite() && max.is_finite()) {
            return (size > 0).then_some(0..size);
        }

        let start = (min - 0.5).floor().max(0.0);
        let end = ((max - 0.5).ceil() + 1.0).min(size as f64);

        (start < end).then(|| start as usize..end as usize)
    };

    Some((
        axis(min_x, max_x, grid.width())?,
        axis(min_y, max_y, grid.height())?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Band;
    use rastercalc_datatypes::primitives::{BoundingBox2D, Coordinate2D};
    use rastercalc_datatypes::raster::{GeoTransform, RasterDataType};
    use rastercalc_datatypes::spatial_reference::SpatialReference;
    use rastercalc_datatypes::util::test::TestDefault;

    fn rectangle(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Shape {
        Shape::rectangle(
            BoundingBox2D::new((x_min, y_min).into(), (x_max, y_max).into()).unwrap(),
        )
    }

    #[test]
    fn rectangles_cover_exactly_their_pixels() {
        let grid = GridGeometry::new(100, 100).unwrap();

        let mask = RoiMask::rasterize(&rectangle(10., 10., 20., 20.), &grid).unwrap();

        assert_eq!(mask.count(), 100);
        for y in 0..100 {
            for x in 0..100 {
                let inside = (10..20).contains(&x) && (10..20).contains(&y);
                assert_eq!(mask.is_included(GridIdx2D::new_y_x(y, x)), inside);
            }
        }
    }

    #[test]
    fn world_coordinates_are_mapped_through_the_geocoding() {
        // north-up grid with 10 units per pixel and the origin at (1000, 500)
        let grid = GridGeometry::new(20, 10)
            .unwrap()
            .with_geo_transform(GeoTransform::new((1000., 500.).into(), 10., -10.));

        let mask = RoiMask::rasterize(&rectangle(1050., 450., 1100., 480.), &grid).unwrap();

        assert_eq!(mask.count(), 5 * 3);
        assert!(mask.is_included(GridIdx2D::new_y_x(2, 5)));
        assert!(mask.is_included(GridIdx2D::new_y_x(4, 9)));
        assert!(!mask.is_included(GridIdx2D::new_y_x(5, 9)));
        assert!(!mask.is_included(GridIdx2D::new_y_x(2, 10)));
    }

    #[test]
    fn holes_and_parts() {
        let grid = GridGeometry::test_default();
        let exterior: Vec<Coordinate2D> =
            vec![(0., 0.).into(), (6., 0.).into(), (6., 6.).into(), (0., 6.).into()];
        let hole: Vec<Coordinate2D> =
            vec![(2., 2.).into(), (4., 2.).into(), (4., 4.).into(), (2., 4.).into()];
        let second: Vec<Coordinate2D> =
            vec![(7., 7.).into(), (8., 7.).into(), (8., 8.).into(), (7., 8.).into()];

        let shape = Shape::new(vec![vec![exterior, hole], vec![second]]);
        let mask = RoiMask::rasterize(&shape, &grid).unwrap();

        assert_eq!(mask.count(), 36 - 4 + 1);
        assert!(!mask.is_included(GridIdx2D::new_y_x(3, 3)));
        assert!(mask.is_included(GridIdx2D::new_y_x(7, 7)));
    }

    #[test]
    fn degenerate_and_distant_shapes_include_nothing() {
        let grid = GridGeometry::test_default();

        let line = Shape::new(vec![vec![vec![(0., 0.).into(), (5., 5.).into()]]]);
        assert_eq!(RoiMask::rasterize(&line, &grid).unwrap().count(), 0);
        assert_eq!(RoiMask::rasterize(&Shape::default(), &grid).unwrap().count(), 0);
        assert_eq!(
            RoiMask::rasterize(&rectangle(-50., -50., -40., -40.), &grid)
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn incompatible_geocodings_are_rejected() {
        let singular = GridGeometry::test_default()
            .with_geo_transform(GeoTransform::new((0., 0.).into(), 0., 1.));
        assert!(matches!(
            RoiMask::rasterize(&rectangle(0., 0., 1., 1.), &singular),
            Err(Error::IncompatibleGeocoding { .. })
        ));

        let referenced = GridGeometry::test_default().with_spatial_reference(SpatialReference::epsg_4326());
        let other = rectangle(0., 0., 1., 1.)
            .with_spatial_reference("EPSG:3857".parse::<SpatialReference>().unwrap().into());
        assert!(matches!(
            RoiMask::rasterize(&other, &referenced),
            Err(Error::IncompatibleGeocoding { .. })
        ));

        let unreferenced = rectangle(0., 0., 1., 1.);
        assert_eq!(RoiMask::rasterize(&unreferenced, &referenced).unwrap().count(), 1);
    }

    #[test]
    fn masks_from_expressions() {
        let mut product = Product::new("p", 5, 3).unwrap();
        product
            .add_band(Band::from_data(
                "b1",
                RasterDataType::F32,
                Grid2D::new([3, 5].into(), (0..15).map(f64::from).collect()).unwrap(),
            ))
            .unwrap();

        let ctx = ExecutionContext::test_default();

        let mask = RoiMask::from_expression(&product, "b1 > 4 && X < 3", &ctx).unwrap();
        assert_eq!(mask.shape(), product.shape());
        assert_eq!(mask.count(), 6);
        assert!(mask.is_included(GridIdx2D::new_y_x(1, 0)));
        assert!(!mask.is_included(GridIdx2D::new_y_x(1, 3)));

        // NaN is false
        assert_eq!(RoiMask::from_expression(&product, "NaN", &ctx).unwrap().count(), 0);

        assert!(matches!(
            RoiMask::from_expression(&product, "b2 > 1", &ctx),
            Err(Error::UnboundVariable { variable }) if variable == "b2"
        ));
    }

    #[test]
    fn combination_and_inversion() {
        let grid = GridGeometry::test_default();
        let left = RoiMask::rasterize(&rectangle(0., 0., 4., 8.), &grid).unwrap();
        let top = RoiMask::rasterize(&rectangle(0., 0., 8., 2.), &grid).unwrap();

        assert_eq!(left.and(&top).unwrap().count(), 8);
        assert_eq!(left.or(&top).unwrap().count(), 32 + 8);
        assert_eq!(left.invert().count(), 32);
        assert_eq!(left.invert().invert(), left);

        let other = RoiMask::filled([2, 2].into(), true);
        assert!(matches!(
            left.and(&other),
            Err(Error::MaskShapeMismatch {
                expected: [8, 8],
                found: [2, 2]
            })
        ));
    }
}
