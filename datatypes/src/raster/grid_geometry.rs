use crate::error;
use crate::primitives::{BoundingBox2D, Coordinate2D, PixelPos};
use crate::spatial_reference::SpatialReferenceOption;
use crate::util::Result;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::{GeoTransform, GridIdx2D, GridShape2D, GridSize, InverseGeoTransform};

/// The pixel grid of a product: its dimensions, its geocoding and the spatial reference
/// of the world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridGeometry {
    shape: GridShape2D,
    #[serde(default)]
    geo_transform: GeoTransform,
    #[serde(default)]
    spatial_reference: SpatialReferenceOption,
}

impl GridGeometry {
    /// Creates an unreferenced grid whose world coordinates equal its pixel coordinates
    ///
    /// # Errors
    ///
    /// Fails if `width` or `height` is zero.
    ///
    pub fn new(width: usize, height: usize) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            error::InvalidGridShape { width, height }
        );

        Ok(Self {
            shape: GridShape2D::new_2d(height, width),
            geo_transform: GeoTransform::default(),
            spatial_reference: SpatialReferenceOption::Unreferenced,
        })
    }

    #[must_use]
    pub fn with_geo_transform(mut self, geo_transform: GeoTransform) -> Self {
        self.geo_transform = geo_transform;
        self
    }

    #[must_use]
    pub fn with_spatial_reference(
        mut self,
        spatial_reference: impl Into<SpatialReferenceOption>,
    ) -> Self {
        self.spatial_reference = spatial_reference.into();
        self
    }

    pub fn width(&self) -> usize {
        self.shape.axis_size_x()
    }

    pub fn height(&self) -> usize {
        self.shape.axis_size_y()
    }

    pub fn shape(&self) -> GridShape2D {
        self.shape
    }

    pub fn number_of_pixels(&self) -> usize {
        self.shape.number_of_elements()
    }

    pub fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    pub fn spatial_reference(&self) -> SpatialReferenceOption {
        self.spatial_reference
    }

    pub fn contains(&self, grid_index: GridIdx2D) -> bool {
        self.shape.contains(&grid_index)
    }

    pub fn pixel_to_world(&self, pixel: PixelPos) -> Coordinate2D {
        self.geo_transform.pixel_to_world(pixel.x, pixel.y)
    }

    pub fn pixel_center_to_world(&self, grid_index: GridIdx2D) -> Coordinate2D {
        self.geo_transform
            .grid_idx_to_pixel_center_coordinate_2d(grid_index)
    }

    /// # Errors
    ///
    /// Fails with `IncompatibleGeocoding` if the geocoding cannot be inverted.
    ///
    pub fn world_to_pixel(&self, coordinate: Coordinate2D) -> Result<PixelPos> {
        self.geo_transform.world_to_pixel(coordinate)
    }

    /// # Errors
    ///
    /// Fails with `IncompatibleGeocoding` if the geocoding cannot be inverted.
    ///
    pub fn inverse_geo_transform(&self) -> Result<InverseGeoTransform> {
        self.geo_transform.inverse()
    }

    /// The world extent covered by all pixels
    pub fn bounding_box(&self) -> BoundingBox2D {
        let width = self.width() as f64;
        let height = self.height() as f64;

        let corners = [(0.0, 0.0), (width, 0.0), (0.0, height), (width, height)]
            .map(|(x, y)| self.geo_transform.pixel_to_world(x, y));

        BoundingBox2D::from_coord_iter(corners).unwrap_or_else(|| {
            BoundingBox2D::new_unchecked(self.geo_transform.origin_coordinate, corners[3])
        })
    }

    /// The geometry of a grid that samples every `x_step`-th column and `y_step`-th row
    /// of the region of `width` × `height` source pixels starting at `(x_offset, y_offset)`
    ///
    /// # Errors
    ///
    /// Fails if the region is not inside this grid or if the resulting grid is empty.
    ///
    pub fn subset(
        &self,
        x_offset: usize,
        y_offset: usize,
        width: usize,
        height: usize,
        x_step: usize,
        y_step: usize,
    ) -> Result<Self> {
        ensure!(
            x_step > 0 && y_step > 0,
            error::InvalidGridShape {
                width: x_step,
                height: y_step
            }
        );
        ensure!(
            x_offset + width <= self.width() && y_offset + height <= self.height(),
            error::GridIndexOutOfBounds {
                index: vec![
                    (y_offset + height) as isize - 1,
                    (x_offset + width) as isize - 1
                ],
                min_index: vec![0_isize, 0],
                max_index: vec![self.height() as isize - 1, self.width() as isize - 1],
            }
        );

        let subset = Self::new(width.div_ceil(x_step), height.div_ceil(y_step))?;

        Ok(subset
            .with_geo_transform(
                self.geo_transform
                    .subset(x_offset, y_offset, x_step, y_step),
            )
            .with_spatial_reference(self.spatial_reference))
    }
}

impl crate::util::test::TestDefault for GridGeometry {
    fn test_default() -> Self {
        Self {
            shape: GridShape2D::new_2d(8, 8),
            geo_transform: GeoTransform::default(),
            spatial_reference: SpatialReferenceOption::Unreferenced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::spatial_reference::SpatialReference;

    #[test]
    fn it_rejects_empty_grids() {
        assert!(matches!(
            GridGeometry::new(0, 5),
            Err(Error::InvalidGridShape {
                width: 0,
                height: 5
            })
        ));
        assert!(GridGeometry::new(5, 0).is_err());
    }

    #[test]
    fn default_geocoding_is_pixel_space() {
        let grid = GridGeometry::new(4, 3).unwrap();

        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.number_of_pixels(), 12);
        assert_eq!(
            grid.pixel_center_to_world([1, 2].into()),
            Coordinate2D::new(2.5, 1.5)
        );
        assert_eq!(
            grid.world_to_pixel((2.5, 1.5).into()).unwrap(),
            PixelPos::new(2.5, 1.5)
        );
        assert_eq!(
            grid.bounding_box(),
            BoundingBox2D::new((0.0, 0.0).into(), (4.0, 3.0).into()).unwrap()
        );
    }

    #[test]
    fn north_up_bounding_box() {
        let grid = GridGeometry::new(10, 5)
            .unwrap()
            .with_geo_transform(GeoTransform::new((100.0, 50.0).into(), 0.5, -0.5));

        assert_eq!(
            grid.bounding_box(),
            BoundingBox2D::new((100.0, 47.5).into(), (105.0, 50.0).into()).unwrap()
        );
    }

    #[test]
    fn subset_keeps_world_positions() {
        let grid = GridGeometry::new(10, 10)
            .unwrap()
            .with_geo_transform(GeoTransform::new((0.0, 10.0).into(), 1.0, -1.0))
            .with_spatial_reference(SpatialReference::epsg_4326());

        let subset = grid.subset(2, 3, 5, 4, 2, 2).unwrap();

        assert_eq!(subset.width(), 3);
        assert_eq!(subset.height(), 2);
        assert_eq!(subset.spatial_reference(), grid.spatial_reference());
        // centre of subset pixel (1, 1) is the centre of source pixel (4, 5)
        assert_eq!(
            subset.pixel_to_world(PixelPos::new(1.5, 1.5)),
            grid.pixel_to_world(PixelPos::new(4.5, 5.5))
        );

        assert!(grid.subset(8, 0, 3, 1, 1, 1).is_err());
        assert!(grid.subset(0, 0, 0, 1, 1, 1).is_err());
        assert!(grid.subset(0, 0, 1, 1, 0, 1).is_err());
    }
}
