use crate::error::{self, Error};
use crate::primitives::{Coordinate2D, PixelPos};
use crate::util::Result;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::{GridIdx, GridIdx2D};

/// The six affine parameters in the usual `[origin_x, a, b, origin_y, d, e]` layout:
///
/// ```text
/// world_x = origin_x + pixel_x * a + pixel_y * b
/// world_y = origin_y + pixel_x * d + pixel_y * e
/// ```
pub type GeoTransformParameters = [f64; 6];

/// The `GeoTransform` maps pixel space to world coordinates with a full affine transformation.
///
/// Pixel `(0, 0)` denotes the upper left corner of the upper left pixel; its centre is at `(0.5, 0.5)`.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoTransform {
    pub origin_coordinate: Coordinate2D,
    pub x_pixel_size: f64,
    /// world x change per pixel row
    #[serde(default)]
    pub x_rotation: f64,
    /// world y change per pixel column
    #[serde(default)]
    pub y_rotation: f64,
    pub y_pixel_size: f64,
}

impl GeoTransform {
    /// Generates a new north-up `GeoTransform` without rotation
    ///
    /// # Examples
    ///
    /// ```
    /// use rastercalc_datatypes::raster::GeoTransform;
    ///
    /// let geo_transform = GeoTransform::new((0.0, 0.0).into(), 1.0, -1.0);
    /// ```
    ///
    pub fn new(origin_coordinate: Coordinate2D, x_pixel_size: f64, y_pixel_size: f64) -> Self {
        Self {
            origin_coordinate,
            x_pixel_size,
            x_rotation: 0.0,
            y_rotation: 0.0,
            y_pixel_size,
        }
    }

    pub fn parameters(&self) -> GeoTransformParameters {
        (*self).into()
    }

    /// Transforms a (fractional) pixel position into world coordinates
    ///
    /// # Examples
    ///
    /// ```
    /// use rastercalc_datatypes::raster::GeoTransform;
    /// use rastercalc_datatypes::primitives::Coordinate2D;
    ///
    /// let geo_transform = GeoTransform::new((5.0, 5.0).into(), 1.0, -1.0);
    /// assert_eq!(geo_transform.pixel_to_world(1.0, 2.0), Coordinate2D::new(6.0, 3.0));
    /// ```
    ///
    #[inline]
    pub fn pixel_to_world(&self, pixel_x: f64, pixel_y: f64) -> Coordinate2D {
        Coordinate2D::new(
            self.origin_coordinate.x + pixel_x * self.x_pixel_size + pixel_y * self.x_rotation,
            self.origin_coordinate.y + pixel_x * self.y_rotation + pixel_y * self.y_pixel_size,
        )
    }

    /// The world coordinate of the upper left corner of a pixel
    pub fn grid_idx_to_upper_left_coordinate_2d(&self, grid_index: GridIdx2D) -> Coordinate2D {
        let GridIdx([y, x]) = grid_index;
        self.pixel_to_world(x as f64, y as f64)
    }

    /// The world coordinate of the centre of a pixel
    pub fn grid_idx_to_pixel_center_coordinate_2d(&self, grid_index: GridIdx2D) -> Coordinate2D {
        let GridIdx([y, x]) = grid_index;
        self.pixel_to_world(x as f64 + 0.5, y as f64 + 0.5)
    }

    fn determinant(&self) -> f64 {
        self.x_pixel_size * self.y_pixel_size - self.x_rotation * self.y_rotation
    }

    /// A geocoding is valid if all parameters are finite and it can be inverted
    pub fn is_invertible(&self) -> bool {
        let determinant = self.determinant();
        self.parameters().iter().all(|p| p.is_finite())
            && determinant != 0.0
            && determinant.is_finite()
    }

    /// Computes the mapping from world coordinates back to pixel space
    ///
    /// # Errors
    ///
    /// Fails with `IncompatibleGeocoding` if the transformation is singular or not finite.
    ///
    pub fn inverse(&self) -> Result<InverseGeoTransform> {
        ensure!(
            self.is_invertible(),
            error::IncompatibleGeocoding {
                geo_transform: self.parameters()
            }
        );

        let inverse_determinant = 1.0 / self.determinant();

        Ok(InverseGeoTransform {
            origin_coordinate: self.origin_coordinate,
            a: self.y_pixel_size * inverse_determinant,
            b: -self.x_rotation * inverse_determinant,
            d: -self.y_rotation * inverse_determinant,
            e: self.x_pixel_size * inverse_determinant,
        })
    }

    /// Transforms a world coordinate into a (fractional) pixel position
    ///
    /// # Errors
    ///
    /// Fails if the transformation cannot be inverted.
    ///
    pub fn world_to_pixel(&self, coordinate: Coordinate2D) -> Result<PixelPos> {
        Ok(self.inverse()?.world_to_pixel(coordinate))
    }

    /// The transform of a raster whose pixel `(i, j)` is pixel
    /// `(x_offset + i * x_step, y_offset + j * y_step)` of this raster.
    ///
    /// Pixel centres of the subset lie on the centres of the sampled pixels, so with a step
    /// above one the subset origin is `(step - 1) / 2` pixels before the offset.
    #[must_use]
    pub fn subset(&self, x_offset: usize, y_offset: usize, x_step: usize, y_step: usize) -> Self {
        let x_step = x_step as f64;
        let y_step = y_step as f64;

        Self {
            origin_coordinate: self.pixel_to_world(
                x_offset as f64 - (x_step - 1.0) / 2.0,
                y_offset as f64 - (y_step - 1.0) / 2.0,
            ),
            x_pixel_size: self.x_pixel_size * x_step,
            x_rotation: self.x_rotation * y_step,
            y_rotation: self.y_rotation * x_step,
            y_pixel_size: self.y_pixel_size * y_step,
        }
    }
}

/// World coordinates equal pixel coordinates
impl Default for GeoTransform {
    fn default() -> Self {
        GeoTransform::new((0.0, 0.0).into(), 1.0, 1.0)
    }
}

impl From<GeoTransformParameters> for GeoTransform {
    fn from(parameters: GeoTransformParameters) -> Self {
        let [origin_x, a, b, origin_y, d, e] = parameters;
        Self {
            origin_coordinate: (origin_x, origin_y).into(),
            x_pixel_size: a,
            x_rotation: b,
            y_rotation: d,
            y_pixel_size: e,
        }
    }
}

impl From<GeoTransform> for GeoTransformParameters {
    fn from(geo_transform: GeoTransform) -> GeoTransformParameters {
        [
            geo_transform.origin_coordinate.x,
            geo_transform.x_pixel_size,
            geo_transform.x_rotation,
            geo_transform.origin_coordinate.y,
            geo_transform.y_rotation,
            geo_transform.y_pixel_size,
        ]
    }
}

/// The inverse of a [`GeoTransform`], mapping world coordinates to pixel space
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct InverseGeoTransform {
    origin_coordinate: Coordinate2D,
    a: f64,
    b: f64,
    d: f64,
    e: f64,
}

impl InverseGeoTransform {
    #[inline]
    pub fn world_to_pixel(&self, coordinate: Coordinate2D) -> PixelPos {
        let dx = coordinate.x - self.origin_coordinate.x;
        let dy = coordinate.y - self.origin_coordinate.y;

        PixelPos::new(self.a * dx + self.b * dy, self.d * dx + self.e * dy)
    }
}

impl TryFrom<GeoTransform> for InverseGeoTransform {
    type Error = Error;

    fn try_from(geo_transform: GeoTransform) -> Result<Self, Self::Error> {
        geo_transform.inverse()
    }
}
