use snafu::Snafu;

use crate::primitives::Coordinate2D;
use crate::spatial_reference::SpatialReferenceOption;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))] // disables default `Snafu` suffix
pub enum Error {
    #[snafu(display(
        "{:?} is not a valid index in the bounds {:?}, {:?} ",
        index,
        min_index,
        max_index,
    ))]
    GridIndexOutOfBounds {
        index: Vec<isize>,
        min_index: Vec<isize>,
        max_index: Vec<isize>,
    },

    #[snafu(display(
        "Dimension capacity  ≠ data capacity ({} ≠ {})",
        dimension_cap,
        data_cap
    ))]
    DimensionCapacityDoesNotMatchDataCapacity {
        dimension_cap: usize,
        data_cap: usize,
    },

    #[snafu(display("A grid must have a positive width and height, got {width}×{height}"))]
    InvalidGridShape { width: usize, height: usize },

    #[snafu(display("A tile must have a positive width and height, got {width}×{height}"))]
    InvalidTileSize { width: usize, height: usize },

    #[snafu(display(
        "The conditions ll.x <= ur.x && ll.y <= ur.y are not met by ll:{} ur:{}",
        lower_left_coordinate,
        upper_right_coordinate
    ))]
    InvalidBoundingBox {
        lower_left_coordinate: Coordinate2D,
        upper_right_coordinate: Coordinate2D,
    },

    #[snafu(display("The geocoding {geo_transform:?} cannot be inverted"))]
    IncompatibleGeocoding { geo_transform: [f64; 6] },

    #[snafu(display(
        "Spatial reference {shape} of the shape does not match {grid} of the grid"
    ))]
    IncompatibleSpatialReference {
        shape: SpatialReferenceOption,
        grid: SpatialReferenceOption,
    },

    #[snafu(display("Invalid WKT: {details}"))]
    InvalidWkt { details: String },

    #[snafu(display("Unsupported geometry type `{geometry_type}`, expected a polygon"))]
    UnsupportedGeometryType { geometry_type: String },

    #[snafu(display("InvalidSpatialReferenceString: {}", spatial_reference_string))]
    InvalidSpatialReferenceString { spatial_reference_string: String },

    #[snafu(display("ParseU32: {}", source))]
    ParseU32 {
        source: <u32 as std::str::FromStr>::Err,
    },

    InvalidUuid,
}
