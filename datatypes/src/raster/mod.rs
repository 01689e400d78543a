mod data_type;
mod geo_transform;
mod grid;
mod grid_geometry;
mod grid_index;
mod grid_traits;
mod raster_tile;
mod tiling;

pub use self::data_type::RasterDataType;
pub use self::geo_transform::{GeoTransform, GeoTransformParameters, InverseGeoTransform};
pub use self::grid::{Grid, Grid2D, GridShape, GridShape2D};
pub use self::grid_geometry::GridGeometry;
pub use self::grid_index::{GridIdx, GridIdx2D};
pub use self::grid_traits::{GridIndexAccess, GridIndexAccessMut, GridSize};
pub use self::raster_tile::RasterTile2D;
pub use self::tiling::{TileInformation, TileInformationIter, TilingSpecification, TilingStrategy};
