use serde::{Deserialize, Serialize};

use super::{Grid2D, GridIdx2D, GridIndexAccess, GridIndexAccessMut, GridSize, TileInformation};
use crate::util::Result;

/// A tile descriptor together with the pixel buffer of that tile.
///
/// The buffer is indexed with tile-local `[y, x]` indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterTile2D<T> {
    pub tile_information: TileInformation,
    pub grid_array: Grid2D<T>,
}

impl<T> RasterTile2D<T>
where
    T: Copy,
{
    /// create a new tile whose pixels are all `fill_value`
    pub fn new_filled(tile_information: TileInformation, fill_value: T) -> Self {
        Self {
            grid_array: Grid2D::new_filled(tile_information.tile_size_in_pixels, fill_value),
            tile_information,
        }
    }

    /// # Errors
    ///
    /// Fails if the data does not match the size of the tile.
    ///
    pub fn new_with_data(tile_information: TileInformation, data: Vec<T>) -> Result<Self> {
        Ok(Self {
            grid_array: Grid2D::new(tile_information.tile_size_in_pixels, data)?,
            tile_information,
        })
    }

    pub fn data(&self) -> &[T] {
        &self.grid_array.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.grid_array.data
    }

    pub fn into_grid(self) -> Grid2D<T> {
        self.grid_array
    }

    /// Pairs each value with its global pixel index, row-major
    pub fn global_pixels(&self) -> impl Iterator<Item = (GridIdx2D, T)> + '_ {
        self.tile_information
            .global_pixel_indices()
            .zip(self.grid_array.data.iter().copied())
    }
}

impl<T> GridSize for RasterTile2D<T> {
    type ShapeArray = [usize; 2];

    const NDIM: usize = 2;

    fn axis_size(&self) -> Self::ShapeArray {
        self.grid_array.axis_size()
    }

    fn number_of_elements(&self) -> usize {
        self.grid_array.number_of_elements()
    }
}

impl<T, I> GridIndexAccess<T, I> for RasterTile2D<T>
where
    I: Into<GridIdx2D>,
    T: Copy,
{
    fn get_at_grid_index(&self, grid_index: I) -> Result<T> {
        self.grid_array.get_at_grid_index(grid_index)
    }

    fn get_at_grid_index_unchecked(&self, grid_index: I) -> T {
        self.grid_array.get_at_grid_index_unchecked(grid_index)
    }
}

impl<T, I> GridIndexAccessMut<T, I> for RasterTile2D<T>
where
    I: Into<GridIdx2D>,
    T: Copy,
{
    fn set_at_grid_index(&mut self, grid_index: I, value: T) -> Result<()> {
        self.grid_array.set_at_grid_index(grid_index, value)
    }

    fn set_at_grid_index_unchecked(&mut self, grid_index: I, value: T) {
        self.grid_array.set_at_grid_index_unchecked(grid_index, value);
    }
}
