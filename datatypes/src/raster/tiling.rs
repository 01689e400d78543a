use crate::error::{self, Error};
use crate::util::Result;
use crate::util::test::TestDefault;

use super::{GridIdx2D, GridShape2D, GridSize};

use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::iter::FusedIterator;

/// The static parameters of a `TilingStrategy`. The tile size is never zero.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase", try_from = "UncheckedTilingSpecification")]
pub struct TilingSpecification {
    tile_size_in_pixels: GridShape2D,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UncheckedTilingSpecification {
    tile_size_in_pixels: GridShape2D,
}

impl TryFrom<UncheckedTilingSpecification> for TilingSpecification {
    type Error = Error;

    fn try_from(unchecked: UncheckedTilingSpecification) -> Result<Self> {
        Self::new(unchecked.tile_size_in_pixels)
    }
}

impl TilingSpecification {
    /// # Errors
    ///
    /// Fails if either tile dimension is zero.
    ///
    pub fn new(tile_size_in_pixels: GridShape2D) -> Result<Self> {
        ensure!(
            tile_size_in_pixels.number_of_elements() > 0,
            error::InvalidTileSize {
                width: tile_size_in_pixels.axis_size_x(),
                height: tile_size_in_pixels.axis_size_y(),
            }
        );

        Ok(Self {
            tile_size_in_pixels,
        })
    }

    pub fn tile_size_in_pixels(&self) -> GridShape2D {
        self.tile_size_in_pixels
    }

    /// create a `TilingStrategy` from self and the shape of the grid to cover
    pub fn strategy(self, grid_shape: GridShape2D) -> TilingStrategy {
        TilingStrategy {
            tile_size_in_pixels: self.tile_size_in_pixels,
            grid_shape,
        }
    }
}

impl TestDefault for TilingSpecification {
    fn test_default() -> Self {
        Self {
            tile_size_in_pixels: GridShape2D::new_2d(4, 4),
        }
    }
}

/// Partitions a grid into tiles.
///
/// Only built from a validated [`TilingSpecification`], so the tile size is never zero.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TilingStrategy {
    tile_size_in_pixels: GridShape2D,
    grid_shape: GridShape2D,
}

impl TilingStrategy {
    /// # Errors
    ///
    /// Fails if either tile dimension is zero.
    ///
    pub fn new(grid_shape: GridShape2D, tile_size_in_pixels: GridShape2D) -> Result<Self> {
        Ok(TilingSpecification::new(tile_size_in_pixels)?.strategy(grid_shape))
    }

    pub fn tile_size_in_pixels(&self) -> GridShape2D {
        self.tile_size_in_pixels
    }

    pub fn grid_shape(&self) -> GridShape2D {
        self.grid_shape
    }

    pub fn number_of_tiles_x(&self) -> usize {
        self.grid_shape
            .axis_size_x()
            .div_ceil(self.tile_size_in_pixels.axis_size_x())
    }

    pub fn number_of_tiles_y(&self) -> usize {
        self.grid_shape
            .axis_size_y()
            .div_ceil(self.tile_size_in_pixels.axis_size_y())
    }

    pub fn number_of_tiles(&self) -> usize {
        self.number_of_tiles_x() * self.number_of_tiles_y()
    }

    /// The tile at position `index` of the row-major tile order
    pub fn tile_information(&self, index: usize) -> Option<TileInformation> {
        if index >= self.number_of_tiles() {
            return None;
        }

        let tiles_x = self.number_of_tiles_x();
        let [tile_height, tile_width] = self.tile_size_in_pixels.into_inner();
        let [grid_height, grid_width] = self.grid_shape.into_inner();

        let tile_y = index / tiles_x;
        let tile_x = index % tiles_x;

        let y0 = tile_y * tile_height;
        let x0 = tile_x * tile_width;

        Some(TileInformation {
            index,
            global_tile_position: [tile_y as isize, tile_x as isize].into(),
            global_upper_left_pixel_idx: [y0 as isize, x0 as isize].into(),
            tile_size_in_pixels: [
                tile_height.min(grid_height - y0),
                tile_width.min(grid_width - x0),
            ]
            .into(),
        })
    }

    /// generates the tile information for all tiles of the grid
    /// the iterator moves once along the x-axis and then increases the y-axis
    pub fn tile_information_iter(&self) -> TileInformationIter {
        TileInformationIter {
            strategy: *self,
            next: 0,
            end: self.number_of_tiles(),
        }
    }
}

/// The `TileInformation` is used to represent the position of each tile.
///
/// Edge tiles are clipped to the grid, so `tile_size_in_pixels` may be smaller than the
/// nominal tile size.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileInformation {
    /// position in the row-major tile order
    pub index: usize,
    pub global_tile_position: GridIdx2D,
    pub global_upper_left_pixel_idx: GridIdx2D,
    pub tile_size_in_pixels: GridShape2D,
}

impl TileInformation {
    /// A free-standing region of `width × height` pixels at `(x0, y0)`, not part of a tiling
    pub fn region(x0: usize, y0: usize, width: usize, height: usize) -> Self {
        Self {
            index: 0,
            global_tile_position: [0, 0].into(),
            global_upper_left_pixel_idx: GridIdx2D::new_y_x(y0 as isize, x0 as isize),
            tile_size_in_pixels: GridShape2D::new_2d(height, width),
        }
    }

    pub fn x0(&self) -> usize {
        self.global_upper_left_pixel_idx.x() as usize
    }

    pub fn y0(&self) -> usize {
        self.global_upper_left_pixel_idx.y() as usize
    }

    pub fn width(&self) -> usize {
        self.tile_size_in_pixels.axis_size_x()
    }

    pub fn height(&self) -> usize {
        self.tile_size_in_pixels.axis_size_y()
    }

    pub fn number_of_pixels(&self) -> usize {
        self.tile_size_in_pixels.number_of_elements()
    }

    pub fn local_to_global_pixel_idx(&self, local_pixel_position: GridIdx2D) -> GridIdx2D {
        self.global_upper_left_pixel_idx + local_pixel_position
    }

    /// The global indices of all pixels of the tile, row-major
    pub fn global_pixel_indices(&self) -> impl Iterator<Item = GridIdx2D> + use<> {
        let offset = self.global_upper_left_pixel_idx;
        self.tile_size_in_pixels
            .grid_idx_iter()
            .map(move |local| offset + local)
    }

    /// Checks if a global pixel index lies in this tile
    pub fn contains_global_pixel_idx(&self, pixel: GridIdx2D) -> bool {
        self.tile_size_in_pixels
            .contains(&(pixel - self.global_upper_left_pixel_idx))
    }
}

/// A restartable iterator over all tiles of a [`TilingStrategy`]
#[derive(Debug, Clone)]
pub struct TileInformationIter {
    strategy: TilingStrategy,
    next: usize,
    end: usize,
}

impl Iterator for TileInformationIter {
    type Item = TileInformation;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }

        let tile = self.strategy.tile_information(self.next);
        self.next += 1;
        tile
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileInformationIter {}

impl FusedIterator for TileInformationIter {}
