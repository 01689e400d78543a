use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::error;
use crate::util::Result;

use super::{GridIdx, GridIdx2D, GridIndexAccess, GridIndexAccessMut, GridSize};

/// The shape of a grid, ordered `[.., y, x]`
#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone, Serialize, Deserialize)]
pub struct GridShape<A>
where
    A: AsRef<[usize]>,
{
    pub shape_array: A,
}

pub type GridShape2D = GridShape<[usize; 2]>;

impl<A> GridShape<A>
where
    A: AsRef<[usize]>,
{
    pub fn new(shape: A) -> Self {
        Self { shape_array: shape }
    }

    pub fn inner_ref(&self) -> &A {
        &self.shape_array
    }

    pub fn into_inner(self) -> A {
        self.shape_array
    }
}

impl GridShape2D {
    pub fn new_2d(height: usize, width: usize) -> Self {
        Self::new([height, width])
    }

    /// Checks if `index` lies inside `[0, height) × [0, width)`
    pub fn contains(&self, index: &GridIdx2D) -> bool {
        let GridIdx([y, x]) = *index;
        let [height, width] = self.shape_array;
        y >= 0 && x >= 0 && (y as usize) < height && (x as usize) < width
    }

    /// The position of `index` in row-major linear space
    pub fn linear_space_index_unchecked(&self, index: GridIdx2D) -> usize {
        let GridIdx([y, x]) = index;
        y as usize * self.axis_size_x() + x as usize
    }

    pub fn linear_space_index(&self, index: GridIdx2D) -> Result<usize> {
        ensure!(
            self.contains(&index),
            error::GridIndexOutOfBounds {
                index: Vec::from(index.0),
                min_index: vec![0_isize, 0],
                max_index: vec![
                    self.axis_size_y() as isize - 1,
                    self.axis_size_x() as isize - 1
                ],
            }
        );

        Ok(self.linear_space_index_unchecked(index))
    }

    /// All indices of the shape in row-major order, x moving fastest
    pub fn grid_idx_iter(&self) -> impl Iterator<Item = GridIdx2D> + use<> {
        let [height, width] = self.shape_array;
        (0..height as isize)
            .flat_map(move |y| (0..width as isize).map(move |x| GridIdx([y, x])))
    }
}

impl From<[usize; 2]> for GridShape2D {
    fn from(shape: [usize; 2]) -> Self {
        GridShape2D { shape_array: shape }
    }
}

impl GridSize for GridShape2D {
    type ShapeArray = [usize; 2];

    const NDIM: usize = 2;

    fn axis_size(&self) -> Self::ShapeArray {
        self.shape_array
    }

    fn number_of_elements(&self) -> usize {
        let [a, b] = self.shape_array;
        a * b
    }
}

/// A dense grid of values stored row by row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid<D, T> {
    pub shape: D,
    pub data: Vec<T>,
}

pub type Grid2D<T> = Grid<GridShape2D, T>;

impl<T> Grid2D<T>
where
    T: Clone,
{
    /// Creates a new grid from `data` in row-major order
    ///
    /// # Errors
    ///
    /// This constructor fails if the data container's capacity is different from the grid's dimension number
    ///
    pub fn new(shape: GridShape2D, data: Vec<T>) -> Result<Self> {
        ensure!(
            shape.number_of_elements() == data.len(),
            error::DimensionCapacityDoesNotMatchDataCapacity {
                dimension_cap: shape.number_of_elements(),
                data_cap: data.len()
            }
        );

        Ok(Self { shape, data })
    }

    pub fn new_filled(shape: GridShape2D, fill_value: T) -> Self {
        let data = vec![fill_value; shape.number_of_elements()];
        Self { shape, data }
    }

    /// Converts the grid pixel-wise
    pub fn map<U, F>(self, f: F) -> Grid2D<U>
    where
        F: FnMut(T) -> U,
    {
        Grid {
            shape: self.shape,
            data: self.data.into_iter().map(f).collect(),
        }
    }

    /// Copies the region of `shape` starting at `offset` into a new grid
    ///
    /// # Errors
    ///
    /// Fails if the region is not fully inside this grid.
    ///
    pub fn sub_grid(&self, offset: GridIdx2D, shape: GridShape2D) -> Result<Self> {
        let [height, width] = shape.shape_array;
        self.ensure_region_inside(offset, shape)?;

        let mut data = Vec::with_capacity(shape.number_of_elements());
        for y in 0..height as isize {
            let start = self
                .shape
                .linear_space_index_unchecked(offset + [y, 0]);
            data.extend_from_slice(&self.data[start..start + width]);
        }

        Ok(Self { shape, data })
    }

    /// Writes all values of `other` into this grid, placing its upper left pixel at `offset`
    ///
    /// # Errors
    ///
    /// Fails if `other` does not fit into this grid at `offset`.
    ///
    pub fn grid_blit_from(&mut self, other: &Grid2D<T>, offset: GridIdx2D) -> Result<()> {
        let [height, width] = other.shape.shape_array;
        self.ensure_region_inside(offset, other.shape)?;

        for y in 0..height {
            let start = self
                .shape
                .linear_space_index_unchecked(offset + [y as isize, 0]);
            self.data[start..start + width]
                .clone_from_slice(&other.data[y * width..(y + 1) * width]);
        }

        Ok(())
    }

    fn ensure_region_inside(&self, offset: GridIdx2D, shape: GridShape2D) -> Result<()> {
        let [height, width] = shape.shape_array;
        if height == 0 || width == 0 {
            return Ok(());
        }

        let last = offset + [height as isize - 1, width as isize - 1];
        for index in [offset, last] {
            self.shape.linear_space_index(index)?;
        }

        Ok(())
    }
}

impl<D, T> GridSize for Grid<D, T>
where
    D: GridSize,
{
    type ShapeArray = D::ShapeArray;

    const NDIM: usize = D::NDIM;

    fn axis_size(&self) -> Self::ShapeArray {
        self.shape.axis_size()
    }

    fn number_of_elements(&self) -> usize {
        self.shape.number_of_elements()
    }
}

impl<T, I> GridIndexAccess<T, I> for Grid2D<T>
where
    I: Into<GridIdx2D>,
    T: Copy,
{
    fn get_at_grid_index(&self, grid_index: I) -> Result<T> {
        let index = self.shape.linear_space_index(grid_index.into())?;
        Ok(self.data[index])
    }

    fn get_at_grid_index_unchecked(&self, grid_index: I) -> T {
        let index = self.shape.linear_space_index_unchecked(grid_index.into());
        self.data[index]
    }
}

impl<T, I> GridIndexAccessMut<T, I> for Grid2D<T>
where
    I: Into<GridIdx2D>,
    T: Copy,
{
    fn set_at_grid_index(&mut self, grid_index: I, value: T) -> Result<()> {
        let index = self.shape.linear_space_index(grid_index.into())?;
        self.data[index] = value;
        Ok(())
    }

    fn set_at_grid_index_unchecked(&mut self, grid_index: I, value: T) {
        let index = self.shape.linear_space_index_unchecked(grid_index.into());
        self.data[index] = value;
    }
}
