use crate::util::Result;

/// Size information of a grid include the size of each axis and the number elements
pub trait GridSize {
    /// An array with one entry representing the size of each axis
    type ShapeArray: AsRef<[usize]>;

    /// The number of axis
    const NDIM: usize;

    // Size per axis in [.. ,z, y, x] order
    fn axis_size(&self) -> Self::ShapeArray;
    /// Size of the x-axis
    fn axis_size_x(&self) -> usize {
        match *self.axis_size().as_ref() {
            [] => 0,
            [.., a] => a,
        }
    }

    /// Size of the y-axis
    fn axis_size_y(&self) -> usize {
        match *self.axis_size().as_ref() {
            [] => 0,
            [_] => 1,
            [.., b, _] => b,
        }
    }

    /// The number of elements in the grid
    fn number_of_elements(&self) -> usize {
        self.axis_size().as_ref().iter().product()
    }
}

pub trait GridIndexAccess<T, I> {
    /// Gets a reference to the value at a grid index
    ///
    /// # Errors
    /// Fails if the grid index is out of bounds.
    ///
    fn get_at_grid_index(&self, grid_index: I) -> Result<T>;

    /// Gets the value at a grid index without bounds checks.
    /// Panics if the index is outside the linear data.
    fn get_at_grid_index_unchecked(&self, grid_index: I) -> T;
}

pub trait GridIndexAccessMut<T, I> {
    /// Sets the value at a grid index
    ///
    /// # Errors
    /// Fails if the grid index is out of bounds.
    ///
    fn set_at_grid_index(&mut self, grid_index: I, value: T) -> Result<()>;

    /// Sets the value at a grid index without bounds checks.
    /// Panics if the index is outside the linear data.
    fn set_at_grid_index_unchecked(&mut self, grid_index: I, value: T);
}
