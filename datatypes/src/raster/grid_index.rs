use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

///
/// The grid index struct. This is a wrapper for arrays with added methods and traits, e.g. Add, Sub...
///
/// Two-dimensional indices are ordered `[y, x]`, i.e. row before column.
///
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct GridIdx<A>(pub A)
where
    A: AsRef<[isize]>;

pub type GridIdx2D = GridIdx<[isize; 2]>;

impl<A> GridIdx<A>
where
    A: AsRef<[isize]>,
{
    pub fn inner(&self) -> &A {
        &self.0
    }

    pub fn as_slice(&self) -> &[isize] {
        self.inner().as_ref()
    }

    pub fn new(inner: A) -> Self {
        GridIdx(inner)
    }
}

impl GridIdx2D {
    pub fn new_y_x(y: isize, x: isize) -> Self {
        GridIdx([y, x])
    }

    pub fn x(&self) -> isize {
        self.0[1]
    }

    pub fn y(&self) -> isize {
        self.0[0]
    }
}

impl From<[isize; 2]> for GridIdx2D {
    fn from(array: [isize; 2]) -> GridIdx2D {
        GridIdx(array)
    }
}

impl From<isize> for GridIdx2D {
    fn from(scalar: isize) -> GridIdx2D {
        GridIdx([scalar, scalar])
    }
}

impl<I> Sub<I> for GridIdx2D
where
    I: Into<GridIdx2D>,
{
    type Output = Self;

    fn sub(self, rhs: I) -> Self::Output {
        let GridIdx([a, b]) = self;
        let GridIdx([a_other, b_other]) = rhs.into();
        GridIdx([a - a_other, b - b_other])
    }
}

impl<I> Add<I> for GridIdx2D
where
    I: Into<GridIdx2D>,
{
    type Output = Self;

    fn add(self, rhs: I) -> Self::Output {
        let GridIdx([a, b]) = self;
        let GridIdx([a_other, b_other]) = rhs.into();
        GridIdx([a + a_other, b + b_other])
    }
}
