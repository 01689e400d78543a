use super::Coordinate2D;
use crate::error;
use crate::util::Result;
use serde::{Deserialize, Serialize};
use snafu::ensure;

#[derive(Copy, Clone, Serialize, Deserialize, PartialEq, Debug)]
/// The bounding box of a geometry.
/// Note: may degenerate to a point!
pub struct BoundingBox2D {
    lower_left_coordinate: Coordinate2D,
    upper_right_coordinate: Coordinate2D,
}

impl BoundingBox2D {
    /// Creates a new bounding box
    ///
    /// # Examples
    ///
    /// ```
    /// use rastercalc_datatypes::primitives::{Coordinate2D, BoundingBox2D};
    ///
    /// let ll = Coordinate2D::new(1.0, 1.0);
    /// let ur = Coordinate2D::new(2.0, 2.0);
    /// let bbox = BoundingBox2D::new(ll, ur).unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// This constructor fails if the coordinate's values are not in order
    ///
    pub fn new(
        lower_left_coordinate: Coordinate2D,
        upper_right_coordinate: Coordinate2D,
    ) -> Result<Self> {
        ensure!(
            lower_left_coordinate.x <= upper_right_coordinate.x
                && lower_left_coordinate.y <= upper_right_coordinate.y,
            error::InvalidBoundingBox {
                lower_left_coordinate,
                upper_right_coordinate
            }
        );
        Ok(Self {
            lower_left_coordinate,
            upper_right_coordinate,
        })
    }

    pub fn new_unchecked(
        lower_left_coordinate: Coordinate2D,
        upper_right_coordinate: Coordinate2D,
    ) -> Self {
        Self {
            lower_left_coordinate,
            upper_right_coordinate,
        }
    }

    /// Computes the smallest bounding box around `coordinates`, or `None` if there are none
    pub fn from_coord_iter<I: IntoIterator<Item = Coordinate2D>>(coordinates: I) -> Option<Self> {
        let mut coordinates = coordinates.into_iter();
        let first = coordinates.next()?;

        let (lower_left, upper_right) = coordinates.fold((first, first), |(ll, ur), c| {
            (ll.min_elements(c), ur.max_elements(c))
        });

        Some(Self::new_unchecked(lower_left, upper_right))
    }

    pub fn lower_left(&self) -> Coordinate2D {
        self.lower_left_coordinate
    }

    pub fn upper_right(&self) -> Coordinate2D {
        self.upper_right_coordinate
    }

    pub fn upper_left(&self) -> Coordinate2D {
        Coordinate2D::new(self.lower_left_coordinate.x, self.upper_right_coordinate.y)
    }

    pub fn lower_right(&self) -> Coordinate2D {
        Coordinate2D::new(self.upper_right_coordinate.x, self.lower_left_coordinate.y)
    }

    pub fn size_x(&self) -> f64 {
        self.upper_right_coordinate.x - self.lower_left_coordinate.x
    }

    pub fn size_y(&self) -> f64 {
        self.upper_right_coordinate.y - self.lower_left_coordinate.y
    }

    /// Checks if a coordinate lies inside the box, borders included
    pub fn contains_coordinate(&self, coordinate: &Coordinate2D) -> bool {
        coordinate.x >= self.lower_left_coordinate.x
            && coordinate.y >= self.lower_left_coordinate.y
            && coordinate.x <= self.upper_right_coordinate.x
            && coordinate.y <= self.upper_right_coordinate.y
    }

    /// The four corners, starting at the lower left and going counter-clockwise
    pub fn corners(&self) -> [Coordinate2D; 4] {
        [
            self.lower_left(),
            self.lower_right(),
            self.upper_right(),
            self.upper_left(),
        ]
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new_unchecked(
            self.lower_left_coordinate
                .min_elements(other.lower_left_coordinate),
            self.upper_right_coordinate
                .max_elements(other.upper_right_coordinate),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_new() {
        let ll = Coordinate2D::new(1.0, 1.0);
        let ur = Coordinate2D::new(2.0, 2.0);
        BoundingBox2D::new(ll, ur).unwrap();
    }

    #[test]
    fn bounding_box_new_illegal() {
        let ll = Coordinate2D::new(1.0, 1.0);
        let ur = Coordinate2D::new(0.0, 0.0);
        assert!(BoundingBox2D::new(ll, ur).is_err());
    }

    #[test]
    fn from_coord_iter() {
        let bbox = BoundingBox2D::from_coord_iter([
            Coordinate2D::new(1.0, 4.0),
            Coordinate2D::new(-2.0, 1.0),
            Coordinate2D::new(3.0, 0.5),
        ])
        .unwrap();

        assert_eq!(bbox.lower_left(), Coordinate2D::new(-2.0, 0.5));
        assert_eq!(bbox.upper_right(), Coordinate2D::new(3.0, 4.0));
        assert_eq!(bbox.upper_left(), Coordinate2D::new(-2.0, 4.0));
        assert_eq!(bbox.lower_right(), Coordinate2D::new(3.0, 0.5));

        assert!(BoundingBox2D::from_coord_iter(std::iter::empty()).is_none());
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn sizes_and_containment() {
        let bbox = BoundingBox2D::new((0.0, 0.0).into(), (4.0, 2.0).into()).unwrap();

        assert_eq!(bbox.size_x(), 4.0);
        assert_eq!(bbox.size_y(), 2.0);

        assert!(bbox.contains_coordinate(&(4.0, 2.0).into()));
        assert!(!bbox.contains_coordinate(&(4.1, 1.0).into()));
    }

    #[test]
    fn union() {
        let a = BoundingBox2D::new((0.0, 0.0).into(), (1.0, 1.0).into()).unwrap();
        let b = BoundingBox2D::new((0.5, -1.0).into(), (3.0, 0.5).into()).unwrap();

        assert_eq!(
            a.union(&b),
            BoundingBox2D::new((0.0, -1.0).into(), (3.0, 1.0).into()).unwrap()
        );
    }
}
