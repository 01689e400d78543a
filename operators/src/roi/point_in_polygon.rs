use itertools::Itertools;
use rastercalc_datatypes::primitives::{Coordinate2D, Shape};

/// Creates a context to check points against the parts of a [`Shape`]
///
/// The algorithm is taken from <http://alienryderflex.com/polygon/>
///
/// Coordinates are tested with the even-odd rule over all rings of a part, so holes subtract.
/// A coordinate is contained in the shape if any part contains it.
pub struct PointInPolygonTester {
    /// all rings flattened, each ring closed by repeating its first vertex
    coordinates: Vec<Coordinate2D>,
    /// start of each ring in `coordinates`, plus the end of the last ring
    ring_offsets: Vec<usize>,
    /// start of each part in `ring_offsets`, plus the end of the last part
    polygon_offsets: Vec<usize>,
    constants: Vec<f64>,
    multiples: Vec<f64>,
}

impl PointInPolygonTester {
    pub fn new(shape: &Shape) -> Self {
        let mut coordinates = Vec::new();
        let mut ring_offsets = vec![0];
        let mut polygon_offsets = vec![0];

        for polygon in shape.valid_polygons() {
            for ring in polygon {
                coordinates.extend_from_slice(ring);

                if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
                    if first != last {
                        coordinates.push(*first);
                    }
                }

                ring_offsets.push(coordinates.len());
            }

            polygon_offsets.push(ring_offsets.len() - 1);
        }

        let (constants, multiples) = Self::precalculate_polygons(&ring_offsets, &coordinates);

        Self {
            coordinates,
            ring_offsets,
            polygon_offsets,
            constants,
            multiples,
        }
    }

    fn precalculate_polygons(
        ring_offsets: &[usize],
        coordinates: &[Coordinate2D],
    ) -> (Vec<f64>, Vec<f64>) {
        let num_coords = coordinates.len();
        let mut constants = vec![0.; num_coords];
        let mut multiples = vec![0.; num_coords];

        for (ring_start_index, ring_end_index) in ring_offsets.iter().copied().tuple_windows() {
            Self::precalculate_ring(
                ring_start_index,
                ring_end_index,
                coordinates,
                &mut constants,
                &mut multiples,
            );
        }

        (constants, multiples)
    }

    fn precalculate_ring(
        ring_start_index: usize,
        ring_end_index: usize,
        polygon_coordinates: &[Coordinate2D],
        constants: &mut [f64],
        multiples: &mut [f64],
    ) {
        let number_of_corners = ring_end_index - ring_start_index - 1;
        let mut j = number_of_corners - 1;

        for i in 0..number_of_corners {
            let c_i = polygon_coordinates[ring_start_index + i];
            let c_j = polygon_coordinates[ring_start_index + j];

            let helper_array_index = ring_start_index + i;

            if float_cmp::approx_eq!(f64, c_j.y, c_i.y) {
                constants[helper_array_index] = c_i.x;
                multiples[helper_array_index] = 0.0;
            } else {
                constants[helper_array_index] =
                    c_i.x - (c_i.y * c_j.x) / (c_j.y - c_i.y) + (c_i.y * c_i.x) / (c_j.y - c_i.y);
                multiples[helper_array_index] = (c_j.x - c_i.x) / (c_j.y - c_i.y);
            }

            j = i;
        }
    }

    fn ring_contains_coordinate(
        &self,
        coordinate: &Coordinate2D,
        ring_index_start: usize,
        ring_index_stop: usize,
    ) -> bool {
        let number_of_corners = ring_index_stop - ring_index_start - 1;
        let mut j = number_of_corners - 1;
        let mut odd_nodes = false;

        let polygon_coordinates = &self.coordinates;

        for i in 0..number_of_corners {
            let c_i = polygon_coordinates[ring_index_start + i];
            let c_j = polygon_coordinates[ring_index_start + j];

            if (c_i.y < coordinate.y && c_j.y >= coordinate.y)
                || (c_j.y < coordinate.y && c_i.y >= coordinate.y)
            {
                let coordinate_index = ring_index_start + i;

                odd_nodes ^= coordinate.y * self.multiples[coordinate_index]
                    + self.constants[coordinate_index]
                    < coordinate.x;
            }

            j = i;
        }

        odd_nodes
    }

    /// Is the coordinate inside part `polygon_index`?
    ///
    /// Crossings are accumulated over all rings of the part.
    fn polygon_contains_coordinate(&self, coordinate: &Coordinate2D, polygon_index: usize) -> bool {
        let rings = self.polygon_offsets[polygon_index]..=self.polygon_offsets[polygon_index + 1];

        self.ring_offsets[rings]
            .iter()
            .copied()
            .tuple_windows()
            .fold(false, |inside, (ring_start_index, ring_end_index)| {
                inside ^ self.ring_contains_coordinate(coordinate, ring_start_index, ring_end_index)
            })
    }

    pub fn number_of_polygons(&self) -> usize {
        self.polygon_offsets.len() - 1
    }

    /// Is the coordinate contained in any part of the shape?
    ///
    /// If the point is exactly on the edge of a ring, then the function may return `true` or `false`.
    ///
    pub fn any_polygon_contains_coordinate(&self, coordinate: &Coordinate2D) -> bool {
        (0..self.number_of_polygons())
            .any(|polygon_index| self.polygon_contains_coordinate(coordinate, polygon_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinates(points: &[(f64, f64)]) -> Vec<Coordinate2D> {
        points.iter().copied().map(Into::into).collect()
    }

    fn shape() -> Shape {
        Shape::new(vec![
            vec![coordinates(&[
                (20., 20.),
                (30., 20.),
                (30., 30.),
                (20., 30.),
                (20., 20.),
            ])],
            vec![
                coordinates(&[(0., 0.), (10., 0.), (10., 10.), (0., 10.), (0., 0.)]),
                coordinates(&[
                    (1., 5.),
                    (3., 3.),
                    (5., 3.),
                    (6., 5.),
                    (7., 1.5),
                    (4., 0.),
                    (2., 1.),
                    (1., 3.),
                    (1., 5.),
                ]),
            ],
        ])
    }

    #[test]
    fn point_in_polygon_tester() {
        let tester = PointInPolygonTester::new(&shape());

        assert_eq!(tester.number_of_polygons(), 2);

        assert!(!tester.ring_contains_coordinate(&Coordinate2D::new(4., 5.), 0, 5));
        assert!(tester.ring_contains_coordinate(&Coordinate2D::new(4., 5.), 5, 10));
        assert!(!tester.ring_contains_coordinate(&Coordinate2D::new(4., 5.), 10, 19));

        assert!(!tester.ring_contains_coordinate(&Coordinate2D::new(4., 2.), 0, 5));
        assert!(tester.ring_contains_coordinate(&Coordinate2D::new(4., 2.), 5, 10));
        assert!(tester.ring_contains_coordinate(&Coordinate2D::new(4., 2.), 10, 19));

        assert!(tester.any_polygon_contains_coordinate(&Coordinate2D::new(4., 5.)));
        assert!(!tester.any_polygon_contains_coordinate(&Coordinate2D::new(4., 2.)));
        assert!(tester.any_polygon_contains_coordinate(&Coordinate2D::new(25., 25.)));
        assert!(!tester.any_polygon_contains_coordinate(&Coordinate2D::new(15., 15.)));
    }

    #[test]
    fn open_rings_are_closed() {
        let open = Shape::new(vec![vec![coordinates(&[
            (0., 0.),
            (4., 0.),
            (4., 4.),
            (0., 4.),
        ])]]);

        let tester = PointInPolygonTester::new(&open);

        assert!(tester.any_polygon_contains_coordinate(&Coordinate2D::new(3.5, 0.5)));
        assert!(!tester.any_polygon_contains_coordinate(&Coordinate2D::new(4.5, 0.5)));
    }

    #[test]
    fn a_hole_inside_a_hole_is_included_again() {
        let nested = Shape::new(vec![vec![
            coordinates(&[(0., 0.), (9., 0.), (9., 9.), (0., 9.)]),
            coordinates(&[(2., 2.), (7., 2.), (7., 7.), (2., 7.)]),
            coordinates(&[(4., 4.), (5., 4.), (5., 5.), (4., 5.)]),
        ]]);

        let tester = PointInPolygonTester::new(&nested);

        assert!(tester.any_polygon_contains_coordinate(&Coordinate2D::new(1., 1.)));
        assert!(!tester.any_polygon_contains_coordinate(&Coordinate2D::new(3., 3.)));
        assert!(tester.any_polygon_contains_coordinate(&Coordinate2D::new(4.5, 4.5)));
    }

    #[test]
    fn degenerate_parts_are_ignored() {
        let degenerate = Shape::new(vec![vec![coordinates(&[(0., 0.), (1., 1.), (0., 0.)])]]);

        let tester = PointInPolygonTester::new(&degenerate);

        assert_eq!(tester.number_of_polygons(), 0);
        assert!(!tester.any_polygon_contains_coordinate(&Coordinate2D::new(0.5, 0.5)));
    }
}
