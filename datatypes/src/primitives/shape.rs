use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{BoundingBox2D, Coordinate2D};
use crate::error::Error;
use crate::spatial_reference::SpatialReferenceOption;
use crate::util::Result;

pub type Ring = Vec<Coordinate2D>;
pub type Polygon = Vec<Ring>;

/// A multi-part polygon in world coordinates.
///
/// Each part is a list of rings. The first ring is the exterior, all further rings are holes.
/// Rings are implicitly closed, so repeating the first vertex at the end is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    polygons: Vec<Polygon>,
    #[serde(default)]
    spatial_reference: SpatialReferenceOption,
}

impl Shape {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self {
            polygons,
            spatial_reference: SpatialReferenceOption::Unreferenced,
        }
    }

    /// A single-part shape covering `bounding_box`
    pub fn rectangle(bounding_box: BoundingBox2D) -> Self {
        Self::new(vec![vec![bounding_box.corners().to_vec()]])
    }

    #[must_use]
    pub fn with_spatial_reference(mut self, spatial_reference: SpatialReferenceOption) -> Self {
        self.spatial_reference = spatial_reference;
        self
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn spatial_reference(&self) -> SpatialReferenceOption {
        self.spatial_reference
    }

    /// A ring needs at least three distinct vertices to enclose an area
    pub fn ring_is_valid(ring: &[Coordinate2D]) -> bool {
        let mut distinct: Vec<Coordinate2D> = Vec::with_capacity(3);

        for vertex in ring {
            if !distinct.contains(vertex) {
                distinct.push(*vertex);
                if distinct.len() >= 3 {
                    return true;
                }
            }
        }

        false
    }

    /// All valid rings, grouped by part. Parts without a valid exterior are skipped.
    pub fn valid_polygons(&self) -> impl Iterator<Item = Vec<&[Coordinate2D]>> {
        self.polygons.iter().filter_map(|polygon| {
            let exterior = polygon.first()?;
            if !Self::ring_is_valid(exterior) {
                return None;
            }

            Some(
                polygon
                    .iter()
                    .filter(|ring| Self::ring_is_valid(ring))
                    .map(Vec::as_slice)
                    .collect(),
            )
        })
    }

    /// A shape is degenerate if no part encloses any area
    pub fn is_degenerate(&self) -> bool {
        self.valid_polygons().next().is_none()
    }

    /// The bounding box of all exterior rings, or `None` for a degenerate shape
    pub fn bounding_box(&self) -> Option<BoundingBox2D> {
        BoundingBox2D::from_coord_iter(
            self.valid_polygons()
                .flat_map(|polygon| polygon.into_iter().take(1))
                .flat_map(|exterior| exterior.iter().copied()),
        )
    }
}

fn ring_from_line_string(line_string: geo_types::LineString<f64>) -> Ring {
    line_string.0.into_iter().map(Into::into).collect()
}

fn polygon_from_geo(polygon: geo_types::Polygon<f64>) -> Polygon {
    let (exterior, interiors) = polygon.into_inner();

    let mut rings = Vec::with_capacity(1 + interiors.len());
    rings.push(ring_from_line_string(exterior));
    rings.extend(interiors.into_iter().map(ring_from_line_string));
    rings
}

impl From<geo_types::Polygon<f64>> for Shape {
    fn from(polygon: geo_types::Polygon<f64>) -> Self {
        Self::new(vec![polygon_from_geo(polygon)])
    }
}

impl From<geo_types::MultiPolygon<f64>> for Shape {
    fn from(multi_polygon: geo_types::MultiPolygon<f64>) -> Self {
        Self::new(multi_polygon.0.into_iter().map(polygon_from_geo).collect())
    }
}

impl From<geo_types::Rect<f64>> for Shape {
    fn from(rect: geo_types::Rect<f64>) -> Self {
        rect.to_polygon().into()
    }
}

impl TryFrom<geo_types::Geometry<f64>> for Shape {
    type Error = Error;

    fn try_from(geometry: geo_types::Geometry<f64>) -> Result<Self, Self::Error> {
        let geometry_type = match geometry {
            geo_types::Geometry::Polygon(polygon) => return Ok(polygon.into()),
            geo_types::Geometry::MultiPolygon(multi_polygon) => return Ok(multi_polygon.into()),
            geo_types::Geometry::Rect(rect) => return Ok(rect.into()),
            geo_types::Geometry::Triangle(triangle) => return Ok(triangle.to_polygon().into()),
            geo_types::Geometry::Point(_) => "Point",
            geo_types::Geometry::Line(_) => "Line",
            geo_types::Geometry::LineString(_) => "LineString",
            geo_types::Geometry::MultiPoint(_) => "MultiPoint",
            geo_types::Geometry::MultiLineString(_) => "MultiLineString",
            geo_types::Geometry::GeometryCollection(_) => "GeometryCollection",
        };

        Err(Error::UnsupportedGeometryType {
            geometry_type: geometry_type.to_string(),
        })
    }
}

impl FromStr for Shape {
    type Err = Error;

    /// Parses a `POLYGON` or `MULTIPOLYGON` from WKT
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wkt: wkt::Wkt<f64> = s.parse().map_err(|error| Error::InvalidWkt {
            details: format!("{error}"),
        })?;

        let geometry =
            geo_types::Geometry::<f64>::try_from(wkt).map_err(|error| Error::InvalidWkt {
                details: error.to_string(),
            })?;

        geometry.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial_reference::SpatialReference;
    use geo_types::polygon;

    fn square(x0: f64, y0: f64, size: f64) -> Ring {
        vec![
            (x0, y0).into(),
            (x0 + size, y0).into(),
            (x0 + size, y0 + size).into(),
            (x0, y0 + size).into(),
            (x0, y0).into(),
        ]
    }

    #[test]
    fn ring_validity() {
        assert!(Shape::ring_is_valid(&square(0., 0., 1.)));
        assert!(!Shape::ring_is_valid(&[(0., 0.).into(), (1., 1.).into(), (0., 0.).into()]));
        assert!(!Shape::ring_is_valid(&[]));
    }

    #[test]
    fn degenerate_shapes() {
        assert!(Shape::default().is_degenerate());
        assert!(Shape::new(vec![vec![vec![(1., 1.).into(); 4]]]).is_degenerate());
        assert!(Shape::default().bounding_box().is_none());

        assert!(!Shape::new(vec![vec![square(0., 0., 1.)]]).is_degenerate());
    }

    #[test]
    fn bounding_box_covers_all_parts() {
        let shape = Shape::new(vec![
            vec![square(0., 0., 1.)],
            vec![square(5., -2., 2.), square(5.5, -1.5, 0.5)],
        ]);

        assert_eq!(
            shape.bounding_box(),
            Some(BoundingBox2D::new((0., -2.).into(), (7., 1.).into()).unwrap())
        );
    }

    #[test]
    fn from_wkt() {
        let shape: Shape = "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0), (2 2, 4 2, 4 4, 2 4, 2 2))"
            .parse()
            .unwrap();

        assert_eq!(shape.polygons().len(), 1);
        assert_eq!(shape.polygons()[0].len(), 2);
        assert_eq!(shape.polygons()[0][1][0], Coordinate2D::new(2., 2.));

        let shape: Shape = "MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((5 5, 6 5, 6 6, 5 5)))"
            .parse()
            .unwrap();
        assert_eq!(shape.polygons().len(), 2);
    }

    #[test]
    fn from_wkt_rejects_other_geometries() {
        assert!(matches!(
            "POINT (1 2)".parse::<Shape>(),
            Err(Error::UnsupportedGeometryType { geometry_type }) if geometry_type == "Point"
        ));
        assert!(matches!(
            "POLYGON ((0 0, 1 0".parse::<Shape>(),
            Err(Error::InvalidWkt { .. })
        ));
    }

    #[test]
    fn from_geo_types() {
        let polygon = geo_types::polygon![(x: 0., y: 0.), (x: 2., y: 0.), (x: 2., y: 2.)];
        let shape = Shape::from(polygon).with_spatial_reference(SpatialReference::epsg_4326().into());

        assert_eq!(shape.polygons()[0][0].first(), Some(&Coordinate2D::new(0., 0.)));
        assert_eq!(
            shape.spatial_reference(),
            SpatialReferenceOption::SpatialReference(SpatialReference::epsg_4326())
        );
    }
}
