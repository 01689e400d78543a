mod mask;
mod point_in_polygon;

pub use mask::RoiMask;
pub use point_in_polygon::PointInPolygonTester;
