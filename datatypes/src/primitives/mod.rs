mod bounding_box;
mod coordinate;
mod pin;
mod shape;

pub use bounding_box::BoundingBox2D;
pub use coordinate::Coordinate2D;
pub use pin::{Pin, PixelPos};
pub use shape::{Polygon, Ring, Shape};
