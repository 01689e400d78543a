use serde::{Deserialize, Serialize};

use crate::raster::{GridShape2D, GridSize};

/// A floating point position in pixel space, `x` along columns and `y` along rows
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: f64,
    pub y: f64,
}

impl PixelPos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for PixelPos {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// A named marker at a pixel position of a product.
///
/// The position may leave the grid while a caller moves it around; [`Pin::step`] keeps it
/// within `[0, w-1] × [0, h-1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub name: String,
    pub label: String,
    pub position: PixelPos,
    /// Displacement per unit of time, used by [`Pin::step`]
    #[serde(default)]
    pub velocity: PixelPos,
}

impl Pin {
    pub fn new(name: impl Into<String>, label: impl Into<String>, position: PixelPos) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            position,
            velocity: PixelPos::default(),
        }
    }

    #[must_use]
    pub fn with_velocity(mut self, velocity: PixelPos) -> Self {
        self.velocity = velocity;
        self
    }

    /// Advances the pin once by `velocity * dt`.
    ///
    /// A coordinate leaving `[0, size-1]` is clamped to the violated edge and its velocity
    /// component is flipped, so the pin moves back into the grid on the next step.
    pub fn step(&mut self, dt: f64, grid_shape: GridShape2D) {
        let max_x = grid_shape.axis_size_x().saturating_sub(1) as f64;
        let max_y = grid_shape.axis_size_y().saturating_sub(1) as f64;

        (self.position.x, self.velocity.x) =
            reflect(self.position.x + self.velocity.x * dt, self.velocity.x, max_x);
        (self.position.y, self.velocity.y) =
            reflect(self.position.y + self.velocity.y * dt, self.velocity.y, max_y);
    }
}

fn reflect(position: f64, velocity: f64, max: f64) -> (f64, f64) {
    if position < 0.0 {
        (0.0, velocity.abs())
    } else if position > max {
        (max, -velocity.abs())
    } else {
        (position, velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_reflects_at_the_lower_edge() {
        let mut pin = Pin::new("pin_1", "Pin 1", (0.5, 0.5).into()).with_velocity((-1., -1.).into());

        pin.step(1.0, [10, 10].into());

        assert_eq!(pin.position, PixelPos::new(0., 0.));
        assert_eq!(pin.velocity, PixelPos::new(1., 1.));
    }

    #[test]
    fn it_reflects_at_the_upper_edge() {
        let mut pin = Pin::new("p", "", (8.5, 2.).into()).with_velocity((2., 0.5).into());

        pin.step(1.0, [5, 10].into());

        assert_eq!(pin.position, PixelPos::new(9., 2.5));
        assert_eq!(pin.velocity, PixelPos::new(-2., 0.5));
    }

    #[test]
    fn it_moves_freely_inside_the_grid() {
        let mut pin = Pin::new("p", "", (2., 2.).into()).with_velocity((1., -0.5).into());

        pin.step(2.0, [10, 10].into());
        assert_eq!(pin.position, PixelPos::new(4., 1.));

        pin.step(0.0, [10, 10].into());
        assert_eq!(pin.position, PixelPos::new(4., 1.));
        assert_eq!(pin.velocity, PixelPos::new(1., -0.5));
    }
}
