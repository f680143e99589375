use egui::{Pos2, Vec2};

use crate::geometry::{point_to_normalized, point_to_pixel, Point};

pub const DEFAULT_WIDTH: f32 = 800.0;
pub const DEFAULT_HEIGHT: f32 = 600.0;
pub const MAX_RENDER_WIDTH: f32 = 1200.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Fit an image into the available width, never wider than `max_width`,
    /// keeping the image's aspect ratio. Degenerate inputs fall back to the
    /// default canvas.
    pub fn fit_image(container_width: f32, image_size: [usize; 2], max_width: f32) -> Self {
        let [image_width, image_height] = image_size;
        if image_width == 0 || image_height == 0 || container_width <= 0.0 {
            return Self::default();
        }
        let aspect_ratio = image_height as f32 / image_width as f32;
        let width = container_width.min(max_width);
        Self::new(width, width * aspect_ratio)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn to_normalized(&self, local: Pos2) -> Point {
        point_to_normalized(local.x, local.y, self.width, self.height)
    }

    pub fn to_pixel(&self, point: Point) -> Pos2 {
        let (x, y) = point_to_pixel(point, self.width, self.height);
        Pos2::new(x, y)
    }

    pub fn delta_to_normalized(&self, delta: Vec2) -> (f32, f32) {
        (delta.x / self.width, delta.y / self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_caps_width_and_keeps_aspect() {
        let vp = Viewport::fit_image(2000.0, [4000, 3000], MAX_RENDER_WIDTH);
        assert_eq!(vp.width, 1200.0);
        assert_eq!(vp.height, 900.0);

        let vp = Viewport::fit_image(640.0, [4000, 3000], MAX_RENDER_WIDTH);
        assert_eq!(vp.width, 640.0);
        assert_eq!(vp.height, 480.0);
    }

    #[test]
    fn test_fit_degenerate_falls_back_to_default() {
        assert_eq!(Viewport::fit_image(900.0, [0, 0], MAX_RENDER_WIDTH), Viewport::default());
        assert_eq!(Viewport::fit_image(0.0, [100, 100], MAX_RENDER_WIDTH), Viewport::default());
    }

    #[test]
    fn test_local_positions_round_trip() {
        let vp = Viewport::new(1000.0, 500.0);
        let p = vp.to_normalized(Pos2::new(250.0, 400.0));
        assert_eq!(p, Point::new(0.25, 0.8));
        let back = vp.to_pixel(p);
        assert!((back.x - 250.0).abs() < 1e-3);
        assert!((back.y - 400.0).abs() < 1e-3);
    }
}
