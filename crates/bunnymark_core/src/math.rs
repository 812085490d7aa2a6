//! Viewport math
//!
//! Re-exports glam with the screen-space helpers used by the simulation and
//! the sprite shaders

pub use glam::*;

use serde::{Deserialize, Serialize};

/// Visible area in pixels. Origin is the top-left corner, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn center(&self) -> Vec2 {
        self.size() / 2.0
    }

    /// Orthographic projection from pixel space to clip space.
    ///
    /// `(0, 0)` lands on the top-left clip corner and `(width, height)` on the
    /// bottom-right one. Depth maps `z = 0` to `0.0`.
    pub fn projection(&self) -> Mat4 {
        Mat4::orthographic_rh(0.0, self.width, self.height, 0.0, 0.0, 1.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_is_half_size() {
        let viewport = Viewport::new(800.0, 600.0);
        assert_eq!(viewport.center(), Vec2::new(400.0, 300.0));
    }

    #[test]
    fn projection_maps_corners() {
        let viewport = Viewport::new(800.0, 600.0);
        let proj = viewport.projection();

        let top_left = proj * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let bottom_right = proj * Vec4::new(800.0, 600.0, 0.0, 1.0);

        assert!((top_left.x + 1.0).abs() < 1e-6);
        assert!((top_left.y - 1.0).abs() < 1e-6);
        assert!((bottom_right.x - 1.0).abs() < 1e-6);
        assert!((bottom_right.y + 1.0).abs() < 1e-6);
        assert!(top_left.z.abs() < 1e-6);
    }
}
