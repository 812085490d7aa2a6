//! Sprite movement
//!
//! Moves every sprite by `velocity * dt` and bounces it off the viewport
//! edges. Reflection is discrete: the test runs on the already-moved position,
//! so a sprite may sit past an edge for one frame before it heads back. The
//! position is never clamped.

use glam::Vec2;

use crate::entity::EntityStore;
use crate::math::Viewport;

/// Sprite size used for the bounds test when none is configured.
pub const DEFAULT_SPRITE_EXTENT: f32 = 32.0;

/// Region a sprite's top-left corner may occupy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
    /// Fixed per run; not measured from the texture.
    pub sprite_extent: f32,
}

impl Bounds {
    pub fn new(viewport: Viewport, sprite_extent: f32) -> Self {
        Self {
            width: viewport.width,
            height: viewport.height,
            sprite_extent,
        }
    }

    /// Largest in-bounds position on each axis.
    pub fn max(&self) -> Vec2 {
        Vec2::new(
            self.width - self.sprite_extent,
            self.height - self.sprite_extent,
        )
    }
}

/// Number of velocity flips performed by one step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepStats {
    pub reflections_x: usize,
    pub reflections_y: usize,
}

impl StepStats {
    pub fn total(&self) -> usize {
        self.reflections_x + self.reflections_y
    }
}

pub struct SimulationStepper {
    bounds: Bounds,
}

impl SimulationStepper {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Advance every sprite by `dt_millis`.
    ///
    /// `dt_millis` is not clamped. After a long stall a sprite can land far
    /// outside the viewport; it still only has its velocity flipped.
    pub fn step(&self, store: &mut EntityStore, dt_millis: f32) -> StepStats {
        let max = self.bounds.max();
        let mut stats = StepStats::default();

        for entity in store.iter_mut() {
            entity.position += entity.velocity * dt_millis;

            if entity.position.x < 0.0 || entity.position.x > max.x {
                entity.velocity.x = -entity.velocity.x;
                stats.reflections_x += 1;
            }
            if entity.position.y < 0.0 || entity.position.y > max.y {
                entity.velocity.y = -entity.velocity.y;
                stats.reflections_y += 1;
            }
        }

        stats
    }
}
