//! Bunnymark Core
//!
//! Contains the simulation half of the benchmark:
//! - Sprite population (position + velocity per sprite)
//! - Boundary-reflecting stepper
//! - Frame clock and FPS sampling
//! - Viewport and projection math

pub mod entity;
pub mod math;
pub mod step;
pub mod time;

pub use glam;

pub use entity::{Entity, EntityStore, DEFAULT_SEED};
pub use math::Viewport;
pub use step::{Bounds, SimulationStepper, StepStats, DEFAULT_SPRITE_EXTENT};
pub use time::FrameClock;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
