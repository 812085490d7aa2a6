//! GPU record layouts for sprites
//!
//! Quads are anchored at their top-left corner. Corners are emitted in the
//! order (0,0) (1,0) (1,1) (0,0) (1,1) (0,1), which the shaders mirror.

use bunnymark_core::Entity;
use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// Per-sprite record shared by the instanced and storage-pull strategies.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    pub position: [f32; 3],
    pub rotation: f32,
    pub size: [f32; 2],
    pub _padding: [f32; 2],
    /// Texture sub-rectangle as (u, v, width, height) in normalized coordinates.
    pub uv_rect: [f32; 4],
    pub color: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<SpriteInstance>() == 64);

impl SpriteInstance {
    pub fn new(entity: &Entity, appearance: &SpriteAppearance) -> Self {
        Self {
            position: [entity.position.x, entity.position.y, appearance.depth],
            rotation: 0.0,
            size: appearance.size.to_array(),
            _padding: [0.0; 2],
            uv_rect: appearance.uv_rect,
            color: appearance.tint,
        }
    }
}

/// One expanded corner of a sprite quad.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<SpriteVertex>() == 32);

/// Corner of the shared unit quad drawn once per instance.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub corner: [f32; 2],
    pub uv: [f32; 2],
}

/// Corners of the two triangles making up a quad.
pub const QUAD_CORNERS: [[f32; 2]; 6] = [
    [0.0, 0.0],
    [1.0, 0.0],
    [1.0, 1.0],
    [0.0, 0.0],
    [1.0, 1.0],
    [0.0, 1.0],
];

/// The four distinct corners, in index-buffer order.
pub const UNIT_QUAD: [QuadVertex; 4] = [
    QuadVertex {
        corner: [0.0, 0.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        corner: [1.0, 0.0],
        uv: [1.0, 0.0],
    },
    QuadVertex {
        corner: [1.0, 1.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        corner: [0.0, 1.0],
        uv: [0.0, 1.0],
    },
];

pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// What every sprite in the batch looks like. All sprites share one texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteAppearance {
    pub size: Vec2,
    pub uv_rect: [f32; 4],
    pub tint: [f32; 4],
    pub depth: f32,
}

impl SpriteAppearance {
    /// Full texture drawn at its native pixel size, untinted.
    pub fn for_texture(width: u32, height: u32) -> Self {
        Self {
            size: Vec2::new(width as f32, height as f32),
            uv_rect: [0.0, 0.0, 1.0, 1.0],
            tint: [1.0; 4],
            depth: 0.0,
        }
    }

    /// Expand one entity into the four distinct corners of its quad.
    pub fn quad(&self, entity: &Entity) -> [SpriteVertex; 4] {
        UNIT_QUAD.map(|corner| self.vertex(entity, corner.corner))
    }

    /// Expand one entity into two independent triangles.
    pub fn triangles(&self, entity: &Entity) -> [SpriteVertex; 6] {
        QUAD_CORNERS.map(|corner| self.vertex(entity, corner))
    }

    fn vertex(&self, entity: &Entity, corner: [f32; 2]) -> SpriteVertex {
        let corner = Vec2::from_array(corner);
        let position = entity.position + corner * self.size;
        let [u, v, w, h] = self.uv_rect;
        let uv = Vec2::new(u, v) + corner * Vec2::new(w, h);
        SpriteVertex {
            position: position.to_array(),
            uv: uv.to_array(),
            color: self.tint,
        }
    }
}

impl Default for SpriteAppearance {
    fn default() -> Self {
        Self::for_texture(32, 32)
    }
}
