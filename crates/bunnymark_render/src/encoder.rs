//! Batch encoders
//!
//! Each strategy serializes the whole sprite population into one contiguous
//! byte range, one fixed-size record per sprite, in store order. Capacity is
//! checked before the first byte is written.

use crate::backend::{BufferKind, DrawCall};
use crate::error::{ConfigError, EncodeError};
use crate::instance::{SpriteAppearance, SpriteInstance, SpriteVertex, QUAD_INDICES, UNIT_QUAD};
use crate::DeviceCapabilities;
use bunnymark_asset::shader::{SPRITE_INSTANCED, SPRITE_PULL, SPRITE_VERTEX};
use bunnymark_core::{Entity, EntityStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How sprites reach the GPU each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeStrategy {
    /// Every sprite expanded to quad corners on the CPU.
    VertexDuplication,
    /// One instance record per sprite over a shared unit quad.
    InstanceAttribute,
    /// One record per sprite in a storage buffer indexed from the vertex shader.
    StorageBufferPull,
}

impl EncodeStrategy {
    pub const ALL: [EncodeStrategy; 3] = [
        EncodeStrategy::VertexDuplication,
        EncodeStrategy::InstanceAttribute,
        EncodeStrategy::StorageBufferPull,
    ];

    /// Name of the shader program drawing this strategy's batches.
    pub fn shader_program(self) -> &'static str {
        match self {
            EncodeStrategy::VertexDuplication => SPRITE_VERTEX,
            EncodeStrategy::InstanceAttribute => SPRITE_INSTANCED,
            EncodeStrategy::StorageBufferPull => SPRITE_PULL,
        }
    }
}

impl fmt::Display for EncodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EncodeStrategy::VertexDuplication => "vertex duplication",
            EncodeStrategy::InstanceAttribute => "instance attribute",
            EncodeStrategy::StorageBufferPull => "storage buffer pull",
        })
    }
}

/// A strategy or policy name that matched nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {what} '{value}', expected one of: {expected}")]
pub struct ParseNameError {
    pub what: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl FromStr for EncodeStrategy {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "vertex" | "vertex_duplication" => Ok(EncodeStrategy::VertexDuplication),
            "instanced" | "instance_attribute" => Ok(EncodeStrategy::InstanceAttribute),
            "pull" | "storage" | "storage_buffer_pull" => Ok(EncodeStrategy::StorageBufferPull),
            _ => Err(ParseNameError {
                what: "encode strategy",
                value: s.to_string(),
                expected: "vertex, instanced, pull",
            }),
        }
    }
}

/// Static buffers a strategy needs besides the per-frame batch.
#[derive(Debug, Default, PartialEq)]
pub struct StaticGeometry {
    pub vertices: Option<Vec<u8>>,
    pub indices: Option<Vec<u8>>,
}

/// Six corners per sprite, or four with a shared index buffer.
#[derive(Debug, Clone)]
pub struct VertexDuplication {
    appearance: SpriteAppearance,
    indexed: bool,
}

impl VertexDuplication {
    fn corners(&self) -> usize {
        if self.indexed {
            4
        } else {
            6
        }
    }

    fn write(&self, entity: &Entity, out: &mut [u8]) {
        if self.indexed {
            out.copy_from_slice(bytemuck::cast_slice(&self.appearance.quad(entity)[..]));
        } else {
            out.copy_from_slice(bytemuck::cast_slice(&self.appearance.triangles(entity)[..]));
        }
    }
}

/// One [`SpriteInstance`] per sprite, stepped per instance.
#[derive(Debug, Clone)]
pub struct InstanceAttribute {
    appearance: SpriteAppearance,
}

/// One [`SpriteInstance`] per sprite, read from a storage buffer.
#[derive(Debug, Clone)]
pub struct StorageBufferPull {
    appearance: SpriteAppearance,
}

/// Serializes the sprite population for one draw.
#[derive(Debug, Clone)]
pub enum BatchEncoder {
    VertexDuplication(VertexDuplication),
    InstanceAttribute(InstanceAttribute),
    StorageBufferPull(StorageBufferPull),
}

impl BatchEncoder {
    /// `indexed` only affects vertex duplication.
    pub fn new(strategy: EncodeStrategy, appearance: SpriteAppearance, indexed: bool) -> Self {
        match strategy {
            EncodeStrategy::VertexDuplication => {
                BatchEncoder::VertexDuplication(VertexDuplication {
                    appearance,
                    indexed,
                })
            }
            EncodeStrategy::InstanceAttribute => {
                BatchEncoder::InstanceAttribute(InstanceAttribute { appearance })
            }
            EncodeStrategy::StorageBufferPull => {
                BatchEncoder::StorageBufferPull(StorageBufferPull { appearance })
            }
        }
    }

    pub fn strategy(&self) -> EncodeStrategy {
        match self {
            BatchEncoder::VertexDuplication(_) => EncodeStrategy::VertexDuplication,
            BatchEncoder::InstanceAttribute(_) => EncodeStrategy::InstanceAttribute,
            BatchEncoder::StorageBufferPull(_) => EncodeStrategy::StorageBufferPull,
        }
    }

    pub fn appearance(&self) -> &SpriteAppearance {
        match self {
            BatchEncoder::VertexDuplication(e) => &e.appearance,
            BatchEncoder::InstanceAttribute(e) => &e.appearance,
            BatchEncoder::StorageBufferPull(e) => &e.appearance,
        }
    }

    pub fn is_indexed(&self) -> bool {
        match self {
            BatchEncoder::VertexDuplication(e) => e.indexed,
            BatchEncoder::InstanceAttribute(_) => true,
            BatchEncoder::StorageBufferPull(_) => false,
        }
    }

    /// Bytes written per sprite.
    pub fn record_size(&self) -> usize {
        match self {
            BatchEncoder::VertexDuplication(e) => e.corners() * std::mem::size_of::<SpriteVertex>(),
            BatchEncoder::InstanceAttribute(_) | BatchEncoder::StorageBufferPull(_) => {
                std::mem::size_of::<SpriteInstance>()
            }
        }
    }

    pub fn required_capacity(&self, count: usize) -> usize {
        count * self.record_size()
    }

    /// Binding of the per-frame batch buffer.
    pub fn target_kind(&self) -> BufferKind {
        match self {
            BatchEncoder::VertexDuplication(_) => BufferKind::Vertex,
            BatchEncoder::InstanceAttribute(_) => BufferKind::Instance,
            BatchEncoder::StorageBufferPull(_) => BufferKind::Storage,
        }
    }

    /// Reject strategies the backend cannot draw with `count` sprites.
    pub fn validate(&self, caps: &DeviceCapabilities, count: usize) -> Result<(), ConfigError> {
        if count == 0 {
            return Err(ConfigError::NoSprites);
        }
        let elements = count.checked_mul(6).filter(|n| u32::try_from(*n).is_ok());
        if elements.is_none() {
            return Err(ConfigError::TooManySprites { count });
        }

        let required = self.required_capacity(count) as u64;
        match self {
            BatchEncoder::VertexDuplication(_) => {}
            BatchEncoder::InstanceAttribute(_) => {
                if !caps.supports_instancing {
                    return Err(ConfigError::MissingCapability {
                        strategy: self.strategy(),
                        missing: "instance-rate vertex attributes",
                    });
                }
            }
            BatchEncoder::StorageBufferPull(_) => {
                if !caps.supports_vertex_storage {
                    return Err(ConfigError::MissingCapability {
                        strategy: self.strategy(),
                        missing: "vertex-stage storage buffers",
                    });
                }
                if required > caps.max_storage_binding_size {
                    return Err(ConfigError::BatchTooLarge {
                        required,
                        limit: caps.max_storage_binding_size,
                    });
                }
            }
        }
        if required > caps.max_buffer_size {
            return Err(ConfigError::BatchTooLarge {
                required,
                limit: caps.max_buffer_size,
            });
        }
        Ok(())
    }

    /// Draw covering `count` sprites. Assumes [`BatchEncoder::validate`] passed.
    pub fn draw_call(&self, count: u32) -> DrawCall {
        match self {
            BatchEncoder::VertexDuplication(e) => DrawCall {
                elements: count * 6,
                instances: 1,
                indexed: e.indexed,
            },
            BatchEncoder::InstanceAttribute(_) => DrawCall {
                elements: QUAD_INDICES.len() as u32,
                instances: count,
                indexed: true,
            },
            BatchEncoder::StorageBufferPull(_) => DrawCall {
                elements: count * 6,
                instances: 1,
                indexed: false,
            },
        }
    }

    /// Buffers uploaded once for `count` sprites.
    pub fn static_geometry(&self, count: u32) -> StaticGeometry {
        match self {
            BatchEncoder::VertexDuplication(e) if e.indexed => {
                let indices: Vec<u32> = (0..count)
                    .flat_map(|sprite| QUAD_INDICES.map(|i| sprite * 4 + i))
                    .collect();
                StaticGeometry {
                    vertices: None,
                    indices: Some(bytemuck::cast_slice(&indices).to_vec()),
                }
            }
            BatchEncoder::InstanceAttribute(_) => StaticGeometry {
                vertices: Some(bytemuck::cast_slice(&UNIT_QUAD[..]).to_vec()),
                indices: Some(bytemuck::cast_slice(&QUAD_INDICES[..]).to_vec()),
            },
            _ => StaticGeometry::default(),
        }
    }

    /// Write one record per sprite into the front of `target`.
    ///
    /// Returns the number of bytes written. `target` is left untouched when it
    /// is too small for the whole population.
    pub fn encode(&self, store: &EntityStore, target: &mut [u8]) -> Result<usize, EncodeError> {
        let record = self.record_size();
        let required = self.required_capacity(store.len());
        if target.len() < required {
            return Err(EncodeError::Capacity {
                required,
                available: target.len(),
            });
        }

        let records = target[..required].chunks_exact_mut(record);
        match self {
            BatchEncoder::VertexDuplication(e) => {
                for (entity, out) in store.iter().zip(records) {
                    e.write(entity, out);
                }
            }
            BatchEncoder::InstanceAttribute(InstanceAttribute { appearance })
            | BatchEncoder::StorageBufferPull(StorageBufferPull { appearance }) => {
                for (entity, out) in store.iter().zip(records) {
                    out.copy_from_slice(bytemuck::bytes_of(&SpriteInstance::new(entity, appearance)));
                }
            }
        }
        Ok(required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BackendType;
    use bunnymark_core::Viewport;

    fn store(count: usize) -> EntityStore {
        let mut store = EntityStore::create(count, Viewport::default(), 7);
        for (i, entity) in store.iter_mut().enumerate() {
            entity.position.x = i as f32 * 10.0;
            entity.position.y = i as f32;
        }
        store
    }

    fn encoder(strategy: EncodeStrategy) -> BatchEncoder {
        BatchEncoder::new(strategy, SpriteAppearance::for_texture(26, 37), false)
    }

    // Host byte buffers carry no alignment guarantee, so read words by value.
    fn words<T: bytemuck::Pod>(bytes: &[u8]) -> Vec<T> {
        bytes
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    #[test]
    fn test_parse_strategy_names() {
        assert_eq!("pull".parse(), Ok(EncodeStrategy::StorageBufferPull));
        assert_eq!("Instanced".parse(), Ok(EncodeStrategy::InstanceAttribute));
        assert_eq!(
            "vertex-duplication".parse(),
            Ok(EncodeStrategy::VertexDuplication)
        );
        assert!("compute".parse::<EncodeStrategy>().is_err());
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&EncodeStrategy::StorageBufferPull).unwrap();
        assert_eq!(json, "\"storage_buffer_pull\"");
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(encoder(EncodeStrategy::VertexDuplication).record_size(), 192);
        assert_eq!(encoder(EncodeStrategy::InstanceAttribute).record_size(), 64);
        assert_eq!(encoder(EncodeStrategy::StorageBufferPull).record_size(), 64);

        let indexed = BatchEncoder::new(
            EncodeStrategy::VertexDuplication,
            SpriteAppearance::default(),
            true,
        );
        assert_eq!(indexed.record_size(), 128);
    }

    #[test]
    fn test_every_strategy_writes_all_sprites_in_order() {
        let store = store(5);
        for strategy in EncodeStrategy::ALL {
            let encoder = encoder(strategy);
            let mut target = vec![0u8; encoder.required_capacity(store.len())];
            let written = encoder.encode(&store, &mut target).unwrap();
            assert_eq!(written, target.len());

            for (i, record) in target.chunks_exact(encoder.record_size()).enumerate() {
                let floats: Vec<f32> = words(record);
                // Both record layouts start with the sprite's top-left corner.
                assert_eq!(floats[0], i as f32 * 10.0, "{strategy} record {i}");
                assert_eq!(floats[1], i as f32, "{strategy} record {i}");
            }
        }
    }

    #[test]
    fn test_vertex_records_match_appearance() {
        let store = store(2);
        let encoder = encoder(EncodeStrategy::VertexDuplication);
        let mut target = vec![0u8; encoder.required_capacity(2)];
        encoder.encode(&store, &mut target).unwrap();

        let vertices: Vec<SpriteVertex> = words(&target);
        assert_eq!(vertices.len(), 12);
        let expected = encoder.appearance().triangles(&store.as_slice()[1]);
        assert_eq!(&vertices[6..], &expected);
    }

    #[test]
    fn test_undersized_target_is_untouched() {
        let store = store(4);
        for strategy in EncodeStrategy::ALL {
            let encoder = encoder(strategy);
            let required = encoder.required_capacity(4);
            let mut target = vec![0xAB; required - 1];

            let err = encoder.encode(&store, &mut target).unwrap_err();
            assert_eq!(
                err,
                EncodeError::Capacity {
                    required,
                    available: required - 1
                }
            );
            assert!(target.iter().all(|&b| b == 0xAB));
        }
    }

    #[test]
    fn test_oversized_target_keeps_tail() {
        let store = store(2);
        let encoder = encoder(EncodeStrategy::StorageBufferPull);
        let mut target = vec![0xCD; 200];
        let written = encoder.encode(&store, &mut target).unwrap();
        assert_eq!(written, 128);
        assert!(target[128..].iter().all(|&b| b == 0xCD));
    }

    #[test]
    fn test_draw_calls() {
        let vertex = encoder(EncodeStrategy::VertexDuplication).draw_call(10);
        assert_eq!((vertex.elements, vertex.instances, vertex.indexed), (60, 1, false));

        let instanced = encoder(EncodeStrategy::InstanceAttribute).draw_call(10);
        assert_eq!((instanced.elements, instanced.instances, instanced.indexed), (6, 10, true));

        let pull = encoder(EncodeStrategy::StorageBufferPull).draw_call(10);
        assert_eq!((pull.elements, pull.instances, pull.indexed), (60, 1, false));
    }

    #[test]
    fn test_indexed_geometry() {
        let indexed = BatchEncoder::new(
            EncodeStrategy::VertexDuplication,
            SpriteAppearance::default(),
            true,
        );
        assert!(indexed.is_indexed());
        let geometry = indexed.static_geometry(2);
        assert!(geometry.vertices.is_none());
        let indices: Vec<u32> = words(geometry.indices.as_deref().unwrap());
        assert_eq!(indices, [0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);

        let pull = encoder(EncodeStrategy::StorageBufferPull).static_geometry(3);
        assert_eq!(pull, StaticGeometry::default());

        let instanced = encoder(EncodeStrategy::InstanceAttribute).static_geometry(3);
        assert_eq!(instanced.vertices.map(|v| v.len()), Some(64));
        assert_eq!(instanced.indices.map(|i| i.len()), Some(24));
    }

    #[test]
    fn test_validate_against_capabilities() {
        let mut caps = DeviceCapabilities::full(BackendType::Headless);
        caps.supports_vertex_storage = false;
        caps.supports_instancing = false;

        assert!(encoder(EncodeStrategy::VertexDuplication).validate(&caps, 100).is_ok());
        assert!(matches!(
            encoder(EncodeStrategy::StorageBufferPull).validate(&caps, 100),
            Err(ConfigError::MissingCapability { .. })
        ));
        assert!(matches!(
            encoder(EncodeStrategy::InstanceAttribute).validate(&caps, 100),
            Err(ConfigError::MissingCapability { .. })
        ));
        assert!(matches!(
            encoder(EncodeStrategy::VertexDuplication).validate(&caps, 0),
            Err(ConfigError::NoSprites)
        ));
    }

    #[test]
    fn test_validate_buffer_limits() {
        let mut caps = DeviceCapabilities::full(BackendType::Headless);
        caps.max_storage_binding_size = 1024;

        let pull = encoder(EncodeStrategy::StorageBufferPull);
        assert!(pull.validate(&caps, 16).is_ok());
        assert!(matches!(
            pull.validate(&caps, 17),
            Err(ConfigError::BatchTooLarge { required: 1088, limit: 1024 })
        ));
    }
}
