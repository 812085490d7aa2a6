//! Error types for the frame pipeline

use crate::backend::SubmissionToken;
use crate::cycler::CyclePolicy;
use crate::driver::FrameState;
use crate::encoder::EncodeStrategy;
use bunnymark_asset::AssetError;
use thiserror::Error;

/// Failure reported by a graphics backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("device request failed: {0}")]
    Device(String),

    #[error("surface lost or outdated")]
    SurfaceLost,

    #[error("surface error: {0}")]
    Surface(String),

    #[error("out of GPU memory")]
    OutOfMemory,

    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u64 },

    #[error("write of {len} bytes at offset {offset} overflows a {size}-byte buffer")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("{strategy} pipeline rejected: {reason}")]
    Pipeline {
        strategy: EncodeStrategy,
        reason: String,
    },
}

/// Startup configuration the backend cannot satisfy.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{strategy} batching needs {missing}, which this backend lacks")]
    MissingCapability {
        strategy: EncodeStrategy,
        missing: &'static str,
    },

    #[error("{policy} buffer cycling needs {missing}, which this backend lacks")]
    UnsupportedPolicy {
        policy: CyclePolicy,
        missing: &'static str,
    },

    #[error("a fixed buffer pool needs at least 2 regions, got {regions}")]
    PoolTooSmall { regions: usize },

    #[error("batch of {required} bytes exceeds the backend limit of {limit}")]
    BatchTooLarge { required: u64, limit: u64 },

    #[error("{count} sprites overflow the 32-bit draw range")]
    TooManySprites { count: usize },

    #[error("the benchmark needs at least one sprite")]
    NoSprites,
}

/// Encoding into a target that cannot hold the whole batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("encode target holds {available} bytes but {required} are needed")]
    Capacity { required: usize, available: usize },
}

/// Failure to obtain a write target for the frame.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("region {slot} is still read by submission {token:?}")]
    SyncViolation { slot: usize, token: SubmissionToken },

    #[error("requested {requested} bytes from a {capacity}-byte region")]
    RegionTooSmall { requested: u64, capacity: u64 },

    #[error("backend failed while acquiring a region")]
    Backend(#[from] BackendError),
}

/// Anything that stops a frame.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),

    #[error("batch encoding failed")]
    Encode(#[from] EncodeError),

    #[error("buffer acquisition failed")]
    Acquire(#[from] CycleError),

    #[error("backend error")]
    Backend(#[from] BackendError),

    #[error("startup asset unavailable")]
    Asset(#[from] AssetError),

    #[error("driver stopped at {state:?} after an earlier fatal error")]
    Poisoned { state: FrameState },
}

impl DriverError {
    /// Fatal errors end the run. Backend errors leave the driver usable and
    /// the caller decides whether to keep going.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DriverError::Backend(_))
    }

    /// The surface needs reconfiguring before the next frame.
    pub fn is_surface_lost(&self) -> bool {
        matches!(self, DriverError::Backend(BackendError::SurfaceLost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_are_recoverable() {
        let err = DriverError::from(BackendError::SurfaceLost);
        assert!(!err.is_fatal());
        assert!(err.is_surface_lost());
    }

    #[test]
    fn test_capacity_and_acquire_errors_are_fatal() {
        let encode = DriverError::from(EncodeError::Capacity {
            required: 128,
            available: 64,
        });
        assert!(encode.is_fatal());

        let acquire = DriverError::from(CycleError::SyncViolation {
            slot: 1,
            token: SubmissionToken::from_raw(3),
        });
        assert!(acquire.is_fatal());
        assert!(!acquire.is_surface_lost());
    }

    #[test]
    fn test_messages_name_the_missing_capability() {
        let err = ConfigError::MissingCapability {
            strategy: EncodeStrategy::StorageBufferPull,
            missing: "vertex-stage storage buffers",
        };
        let message = err.to_string();
        assert!(message.contains("storage"));
        assert!(message.contains("vertex-stage storage buffers"));
    }
}
