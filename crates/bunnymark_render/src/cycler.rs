//! Write-target cycling
//!
//! Hands the frame a GPU region to upload into without ever touching bytes a
//! submitted frame may still be reading.

use crate::backend::{BufferKind, GraphicsBackend, Region, SubmissionToken};
use crate::encoder::ParseNameError;
use crate::error::{BackendError, ConfigError, CycleError};
use crate::DeviceCapabilities;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regions used when a pool size is not given.
pub const DEFAULT_POOL_REGIONS: usize = 2;

/// How write targets are reused across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CyclePolicy {
    /// A fresh backend allocation every frame.
    Transient,
    /// `regions` buffers used round-robin, guarded by completion signals.
    FixedPool { regions: usize },
    /// One buffer rewritten every frame, relying on ordered uploads.
    PersistentSingle,
}

impl Default for CyclePolicy {
    fn default() -> Self {
        CyclePolicy::FixedPool {
            regions: DEFAULT_POOL_REGIONS,
        }
    }
}

impl fmt::Display for CyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePolicy::Transient => f.write_str("transient"),
            CyclePolicy::FixedPool { regions } => write!(f, "fixed pool ({regions} regions)"),
            CyclePolicy::PersistentSingle => f.write_str("persistent single"),
        }
    }
}

/// Accepts `transient`, `persistent`, `pool` and `pool:<regions>`.
impl FromStr for CyclePolicy {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_ascii_lowercase().replace('-', "_");
        let (name, regions) = match name.split_once(':') {
            Some((name, regions)) => (name.to_string(), Some(regions.trim().to_string())),
            None => (name, None),
        };
        let unknown = || ParseNameError {
            what: "cycle policy",
            value: s.to_string(),
            expected: "transient, persistent, pool, pool:<regions>",
        };

        match (name.as_str(), regions) {
            ("transient", None) => Ok(CyclePolicy::Transient),
            ("persistent" | "persistent_single" | "single", None) => Ok(CyclePolicy::PersistentSingle),
            ("pool" | "fixed_pool", None) => Ok(CyclePolicy::default()),
            ("pool" | "fixed_pool", Some(regions)) => regions
                .parse()
                .map(|regions| CyclePolicy::FixedPool { regions })
                .map_err(|_| unknown()),
            _ => Err(unknown()),
        }
    }
}

struct Slot {
    region: Region,
    in_flight: Option<SubmissionToken>,
}

/// Provides the region each frame uploads its batch into.
pub struct FrameBufferCycler {
    policy: CyclePolicy,
    kind: BufferKind,
    region_size: u64,
    slots: Vec<Slot>,
    frame_index: u64,
    acquired: Option<usize>,
}

impl FrameBufferCycler {
    /// Check that the backend can honour `policy` for regions of `region_size` bytes.
    pub fn validate(
        policy: CyclePolicy,
        region_size: u64,
        caps: &DeviceCapabilities,
    ) -> Result<(), ConfigError> {
        let missing = match policy {
            CyclePolicy::Transient => (!caps.transient_allocation).then_some("transient allocation"),
            CyclePolicy::FixedPool { regions } => {
                if regions < 2 {
                    return Err(ConfigError::PoolTooSmall { regions });
                }
                (!caps.completion_signals).then_some("completion signals")
            }
            CyclePolicy::PersistentSingle => (!caps.ordered_uploads).then_some("ordered uploads"),
        };
        if let Some(missing) = missing {
            return Err(ConfigError::UnsupportedPolicy { policy, missing });
        }
        if region_size > caps.max_buffer_size {
            return Err(ConfigError::BatchTooLarge {
                required: region_size,
                limit: caps.max_buffer_size,
            });
        }
        Ok(())
    }

    /// Validate and allocate the persistent regions `policy` cycles through.
    pub fn new<B: GraphicsBackend + ?Sized>(
        policy: CyclePolicy,
        kind: BufferKind,
        region_size: u64,
        backend: &mut B,
    ) -> Result<Self, CycleError> {
        Self::validate(policy, region_size, backend.capabilities())?;

        let regions = match policy {
            CyclePolicy::Transient => 0,
            CyclePolicy::FixedPool { regions } => regions,
            CyclePolicy::PersistentSingle => 1,
        };
        let slots = (0..regions)
            .map(|_| {
                let buffer = backend.create_buffer(kind, region_size)?;
                Ok(Slot {
                    region: Region::whole(buffer, region_size),
                    in_flight: None,
                })
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        tracing::debug!(%policy, ?kind, region_size, "Buffer cycler ready");

        Ok(Self {
            policy,
            kind,
            region_size,
            slots,
            frame_index: 0,
            acquired: None,
        })
    }

    pub fn policy(&self) -> CyclePolicy {
        self.policy
    }

    pub fn region_size(&self) -> u64 {
        self.region_size
    }

    /// Frames that have acquired a region so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Submissions still guarding a pool region.
    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|s| s.in_flight.is_some()).count()
    }

    /// Submission the next acquire would have to outlive, if any.
    pub fn pending_reuse(&self) -> Option<SubmissionToken> {
        match self.policy {
            CyclePolicy::FixedPool { .. } => self.slots[self.next_slot()].in_flight,
            CyclePolicy::Transient | CyclePolicy::PersistentSingle => None,
        }
    }

    fn next_slot(&self) -> usize {
        (self.frame_index % self.slots.len() as u64) as usize
    }

    /// Region for this frame's batch of `size` bytes.
    ///
    /// A pool region is only handed out once the submission that last read
    /// it has completed. Otherwise the acquire fails and the frame index
    /// does not advance.
    pub fn acquire_write_target<B: GraphicsBackend + ?Sized>(
        &mut self,
        size: u64,
        backend: &mut B,
    ) -> Result<Region, CycleError> {
        let region = match self.policy {
            CyclePolicy::Transient => {
                self.acquired = None;
                backend.acquire_transient(self.kind, size)?
            }
            CyclePolicy::FixedPool { .. } | CyclePolicy::PersistentSingle => {
                if size > self.region_size {
                    return Err(CycleError::RegionTooSmall {
                        requested: size,
                        capacity: self.region_size,
                    });
                }

                let index = self.next_slot();
                let slot = &mut self.slots[index];
                if let Some(token) = slot.in_flight {
                    if !backend.is_complete(token) {
                        return Err(CycleError::SyncViolation { slot: index, token });
                    }
                    slot.in_flight = None;
                }
                self.acquired = Some(index);
                Region { size, ..slot.region }
            }
        };

        self.frame_index += 1;
        Ok(region)
    }

    /// Guard the region acquired this frame with `token`.
    pub fn mark_submitted(&mut self, token: SubmissionToken) {
        if let (CyclePolicy::FixedPool { .. }, Some(index)) = (self.policy, self.acquired.take()) {
            self.slots[index].in_flight = Some(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{Completion, HeadlessBackend};
    use crate::BackendType;

    fn pool(regions: usize, backend: &mut HeadlessBackend) -> FrameBufferCycler {
        FrameBufferCycler::new(
            CyclePolicy::FixedPool { regions },
            BufferKind::Storage,
            256,
            backend,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_policy_names() {
        assert_eq!("transient".parse(), Ok(CyclePolicy::Transient));
        assert_eq!("persistent".parse(), Ok(CyclePolicy::PersistentSingle));
        assert_eq!("pool".parse(), Ok(CyclePolicy::FixedPool { regions: 2 }));
        assert_eq!("pool:3".parse(), Ok(CyclePolicy::FixedPool { regions: 3 }));
        assert!("pool:many".parse::<CyclePolicy>().is_err());
        assert!("ring".parse::<CyclePolicy>().is_err());
    }

    #[test]
    fn test_policy_serde_shape() {
        let json = serde_json::to_string(&CyclePolicy::FixedPool { regions: 3 }).unwrap();
        assert_eq!(json, r#"{"kind":"fixed_pool","regions":3}"#);
        let parsed: CyclePolicy = serde_json::from_str(r#"{"kind":"transient"}"#).unwrap();
        assert_eq!(parsed, CyclePolicy::Transient);
    }

    #[test]
    fn test_pool_reuses_region_two_frames_later() {
        let mut backend = HeadlessBackend::new();
        let mut cycler = pool(2, &mut backend);

        let mut regions = Vec::new();
        for _ in 0..4 {
            let region = cycler.acquire_write_target(256, &mut backend).unwrap();
            cycler.mark_submitted(backend.submit_empty());
            regions.push(region);
        }

        assert_eq!(regions[0], regions[2]);
        assert_eq!(regions[1], regions[3]);
        assert_ne!(regions[0].buffer, regions[1].buffer);
        assert_eq!(cycler.frame_index(), 4);
    }

    #[test]
    fn test_pool_refuses_region_still_in_flight() {
        let mut backend = HeadlessBackend::new().with_completion(Completion::Manual);
        let mut cycler = pool(2, &mut backend);

        cycler.acquire_write_target(128, &mut backend).unwrap();
        let first = backend.submit_empty();
        cycler.mark_submitted(first);
        cycler.acquire_write_target(128, &mut backend).unwrap();
        cycler.mark_submitted(backend.submit_empty());

        assert_eq!(cycler.pending_reuse(), Some(first));
        let err = cycler.acquire_write_target(128, &mut backend).unwrap_err();
        assert!(matches!(err, CycleError::SyncViolation { slot: 0, token } if token == first));
        assert_eq!(cycler.frame_index(), 2);

        backend.signal_complete(first);
        let region = cycler.acquire_write_target(128, &mut backend).unwrap();
        assert_eq!(region.size, 128);
        assert_eq!(cycler.frame_index(), 3);
    }

    #[test]
    fn test_pool_rejects_oversized_request() {
        let mut backend = HeadlessBackend::new();
        let mut cycler = pool(2, &mut backend);
        let err = cycler.acquire_write_target(257, &mut backend).unwrap_err();
        assert!(matches!(
            err,
            CycleError::RegionTooSmall {
                requested: 257,
                capacity: 256
            }
        ));
    }

    #[test]
    fn test_persistent_single_reuses_one_region() {
        let mut backend = HeadlessBackend::new().with_completion(Completion::Manual);
        let mut cycler = FrameBufferCycler::new(
            CyclePolicy::PersistentSingle,
            BufferKind::Vertex,
            64,
            &mut backend,
        )
        .unwrap();

        let first = cycler.acquire_write_target(64, &mut backend).unwrap();
        cycler.mark_submitted(backend.submit_empty());
        let second = cycler.acquire_write_target(64, &mut backend).unwrap();
        assert_eq!(first, second);
        assert_eq!(cycler.pending_reuse(), None);
    }

    #[test]
    fn test_transient_regions_never_alias() {
        let mut backend = HeadlessBackend::new().with_completion(Completion::Manual);
        let mut cycler =
            FrameBufferCycler::new(CyclePolicy::Transient, BufferKind::Instance, 64, &mut backend)
                .unwrap();

        let first = cycler.acquire_write_target(64, &mut backend).unwrap();
        cycler.mark_submitted(backend.submit_empty());
        let second = cycler.acquire_write_target(64, &mut backend).unwrap();
        assert_ne!(first.buffer, second.buffer);
        assert_eq!(cycler.in_flight(), 0);
    }

    #[test]
    fn test_policy_needs_backend_support() {
        let mut caps = DeviceCapabilities::full(BackendType::Headless);
        caps.completion_signals = false;
        caps.ordered_uploads = false;
        caps.transient_allocation = false;

        for policy in [
            CyclePolicy::Transient,
            CyclePolicy::FixedPool { regions: 2 },
            CyclePolicy::PersistentSingle,
        ] {
            assert!(matches!(
                FrameBufferCycler::validate(policy, 64, &caps),
                Err(ConfigError::UnsupportedPolicy { .. })
            ));
        }
    }

    #[test]
    fn test_pool_needs_two_regions() {
        let mut backend = HeadlessBackend::new();
        let result = FrameBufferCycler::new(
            CyclePolicy::FixedPool { regions: 1 },
            BufferKind::Vertex,
            64,
            &mut backend,
        );
        assert!(matches!(
            result,
            Err(CycleError::Config(ConfigError::PoolTooSmall { regions: 1 }))
        ));
        assert_eq!(backend.live_buffers(), 0);
    }
}
