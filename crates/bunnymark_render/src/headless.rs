//! Host-memory backend
//!
//! Runs the full frame pipeline without a GPU. Buffers are plain byte vectors
//! and submissions are recorded so their contents can be inspected. When a
//! submission completes is controlled by [`Completion`].

use crate::backend::{
    check_bounds, BufferHandle, BufferKind, FrameSubmission, GraphicsBackend, PipelineDesc,
    PipelineHandle, Region, SubmissionToken, TextureHandle,
};
use crate::encoder::EncodeStrategy;
use crate::error::BackendError;
use crate::{BackendType, DeviceCapabilities};
use bunnymark_asset::SpriteImage;
use std::collections::{HashMap, VecDeque};

/// Submissions kept for inspection; older ones are only counted.
pub const SUBMISSION_HISTORY: usize = 16;

/// When submitted work counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// As soon as it is submitted.
    Immediate,
    /// Once this many later frames have been presented.
    AfterFrames(u64),
    /// Only through [`HeadlessBackend::signal_complete`] or a wait.
    Manual,
}


pub struct HeadlessBackend {
    capabilities: DeviceCapabilities,
    completion: Completion,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    textures: HashMap<TextureHandle, (u32, u32)>,
    pipelines: HashMap<PipelineHandle, EncodeStrategy>,
    next_handle: u64,
    submissions: VecDeque<FrameSubmission>,
    submitted: u64,
    last_token: u64,
    completed: u64,
    // Transient buffers not yet submitted, then grouped by the token that reads them.
    transient: Vec<BufferHandle>,
    retiring: Vec<(SubmissionToken, Vec<BufferHandle>)>,
    uploaded: u64,
    presented: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::full(BackendType::Headless))
    }

    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            completion: Completion::Immediate,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            pipelines: HashMap::new(),
            next_handle: 0,
            submissions: VecDeque::with_capacity(SUBMISSION_HISTORY),
            submitted: 0,
            last_token: 0,
            completed: 0,
            transient: Vec::new(),
            retiring: Vec::new(),
            uploaded: 0,
            presented: 0,
        }
    }

    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }

    /// Mark `token` and everything submitted before it as finished.
    pub fn signal_complete(&mut self, token: SubmissionToken) {
        self.completed = self.completed.max(token.id().min(self.last_token));
        self.retire();
    }

    pub fn buffer_bytes(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&handle).map(Vec::as_slice)
    }

    /// Bytes `region` currently holds.
    pub fn region_bytes(&self, region: &Region) -> Option<&[u8]> {
        let bytes = self.buffer_bytes(region.buffer)?;
        bytes.get(region.offset as usize..region.end() as usize)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// The most recent submissions, oldest first.
    pub fn submissions(&self) -> impl ExactSizeIterator<Item = &FrameSubmission> + '_ {
        self.submissions.iter()
    }

    pub fn last_submission(&self) -> Option<&FrameSubmission> {
        self.submissions.back()
    }

    /// Submissions accepted over the backend's lifetime.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.uploaded
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    fn allocate(&mut self, kind: BufferKind, size: u64) -> Result<BufferHandle, BackendError> {
        if size > self.capabilities.max_buffer_size {
            return Err(BackendError::OutOfMemory);
        }
        let handle = BufferHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        self.buffers.insert(handle, vec![0; size as usize]);
        tracing::trace!(?kind, size, id = handle.id(), "Host buffer allocated");
        Ok(handle)
    }

    fn next_token(&mut self) -> SubmissionToken {
        self.last_token += 1;
        let token = SubmissionToken::from_raw(self.last_token);
        let retiring = std::mem::take(&mut self.transient);
        if !retiring.is_empty() {
            self.retiring.push((token, retiring));
        }
        if self.completion == Completion::Immediate {
            self.completed = self.last_token;
        }
        token
    }

    fn retire(&mut self) {
        let completed = self.completed;
        let buffers = &mut self.buffers;
        self.retiring.retain(|(token, handles)| {
            if token.id() > completed {
                return true;
            }
            for handle in handles {
                buffers.remove(handle);
            }
            false
        });
    }

    fn unknown(kind: &'static str, id: u64) -> BackendError {
        BackendError::UnknownHandle { kind, id }
    }

    /// Submit without drawing anything, for exercising completion tracking.
    #[cfg(test)]
    pub(crate) fn submit_empty(&mut self) -> SubmissionToken {
        let token = self.next_token();
        self.retire();
        token
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<BufferHandle, BackendError> {
        self.allocate(kind, size)
    }

    fn acquire_transient(&mut self, kind: BufferKind, size: u64) -> Result<Region, BackendError> {
        let buffer = self.allocate(kind, size)?;
        self.transient.push(buffer);
        Ok(Region::whole(buffer, size))
    }

    fn upload(&mut self, region: &Region, bytes: &[u8]) -> Result<(), BackendError> {
        let buffer = self
            .buffers
            .get_mut(&region.buffer)
            .ok_or_else(|| Self::unknown("buffer", region.buffer.id()))?;
        check_bounds(region, bytes.len(), buffer.len() as u64)?;

        let start = region.offset as usize;
        buffer[start..start + bytes.len()].copy_from_slice(bytes);
        self.uploaded += bytes.len() as u64;
        Ok(())
    }

    fn create_texture(&mut self, image: &SpriteImage) -> Result<TextureHandle, BackendError> {
        let handle = TextureHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        self.textures.insert(handle, (image.width(), image.height()));
        Ok(handle)
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Result<PipelineHandle, BackendError> {
        if !self.textures.contains_key(&desc.texture) {
            return Err(Self::unknown("texture", desc.texture.id()));
        }
        if desc.vertex.source.trim().is_empty() || desc.fragment.source.trim().is_empty() {
            return Err(BackendError::Pipeline {
                strategy: desc.strategy,
                reason: "empty shader source".to_string(),
            });
        }
        let handle = PipelineHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        self.pipelines.insert(handle, desc.strategy);
        Ok(handle)
    }

    fn submit(&mut self, frame: &FrameSubmission) -> Result<SubmissionToken, BackendError> {
        match self.pipelines.get(&frame.pipeline) {
            Some(strategy) if *strategy == frame.strategy => {}
            Some(strategy) => {
                return Err(BackendError::Pipeline {
                    strategy: frame.strategy,
                    reason: format!("pipeline was built for {strategy}"),
                })
            }
            None => return Err(Self::unknown("pipeline", frame.pipeline.id())),
        }
        let referenced = [Some(frame.batch.buffer), frame.geometry.vertices, frame.geometry.indices];
        for buffer in referenced.into_iter().flatten() {
            if !self.buffers.contains_key(&buffer) {
                return Err(Self::unknown("buffer", buffer.id()));
            }
        }

        if self.submissions.len() == SUBMISSION_HISTORY {
            self.submissions.pop_front();
        }
        self.submissions.push_back(*frame);
        self.submitted += 1;
        let token = self.next_token();
        self.retire();
        Ok(token)
    }

    fn is_complete(&mut self, token: SubmissionToken) -> bool {
        token.id() <= self.completed
    }

    fn wait(&mut self, token: SubmissionToken) -> Result<(), BackendError> {
        self.signal_complete(token);
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        self.presented += 1;
        if let Completion::AfterFrames(frames) = self.completion {
            self.completed = self.completed.max(self.last_token.saturating_sub(frames));
            self.retire();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_lands_in_region() {
        let mut backend = HeadlessBackend::new();
        let buffer = backend.create_buffer(BufferKind::Vertex, 16).unwrap();
        let region = Region {
            buffer,
            offset: 8,
            size: 8,
        };
        backend.upload(&region, &[1, 2, 3, 4]).unwrap();

        assert_eq!(
            backend.buffer_bytes(buffer).unwrap(),
            &[0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 0, 0, 0, 0]
        );
        assert_eq!(backend.bytes_uploaded(), 4);
        assert!(backend.upload(&region, &[0; 9]).is_err());
    }

    #[test]
    fn test_transient_buffers_retire_on_completion() {
        let mut backend = HeadlessBackend::new().with_completion(Completion::Manual);
        let region = backend.acquire_transient(BufferKind::Storage, 64).unwrap();
        let token = backend.submit_empty();
        assert!(backend.buffer_bytes(region.buffer).is_some());
        assert!(!backend.is_complete(token));

        backend.wait(token).unwrap();
        assert!(backend.is_complete(token));
        assert!(backend.buffer_bytes(region.buffer).is_none());
    }

    #[test]
    fn test_after_frames_completion() {
        let mut backend = HeadlessBackend::new().with_completion(Completion::AfterFrames(1));
        let first = backend.submit_empty();
        backend.present().unwrap();
        assert!(!backend.is_complete(first));

        let second = backend.submit_empty();
        backend.present().unwrap();
        assert!(backend.is_complete(first));
        assert!(!backend.is_complete(second));
    }

    #[test]
    fn test_submission_history_is_capped() {
        let mut backend = HeadlessBackend::new();
        let texture = backend.create_texture(&SpriteImage::placeholder()).unwrap();
        let vertex = bunnymark_asset::ShaderCode {
            name: "sprite_pull".to_string(),
            stage: bunnymark_asset::ShaderStage::Vertex,
            entry_point: "vs_main",
            source: "fn vs_main() {}".into(),
        };
        let fragment = bunnymark_asset::ShaderCode {
            stage: bunnymark_asset::ShaderStage::Fragment,
            entry_point: "fs_main",
            ..vertex.clone()
        };
        let pipeline = backend
            .create_pipeline(&PipelineDesc {
                strategy: EncodeStrategy::StorageBufferPull,
                vertex: &vertex,
                fragment: &fragment,
                texture,
                projection: glam::Mat4::IDENTITY,
            })
            .unwrap();
        let buffer = backend.create_buffer(BufferKind::Storage, 64).unwrap();

        let total = SUBMISSION_HISTORY as u32 + 5;
        for elements in 1..=total {
            let frame = FrameSubmission {
                pipeline,
                strategy: EncodeStrategy::StorageBufferPull,
                batch: Region::whole(buffer, 64),
                geometry: Default::default(),
                draw: crate::backend::DrawCall {
                    elements,
                    instances: 1,
                    indexed: false,
                },
            };
            backend.submit(&frame).unwrap();
        }

        assert_eq!(backend.submitted(), u64::from(total));
        assert_eq!(backend.submissions().len(), SUBMISSION_HISTORY);
        assert_eq!(backend.submissions().next().map(|s| s.draw.elements), Some(6));
        assert_eq!(backend.last_submission().map(|s| s.draw.elements), Some(total));
    }

    #[test]
    fn test_signal_never_completes_unsubmitted_work() {
        let mut backend = HeadlessBackend::new().with_completion(Completion::Manual);
        let first = backend.submit_empty();
        backend.signal_complete(SubmissionToken::from_raw(10));
        assert!(backend.is_complete(first));
        assert!(!backend.is_complete(SubmissionToken::from_raw(2)));
    }
}
