//! Frame submission driver
//!
//! Owns the simulation and the backend and runs one frame at a time:
//!
//! ```text
//! Idle -> TimeSampled -> Simulated -> Encoded -> BufferAcquired -> Submitted -> Idle
//! ```
//!
//! The batch is encoded into host staging memory, then copied into the
//! region the cycler hands out. A fatal error leaves the driver parked in
//! the stage that failed and every later frame is refused.

use crate::backend::{
    BufferKind, DrawCall, FrameSubmission, GeometryBuffers, GraphicsBackend, PipelineDesc,
    PipelineHandle, Region, SubmissionToken,
};
use crate::cycler::{CyclePolicy, FrameBufferCycler};
use crate::encoder::{BatchEncoder, EncodeStrategy, StaticGeometry};
use crate::error::{CycleError, DriverError};
use crate::instance::SpriteAppearance;
use bunnymark_asset::{ShaderLibrary, ShaderStage, SpriteImage};
use bunnymark_core::{
    Bounds, EntityStore, FrameClock, SimulationStepper, Viewport, DEFAULT_SEED,
    DEFAULT_SPRITE_EXTENT,
};
use bunnymark_metrics::{Counter, FrameTimer, SystemProfiler};

/// Frames averaged by the frame-time metrics.
const FRAME_HISTORY: usize = 120;

/// Everything fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub sprite_count: usize,
    pub viewport: Viewport,
    pub sprite_extent: f32,
    pub seed: u64,
    pub strategy: EncodeStrategy,
    /// Index buffer for vertex duplication.
    pub indexed: bool,
    pub policy: CyclePolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            sprite_count: 50_000,
            viewport: Viewport::default(),
            sprite_extent: DEFAULT_SPRITE_EXTENT,
            seed: DEFAULT_SEED,
            strategy: EncodeStrategy::StorageBufferPull,
            indexed: false,
            policy: CyclePolicy::default(),
        }
    }
}

/// Stage a frame has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    TimeSampled,
    Simulated,
    Encoded,
    BufferAcquired,
    Submitted,
}

/// Outcome of one completed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub dt_millis: f32,
    pub bytes_written: usize,
    pub reflections: usize,
    /// Frames counted in the FPS window that just closed.
    pub fps: Option<u32>,
    pub token: SubmissionToken,
}

/// Totals for a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub bytes_written: u64,
    pub last_fps: Option<u32>,
    /// Zero when metrics are compiled out.
    pub average_frame_ms: f64,
}

/// Asked before every frame whether the run should end.
pub trait QuitSignal {
    fn poll_quit(&mut self) -> bool;
}

impl<F: FnMut() -> bool> QuitSignal for F {
    fn poll_quit(&mut self) -> bool {
        self()
    }
}

/// Quit after a fixed number of frames.
#[derive(Debug, Clone)]
pub struct FrameLimit {
    remaining: u64,
}

impl FrameLimit {
    pub fn new(frames: u64) -> Self {
        Self { remaining: frames }
    }
}

impl QuitSignal for FrameLimit {
    fn poll_quit(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        self.remaining -= 1;
        false
    }
}

pub struct SubmissionDriver<B: GraphicsBackend> {
    backend: B,
    store: EntityStore,
    stepper: SimulationStepper,
    encoder: BatchEncoder,
    cycler: FrameBufferCycler,
    clock: FrameClock,
    staging: Vec<u8>,
    pipeline: PipelineHandle,
    geometry: GeometryBuffers,
    draw: DrawCall,
    state: FrameState,
    frames: u64,
    bytes_written: u64,
    last_fps: Option<u32>,
    timer: FrameTimer,
    profiler: SystemProfiler,
    counters: Counter,
}

impl<B: GraphicsBackend> SubmissionDriver<B> {
    /// Validate `config` against the backend and build every startup resource.
    ///
    /// Nothing is allocated on the backend when the configuration is rejected.
    pub fn new(
        mut backend: B,
        config: &DriverConfig,
        shaders: &dyn ShaderLibrary,
        image: &SpriteImage,
    ) -> Result<Self, DriverError> {
        let appearance = SpriteAppearance::for_texture(image.width(), image.height());
        let encoder = BatchEncoder::new(config.strategy, appearance, config.indexed);
        encoder.validate(backend.capabilities(), config.sprite_count)?;
        let batch_size = encoder.required_capacity(config.sprite_count);
        FrameBufferCycler::validate(config.policy, batch_size as u64, backend.capabilities())?;

        let program = config.strategy.shader_program();
        let vertex = shaders.shader(program, ShaderStage::Vertex)?;
        let fragment = shaders.shader(program, ShaderStage::Fragment)?;

        let texture = backend.create_texture(image)?;
        let pipeline = backend.create_pipeline(&PipelineDesc {
            strategy: config.strategy,
            vertex: &vertex,
            fragment: &fragment,
            texture,
            projection: config.viewport.projection(),
        })?;

        // Validation bounds the count by the 32-bit draw range.
        let count = config.sprite_count as u32;
        let geometry = upload_geometry(&mut backend, encoder.static_geometry(count))?;
        let draw = encoder.draw_call(count);
        let cycler =
            FrameBufferCycler::new(config.policy, encoder.target_kind(), batch_size as u64, &mut backend)?;

        let store = EntityStore::create(config.sprite_count, config.viewport, config.seed);
        let stepper = SimulationStepper::new(Bounds::new(config.viewport, config.sprite_extent));

        tracing::info!(
            sprites = store.len(),
            seed = store.seed(),
            viewport = ?store.viewport().size(),
            strategy = %encoder.strategy(),
            indexed = encoder.is_indexed(),
            policy = %cycler.policy(),
            region_bytes = cycler.region_size(),
            backend = ?backend.capabilities().backend,
            "Benchmark ready"
        );

        Ok(Self {
            backend,
            store,
            stepper,
            encoder,
            cycler,
            clock: FrameClock::new(),
            staging: vec![0; batch_size],
            pipeline,
            geometry,
            draw,
            state: FrameState::Idle,
            frames: 0,
            bytes_written: 0,
            last_fps: None,
            timer: FrameTimer::new(FRAME_HISTORY),
            profiler: SystemProfiler::new(),
            counters: Counter::new(),
        })
    }

    /// Run one frame timed by the wall clock.
    pub fn run_frame(&mut self) -> Result<FrameReport, DriverError> {
        self.ensure_idle()?;
        let dt_millis = self.clock.tick();
        let fps = self.clock.sample_fps();
        self.frame(dt_millis, fps)
    }

    /// Run one frame with a fixed time step. FPS is not sampled.
    pub fn run_frame_with_dt(&mut self, dt_millis: f32) -> Result<FrameReport, DriverError> {
        self.ensure_idle()?;
        self.frame(dt_millis, None)
    }

    /// Run frames until `quit` asks to stop. Stops at the first error.
    pub fn run(&mut self, quit: &mut impl QuitSignal) -> Result<RunSummary, DriverError> {
        while !quit.poll_quit() {
            self.run_frame()?;
        }
        self.log_metrics();
        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames: self.frames,
            bytes_written: self.bytes_written,
            last_fps: self.last_fps,
            average_frame_ms: self.timer.frame_time_ms(),
        }
    }

    /// Log per-stage averages collected so far.
    pub fn log_metrics(&self) {
        if !bunnymark_metrics::ENABLED {
            return;
        }
        for (stage, total) in self.profiler.iter() {
            tracing::info!(
                stage,
                total_ms = total.as_secs_f64() * 1000.0,
                average_us = self.profiler.average(stage).as_micros() as u64,
                "Frame stage timing"
            );
        }
        for (name, value) in self.counters.iter() {
            tracing::info!(counter = name, value, "Run counter");
        }
        let (min_ms, max_ms) = self.timer.frame_time_range_ms();
        tracing::info!(
            frames = self.timer.frames(),
            fps = self.timer.fps(),
            sync_waits = self.counters.get("sync_waits"),
            avg_ms = self.timer.frame_time_ms(),
            min_ms,
            max_ms,
            "Run metrics"
        );
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn encoder(&self) -> &BatchEncoder {
        &self.encoder
    }

    pub fn cycler(&self) -> &FrameBufferCycler {
        &self.cycler
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Frames completed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn ensure_idle(&self) -> Result<(), DriverError> {
        if self.state != FrameState::Idle {
            return Err(DriverError::Poisoned { state: self.state });
        }
        Ok(())
    }

    fn frame(&mut self, dt_millis: f32, fps: Option<u32>) -> Result<FrameReport, DriverError> {
        self.state = FrameState::TimeSampled;
        match self.advance(dt_millis, fps) {
            Ok(report) => {
                self.state = FrameState::Idle;
                Ok(report)
            }
            Err(err) if err.is_fatal() => {
                tracing::error!(state = ?self.state, error = %err, "Frame aborted");
                Err(err)
            }
            Err(err) => {
                tracing::warn!(state = ?self.state, error = %err, "Frame dropped");
                self.state = FrameState::Idle;
                Err(err)
            }
        }
    }

    fn advance(&mut self, dt_millis: f32, fps: Option<u32>) -> Result<FrameReport, DriverError> {
        let stats = self.profiler.time_system("simulate", || {
            self.stepper.step(&mut self.store, dt_millis)
        });
        self.state = FrameState::Simulated;

        let bytes_written = self.profiler.time_system("encode", || {
            self.encoder.encode(&self.store, &mut self.staging)
        })?;
        self.state = FrameState::Encoded;

        let region = self.profiler.time_system("acquire", || {
            acquire(&mut self.cycler, &mut self.backend, &mut self.counters, bytes_written)
        })?;
        self.state = FrameState::BufferAcquired;

        let bytes = &self.staging[..bytes_written];
        self.profiler
            .time_system("upload", || self.backend.upload(&region, bytes))?;

        let submission = FrameSubmission {
            pipeline: self.pipeline,
            strategy: self.encoder.strategy(),
            batch: region,
            geometry: self.geometry,
            draw: self.draw,
        };
        let token = self
            .profiler
            .time_system("submit", || self.backend.submit(&submission))?;
        self.cycler.mark_submitted(token);
        self.profiler.time_system("present", || self.backend.present())?;
        self.state = FrameState::Submitted;

        let frame_index = self.frames;
        self.frames += 1;
        self.bytes_written += bytes_written as u64;
        self.timer.record_millis(dt_millis);
        self.counters.increment("frames", 1);
        self.counters.increment("bytes_uploaded", bytes_written as u64);
        if let Some(fps) = fps {
            self.last_fps = Some(fps);
            tracing::info!(fps, sprites = self.store.len(), "FPS: {fps}");
        }

        Ok(FrameReport {
            frame_index,
            dt_millis,
            bytes_written,
            reflections: stats.total(),
            fps,
            token,
        })
    }
}

/// Wait out the submission guarding the next pool region, then take it.
fn acquire<B: GraphicsBackend>(
    cycler: &mut FrameBufferCycler,
    backend: &mut B,
    counters: &mut Counter,
    size: usize,
) -> Result<Region, CycleError> {
    if let Some(token) = cycler.pending_reuse() {
        if !backend.is_complete(token) {
            counters.increment("sync_waits", 1);
            backend.wait(token)?;
        }
    }
    cycler.acquire_write_target(size as u64, backend)
}

fn upload_geometry<B: GraphicsBackend>(
    backend: &mut B,
    geometry: StaticGeometry,
) -> Result<GeometryBuffers, DriverError> {
    let mut upload = |kind: BufferKind, bytes: Option<Vec<u8>>| -> Result<_, DriverError> {
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let handle = backend.create_buffer(kind, bytes.len() as u64)?;
        backend.upload(&Region::whole(handle, bytes.len() as u64), &bytes)?;
        Ok(Some(handle))
    };
    Ok(GeometryBuffers {
        vertices: upload(BufferKind::Vertex, geometry.vertices)?,
        indices: upload(BufferKind::Index, geometry.indices)?,
    })
}
