//! Windowed benchmark
//!
//! One frame per redraw. Redraws are requested continuously so the frame
//! rate is bounded only by the present mode.

use crate::assets::Assets;
use anyhow::{anyhow, Context, Result};
use bunnymark_render::gpu::{GpuConfig, WgpuBackend, CLEAR_COLOR};
use bunnymark_render::window::window_attributes;
use bunnymark_render::SubmissionDriver;
use bunnymark_services::Settings;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

struct BenchmarkApp {
    settings: Settings,
    assets: Assets,
    frame_limit: Option<u64>,
    window: Option<Arc<Window>>,
    driver: Option<SubmissionDriver<WgpuBackend>>,
    failure: Option<anyhow::Error>,
}

impl BenchmarkApp {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = window_attributes(&self.settings.window_config());
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("creating window")?,
        );

        let size = window.inner_size();
        let gpu_config = GpuConfig {
            width: size.width,
            height: size.height,
            vsync: self.settings.graphics.vsync,
            clear_color: CLEAR_COLOR,
        };
        let backend = pollster::block_on(WgpuBackend::new(window.clone(), gpu_config))
            .context("initializing GPU")?;

        let driver = SubmissionDriver::new(
            backend,
            &self.settings.driver_config(),
            self.assets.shaders.as_ref(),
            &self.assets.image,
        )
        .context("starting benchmark")?;

        self.window = Some(window);
        self.driver = Some(driver);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        tracing::error!("{error:#}");
        self.failure = Some(error);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };

        match driver.run_frame() {
            Ok(_) => {
                if self.frame_limit.is_some_and(|limit| driver.frames() >= limit) {
                    event_loop.exit();
                }
            }
            Err(err) if err.is_surface_lost() => {
                tracing::warn!("Surface lost, reconfiguring");
                driver.backend_mut().reconfigure();
            }
            Err(err) => self.fail(event_loop, anyhow!(err).context("frame failed")),
        }
    }
}

impl ApplicationHandler for BenchmarkApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(driver) = self.driver.as_mut() {
                    driver.backend_mut().resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(driver) = &self.driver {
            driver.log_metrics();
            let summary = driver.summary();
            tracing::info!(
                frames = summary.frames,
                last_fps = ?summary.last_fps,
                "Benchmark finished"
            );
        }
    }
}

/// Open the window and run until it closes or `frame_limit` frames are drawn.
pub fn run(settings: Settings, assets: Assets, frame_limit: Option<u64>) -> Result<()> {
    let event_loop = EventLoop::new().context("creating event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = BenchmarkApp {
        settings,
        assets,
        frame_limit,
        window: None,
        driver: None,
        failure: None,
    };
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
