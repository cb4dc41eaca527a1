//! Windowed host
//!
//! Drives a [`RenderApp`] on top of a winit event loop and a [`WgpuContext`].
//! The event loop owns the frame rhythm: each redraw runs `update(dt)` then
//! `render()`, and a new redraw is requested whenever the loop goes idle.

use std::{sync::Arc, time::Instant};

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    app::{FrameError, RenderApp, SceneLoader},
    config::AppConfig,
    gfx::{
        camera::{share, CameraController},
        scene::Scene,
    },
    wgpu_utils::{GpuDevice, WgpuContext},
};

const ROTATE_SPEED: f32 = 0.005;
const ZOOM_SPEED: f32 = 0.1;

pub struct Viewer {
    config: AppConfig,
    scene_loader: Option<SceneLoader>,
    window: Option<Arc<Window>>,
    app: Option<RenderApp<WgpuContext>>,
    controller: Option<CameraController>,
    last_frame: Instant,
    overflow_reported: bool,
    closing: bool,
    error: Option<anyhow::Error>,
}

impl Viewer {
    pub fn new<F>(config: AppConfig, scene_loader: F) -> Self
    where
        F: FnOnce() -> Scene + 'static,
    {
        Self {
            config,
            scene_loader: Some(Box::new(scene_loader)),
            window: None,
            app: None,
            controller: None,
            last_frame: Instant::now(),
            overflow_reported: false,
            closing: false,
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = event_loop
            .create_window(
                WindowAttributes::default()
                    .with_title(self.config.title.clone())
                    .with_inner_size(LogicalSize::new(self.config.width, self.config.height)),
            )
            .context("failed to create window")?;
        let window = Arc::new(window);

        let PhysicalSize { width, height } = window.inner_size();
        let mut config = self.config.clone();
        config.width = width;
        config.height = height;

        let (orbit_camera, camera) = share(config.camera.build(width, height));
        let context = WgpuContext::new(window.clone(), &config);
        let mut app = RenderApp::new(config, context);
        if let Some(loader) = self.scene_loader.take() {
            app = app.with_scene_loader(loader);
        }
        app.set_camera(camera);

        app.init().context("failed to initialize renderer")?;
        app.prepare().context("failed to prepare scene")?;

        self.controller = Some(CameraController::new(orbit_camera, ROTATE_SPEED, ZOOM_SPEED));
        self.app = Some(app);
        self.window = Some(window);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        let Some(app) = self.app.as_mut() else {
            return Ok(());
        };

        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        match advance_frame(app, dt) {
            Some(Ok(())) => {
                self.overflow_reported = false;
                Ok(())
            }
            Some(Err(e)) if e.is_recoverable() => {
                if !self.overflow_reported {
                    log::warn!("Frame skipped: {}", e);
                    self.overflow_reported = true;
                }
                Ok(())
            }
            Some(Err(e)) => Err(e).context("frame failed"),
            None => Ok(()),
        }
    }

    /// Cleans up and detaches the app so events still queued in this loop
    /// iteration find nothing to drive.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.closing = true;
        self.controller = None;
        if let Some(mut app) = self.app.take() {
            app.cleanup();
        }
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        self.shutdown(event_loop);
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.closing || self.app.is_some() {
            return;
        }

        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if is_escape(&event) {
                    self.shutdown(event_loop);
                } else if let Some(controller) = self.controller.as_mut() {
                    controller.process_key_event(&event);
                }
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(app) = self.app.as_mut() {
                    app.reshape(width, height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }
            _ => (),
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let Some(controller) = self.controller.as_mut() {
            controller.process_device_event(&event);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(app) = self.app.as_mut() {
            app.cleanup();
        }
    }
}

/// Runs `update(dt)` and `render()` for one frame. Returns `None` without
/// touching the app when it is not prepared or already cleaned up.
fn advance_frame<D: GpuDevice>(app: &mut RenderApp<D>, dt: f32) -> Option<Result<(), FrameError>> {
    if !app.is_active() {
        log::debug!("Skipping frame in state {:?}", app.state());
        return None;
    }
    app.update(dt);
    Some(app.render())
}

fn is_escape(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed
        && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
}

/// Opens a window and runs the viewer until it is closed.
pub fn run<F>(config: AppConfig, scene_loader: F) -> anyhow::Result<()>
where
    F: FnOnce() -> Scene + 'static,
{
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    log::info!("Starting {} ({}x{})", config.title, config.width, config.height);
    let mut viewer = Viewer::new(config, scene_loader);
    event_loop.run_app(&mut viewer)?;

    match viewer.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::AppState, wgpu_utils::RecordingDevice};

    fn prepared_app() -> RenderApp<RecordingDevice> {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new());
        app.init().unwrap();
        app.prepare().unwrap();
        app
    }

    #[test]
    fn test_frame_runs_update_and_render() {
        let mut app = prepared_app();
        assert_eq!(advance_frame(&mut app, 0.016), Some(Ok(())));
        assert_eq!(app.state(), AppState::Running);
        assert_eq!(app.frame_count(), 1);
    }

    #[test]
    fn test_frame_after_cleanup_is_skipped() {
        let mut app = prepared_app();
        advance_frame(&mut app, 0.016);
        app.cleanup();
        app.device_mut().clear_commands();

        assert_eq!(advance_frame(&mut app, 0.016), None);
        assert_eq!(app.state(), AppState::CleanedUp);
        assert!(app.device().commands().is_empty());
    }

    #[test]
    fn test_frame_before_prepare_is_skipped() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new());
        app.init().unwrap();
        assert_eq!(advance_frame(&mut app, 0.016), None);
        assert_eq!(app.frame_count(), 0);
    }
}
