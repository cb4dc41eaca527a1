//! Frame orchestrator
//!
//! [`RenderApp`] owns the lifecycle `init -> prepare -> {update, render,
//! reshape}* -> cleanup` and the per-frame upload order. Within one
//! [`RenderApp::render`] the camera block is uploaded first, then the lights
//! block, and only then is the scene draw issued. The uniform buffers are
//! single-instance and shared with in-flight draws, so this sequential order
//! is the only thing keeping draws from reading half-written frame data.

use thiserror::Error;

use crate::{
    config::AppConfig,
    gfx::{
        camera::{share, SharedCamera},
        scene::Scene,
        uniforms::{
            CameraUniformBlock, CameraUploader, LightUniformBlock, LightsUploader, UploadError,
            LIGHT_CAPACITY,
        },
    },
    wgpu_utils::device::{GpuDevice, GpuError},
};

/// Builds the scene during `prepare()`
pub type SceneLoader = Box<dyn FnOnce() -> Scene>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Uninitialized,
    Initialized,
    Prepared,
    Running,
    CleanedUp,
}

/// Startup failures. The application can not run after any of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("failed to initialize the GPU context: {0}")]
    Init(#[source] GpuError),
    #[error("failed to allocate uniform buffers: {0}")]
    Allocation(#[source] GpuError),
    #[error("scene accepts up to {limit} lights but the lights buffer holds {capacity}")]
    LightLimitExceedsCapacity { limit: usize, capacity: usize },
}

/// Per-frame failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Too many lights for the lights buffer. The frame was not drawn and the
    /// lights buffer still holds the last valid upload. Recoverable by
    /// removing lights from the scene.
    #[error("scene has {count} lights, the lights buffer holds {capacity}")]
    LightCapacityExceeded { count: usize, capacity: usize },
    #[error("GPU error during frame: {0}")]
    Gpu(#[from] GpuError),
}

impl FrameError {
    /// True for data-shape problems the caller can fix and keep rendering.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::LightCapacityExceeded { .. })
    }
}

impl From<UploadError> for FrameError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::LightCapacityExceeded { count, capacity } => {
                FrameError::LightCapacityExceeded { count, capacity }
            }
            UploadError::Gpu(e) => FrameError::Gpu(e),
        }
    }
}

pub struct RenderApp<D: GpuDevice> {
    config: AppConfig,
    device: D,
    state: AppState,
    width: u32,
    height: u32,
    camera: Option<SharedCamera>,
    scene: Option<Scene>,
    scene_loader: Option<SceneLoader>,
    camera_uploader: CameraUploader,
    lights_uploader: LightsUploader,
    frame_count: u64,
}

impl<D: GpuDevice> RenderApp<D> {
    pub fn new(config: AppConfig, device: D) -> Self {
        let (width, height) = (config.width, config.height);
        Self {
            config,
            device,
            state: AppState::Uninitialized,
            width,
            height,
            camera: None,
            scene: None,
            scene_loader: None,
            camera_uploader: CameraUploader::new(),
            lights_uploader: LightsUploader::new(),
            frame_count: 0,
        }
    }

    /// Sets the function that builds the scene during `prepare()`.
    /// Without one an empty scene is used.
    pub fn with_scene_loader<F>(mut self, loader: F) -> Self
    where
        F: FnOnce() -> Scene + 'static,
    {
        self.scene_loader = Some(Box::new(loader));
        self
    }

    /// Establishes the GPU context.
    ///
    /// # Panics
    /// Panics unless the application is uninitialized.
    pub fn init(&mut self) -> Result<(), AppError> {
        assert_eq!(
            self.state,
            AppState::Uninitialized,
            "init() called in state {:?}",
            self.state
        );

        self.device.initialize().map_err(AppError::Init)?;
        self.device.resize_surface(self.width, self.height);
        self.state = AppState::Initialized;
        log::info!("Application initialized ({}x{})", self.width, self.height);
        Ok(())
    }

    /// Loads the scene, sets up the camera and allocates both uniform buffers.
    ///
    /// # Panics
    /// Panics if `init()` has not completed.
    pub fn prepare(&mut self) -> Result<(), AppError> {
        assert_eq!(
            self.state,
            AppState::Initialized,
            "prepare() called in state {:?}, expected Initialized",
            self.state
        );

        if let Err(e) = self.allocate_uniform_buffers() {
            self.release_uniform_buffers();
            return Err(AppError::Allocation(e));
        }

        let scene = match self.scene_loader.take() {
            Some(loader) => loader(),
            None => Scene::new(),
        };
        if scene.light_limit() > LIGHT_CAPACITY {
            let limit = scene.light_limit();
            self.release_uniform_buffers();
            // a retry sees the same scene rather than an empty one
            self.scene_loader = Some(Box::new(move || scene));
            return Err(AppError::LightLimitExceedsCapacity {
                limit,
                capacity: LIGHT_CAPACITY,
            });
        }

        let camera = match self.camera.take() {
            Some(camera) => camera,
            None => share(self.config.camera.build(self.width, self.height)).1,
        };
        camera.borrow_mut().set_viewport(self.width, self.height);
        self.camera = Some(camera);

        log::info!(
            "Prepared scene with {} objects and {} lights",
            scene.objects.len(),
            scene.lights().len()
        );
        self.scene = Some(scene);
        self.state = AppState::Prepared;
        Ok(())
    }

    fn allocate_uniform_buffers(&mut self) -> Result<(), GpuError> {
        self.camera_uploader.prepare(&mut self.device)?;
        self.lights_uploader.prepare(&mut self.device)
    }

    fn release_uniform_buffers(&mut self) {
        self.camera_uploader.release(&mut self.device);
        self.lights_uploader.release(&mut self.device);
    }

    /// Advances camera and scene by `dt` seconds.
    ///
    /// # Panics
    /// Panics if the application is not prepared.
    pub fn update(&mut self, dt: f32) {
        self.assert_prepared("update");
        let dt = if dt.is_finite() && dt > 0.0 {
            dt
        } else {
            log::debug!("Ignoring frame time {}", dt);
            0.0
        };

        if let Some(camera) = &self.camera {
            camera.borrow_mut().update(dt);
        }
        if let Some(scene) = self.scene.as_mut() {
            scene.update(dt);
        }
        self.state = AppState::Running;
    }

    /// Uploads the camera block, then the lights block, then draws the scene.
    ///
    /// On [`FrameError::LightCapacityExceeded`] the scene is not drawn.
    ///
    /// # Panics
    /// Panics if the application is not prepared.
    pub fn render(&mut self) -> Result<(), FrameError> {
        self.assert_prepared("render");
        let (Some(camera), Some(scene)) = (self.camera.as_ref(), self.scene.as_ref()) else {
            unreachable!("prepared application without camera or scene");
        };

        // camera state is re-read every frame; other systems may have moved it
        self.camera_uploader
            .upload(&mut self.device, &*camera.borrow())?;
        let light_count = self
            .lights_uploader
            .upload(&mut self.device, scene.lights())?;
        scene.draw(&mut self.device)?;

        self.frame_count += 1;
        self.state = AppState::Running;
        log::trace!("Frame {} drawn with {} lights", self.frame_count, light_count);
        Ok(())
    }

    /// Records the new viewport size and updates the camera projection so the
    /// next camera upload carries the new aspect ratio.
    pub fn reshape(&mut self, width: u32, height: u32) {
        if self.state == AppState::CleanedUp {
            log::debug!("Ignoring reshape after cleanup");
            return;
        }

        self.width = width;
        self.height = height;
        if let Some(camera) = &self.camera {
            camera.borrow_mut().set_viewport(width, height);
        }
        if self.device.is_initialized() {
            self.device.resize_surface(width, height);
        }
        log::debug!("Reshaped to {}x{}", width, height);
    }

    /// Releases the uniform buffers and the scene. Safe in any state and
    /// a no-op the second time.
    pub fn cleanup(&mut self) {
        if self.state == AppState::CleanedUp {
            return;
        }

        self.release_uniform_buffers();
        self.scene = None;
        self.scene_loader = None;
        self.camera = None;

        log::info!("Application cleaned up after {} frames", self.frame_count);
        self.state = AppState::CleanedUp;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    /// True between a successful `prepare()` and `cleanup()`, the only window
    /// in which `update()` and `render()` may be called.
    pub fn is_active(&self) -> bool {
        matches!(self.state, AppState::Prepared | AppState::Running)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Handle to the active camera, shared with whoever else drives it
    pub fn camera(&self) -> Option<SharedCamera> {
        self.camera.clone()
    }

    /// Replaces the active camera. Before `prepare()` this also stops the
    /// default camera from being built.
    pub fn set_camera(&mut self, camera: SharedCamera) {
        camera.borrow_mut().set_viewport(self.width, self.height);
        self.camera = Some(camera);
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scene.as_mut()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// CPU copy of the last camera block uploaded
    pub fn camera_block(&self) -> &CameraUniformBlock {
        self.camera_uploader.block()
    }

    /// CPU copy of the last lights block uploaded
    pub fn lights_block(&self) -> &LightUniformBlock {
        self.lights_uploader.block()
    }

    fn assert_prepared(&self, operation: &str) {
        assert!(
            self.is_active(),
            "{}() called in state {:?}, prepare() must complete first",
            operation,
            self.state
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gfx::{
            camera::{Camera, OrbitCamera},
            scene::{PointLight, Renderable},
            uniforms::{CAMERA_SLOT, LIGHTS_SLOT},
        },
        wgpu_utils::recording::{GpuCommand, RecordingDevice},
    };
    use cgmath::Vector3;
    use std::{cell::RefCell, rc::Rc};

    fn lit_scene(lights: usize) -> Scene {
        let mut scene = Scene::new();
        scene.add_renderable(Renderable::new("cube", Vector3::new(0.0, 0.0, 0.0)));
        for i in 0..lights {
            scene
                .add_light(PointLight::new(Vector3::new(i as f32, 2.0, 0.0), [1.0; 3], 1.0))
                .unwrap();
        }
        scene
    }

    fn prepared_app(lights: usize) -> RenderApp<RecordingDevice> {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new())
            .with_scene_loader(move || lit_scene(lights));
        app.init().unwrap();
        app.prepare().unwrap();
        app
    }

    fn stored_camera(app: &RenderApp<RecordingDevice>) -> CameraUniformBlock {
        bytemuck::pod_read_unaligned(app.device().slot_contents(CAMERA_SLOT).unwrap())
    }

    fn stored_lights(app: &RenderApp<RecordingDevice>) -> LightUniformBlock {
        bytemuck::pod_read_unaligned(app.device().slot_contents(LIGHTS_SLOT).unwrap())
    }

    fn aspect_of(block: &CameraUniformBlock) -> f32 {
        block.projection[1][1] / block.projection[0][0]
    }

    #[test]
    fn test_dimensions_before_reshape() {
        let app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new());
        assert_eq!(app.width(), 800);
        assert_eq!(app.height(), 600);
        assert_eq!(app.state(), AppState::Uninitialized);
    }

    #[test]
    fn test_lifecycle_states() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new());
        app.init().unwrap();
        assert_eq!(app.state(), AppState::Initialized);
        app.prepare().unwrap();
        assert_eq!(app.state(), AppState::Prepared);
        app.update(0.016);
        app.render().unwrap();
        assert_eq!(app.state(), AppState::Running);
        app.cleanup();
        assert_eq!(app.state(), AppState::CleanedUp);
    }

    #[test]
    fn test_prepare_allocates_both_buffers_once() {
        let mut app = prepared_app(1);
        let creates = |app: &RenderApp<RecordingDevice>| {
            app.device()
                .commands()
                .iter()
                .filter(|c| matches!(c, GpuCommand::CreateBuffer { .. }))
                .count()
        };
        assert_eq!(creates(&app), 2);
        assert!(app.device().buffer_at_slot(CAMERA_SLOT).is_some());
        assert!(app.device().buffer_at_slot(LIGHTS_SLOT).is_some());

        for _ in 0..3 {
            app.update(0.016);
            app.render().unwrap();
        }
        assert_eq!(creates(&app), 2);
    }

    #[test]
    fn test_render_uploads_camera_then_lights_then_draws() {
        let mut app = prepared_app(2);
        let camera_buffer = app.device().buffer_at_slot(CAMERA_SLOT).unwrap();
        let lights_buffer = app.device().buffer_at_slot(LIGHTS_SLOT).unwrap();

        for _ in 0..2 {
            app.device_mut().clear_commands();
            app.render().unwrap();

            let commands = app.device().commands();
            assert_eq!(commands.len(), 3);
            assert!(matches!(commands[0], GpuCommand::WriteBuffer { buffer, .. } if buffer == camera_buffer));
            assert!(matches!(commands[1], GpuCommand::WriteBuffer { buffer, .. } if buffer == lights_buffer));
            assert_eq!(commands[2], GpuCommand::Draw { instance_count: 1 });
        }
    }

    #[test]
    fn test_draw_sees_this_frames_camera() {
        let mut app = prepared_app(1);
        let camera = app.camera().unwrap();

        app.render().unwrap();
        camera.borrow_mut().set_viewport(400, 100);
        app.render().unwrap();

        let snapshots = app.device().draw_snapshots();
        let first: CameraUniformBlock = bytemuck::pod_read_unaligned(&snapshots[0][&CAMERA_SLOT]);
        let second: CameraUniformBlock = bytemuck::pod_read_unaligned(&snapshots[1][&CAMERA_SLOT]);
        assert!((aspect_of(&first) - 800.0 / 600.0).abs() < 1e-4);
        assert!((aspect_of(&second) - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_reshape_reaches_next_camera_upload() {
        let mut app = prepared_app(1);
        app.render().unwrap();

        app.reshape(1024, 768);
        app.render().unwrap();

        assert_eq!((app.width(), app.height()), (1024, 768));
        assert!((aspect_of(&stored_camera(&app)) - 1024.0 / 768.0).abs() < 1e-4);
        assert_eq!(app.device().surface_size(), (1024, 768));
    }

    #[test]
    fn test_reshape_before_prepare_is_applied_to_new_camera() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new());
        app.reshape(1024, 768);
        app.init().unwrap();
        app.prepare().unwrap();
        app.render().unwrap();

        assert!((aspect_of(&stored_camera(&app)) - 1024.0 / 768.0).abs() < 1e-4);
    }

    #[test]
    fn test_light_count_written_each_frame() {
        let mut app = prepared_app(3);
        app.render().unwrap();
        assert_eq!(stored_lights(&app).count, 3);

        app.scene_mut().unwrap().remove_light(0).unwrap();
        app.render().unwrap();
        assert_eq!(stored_lights(&app).count, 2);
        assert_eq!(app.lights_block().count, 2);
    }

    #[test]
    fn test_light_overflow_is_reported_and_frame_skipped() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new())
            .with_scene_loader(|| lit_scene(LIGHT_CAPACITY));
        app.init().unwrap();
        app.prepare().unwrap();
        app.render().unwrap();
        let before = app.device().slot_contents(LIGHTS_SLOT).unwrap().to_vec();

        // bypass the scene's own limit to simulate a misbehaving light source
        let lights = app.scene().unwrap().lights().to_vec();
        let mut overfull = lit_scene(0).with_light_limit(LIGHT_CAPACITY + 1);
        for light in lights.iter().chain(lights.first()) {
            overfull.add_light(*light).unwrap();
        }
        *app.scene_mut().unwrap() = overfull;
        app.device_mut().clear_commands();

        let result = app.render();

        assert_eq!(
            result,
            Err(FrameError::LightCapacityExceeded {
                count: LIGHT_CAPACITY + 1,
                capacity: LIGHT_CAPACITY
            })
        );
        assert!(result.unwrap_err().is_recoverable());
        assert_eq!(app.device().draw_count(), 0);
        assert_eq!(app.device().slot_contents(LIGHTS_SLOT).unwrap(), before.as_slice());

        // dropping the extra light recovers
        app.scene_mut().unwrap().remove_light(0).unwrap();
        app.render().unwrap();
        assert_eq!(stored_lights(&app).count as usize, LIGHT_CAPACITY);
    }

    #[test]
    fn test_scene_light_limit_above_capacity_fails_prepare() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new())
            .with_scene_loader(|| Scene::new().with_light_limit(LIGHT_CAPACITY * 2));
        app.init().unwrap();

        assert_eq!(
            app.prepare(),
            Err(AppError::LightLimitExceedsCapacity {
                limit: LIGHT_CAPACITY * 2,
                capacity: LIGHT_CAPACITY
            })
        );
        assert_eq!(app.device().live_buffer_count(), 0);
    }

    #[test]
    fn test_allocation_failure_is_fatal_at_prepare() {
        let mut device = RecordingDevice::new();
        device.fail_allocations(true);
        let mut app = RenderApp::new(AppConfig::new(800, 600), device);
        app.init().unwrap();

        assert!(matches!(app.prepare(), Err(AppError::Allocation(GpuError::AllocationFailed { .. }))));
        assert_eq!(app.state(), AppState::Initialized);
    }

    #[test]
    fn test_prepare_retry_after_allocation_failure_keeps_scene() {
        let mut device = RecordingDevice::new();
        device.fail_allocations(true);
        let mut app =
            RenderApp::new(AppConfig::new(800, 600), device).with_scene_loader(|| lit_scene(1));
        app.init().unwrap();
        assert!(app.prepare().is_err());

        app.device_mut().fail_allocations(false);
        app.prepare().unwrap();

        let scene = app.scene().unwrap();
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.lights().len(), 1);
        assert_eq!(app.device().live_buffer_count(), 2);
    }

    #[test]
    fn test_prepare_retry_after_light_limit_rejection_fails_again() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new())
            .with_scene_loader(|| lit_scene(1).with_light_limit(LIGHT_CAPACITY + 1));
        app.init().unwrap();

        let expected = Err(AppError::LightLimitExceedsCapacity {
            limit: LIGHT_CAPACITY + 1,
            capacity: LIGHT_CAPACITY,
        });
        assert_eq!(app.prepare(), expected);
        assert_eq!(app.prepare(), expected);
        assert_eq!(app.state(), AppState::Initialized);
        assert_eq!(app.device().live_buffer_count(), 0);
    }

    #[test]
    fn test_active_only_between_prepare_and_cleanup() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new());
        assert!(!app.is_active());
        app.init().unwrap();
        assert!(!app.is_active());
        app.prepare().unwrap();
        assert!(app.is_active());
        app.update(0.016);
        assert!(app.is_active());
        app.cleanup();
        assert!(!app.is_active());
    }

    #[test]
    fn test_cleanup_without_prepare_touches_nothing() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new());
        app.cleanup();

        assert_eq!(app.state(), AppState::CleanedUp);
        assert!(app.device().commands().is_empty());
    }

    #[test]
    fn test_cleanup_twice_releases_once() {
        let mut app = prepared_app(1);
        app.render().unwrap();
        app.cleanup();
        app.cleanup();

        assert_eq!(app.device().release_count(), 2);
        assert_eq!(app.device().live_buffer_count(), 0);
        assert!(app.scene().is_none());
    }

    #[test]
    #[should_panic(expected = "render() called in state Initialized")]
    fn test_render_before_prepare_panics() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new());
        app.init().unwrap();
        let _ = app.render();
    }

    #[test]
    #[should_panic(expected = "prepare() called in state Uninitialized")]
    fn test_prepare_before_init_panics() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new());
        let _ = app.prepare();
    }

    #[test]
    #[should_panic(expected = "render() called in state CleanedUp")]
    fn test_render_after_cleanup_panics() {
        let mut app = prepared_app(0);
        app.cleanup();
        let _ = app.render();
    }

    #[test]
    fn test_update_accepts_variable_frame_times() {
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new())
            .with_scene_loader(|| {
                let mut scene = Scene::new();
                scene.add_renderable(
                    Renderable::new("spinner", Vector3::new(0.0, 0.0, 0.0)).with_rotation_speed(1.0),
                );
                scene
            });
        app.init().unwrap();
        app.prepare().unwrap();

        for dt in [0.016, 0.1, 0.0, -1.0, f32::NAN, 0.034] {
            app.update(dt);
        }
        let angle = app.scene().unwrap().objects[0].angle.0;
        assert!((angle - 0.15).abs() < 1e-5);
    }

    #[test]
    fn test_shared_camera_set_before_prepare_is_kept() {
        let camera: Rc<RefCell<OrbitCamera>> =
            Rc::new(RefCell::new(AppConfig::default().camera.build(800, 600)));
        let mut app = RenderApp::new(AppConfig::new(800, 600), RecordingDevice::new());
        app.set_camera(camera.clone());
        app.init().unwrap();
        app.prepare().unwrap();

        camera.borrow_mut().set_distance(3.0);
        app.render().unwrap();

        let eye = camera.borrow().position();
        assert_eq!(stored_camera(&app).position, [eye.x, eye.y, eye.z, 1.0]);
    }
}
