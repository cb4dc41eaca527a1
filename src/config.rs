//! Application configuration
//!
//! Plain structs with defaults and builder-style setters. Nothing is read from
//! disk; hosts construct the config in code.

use cgmath::{Deg, Vector3};

use crate::gfx::camera::{OrbitCamera, Perspective};

/// Initial orbit camera parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub distance: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub target: [f32; 3],
    pub fovy_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
    pub min_distance: f32,
    /// Yaw speed in radians per second, 0 disables
    pub auto_rotate: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 8.0,
            pitch: 0.4,
            yaw: 0.2,
            target: [0.0, 0.0, 0.0],
            fovy_degrees: 45.0,
            znear: 0.1,
            zfar: 1000.0,
            min_distance: 1.1,
            auto_rotate: 0.0,
        }
    }
}

impl CameraConfig {
    /// Builds the orbit camera for a viewport of `width` x `height`.
    pub fn build(&self, width: u32, height: u32) -> OrbitCamera {
        let projection = Perspective::new(
            Deg(self.fovy_degrees),
            width,
            height,
            self.znear,
            self.zfar,
        );
        let mut camera = OrbitCamera::new(
            self.distance,
            self.pitch,
            self.yaw,
            Vector3::from(self.target),
            projection,
        );
        let max_distance = camera.bounds.max_distance.unwrap_or(f32::MAX);
        if self.min_distance > max_distance {
            log::warn!(
                "Camera min_distance {} exceeds max_distance {}, raising the maximum",
                self.min_distance,
                max_distance
            );
            camera.bounds.max_distance = Some(self.min_distance);
        }
        camera.bounds.min_distance = Some(self.min_distance);
        camera.auto_rotate = self.auto_rotate;
        camera
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub clear_color: [f64; 4],
    pub vsync: bool,
    pub camera: CameraConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            title: "rsm".to_owned(),
            clear_color: [0.1, 0.2, 0.3, 1.0],
            vsync: true,
            camera: CameraConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_owned();
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f64; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }
}
