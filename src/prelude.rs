//! # rsm Prelude
//!
//! Commonly used types in one import:
//!
//! ```no_run
//! use rsm::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     rsm::run(AppConfig::new(1280, 720), || {
//!         let mut scene = Scene::new();
//!         scene.add_renderable(Renderable::new("cube", Vector3::new(0.0, 0.0, 0.0)));
//!         scene
//!             .add_light(PointLight::new(Vector3::new(2.0, 3.0, 2.0), [1.0; 3], 2.0))
//!             .expect("light limit");
//!         scene
//!     })
//! }
//! ```

// Core application types
pub use crate::app::{AppError, AppState, FrameError, RenderApp};
pub use crate::config::{AppConfig, CameraConfig};

// Scene and camera
pub use crate::gfx::camera::{share, Camera, CameraController, OrbitCamera, SharedCamera};
pub use crate::gfx::scene::{Attenuation, BlinnPhongMaterial, PointLight, Renderable, Scene, SceneError};
pub use crate::gfx::uniforms::{UploadError, LIGHT_CAPACITY};

// GPU access
pub use crate::wgpu_utils::{GpuDevice, GpuError, RecordingDevice, WgpuContext};

// Math types
pub use cgmath::{Deg, Point3, Rad, Vector3};
