//! # Graphics Module
//!
//! Camera, scene, per-frame uniform blocks and the scene shader.
//!
//! - **Camera System** ([`camera`]) - Orbit camera and its input controller
//! - **Scene Management** ([`scene`]) - Renderables and point lights
//! - **Uniforms** ([`uniforms`]) - Camera and lights blocks and their uploaders
//!
//! The frame orchestrator in [`crate::app`] ties them together: each frame it
//! uploads the camera block, then the lights block, then asks the scene to draw.

pub mod camera;
pub mod scene;
pub mod shader;
pub mod uniforms;

// Re-export commonly used types
pub use camera::{Camera, OrbitCamera, SharedCamera};
pub use scene::{PointLight, Renderable, Scene};
pub use uniforms::{CameraUploader, LightsUploader, UploadError, LIGHT_CAPACITY};
