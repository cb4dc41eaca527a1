//! # Scene Management Module
//!
//! The scene owns the renderable objects and the light collection. The frame
//! orchestrator reads lights from it once per frame and asks it to issue the
//! draw pass after the uniform buffers have been uploaded.
//!
//! ## Key Components
//!
//! - [`Scene`] - Container for renderables and lights
//! - [`Renderable`] - A unit-cube instance with transform and material
//! - [`PointLight`] - Light source serialized into the lights uniform buffer
//! - [`BlinnPhongMaterial`] - Diffuse color and specular exponent
//! - [`InstanceData`] / [`Vertex3D`] - GPU vertex formats

pub mod light;
pub mod material;
pub mod scene;
pub mod vertex;

// Re-export main types
pub use light::{Attenuation, PointLight};
pub use material::BlinnPhongMaterial;
pub use scene::{Renderable, Scene, SceneError};
pub use vertex::{InstanceData, Vertex3D};
