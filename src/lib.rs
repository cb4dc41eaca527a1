// src/lib.rs
//! rsm
//!
//! Frame orchestration for a real-time 3D renderer built on wgpu and winit.
//! Camera and light state reach the GPU through two fixed uniform buffers,
//! rewritten in place once per frame before the scene is drawn.

pub mod app;
pub mod config;
pub mod gfx;
pub mod host;
pub mod prelude;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::{AppError, AppState, FrameError, RenderApp};
pub use config::{AppConfig, CameraConfig};
pub use host::run;
