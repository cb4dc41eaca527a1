// src/wgpu_utils/mod.rs
//! GPU access layer
//!
//! The [`GpuDevice`] trait is the explicit context handed to every component
//! that allocates or writes GPU memory. [`WgpuContext`] implements it on top of
//! wgpu; [`RecordingDevice`] implements it in host memory for tests and
//! headless runs (with a capped history).

pub mod device;
pub mod recording;
pub mod uniform_buffer;
pub mod wgpu_context;

// Re-export main types
pub use device::{BindingSlot, BufferHandle, GpuDevice, GpuError};
pub use recording::{GpuCommand, RecordingDevice};
pub use uniform_buffer::UniformBuffer;
pub use wgpu_context::WgpuContext;
