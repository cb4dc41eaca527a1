//! Per-frame uniform data
//!
//! Camera and light state move from CPU structures into GPU-visible memory
//! exactly once per frame through the two uploaders here. Both buffers are
//! created once, bound to fixed slots, and overwritten in place.
//!
//! Shaders consuming them must declare:
//!
//! ```text
//! @group(0) @binding(0) var<uniform> camera: CameraBlock;
//! @group(0) @binding(1) var<uniform> lights: LightsBlock;
//! ```

pub mod camera_block;
pub mod lights_block;

use crate::wgpu_utils::device::BindingSlot;

/// Binding of the camera block
pub const CAMERA_SLOT: BindingSlot = BindingSlot(0);
/// Binding of the lights block
pub const LIGHTS_SLOT: BindingSlot = BindingSlot(1);

pub use camera_block::{CameraUBO, CameraUniformBlock, CameraUploader};
pub use lights_block::{
    LightUniformBlock, LightUniformEntry, LightsUBO, LightsUploader, UploadError, LIGHT_CAPACITY,
};
