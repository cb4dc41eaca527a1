//! Lights uniform block and its per-frame uploader
//!
//! A variable-length light list is mapped onto a fixed-capacity GPU layout:
//! an explicit `count` header followed by `LIGHT_CAPACITY` entry slots. Only
//! the first `count` entries are meaningful; shaders must not read past it.

use std::mem::size_of;

use thiserror::Error;

use crate::{
    gfx::scene::light::PointLight,
    wgpu_utils::{
        device::{GpuDevice, GpuError},
        uniform_buffer::UniformBuffer,
    },
};

use super::LIGHTS_SLOT;

/// Number of entry slots in the lights uniform buffer
pub const LIGHT_CAPACITY: usize = 16;

/// One light as seen by shaders
///
/// MUST match `LightEntry` in the scene shader exactly.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniformEntry {
    /// World position, w = 1
    pub position: [f32; 4],
    /// Linear rgb color, w = intensity
    pub color: [f32; 4],
    /// constant, linear, quadratic, range
    pub attenuation: [f32; 4],
}
// Total: 3 * 16 = 48 bytes

impl From<&PointLight> for LightUniformEntry {
    fn from(light: &PointLight) -> Self {
        let att = light.attenuation;
        Self {
            position: [light.position.x, light.position.y, light.position.z, 1.0],
            color: [light.color[0], light.color[1], light.color[2], light.intensity],
            attenuation: [att.constant, att.linear, att.quadratic, att.range],
        }
    }
}

/// The lights block at [`LIGHTS_SLOT`]
///
/// MUST match `LightsBlock` in the scene shader exactly.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniformBlock {
    pub count: u32,
    pub _padding: [u32; 3],
    pub lights: [LightUniformEntry; LIGHT_CAPACITY],
}
// Total: 16 + 16 * 48 = 784 bytes

impl LightUniformBlock {
    /// Byte length of the count header
    pub const HEADER_SIZE: usize = 16;

    /// Bytes that carry data when `count` lights are active
    pub const fn used_bytes(count: usize) -> usize {
        Self::HEADER_SIZE + count * size_of::<LightUniformEntry>()
    }

    /// Active entries
    pub fn active(&self) -> &[LightUniformEntry] {
        &self.lights[..(self.count as usize).min(LIGHT_CAPACITY)]
    }
}

impl Default for LightUniformBlock {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The scene holds more lights than the buffer has slots. Nothing was
    /// written; the buffer keeps its previous contents.
    #[error("scene has {count} lights but the lights buffer holds at most {capacity}")]
    LightCapacityExceeded { count: usize, capacity: usize },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

pub type LightsUBO = UniformBuffer<LightUniformBlock>;

/// Serializes the scene's lights into the lights uniform buffer
#[derive(Default)]
pub struct LightsUploader {
    ubo: Option<LightsUBO>,
    block: LightUniformBlock,
}

impl LightsUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn capacity(&self) -> usize {
        LIGHT_CAPACITY
    }

    /// Allocates the lights buffer at [`LIGHTS_SLOT`].
    pub fn prepare(&mut self, device: &mut dyn GpuDevice) -> Result<(), GpuError> {
        if self.ubo.is_none() {
            self.ubo = Some(LightsUBO::allocate(device, LIGHTS_SLOT)?);
        }
        Ok(())
    }

    /// Packs `lights` in order and writes the header plus the active entries
    /// in one contiguous write. Entry slots past the count are not touched.
    ///
    /// Returns the count written.
    ///
    /// # Panics
    /// Panics if called before [`Self::prepare`].
    pub fn upload(
        &mut self,
        device: &mut dyn GpuDevice,
        lights: &[PointLight],
    ) -> Result<u32, UploadError> {
        let ubo = self
            .ubo
            .as_ref()
            .expect("lights buffer uploaded before it was prepared");

        if lights.len() > LIGHT_CAPACITY {
            return Err(UploadError::LightCapacityExceeded {
                count: lights.len(),
                capacity: LIGHT_CAPACITY,
            });
        }

        let mut staged = self.block;
        for (slot, light) in staged.lights.iter_mut().zip(lights) {
            *slot = LightUniformEntry::from(light);
        }
        staged.count = lights.len() as u32;

        ubo.write_prefix(device, &staged, LightUniformBlock::used_bytes(lights.len()))?;
        self.block = staged;
        Ok(staged.count)
    }

    /// Last block written to the GPU
    pub fn block(&self) -> &LightUniformBlock {
        &self.block
    }

    pub fn is_prepared(&self) -> bool {
        self.ubo.as_ref().is_some_and(|ubo| !ubo.is_released())
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if let Some(mut ubo) = self.ubo.take() {
            ubo.release(device);
        }
    }
}
