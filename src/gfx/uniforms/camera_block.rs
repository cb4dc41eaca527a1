//! Camera uniform block and its per-frame uploader

use cgmath::{EuclideanSpace, Matrix4, SquareMatrix};

use crate::{
    gfx::camera::{camera_utils::convert_matrix4_to_array, Camera},
    wgpu_utils::{
        device::{GpuDevice, GpuError},
        uniform_buffer::UniformBuffer,
    },
};

use super::CAMERA_SLOT;

/// Camera data as seen by shaders at [`CAMERA_SLOT`]
///
/// MUST match `CameraBlock` in the scene shader exactly.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniformBlock {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    /// Eye position in homogeneous coordinates, w = 1.
    ///
    /// A vec4 keeps the 16 byte alignment uniform blocks require.
    pub position: [f32; 4],
}
// Total: 3 * 64 + 16 = 208 bytes

impl CameraUniformBlock {
    /// Packs the camera's current state.
    pub fn from_camera(camera: &dyn Camera) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let eye = camera.position().to_vec();
        Self {
            view: convert_matrix4_to_array(view),
            projection: convert_matrix4_to_array(projection),
            view_proj: convert_matrix4_to_array(projection * view),
            position: [eye.x, eye.y, eye.z, 1.0],
        }
    }
}

impl Default for CameraUniformBlock {
    fn default() -> Self {
        let identity = convert_matrix4_to_array(Matrix4::identity());
        Self {
            view: identity,
            projection: identity,
            view_proj: identity,
            position: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

pub type CameraUBO = UniformBuffer<CameraUniformBlock>;

/// Serializes camera state into the camera uniform buffer
///
/// The CPU-side block is overwritten in place on every upload; no history is
/// kept. Every upload rewrites the whole block, even if only one field moved.
#[derive(Default)]
pub struct CameraUploader {
    ubo: Option<CameraUBO>,
    block: CameraUniformBlock,
}

impl CameraUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the camera buffer at [`CAMERA_SLOT`].
    pub fn prepare(&mut self, device: &mut dyn GpuDevice) -> Result<(), GpuError> {
        if self.ubo.is_none() {
            self.ubo = Some(CameraUBO::allocate(device, CAMERA_SLOT)?);
        }
        Ok(())
    }

    /// Reads the camera and writes the full block to the GPU.
    ///
    /// # Panics
    /// Panics if called before [`Self::prepare`].
    pub fn upload(&mut self, device: &mut dyn GpuDevice, camera: &dyn Camera) -> Result<(), GpuError> {
        let ubo = self
            .ubo
            .as_ref()
            .expect("camera buffer uploaded before it was prepared");

        let staged = CameraUniformBlock::from_camera(camera);
        ubo.write(device, &staged)?;
        self.block = staged;
        Ok(())
    }

    /// Last block written to the GPU
    pub fn block(&self) -> &CameraUniformBlock {
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
