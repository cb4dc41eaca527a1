//! Explicit GPU context
//!
//! Every component that touches GPU memory receives a `&mut dyn GpuDevice`
//! instead of relying on an ambient "current context". The trait is small on
//! purpose: uniform buffer lifetime, byte uploads and one draw pass. The wgpu
//! backend lives in [`super::wgpu_context`], the headless one used by tests in
//! [`super::recording`].

use std::fmt;

use thiserror::Error;

use crate::gfx::scene::vertex::InstanceData;

/// Opaque identifier of a GPU buffer created through a [`GpuDevice`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u32);

impl BufferHandle {
    /// Raw id, only meaningful to the device that issued it.
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Shader-side binding index a uniform buffer is attached to.
///
/// Shaders must declare their blocks at `@group(0) @binding(slot)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingSlot(pub u32);

impl fmt::Display for BindingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding {}", self.0)
    }
}

/// Errors raised by a [`GpuDevice`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GpuError {
    #[error("GPU context has not been initialized")]
    NotInitialized,
    #[error("failed to allocate {size} byte buffer '{label}': {reason}")]
    AllocationFailed {
        label: String,
        size: u64,
        reason: String,
    },
    #[error("unknown or released buffer {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("write of {len} bytes at offset {offset} exceeds buffer size {size}")]
    WriteOutOfBounds { offset: u64, len: u64, size: u64 },
    #[error("no buffer bound at {0}")]
    MissingBinding(BindingSlot),
    #[error("{0} is already bound to a live buffer")]
    SlotInUse(BindingSlot),
    #[error("surface error: {0}")]
    Surface(String),
}

/// Device handle passed explicitly into every GPU-facing component.
pub trait GpuDevice {
    /// Establishes the rendering context. Later calls depend on it.
    fn initialize(&mut self) -> Result<(), GpuError>;

    fn is_initialized(&self) -> bool;

    /// Creates a uniform buffer of exactly `size` bytes and binds it to
    /// `slot` immediately, so uploads never need to re-bind.
    fn create_uniform_buffer(
        &mut self,
        label: &str,
        size: u64,
        slot: BindingSlot,
    ) -> Result<BufferHandle, GpuError>;

    /// Overwrites `data.len()` bytes of `buffer` starting at `offset`.
    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GpuError>;

    /// Releases the buffer and its slot. Unknown handles are ignored.
    fn release_buffer(&mut self, buffer: BufferHandle);

    fn resize_surface(&mut self, width: u32, height: u32);

    /// Issues one draw pass over `instances`, reading the bound uniform buffers.
    fn draw_instances(&mut self, instances: &[InstanceData]) -> Result<(), GpuError>;
}

/// Checks that `[offset, offset + len)` fits inside a buffer of `size` bytes.
pub(crate) fn check_write_range(offset: u64, len: u64, size: u64) -> Result<(), GpuError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(GpuError::WriteOutOfBounds { offset, len, size }),
    }
}
