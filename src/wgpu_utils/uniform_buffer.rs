// src/wgpu_utils/uniform_buffer.rs - Typed uniform buffer allocation
use std::marker::PhantomData;

use super::device::{BindingSlot, BufferHandle, GpuDevice, GpuError};

/// Typed wrapper around a uniform buffer whose size is fixed by `Content`
///
/// The byte size comes from `size_of::<Content>()`, never from live data, so
/// it is stable for the buffer's whole lifetime. The buffer is bound to its
/// slot at creation time.
pub struct UniformBuffer<Content> {
    handle: Option<BufferHandle>,
    slot: BindingSlot,
    content_type: PhantomData<Content>,
}

impl<Content: bytemuck::Pod> UniformBuffer<Content> {
    fn name() -> &'static str {
        let type_name = std::any::type_name::<Content>();
        let pos = type_name.rfind(':').unwrap_or(0);
        if pos > 0 {
            &type_name[(pos + 1)..]
        } else {
            type_name
        }
    }

    /// Size in bytes of the GPU allocation
    pub const fn size() -> u64 {
        std::mem::size_of::<Content>() as u64
    }

    /// Allocate the buffer and bind it to `slot`
    ///
    /// # Panics
    /// Panics if the device has not been initialized. Allocating before the
    /// context exists is a programmer error, not a recoverable condition.
    pub fn allocate(device: &mut dyn GpuDevice, slot: BindingSlot) -> Result<Self, GpuError> {
        assert!(
            device.is_initialized(),
            "UniformBuffer<{}> allocated before the GPU context was initialized",
            Self::name()
        );

        let label = format!("UniformBuffer: {}", Self::name());
        let handle = device.create_uniform_buffer(&label, Self::size(), slot)?;
        log::debug!("Allocated {} ({} bytes) at {}", label, Self::size(), slot);

        Ok(UniformBuffer {
            handle: Some(handle),
            slot,
            content_type: PhantomData,
        })
    }

    /// Overwrite the whole buffer with `content`
    pub fn write(&self, device: &mut dyn GpuDevice, content: &Content) -> Result<(), GpuError> {
        self.write_prefix(device, content, Self::size() as usize)
    }

    /// Overwrite only the first `len` bytes of the buffer with the matching
    /// bytes of `content`. The rest of the buffer is left untouched.
    pub fn write_prefix(
        &self,
        device: &mut dyn GpuDevice,
        content: &Content,
        len: usize,
    ) -> Result<(), GpuError> {
        let handle = self.handle.ok_or(GpuError::MissingBinding(self.slot))?;
        let bytes = bytemuck::bytes_of(content);
        let len = len.min(bytes.len());
        device.write_buffer(handle, 0, &bytes[..len])
    }

    /// Release the GPU allocation. Calling it again is a no-op.
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if let Some(handle) = self.handle.take() {
            device.release_buffer(handle);
            log::debug!("Released UniformBuffer: {} at {}", Self::name(), self.slot);
        }
    }

    /// Handle of the live allocation, if any
    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    /// Binding slot the buffer was created at
    pub fn slot(&self) -> BindingSlot {
        self.slot
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wgpu_utils::recording::RecordingDevice;

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Block {
        a: [f32; 4],
        b: [u32; 4],
    }

    fn ready_device() -> RecordingDevice {
        let mut device = RecordingDevice::new();
        device.initialize().unwrap();
        device
    }

    #[test]
    fn test_allocation_size_comes_from_layout() {
        let mut device = ready_device();
        let buffer = UniformBuffer::<Block>::allocate(&mut device, BindingSlot(3)).unwrap();

        let handle = buffer.handle().unwrap();
        assert_eq!(device.buffer_contents(handle).unwrap().len(), 32);
        assert_eq!(device.buffer_at_slot(BindingSlot(3)), Some(handle));
    }

    #[test]
    #[should_panic(expected = "before the GPU context was initialized")]
    fn test_allocate_before_initialize_panics() {
        let mut device = RecordingDevice::new();
        let _ = UniformBuffer::<Block>::allocate(&mut device, BindingSlot(0));
    }

    #[test]
    fn test_write_prefix_leaves_tail_untouched() {
        let mut device = ready_device();
        let buffer = UniformBuffer::<Block>::allocate(&mut device, BindingSlot(0)).unwrap();
        let full = Block {
            a: [1.0; 4],
            b: [7; 4],
        };
        buffer.write(&mut device, &full).unwrap();

        let partial = Block {
            a: [2.0; 4],
            b: [9; 4],
        };
        buffer.write_prefix(&mut device, &partial, 16).unwrap();

        let bytes = device.buffer_contents(buffer.handle().unwrap()).unwrap();
        let stored: Block = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(stored.a, [2.0; 4]);
        assert_eq!(stored.b, [7; 4]);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut device = ready_device();
        let mut buffer = UniformBuffer::<Block>::allocate(&mut device, BindingSlot(0)).unwrap();
        buffer.release(&mut device);
        buffer.release(&mut device);

        assert!(buffer.is_released());
        assert_eq!(device.release_count(), 1);
    }
}
