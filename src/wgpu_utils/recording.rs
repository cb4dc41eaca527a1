//! Headless GPU device
//!
//! Keeps buffer contents in host memory and records every call in order. Built
//! for tests that check upload ordering and byte layouts. The call history and
//! draw snapshots grow with every frame unless capped with
//! [`RecordingDevice::with_history_limit`], which long headless runs should do.

use std::collections::BTreeMap;

use super::device::{check_write_range, BindingSlot, BufferHandle, GpuDevice, GpuError};
use crate::gfx::scene::vertex::InstanceData;

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    CreateBuffer {
        buffer: BufferHandle,
        label: String,
        size: u64,
        slot: BindingSlot,
    },
    WriteBuffer {
        buffer: BufferHandle,
        offset: u64,
        len: u64,
    },
    ReleaseBuffer(BufferHandle),
    ResizeSurface {
        width: u32,
        height: u32,
    },
    Draw {
        instance_count: usize,
    },
}

struct RecordedBuffer {
    slot: BindingSlot,
    data: Vec<u8>,
}

/// [`GpuDevice`] backed by plain byte vectors
#[derive(Default)]
pub struct RecordingDevice {
    initialized: bool,
    fail_allocations: bool,
    next_id: u32,
    buffers: BTreeMap<BufferHandle, RecordedBuffer>,
    slots: BTreeMap<BindingSlot, BufferHandle>,
    commands: Vec<GpuCommand>,
    draw_snapshots: Vec<BTreeMap<BindingSlot, Vec<u8>>>,
    history_limit: Option<usize>,
    surface_size: (u32, u32),
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the newest `limit` commands and the newest `limit` draw
    /// snapshots. Counters such as [`Self::draw_count`] then cover the
    /// retained history only.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Make every following allocation fail with [`GpuError::AllocationFailed`]
    pub fn fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// All calls recorded since creation or the last [`Self::clear_commands`]
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Drops recorded commands and draw snapshots
    pub fn clear_history(&mut self) {
        self.commands.clear();
        self.draw_snapshots.clear();
    }

    fn record(&mut self, command: GpuCommand) {
        self.commands.push(command);
        trim_front(&mut self.commands, self.history_limit);
    }

    /// Current bytes of a live buffer
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    /// Live buffer bound at `slot`
    pub fn buffer_at_slot(&self, slot: BindingSlot) -> Option<BufferHandle> {
        self.slots.get(&slot).copied()
    }

    /// Current bytes of the buffer bound at `slot`
    pub fn slot_contents(&self, slot: BindingSlot) -> Option<&[u8]> {
        self.buffer_at_slot(slot)
            .and_then(|buffer| self.buffer_contents(buffer))
    }

    /// Contents of every bound slot as seen by each draw, in draw order
    pub fn draw_snapshots(&self) -> &[BTreeMap<BindingSlot, Vec<u8>>] {
        &self.draw_snapshots
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn release_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::ReleaseBuffer(_)))
            .count()
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::Draw { .. }))
            .count()
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    fn require_initialized(&self) -> Result<(), GpuError> {
        if self.initialized {
            Ok(())
        } else {
            Err(GpuError::NotInitialized)
        }
    }
}

impl GpuDevice for RecordingDevice {
    fn initialize(&mut self) -> Result<(), GpuError> {
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn create_uniform_buffer(
        &mut self,
        label: &str,
        size: u64,
        slot: BindingSlot,
    ) -> Result<BufferHandle, GpuError> {
        self.require_initialized()?;
        if self.fail_allocations {
            return Err(GpuError::AllocationFailed {
                label: label.to_owned(),
                size,
                reason: "allocation failure injected".to_owned(),
            });
        }
        if self.slots.contains_key(&slot) {
            return Err(GpuError::SlotInUse(slot));
        }

        let buffer = BufferHandle(self.next_id);
        self.next_id += 1;
        self.buffers.insert(
            buffer,
            RecordedBuffer {
                slot,
                data: vec![0; size as usize],
            },
        );
        self.slots.insert(slot, buffer);
        self.record(GpuCommand::CreateBuffer {
            buffer,
            label: label.to_owned(),
            size,
            slot,
        });
        Ok(buffer)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GpuError> {
        self.require_initialized()?;
        let target = self
            .buffers
            .get_mut(&buffer)
            .ok_or(GpuError::UnknownBuffer(buffer))?;
        check_write_range(offset, data.len() as u64, target.data.len() as u64)?;

        let start = offset as usize;
        target.data[start..start + data.len()].copy_from_slice(data);
        self.record(GpuCommand::WriteBuffer {
            buffer,
            offset,
            len: data.len() as u64,
        });
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        if let Some(released) = self.buffers.remove(&buffer) {
            self.slots.remove(&released.slot);
            self.record(GpuCommand::ReleaseBuffer(buffer));
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface_size = (width, height);
        self.record(GpuCommand::ResizeSurface { width, height });
    }

    fn draw_instances(&mut self, instances: &[InstanceData]) -> Result<(), GpuError> {
        self.require_initialized()?;
        let snapshot = self
            .slots
            .iter()
            .filter_map(|(slot, buffer)| {
                self.buffers
                    .get(buffer)
                    .map(|b| (*slot, b.data.clone()))
            })
            .collect();
        self.draw_snapshots.push(snapshot);
        trim_front(&mut self.draw_snapshots, self.history_limit);
        self.record(GpuCommand::Draw {
            instance_count: instances.len(),
        });
        Ok(())
    }
}

fn trim_front<T>(history: &mut Vec<T>, limit: Option<usize>) {
    if let Some(limit) = limit {
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_before_initialize_fail() {
        let mut device = RecordingDevice::new();
        assert_eq!(
            device.create_uniform_buffer("early", 16, BindingSlot(0)),
            Err(GpuError::NotInitialized)
        );
        assert_eq!(device.draw_instances(&[]), Err(GpuError::NotInitialized));
        assert!(device.commands().is_empty());
    }

    #[test]
    fn test_slot_cannot_be_bound_twice() {
        let mut device = RecordingDevice::new();
        device.initialize().unwrap();
        let first = device
            .create_uniform_buffer("first", 16, BindingSlot(1))
            .unwrap();

        assert_eq!(
            device.create_uniform_buffer("second", 16, BindingSlot(1)),
            Err(GpuError::SlotInUse(BindingSlot(1)))
        );

        device.release_buffer(first);
        assert!(device
            .create_uniform_buffer("third", 16, BindingSlot(1))
            .is_ok());
    }

    #[test]
    fn test_out_of_bounds_write_is_rejected_without_side_effects() {
        let mut device = RecordingDevice::new();
        device.initialize().unwrap();
        let buffer = device
            .create_uniform_buffer("small", 8, BindingSlot(0))
            .unwrap();
        device.clear_commands();

        assert!(matches!(
            device.write_buffer(buffer, 4, &[1; 8]),
            Err(GpuError::WriteOutOfBounds { .. })
        ));
        assert_eq!(device.buffer_contents(buffer), Some(&[0u8; 8][..]));
        assert!(device.commands().is_empty());
    }

    #[test]
    fn test_draw_snapshots_bound_slots() {
        let mut device = RecordingDevice::new();
        device.initialize().unwrap();
        let buffer = device
            .create_uniform_buffer("camera", 4, BindingSlot(0))
            .unwrap();
        device.write_buffer(buffer, 0, &[1, 2, 3, 4]).unwrap();
        device.draw_instances(&[]).unwrap();
        device.write_buffer(buffer, 0, &[5, 6, 7, 8]).unwrap();

        let snapshot = &device.draw_snapshots()[0];
        assert_eq!(snapshot[&BindingSlot(0)], vec![1, 2, 3, 4]);
        assert_eq!(device.slot_contents(BindingSlot(0)), Some(&[5, 6, 7, 8][..]));
    }

    #[test]
    fn test_history_limit_keeps_newest_entries() {
        let mut device = RecordingDevice::new().with_history_limit(2);
        device.initialize().unwrap();
        for count in 0..5 {
            device.draw_instances(&vec![<InstanceData as bytemuck::Zeroable>::zeroed(); count]).unwrap();
        }

        assert_eq!(
            device.commands(),
            &[
                GpuCommand::Draw { instance_count: 3 },
                GpuCommand::Draw { instance_count: 4 }
            ]
        );
        assert_eq!(device.draw_snapshots().len(), 2);

        device.clear_history();
        assert!(device.commands().is_empty());
        assert!(device.draw_snapshots().is_empty());
    }

    #[test]
    fn test_releasing_unknown_buffer_is_ignored() {
        let mut device = RecordingDevice::new();
        device.release_buffer(BufferHandle(42));
        assert_eq!(device.release_count(), 0);
    }
}
