//! GPU memory allocation using gpu-allocator.

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};

use crate::error::GraphicsError;
use crate::types::BufferUsage;

pub fn create_allocator(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
) -> Result<Allocator, GraphicsError> {
    Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device,
        physical_device,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: gpu_allocator::AllocationSizes::default(),
    })
    .map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create memory allocator: {}", e))
    })
}

/// Memory location for a buffer. Only host-mappable buffers live in host-visible memory.
pub fn buffer_location(usage: BufferUsage) -> MemoryLocation {
    if usage.contains(BufferUsage::MAP_READ) {
        MemoryLocation::GpuToCpu
    } else if usage.contains(BufferUsage::MAP_WRITE) {
        MemoryLocation::CpuToGpu
    } else {
        MemoryLocation::GpuOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_buffers_are_host_visible() {
        assert_eq!(
            buffer_location(BufferUsage::STAGING_UPLOAD),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            buffer_location(BufferUsage::STAGING_READBACK),
            MemoryLocation::GpuToCpu
        );
        assert_eq!(
            buffer_location(BufferUsage::STORAGE | BufferUsage::COPY_DST),
            MemoryLocation::GpuOnly
        );
    }
}
