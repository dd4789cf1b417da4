//! GPU buffer resource.

use crate::backend::GpuBuffer;
use crate::types::{BufferDescriptor, BufferUsage};

use super::ResourceId;

/// A GPU buffer resource.
///
/// Buffers are created by [`GraphicsDevice::create_buffer`](crate::GraphicsDevice::create_buffer)
/// and shared as `Arc<Buffer>`. Pending operations, barriers and recorded commands hold
/// their own strong references, so a buffer outlives any GPU work that uses it.
///
/// # Example
///
/// ```ignore
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
/// println!("Buffer size: {}", buffer.size());
/// ```
pub struct Buffer {
    id: ResourceId,
    descriptor: BufferDescriptor,
    gpu: GpuBuffer,
}

impl Buffer {
    /// Create a new buffer (called by GraphicsDevice).
    pub(crate) fn new(descriptor: BufferDescriptor, gpu: GpuBuffer) -> Self {
        Self {
            id: ResourceId::next(),
            descriptor,
            gpu,
        }
    }

    /// Get the resource identifier.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    pub(crate) fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);
