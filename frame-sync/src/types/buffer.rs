//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be used as an indirect buffer.
        const INDIRECT = 1 << 4;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 5;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 6;
        /// Buffer is host-visible for CPU reads.
        const MAP_READ = 1 << 7;
        /// Buffer is host-visible for CPU writes.
        const MAP_WRITE = 1 << 8;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

impl BufferUsage {
    /// Usage of a staging buffer feeding a transfer.
    pub const STAGING_UPLOAD: Self = Self::MAP_WRITE.union(Self::COPY_SRC);
    /// Usage of a buffer receiving a readback.
    pub const STAGING_READBACK: Self = Self::MAP_READ.union(Self::COPY_DST);

    /// Returns true if the CPU can map this buffer.
    pub fn is_host_visible(&self) -> bool {
        self.intersects(Self::MAP_READ | Self::MAP_WRITE)
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A buffer-to-buffer copy region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferCopy {
    /// Offset into the source buffer.
    pub src_offset: u64,
    /// Offset into the destination buffer.
    pub dst_offset: u64,
    /// Number of bytes to copy.
    pub size: u64,
}

impl BufferCopy {
    /// Copy `size` bytes from the start of one buffer to the start of another.
    pub fn whole(size: u64) -> Self {
        Self {
            src_offset: 0,
            dst_offset: 0,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_usages_are_host_visible() {
        assert!(BufferUsage::STAGING_UPLOAD.is_host_visible());
        assert!(BufferUsage::STAGING_READBACK.is_host_visible());
        assert!(!(BufferUsage::VERTEX | BufferUsage::COPY_DST).is_host_visible());
    }

    #[test]
    fn test_descriptor_builder() {
        let desc = BufferDescriptor::new(256, BufferUsage::UNIFORM).with_label("camera");
        assert_eq!(desc.size, 256);
        assert_eq!(desc.label.as_deref(), Some("camera"));
    }
}
