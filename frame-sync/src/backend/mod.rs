//! GPU backend abstraction layer.
//!
//! Every GPU object the frame core touches is an opaque, backend-tagged handle
//! enum. [`GpuBackend`] dispatches each operation to the active backend by
//! pattern match.
//!
//! # Available Backends
//!
//! - `dummy` (always available): a simulated GPU that executes submissions
//!   against CPU memory, honoring semaphore waits and validating layouts
//! - `vulkan-backend`: native Vulkan 1.3 backend using ash, with timeline
//!   semaphores and synchronization2
//!
//! # Architecture
//!
//! Both backends expose the same inherent methods:
//! - Resource creation (buffers, images, swapchains)
//! - Host access to buffer memory
//! - Fences and binary/timeline semaphores
//! - Submission of recorded [`CommandList`]s with semaphore waits and signals
//! - Image acquisition and presentation

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub mod dummy;

use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "vulkan-backend")]
use ash::vk;
#[cfg(feature = "vulkan-backend")]
use gpu_allocator::vulkan::{Allocation, Allocator};
#[cfg(feature = "vulkan-backend")]
use parking_lot::Mutex;

use crate::access::PipelineStages;
use crate::command::CommandList;
use crate::error::GraphicsError;
use crate::swapchain::SwapchainDescriptor;
use crate::types::{BufferDescriptor, ImageDescriptor, QueueKind};

use dummy::{DummyBackend, DummyBuffer, DummyFence, DummyImage, DummySemaphore, DummySwapchain};

// ============================================================================
// Handles
// ============================================================================

/// Handle to a GPU buffer resource.
#[allow(clippy::large_enum_variant)]
pub enum GpuBuffer {
    /// Simulated buffer backed by CPU memory.
    Dummy(Arc<DummyBuffer>),
    /// Vulkan backend buffer
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        buffer: vk::Buffer,
        allocation: Mutex<Option<Allocation>>,
        allocator: Arc<Mutex<Allocator>>,
        size: u64,
    },
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(state) => f.debug_tuple("GpuBuffer::Dummy").field(state).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { buffer, size, .. } => f
                .debug_struct("GpuBuffer::Vulkan")
                .field("buffer", buffer)
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a GPU image resource.
#[allow(clippy::large_enum_variant)]
pub enum GpuImage {
    /// Simulated image backed by CPU memory, with a tracked layout.
    Dummy(Arc<DummyImage>),
    /// Vulkan backend image. Swapchain images are not owned and carry no allocation.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        image: vk::Image,
        allocation: Mutex<Option<Allocation>>,
        allocator: Option<Arc<Mutex<Allocator>>>,
        format: vk::Format,
        extent: vk::Extent3D,
        owned: bool,
    },
}

impl std::fmt::Debug for GpuImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(state) => f.debug_tuple("GpuImage::Dummy").field(state).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan {
                image,
                format,
                extent,
                owned,
                ..
            } => f
                .debug_struct("GpuImage::Vulkan")
                .field("image", image)
                .field("format", format)
                .field("extent", extent)
                .field("owned", owned)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a GPU fence for CPU-GPU synchronization.
pub enum GpuFence {
    /// Simulated fence
    Dummy(Arc<DummyFence>),
    /// Vulkan backend fence
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        fence: vk::Fence,
    },
}

impl std::fmt::Debug for GpuFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(state) => f.debug_tuple("GpuFence::Dummy").field(state).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { fence, .. } => f
                .debug_struct("GpuFence::Vulkan")
                .field("fence", fence)
                .finish_non_exhaustive(),
        }
    }
}

/// The kind of semaphore to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemaphoreKind {
    /// One signal, one wait.
    Binary,
    /// Monotonic 64-bit counter starting at `initial`.
    Timeline { initial: u64 },
}

/// Handle to a GPU semaphore for GPU-GPU synchronization.
pub enum GpuSemaphore {
    /// Simulated semaphore
    Dummy(Arc<DummySemaphore>),
    /// Vulkan backend semaphore
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        semaphore: vk::Semaphore,
        kind: SemaphoreKind,
    },
}

impl GpuSemaphore {
    /// The kind this semaphore was created with.
    pub fn kind(&self) -> SemaphoreKind {
        match self {
            Self::Dummy(state) => state.kind(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { kind, .. } => *kind,
        }
    }
}

impl std::fmt::Debug for GpuSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(state) => f.debug_tuple("GpuSemaphore::Dummy").field(state).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan {
                semaphore, kind, ..
            } => f
                .debug_struct("GpuSemaphore::Vulkan")
                .field("semaphore", semaphore)
                .field("kind", kind)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a GPU command buffer.
///
/// Commands are not recorded into the handle directly; a [`CommandList`] is
/// translated into it when submitted.
pub enum GpuCommandBuffer {
    /// Simulated command buffer
    Dummy { queue: QueueKind },
    /// Vulkan backend command buffer
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        pool: Arc<Mutex<vk::CommandPool>>,
        buffer: vk::CommandBuffer,
        queue: QueueKind,
    },
}

impl GpuCommandBuffer {
    /// The queue kind this command buffer was allocated for.
    pub fn queue(&self) -> QueueKind {
        match self {
            Self::Dummy { queue } => *queue,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { queue, .. } => *queue,
        }
    }
}

impl std::fmt::Debug for GpuCommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { queue } => f
                .debug_struct("GpuCommandBuffer::Dummy")
                .field("queue", queue)
                .finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { buffer, queue, .. } => f
                .debug_struct("GpuCommandBuffer::Vulkan")
                .field("buffer", buffer)
                .field("queue", queue)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a presentation swapchain.
pub enum GpuSwapchain {
    /// Simulated headless swapchain
    Dummy(Arc<DummySwapchain>),
    /// Vulkan backend swapchain
    #[cfg(feature = "vulkan-backend")]
    Vulkan(Box<vulkan::swapchain::VulkanSwapchain>),
}

impl std::fmt::Debug for GpuSwapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(state) => f.debug_tuple("GpuSwapchain::Dummy").field(state).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(swapchain) => f
                .debug_tuple("GpuSwapchain::Vulkan")
                .field(swapchain)
                .finish(),
        }
    }
}

/// The surface a swapchain presents to.
#[derive(Debug, Clone)]
pub enum SurfaceTarget {
    /// No window; presented images are only recorded by the dummy backend.
    Headless,
    /// A Vulkan surface created by [`vulkan::VulkanBackend::create_surface`].
    #[cfg(feature = "vulkan-backend")]
    Vulkan(Arc<vulkan::swapchain::VulkanSurface>),
}

// ============================================================================
// Vulkan Resource Cleanup (Drop implementations)
// ============================================================================

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if let GpuBuffer::Vulkan {
            device,
            buffer,
            allocation,
            allocator,
            ..
        } = self
        {
            unsafe {
                device.destroy_buffer(*buffer, None);
            }
            if let Some(allocation) = allocation.lock().take()
                && let Err(e) = allocator.lock().free(allocation)
            {
                log::error!("Failed to free buffer memory: {:?}", e);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuImage {
    fn drop(&mut self) {
        if let GpuImage::Vulkan {
            device,
            image,
            allocation,
            allocator,
            owned,
            ..
        } = self
        {
            if !*owned {
                return;
            }
            unsafe {
                device.destroy_image(*image, None);
            }
            if let Some(allocation) = allocation.lock().take()
                && let Some(allocator) = allocator
                && let Err(e) = allocator.lock().free(allocation)
            {
                log::error!("Failed to free image memory: {:?}", e);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuFence {
    fn drop(&mut self) {
        if let GpuFence::Vulkan { device, fence } = self {
            unsafe {
                device.destroy_fence(*fence, None);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuSemaphore {
    fn drop(&mut self) {
        if let GpuSemaphore::Vulkan {
            device, semaphore, ..
        } = self
        {
            unsafe {
                device.destroy_semaphore(*semaphore, None);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuCommandBuffer {
    fn drop(&mut self) {
        if let GpuCommandBuffer::Vulkan {
            device,
            pool,
            buffer,
            ..
        } = self
        {
            let pool = pool.lock();
            unsafe {
                device.free_command_buffers(*pool, &[*buffer]);
            }
        }
    }
}

// ============================================================================
// Submission
// ============================================================================

/// One semaphore wait or signal of a submission.
#[derive(Debug, Clone, Copy)]
pub struct SemaphoreSubmit<'a> {
    pub semaphore: &'a GpuSemaphore,
    /// Timeline value; ignored for binary semaphores.
    pub value: u64,
    /// Stages that wait for, or complete before, the semaphore operation.
    pub stages: PipelineStages,
}

impl<'a> SemaphoreSubmit<'a> {
    /// A binary semaphore operation.
    pub fn binary(semaphore: &'a GpuSemaphore, stages: PipelineStages) -> Self {
        Self {
            semaphore,
            value: 0,
            stages,
        }
    }
}

/// A queue submission.
#[derive(Debug, Clone, Copy)]
pub struct SubmitInfo<'a> {
    pub label: &'a str,
    pub queue: QueueKind,
    /// Command buffer and the commands to translate into it. `None` submits only
    /// the semaphore operations.
    pub command_buffer: Option<(&'a GpuCommandBuffer, &'a CommandList)>,
    pub waits: &'a [SemaphoreSubmit<'a>],
    pub signals: &'a [SemaphoreSubmit<'a>],
    /// Fence signaled once the submission has fully executed. Must be unsignaled.
    pub fence: Option<&'a GpuFence>,
}

// ============================================================================
// Backend dispatch
// ============================================================================

/// The active GPU backend.
pub enum GpuBackend {
    Dummy(DummyBackend),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanBackend),
}

macro_rules! dispatch {
    ($self:expr, $backend:ident => $body:expr) => {
        match $self {
            GpuBackend::Dummy($backend) => $body,
            #[cfg(feature = "vulkan-backend")]
            GpuBackend::Vulkan($backend) => $body,
        }
    };
}

impl GpuBackend {
    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        dispatch!(self, b => b.name())
    }

    /// The simulated backend, if active.
    pub fn as_dummy(&self) -> Option<&DummyBackend> {
        match self {
            Self::Dummy(backend) => Some(backend),
            #[cfg(feature = "vulkan-backend")]
            _ => None,
        }
    }

    /// Create a buffer resource.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        dispatch!(self, b => b.create_buffer(descriptor))
    }

    /// Create an image resource.
    pub fn create_image(&self, descriptor: &ImageDescriptor) -> Result<GpuImage, GraphicsError> {
        dispatch!(self, b => b.create_image(descriptor))
    }

    /// Write host data into a host-visible buffer.
    pub fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        dispatch!(self, b => b.write_buffer(buffer, offset, data))
    }

    /// Read bytes from a host-visible buffer. Does not wait for the GPU.
    pub fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        dispatch!(self, b => b.read_buffer(buffer, offset, size))
    }

    /// Create a fence, optionally in the signaled state.
    pub fn create_fence(&self, signaled: bool) -> Result<GpuFence, GraphicsError> {
        dispatch!(self, b => b.create_fence(signaled))
    }

    /// Wait for a fence. Returns `false` if `timeout` elapsed first.
    pub fn wait_fence(&self, fence: &GpuFence, timeout: Duration) -> Result<bool, GraphicsError> {
        dispatch!(self, b => b.wait_fence(fence, timeout))
    }

    /// Check if a fence is signaled (non-blocking).
    pub fn is_fence_signaled(&self, fence: &GpuFence) -> Result<bool, GraphicsError> {
        dispatch!(self, b => b.is_fence_signaled(fence))
    }

    /// Return a fence to the unsignaled state.
    pub fn reset_fence(&self, fence: &GpuFence) -> Result<(), GraphicsError> {
        dispatch!(self, b => b.reset_fence(fence))
    }

    /// Create a binary or timeline semaphore.
    pub fn create_semaphore(&self, kind: SemaphoreKind) -> Result<GpuSemaphore, GraphicsError> {
        dispatch!(self, b => b.create_semaphore(kind))
    }

    /// Signal a timeline semaphore from the host.
    pub fn signal_semaphore(
        &self,
        semaphore: &GpuSemaphore,
        value: u64,
    ) -> Result<(), GraphicsError> {
        dispatch!(self, b => b.signal_semaphore(semaphore, value))
    }

    /// Current counter value of a timeline semaphore.
    pub fn semaphore_value(&self, semaphore: &GpuSemaphore) -> Result<u64, GraphicsError> {
        dispatch!(self, b => b.semaphore_value(semaphore))
    }

    /// Allocate a resettable command buffer for `queue`.
    pub fn create_command_buffer(
        &self,
        queue: QueueKind,
    ) -> Result<GpuCommandBuffer, GraphicsError> {
        dispatch!(self, b => b.create_command_buffer(queue))
    }

    /// Translate and submit work to a queue.
    pub fn submit(&self, info: &SubmitInfo<'_>) -> Result<(), GraphicsError> {
        dispatch!(self, b => b.submit(info))
    }

    /// Create a swapchain, retiring `old` if given.
    ///
    /// Returns the swapchain, its images and the descriptor actually applied
    /// after clamping to the surface capabilities.
    pub fn create_swapchain(
        &self,
        target: &SurfaceTarget,
        descriptor: &SwapchainDescriptor,
        old: Option<&GpuSwapchain>,
    ) -> Result<(GpuSwapchain, Vec<GpuImage>, SwapchainDescriptor), GraphicsError> {
        dispatch!(self, b => b.create_swapchain(target, descriptor, old))
    }

    /// Acquire the next presentable image, signaling the binary `semaphore` when it is ready.
    pub fn acquire_next_image(
        &self,
        swapchain: &GpuSwapchain,
        timeout: Duration,
        semaphore: &GpuSemaphore,
    ) -> Result<u32, GraphicsError> {
        dispatch!(self, b => b.acquire_next_image(swapchain, timeout, semaphore))
    }

    /// Queue an image for presentation. Returns `true` if the surface is out of date.
    pub fn present(
        &self,
        swapchain: &GpuSwapchain,
        image_index: u32,
        wait: &GpuSemaphore,
    ) -> Result<bool, GraphicsError> {
        dispatch!(self, b => b.present(swapchain, image_index, wait))
    }

    /// Block until every queue is idle.
    pub fn wait_idle(&self) -> Result<(), GraphicsError> {
        dispatch!(self, b => b.wait_idle())
    }
}

impl std::fmt::Debug for GpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GpuBackend").field(&self.name()).finish()
    }
}

/// Selects and creates the appropriate backend based on available features.
pub fn create_backend() -> Result<GpuBackend, GraphicsError> {
    // Try Vulkan backend first if available (native Vulkan via ash)
    #[cfg(feature = "vulkan-backend")]
    {
        match vulkan::VulkanBackend::new(&vulkan::VulkanParameters::default()) {
            Ok(backend) => {
                log::info!("Using Vulkan backend (ash)");
                return Ok(GpuBackend::Vulkan(backend));
            }
            Err(e) => {
                log::warn!("Failed to create Vulkan backend: {}", e);
            }
        }
    }

    // Fall back to dummy backend
    log::info!("Using dummy backend");
    Ok(GpuBackend::Dummy(DummyBackend::new()))
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "vulkan-backend")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_without_features() {
        let backend = create_backend().unwrap();
        if !has_gpu_backend() {
            assert!(backend.as_dummy().is_some());
        }
        assert!(!backend.name().is_empty());
    }

    #[test]
    fn test_semaphore_kind_roundtrip() {
        let backend = GpuBackend::Dummy(DummyBackend::new());
        let timeline = backend
            .create_semaphore(SemaphoreKind::Timeline { initial: 7 })
            .unwrap();
        assert_eq!(timeline.kind(), SemaphoreKind::Timeline { initial: 7 });
        assert_eq!(backend.semaphore_value(&timeline).unwrap(), 7);
    }
}
