//! Graphics device.
//!
//! The [`GraphicsDevice`] is the explicit context every frame-core component
//! is constructed with. It owns the active [`GpuBackend`] and creates the
//! buffers, images and swapchains the core synchronizes.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::backend::{self, GpuBackend, SurfaceTarget};
use crate::backend::dummy::DummyBackend;
use crate::error::GraphicsError;
use crate::resources::{Buffer, Image};
use crate::swapchain::{SWAPCHAIN_IMAGE_USAGE, Swapchain, SwapchainDescriptor};
use crate::types::{BufferDescriptor, ImageDescriptor};

/// Limits of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum image dimension.
    pub max_image_dimension: u32,
    /// Maximum buffer size.
    pub max_buffer_size: u64,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_image_dimension: 16384,
            max_buffer_size: 1 << 30, // 1 GB
        }
    }
}

/// A graphics device for creating GPU resources.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync` and can be safely shared across threads.
///
/// # Example
///
/// ```
/// use redlilium_frame_sync::{BufferDescriptor, BufferUsage, GraphicsDevice};
///
/// let device = GraphicsDevice::dummy();
/// let buffer = device
///     .create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX | BufferUsage::COPY_DST))
///     .unwrap();
/// assert_eq!(buffer.size(), 1024);
/// ```
pub struct GraphicsDevice {
    backend: GpuBackend,
    capabilities: DeviceCapabilities,
    // Track allocated resources (weak references for leak diagnostics)
    buffers: RwLock<Vec<Weak<Buffer>>>,
    images: RwLock<Vec<Weak<Image>>>,
}

impl GraphicsDevice {
    /// Create a device over an explicit backend.
    pub fn new(backend: GpuBackend) -> Arc<Self> {
        log::info!("GraphicsDevice: created on {}", backend.name());
        Arc::new(Self {
            backend,
            capabilities: DeviceCapabilities::default(),
            buffers: RwLock::new(Vec::new()),
            images: RwLock::new(Vec::new()),
        })
    }

    /// Create a device over the simulated backend.
    pub fn dummy() -> Arc<Self> {
        Self::new(GpuBackend::Dummy(DummyBackend::new()))
    }

    /// Create a device over the best available backend.
    pub fn with_default_backend() -> Result<Arc<Self>, GraphicsError> {
        Ok(Self::new(backend::create_backend()?))
    }

    /// Get the backend.
    pub fn backend(&self) -> &GpuBackend {
        &self.backend
    }

    /// Get the backend name.
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Get the device capabilities.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Create a GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer size exceeds device limits or allocation fails.
    pub fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        // Validate
        if descriptor.size > self.capabilities.max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                descriptor.size, self.capabilities.max_buffer_size
            )));
        }

        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let gpu = self.backend.create_buffer(descriptor)?;
        let buffer = Arc::new(Buffer::new(descriptor.clone(), gpu));

        // Track it, dropping entries for buffers that are gone
        let mut buffers = self.buffers.write();
        buffers.retain(|b| b.strong_count() > 0);
        buffers.push(Arc::downgrade(&buffer));
        drop(buffers);

        log::trace!(
            "GraphicsDevice: created buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );

        Ok(buffer)
    }

    /// Create a GPU image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image dimensions exceed device limits or allocation fails.
    pub fn create_image(&self, descriptor: &ImageDescriptor) -> Result<Arc<Image>, GraphicsError> {
        // Validate
        let max_dim = self.capabilities.max_image_dimension;
        if descriptor.size.width > max_dim
            || descriptor.size.height > max_dim
            || descriptor.size.depth > max_dim
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "image dimension exceeds maximum {max_dim}"
            )));
        }

        if descriptor.size.width == 0 || descriptor.size.height == 0 || descriptor.size.depth == 0
        {
            return Err(GraphicsError::InvalidParameter(
                "image dimensions cannot be zero".to_string(),
            ));
        }

        let gpu = self.backend.create_image(descriptor)?;
        let image = Arc::new(Image::new(descriptor.clone(), gpu));

        // Track it, dropping entries for images that are gone
        let mut images = self.images.write();
        images.retain(|i| i.strong_count() > 0);
        images.push(Arc::downgrade(&image));
        drop(images);

        log::trace!(
            "GraphicsDevice: created image {:?}, size={}x{}",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height
        );

        Ok(image)
    }

    /// Create a swapchain presenting to `target`.
    pub fn create_swapchain(
        &self,
        target: SurfaceTarget,
        descriptor: &SwapchainDescriptor,
    ) -> Result<Swapchain, GraphicsError> {
        self.build_swapchain(target, descriptor, None)
    }

    /// Create a replacement for `old` with new dimensions, retiring it.
    ///
    /// The caller must make sure no frame still uses `old`, e.g. with
    /// [`FrameManager::wait_idle`](crate::FrameManager::wait_idle).
    pub fn recreate_swapchain(
        &self,
        old: &Swapchain,
        descriptor: &SwapchainDescriptor,
    ) -> Result<Swapchain, GraphicsError> {
        self.build_swapchain(old.target().clone(), descriptor, Some(old))
    }

    fn build_swapchain(
        &self,
        target: SurfaceTarget,
        descriptor: &SwapchainDescriptor,
        old: Option<&Swapchain>,
    ) -> Result<Swapchain, GraphicsError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "swapchain dimensions cannot be zero".to_string(),
            ));
        }

        let (gpu, gpu_images, applied) =
            self.backend
                .create_swapchain(&target, descriptor, old.map(Swapchain::gpu))?;

        let images = gpu_images
            .into_iter()
            .enumerate()
            .map(|(i, gpu)| {
                let image_desc = ImageDescriptor::new_2d(
                    applied.width,
                    applied.height,
                    applied.format,
                    SWAPCHAIN_IMAGE_USAGE,
                )
                .with_label(format!("swapchain image {i}"));
                Arc::new(Image::new(image_desc, gpu))
            })
            .collect::<Vec<_>>();

        log::info!(
            "GraphicsDevice: {} swapchain {}x{} ({:?}, {} images)",
            if old.is_some() { "recreated" } else { "created" },
            applied.width,
            applied.height,
            applied.format,
            images.len()
        );

        Ok(Swapchain::new(gpu, target, images, applied))
    }

    /// Write host data into a host-visible buffer.
    pub fn write_buffer(
        &self,
        buffer: &Buffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        self.backend.write_buffer(buffer.gpu(), offset, data)
    }

    /// Read bytes back from a host-visible buffer.
    pub fn read_buffer(
        &self,
        buffer: &Buffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        self.backend.read_buffer(buffer.gpu(), offset, size)
    }

    /// Block until the GPU is idle.
    pub fn wait_idle(&self) -> Result<(), GraphicsError> {
        self.backend.wait_idle()
    }

    /// Number of buffers created by this device that are still alive.
    pub fn live_buffer_count(&self) -> usize {
        let mut buffers = self.buffers.write();
        buffers.retain(|b| b.strong_count() > 0);
        buffers.len()
    }

    /// Number of images created by this device that are still alive.
    pub fn live_image_count(&self) -> usize {
        let mut images = self.images.write();
        images.retain(|i| i.strong_count() > 0);
        images.len()
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("backend", &self.backend.name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, ImageFormat, ImageUsage};

    #[test]
    fn test_create_buffer() {
        let device = GraphicsDevice::dummy();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))
            .unwrap();
        assert_eq!(buffer.size(), 1024);
        assert_eq!(device.live_buffer_count(), 1);
        drop(buffer);
        assert_eq!(device.live_buffer_count(), 0);
    }

    #[test]
    fn test_registry_does_not_grow_with_short_lived_resources() {
        let device = GraphicsDevice::dummy();
        let kept = device
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::STORAGE))
            .unwrap();
        for _ in 0..1000 {
            let staging = device
                .create_buffer(&BufferDescriptor::new(64, BufferUsage::COPY_SRC))
                .unwrap();
            drop(staging);
            let image = device
                .create_image(&ImageDescriptor::new_2d(
                    4,
                    4,
                    ImageFormat::Rgba8Unorm,
                    ImageUsage::COPY_SRC,
                ))
                .unwrap();
            drop(image);
        }
        assert!(device.buffers.read().len() <= 2);
        assert!(device.images.read().len() <= 1);
        assert_eq!(device.live_buffer_count(), 1);
        drop(kept);
    }

    #[test]
    fn test_create_buffer_zero_size() {
        let device = GraphicsDevice::dummy();
        let result = device.create_buffer(&BufferDescriptor::new(0, BufferUsage::VERTEX));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_create_image_too_large() {
        let device = GraphicsDevice::dummy();
        let result = device.create_image(&ImageDescriptor::new_2d(
            20000,
            20000,
            ImageFormat::Rgba8Unorm,
            ImageUsage::SAMPLED,
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_swapchain_images() {
        let device = GraphicsDevice::dummy();
        let swapchain = device
            .create_swapchain(SurfaceTarget::Headless, &SwapchainDescriptor::new(64, 32))
            .unwrap();
        assert_eq!(swapchain.image_count(), 3);
        let image = swapchain.image(0).unwrap();
        assert_eq!((image.width(), image.height()), (64, 32));
        assert_eq!(image.format(), ImageFormat::Bgra8Unorm);

        let resized = device
            .recreate_swapchain(&swapchain, &SwapchainDescriptor::new(128, 64))
            .unwrap();
        assert_eq!(resized.width(), 128);
    }
}
