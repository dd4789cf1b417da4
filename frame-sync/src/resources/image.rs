//! GPU image resource.

use crate::backend::GpuImage;
use crate::types::{Extent3d, ImageDescriptor, ImageFormat, ImageUsage};

use super::ResourceId;

/// A GPU image resource.
///
/// Images are created by [`GraphicsDevice::create_image`](crate::GraphicsDevice::create_image)
/// or handed out by a [`Swapchain`](crate::Swapchain). The image does not remember its
/// current layout; layouts are tracked by whoever records barriers against it.
///
/// # Example
///
/// ```ignore
/// let image = device.create_image(&ImageDescriptor::new_2d(
///     1920, 1080,
///     ImageFormat::Rgba8Unorm,
///     ImageUsage::COLOR_ATTACHMENT | ImageUsage::COPY_SRC,
/// ))?;
/// println!("Image size: {}x{}", image.width(), image.height());
/// ```
pub struct Image {
    id: ResourceId,
    descriptor: ImageDescriptor,
    gpu: GpuImage,
}

impl Image {
    /// Create a new image (called by GraphicsDevice and swapchain creation).
    pub(crate) fn new(descriptor: ImageDescriptor, gpu: GpuImage) -> Self {
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

    /// Get the image descriptor.
    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// Get the image size.
    pub fn size(&self) -> Extent3d {
        self.descriptor.size
    }

    /// Get the image width.
    pub fn width(&self) -> u32 {
        self.descriptor.size.width
    }

    /// Get the image height.
    pub fn height(&self) -> u32 {
        self.descriptor.size.height
    }

    /// Get the image depth.
    pub fn depth(&self) -> u32 {
        self.descriptor.size.depth
    }

    /// Get the image format.
    pub fn format(&self) -> ImageFormat {
        self.descriptor.format
    }

    /// Get the usage flags.
    pub fn usage(&self) -> ImageUsage {
        self.descriptor.usage
    }

    /// Get the mip level count.
    pub fn mip_level_count(&self) -> u32 {
        self.descriptor.mip_level_count
    }

    /// Get the array layer count.
    pub fn array_layer_count(&self) -> u32 {
        self.descriptor.array_layer_count
    }

    /// Get the image label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    pub(crate) fn gpu(&self) -> &GpuImage {
        &self.gpu
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.id)
            .field("size", &self.descriptor.size)
            .field("format", &self.descriptor.format)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Image is Send + Sync
static_assertions::assert_impl_all!(Image: Send, Sync);
