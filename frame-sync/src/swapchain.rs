//! Swapchain management.
//!
//! A [`Swapchain`] owns the presentable images of one surface. The frame
//! manager acquires one image per frame, copies the caller's final image into
//! it and presents it.
//!
//! # Example
//!
//! ```
//! use redlilium_frame_sync::{GraphicsDevice, SurfaceTarget, SwapchainDescriptor, PresentMode};
//!
//! let device = GraphicsDevice::dummy();
//! let swapchain = device
//!     .create_swapchain(
//!         SurfaceTarget::Headless,
//!         &SwapchainDescriptor::new(1280, 720).with_present_mode(PresentMode::Mailbox),
//!     )
//!     .unwrap();
//! assert_eq!(swapchain.image_count(), 3);
//! ```

use std::sync::Arc;

use crate::backend::{GpuSwapchain, SurfaceTarget};
use crate::resources::Image;
use crate::types::{ImageFormat, ImageUsage};

/// Presentation mode for the swapchain.
///
/// Controls how frames are synchronized with the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentMode {
    /// No synchronization. May cause tearing but has lowest latency.
    Immediate,
    /// Triple buffering. Low latency without tearing.
    Mailbox,
    /// VSync enabled. No tearing, but may have higher latency.
    #[default]
    Fifo,
    /// VSync with relaxed timing. May tear if a frame is late.
    FifoRelaxed,
}

/// Configuration for a swapchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainDescriptor {
    /// Width of the surface in pixels.
    pub width: u32,
    /// Height of the surface in pixels.
    pub height: u32,
    /// The image format for the swapchain.
    pub format: ImageFormat,
    /// Requested number of images; the backend may clamp it.
    pub image_count: u32,
    /// Presentation mode (vsync behavior).
    pub present_mode: PresentMode,
}

impl SwapchainDescriptor {
    /// Create a new swapchain descriptor.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: ImageFormat::Bgra8Unorm,
            image_count: 3,
            present_mode: PresentMode::default(),
        }
    }

    /// Set the image format.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the requested image count.
    pub fn with_image_count(mut self, count: u32) -> Self {
        self.image_count = count;
        self
    }

    /// Set the present mode.
    pub fn with_present_mode(mut self, present_mode: PresentMode) -> Self {
        self.present_mode = present_mode;
        self
    }
}

/// Images usable by presentation, as created by every backend.
pub(crate) const SWAPCHAIN_IMAGE_USAGE: ImageUsage =
    ImageUsage::COPY_DST.union(ImageUsage::COLOR_ATTACHMENT);

/// The presentable images of one surface.
pub struct Swapchain {
    gpu: GpuSwapchain,
    target: SurfaceTarget,
    images: Vec<Arc<Image>>,
    descriptor: SwapchainDescriptor,
}

impl Swapchain {
    pub(crate) fn new(
        gpu: GpuSwapchain,
        target: SurfaceTarget,
        images: Vec<Arc<Image>>,
        descriptor: SwapchainDescriptor,
    ) -> Self {
        Self {
            gpu,
            target,
            images,
            descriptor,
        }
    }

    /// The descriptor the swapchain was created with.
    pub fn descriptor(&self) -> &SwapchainDescriptor {
        &self.descriptor
    }

    /// Number of presentable images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// The presentable image at `index`.
    pub fn image(&self, index: u32) -> Option<&Arc<Image>> {
        self.images.get(index as usize)
    }

    /// All presentable images.
    pub fn images(&self) -> &[Arc<Image>] {
        &self.images
    }

    /// The surface this swapchain presents to.
    pub fn target(&self) -> &SurfaceTarget {
        &self.target
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub(crate) fn gpu(&self) -> &GpuSwapchain {
        &self.gpu
    }
}

impl std::fmt::Debug for Swapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("width", &self.descriptor.width)
            .field("height", &self.descriptor.height)
            .field("format", &self.descriptor.format)
            .field("images", &self.images.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let desc = SwapchainDescriptor::new(800, 600);
        assert_eq!(desc.format, ImageFormat::Bgra8Unorm);
        assert_eq!(desc.image_count, 3);
        assert_eq!(desc.present_mode, PresentMode::Fifo);
    }
}
