//! Image types and descriptors.

use super::{Extent3d, Offset3d};
use bitflags::bitflags;

/// Image format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ImageFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 8-bit BGRA channels, sRGB.
    Bgra8UnormSrgb,
    /// 32-bit RGBA channels, float.
    Rgba32Float,

    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
    /// 32-bit depth float with 8-bit stencil.
    Depth32FloatStencil8,
}

impl ImageFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24PlusStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }

    /// Aspects addressed by barriers on images of this format.
    pub fn aspects(&self) -> ImageAspect {
        if self.has_stencil() {
            ImageAspect::DEPTH | ImageAspect::STENCIL
        } else if self.is_depth_stencil() {
            ImageAspect::DEPTH
        } else {
            ImageAspect::COLOR
        }
    }

    /// Returns the size in bytes per texel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Usage flags for images.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        /// Image can be copied from.
        const COPY_SRC = 1 << 0;
        /// Image can be copied to.
        const COPY_DST = 1 << 1;
        /// Image can be sampled in a shader.
        const SAMPLED = 1 << 2;
        /// Image can be used as a storage image.
        const STORAGE = 1 << 3;
        /// Image can be used as a color attachment.
        const COLOR_ATTACHMENT = 1 << 4;
        /// Image can be used as a depth/stencil attachment.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

impl Default for ImageUsage {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Aspects of an image addressed by a barrier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Memory layout of an image, as required by the operations that touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    /// Contents are undefined; a transition from here may discard data.
    #[default]
    Undefined,
    /// Usable by every operation, typically for storage images.
    General,
    ColorAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    DepthStencilReadOnlyOptimal,
    /// Sampled or input-attachment reads.
    ReadOnlyOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    /// Ready for the presentation engine.
    PresentSrc,
}

/// Descriptor for creating an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    /// Debug label for the image.
    pub label: Option<String>,
    /// Size of the image.
    pub size: Extent3d,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Array layer count.
    pub array_layer_count: u32,
    /// Image format.
    pub format: ImageFormat,
    /// Usage flags.
    pub usage: ImageUsage,
}

impl ImageDescriptor {
    /// Create a new 2D image descriptor.
    pub fn new_2d(width: u32, height: u32, format: ImageFormat, usage: ImageUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            mip_level_count: 1,
            array_layer_count: 1,
            format,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Set the array layer count.
    pub fn with_array_layers(mut self, count: u32) -> Self {
        self.array_layer_count = count;
        self
    }

    /// Bytes needed to hold the base mip level of the first layer, tightly packed.
    pub fn base_level_size(&self) -> u64 {
        self.size.texel_count() * self.format.block_size() as u64
    }
}

impl Default for ImageDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            size: Extent3d::default(),
            mip_level_count: 1,
            array_layer_count: 1,
            format: ImageFormat::default(),
            usage: ImageUsage::empty(),
        }
    }
}

/// A buffer-to-image (or image-to-buffer) copy region on the base mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferImageCopy {
    /// Offset into the buffer.
    pub buffer_offset: u64,
    /// Texel offset into the image.
    pub image_offset: Offset3d,
    /// Texel extent of the region.
    pub image_extent: Extent3d,
}

impl BufferImageCopy {
    /// Copy the entire base level of an image, tightly packed at buffer offset 0.
    pub fn whole(extent: Extent3d) -> Self {
        Self {
            buffer_offset: 0,
            image_offset: Offset3d::ZERO,
            image_extent: extent,
        }
    }
}

/// An image-to-image copy region on the base mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImageCopy {
    pub src_offset: Offset3d,
    pub dst_offset: Offset3d,
    pub extent: Extent3d,
}
