//! Descriptor types for the resources the frame core synchronizes.
//!
//! Collaborators describe buffers and images with these descriptors; the
//! core only relies on sizes, formats, aspects and usage flags.

mod buffer;
mod common;
mod image;

pub use buffer::{BufferCopy, BufferDescriptor, BufferUsage};
pub use common::{ClearValue, Extent3d, Offset3d, QueueKind};
pub use image::{
    BufferImageCopy, ImageAspect, ImageCopy, ImageDescriptor, ImageFormat, ImageLayout, ImageUsage,
};
