//! Backend-neutral command recording.
//!
//! Work is recorded into a [`CommandList`] of [`Command`] values and translated
//! by the active backend when the list is submitted. A [`CommandContext`] wraps
//! a list with the capability set of the queue it will run on:
//!
//! | Operation | Graphics | Compute | Transfer |
//! |-----------|----------|---------|----------|
//! | barriers, copies, fills, labels | yes | yes | yes |
//! | `clear_color_image` | yes | yes | no |
//! | `clear_depth_stencil_image` | yes | no | no |

use std::sync::Arc;

use crate::access::Barrier;
use crate::resources::{Buffer, Image};
use crate::types::{BufferCopy, BufferImageCopy, ImageCopy, QueueKind};

/// A single recorded GPU command.
#[derive(Debug, Clone)]
pub enum Command {
    /// One pipeline barrier covering every listed resource.
    PipelineBarrier(Vec<Barrier>),
    CopyBuffer {
        src: Arc<Buffer>,
        dst: Arc<Buffer>,
        region: BufferCopy,
    },
    CopyBufferToImage {
        src: Arc<Buffer>,
        dst: Arc<Image>,
        region: BufferImageCopy,
    },
    CopyImageToBuffer {
        src: Arc<Image>,
        dst: Arc<Buffer>,
        region: BufferImageCopy,
    },
    CopyImage {
        src: Arc<Image>,
        dst: Arc<Image>,
        region: ImageCopy,
    },
    ClearColorImage {
        image: Arc<Image>,
        color: [f32; 4],
    },
    ClearDepthStencilImage {
        image: Arc<Image>,
        depth: f32,
        stencil: u32,
    },
    /// Fill `size` bytes at `offset` with the repeated 32-bit `value`.
    FillBuffer {
        dst: Arc<Buffer>,
        offset: u64,
        size: u64,
        value: u32,
    },
    BeginLabel(String),
    EndLabel,
}

/// An ordered list of recorded commands.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Remove every recorded command.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Total number of individual resource barriers recorded.
    pub fn barrier_count(&self) -> usize {
        self.commands
            .iter()
            .map(|command| match command {
                Command::PipelineBarrier(barriers) => barriers.len(),
                _ => 0,
            })
            .sum()
    }
}

/// A command list together with the capabilities of its target queue.
#[derive(Debug)]
pub enum CommandContext<'a> {
    Graphics(&'a mut CommandList),
    Compute(&'a mut CommandList),
    Transfer(&'a mut CommandList),
}

impl<'a> CommandContext<'a> {
    /// Wrap `list` in the context matching `queue`. Present work records as graphics.
    pub fn for_queue(queue: QueueKind, list: &'a mut CommandList) -> Self {
        match queue {
            QueueKind::Graphics | QueueKind::Present => Self::Graphics(list),
            QueueKind::Compute => Self::Compute(list),
            QueueKind::Transfer => Self::Transfer(list),
        }
    }

    /// The queue kind this context records for.
    pub fn queue_kind(&self) -> QueueKind {
        match self {
            Self::Graphics(_) => QueueKind::Graphics,
            Self::Compute(_) => QueueKind::Compute,
            Self::Transfer(_) => QueueKind::Transfer,
        }
    }

    /// The underlying command list.
    pub fn list(&mut self) -> &mut CommandList {
        match self {
            Self::Graphics(list) | Self::Compute(list) | Self::Transfer(list) => list,
        }
    }

    /// Record one pipeline barrier. An empty set records nothing.
    pub fn pipeline_barrier(&mut self, barriers: impl IntoIterator<Item = Barrier>) {
        let barriers: Vec<Barrier> = barriers.into_iter().collect();
        if !barriers.is_empty() {
            self.list().push(Command::PipelineBarrier(barriers));
        }
    }

    /// Copy bytes between buffers.
    ///
    /// # Panics
    ///
    /// Panics if the region is out of bounds of either buffer.
    pub fn copy_buffer(&mut self, src: &Arc<Buffer>, dst: &Arc<Buffer>, region: BufferCopy) {
        assert!(
            region.src_offset + region.size <= src.size()
                && region.dst_offset + region.size <= dst.size(),
            "buffer copy region {region:?} is out of bounds"
        );
        self.list().push(Command::CopyBuffer {
            src: Arc::clone(src),
            dst: Arc::clone(dst),
            region,
        });
    }

    /// Copy tightly packed texels from a buffer into an image.
    pub fn copy_buffer_to_image(
        &mut self,
        src: &Arc<Buffer>,
        dst: &Arc<Image>,
        region: BufferImageCopy,
    ) {
        assert_region_fits(src, dst, &region);
        self.list().push(Command::CopyBufferToImage {
            src: Arc::clone(src),
            dst: Arc::clone(dst),
            region,
        });
    }

    /// Copy texels from an image into a buffer, tightly packed.
    pub fn copy_image_to_buffer(
        &mut self,
        src: &Arc<Image>,
        dst: &Arc<Buffer>,
        region: BufferImageCopy,
    ) {
        assert_region_fits(dst, src, &region);
        self.list().push(Command::CopyImageToBuffer {
            src: Arc::clone(src),
            dst: Arc::clone(dst),
            region,
        });
    }

    /// Copy a region between two images of the same texel size.
    pub fn copy_image(&mut self, src: &Arc<Image>, dst: &Arc<Image>, region: ImageCopy) {
        assert_eq!(
            src.format().block_size(),
            dst.format().block_size(),
            "image copy between formats of different texel size"
        );
        let fits = |image: &Image, offset: crate::types::Offset3d| {
            offset.x + region.extent.width <= image.width()
                && offset.y + region.extent.height <= image.height()
                && offset.z + region.extent.depth <= image.depth()
        };
        assert!(
            fits(src, region.src_offset) && fits(dst, region.dst_offset),
            "image copy region {region:?} is out of bounds"
        );
        self.list().push(Command::CopyImage {
            src: Arc::clone(src),
            dst: Arc::clone(dst),
            region,
        });
    }

    /// Clear a color image.
    ///
    /// # Panics
    ///
    /// Panics on a transfer context or for depth/stencil images.
    pub fn clear_color_image(&mut self, image: &Arc<Image>, color: [f32; 4]) {
        assert!(
            !matches!(self, Self::Transfer(_)),
            "color clears are not supported on a transfer context"
        );
        assert!(
            !image.format().is_depth_stencil(),
            "color clear on depth/stencil image {:?}",
            image.label()
        );
        self.list().push(Command::ClearColorImage {
            image: Arc::clone(image),
            color,
        });
    }

    /// Clear a depth/stencil image.
    ///
    /// # Panics
    ///
    /// Panics on anything but a graphics context, or for color images.
    pub fn clear_depth_stencil_image(&mut self, image: &Arc<Image>, depth: f32, stencil: u32) {
        assert!(
            matches!(self, Self::Graphics(_)),
            "depth/stencil clears require a graphics context"
        );
        assert!(
            image.format().is_depth_stencil(),
            "depth/stencil clear on color image {:?}",
            image.label()
        );
        self.list().push(Command::ClearDepthStencilImage {
            image: Arc::clone(image),
            depth,
            stencil,
        });
    }

    /// Fill a buffer range with a repeated 32-bit value.
    pub fn fill_buffer(&mut self, dst: &Arc<Buffer>, offset: u64, size: u64, value: u32) {
        assert!(
            offset % 4 == 0 && size % 4 == 0 && offset + size <= dst.size(),
            "fill range {offset}+{size} is misaligned or out of bounds"
        );
        self.list().push(Command::FillBuffer {
            dst: Arc::clone(dst),
            offset,
            size,
            value,
        });
    }

    pub fn begin_label(&mut self, label: impl Into<String>) {
        self.list().push(Command::BeginLabel(label.into()));
    }

    pub fn end_label(&mut self) {
        self.list().push(Command::EndLabel);
    }
}

fn assert_region_fits(buffer: &Buffer, image: &Image, region: &BufferImageCopy) {
    let extent = region.image_extent;
    let offset = region.image_offset;
    assert!(
        offset.x + extent.width <= image.width()
            && offset.y + extent.height <= image.height()
            && offset.z + extent.depth <= image.depth(),
        "copy region {region:?} exceeds image {:?}",
        image.label()
    );
    let bytes = extent.texel_count() * image.format().block_size() as u64;
    assert!(
        region.buffer_offset + bytes <= buffer.size(),
        "buffer of {} bytes cannot hold {bytes} bytes at offset {}",
        buffer.size(),
        region.buffer_offset
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessKind;
    use crate::device::GraphicsDevice;
    use crate::types::{BufferDescriptor, BufferUsage, ImageDescriptor, ImageFormat, ImageUsage};

    fn color_image(device: &Arc<GraphicsDevice>) -> Arc<Image> {
        device
            .create_image(&ImageDescriptor::new_2d(
                4,
                4,
                ImageFormat::Rgba8Unorm,
                ImageUsage::COLOR_ATTACHMENT | ImageUsage::COPY_DST,
            ))
            .unwrap()
    }

    #[test]
    fn test_barrier_count() {
        let device = GraphicsDevice::dummy();
        let image = color_image(&device);
        let mut list = CommandList::new();
        let mut ctx = CommandContext::Graphics(&mut list);
        ctx.pipeline_barrier([
            Barrier::image(&image, AccessKind::Undefined, AccessKind::TransferWrite),
        ]);
        ctx.pipeline_barrier(Vec::new());
        ctx.clear_color_image(&image, [0.0; 4]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.barrier_count(), 1);
    }

    #[test]
    fn test_compute_context_can_clear_color() {
        let device = GraphicsDevice::dummy();
        let image = color_image(&device);
        let mut list = CommandList::new();
        CommandContext::Compute(&mut list).clear_color_image(&image, [1.0; 4]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    #[should_panic(expected = "not supported on a transfer context")]
    fn test_transfer_context_rejects_color_clear() {
        let device = GraphicsDevice::dummy();
        let image = color_image(&device);
        let mut list = CommandList::new();
        CommandContext::Transfer(&mut list).clear_color_image(&image, [1.0; 4]);
    }

    #[test]
    #[should_panic(expected = "require a graphics context")]
    fn test_compute_context_rejects_depth_clear() {
        let device = GraphicsDevice::dummy();
        let depth = device
            .create_image(&ImageDescriptor::new_2d(
                4,
                4,
                ImageFormat::Depth32Float,
                ImageUsage::DEPTH_STENCIL_ATTACHMENT,
            ))
            .unwrap();
        let mut list = CommandList::new();
        CommandContext::Compute(&mut list).clear_depth_stencil_image(&depth, 1.0, 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_copy_buffer_bounds() {
        let device = GraphicsDevice::dummy();
        let a = device
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::COPY_SRC))
            .unwrap();
        let b = device
            .create_buffer(&BufferDescriptor::new(8, BufferUsage::COPY_DST))
            .unwrap();
        let mut list = CommandList::new();
        CommandContext::Transfer(&mut list).copy_buffer(&a, &b, BufferCopy::whole(16));
    }

    #[test]
    fn test_for_queue() {
        let mut list = CommandList::new();
        assert_eq!(
            CommandContext::for_queue(QueueKind::Present, &mut list).queue_kind(),
            QueueKind::Graphics
        );
        assert_eq!(
            CommandContext::for_queue(QueueKind::Transfer, &mut list).queue_kind(),
            QueueKind::Transfer
        );
    }
}
