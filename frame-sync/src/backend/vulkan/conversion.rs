//! Conversions from frame-core types to Vulkan types.

use ash::vk;

use crate::access::{AccessFlags, AccessScope, PipelineStages};
use crate::swapchain::PresentMode;
use crate::types::{BufferUsage, ImageAspect, ImageFormat, ImageLayout, ImageUsage};

pub fn convert_buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    const TABLE: [(BufferUsage, vk::BufferUsageFlags); 7] = [
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::INDIRECT, vk::BufferUsageFlags::INDIRECT_BUFFER),
        (BufferUsage::COPY_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::COPY_DST, vk::BufferUsageFlags::TRANSFER_DST),
    ];
    // MAP_READ / MAP_WRITE select the memory location instead.
    TABLE
        .iter()
        .filter(|(ours, _)| usage.contains(*ours))
        .fold(vk::BufferUsageFlags::empty(), |acc, (_, vk_flag)| {
            acc | *vk_flag
        })
}

pub fn convert_image_usage(usage: ImageUsage) -> vk::ImageUsageFlags {
    const TABLE: [(ImageUsage, vk::ImageUsageFlags); 6] = [
        (ImageUsage::COPY_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
        (ImageUsage::COPY_DST, vk::ImageUsageFlags::TRANSFER_DST),
        (ImageUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (ImageUsage::STORAGE, vk::ImageUsageFlags::STORAGE),
        (ImageUsage::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (
            ImageUsage::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        ),
    ];
    TABLE
        .iter()
        .filter(|(ours, _)| usage.contains(*ours))
        .fold(vk::ImageUsageFlags::empty(), |acc, (_, vk_flag)| {
            acc | *vk_flag
        })
}

pub fn convert_image_format(format: ImageFormat) -> vk::Format {
    match format {
        ImageFormat::R8Unorm => vk::Format::R8_UNORM,
        ImageFormat::Rg8Unorm => vk::Format::R8G8_UNORM,
        ImageFormat::R32Float => vk::Format::R32_SFLOAT,
        ImageFormat::R32Uint => vk::Format::R32_UINT,
        ImageFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        ImageFormat::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        ImageFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        ImageFormat::Bgra8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        ImageFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        ImageFormat::Depth16Unorm => vk::Format::D16_UNORM,
        ImageFormat::Depth24PlusStencil8 => vk::Format::D24_UNORM_S8_UINT,
        ImageFormat::Depth32Float => vk::Format::D32_SFLOAT,
        ImageFormat::Depth32FloatStencil8 => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// The frame-core format of a surface format, if it has one.
pub fn image_format_from_vk(format: vk::Format) -> Option<ImageFormat> {
    Some(match format {
        vk::Format::R8G8B8A8_UNORM => ImageFormat::Rgba8Unorm,
        vk::Format::R8G8B8A8_SRGB => ImageFormat::Rgba8UnormSrgb,
        vk::Format::B8G8R8A8_UNORM => ImageFormat::Bgra8Unorm,
        vk::Format::B8G8R8A8_SRGB => ImageFormat::Bgra8UnormSrgb,
        _ => return None,
    })
}

pub fn convert_image_layout(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachmentOptimal => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachmentOptimal => {
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        }
        ImageLayout::DepthStencilReadOnlyOptimal => {
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        }
        ImageLayout::ReadOnlyOptimal => vk::ImageLayout::READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrcOptimal => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDstOptimal => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn convert_aspect(aspect: ImageAspect) -> vk::ImageAspectFlags {
    let mut flags = vk::ImageAspectFlags::empty();
    if aspect.contains(ImageAspect::COLOR) {
        flags |= vk::ImageAspectFlags::COLOR;
    }
    if aspect.contains(ImageAspect::DEPTH) {
        flags |= vk::ImageAspectFlags::DEPTH;
    }
    if aspect.contains(ImageAspect::STENCIL) {
        flags |= vk::ImageAspectFlags::STENCIL;
    }
    flags
}

pub fn convert_stages(stages: PipelineStages) -> vk::PipelineStageFlags2 {
    use vk::PipelineStageFlags2 as S;
    const TABLE: [(PipelineStages, vk::PipelineStageFlags2); 14] = [
        (PipelineStages::TOP_OF_PIPE, S::TOP_OF_PIPE),
        (PipelineStages::DRAW_INDIRECT, S::DRAW_INDIRECT),
        (PipelineStages::VERTEX_INPUT, S::VERTEX_INPUT),
        (PipelineStages::VERTEX_SHADER, S::VERTEX_SHADER),
        (PipelineStages::FRAGMENT_SHADER, S::FRAGMENT_SHADER),
        (PipelineStages::EARLY_FRAGMENT_TESTS, S::EARLY_FRAGMENT_TESTS),
        (PipelineStages::LATE_FRAGMENT_TESTS, S::LATE_FRAGMENT_TESTS),
        (PipelineStages::COLOR_ATTACHMENT_OUTPUT, S::COLOR_ATTACHMENT_OUTPUT),
        (PipelineStages::COMPUTE_SHADER, S::COMPUTE_SHADER),
        (PipelineStages::ALL_TRANSFER, S::ALL_TRANSFER),
        (PipelineStages::BOTTOM_OF_PIPE, S::BOTTOM_OF_PIPE),
        (PipelineStages::HOST, S::HOST),
        (PipelineStages::ALL_GRAPHICS, S::ALL_GRAPHICS),
        (PipelineStages::ALL_COMMANDS, S::ALL_COMMANDS),
    ];
    TABLE
        .iter()
        .filter(|(ours, _)| stages.contains(*ours))
        .fold(S::NONE, |acc, (_, vk_flag)| acc | *vk_flag)
}

pub fn convert_access(access: AccessFlags) -> vk::AccessFlags2 {
    use vk::AccessFlags2 as A;
    const TABLE: [(AccessFlags, vk::AccessFlags2); 15] = [
        (AccessFlags::INDIRECT_COMMAND_READ, A::INDIRECT_COMMAND_READ),
        (AccessFlags::INDEX_READ, A::INDEX_READ),
        (AccessFlags::VERTEX_ATTRIBUTE_READ, A::VERTEX_ATTRIBUTE_READ),
        (AccessFlags::UNIFORM_READ, A::UNIFORM_READ),
        (AccessFlags::SHADER_READ, A::SHADER_READ),
        (AccessFlags::COLOR_ATTACHMENT_READ, A::COLOR_ATTACHMENT_READ),
        (AccessFlags::COLOR_ATTACHMENT_WRITE, A::COLOR_ATTACHMENT_WRITE),
        (AccessFlags::DEPTH_STENCIL_READ, A::DEPTH_STENCIL_ATTACHMENT_READ),
        (AccessFlags::DEPTH_STENCIL_WRITE, A::DEPTH_STENCIL_ATTACHMENT_WRITE),
        (AccessFlags::TRANSFER_READ, A::TRANSFER_READ),
        (AccessFlags::TRANSFER_WRITE, A::TRANSFER_WRITE),
        (AccessFlags::HOST_READ, A::HOST_READ),
        (AccessFlags::HOST_WRITE, A::HOST_WRITE),
        (AccessFlags::SHADER_STORAGE_READ, A::SHADER_STORAGE_READ),
        (AccessFlags::SHADER_STORAGE_WRITE, A::SHADER_STORAGE_WRITE),
    ];
    TABLE
        .iter()
        .filter(|(ours, _)| access.contains(*ours))
        .fold(A::NONE, |acc, (_, vk_flag)| acc | *vk_flag)
}

/// Stage and access masks of one side of a barrier.
pub fn convert_scope(scope: AccessScope) -> (vk::PipelineStageFlags2, vk::AccessFlags2) {
    (convert_stages(scope.stages), convert_access(scope.access))
}

pub fn convert_present_mode(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

pub fn present_mode_from_vk(mode: vk::PresentModeKHR) -> PresentMode {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => PresentMode::Immediate,
        vk::PresentModeKHR::MAILBOX => PresentMode::Mailbox,
        vk::PresentModeKHR::FIFO_RELAXED => PresentMode::FifoRelaxed,
        _ => PresentMode::Fifo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessKind, AccessMapper};

    #[test]
    fn test_scope_conversion() {
        let (stages, access) =
            convert_scope(AccessMapper::resolve(AccessKind::ColorAttachmentWrite));
        assert_eq!(stages, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(
            access,
            vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
        );
        assert_eq!(
            convert_scope(AccessScope::UNDEFINED),
            (vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE)
        );
    }

    #[test]
    fn test_swapchain_format_round_trip() {
        for format in [ImageFormat::Bgra8Unorm, ImageFormat::Rgba8UnormSrgb] {
            assert_eq!(
                image_format_from_vk(convert_image_format(format)),
                Some(format)
            );
        }
        assert_eq!(image_format_from_vk(vk::Format::D32_SFLOAT), None);
    }
}
