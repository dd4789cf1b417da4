//! Command pool creation and translation of [`CommandList`]s into Vulkan
//! command buffers.

use std::ffi::CString;

use ash::vk;

use crate::access::Barrier;
use crate::backend::{GpuBuffer, GpuImage};
use crate::command::{Command, CommandList};
use crate::error::GraphicsError;
use crate::resources::{Buffer, Image};
use crate::types::{BufferImageCopy, ImageAspect, Offset3d};

use super::conversion::{convert_aspect, convert_image_layout, convert_scope};

/// Create a pool whose buffers can be reset individually.
pub fn create_command_pool(
    device: &ash::Device,
    queue_family_index: u32,
) -> Result<vk::CommandPool, GraphicsError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create command pool: {:?}", e))
    })
}

fn buffer_handle(buffer: &Buffer) -> Result<vk::Buffer, GraphicsError> {
    match buffer.gpu() {
        GpuBuffer::Vulkan { buffer, .. } => Ok(*buffer),
        _ => Err(GraphicsError::InvalidParameter(format!(
            "buffer {:?} was not created by the Vulkan backend",
            buffer.label()
        ))),
    }
}

fn image_handle(image: &Image) -> Result<vk::Image, GraphicsError> {
    match image.gpu() {
        GpuImage::Vulkan { image, .. } => Ok(*image),
        _ => Err(GraphicsError::InvalidParameter(format!(
            "image {:?} was not created by the Vulkan backend",
            image.label()
        ))),
    }
}

fn offset(offset: Offset3d) -> vk::Offset3D {
    vk::Offset3D {
        x: offset.x as i32,
        y: offset.y as i32,
        z: offset.z as i32,
    }
}

/// Base level, first layer. Copies address the depth aspect of depth/stencil formats.
fn copy_layers(image: &Image) -> vk::ImageSubresourceLayers {
    let aspect = if image.format().is_depth_stencil() {
        ImageAspect::DEPTH
    } else {
        ImageAspect::COLOR
    };
    vk::ImageSubresourceLayers {
        aspect_mask: convert_aspect(aspect),
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn whole_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: vk::REMAINING_ARRAY_LAYERS,
    }
}

fn buffer_image_copy(image: &Image, region: &BufferImageCopy) -> vk::BufferImageCopy {
    vk::BufferImageCopy {
        buffer_offset: region.buffer_offset,
        // Zero means tightly packed.
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: copy_layers(image),
        image_offset: offset(region.image_offset),
        image_extent: vk::Extent3D {
            width: region.image_extent.width,
            height: region.image_extent.height,
            depth: region.image_extent.depth,
        },
    }
}

/// Translates recorded commands into one command buffer.
pub struct CommandTranslator<'a> {
    pub device: &'a ash::Device,
    pub debug_utils: Option<&'a ash::ext::debug_utils::Device>,
    pub cmd: vk::CommandBuffer,
}

impl CommandTranslator<'_> {
    /// Reset, record and close the command buffer.
    pub fn record(&self, list: &CommandList) -> Result<(), GraphicsError> {
        unsafe {
            self.device
                .reset_command_buffer(self.cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| {
                    GraphicsError::Internal(format!("Failed to reset command buffer: {:?}", e))
                })?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device
                .begin_command_buffer(self.cmd, &begin_info)
                .map_err(|e| {
                    GraphicsError::Internal(format!("Failed to begin command buffer: {:?}", e))
                })?;
        }

        for command in list.commands() {
            self.translate(command)?;
        }

        unsafe { self.device.end_command_buffer(self.cmd) }.map_err(|e| {
            GraphicsError::Internal(format!("Failed to end command buffer: {:?}", e))
        })
    }

    fn translate(&self, command: &Command) -> Result<(), GraphicsError> {
        let device = self.device;
        let cmd = self.cmd;
        match command {
            Command::PipelineBarrier(barriers) => self.pipeline_barrier(barriers)?,
            Command::CopyBuffer { src, dst, region } => {
                let copy = vk::BufferCopy {
                    src_offset: region.src_offset,
                    dst_offset: region.dst_offset,
                    size: region.size,
                };
                unsafe {
                    device.cmd_copy_buffer(cmd, buffer_handle(src)?, buffer_handle(dst)?, &[copy])
                };
            }
            Command::CopyBufferToImage { src, dst, region } => unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    buffer_handle(src)?,
                    image_handle(dst)?,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[buffer_image_copy(dst, region)],
                )
            },
            Command::CopyImageToBuffer { src, dst, region } => unsafe {
                device.cmd_copy_image_to_buffer(
                    cmd,
                    image_handle(src)?,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    buffer_handle(dst)?,
                    &[buffer_image_copy(src, region)],
                )
            },
            Command::CopyImage { src, dst, region } => {
                let copy = vk::ImageCopy {
                    src_subresource: copy_layers(src),
                    src_offset: offset(region.src_offset),
                    dst_subresource: copy_layers(dst),
                    dst_offset: offset(region.dst_offset),
                    extent: vk::Extent3D {
                        width: region.extent.width,
                        height: region.extent.height,
                        depth: region.extent.depth,
                    },
                };
                unsafe {
                    device.cmd_copy_image(
                        cmd,
                        image_handle(src)?,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        image_handle(dst)?,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[copy],
                    )
                };
            }
            Command::ClearColorImage { image, color } => {
                let value = vk::ClearColorValue { float32: *color };
                unsafe {
                    device.cmd_clear_color_image(
                        cmd,
                        image_handle(image)?,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &value,
                        &[whole_range(vk::ImageAspectFlags::COLOR)],
                    )
                };
            }
            Command::ClearDepthStencilImage {
                image,
                depth,
                stencil,
            } => {
                let value = vk::ClearDepthStencilValue {
                    depth: *depth,
                    stencil: *stencil,
                };
                unsafe {
                    device.cmd_clear_depth_stencil_image(
                        cmd,
                        image_handle(image)?,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &value,
                        &[whole_range(convert_aspect(image.format().aspects()))],
                    )
                };
            }
            Command::FillBuffer {
                dst,
                offset,
                size,
                value,
            } => unsafe {
                device.cmd_fill_buffer(cmd, buffer_handle(dst)?, *offset, *size, *value)
            },
            Command::BeginLabel(name) => {
                if let Some(debug_utils) = self.debug_utils {
                    let name = CString::new(name.replace('\0', "")).unwrap_or_default();
                    let label = vk::DebugUtilsLabelEXT::default().label_name(&name);
                    unsafe { debug_utils.cmd_begin_debug_utils_label(cmd, &label) };
                }
            }
            Command::EndLabel => {
                if let Some(debug_utils) = self.debug_utils {
                    unsafe { debug_utils.cmd_end_debug_utils_label(cmd) };
                }
            }
        }
        Ok(())
    }

    /// One `vkCmdPipelineBarrier2` for the whole set.
    fn pipeline_barrier(&self, barriers: &[Barrier]) -> Result<(), GraphicsError> {
        let mut image_barriers = Vec::new();
        let mut buffer_barriers = Vec::new();

        for barrier in barriers {
            let (src_stage, src_access) = convert_scope(barrier.src());
            let (dst_stage, dst_access) = convert_scope(barrier.dst());
            match barrier {
                Barrier::Image(image_barrier) => image_barriers.push(
                    vk::ImageMemoryBarrier2::default()
                        .src_stage_mask(src_stage)
                        .src_access_mask(src_access)
                        .dst_stage_mask(dst_stage)
                        .dst_access_mask(dst_access)
                        .old_layout(convert_image_layout(image_barrier.src.layout))
                        .new_layout(convert_image_layout(image_barrier.dst.layout))
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .image(image_handle(&image_barrier.image)?)
                        .subresource_range(whole_range(convert_aspect(image_barrier.aspect))),
                ),
                Barrier::Buffer(buffer_barrier) => buffer_barriers.push(
                    vk::BufferMemoryBarrier2::default()
                        .src_stage_mask(src_stage)
                        .src_access_mask(src_access)
                        .dst_stage_mask(dst_stage)
                        .dst_access_mask(dst_access)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .buffer(buffer_handle(&buffer_barrier.buffer)?)
                        .offset(0)
                        .size(vk::WHOLE_SIZE),
                ),
            }
        }

        let dependency = vk::DependencyInfo::default()
            .image_memory_barriers(&image_barriers)
            .buffer_memory_barriers(&buffer_barriers);
        unsafe { self.device.cmd_pipeline_barrier2(self.cmd, &dependency) };
        Ok(())
    }
}
