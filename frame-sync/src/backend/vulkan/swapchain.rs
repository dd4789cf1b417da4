//! Vulkan surfaces and swapchains.

use ash::vk;

use super::conversion::{
    convert_image_format, convert_image_usage, convert_present_mode, image_format_from_vk,
    present_mode_from_vk,
};
use super::{VulkanBackend, map_vk_error};
use crate::error::GraphicsError;
use crate::swapchain::{SWAPCHAIN_IMAGE_USAGE, SwapchainDescriptor};

/// A presentation surface. Must be dropped before the backend that created it.
pub struct VulkanSurface {
    pub(crate) surface: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl VulkanSurface {
    pub(crate) fn new(surface: vk::SurfaceKHR, loader: ash::khr::surface::Instance) -> Self {
        Self { surface, loader }
    }
}

impl std::fmt::Debug for VulkanSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanSurface")
            .field("surface", &self.surface)
            .finish()
    }
}

impl Drop for VulkanSurface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.surface, None) };
    }
}

/// A swapchain and the loader needed to drive it.
pub struct VulkanSwapchain {
    pub(crate) swapchain: vk::SwapchainKHR,
    pub(crate) loader: ash::khr::swapchain::Device,
    pub(crate) format: vk::Format,
    pub(crate) extent: vk::Extent2D,
}

impl VulkanSwapchain {
    /// Create a swapchain for `surface`, clamping the descriptor to what the
    /// surface supports. Returns the swapchain, its images and the applied descriptor.
    pub fn new(
        backend: &VulkanBackend,
        surface: vk::SurfaceKHR,
        descriptor: &SwapchainDescriptor,
        old: Option<&VulkanSwapchain>,
    ) -> Result<(Self, Vec<vk::Image>, SwapchainDescriptor), GraphicsError> {
        let surface_loader = backend.surface_loader();
        let physical_device = backend.physical_device();

        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)
        }
        .map_err(|e| map_vk_error(e, "query surface capabilities"))?;
        let formats =
            unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface) }
                .map_err(|e| map_vk_error(e, "query surface formats"))?;
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)
        }
        .map_err(|e| map_vk_error(e, "query present modes"))?;

        let wanted_format = convert_image_format(descriptor.format);
        let surface_format = formats
            .iter()
            .find(|f| f.format == wanted_format)
            .or_else(|| {
                formats
                    .iter()
                    .find(|f| image_format_from_vk(f.format).is_some())
            })
            .copied()
            .ok_or_else(|| {
                GraphicsError::FeatureNotSupported(
                    "surface offers no RGBA8 or BGRA8 format".to_string(),
                )
            })?;
        let applied_format =
            image_format_from_vk(surface_format.format).unwrap_or(descriptor.format);
        if applied_format != descriptor.format {
            log::warn!(
                "Swapchain format {:?} unsupported, using {:?}",
                descriptor.format,
                applied_format
            );
        }

        let wanted_mode = convert_present_mode(descriptor.present_mode);
        let present_mode = if present_modes.contains(&wanted_mode) {
            wanted_mode
        } else {
            vk::PresentModeKHR::FIFO
        };

        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: descriptor.width.clamp(
                    capabilities.min_image_extent.width,
                    capabilities.max_image_extent.width,
                ),
                height: descriptor.height.clamp(
                    capabilities.min_image_extent.height,
                    capabilities.max_image_extent.height,
                ),
            }
        };
        if extent.width == 0 || extent.height == 0 {
            return Err(GraphicsError::SurfaceOutdated);
        }

        let max_images = if capabilities.max_image_count == 0 {
            u32::MAX
        } else {
            capabilities.max_image_count
        };
        let image_count = descriptor
            .image_count
            .clamp(capabilities.min_image_count, max_images);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(convert_image_usage(SWAPCHAIN_IMAGE_USAGE))
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or(vk::SwapchainKHR::null(), |old| old.swapchain));

        let loader = backend.swapchain_loader().clone();
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(|e| map_vk_error(e, "create swapchain"))?;
        let swapchain = Self {
            swapchain,
            loader,
            format: surface_format.format,
            extent,
        };
        let images = unsafe { swapchain.loader.get_swapchain_images(swapchain.swapchain) }
            .map_err(|e| map_vk_error(e, "get swapchain images"))?;

        let applied = SwapchainDescriptor {
            width: extent.width,
            height: extent.height,
            format: applied_format,
            image_count: images.len() as u32,
            present_mode: present_mode_from_vk(present_mode),
        };
        log::info!(
            "Created Vulkan swapchain {}x{} ({:?}, {:?}, {} images)",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            images.len()
        );
        Ok((swapchain, images, applied))
    }
}

impl std::fmt::Debug for VulkanSwapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanSwapchain")
            .field("swapchain", &self.swapchain)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .finish()
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_swapchain(self.swapchain, None) };
    }
}
