//! Vulkan backend implementation using ash.
//!
//! Requires Vulkan 1.3. Every submission goes to one queue from a family
//! that supports graphics, compute and transfer, and must also be able to
//! present to the surfaces the caller creates. Frame phases are tracked with
//! timeline semaphores; barriers and submissions use synchronization2.

mod allocator;
mod command;
mod conversion;
mod debug;
mod device;
mod instance;
pub mod swapchain;

use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme, Allocator};
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};

use super::{
    GpuBuffer, GpuCommandBuffer, GpuFence, GpuImage, GpuSemaphore, GpuSwapchain, SemaphoreKind,
    SemaphoreSubmit, SubmitInfo, SurfaceTarget,
};
use crate::error::GraphicsError;
use crate::swapchain::SwapchainDescriptor;
use crate::types::{BufferDescriptor, ImageDescriptor, QueueKind};

use self::command::CommandTranslator;
use self::conversion::{
    convert_buffer_usage, convert_image_format, convert_image_usage, convert_stages,
};
use self::swapchain::{VulkanSurface, VulkanSwapchain};

/// Options for creating a [`VulkanBackend`].
#[derive(Debug, Clone)]
pub struct VulkanParameters {
    /// Enable the Khronos validation layer when it is installed.
    pub validation: bool,
    pub application_name: String,
    /// Display the caller will present to. When `None`, every surface
    /// extension of the platform is requested.
    pub display: Option<RawDisplayHandle>,
}

impl Default for VulkanParameters {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            application_name: "RedLilium".to_string(),
            display: None,
        }
    }
}

/// Translate a failed Vulkan call into the matching error.
pub(crate) fn map_vk_error(result: vk::Result, what: &str) -> GraphicsError {
    match result {
        vk::Result::ERROR_OUT_OF_DATE_KHR => GraphicsError::SurfaceOutdated,
        vk::Result::ERROR_SURFACE_LOST_KHR => GraphicsError::SurfaceLost,
        vk::Result::ERROR_DEVICE_LOST => GraphicsError::DeviceLost,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            GraphicsError::OutOfMemory
        }
        other => GraphicsError::Internal(format!("Failed to {what}: {:?}", other)),
    }
}

fn timeout_nanos(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

fn wrong_backend(what: &str) -> GraphicsError {
    GraphicsError::InvalidParameter(format!("{what} was not created by the Vulkan backend"))
}

/// Native Vulkan backend.
///
/// Every resource, surface and swapchain created by the backend must be
/// dropped before it.
pub struct VulkanBackend {
    entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    /// Command labels; only loaded with validation.
    debug_labels: Option<ash::ext::debug_utils::Device>,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue_family: u32,
    /// Queue access is externally synchronized.
    queue: Mutex<vk::Queue>,
    allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,
    command_pool: Arc<Mutex<vk::CommandPool>>,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
}

impl std::fmt::Debug for VulkanBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBackend")
            .field("physical_device", &self.physical_device)
            .field("queue_family", &self.queue_family)
            .field("validation", &self.debug_utils.is_some())
            .finish_non_exhaustive()
    }
}

impl VulkanBackend {
    /// Load Vulkan, create the instance and device, the allocator and the command pool.
    pub fn new(params: &VulkanParameters) -> Result<Self, GraphicsError> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to load Vulkan: {}", e))
        })?;

        let bundle = instance::create_instance(&entry, params)?;
        let instance = bundle.instance;
        let selected = device::select_physical_device(&instance)?;
        let device = device::create_logical_device(&instance, selected)?;
        let queue = unsafe { device.get_device_queue(selected.queue_family, 0) };

        let allocator = Arc::new(Mutex::new(allocator::create_allocator(
            &instance,
            selected.physical_device,
            device.clone(),
        )?));
        let command_pool = command::create_command_pool(&device, selected.queue_family)?;
        let debug_labels = bundle
            .debug_utils
            .as_ref()
            .map(|_| ash::ext::debug_utils::Device::new(&instance, &device));

        log::info!(
            "Vulkan backend initialized (queue family {}, validation: {})",
            selected.queue_family,
            bundle.debug_utils.is_some()
        );

        Ok(Self {
            surface_loader: ash::khr::surface::Instance::new(&entry, &instance),
            swapchain_loader: ash::khr::swapchain::Device::new(&instance, &device),
            entry,
            debug_utils: bundle.debug_utils,
            debug_messenger: bundle.debug_messenger,
            debug_labels,
            physical_device: selected.physical_device,
            queue_family: selected.queue_family,
            queue: Mutex::new(queue),
            allocator: ManuallyDrop::new(allocator),
            command_pool: Arc::new(Mutex::new(command_pool)),
            instance,
            device,
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The family of the single queue all work is submitted to.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub(crate) fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    pub(crate) fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Create a presentation surface for `window`.
    ///
    /// Fails with [`GraphicsError::FeatureNotSupported`] if the backend's
    /// queue cannot present to it.
    ///
    /// # Safety
    ///
    /// `window` must outlive the returned target and every swapchain created from it.
    pub unsafe fn create_surface<W>(&self, window: &W) -> Result<SurfaceTarget, GraphicsError>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GraphicsError::InvalidParameter(format!("No display handle: {}", e)))?;
        let handle = window
            .window_handle()
            .map_err(|e| GraphicsError::InvalidParameter(format!("No window handle: {}", e)))?;

        let surface = unsafe {
            ash_window::create_surface(
                &self.entry,
                &self.instance,
                display.as_raw(),
                handle.as_raw(),
                None,
            )
        }
        .map_err(|e| map_vk_error(e, "create surface"))?;
        let surface = VulkanSurface::new(surface, self.surface_loader.clone());

        let supported = unsafe {
            self.surface_loader.get_physical_device_surface_support(
                self.physical_device,
                self.queue_family,
                surface.surface,
            )
        }
        .map_err(|e| map_vk_error(e, "query surface support"))?;
        if !supported {
            return Err(GraphicsError::FeatureNotSupported(
                "the graphics queue cannot present to this surface".to_string(),
            ));
        }
        Ok(SurfaceTarget::Vulkan(Arc::new(surface)))
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device
                .destroy_command_pool(*self.command_pool.lock(), None);

            if Arc::strong_count(&self.allocator) > 1 {
                log::error!("VulkanBackend dropped while GPU allocations are still alive");
            }
            // The allocator frees its memory blocks through the device.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

impl VulkanBackend {
    pub fn name(&self) -> &'static str {
        "Vulkan"
    }

    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(descriptor.size)
            .usage(convert_buffer_usage(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }
            .map_err(|e| map_vk_error(e, "create buffer"))?;
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = self.allocator.lock().allocate(&AllocationCreateDesc {
            name: descriptor.label.as_deref().unwrap_or("buffer"),
            requirements,
            location: allocator::buffer_location(descriptor.usage),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(GraphicsError::ResourceCreationFailed(format!(
                    "Failed to allocate buffer memory: {}",
                    e
                )));
            }
        };

        let bound = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        // The handle's Drop releases both buffer and memory, also on the error path.
        let gpu = GpuBuffer::Vulkan {
            device: self.device.clone(),
            buffer,
            allocation: Mutex::new(Some(allocation)),
            allocator: Arc::clone(&self.allocator),
            size: descriptor.size,
        };
        bound.map_err(|e| map_vk_error(e, "bind buffer memory"))?;
        Ok(gpu)
    }

    pub fn create_image(&self, descriptor: &ImageDescriptor) -> Result<GpuImage, GraphicsError> {
        let format = convert_image_format(descriptor.format);
        let extent = vk::Extent3D {
            width: descriptor.size.width,
            height: descriptor.size.height,
            depth: descriptor.size.depth.max(1),
        };
        let image_type = if extent.depth > 1 {
            vk::ImageType::TYPE_3D
        } else {
            vk::ImageType::TYPE_2D
        };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(image_type)
            .format(format)
            .extent(extent)
            .mip_levels(descriptor.mip_level_count)
            .array_layers(descriptor.array_layer_count)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert_image_usage(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { self.device.create_image(&image_info, None) }
            .map_err(|e| map_vk_error(e, "create image"))?;
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let allocation = self.allocator.lock().allocate(&AllocationCreateDesc {
            name: descriptor.label.as_deref().unwrap_or("image"),
            requirements,
            location: gpu_allocator::MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(GraphicsError::ResourceCreationFailed(format!(
                    "Failed to allocate image memory: {}",
                    e
                )));
            }
        };

        let bound = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        };
        let gpu = GpuImage::Vulkan {
            device: self.device.clone(),
            image,
            allocation: Mutex::new(Some(allocation)),
            allocator: Some(Arc::clone(&self.allocator)),
            format,
            extent,
            owned: true,
        };
        bound.map_err(|e| map_vk_error(e, "bind image memory"))?;
        Ok(gpu)
    }

    pub fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let GpuBuffer::Vulkan {
            allocation, size, ..
        } = buffer
        else {
            return Err(wrong_backend("buffer"));
        };
        check_range(offset, data.len() as u64, *size)?;

        let mut guard = allocation.lock();
        let mapped = guard
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| {
                GraphicsError::InvalidParameter("buffer is not host-visible".to_string())
            })?;
        let start = offset as usize;
        mapped[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        let GpuBuffer::Vulkan {
            allocation,
            size: buffer_size,
            ..
        } = buffer
        else {
            return Err(wrong_backend("buffer"));
        };
        check_range(offset, size, *buffer_size)?;

        let guard = allocation.lock();
        let mapped = guard
            .as_ref()
            .and_then(|allocation| allocation.mapped_slice())
            .ok_or_else(|| {
                GraphicsError::InvalidParameter("buffer is not host-visible".to_string())
            })?;
        let start = offset as usize;
        Ok(mapped[start..start + size as usize].to_vec())
    }

    pub fn create_fence(&self, signaled: bool) -> Result<GpuFence, GraphicsError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence = unsafe {
            self.device
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
        }
        .map_err(|e| map_vk_error(e, "create fence"))?;
        Ok(GpuFence::Vulkan {
            device: self.device.clone(),
            fence,
        })
    }

    pub fn wait_fence(&self, fence: &GpuFence, timeout: Duration) -> Result<bool, GraphicsError> {
        let GpuFence::Vulkan { fence, .. } = fence else {
            return Err(wrong_backend("fence"));
        };
        match unsafe {
            self.device
                .wait_for_fences(&[*fence], true, timeout_nanos(timeout))
        } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(map_vk_error(e, "wait for fence")),
        }
    }

    pub fn is_fence_signaled(&self, fence: &GpuFence) -> Result<bool, GraphicsError> {
        let GpuFence::Vulkan { fence, .. } = fence else {
            return Err(wrong_backend("fence"));
        };
        unsafe { self.device.get_fence_status(*fence) }
            .map_err(|e| map_vk_error(e, "query fence status"))
    }

    pub fn reset_fence(&self, fence: &GpuFence) -> Result<(), GraphicsError> {
        let GpuFence::Vulkan { fence, .. } = fence else {
            return Err(wrong_backend("fence"));
        };
        unsafe { self.device.reset_fences(&[*fence]) }.map_err(|e| map_vk_error(e, "reset fence"))
    }

    pub fn create_semaphore(&self, kind: SemaphoreKind) -> Result<GpuSemaphore, GraphicsError> {
        let mut type_info = match kind {
            SemaphoreKind::Binary => {
                vk::SemaphoreTypeCreateInfo::default().semaphore_type(vk::SemaphoreType::BINARY)
            }
            SemaphoreKind::Timeline { initial } => vk::SemaphoreTypeCreateInfo::default()
                .semaphore_type(vk::SemaphoreType::TIMELINE)
                .initial_value(initial),
        };
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        let semaphore = unsafe { self.device.create_semaphore(&create_info, None) }
            .map_err(|e| map_vk_error(e, "create semaphore"))?;
        Ok(GpuSemaphore::Vulkan {
            device: self.device.clone(),
            semaphore,
            kind,
        })
    }

    pub fn signal_semaphore(
        &self,
        semaphore: &GpuSemaphore,
        value: u64,
    ) -> Result<(), GraphicsError> {
        let GpuSemaphore::Vulkan {
            semaphore,
            kind: SemaphoreKind::Timeline { .. },
            ..
        } = semaphore
        else {
            return Err(GraphicsError::InvalidParameter(
                "host signals require a Vulkan timeline semaphore".to_string(),
            ));
        };
        let signal_info = vk::SemaphoreSignalInfo::default()
            .semaphore(*semaphore)
            .value(value);
        unsafe { self.device.signal_semaphore(&signal_info) }
            .map_err(|e| map_vk_error(e, "signal semaphore"))
    }

    pub fn semaphore_value(&self, semaphore: &GpuSemaphore) -> Result<u64, GraphicsError> {
        let GpuSemaphore::Vulkan {
            semaphore,
            kind: SemaphoreKind::Timeline { .. },
            ..
        } = semaphore
        else {
            return Err(GraphicsError::InvalidParameter(
                "only Vulkan timeline semaphores have a counter".to_string(),
            ));
        };
        unsafe { self.device.get_semaphore_counter_value(*semaphore) }
            .map_err(|e| map_vk_error(e, "read semaphore counter"))
    }

    /// Allocate a primary command buffer. Every queue kind maps to the single queue.
    pub fn create_command_buffer(
        &self,
        queue: QueueKind,
    ) -> Result<GpuCommandBuffer, GraphicsError> {
        let pool = self.command_pool.lock();
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffer = unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| map_vk_error(e, "allocate command buffer"))?
            .into_iter()
            .next()
            .ok_or_else(|| GraphicsError::Internal("no command buffer allocated".to_string()))?;
        Ok(GpuCommandBuffer::Vulkan {
            device: self.device.clone(),
            pool: Arc::clone(&self.command_pool),
            buffer,
            queue,
        })
    }

    /// Record the command list, then submit it with `vkQueueSubmit2`.
    pub fn submit(&self, info: &SubmitInfo<'_>) -> Result<(), GraphicsError> {
        let mut command_buffers = Vec::with_capacity(1);
        if let Some((gpu_cb, list)) = info.command_buffer {
            let GpuCommandBuffer::Vulkan { pool, buffer, .. } = gpu_cb else {
                return Err(wrong_backend("command buffer"));
            };
            let _pool = pool.lock();
            CommandTranslator {
                device: &self.device,
                debug_utils: self.debug_labels.as_ref(),
                cmd: *buffer,
            }
            .record(list)?;
            command_buffers.push(vk::CommandBufferSubmitInfo::default().command_buffer(*buffer));
        }

        let waits = info
            .waits
            .iter()
            .map(semaphore_info)
            .collect::<Result<Vec<_>, _>>()?;
        let signals = info
            .signals
            .iter()
            .map(semaphore_info)
            .collect::<Result<Vec<_>, _>>()?;
        let fence = match info.fence {
            None => vk::Fence::null(),
            Some(GpuFence::Vulkan { fence, .. }) => *fence,
            Some(_) => return Err(wrong_backend("fence")),
        };

        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&waits)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signals);
        let queue = self.queue.lock();
        unsafe { self.device.queue_submit2(*queue, &[submit], fence) }
            .map_err(|e| map_vk_error(e, &format!("submit {}", info.label)))?;

        log::trace!(
            "Vulkan: submitted {} ({} waits, {} signals)",
            info.label,
            waits.len(),
            signals.len()
        );
        Ok(())
    }

    pub fn create_swapchain(
        &self,
        target: &SurfaceTarget,
        descriptor: &SwapchainDescriptor,
        old: Option<&GpuSwapchain>,
    ) -> Result<(GpuSwapchain, Vec<GpuImage>, SwapchainDescriptor), GraphicsError> {
        let SurfaceTarget::Vulkan(surface) = target else {
            return Err(GraphicsError::InvalidParameter(
                "Vulkan swapchains need a surface from VulkanBackend::create_surface".to_string(),
            ));
        };
        let old = match old {
            None => None,
            Some(GpuSwapchain::Vulkan(old)) => Some(old.as_ref()),
            Some(_) => return Err(wrong_backend("swapchain")),
        };

        let (swapchain, images, applied) =
            VulkanSwapchain::new(self, surface.surface, descriptor, old)?;
        let images = images
            .into_iter()
            .map(|image| GpuImage::Vulkan {
                device: self.device.clone(),
                image,
                allocation: Mutex::new(None),
                allocator: None,
                format: swapchain.format,
                extent: vk::Extent3D {
                    width: swapchain.extent.width,
                    height: swapchain.extent.height,
                    depth: 1,
                },
                owned: false,
            })
            .collect();
        Ok((GpuSwapchain::Vulkan(Box::new(swapchain)), images, applied))
    }

    pub fn acquire_next_image(
        &self,
        swapchain: &GpuSwapchain,
        timeout: Duration,
        semaphore: &GpuSemaphore,
    ) -> Result<u32, GraphicsError> {
        let GpuSwapchain::Vulkan(swapchain) = swapchain else {
            return Err(wrong_backend("swapchain"));
        };
        let GpuSemaphore::Vulkan { semaphore, .. } = semaphore else {
            return Err(wrong_backend("semaphore"));
        };
        let result = unsafe {
            swapchain.loader.acquire_next_image(
                swapchain.swapchain,
                timeout_nanos(timeout),
                *semaphore,
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::debug!("Vulkan: acquired image {index} from a suboptimal swapchain");
                }
                Ok(index)
            }
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => {
                Err(GraphicsError::Timeout(timeout))
            }
            Err(e) => Err(map_vk_error(e, "acquire swapchain image")),
        }
    }

    /// Present `image_index` once `wait` is signaled. Returns `true` when the
    /// swapchain no longer matches the surface.
    pub fn present(
        &self,
        swapchain: &GpuSwapchain,
        image_index: u32,
        wait: &GpuSemaphore,
    ) -> Result<bool, GraphicsError> {
        let GpuSwapchain::Vulkan(swapchain) = swapchain else {
            return Err(wrong_backend("swapchain"));
        };
        let GpuSemaphore::Vulkan { semaphore, .. } = wait else {
            return Err(wrong_backend("semaphore"));
        };
        let wait_semaphores = [*semaphore];
        let swapchains = [swapchain.swapchain];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        let queue = self.queue.lock();
        match unsafe { swapchain.loader.queue_present(*queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Vulkan: swapchain out of date on present");
                Ok(true)
            }
            Err(e) => Err(map_vk_error(e, "present")),
        }
    }

    pub fn wait_idle(&self) -> Result<(), GraphicsError> {
        let _queue = self.queue.lock();
        unsafe { self.device.device_wait_idle() }.map_err(|e| map_vk_error(e, "wait for idle"))
    }
}

fn check_range(offset: u64, len: u64, size: u64) -> Result<(), GraphicsError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(GraphicsError::InvalidParameter(format!(
            "range {offset}..+{len} exceeds buffer size {size}"
        ))),
    }
}

fn semaphore_info(
    op: &SemaphoreSubmit<'_>,
) -> Result<vk::SemaphoreSubmitInfo<'static>, GraphicsError> {
    let GpuSemaphore::Vulkan { semaphore, kind, .. } = op.semaphore else {
        return Err(wrong_backend("semaphore"));
    };
    let value = match kind {
        SemaphoreKind::Binary => 0,
        SemaphoreKind::Timeline { .. } => op.value,
    };
    Ok(vk::SemaphoreSubmitInfo::default()
        .semaphore(*semaphore)
        .value(value)
        .stage_mask(convert_stages(op.stages)))
}
