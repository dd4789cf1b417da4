//! Physical device selection and logical device creation.

use ash::vk;

use crate::error::GraphicsError;

/// A physical device with the queue family every submission goes to.
#[derive(Debug, Clone, Copy)]
pub struct SelectedDevice {
    pub physical_device: vk::PhysicalDevice,
    pub queue_family: u32,
}

/// Pick the highest-scoring device that supports Vulkan 1.3, timeline
/// semaphores, synchronization2 and a queue family with graphics, compute
/// and transfer.
pub fn select_physical_device(instance: &ash::Instance) -> Result<SelectedDevice, GraphicsError> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        GraphicsError::InitializationFailed(format!(
            "Failed to enumerate physical devices: {:?}",
            e
        ))
    })?;

    let mut best: Option<(u32, SelectedDevice)> = None;
    for physical_device in devices {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if properties.api_version < vk::API_VERSION_1_3 {
            log::debug!("Skipping GPU {name}: Vulkan 1.3 is not supported");
            continue;
        }
        if !supports_sync_features(instance, physical_device) {
            log::debug!("Skipping GPU {name}: timeline semaphores or synchronization2 missing");
            continue;
        }
        let Some(queue_family) = find_queue_family(instance, physical_device) else {
            log::debug!("Skipping GPU {name}: no graphics queue family");
            continue;
        };

        let score = match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            _ => 1,
        } + properties.limits.max_image_dimension2_d / 1024;
        log::info!(
            "Found GPU: {name} ({:?}, score {score})",
            properties.device_type
        );

        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((
                score,
                SelectedDevice {
                    physical_device,
                    queue_family,
                },
            ));
        }
    }

    best.map(|(_, selected)| selected).ok_or_else(|| {
        GraphicsError::InitializationFailed(
            "No GPU supports Vulkan 1.3 with timeline semaphores and synchronization2".to_string(),
        )
    })
}

fn supports_sync_features(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
    let mut vulkan_12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut vulkan_13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut vulkan_12)
        .push_next(&mut vulkan_13);
    unsafe { instance.get_physical_device_features2(physical_device, &mut features) };
    vulkan_12.timeline_semaphore == vk::TRUE && vulkan_13.synchronization2 == vk::TRUE
}

/// The first family that can run graphics, compute and transfer work.
fn find_queue_family(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Option<u32> {
    let required = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
    unsafe { instance.get_physical_device_queue_family_properties(physical_device) }
        .iter()
        .position(|family| family.queue_flags.contains(required))
        .map(|index| index as u32)
}

/// Create the logical device with one queue and the synchronization features enabled.
pub fn create_logical_device(
    instance: &ash::Instance,
    selected: SelectedDevice,
) -> Result<ash::Device, GraphicsError> {
    let priorities = [1.0f32];
    let queue_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(selected.queue_family)
        .queue_priorities(&priorities)];

    let extensions = [ash::khr::swapchain::NAME.as_ptr()];

    let mut vulkan_12 = vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
    let mut vulkan_13 = vk::PhysicalDeviceVulkan13Features::default().synchronization2(true);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extensions)
        .push_next(&mut vulkan_12)
        .push_next(&mut vulkan_13);

    unsafe { instance.create_device(selected.physical_device, &create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create logical device: {:?}", e))
    })
}
