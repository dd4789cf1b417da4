//! Vulkan instance creation.

use std::ffi::{CStr, CString, c_char};

use ash::vk;

use crate::error::GraphicsError;

use super::{VulkanParameters, debug};

/// Timeline semaphores and synchronization2 are core in 1.3.
const API_VERSION: u32 = vk::API_VERSION_1_3;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// An instance with its optional debug messenger.
pub struct InstanceBundle {
    pub instance: ash::Instance,
    pub debug_utils: Option<ash::ext::debug_utils::Instance>,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

/// Create the instance, enabling validation only if the layer is installed.
pub fn create_instance(
    entry: &ash::Entry,
    params: &VulkanParameters,
) -> Result<InstanceBundle, GraphicsError> {
    let validation = params.validation && has_validation_layer(entry);
    if params.validation && !validation {
        log::warn!(
            "Vulkan validation requested but {:?} is not installed",
            VALIDATION_LAYER
        );
    }

    let application_name = CString::new(params.application_name.replace('\0', ""))
        .unwrap_or_default();
    let app_info = vk::ApplicationInfo::default()
        .application_name(&application_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"RedLilium Frame Sync")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(API_VERSION);

    let mut extensions = surface_extensions(params)?;
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }
    let layers: Vec<*const c_char> = if validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    #[allow(unused_mut)]
    let mut flags = vk::InstanceCreateFlags::empty();
    #[cfg(target_os = "macos")]
    {
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
        flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let create_info = vk::InstanceCreateInfo::default()
        .flags(flags)
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create Vulkan instance: {:?}", e))
    })?;

    let (debug_utils, debug_messenger) = if validation {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, &instance);
        let messenger = debug::create_debug_messenger(&debug_utils)?;
        (Some(debug_utils), Some(messenger))
    } else {
        (None, None)
    };

    Ok(InstanceBundle {
        instance,
        debug_utils,
        debug_messenger,
    })
}

/// Surface extensions for the display the caller will present to, or for
/// every windowing system of the platform when no display is known yet.
fn surface_extensions(params: &VulkanParameters) -> Result<Vec<*const c_char>, GraphicsError> {
    if let Some(display) = params.display {
        let required = ash_window::enumerate_required_extensions(display).map_err(|e| {
            GraphicsError::InitializationFailed(format!(
                "Display has no Vulkan surface support: {:?}",
                e
            ))
        })?;
        return Ok(required.to_vec());
    }

    let mut extensions = vec![ash::khr::surface::NAME.as_ptr()];
    #[cfg(target_os = "windows")]
    extensions.push(ash::khr::win32_surface::NAME.as_ptr());
    #[cfg(target_os = "linux")]
    extensions.extend([
        ash::khr::xlib_surface::NAME.as_ptr(),
        ash::khr::wayland_surface::NAME.as_ptr(),
    ]);
    #[cfg(target_os = "macos")]
    extensions.push(ash::ext::metal_surface::NAME.as_ptr());
    Ok(extensions)
}

fn has_validation_layer(entry: &ash::Entry) -> bool {
    unsafe { entry.enumerate_instance_layer_properties() }
        .map(|layers| {
            layers.iter().any(|layer| {
                layer
                    .layer_name_as_c_str()
                    .is_ok_and(|name| name == VALIDATION_LAYER)
            })
        })
        .unwrap_or(false)
}
