// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, c_void, CStr, CString};

use ash::ext::debug_utils;
use ash::{vk, Entry, Instance};
use lumen_core::{Version, ENGINE_NAME, ENGINE_VERSION};
use tracing::{debug, error, info, trace, warn};

use crate::context::ContextSettings;
use crate::error::{Error, Result};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub fn vk_version(v: Version) -> u32 {
    vk::make_api_version(0, v.major, v.minor, v.patch)
}

pub(crate) struct CreatedInstance {
    pub instance: Instance,
    pub debug_utils: bool,
}

/// Required extensions are checked against the loader's list first, so a
/// missing one is reported by name instead of as a bare driver error.
///
/// # Safety
/// `entry` must be a loaded Vulkan entry point.
pub(crate) unsafe fn create_instance(
    entry: &Entry,
    settings: &ContextSettings,
    required_extensions: &[&CStr],
    validation: bool,
) -> Result<CreatedInstance> {
    let fail = |what: &str, e: vk::Result| Error::InstanceCreationFailed(format!("{what}: {e}"));

    let available = unsafe { entry.enumerate_instance_extension_properties(None) }
        .map_err(|e| fail("enumerate_instance_extension_properties", e))?;
    let has_ext = |name: &CStr| {
        available
            .iter()
            .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == name))
    };

    let missing: Vec<_> = required_extensions
        .iter()
        .filter(|&&n| !has_ext(n))
        .map(|n| n.to_string_lossy())
        .collect();
    if !missing.is_empty() {
        return Err(Error::InstanceCreationFailed(format!(
            "missing required extensions: {}",
            missing.join(", ")
        )));
    }

    let mut extensions: Vec<*const c_char> =
        required_extensions.iter().map(|n| n.as_ptr()).collect();
    let mut layers: Vec<*const c_char> = Vec::new();
    let mut debug_utils_enabled = false;

    if validation {
        let layer_props = unsafe { entry.enumerate_instance_layer_properties() }
            .map_err(|e| fail("enumerate_instance_layer_properties", e))?;
        if layer_props
            .iter()
            .any(|l| l.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER))
        {
            layers.push(VALIDATION_LAYER.as_ptr());
        } else {
            warn!("validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }
        if has_ext(debug_utils::NAME) {
            extensions.push(debug_utils::NAME.as_ptr());
            debug_utils_enabled = true;
        }
    }

    let app_name = CString::new(settings.app_name.as_str())
        .map_err(|e| Error::InstanceCreationFailed(format!("application name: {e}")))?;
    let engine_name = CString::new(ENGINE_NAME)
        .map_err(|e| Error::InstanceCreationFailed(format!("engine name: {e}")))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk_version(settings.app_version))
        .engine_name(&engine_name)
        .engine_version(vk_version(ENGINE_VERSION))
        .api_version(vk::API_VERSION_1_3);

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    let instance = unsafe { entry.create_instance(&create_info, None) }
        .map_err(|e| fail("vkCreateInstance", e))?;

    info!(
        "vk: instance ready (app \"{}\" {}, engine {} {}, {} extension(s), validation={})",
        settings.app_name,
        settings.app_version,
        ENGINE_NAME,
        ENGINE_VERSION,
        extensions.len(),
        !layers.is_empty()
    );

    Ok(CreatedInstance {
        instance,
        debug_utils: debug_utils_enabled,
    })
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let p_message = unsafe { (*data).p_message };
    if p_message.is_null() {
        return vk::FALSE;
    }
    let msg = unsafe { CStr::from_ptr(p_message) }.to_string_lossy();

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(target: "vulkan", "{msg}");
    } else {
        trace!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

pub(crate) struct DebugMessenger {
    fns: debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// # Safety
    /// `instance` must have `VK_EXT_debug_utils` enabled.
    pub unsafe fn new(entry: &Entry, instance: &Instance) -> Option<Self> {
        let fns = debug_utils::Instance::new(entry, instance);
        let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        match unsafe { fns.create_debug_utils_messenger(&info, None) } {
            Ok(handle) => Some(Self { fns, handle }),
            Err(e) => {
                warn!("vk: debug messenger unavailable: {e}");
                None
            }
        }
    }

    /// # Safety
    /// Must run before the owning instance is destroyed.
    pub unsafe fn destroy(&self) {
        unsafe { self.fns.destroy_debug_utils_messenger(self.handle, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_versions_like_the_api_macro() {
        let packed = vk_version(Version::new(1, 2, 3));
        assert_eq!(vk::api_version_major(packed), 1);
        assert_eq!(vk::api_version_minor(packed), 2);
        assert_eq!(vk::api_version_patch(packed), 3);
        assert_eq!(vk::api_version_variant(packed), 0);
    }
}
