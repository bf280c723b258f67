// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, CStr};

use ash::{vk, Instance};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::features::{FeatureBlocks, FeatureRequest};
use crate::queues::QueueFamilies;

pub const DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Takes the first enumerated device. No discrete/integrated scoring.
///
/// # Safety
/// `instance` must be a live instance.
pub(crate) unsafe fn select_physical_device(instance: &Instance) -> Result<vk::PhysicalDevice> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        error!("vk: enumerate_physical_devices: {e}");
        Error::NoPhysicalDeviceFound
    })?;
    let phys = *devices.first().ok_or(Error::NoPhysicalDeviceFound)?;

    let props = unsafe { instance.get_physical_device_properties(phys) };
    info!(
        "vk: using device 0 of {}: {} ({:?}, api {}.{}.{})",
        devices.len(),
        props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        props.device_type,
        vk::api_version_major(props.api_version),
        vk::api_version_minor(props.api_version),
        vk::api_version_patch(props.api_version),
    );
    Ok(phys)
}

/// # Safety
/// `phys` must belong to `instance`.
pub(crate) unsafe fn query_supported_features(
    instance: &Instance,
    phys: vk::PhysicalDevice,
) -> FeatureBlocks {
    let mut supported = FeatureBlocks::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut supported.v11)
        .push_next(&mut supported.v12)
        .push_next(&mut supported.v13);
    unsafe { instance.get_physical_device_features2(phys, &mut features2) };
    supported.core = features2.features;
    supported.unchained()
}

/// One queue per distinct family, priority 1.0. Every requested feature and
/// extension is mandatory.
///
/// # Safety
/// `phys` must belong to `instance` and `families` must index its queue families.
pub(crate) unsafe fn create_logical_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
    extensions: &[&CStr],
    request: &FeatureRequest,
) -> Result<ash::Device> {
    let supported = unsafe { query_supported_features(instance, phys) };
    let missing = request.missing_from(&supported);
    if !missing.is_empty() {
        let names: Vec<_> = missing.iter().map(|f| f.name()).collect();
        return Err(Error::DeviceCreationFailed(format!(
            "unsupported features: {}",
            names.join(", ")
        )));
    }

    let available = unsafe { instance.enumerate_device_extension_properties(phys) }
        .map_err(|e| Error::DeviceCreationFailed(format!("enumerate_device_extension_properties: {e}")))?;
    let missing_exts: Vec<_> = extensions
        .iter()
        .filter(|&&name| {
            !available
                .iter()
                .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == name))
        })
        .map(|n| n.to_string_lossy())
        .collect();
    if !missing_exts.is_empty() {
        return Err(Error::DeviceCreationFailed(format!(
            "unsupported extensions: {}",
            missing_exts.join(", ")
        )));
    }

    let priorities = [1.0_f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(&priorities)
        })
        .collect();

    // Chain assembled here so every block outlives vkCreateDevice.
    let blocks = request.blocks();
    let mut v11 = blocks.v11;
    let mut v12 = blocks.v12;
    let mut v13 = blocks.v13;
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .features(blocks.core)
        .push_next(&mut v11)
        .push_next(&mut v12)
        .push_next(&mut v13);

    let ext_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();
    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&ext_ptrs)
        .push_next(&mut features2);

    let device = unsafe { instance.create_device(phys, &create_info, None) }
        .map_err(|e| Error::DeviceCreationFailed(format!("vkCreateDevice: {e}")))?;

    info!(
        "vk: device ready (main family {}, transfer family {}{}, {} feature(s))",
        families.main,
        families.transfer,
        if families.has_dedicated_transfer() {
            ""
        } else {
            " (shared)"
        },
        request.features().len()
    );
    Ok(device)
}
