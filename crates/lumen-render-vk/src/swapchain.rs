// SPDX-License-Identifier: CEPL-1.0
//! Swapchain (re)creation.
//!
//! [`SwapchainPlan`] holds every decision derived from the surface's reported
//! capabilities; [`build_swapchain`] queries those, applies the plan and runs
//! the retire/replace sequence against a previous [`SwapchainState`].

use ash::vk;
use lumen_render::RenderSize;
use tracing::info;

use crate::context::GraphicsContext;
use crate::error::{Error, Result};
use crate::select::{choose_present_mode, choose_surface_format, format_name, present_mode_name};

/// `current_extent` value meaning "the swapchain decides the size".
pub const UNDEFINED_EXTENT: u32 = u32::MAX;

fn fail(what: &str, e: impl std::fmt::Display) -> Error {
    Error::SwapchainCreationFailed(format!("{what}: {e}"))
}

pub fn extent_from_caps(
    caps: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: impl FnOnce() -> RenderSize,
) -> vk::Extent2D {
    if caps.current_extent.width != UNDEFINED_EXTENT {
        return caps.current_extent;
    }
    let want = framebuffer_size();
    vk::Extent2D {
        width: want
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: want
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum; `max_image_count == 0` means unbounded.
pub fn image_count_from_caps(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        want.min(caps.max_image_count)
    } else {
        want
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SwapchainPlan {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainPlan {
    pub fn new(
        caps: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        present_modes: &[vk::PresentModeKHR],
        framebuffer_size: impl FnOnce() -> RenderSize,
    ) -> Result<Self> {
        let surface_format = choose_surface_format(formats).ok_or_else(|| {
            Error::SwapchainCreationFailed("surface reports no formats".to_owned())
        })?;
        let extent = extent_from_caps(caps, framebuffer_size);
        if extent.width == 0 || extent.height == 0 {
            return Err(Error::SwapchainCreationFailed(format!(
                "surface extent is {}x{}",
                extent.width, extent.height
            )));
        }

        Ok(Self {
            surface_format,
            present_mode: choose_present_mode(present_modes),
            extent,
            image_count: image_count_from_caps(caps),
            pre_transform: caps.current_transform,
        })
    }

    /// Presentation always happens on the main queue, so images are never
    /// shared between families.
    pub fn create_info(
        &self,
        surface: vk::SurfaceKHR,
        old_swapchain: vk::SwapchainKHR,
    ) -> vk::SwapchainCreateInfoKHR<'static> {
        vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(self.image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(self.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain)
    }
}

pub fn image_view_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo<'static> {
    vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::R,
            g: vk::ComponentSwizzle::G,
            b: vk::ComponentSwizzle::B,
            a: vk::ComponentSwizzle::A,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
}

/// Images belong to the swapchain; views are ours. Always one view per image.
#[derive(Debug)]
pub struct SwapchainState {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
}

impl SwapchainState {
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Destroys the views and hands back the handle for `old_swapchain`.
    fn retire(self, handoff: &mut impl Handoff) -> vk::SwapchainKHR {
        for &view in &self.image_views {
            handoff.destroy_image_view(view);
        }
        self.handle
    }

    /// # Safety
    /// The swapchain must belong to `ctx`, and no pending GPU work may
    /// reference it or its views.
    pub unsafe fn destroy(self, ctx: &GraphicsContext) {
        let mut handoff = DeviceHandoff { ctx };
        let handle = self.retire(&mut handoff);
        handoff.destroy_swapchain(handle);
    }
}

/// Device-side steps of handing presentation from one swapchain to the next.
pub(crate) trait Handoff {
    fn wait_idle(&mut self) -> Result<()>;
    fn destroy_image_view(&mut self, view: vk::ImageView);
    fn destroy_swapchain(&mut self, handle: vk::SwapchainKHR);
}

// Only ever handed swapchains and views created from `ctx`'s device.
struct DeviceHandoff<'a> {
    ctx: &'a GraphicsContext,
}

impl Handoff for DeviceHandoff<'_> {
    fn wait_idle(&mut self) -> Result<()> {
        self.ctx.wait_idle().map_err(|e| fail("device_wait_idle", e))
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        unsafe { self.ctx.device().destroy_image_view(view, None) };
    }

    fn destroy_swapchain(&mut self, handle: vk::SwapchainKHR) {
        unsafe { self.ctx.swapchain_fns().destroy_swapchain(handle, None) };
    }
}

// STRICT ORDER:
// 1) drain the device, destroy the previous views, keep the previous handle
// 2) create the new swapchain with the previous handle as old_swapchain
// 3) only then destroy the previous handle
// Whatever happens, the previous swapchain does not survive this call.
pub(crate) fn replace_swapchain<H: Handoff>(
    handoff: &mut H,
    previous: Option<SwapchainState>,
    create: impl FnOnce(vk::SwapchainKHR) -> Result<SwapchainState>,
) -> Result<SwapchainState> {
    let old = match previous {
        Some(prev) => {
            let idle = handoff.wait_idle();
            let handle = prev.retire(handoff);
            if let Err(e) = idle {
                handoff.destroy_swapchain(handle);
                return Err(e);
            }
            handle
        }
        None => vk::SwapchainKHR::null(),
    };

    let built = create(old);

    if old != vk::SwapchainKHR::null() {
        handoff.destroy_swapchain(old);
    }
    built
}

pub fn build_swapchain(
    ctx: &GraphicsContext,
    surface: vk::SurfaceKHR,
    framebuffer_size: impl FnOnce() -> RenderSize,
    previous: Option<SwapchainState>,
) -> Result<SwapchainState> {
    replace_swapchain(&mut DeviceHandoff { ctx }, previous, |old| unsafe {
        create_swapchain(ctx, surface, framebuffer_size, old)
    })
}

/// # Safety
/// `surface` must come from `ctx`'s instance; `old` is null or a retired
/// swapchain of the same surface.
unsafe fn create_swapchain(
    ctx: &GraphicsContext,
    surface: vk::SurfaceKHR,
    framebuffer_size: impl FnOnce() -> RenderSize,
    old: vk::SwapchainKHR,
) -> Result<SwapchainState> {
    let surface_fns = ctx.surface_fns();
    let fns = ctx.swapchain_fns();
    let device = ctx.device();
    let phys = ctx.physical_device();

    let caps = unsafe { surface_fns.get_physical_device_surface_capabilities(phys, surface) }
        .map_err(|e| fail("surface capabilities", e))?;
    let formats = unsafe { surface_fns.get_physical_device_surface_formats(phys, surface) }
        .map_err(|e| fail("surface formats", e))?;
    let modes = unsafe { surface_fns.get_physical_device_surface_present_modes(phys, surface) }
        .map_err(|e| fail("surface present modes", e))?;

    let plan = SwapchainPlan::new(&caps, &formats, &modes, framebuffer_size)?;
    let create_info = plan.create_info(surface, old);

    let handle = unsafe { fns.create_swapchain(&create_info, None) }
        .map_err(|e| fail("vkCreateSwapchainKHR", e))?;

    let images = match unsafe { fns.get_swapchain_images(handle) } {
        Ok(images) => images,
        Err(e) => {
            unsafe { fns.destroy_swapchain(handle, None) };
            return Err(fail("vkGetSwapchainImagesKHR", e));
        }
    };

    let format = plan.surface_format.format;
    let mut image_views = Vec::with_capacity(images.len());
    for &image in &images {
        match unsafe { device.create_image_view(&image_view_info(image, format), None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for &view in &image_views {
                    unsafe { device.destroy_image_view(view, None) };
                }
                unsafe { fns.destroy_swapchain(handle, None) };
                return Err(fail("vkCreateImageView", e));
            }
        }
    }

    info!(
        "vk: swapchain ready ({}x{}, {} image(s), {} {:?}, {})",
        plan.extent.width,
        plan.extent.height,
        images.len(),
        format_name(format),
        plan.surface_format.color_space,
        present_mode_name(plan.present_mode),
    );

    Ok(SwapchainState {
        handle,
        images,
        image_views,
        format,
        color_space: plan.surface_format.color_space,
        present_mode: plan.present_mode,
        extent: plan.extent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use std::cell::RefCell;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        }
    }

    fn undefined_caps() -> vk::SurfaceCapabilitiesKHR {
        caps(
            (UNDEFINED_EXTENT, UNDEFINED_EXTENT),
            (100, 100),
            (4096, 4096),
        )
    }

    fn srgb_formats() -> Vec<vk::SurfaceFormatKHR> {
        vec![vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }]
    }

    #[test]
    fn defined_current_extent_is_used_unchanged() {
        let c = caps((1024, 768), (1, 1), (4096, 4096));
        let extent = extent_from_caps(&c, || panic!("framebuffer size must not be queried"));
        assert_eq!((extent.width, extent.height), (1024, 768));
    }

    #[test]
    fn undefined_extent_clamps_framebuffer_size_per_dimension() {
        let extent = extent_from_caps(&undefined_caps(), || RenderSize::new(50, 2000));
        assert_eq!((extent.width, extent.height), (100, 2000));

        let extent = extent_from_caps(&undefined_caps(), || RenderSize::new(9000, 10));
        assert_eq!((extent.width, extent.height), (4096, 100));
    }

    #[test]
    fn image_count_is_min_plus_one_clamped_to_max() {
        let mut c = undefined_caps();
        c.min_image_count = 2;
        c.max_image_count = 0;
        assert_eq!(image_count_from_caps(&c), 3);

        c.max_image_count = 2;
        assert_eq!(image_count_from_caps(&c), 2);

        c.max_image_count = 8;
        assert_eq!(image_count_from_caps(&c), 3);
    }

    #[test]
    fn planning_twice_on_an_unchanged_surface_agrees() {
        let c = caps((1280, 720), (1, 1), (4096, 4096));
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        let a = SwapchainPlan::new(&c, &srgb_formats(), &modes, RenderSize::default).unwrap();
        let b = SwapchainPlan::new(&c, &srgb_formats(), &modes, RenderSize::default).unwrap();

        assert_eq!(a.image_count, b.image_count);
        assert_eq!(a.extent, b.extent);
        assert_eq!(a.surface_format.format, b.surface_format.format);
        assert_eq!(a.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(a.present_mode, b.present_mode);
    }

    #[test]
    fn zero_area_surface_is_a_recoverable_failure() {
        let c = caps((0, 0), (0, 0), (4096, 4096));
        let err = SwapchainPlan::new(&c, &srgb_formats(), &[vk::PresentModeKHR::FIFO], || {
            RenderSize::new(800, 600)
        })
        .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn missing_formats_fail_the_build() {
        let c = caps((640, 480), (1, 1), (4096, 4096));
        let err = SwapchainPlan::new(&c, &[], &[vk::PresentModeKHR::FIFO], RenderSize::default)
            .unwrap_err();
        assert!(matches!(err, Error::SwapchainCreationFailed(_)));
    }

    #[test]
    fn create_info_uses_exclusive_opaque_clipped_presentation() {
        let mut c = caps((640, 480), (1, 1), (4096, 4096));
        c.current_transform = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        let plan = SwapchainPlan::new(&c, &srgb_formats(), &[vk::PresentModeKHR::FIFO], || {
            RenderSize::new(1, 1)
        })
        .unwrap();
        let info = plan.create_info(vk::SurfaceKHR::null(), vk::SwapchainKHR::null());

        assert_eq!(info.image_sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert_eq!(info.composite_alpha, vk::CompositeAlphaFlagsKHR::OPAQUE);
        assert_eq!(info.pre_transform, vk::SurfaceTransformFlagsKHR::ROTATE_90);
        assert_eq!(info.clipped, vk::TRUE);
        assert_eq!(info.image_array_layers, 1);
        assert_eq!(info.min_image_count, 3);
        assert!(info
            .image_usage
            .contains(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert_eq!(info.queue_family_index_count, 0);
    }

    #[test]
    fn create_info_hands_over_the_previous_swapchain() {
        let c = caps((640, 480), (1, 1), (4096, 4096));
        let plan =
            SwapchainPlan::new(&c, &srgb_formats(), &[vk::PresentModeKHR::FIFO], RenderSize::default)
                .unwrap();
        let previous = vk::SwapchainKHR::from_raw(0x5eed);
        let info = plan.create_info(vk::SurfaceKHR::from_raw(0x1), previous);
        assert_eq!(info.old_swapchain, previous);

        let first = plan.create_info(vk::SurfaceKHR::from_raw(0x1), vk::SwapchainKHR::null());
        assert_eq!(first.old_swapchain, vk::SwapchainKHR::null());
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        WaitIdle,
        DestroyView(vk::ImageView),
        Create(vk::SwapchainKHR),
        DestroySwapchain(vk::SwapchainKHR),
    }

    struct Recorder<'a> {
        log: &'a RefCell<Vec<Step>>,
        idle_fails: bool,
    }

    impl Handoff for Recorder<'_> {
        fn wait_idle(&mut self) -> Result<()> {
            self.log.borrow_mut().push(Step::WaitIdle);
            if self.idle_fails {
                Err(Error::SwapchainCreationFailed("device lost".to_owned()))
            } else {
                Ok(())
            }
        }

        fn destroy_image_view(&mut self, view: vk::ImageView) {
            self.log.borrow_mut().push(Step::DestroyView(view));
        }

        fn destroy_swapchain(&mut self, handle: vk::SwapchainKHR) {
            self.log.borrow_mut().push(Step::DestroySwapchain(handle));
        }
    }

    fn state(handle: u64, views: &[u64]) -> SwapchainState {
        SwapchainState {
            handle: vk::SwapchainKHR::from_raw(handle),
            images: views.iter().map(|&v| vk::Image::from_raw(v + 100)).collect(),
            image_views: views.iter().map(|&v| vk::ImageView::from_raw(v)).collect(),
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
        }
    }

    #[test]
    fn first_build_passes_a_null_old_swapchain_and_destroys_nothing() {
        let log = RefCell::new(Vec::new());
        let mut rec = Recorder {
            log: &log,
            idle_fails: false,
        };
        let built = replace_swapchain(&mut rec, None, |old| {
            log.borrow_mut().push(Step::Create(old));
            Ok(state(7, &[70, 71]))
        })
        .unwrap();

        assert_eq!(built.image_count(), built.image_views.len());
        assert_eq!(*log.borrow(), vec![Step::Create(vk::SwapchainKHR::null())]);
    }

    #[test]
    fn rebuild_drops_views_before_create_and_old_handle_after() {
        let log = RefCell::new(Vec::new());
        let mut rec = Recorder {
            log: &log,
            idle_fails: false,
        };
        let old = vk::SwapchainKHR::from_raw(1);
        replace_swapchain(&mut rec, Some(state(1, &[10, 11, 12])), |prev| {
            log.borrow_mut().push(Step::Create(prev));
            Ok(state(2, &[20, 21, 22]))
        })
        .unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                Step::WaitIdle,
                Step::DestroyView(vk::ImageView::from_raw(10)),
                Step::DestroyView(vk::ImageView::from_raw(11)),
                Step::DestroyView(vk::ImageView::from_raw(12)),
                Step::Create(old),
                Step::DestroySwapchain(old),
            ]
        );
    }

    #[test]
    fn failed_rebuild_still_releases_the_previous_swapchain() {
        let log = RefCell::new(Vec::new());
        let mut rec = Recorder {
            log: &log,
            idle_fails: false,
        };
        let err = replace_swapchain(&mut rec, Some(state(3, &[30])), |prev| {
            log.borrow_mut().push(Step::Create(prev));
            Err(Error::SwapchainCreationFailed("out of date".to_owned()))
        })
        .unwrap_err();

        assert!(err.is_recoverable());
        let old = vk::SwapchainKHR::from_raw(3);
        assert_eq!(log.borrow().last(), Some(&Step::DestroySwapchain(old)));
        assert_eq!(
            log.borrow()
                .iter()
                .filter(|s| **s == Step::DestroySwapchain(old))
                .count(),
            1
        );
    }

    #[test]
    fn idle_failure_skips_creation_but_releases_everything() {
        let log = RefCell::new(Vec::new());
        let mut rec = Recorder {
            log: &log,
            idle_fails: true,
        };
        let result = replace_swapchain(&mut rec, Some(state(4, &[40, 41])), |_| {
            panic!("no swapchain may be created after a failed drain")
        });

        assert!(result.is_err());
        assert_eq!(
            *log.borrow(),
            vec![
                Step::WaitIdle,
                Step::DestroyView(vk::ImageView::from_raw(40)),
                Step::DestroyView(vk::ImageView::from_raw(41)),
                Step::DestroySwapchain(vk::SwapchainKHR::from_raw(4)),
            ]
        );
    }

    #[test]
    fn image_views_are_single_level_color_2d() {
        let info = image_view_info(vk::Image::null(), vk::Format::B8G8R8A8_SRGB);
        assert_eq!(info.view_type, vk::ImageViewType::TYPE_2D);
        assert_eq!(info.components.r, vk::ComponentSwizzle::R);
        assert_eq!(info.components.a, vk::ComponentSwizzle::A);
        let range = info.subresource_range;
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!((range.base_mip_level, range.level_count), (0, 1));
        assert_eq!((range.base_array_layer, range.layer_count), (0, 1));
    }
}
