// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

/// Mailbox when offered, otherwise FIFO (always supported).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

fn is_srgb_nonlinear(f: &vk::SurfaceFormatKHR, format: vk::Format) -> bool {
    f.format == format && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
}

/// BGRA8 sRGB, then RGBA8 sRGB, then whatever the driver lists first.
/// `None` only when the surface reports no formats at all.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| is_srgb_nonlinear(f, vk::Format::B8G8R8A8_SRGB))
        .or_else(|| {
            formats
                .iter()
                .find(|f| is_srgb_nonlinear(f, vk::Format::R8G8B8A8_SRGB))
        })
        .or_else(|| formats.first())
        .copied()
}

// Info only
pub(crate) fn format_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        vk::Format::A2B10G10R10_UNORM_PACK32 => "A2B10G10R10_UNORM",
        vk::Format::R16G16B16A16_SFLOAT => "R16G16B16A16_SFLOAT",
        _ => "OTHER",
    }
}

pub(crate) fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn chosen(formats: &[vk::SurfaceFormatKHR]) -> Option<(vk::Format, vk::ColorSpaceKHR)> {
        choose_surface_format(formats).map(|f| (f.format, f.color_space))
    }

    fn key(f: vk::SurfaceFormatKHR) -> Option<(vk::Format, vk::ColorSpaceKHR)> {
        Some((f.format, f.color_space))
    }

    #[test]
    fn prefers_bgra_srgb_over_earlier_entries() {
        let formats = [
            fmt(
                vk::Format::R8G8B8A8_UNORM,
                vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            ),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(chosen(&formats), key(formats[1]));
    }

    #[test]
    fn falls_back_to_rgba_srgb() {
        let formats = [
            fmt(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::HDR10_ST2084_EXT),
        ];
        assert_eq!(chosen(&formats), key(formats[1]));
    }

    #[test]
    fn bgra_wins_even_when_listed_after_rgba() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(chosen(&formats), key(formats[1]));
    }

    #[test]
    fn falls_back_to_first_reported_format() {
        let formats = [fmt(
            vk::Format::R8G8B8A8_UNORM,
            vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        )];
        assert_eq!(chosen(&formats), key(formats[0]));
        assert_eq!(chosen(&[]), None);
    }

    #[test]
    fn prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn falls_back_to_fifo() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }
}
