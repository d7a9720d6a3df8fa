use ash::vk;

use crate::backend::{Capabilities, SampleFormat};

pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = |format: vk::Format| {
        formats.iter().copied().find(|candidate| {
            candidate.format == format
                && candidate.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
    };
    preferred(vk::Format::B8G8R8A8_UNORM)
        .or_else(|| preferred(vk::Format::R8G8B8A8_UNORM))
        .or_else(|| formats.first().copied())
        .unwrap_or(vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        })
}

pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|mode| *mode == vk::PresentModeKHR::MAILBOX)
        .or_else(|| modes.iter().copied().find(|mode| *mode == vk::PresentModeKHR::FIFO))
        .or_else(|| modes.first().copied())
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: window_size.0.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width.max(capabilities.min_image_extent.width),
        ),
        height: window_size.1.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height.max(capabilities.min_image_extent.height),
        ),
    }
}

pub fn target_format(format: SampleFormat) -> vk::Format {
    match format {
        SampleFormat::HalfFloat => vk::Format::R16G16B16A16_SFLOAT,
        SampleFormat::Unorm8 => vk::Format::R8G8B8A8_UNORM,
    }
}

fn renderable(features: vk::FormatFeatureFlags) -> bool {
    features.contains(vk::FormatFeatureFlags::COLOR_ATTACHMENT | vk::FormatFeatureFlags::SAMPLED_IMAGE)
}

pub fn capabilities_from_features(
    half_float: vk::FormatFeatureFlags,
    unorm: vk::FormatFeatureFlags,
) -> Option<Capabilities> {
    let half = renderable(half_float);
    if !half && !renderable(unorm) {
        return None;
    }
    Some(Capabilities {
        half_float: half,
        half_float_linear: half
            && half_float.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR),
    })
}
