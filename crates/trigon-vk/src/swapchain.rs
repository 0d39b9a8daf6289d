// SPDX-License-Identifier: CEPL-1.0
//! Swap chain negotiation and creation.
//!
//! The `choose_*` functions are pure: they take what the surface reports and
//! return what to ask for. [`create_swap_chain`] does the driver work.
use crate::device::QueueFamilyResolution;
use crate::driver::{Driver, ImageViewRequest, Sharing, SwapchainRequest};
use crate::error::{InitError, Result};
use ash::vk;

/// Framebuffer size in pixels, as reported by the windowing layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Which present mode to try before falling back to FIFO.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PresentModePreference {
    Fifo,
    #[default]
    Mailbox,
    Immediate,
}

impl PresentModePreference {
    pub fn mode(self) -> vk::PresentModeKHR {
        match self {
            PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
            PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
            PresentModePreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// What a device/surface pair supports. Queried fresh for every pair.
#[derive(Clone, Debug, Default)]
pub struct SwapChainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapChainSupportDetails {
    pub fn query<D: Driver>(
        driver: &D,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        // capabilities: image counts, transforms, current extent (or u32::MAX for free-size)
        let capabilities = driver
            .surface_capabilities(pd, surface)
            .map_err(InitError::query("get_physical_device_surface_capabilities"))?;
        let formats = driver
            .surface_formats(pd, surface)
            .map_err(InitError::query("get_physical_device_surface_formats"))?;
        let present_modes = driver
            .surface_present_modes(pd, surface)
            .map_err(InitError::query("get_physical_device_surface_present_modes"))?;

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// At least one format and one present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Everything [`create_swap_chain`] needs, already decided.
#[derive(Clone, Debug)]
pub struct SwapChainConfiguration {
    /// The surface the queue resolution was computed against.
    pub surface: vk::SurfaceKHR,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub sharing: Sharing,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// BGRA8 sRGB with the non-linear sRGB color space if offered, else whatever
/// the surface lists first. `None` only for an empty list.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

/// FIFO is the only mode every implementation must support.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentModePreference,
) -> vk::PresentModeKHR {
    let wanted = preference.mode();
    if modes.contains(&wanted) {
        wanted
    } else {
        vk::PresentModeKHR::FIFO
    }
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: framebuffer
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 == "no max").
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        wanted
    } else {
        wanted.min(caps.max_image_count)
    }
}

pub fn sharing_for(queues: &QueueFamilyResolution) -> Sharing {
    match (queues.graphics, queues.present) {
        (Some(g), Some(p)) if g != p => Sharing::Concurrent(vec![g, p]),
        _ => Sharing::Exclusive,
    }
}

/// Fails if `queues` was resolved against a different surface (or none).
pub fn negotiate(
    support: &SwapChainSupportDetails,
    queues: &QueueFamilyResolution,
    surface: vk::SurfaceKHR,
    framebuffer: RenderSize,
    preference: PresentModePreference,
) -> Result<SwapChainConfiguration> {
    if queues.surface() != Some(surface) {
        return Err(InitError::ResolutionSurfaceMismatch {
            resolved: queues.surface(),
            target: surface,
        });
    }

    let caps = &support.capabilities;
    let surface_format = choose_surface_format(&support.formats)
        .ok_or(InitError::SwapChainCreation(vk::Result::ERROR_FORMAT_NOT_SUPPORTED))?;
    let present_mode = choose_present_mode(&support.present_modes, preference);
    let extent = choose_extent(caps, framebuffer);
    let image_count = choose_image_count(caps);

    // Prefer IDENTITY if supported, otherwise use current to avoid extra blits.
    let pre_transform = if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    };

    tracing::info!(
        "format: {} / {}, present_mode: {} (wanted {:?}), extent: {}x{}, images(min={} → picked={})",
        fmt_name(surface_format.format),
        cs_name(surface_format.color_space),
        pm_name(present_mode),
        preference,
        extent.width,
        extent.height,
        caps.min_image_count,
        image_count
    );

    Ok(SwapChainConfiguration {
        surface,
        surface_format,
        present_mode,
        extent,
        image_count,
        sharing: sharing_for(queues),
        pre_transform,
    })
}

/// A live swap chain. Images belong to the chain; views belong to us.
#[derive(Debug)]
pub struct SwapChain {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
    pub config: SwapChainConfiguration,
}

impl SwapChain {
    pub fn format(&self) -> vk::Format {
        self.config.surface_format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }

    /// Views first (newest first), then the chain.
    pub(crate) fn destroy<D: Driver>(self, driver: &mut D, device: vk::Device) {
        for view in self.views.into_iter().rev() {
            driver.destroy_image_view(device, view);
        }
        driver.destroy_swapchain(device, self.handle);
        tracing::debug!("swap chain destroyed");
    }
}

fn view_request(image: vk::Image, format: vk::Format) -> ImageViewRequest {
    ImageViewRequest {
        image,
        format,
        view_type: vk::ImageViewType::TYPE_2D,
        components: vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        },
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
    }
}

pub(crate) fn create_swap_chain<D: Driver>(
    driver: &mut D,
    device: vk::Device,
    config: SwapChainConfiguration,
) -> Result<SwapChain> {
    let req = SwapchainRequest {
        surface: config.surface,
        min_image_count: config.image_count,
        format: config.surface_format,
        extent: config.extent,
        // only rendered to; add TRANSFER_* here before blitting into it
        usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        sharing: config.sharing.clone(),
        pre_transform: config.pre_transform,
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
        present_mode: config.present_mode,
        clipped: true,
    };

    // --- Create swapchain + fetch images ---
    let handle = driver
        .create_swapchain(device, &req)
        .map_err(InitError::SwapChainCreation)?;
    let images = match driver.swapchain_images(device, handle) {
        Ok(images) => images,
        Err(e) => {
            driver.destroy_swapchain(device, handle);
            return Err(InitError::SwapChainCreation(e));
        }
    };

    // --- One view per image; unwind what exists if one fails ---
    let mut views = Vec::with_capacity(images.len());
    for &image in &images {
        match driver.create_image_view(device, &view_request(image, config.surface_format.format)) {
            Ok(view) => views.push(view),
            Err(e) => {
                for view in views.into_iter().rev() {
                    driver.destroy_image_view(device, view);
                }
                driver.destroy_swapchain(device, handle);
                return Err(InitError::ImageViewCreation(e));
            }
        }
    }

    tracing::info!(
        "swap chain created: {} image(s), {} view(s)",
        images.len(),
        views.len()
    );

    Ok(SwapChain {
        handle,
        images,
        views,
        config,
    })
}

// Info only
fn fmt_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        _ => "OTHER",
    }
}
fn cs_name(cs: vk::ColorSpaceKHR) -> &'static str {
    match cs {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => "SRGB_NONLINEAR",
        _ => "OTHER",
    }
}
fn pm_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}
