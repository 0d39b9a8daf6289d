// SPDX-License-Identifier: CEPL-1.0
//! The seam between negotiation/ownership logic and the graphics API.
//!
//! Everything that talks to Vulkan goes through [`Driver`]. Handles are plain
//! `ash::vk` handles; the driver keeps whatever dispatch tables it needs.
//!
//! # Contract
//!
//! Handles passed back into a driver must have been produced by that same
//! driver and not yet destroyed. Destroy calls are made exactly once per
//! handle, children before parents; [`crate::VulkanContext`] is the only caller
//! that upholds this and should be the only user of a driver.
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_void, CStr, CString};

/// Debug messenger parameters. `user_data` points at the sink the callback
/// forwards to and must outlive the messenger.
#[derive(Clone, Copy, Debug)]
pub struct MessengerRequest {
    pub severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    pub kinds: vk::DebugUtilsMessageTypeFlagsEXT,
    pub user_data: *mut c_void,
}

#[derive(Clone, Debug)]
pub struct InstanceRequest {
    pub app_name: CString,
    pub app_version: u32,
    pub engine_name: CString,
    pub engine_version: u32,
    pub api_version: u32,
    pub layers: Vec<CString>,
    pub extensions: Vec<CString>,
    pub flags: vk::InstanceCreateFlags,
    /// Chained into the instance create-info so creation-time messages are seen.
    pub debug: Option<MessengerRequest>,
}

#[derive(Clone, Debug)]
pub struct DeviceRequest {
    pub physical: vk::PhysicalDevice,
    /// One queue (priority 1.0) is requested from each family. Deduplicated.
    pub queue_families: Vec<u32>,
    pub extensions: Vec<CString>,
    pub layers: Vec<CString>,
    pub features: vk::PhysicalDeviceFeatures,
}

/// Image sharing across queue families. Exclusive mode never carries an index
/// list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sharing {
    Exclusive,
    Concurrent(Vec<u32>),
}

#[derive(Clone, Debug)]
pub struct SwapchainRequest {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub sharing: Sharing,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    pub clipped: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct ImageViewRequest {
    pub image: vk::Image,
    pub format: vk::Format,
    pub view_type: vk::ImageViewType,
    pub components: vk::ComponentMapping,
    pub subresource_range: vk::ImageSubresourceRange,
}

/// A single-subpass render pass with one color attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderPassRequest {
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
    pub subpass_layout: vk::ImageLayout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderStage {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
    pub entry_point: &'static CStr,
}

#[derive(Clone, Debug)]
pub struct PipelineRequest {
    pub stages: Vec<ShaderStage>,
    pub topology: vk::PrimitiveTopology,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_bias: bool,
    pub line_width: f32,
    pub samples: vk::SampleCountFlags,
    pub depth_stencil: bool,
    pub blend_enable: bool,
    pub color_write_mask: vk::ColorComponentFlags,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

pub trait Driver {
    // --- loader-level queries ---
    fn enumerate_layers(&self) -> VkResult<Vec<CString>>;
    /// Instance extensions, either from the implementation (`None`) or provided
    /// by the named layer.
    fn enumerate_instance_extensions(&self, layer: Option<&CStr>) -> VkResult<Vec<CString>>;

    // --- instance scope ---
    fn create_instance(&mut self, req: &InstanceRequest) -> VkResult<vk::Instance>;
    fn destroy_instance(&mut self, instance: vk::Instance);
    fn create_debug_messenger(
        &mut self,
        instance: vk::Instance,
        req: &MessengerRequest,
    ) -> VkResult<vk::DebugUtilsMessengerEXT>;
    fn destroy_debug_messenger(
        &mut self,
        instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    );
    fn create_surface(
        &mut self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR>;
    fn destroy_surface(&mut self, instance: vk::Instance, surface: vk::SurfaceKHR);

    // --- physical device queries ---
    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn physical_device_properties(&self, pd: vk::PhysicalDevice) -> vk::PhysicalDeviceProperties;
    fn physical_device_features(&self, pd: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures;
    fn queue_family_properties(&self, pd: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    fn enumerate_device_extensions(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<CString>>;
    fn surface_support(
        &self,
        pd: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;
    fn surface_capabilities(
        &self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_present_modes(
        &self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    // --- device scope ---
    fn create_device(&mut self, req: &DeviceRequest) -> VkResult<vk::Device>;
    /// Queues are borrowed from the device and never destroyed.
    fn device_queue(&self, device: vk::Device, family: u32, index: u32) -> vk::Queue;
    fn destroy_device(&mut self, device: vk::Device);

    fn create_swapchain(
        &mut self,
        device: vk::Device,
        req: &SwapchainRequest,
    ) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>>;
    fn destroy_swapchain(&mut self, device: vk::Device, swapchain: vk::SwapchainKHR);

    fn create_image_view(
        &mut self,
        device: vk::Device,
        req: &ImageViewRequest,
    ) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&mut self, device: vk::Device, view: vk::ImageView);

    fn create_render_pass(
        &mut self,
        device: vk::Device,
        req: &RenderPassRequest,
    ) -> VkResult<vk::RenderPass>;
    fn destroy_render_pass(&mut self, device: vk::Device, render_pass: vk::RenderPass);

    fn create_shader_module(
        &mut self,
        device: vk::Device,
        code: &[u32],
    ) -> VkResult<vk::ShaderModule>;
    fn destroy_shader_module(&mut self, device: vk::Device, module: vk::ShaderModule);

    fn create_pipeline_layout(&mut self, device: vk::Device) -> VkResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&mut self, device: vk::Device, layout: vk::PipelineLayout);

    fn create_graphics_pipeline(
        &mut self,
        device: vk::Device,
        req: &PipelineRequest,
    ) -> VkResult<vk::Pipeline>;
    fn destroy_pipeline(&mut self, device: vk::Device, pipeline: vk::Pipeline);
}
