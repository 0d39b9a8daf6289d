// SPDX-License-Identifier: CEPL-1.0
//! In-memory [`Driver`] for unit tests. Fabricates handles, records every
//! create/destroy in order and can be told to fail a given call.
use crate::debug::vulkan_debug_callback;
use crate::driver::{
    DeviceRequest, Driver, ImageViewRequest, InstanceRequest, MessengerRequest, PipelineRequest,
    RenderPassRequest, SwapchainRequest,
};
use crate::surface::SurfaceTarget;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, WebDisplayHandle, WebWindowHandle,
};
use std::cell::{Ref, RefCell};
use std::collections::BTreeSet;
use std::ffi::{c_char, CStr, CString};
use std::rc::Rc;

const PHYSICAL_BASE: u64 = 0x100;
const QUEUE_BASE: u64 = 0x900;
const IMAGE_BASE: u64 = 0x7000;
const HANDLE_BASE: u64 = 0x1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    CreateInstance,
    DestroyInstance,
    CreateDebugMessenger,
    DestroyDebugMessenger,
    CreateSurface,
    DestroySurface,
    CreateDevice,
    DestroyDevice,
    CreateSwapchain,
    DestroySwapchain,
    CreateImageView,
    DestroyImageView,
    CreateRenderPass,
    DestroyRenderPass,
    CreateShaderModule,
    DestroyShaderModule,
    CreatePipelineLayout,
    DestroyPipelineLayout,
    CreatePipeline,
    DestroyPipeline,
}

#[derive(Default)]
pub(crate) struct MockLog {
    pub calls: Vec<Call>,
    /// Raw values of created, not yet destroyed handles.
    pub live: BTreeSet<u64>,
    /// Destroys of handles that were never created or already destroyed.
    pub unknown_destroys: usize,
    /// Destroys of a handle that was not the newest live one. Shader modules
    /// are transient and not tracked here.
    pub out_of_order: usize,
    stack: Vec<u64>,
    pub instance_request: Option<InstanceRequest>,
    pub messenger_request: Option<MessengerRequest>,
    pub device_request: Option<DeviceRequest>,
    pub swapchain_request: Option<SwapchainRequest>,
    pub image_view_requests: Vec<ImageViewRequest>,
    pub render_pass_request: Option<RenderPassRequest>,
    pub pipeline_request: Option<PipelineRequest>,
}

/// One fake physical device.
#[derive(Clone, Debug)]
pub(crate) struct MockDevice {
    pub name: &'static str,
    pub device_type: vk::PhysicalDeviceType,
    pub max_image_dimension: u32,
    pub geometry_shader: bool,
    pub families: Vec<vk::QueueFlags>,
    pub present_families: Vec<u32>,
    pub extensions: Vec<CString>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl MockDevice {
    fn new(device_type: vk::PhysicalDeviceType, max_image_dimension: u32) -> Self {
        Self {
            name: "mock gpu",
            device_type,
            max_image_dimension,
            geometry_shader: true,
            families: vec![vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE],
            present_families: vec![0],
            extensions: vec![ash::khr::swapchain::NAME.to_owned()],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: 1080,
                    height: 720,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    pub fn discrete(max_image_dimension: u32) -> Self {
        Self::new(vk::PhysicalDeviceType::DISCRETE_GPU, max_image_dimension)
    }

    pub fn integrated(max_image_dimension: u32) -> Self {
        Self::new(vk::PhysicalDeviceType::INTEGRATED_GPU, max_image_dimension)
    }

    pub fn without_geometry_shader(mut self) -> Self {
        self.geometry_shader = false;
        self
    }

    pub fn without_extensions(mut self) -> Self {
        self.extensions.clear();
        self
    }

    /// Graphics on family 0, presentation only on family 1.
    pub fn split_queues(mut self) -> Self {
        self.families = vec![vk::QueueFlags::GRAPHICS, vk::QueueFlags::TRANSFER];
        self.present_families = vec![1];
        self
    }
}

pub(crate) struct MockDriver {
    log: Rc<RefCell<MockLog>>,
    layers: Vec<CString>,
    instance_extensions: Vec<CString>,
    layer_extensions: Vec<(CString, Vec<CString>)>,
    devices: Vec<MockDevice>,
    /// Makes every loader-level enumeration fail.
    pub fail_enumeration: Option<vk::Result>,
    fail: Option<(Call, usize)>,
    next_handle: u64,
}

fn cstrings(names: &[&str]) -> Vec<CString> {
    names
        .iter()
        .map(|n| CString::new(*n).expect("test names have no NUL"))
        .collect()
}

pub(crate) fn web_target() -> SurfaceTarget {
    SurfaceTarget {
        display: RawDisplayHandle::Web(WebDisplayHandle::new()),
        window: RawWindowHandle::Web(WebWindowHandle::new(1)),
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            log: Rc::default(),
            layers: Vec::new(),
            instance_extensions: Vec::new(),
            layer_extensions: Vec::new(),
            devices: Vec::new(),
            fail_enumeration: None,
            fail: None,
            next_handle: HANDLE_BASE,
        }
    }

    /// Everything a full context build with validation needs.
    pub fn ready() -> Self {
        Self::new()
            .with_layers(&["VK_LAYER_KHRONOS_validation"])
            .with_instance_extensions(&["VK_KHR_surface"])
            .with_layer_extensions("VK_LAYER_KHRONOS_validation", &["VK_EXT_debug_utils"])
            .with_devices(vec![MockDevice::discrete(4096)])
    }

    pub fn with_layers(mut self, names: &[&str]) -> Self {
        self.layers = cstrings(names);
        self
    }

    pub fn with_instance_extensions(mut self, names: &[&str]) -> Self {
        self.instance_extensions = cstrings(names);
        self
    }

    pub fn with_layer_extensions(mut self, layer: &str, names: &[&str]) -> Self {
        let layer = CString::new(layer).expect("test names have no NUL");
        self.layer_extensions.push((layer, cstrings(names)));
        self
    }

    pub fn with_devices(mut self, devices: Vec<MockDevice>) -> Self {
        self.devices = devices;
        self
    }

    pub fn fail_at(self, call: Call) -> Self {
        self.fail_at_nth(call, 1)
    }

    /// Fails the `nth` (1-based) occurrence of `call`.
    pub fn fail_at_nth(mut self, call: Call, nth: usize) -> Self {
        self.fail = Some((call, nth));
        self
    }

    pub fn log(&self) -> Ref<'_, MockLog> {
        self.log.borrow()
    }

    /// Shared view of the log that outlives the driver.
    pub fn log_handle(&self) -> Rc<RefCell<MockLog>> {
        Rc::clone(&self.log)
    }

    pub fn physical(index: usize) -> vk::PhysicalDevice {
        vk::PhysicalDevice::from_raw(PHYSICAL_BASE + index as u64)
    }

    fn device(&self, pd: vk::PhysicalDevice) -> Option<&MockDevice> {
        let index = pd.as_raw().checked_sub(PHYSICAL_BASE)?;
        self.devices.get(usize::try_from(index).ok()?)
    }

    fn enumeration<T>(&self, value: T) -> VkResult<T> {
        match self.fail_enumeration {
            Some(e) => Err(e),
            None => Ok(value),
        }
    }

    fn create<H: Handle>(&mut self, call: Call) -> VkResult<H> {
        let mut log = self.log.borrow_mut();
        log.calls.push(call);
        let seen = log.calls.iter().filter(|c| **c == call).count();
        if self.fail == Some((call, seen)) {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }

        let raw = self.next_handle;
        self.next_handle += 1;
        log.live.insert(raw);
        if call != Call::CreateShaderModule {
            log.stack.push(raw);
        }
        Ok(H::from_raw(raw))
    }

    fn destroy<H: Handle>(&mut self, call: Call, handle: H) {
        let mut log = self.log.borrow_mut();
        log.calls.push(call);
        let raw = handle.as_raw();
        if !log.live.remove(&raw) {
            log.unknown_destroys += 1;
        }
        if call == Call::DestroyShaderModule {
            return;
        }
        if log.stack.last() == Some(&raw) {
            log.stack.pop();
        } else {
            log.out_of_order += 1;
            log.stack.retain(|&h| h != raw);
        }
    }
}

impl Driver for MockDriver {
    fn enumerate_layers(&self) -> VkResult<Vec<CString>> {
        self.enumeration(self.layers.clone())
    }

    fn enumerate_instance_extensions(&self, layer: Option<&CStr>) -> VkResult<Vec<CString>> {
        let list = match layer {
            None => self.instance_extensions.clone(),
            Some(layer) => self
                .layer_extensions
                .iter()
                .filter(|(l, _)| l.as_c_str() == layer)
                .flat_map(|(_, exts)| exts.iter().cloned())
                .collect(),
        };
        self.enumeration(list)
    }

    fn create_instance(&mut self, req: &InstanceRequest) -> VkResult<vk::Instance> {
        self.log.borrow_mut().instance_request = Some(req.clone());
        let instance = self.create(Call::CreateInstance)?;

        // Chained messenger: report something during creation like a real layer would.
        if let Some(debug) = req.debug {
            if debug
                .severity
                .contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING)
            {
                let data = vk::DebugUtilsMessengerCallbackDataEXT {
                    p_message: c"mock: vkCreateInstance".as_ptr(),
                    ..Default::default()
                };
                // SAFETY: user_data is the pending channel's sink slot, alive for this call.
                unsafe {
                    vulkan_debug_callback(
                        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                        &data,
                        debug.user_data,
                    );
                }
            }
        }
        Ok(instance)
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        self.destroy(Call::DestroyInstance, instance);
    }

    fn create_debug_messenger(
        &mut self,
        _instance: vk::Instance,
        req: &MessengerRequest,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        self.log.borrow_mut().messenger_request = Some(*req);
        self.create(Call::CreateDebugMessenger)
    }

    fn destroy_debug_messenger(
        &mut self,
        _instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    ) {
        self.destroy(Call::DestroyDebugMessenger, messenger);
    }

    fn create_surface(
        &mut self,
        _instance: vk::Instance,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        self.create(Call::CreateSurface)
    }

    fn destroy_surface(&mut self, _instance: vk::Instance, surface: vk::SurfaceKHR) {
        self.destroy(Call::DestroySurface, surface);
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok((0..self.devices.len()).map(Self::physical).collect())
    }

    fn physical_device_properties(&self, pd: vk::PhysicalDevice) -> vk::PhysicalDeviceProperties {
        let mut props = vk::PhysicalDeviceProperties::default();
        if let Some(dev) = self.device(pd) {
            props.device_type = dev.device_type;
            props.limits.max_image_dimension2_d = dev.max_image_dimension;
            for (dst, &b) in props.device_name.iter_mut().zip(dev.name.as_bytes()) {
                *dst = b as c_char;
            }
        }
        props
    }

    fn physical_device_features(&self, pd: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures {
        let on = self.device(pd).is_some_and(|d| d.geometry_shader);
        vk::PhysicalDeviceFeatures {
            geometry_shader: if on { vk::TRUE } else { vk::FALSE },
            ..Default::default()
        }
    }

    fn queue_family_properties(&self, pd: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.device(pd)
            .map(|d| {
                d.families
                    .iter()
                    .map(|&queue_flags| vk::QueueFamilyProperties {
                        queue_flags,
                        queue_count: 1,
                        ..Default::default()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn enumerate_device_extensions(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        Ok(self.device(pd).map(|d| d.extensions.clone()).unwrap_or_default())
    }

    fn surface_support(
        &self,
        pd: vk::PhysicalDevice,
        family: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        Ok(self
            .device(pd)
            .is_some_and(|d| d.present_families.contains(&family)))
    }

    fn surface_capabilities(
        &self,
        pd: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.device(pd)
            .map(|d| d.capabilities)
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)
    }

    fn surface_formats(
        &self,
        pd: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.device(pd).map(|d| d.formats.clone()).unwrap_or_default())
    }

    fn surface_present_modes(
        &self,
        pd: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self
            .device(pd)
            .map(|d| d.present_modes.clone())
            .unwrap_or_default())
    }

    fn create_device(&mut self, req: &DeviceRequest) -> VkResult<vk::Device> {
        self.log.borrow_mut().device_request = Some(req.clone());
        self.create(Call::CreateDevice)
    }

    fn device_queue(&self, _device: vk::Device, family: u32, _index: u32) -> vk::Queue {
        vk::Queue::from_raw(QUEUE_BASE + u64::from(family))
    }

    fn destroy_device(&mut self, device: vk::Device) {
        self.destroy(Call::DestroyDevice, device);
    }

    fn create_swapchain(
        &mut self,
        _device: vk::Device,
        req: &SwapchainRequest,
    ) -> VkResult<vk::SwapchainKHR> {
        self.log.borrow_mut().swapchain_request = Some(req.clone());
        self.create(Call::CreateSwapchain)
    }

    fn swapchain_images(
        &self,
        _device: vk::Device,
        _swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        let count = self
            .log
            .borrow()
            .swapchain_request
            .as_ref()
            .map_or(0, |r| r.min_image_count);
        Ok((0..u64::from(count))
            .map(|i| vk::Image::from_raw(IMAGE_BASE + i))
            .collect())
    }

    fn destroy_swapchain(&mut self, _device: vk::Device, swapchain: vk::SwapchainKHR) {
        self.destroy(Call::DestroySwapchain, swapchain);
    }

    fn create_image_view(
        &mut self,
        _device: vk::Device,
        req: &ImageViewRequest,
    ) -> VkResult<vk::ImageView> {
        self.log.borrow_mut().image_view_requests.push(*req);
        self.create(Call::CreateImageView)
    }

    fn destroy_image_view(&mut self, _device: vk::Device, view: vk::ImageView) {
        self.destroy(Call::DestroyImageView, view);
    }

    fn create_render_pass(
        &mut self,
        _device: vk::Device,
        req: &RenderPassRequest,
    ) -> VkResult<vk::RenderPass> {
        self.log.borrow_mut().render_pass_request = Some(*req);
        self.create(Call::CreateRenderPass)
    }

    fn destroy_render_pass(&mut self, _device: vk::Device, render_pass: vk::RenderPass) {
        self.destroy(Call::DestroyRenderPass, render_pass);
    }

    fn create_shader_module(
        &mut self,
        _device: vk::Device,
        _code: &[u32],
    ) -> VkResult<vk::ShaderModule> {
        self.create(Call::CreateShaderModule)
    }

    fn destroy_shader_module(&mut self, _device: vk::Device, module: vk::ShaderModule) {
        self.destroy(Call::DestroyShaderModule, module);
    }

    fn create_pipeline_layout(&mut self, _device: vk::Device) -> VkResult<vk::PipelineLayout> {
        self.create(Call::CreatePipelineLayout)
    }

    fn destroy_pipeline_layout(&mut self, _device: vk::Device, layout: vk::PipelineLayout) {
        self.destroy(Call::DestroyPipelineLayout, layout);
    }

    fn create_graphics_pipeline(
        &mut self,
        _device: vk::Device,
        req: &PipelineRequest,
    ) -> VkResult<vk::Pipeline> {
        self.log.borrow_mut().pipeline_request = Some(req.clone());
        self.create(Call::CreatePipeline)
    }

    fn destroy_pipeline(&mut self, _device: vk::Device, pipeline: vk::Pipeline) {
        self.destroy(Call::DestroyPipeline, pipeline);
    }
}
