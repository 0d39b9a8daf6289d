// SPDX-License-Identifier: CEPL-1.0
//! [`Driver`] over `ash`. Holds the dispatch tables for the one instance and
//! the one device it creates at a time.
use crate::debug::vulkan_debug_callback;
use crate::driver::{
    DeviceRequest, Driver, ImageViewRequest, InstanceRequest, MessengerRequest, PipelineRequest,
    RenderPassRequest, Sharing, SwapchainRequest,
};
use crate::error::InitError;
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_char, c_void, CStr, CString};

struct InstanceFns {
    instance: ash::Instance,
    surface: surface::Instance,
    debug_utils: Option<debug_utils::Instance>,
}

struct DeviceFns {
    device: ash::Device,
    swapchain: swapchain::Device,
}

pub struct AshDriver {
    entry: ash::Entry,
    instance: Option<InstanceFns>,
    device: Option<DeviceFns>,
}

impl AshDriver {
    /// Loads the system Vulkan loader.
    pub fn load() -> Result<Self, InitError> {
        // SAFETY: the loader is only unloaded when `entry` drops, after every
        // object created through it has been destroyed by the owning context.
        let entry = unsafe { ash::Entry::load()? };
        Ok(Self {
            entry,
            instance: None,
            device: None,
        })
    }

    fn inst(&self) -> VkResult<&InstanceFns> {
        self.instance
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn dev(&self) -> VkResult<&DeviceFns> {
        self.device
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }
}

fn name_ptrs(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|n| n.as_ptr()).collect()
}

fn owned_names<'a>(names: impl Iterator<Item = Result<&'a CStr, std::ffi::FromBytesUntilNulError>>) -> Vec<CString> {
    names.filter_map(Result::ok).map(CStr::to_owned).collect()
}

fn messenger_info(req: &MessengerRequest) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: req.severity,
        message_type: req.kinds,
        pfn_user_callback: Some(vulkan_debug_callback),
        p_user_data: req.user_data,
        ..Default::default()
    }
}

impl Driver for AshDriver {
    fn enumerate_layers(&self) -> VkResult<Vec<CString>> {
        // SAFETY: plain loader query.
        let layers = unsafe { self.entry.enumerate_instance_layer_properties()? };
        Ok(owned_names(layers.iter().map(|l| l.layer_name_as_c_str())))
    }

    fn enumerate_instance_extensions(&self, layer: Option<&CStr>) -> VkResult<Vec<CString>> {
        // SAFETY: `layer` is a valid C string or None.
        let exts = unsafe { self.entry.enumerate_instance_extension_properties(layer)? };
        Ok(owned_names(exts.iter().map(|e| e.extension_name_as_c_str())))
    }

    fn create_instance(&mut self, req: &InstanceRequest) -> VkResult<vk::Instance> {
        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: req.app_name.as_ptr(),
            application_version: req.app_version,
            p_engine_name: req.engine_name.as_ptr(),
            engine_version: req.engine_version,
            api_version: req.api_version,
            ..Default::default()
        };

        let layers = name_ptrs(&req.layers);
        let extensions = name_ptrs(&req.extensions);
        let debug_info = req.debug.as_ref().map(messenger_info);

        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            // chained so messages from create/destroy instance are delivered too
            p_next: debug_info
                .as_ref()
                .map_or(std::ptr::null(), |d| (d as *const vk::DebugUtilsMessengerCreateInfoEXT).cast::<c_void>()),
            flags: req.flags,
            p_application_info: &app_info,
            enabled_layer_count: layers.len() as u32,
            pp_enabled_layer_names: layers.as_ptr(),
            enabled_extension_count: extensions.len() as u32,
            pp_enabled_extension_names: extensions.as_ptr(),
            ..Default::default()
        };

        // SAFETY: every pointer in create_info refers to locals alive for the call.
        let instance = unsafe { self.entry.create_instance(&create_info, None)? };
        let debug_enabled = req
            .extensions
            .iter()
            .any(|e| e.as_c_str() == debug_utils::NAME);

        let handle = instance.handle();
        self.instance = Some(InstanceFns {
            surface: surface::Instance::new(&self.entry, &instance),
            debug_utils: debug_enabled.then(|| debug_utils::Instance::new(&self.entry, &instance)),
            instance,
        });
        Ok(handle)
    }

    fn destroy_instance(&mut self, _instance: vk::Instance) {
        if let Some(fns) = self.instance.take() {
            // SAFETY: all children were destroyed by the caller.
            unsafe { fns.instance.destroy_instance(None) };
        }
    }

    fn create_debug_messenger(
        &mut self,
        _instance: vk::Instance,
        req: &MessengerRequest,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        let debug_utils = self
            .inst()?
            .debug_utils
            .as_ref()
            .ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)?;
        // SAFETY: user_data outlives the messenger (see DebugChannel).
        unsafe { debug_utils.create_debug_utils_messenger(&messenger_info(req), None) }
    }

    fn destroy_debug_messenger(
        &mut self,
        _instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    ) {
        if let Some(debug_utils) = self.instance.as_ref().and_then(|i| i.debug_utils.as_ref()) {
            // SAFETY: messenger was created from this instance and not yet destroyed.
            unsafe { debug_utils.destroy_debug_utils_messenger(messenger, None) };
        }
    }

    fn create_surface(
        &mut self,
        _instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let fns = self.inst()?;
        // SAFETY: the window outlives the context that owns this surface.
        unsafe { ash_window::create_surface(&self.entry, &fns.instance, display, window, None) }
    }

    fn destroy_surface(&mut self, _instance: vk::Instance, surface: vk::SurfaceKHR) {
        if let Some(fns) = &self.instance {
            // SAFETY: the swap chain using this surface is already gone.
            unsafe { fns.surface.destroy_surface(surface, None) };
        }
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        // SAFETY: live instance.
        unsafe { self.inst()?.instance.enumerate_physical_devices() }
    }

    fn physical_device_properties(&self, pd: vk::PhysicalDevice) -> vk::PhysicalDeviceProperties {
        self.inst()
            // SAFETY: pd was enumerated from this instance.
            .map(|i| unsafe { i.instance.get_physical_device_properties(pd) })
            .unwrap_or_default()
    }

    fn physical_device_features(&self, pd: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures {
        self.inst()
            // SAFETY: pd was enumerated from this instance.
            .map(|i| unsafe { i.instance.get_physical_device_features(pd) })
            .unwrap_or_default()
    }

    fn queue_family_properties(&self, pd: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.inst()
            // SAFETY: pd was enumerated from this instance.
            .map(|i| unsafe { i.instance.get_physical_device_queue_family_properties(pd) })
            .unwrap_or_default()
    }

    fn enumerate_device_extensions(&self, pd: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        // SAFETY: pd was enumerated from this instance.
        let exts = unsafe { self.inst()?.instance.enumerate_device_extension_properties(pd)? };
        Ok(owned_names(exts.iter().map(|e| e.extension_name_as_c_str())))
    }

    fn surface_support(
        &self,
        pd: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        // SAFETY: family < queue family count, surface belongs to this instance.
        unsafe {
            self.inst()?
                .surface
                .get_physical_device_surface_support(pd, family, surface)
        }
    }

    fn surface_capabilities(
        &self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        // SAFETY: live pd/surface pair.
        unsafe {
            self.inst()?
                .surface
                .get_physical_device_surface_capabilities(pd, surface)
        }
    }

    fn surface_formats(
        &self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        // SAFETY: live pd/surface pair.
        unsafe {
            self.inst()?
                .surface
                .get_physical_device_surface_formats(pd, surface)
        }
    }

    fn surface_present_modes(
        &self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        // SAFETY: live pd/surface pair.
        unsafe {
            self.inst()?
                .surface
                .get_physical_device_surface_present_modes(pd, surface)
        }
    }

    fn create_device(&mut self, req: &DeviceRequest) -> VkResult<vk::Device> {
        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = req
            .queue_families
            .iter()
            .map(|&family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();
        let layers = name_ptrs(&req.layers);
        let extensions = name_ptrs(&req.extensions);

        #[allow(deprecated)] // device layers: ignored by current loaders, needed by old ones
        let create_info = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_layer_count: layers.len() as u32,
            pp_enabled_layer_names: layers.as_ptr(),
            enabled_extension_count: extensions.len() as u32,
            pp_enabled_extension_names: extensions.as_ptr(),
            p_enabled_features: &req.features,
            ..Default::default()
        };

        let fns = self.inst()?;
        // SAFETY: pointers refer to locals alive for the call.
        let device = unsafe { fns.instance.create_device(req.physical, &create_info, None)? };
        let swapchain = swapchain::Device::new(&fns.instance, &device);
        let handle = device.handle();
        self.device = Some(DeviceFns { device, swapchain });
        Ok(handle)
    }

    fn device_queue(&self, _device: vk::Device, family: u32, index: u32) -> vk::Queue {
        self.dev()
            // SAFETY: family/index were requested at device creation.
            .map(|d| unsafe { d.device.get_device_queue(family, index) })
            .unwrap_or_default()
    }

    fn destroy_device(&mut self, _device: vk::Device) {
        if let Some(fns) = self.device.take() {
            // SAFETY: every child object is already destroyed.
            unsafe {
                fns.device.device_wait_idle().ok();
                fns.device.destroy_device(None);
            }
        }
    }

    fn create_swapchain(
        &mut self,
        _device: vk::Device,
        req: &SwapchainRequest,
    ) -> VkResult<vk::SwapchainKHR> {
        let (sharing_mode, families) = match &req.sharing {
            Sharing::Exclusive => (vk::SharingMode::EXCLUSIVE, &[][..]),
            Sharing::Concurrent(families) => (vk::SharingMode::CONCURRENT, families.as_slice()),
        };

        let create_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: req.surface,
            min_image_count: req.min_image_count,
            image_format: req.format.format,
            image_color_space: req.format.color_space,
            image_extent: req.extent,
            image_array_layers: 1, // non-stereo
            image_usage: req.usage,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: families.len() as u32,
            p_queue_family_indices: if families.is_empty() {
                std::ptr::null()
            } else {
                families.as_ptr()
            },
            pre_transform: req.pre_transform,
            composite_alpha: req.composite_alpha,
            present_mode: req.present_mode,
            clipped: vk::Bool32::from(req.clipped),
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };

        // SAFETY: surface and device are live; index list outlives the call.
        unsafe { self.dev()?.swapchain.create_swapchain(&create_info, None) }
    }

    fn swapchain_images(
        &self,
        _device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        // SAFETY: swapchain is live.
        unsafe { self.dev()?.swapchain.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&mut self, _device: vk::Device, swapchain: vk::SwapchainKHR) {
        if let Some(fns) = &self.device {
            // SAFETY: its image views are already destroyed.
            unsafe { fns.swapchain.destroy_swapchain(swapchain, None) };
        }
    }

    fn create_image_view(
        &mut self,
        _device: vk::Device,
        req: &ImageViewRequest,
    ) -> VkResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image: req.image,
            view_type: req.view_type,
            format: req.format,
            components: req.components,
            subresource_range: req.subresource_range,
            ..Default::default()
        };
        // SAFETY: image belongs to a live swap chain on this device.
        unsafe { self.dev()?.device.create_image_view(&create_info, None) }
    }

    fn destroy_image_view(&mut self, _device: vk::Device, view: vk::ImageView) {
        if let Some(fns) = &self.device {
            // SAFETY: nothing references the view any more.
            unsafe { fns.device.destroy_image_view(view, None) };
        }
    }

    fn create_render_pass(
        &mut self,
        _device: vk::Device,
        req: &RenderPassRequest,
    ) -> VkResult<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription {
            format: req.format,
            samples: req.samples,
            load_op: req.load_op,
            store_op: req.store_op,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: req.initial_layout,
            final_layout: req.final_layout,
            ..Default::default()
        };
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: req.subpass_layout,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            ..Default::default()
        };
        let create_info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_attachment,
            subpass_count: 1,
            p_subpasses: &subpass,
            ..Default::default()
        };
        // SAFETY: pointers refer to locals alive for the call.
        unsafe { self.dev()?.device.create_render_pass(&create_info, None) }
    }

    fn destroy_render_pass(&mut self, _device: vk::Device, render_pass: vk::RenderPass) {
        if let Some(fns) = &self.device {
            // SAFETY: the pipeline built against it is already destroyed.
            unsafe { fns.device.destroy_render_pass(render_pass, None) };
        }
    }

    fn create_shader_module(
        &mut self,
        _device: vk::Device,
        code: &[u32],
    ) -> VkResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_code: code.as_ptr(),
            code_size: code.len() * 4,
            ..Default::default()
        };
        // SAFETY: code is aligned SPIR-V words alive for the call.
        unsafe { self.dev()?.device.create_shader_module(&create_info, None) }
    }

    fn destroy_shader_module(&mut self, _device: vk::Device, module: vk::ShaderModule) {
        if let Some(fns) = &self.device {
            // SAFETY: modules are not needed once the pipeline exists.
            unsafe { fns.device.destroy_shader_module(module, None) };
        }
    }

    fn create_pipeline_layout(&mut self, _device: vk::Device) -> VkResult<vk::PipelineLayout> {
        // no descriptors/push constants yet
        let create_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            ..Default::default()
        };
        // SAFETY: live device.
        unsafe { self.dev()?.device.create_pipeline_layout(&create_info, None) }
    }

    fn destroy_pipeline_layout(&mut self, _device: vk::Device, layout: vk::PipelineLayout) {
        if let Some(fns) = &self.device {
            // SAFETY: the pipeline using it is already destroyed.
            unsafe { fns.device.destroy_pipeline_layout(layout, None) };
        }
    }

    fn create_graphics_pipeline(
        &mut self,
        _device: vk::Device,
        req: &PipelineRequest,
    ) -> VkResult<vk::Pipeline> {
        let stages: Vec<vk::PipelineShaderStageCreateInfo> = req
            .stages
            .iter()
            .map(|s| vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: s.stage,
                module: s.module,
                p_name: s.entry_point.as_ptr(),
                ..Default::default()
            })
            .collect();

        // --- Fixed-function pipeline states ---
        // Vertex input (none → hardcoded triangle in shader)
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: req.topology,
            primitive_restart_enable: vk::FALSE,
            ..Default::default()
        };
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: req.dynamic_states.len() as u32,
            p_dynamic_states: req.dynamic_states.as_ptr(),
            ..Default::default()
        };
        // initial values; overridden by the dynamic state at record time
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            p_viewports: &req.viewport,
            scissor_count: 1,
            p_scissors: &req.scissor,
            ..Default::default()
        };
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            depth_clamp_enable: vk::FALSE,
            rasterizer_discard_enable: vk::FALSE,
            polygon_mode: req.polygon_mode,
            cull_mode: req.cull_mode,
            front_face: req.front_face,
            depth_bias_enable: vk::Bool32::from(req.depth_bias),
            line_width: req.line_width,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: req.samples,
            sample_shading_enable: vk::FALSE,
            ..Default::default()
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            ..Default::default()
        };
        let color_blend_att = vk::PipelineColorBlendAttachmentState {
            color_write_mask: req.color_write_mask,
            blend_enable: vk::Bool32::from(req.blend_enable),
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            logic_op_enable: vk::FALSE,
            attachment_count: 1,
            p_attachments: &color_blend_att,
            ..Default::default()
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_depth_stencil_state: if req.depth_stencil {
                &depth_stencil
            } else {
                std::ptr::null()
            },
            p_color_blend_state: &color_blend,
            p_dynamic_state: &dynamic_state,
            layout: req.layout,
            render_pass: req.render_pass,
            subpass: req.subpass,
            ..Default::default()
        };

        // SAFETY: every pointer in pipeline_info refers to locals alive for the call.
        let pipelines = unsafe {
            self.dev()?.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
        }
        .map_err(|(_, err)| err)?;

        pipelines
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn destroy_pipeline(&mut self, _device: vk::Device, pipeline: vk::Pipeline) {
        if let Some(fns) = &self.device {
            // SAFETY: no command buffer references it.
            unsafe { fns.device.destroy_pipeline(pipeline, None) };
        }
    }
}
