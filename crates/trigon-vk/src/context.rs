// SPDX-License-Identifier: CEPL-1.0
//! [`VulkanContext`]: the single owner of every object the bring-up creates.
use crate::debug::{DebugChannel, DebugConfig};
use crate::device::{self, LogicalDevice, SelectedDevice};
use crate::driver::Driver;
use crate::error::Result;
use crate::instance::{self, InstanceConfig};
use crate::pipeline::{self, ShaderBinaries};
use crate::surface::{self, SurfaceTarget};
use crate::swapchain::{self, PresentModePreference, RenderSize, SwapChain, SwapChainSupportDetails};
use ash::vk;
use std::ffi::CString;

/// How far construction got. Moves forward only; `TornDown` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContextState {
    Uninitialized,
    ContextReady,
    DeviceSelected,
    SurfaceBound,
    DeviceAndQueuesReady,
    SwapChainReady,
    PipelineReady,
    TornDown,
}

#[derive(Debug)]
pub struct ContextConfig {
    pub app_name: String,
    pub engine_name: String,
    /// Instance extensions the window system needs, see
    /// [`crate::surface::required_extensions`].
    pub required_extensions: Vec<CString>,
    /// `None` disables validation and the debug channel entirely.
    pub debug: Option<DebugConfig>,
    pub present_mode: PresentModePreference,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            app_name: instance::DEFAULT_APP_NAME.to_owned(),
            engine_name: instance::DEFAULT_ENGINE_NAME.to_owned(),
            required_extensions: Vec::new(),
            debug: cfg!(debug_assertions).then(DebugConfig::default),
            present_mode: PresentModePreference::default(),
        }
    }
}

/// Instance, debug channel, surface, device, swap chain and pipeline, built in
/// that order by [`VulkanContext::new`] and destroyed in reverse by
/// [`VulkanContext::teardown`] (also run on drop).
///
/// If construction fails part way, the partially built context is dropped and
/// exactly the objects created so far are released.
pub struct VulkanContext<D: Driver> {
    driver: D,
    state: ContextState,

    instance: Option<vk::Instance>,
    layers: Vec<CString>,
    debug: Option<DebugChannel>,
    surface: Option<vk::SurfaceKHR>,
    physical: Option<SelectedDevice>,
    device: Option<LogicalDevice>,
    swap_chain: Option<SwapChain>,
    render_pass: Option<vk::RenderPass>,
    pipeline_layout: Option<vk::PipelineLayout>,
    pipeline: Option<vk::Pipeline>,
}

impl<D: Driver> VulkanContext<D> {
    pub fn new(
        driver: D,
        config: ContextConfig,
        target: &SurfaceTarget,
        framebuffer: RenderSize,
        shaders: &ShaderBinaries,
    ) -> Result<Self> {
        let mut ctx = Self {
            driver,
            state: ContextState::Uninitialized,
            instance: None,
            layers: Vec::new(),
            debug: None,
            surface: None,
            physical: None,
            device: None,
            swap_chain: None,
            render_pass: None,
            pipeline_layout: None,
            pipeline: None,
        };
        // on error `ctx` drops here and tears down what exists
        ctx.build(config, target, framebuffer, shaders)?;
        Ok(ctx)
    }

    fn build(
        &mut self,
        config: ContextConfig,
        target: &SurfaceTarget,
        framebuffer: RenderSize,
        shaders: &ShaderBinaries,
    ) -> Result<()> {
        // --- Instance + debug channel ---
        let parts = instance::create_instance(
            &mut self.driver,
            InstanceConfig {
                app_name: config.app_name,
                engine_name: config.engine_name,
                required_extensions: config.required_extensions,
                debug: config.debug,
                ..InstanceConfig::default()
            },
        )?;
        let instance = parts.handle;
        self.instance = Some(instance);
        self.layers = parts.layers;
        self.debug = parts.debug;
        if let Some(debug) = self.debug.as_mut() {
            debug.install(&mut self.driver, instance)?;
        }
        self.state = ContextState::ContextReady;

        // --- Device selection without a surface (graphics only) ---
        let first = device::select_physical_device(&self.driver, None)?;
        self.physical = Some(first);
        self.state = ContextState::DeviceSelected;

        // --- Surface ---
        let surface = surface::bind_surface(&mut self.driver, instance, target)?;
        self.surface = Some(surface);
        self.state = ContextState::SurfaceBound;

        // --- Re-query against the surface; a resolution never outlives its surface ---
        let selected = device::select_physical_device(&self.driver, Some(surface))?;
        if let Some(first) = &self.physical {
            if first.physical != selected.physical {
                tracing::info!(
                    "present support moved selection from `{}` to `{}`",
                    first.name,
                    selected.name
                );
            }
        }
        let selected = self.physical.insert(selected);

        // --- Logical device + queues ---
        let logical = device::create_logical_device(&mut self.driver, selected, &self.layers)?;
        let device = logical.handle;
        self.device = Some(logical);
        self.state = ContextState::DeviceAndQueuesReady;

        // --- Swap chain + views ---
        let support = match &selected.support {
            Some(support) => support.clone(),
            None => SwapChainSupportDetails::query(&self.driver, selected.physical, surface)?,
        };
        let sc_config =
            swapchain::negotiate(&support, &selected.queues, surface, framebuffer, config.present_mode)?;
        let chain = swapchain::create_swap_chain(&mut self.driver, device, sc_config)?;
        let (format, extent) = (chain.format(), chain.extent());
        self.swap_chain = Some(chain);
        self.state = ContextState::SwapChainReady;

        // --- Render pass, layout, pipeline ---
        let render_pass = pipeline::create_render_pass(&mut self.driver, device, format)?;
        self.render_pass = Some(render_pass);
        let layout = pipeline::create_pipeline_layout(&mut self.driver, device)?;
        self.pipeline_layout = Some(layout);
        self.pipeline = Some(pipeline::build_pipeline(
            &mut self.driver,
            device,
            render_pass,
            layout,
            shaders,
            extent,
        )?);
        self.state = ContextState::PipelineReady;

        tracing::info!("vulkan context ready");
        Ok(())
    }

    /// Releases everything in reverse construction order. Idempotent.
    //
    // Nothing is ever submitted, so there is no GPU work to wait for.
    pub fn teardown(&mut self) {
        if self.state == ContextState::TornDown {
            return;
        }
        let driver = &mut self.driver;

        if let Some(device) = self.device.as_ref().map(|d| d.handle) {
            if let Some(pipeline) = self.pipeline.take() {
                driver.destroy_pipeline(device, pipeline);
            }
            if let Some(layout) = self.pipeline_layout.take() {
                driver.destroy_pipeline_layout(device, layout);
            }
            if let Some(render_pass) = self.render_pass.take() {
                driver.destroy_render_pass(device, render_pass);
            }
            if let Some(chain) = self.swap_chain.take() {
                chain.destroy(driver, device);
            }
        }
        if let Some(device) = self.device.take() {
            driver.destroy_device(device.handle);
            tracing::debug!("device destroyed");
        }
        self.physical = None;

        if let Some(instance) = self.instance {
            if let Some(surface) = self.surface.take() {
                driver.destroy_surface(instance, surface);
                tracing::debug!("surface destroyed");
            }
            if let Some(debug) = self.debug.as_mut().filter(|d| d.messenger().is_some()) {
                debug.uninstall(driver, instance);
            }
        }
        if let Some(instance) = self.instance.take() {
            driver.destroy_instance(instance);
            tracing::debug!("instance destroyed");
        }
        // the sink must outlive the instance: destruction reports through it too
        self.debug = None;

        self.state = ContextState::TornDown;
        tracing::info!("vulkan context torn down");
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn instance(&self) -> Option<vk::Instance> {
        self.instance
    }

    pub fn debug_messenger(&self) -> Option<vk::DebugUtilsMessengerEXT> {
        self.debug.as_ref().and_then(DebugChannel::messenger)
    }

    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.surface
    }

    pub fn physical_device(&self) -> Option<&SelectedDevice> {
        self.physical.as_ref()
    }

    pub fn device(&self) -> Option<&LogicalDevice> {
        self.device.as_ref()
    }

    pub fn swap_chain(&self) -> Option<&SwapChain> {
        self.swap_chain.as_ref()
    }

    pub fn render_pass(&self) -> Option<vk::RenderPass> {
        self.render_pass
    }

    pub fn pipeline_layout(&self) -> Option<vk::PipelineLayout> {
        self.pipeline_layout
    }

    pub fn pipeline(&self) -> Option<vk::Pipeline> {
        self.pipeline
    }
}

impl<D: Driver> Drop for VulkanContext<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
