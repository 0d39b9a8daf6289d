// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{AppCfg, Args, ShaderCfg};
use std::path::PathBuf;
use tracing::{error, info};
use trigon_core::{fs::read_binary_file, init_tracing};
use trigon_platform::{create_window, framebuffer_size};
use trigon_vk::{
    required_extensions, AshDriver, RenderSize, ShaderBinaries, SurfaceTarget, VulkanContext,
};

use trigon_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

const DEFAULT_VERT: &str = "shaders/vert.spv";
const DEFAULT_FRAG: &str = "shaders/frag.spv";

#[cfg(feature = "builtin-shaders")]
fn builtin_shaders() -> Option<ShaderBinaries> {
    Some(trigon_vk::shaders::triangle())
}

#[cfg(not(feature = "builtin-shaders"))]
fn builtin_shaders() -> Option<ShaderBinaries> {
    None
}

fn load_shaders(cfg: &ShaderCfg) -> Result<ShaderBinaries> {
    if cfg.vertex.is_none() && cfg.fragment.is_none() {
        if let Some(builtin) = builtin_shaders() {
            info!("using built-in triangle shaders");
            return Ok(builtin);
        }
    }

    let vert = cfg.vertex.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_VERT));
    let frag = cfg.fragment.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_FRAG));
    Ok(ShaderBinaries {
        vertex: read_binary_file(&vert).context("vertex shader")?,
        fragment: read_binary_file(&frag).context("fragment shader")?,
    })
}

struct App {
    cfg: AppCfg,
    // declared before `window` so it drops first
    context: Option<VulkanContext<AshDriver>>,
    window: Option<Window>,
    failure: Option<anyhow::Error>,
}

impl App {
    fn init_vulkan(&self, window: &Window) -> Result<VulkanContext<AshDriver>> {
        let target = SurfaceTarget::from_window(window).context("window handles")?;
        let extensions = required_extensions(target.display).context("surface extensions")?;
        let shaders = load_shaders(&self.cfg.shaders)?;
        let driver = AshDriver::load().context("load Vulkan")?;

        let (width, height) = framebuffer_size(window);
        let ctx = VulkanContext::new(
            driver,
            self.cfg.context_config(extensions),
            &target,
            RenderSize::new(width, height),
            &shaders,
        )
        .context("vulkan init")?;
        Ok(ctx)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        event_loop.set_control_flow(ControlFlow::Wait);

        let window = match create_window(event_loop, &self.cfg.window_config()) {
            Ok(w) => w,
            Err(e) => {
                error!("{e:#}");
                self.failure = Some(e);
                event_loop.exit();
                return;
            }
        };

        match self.init_vulkan(&window) {
            Ok(ctx) => {
                info!("context state = {:?}", ctx.state());
                self.context = Some(ctx);
                self.window = Some(window);
            }
            Err(e) => {
                error!("{e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.context = None;
                self.window = None;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                // swap chain is not recreated yet
                info!("Resized → {}x{}", new_size.width, new_size.height);
            }

            _ => {}
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = AppCfg::load(&args.config);
    cfg.apply(&args);
    info!("config = {cfg:?}");

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App {
        cfg,
        context: None,
        window: None,
        failure: None,
    };
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
