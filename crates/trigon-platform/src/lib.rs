// SPDX-License-Identifier: CEPL-1.0
//! Window glue over winit. The renderer only reads from the window: its raw
//! handles and its framebuffer size.
use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

pub use winit;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 720,
            title: "Vulkan Tutorial".to_owned(),
        }
    }
}

pub fn create_window(event_loop: &ActiveEventLoop, cfg: &WindowConfig) -> Result<Window> {
    let attrs = Window::default_attributes()
        .with_title(cfg.title.clone())
        .with_inner_size(PhysicalSize::new(cfg.width.max(1), cfg.height.max(1)));

    let window = event_loop
        .create_window(attrs)
        .with_context(|| format!("create_window({}x{})", cfg.width, cfg.height))?;

    tracing::info!(
        "window `{}` created ({}x{})",
        cfg.title,
        cfg.width,
        cfg.height
    );
    Ok(window)
}

/// Current drawable size in pixels.
pub fn framebuffer_size(window: &Window) -> (u32, u32) {
    let size = window.inner_size();
    (size.width, size.height)
}
