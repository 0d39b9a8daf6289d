// SPDX-License-Identifier: CEPL-1.0
//! Vulkan bring-up: instance, validation, surface, device, swap chain and a
//! fixed-function triangle pipeline, owned and torn down by [`VulkanContext`].
#![deny(unsafe_op_in_unsafe_fn)]

pub mod ash_driver;
pub mod context;
pub mod debug;
pub mod device;
pub mod driver;
pub mod error;
mod instance;
pub mod pipeline;
pub mod probe;
pub mod surface;
pub mod swapchain;

#[cfg(test)]
mod testing;

pub use ash_driver::AshDriver;
pub use context::{ContextConfig, ContextState, VulkanContext};
pub use debug::{DebugConfig, DebugSink, MessageKind, Severity, TracingSink};
pub use driver::Driver;
pub use error::{InitError, ShaderError};
pub use instance::VALIDATION_LAYER;
pub use pipeline::ShaderBinaries;
pub use surface::{required_extensions, SurfaceTarget};
pub use swapchain::{PresentModePreference, RenderSize};

/// SPIR-V for the hardcoded triangle, compiled from `shaders/` at build time.
#[cfg(feature = "builtin-shaders")]
pub mod shaders {
    pub const TRIANGLE_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv"));
    pub const TRIANGLE_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv"));

    pub fn triangle() -> crate::ShaderBinaries {
        crate::ShaderBinaries {
            vertex: TRIANGLE_VERT.to_vec(),
            fragment: TRIANGLE_FRAG.to_vec(),
        }
    }
}
