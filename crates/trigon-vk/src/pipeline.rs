// SPDX-License-Identifier: CEPL-1.0
//! Render pass and graphics pipeline for drawing into the swap chain.
use crate::driver::{Driver, PipelineRequest, RenderPassRequest, ShaderStage};
use crate::error::{InitError, Result, ShaderError};
use ash::vk;
use std::ffi::CStr;
use std::io::Cursor;

const ENTRY_POINT: &CStr = c"main";

/// Compiled SPIR-V for the two stages, as raw bytes.
#[derive(Clone, Debug, Default)]
pub struct ShaderBinaries {
    pub vertex: Vec<u8>,
    pub fragment: Vec<u8>,
}

/// Splits a SPIR-V blob into words. The byte length must be a non-zero
/// multiple of 4.
pub fn decode_shader(bytes: &[u8]) -> Result<Vec<u32>, ShaderError> {
    if bytes.is_empty() {
        return Err(ShaderError::Empty);
    }
    if bytes.len() % 4 != 0 {
        return Err(ShaderError::Misaligned(bytes.len()));
    }
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|_| ShaderError::Misaligned(bytes.len()))
}

pub(crate) fn create_render_pass<D: Driver>(
    driver: &mut D,
    device: vk::Device,
    format: vk::Format,
) -> Result<vk::RenderPass> {
    let req = RenderPassRequest {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        subpass_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let render_pass = driver
        .create_render_pass(device, &req)
        .map_err(InitError::RenderPassCreation)?;
    tracing::debug!("render pass created: {:?}", render_pass);
    Ok(render_pass)
}

/// No descriptors or push constants yet.
pub(crate) fn create_pipeline_layout<D: Driver>(
    driver: &mut D,
    device: vk::Device,
) -> Result<vk::PipelineLayout> {
    driver
        .create_pipeline_layout(device)
        .map_err(InitError::PipelineCreation)
}

fn create_module<D: Driver>(
    driver: &mut D,
    device: vk::Device,
    stage: vk::ShaderStageFlags,
    bytes: &[u8],
) -> Result<vk::ShaderModule> {
    let code = decode_shader(bytes).map_err(|reason| InitError::ShaderModuleCreation { stage, reason })?;
    driver
        .create_shader_module(device, &code)
        .map_err(|e| InitError::ShaderModuleCreation {
            stage,
            reason: ShaderError::Rejected(e),
        })
}

fn pipeline_request(
    vert: vk::ShaderModule,
    frag: vk::ShaderModule,
    extent: vk::Extent2D,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
) -> PipelineRequest {
    PipelineRequest {
        stages: vec![
            ShaderStage {
                stage: vk::ShaderStageFlags::VERTEX,
                module: vert,
                entry_point: ENTRY_POINT,
            },
            ShaderStage {
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: frag,
                entry_point: ENTRY_POINT,
            },
        ],
        // no vertex input: the triangle is hardcoded in the vertex shader
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        viewport: vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        },
        scissor: vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        },
        dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::CLOCKWISE,
        depth_bias: false,
        line_width: 1.0,
        samples: vk::SampleCountFlags::TYPE_1,
        depth_stencil: false,
        blend_enable: false,
        color_write_mask: vk::ColorComponentFlags::R
            | vk::ColorComponentFlags::G
            | vk::ColorComponentFlags::B
            | vk::ColorComponentFlags::A,
        layout,
        render_pass,
        subpass: 0,
    }
}

/// Builds the triangle pipeline. Shader modules only live for the duration of
/// this call.
pub(crate) fn build_pipeline<D: Driver>(
    driver: &mut D,
    device: vk::Device,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    shaders: &ShaderBinaries,
    extent: vk::Extent2D,
) -> Result<vk::Pipeline> {
    // --- Shader modules (destroyed before return) ---
    let vert = create_module(driver, device, vk::ShaderStageFlags::VERTEX, &shaders.vertex)?;
    let frag = match create_module(driver, device, vk::ShaderStageFlags::FRAGMENT, &shaders.fragment) {
        Ok(frag) => frag,
        Err(e) => {
            driver.destroy_shader_module(device, vert);
            return Err(e);
        }
    };

    let req = pipeline_request(vert, frag, extent, layout, render_pass);
    let pipeline = driver.create_graphics_pipeline(device, &req);

    driver.destroy_shader_module(device, vert);
    driver.destroy_shader_module(device, frag);

    let pipeline = pipeline.map_err(InitError::PipelineCreation)?;
    tracing::info!(
        "graphics pipeline created for {}x{}",
        extent.width,
        extent.height
    );
    Ok(pipeline)
}
