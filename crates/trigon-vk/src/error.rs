// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use thiserror::Error;

/// Why a shader blob could not be turned into SPIR-V words.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    #[error("shader binary is empty")]
    Empty,
    #[error("shader binary length {0} is not a multiple of 4")]
    Misaligned(usize),
    #[error("vulkan rejected the shader module: {0:?}")]
    Rejected(vk::Result),
}

/// Every way building a [`crate::VulkanContext`] can fail. All of them are
/// terminal for the construction sequence.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("could not load the Vulkan loader: {0}")]
    LoaderUnavailable(#[from] ash::LoadingError),
    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),
    #[error("validation layer `{0}` requested but not installed")]
    ValidationLayerUnavailable(String),
    #[error("instance extensions not available: {0:?}")]
    InstanceExtensionUnavailable(Vec<String>),
    #[error("instance creation failed: {0:?}")]
    ContextCreationFailed(vk::Result),
    #[error("debug messenger creation failed: {0:?}")]
    DebugChannelCreationFailed(vk::Result),
    #[error("no Vulkan capable device found")]
    NoVulkanCapableDevice,
    #[error("no suitable physical device (every candidate scored 0)")]
    NoSuitableDevice,
    #[error("{what} failed: {result:?}")]
    DeviceQuery {
        what: &'static str,
        result: vk::Result,
    },
    #[error("surface creation failed: {0:?}")]
    SurfaceCreation(vk::Result),
    #[error("logical device creation failed: {0:?}")]
    LogicalDeviceCreation(vk::Result),
    #[error("queue families resolved for surface {resolved:?} used with {target:?}")]
    ResolutionSurfaceMismatch {
        resolved: Option<vk::SurfaceKHR>,
        target: vk::SurfaceKHR,
    },
    #[error("swap chain creation failed: {0:?}")]
    SwapChainCreation(vk::Result),
    #[error("image view creation failed: {0:?}")]
    ImageViewCreation(vk::Result),
    #[error("{stage:?} shader module: {reason}")]
    ShaderModuleCreation {
        stage: vk::ShaderStageFlags,
        reason: ShaderError,
    },
    #[error("render pass creation failed: {0:?}")]
    RenderPassCreation(vk::Result),
    #[error("pipeline creation failed: {0:?}")]
    PipelineCreation(vk::Result),
}

impl InitError {
    pub(crate) fn query(what: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| InitError::DeviceQuery { what, result }
    }
}

pub type Result<T, E = InitError> = std::result::Result<T, E>;
