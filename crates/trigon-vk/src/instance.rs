// SPDX-License-Identifier: CEPL-1.0
//! Instance creation: validate layers/extensions up front, then create the
//! instance with the debug messenger chained in.
use crate::debug::{DebugChannel, DebugConfig};
use crate::driver::{Driver, InstanceRequest};
use crate::error::{InitError, Result};
use crate::probe;
use ash::vk;
use std::ffi::{CStr, CString};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub(crate) const DEFAULT_APP_NAME: &str = "Hello Triangle";
pub(crate) const DEFAULT_ENGINE_NAME: &str = "No Engine";

/// What the caller asks of the instance.
#[derive(Debug)]
pub struct InstanceConfig {
    pub app_name: String,
    pub engine_name: String,
    pub app_version: u32,
    pub engine_version: u32,
    pub api_version: u32,
    /// Platform WSI extensions from the windowing layer.
    pub required_extensions: Vec<CString>,
    /// `Some` enables the validation layer and the debug channel.
    pub debug: Option<DebugConfig>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_owned(),
            engine_name: DEFAULT_ENGINE_NAME.to_owned(),
            app_version: vk::make_api_version(0, 1, 0, 0),
            engine_version: vk::make_api_version(0, 1, 0, 0),
            api_version: vk::API_VERSION_1_0,
            required_extensions: Vec::new(),
            debug: None,
        }
    }
}

/// A created instance and, when debugging, its not-yet-installed channel.
pub(crate) struct InstanceParts {
    pub handle: vk::Instance,
    pub debug: Option<DebugChannel>,
    pub layers: Vec<CString>,
}

fn cstring(s: &str) -> CString {
    // Interior NULs cannot name anything Vulkan knows about; drop them.
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

pub(crate) fn create_instance<D: Driver>(
    driver: &mut D,
    cfg: InstanceConfig,
) -> Result<InstanceParts> {
    let debugging = cfg.debug.is_some();

    // --- Layers ---
    let layers = probe::available_layers(driver);
    tracing::debug!("available layers: {:?}", layers);
    let enabled_layers: Vec<CString> = if debugging {
        let name = VALIDATION_LAYER.to_string_lossy();
        if !layers.contains(name.as_ref()) {
            return Err(InitError::ValidationLayerUnavailable(name.into_owned()));
        }
        vec![VALIDATION_LAYER.to_owned()]
    } else {
        Vec::new()
    };

    // --- Extensions (layer-provided ones count) ---
    let layer_refs: Vec<&CStr> = enabled_layers.iter().map(|l| l.as_c_str()).collect();
    let available = probe::available_instance_extensions(driver, &layer_refs);
    tracing::info!("available instance extensions:");
    for ext in &available {
        tracing::info!("\t{ext}");
    }

    let mut extensions: Vec<CString> = Vec::with_capacity(cfg.required_extensions.len() + 2);
    let wanted = cfg
        .required_extensions
        .iter()
        .map(CString::as_c_str)
        .chain(debugging.then_some(ash::ext::debug_utils::NAME));
    for ext in wanted {
        if !extensions.iter().any(|e| e.as_c_str() == ext) {
            extensions.push(ext.to_owned());
        }
    }

    let missing: Vec<String> = extensions
        .iter()
        .map(|e| e.to_string_lossy().into_owned())
        .filter(|e| !available.contains(e))
        .collect();
    if !missing.is_empty() {
        return Err(InitError::InstanceExtensionUnavailable(missing));
    }

    // Portability drivers (MoltenVK) are only enumerated when asked for.
    let mut flags = vk::InstanceCreateFlags::empty();
    let portability = ash::khr::portability_enumeration::NAME;
    if available.contains(portability.to_string_lossy().as_ref())
        && !extensions.iter().any(|e| e.as_c_str() == portability)
    {
        extensions.push(portability.to_owned());
        flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    // --- Create, with the messenger chained so creation-time messages land ---
    let debug = cfg.debug.map(DebugChannel::new);
    let req = InstanceRequest {
        app_name: cstring(&cfg.app_name),
        app_version: cfg.app_version,
        engine_name: cstring(&cfg.engine_name),
        engine_version: cfg.engine_version,
        api_version: cfg.api_version,
        layers: enabled_layers.clone(),
        extensions,
        flags,
        debug: debug.as_ref().map(DebugChannel::request),
    };

    let handle = driver
        .create_instance(&req)
        .map_err(InitError::ContextCreationFailed)?;
    tracing::info!(
        "instance created (app `{}`, {} layer(s), {} extension(s))",
        cfg.app_name,
        req.layers.len(),
        req.extensions.len()
    );

    Ok(InstanceParts {
        handle,
        debug,
        layers: enabled_layers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MockDriver};

    fn surface_exts() -> Vec<CString> {
        vec![c"VK_KHR_surface".to_owned(), c"VK_KHR_xcb_surface".to_owned()]
    }

    fn wsi_driver() -> MockDriver {
        MockDriver::new().with_instance_extensions(&["VK_KHR_surface", "VK_KHR_xcb_surface"])
    }

    #[test]
    fn creates_instance_with_required_extensions() {
        let mut driver = wsi_driver();
        let cfg = InstanceConfig {
            required_extensions: surface_exts(),
            ..Default::default()
        };

        let created = create_instance(&mut driver, cfg).unwrap();
        assert!(created.debug.is_none());
        assert!(created.layers.is_empty());

        let req = driver.log().instance_request.clone().unwrap();
        assert_eq!(req.app_name.as_c_str(), c"Hello Triangle");
        assert_eq!(req.engine_name.as_c_str(), c"No Engine");
        assert_eq!(req.api_version, vk::API_VERSION_1_0);
        assert_eq!(req.extensions, surface_exts());
        assert!(req.debug.is_none());
        assert_eq!(driver.log().calls, vec![Call::CreateInstance]);
    }

    #[test]
    fn missing_validation_layer_is_named() {
        let mut driver = wsi_driver();
        let cfg = InstanceConfig {
            debug: Some(DebugConfig::default()),
            ..Default::default()
        };

        match create_instance(&mut driver, cfg) {
            Err(InitError::ValidationLayerUnavailable(name)) => {
                assert_eq!(name, "VK_LAYER_KHRONOS_validation")
            }
            other => panic!("unexpected: {:?}", other.err()),
        }
        assert!(driver.log().calls.is_empty());
    }

    #[test]
    fn missing_extension_fails_before_creation() {
        let mut driver = MockDriver::new().with_instance_extensions(&["VK_KHR_surface"]);
        let cfg = InstanceConfig {
            required_extensions: surface_exts(),
            ..Default::default()
        };

        match create_instance(&mut driver, cfg) {
            Err(InitError::InstanceExtensionUnavailable(missing)) => {
                assert_eq!(missing, vec!["VK_KHR_xcb_surface".to_owned()])
            }
            other => panic!("unexpected: {:?}", other.err()),
        }
        assert!(driver.log().calls.is_empty());
    }

    #[test]
    fn repeated_extensions_are_requested_once() {
        let mut driver = wsi_driver()
            .with_layers(&["VK_LAYER_KHRONOS_validation"])
            .with_layer_extensions("VK_LAYER_KHRONOS_validation", &["VK_EXT_debug_utils"]);
        let cfg = InstanceConfig {
            required_extensions: vec![
                c"VK_EXT_debug_utils".to_owned(),
                c"VK_KHR_surface".to_owned(),
                c"VK_KHR_surface".to_owned(),
            ],
            debug: Some(DebugConfig::default()),
            ..Default::default()
        };

        create_instance(&mut driver, cfg).unwrap();
        let req = driver.log().instance_request.clone().unwrap();
        assert_eq!(
            req.extensions,
            vec![c"VK_EXT_debug_utils".to_owned(), c"VK_KHR_surface".to_owned()]
        );
    }

    #[test]
    fn debug_messenger_is_chained_into_creation() {
        let mut driver = wsi_driver()
            .with_layers(&["VK_LAYER_KHRONOS_validation"])
            .with_layer_extensions("VK_LAYER_KHRONOS_validation", &["VK_EXT_debug_utils"]);
        let cfg = InstanceConfig {
            required_extensions: surface_exts(),
            debug: Some(DebugConfig::default()),
            ..Default::default()
        };

        let created = create_instance(&mut driver, cfg).unwrap();
        let channel = created.debug.as_ref().unwrap();

        let req = driver.log().instance_request.clone().unwrap();
        assert_eq!(req.layers, vec![VALIDATION_LAYER.to_owned()]);
        assert!(req
            .extensions
            .iter()
            .any(|e| e.as_c_str() == ash::ext::debug_utils::NAME));
        let chained = req.debug.unwrap();
        assert_eq!(chained.user_data, channel.request().user_data);
        assert_eq!(
            chained.severity,
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        );
    }

    #[test]
    fn debug_requires_debug_utils_extension() {
        let mut driver = wsi_driver().with_layers(&["VK_LAYER_KHRONOS_validation"]);
        let cfg = InstanceConfig {
            debug: Some(DebugConfig::default()),
            ..Default::default()
        };

        match create_instance(&mut driver, cfg) {
            Err(InitError::InstanceExtensionUnavailable(missing)) => {
                assert_eq!(missing, vec!["VK_EXT_debug_utils".to_owned()])
            }
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[test]
    fn rejected_creation_carries_status() {
        let mut driver = wsi_driver().fail_at(Call::CreateInstance);
        let err = create_instance(&mut driver, InstanceConfig::default()).err();
        assert!(matches!(
            err,
            Some(InitError::ContextCreationFailed(vk::Result::ERROR_INITIALIZATION_FAILED))
        ));
    }

    #[test]
    fn portability_enumeration_enabled_when_offered() {
        let mut driver = MockDriver::new()
            .with_instance_extensions(&["VK_KHR_surface", "VK_KHR_portability_enumeration"]);
        let cfg = InstanceConfig {
            required_extensions: vec![c"VK_KHR_surface".to_owned()],
            ..Default::default()
        };

        create_instance(&mut driver, cfg).unwrap();
        let req = driver.log().instance_request.clone().unwrap();
        assert!(req
            .flags
            .contains(vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR));
        assert!(req
            .extensions
            .iter()
            .any(|e| e.as_c_str() == c"VK_KHR_portability_enumeration"));
    }
}
