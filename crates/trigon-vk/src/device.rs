// SPDX-License-Identifier: CEPL-1.0
//! Physical device selection, queue family resolution and logical device
//! creation.
use crate::driver::{DeviceRequest, Driver};
use crate::error::{InitError, Result};
use crate::swapchain::SwapChainSupportDetails;
use ash::prelude::VkResult;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};

/// Device extensions every candidate must offer.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

const DISCRETE_BONUS: u32 = 1000;

/// Graphics and present family indices of one device, valid for one surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct QueueFamilyResolution {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    surface: Option<vk::SurfaceKHR>,
}

impl QueueFamilyResolution {
    /// Scans `families` in index order, keeping the first graphics family and
    /// the first family `supports_present` accepts. Stops once both are known.
    /// Without a surface only the graphics family is looked for.
    pub fn resolve<F>(
        families: &[vk::QueueFamilyProperties],
        surface: Option<vk::SurfaceKHR>,
        mut supports_present: F,
    ) -> VkResult<Self>
    where
        F: FnMut(u32, vk::SurfaceKHR) -> VkResult<bool>,
    {
        let mut out = Self {
            surface,
            ..Self::default()
        };

        for (i, family) in (0u32..).zip(families) {
            if out.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                out.graphics = Some(i);
            }
            if let Some(surface) = surface {
                if out.present.is_none() && supports_present(i, surface)? {
                    out.present = Some(i);
                }
            }
            if out.is_complete() {
                break;
            }
        }

        Ok(out)
    }

    pub fn query<D: Driver>(
        driver: &D,
        pd: vk::PhysicalDevice,
        surface: Option<vk::SurfaceKHR>,
    ) -> Result<Self> {
        let families = driver.queue_family_properties(pd);
        Self::resolve(&families, surface, |i, s| driver.surface_support(pd, i, s))
            .map_err(InitError::query("get_physical_device_surface_support"))
    }

    #[cfg(test)]
    pub(crate) fn resolved(graphics: u32, present: u32, surface: vk::SurfaceKHR) -> Self {
        Self {
            graphics: Some(graphics),
            present: Some(present),
            surface: Some(surface),
        }
    }

    /// Both indices with a surface bound; graphics alone without one.
    pub fn is_complete(&self) -> bool {
        match self.surface {
            Some(_) => self.graphics.is_some() && self.present.is_some(),
            None => self.graphics.is_some(),
        }
    }

    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.surface
    }

    /// Distinct family indices, ascending.
    pub fn unique_families(&self) -> Vec<u32> {
        self.graphics
            .into_iter()
            .chain(self.present)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// 0 disqualifies. Otherwise discrete GPUs get a flat bonus and the largest
/// 2D image dimension breaks ties between classes.
pub fn score_device(
    props: &vk::PhysicalDeviceProperties,
    features: &vk::PhysicalDeviceFeatures,
    suitable: bool,
) -> u32 {
    if features.geometry_shader == vk::FALSE || !suitable {
        return 0;
    }

    let mut score = 0;
    if props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += DISCRETE_BONUS;
    }
    score.saturating_add(props.limits.max_image_dimension2_d)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub physical: vk::PhysicalDevice,
    pub score: u32,
}

/// Highest score wins; equal scores keep enumeration order. A best score of 0
/// selects nothing.
pub fn pick_best(mut candidates: Vec<DeviceCandidate>) -> Option<DeviceCandidate> {
    // sort_by is stable
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.into_iter().next().filter(|c| c.score > 0)
}

/// The chosen device with everything learned while scoring it.
#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub physical: vk::PhysicalDevice,
    pub name: String,
    pub score: u32,
    pub queues: QueueFamilyResolution,
    /// Present when selection ran against a surface.
    pub support: Option<SwapChainSupportDetails>,
}

struct Evaluation {
    name: String,
    score: u32,
    queues: QueueFamilyResolution,
    support: Option<SwapChainSupportDetails>,
}

fn missing_extensions<D: Driver>(driver: &D, pd: vk::PhysicalDevice) -> Result<Vec<&'static CStr>> {
    let available: BTreeSet<CString> = driver
        .enumerate_device_extensions(pd)
        .map_err(InitError::query("enumerate_device_extension_properties"))?
        .into_iter()
        .collect();

    Ok(REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .copied()
        .filter(|ext| !available.contains(*ext))
        .collect())
}

fn evaluate<D: Driver>(
    driver: &D,
    pd: vk::PhysicalDevice,
    surface: Option<vk::SurfaceKHR>,
) -> Result<Evaluation> {
    let props = driver.physical_device_properties(pd);
    let features = driver.physical_device_features(pd);
    let name = props
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let queues = QueueFamilyResolution::query(driver, pd, surface)?;
    let missing = missing_extensions(driver, pd)?;
    let support = match surface {
        Some(surface) => Some(SwapChainSupportDetails::query(driver, pd, surface)?),
        None => None,
    };

    let adequate = support
        .as_ref()
        .map_or(true, SwapChainSupportDetails::is_adequate);
    if !missing.is_empty() {
        tracing::debug!("{name}: missing device extensions {:?}", missing);
    }
    let suitable = queues.is_complete() && missing.is_empty() && adequate;

    Ok(Evaluation {
        score: score_device(&props, &features, suitable),
        name,
        queues,
        support,
    })
}

/// Scores every device against `surface` (or none) and picks the best.
pub(crate) fn select_physical_device<D: Driver>(
    driver: &D,
    surface: Option<vk::SurfaceKHR>,
) -> Result<SelectedDevice> {
    let devices = driver
        .enumerate_physical_devices()
        .map_err(InitError::query("enumerate_physical_devices"))?;
    if devices.is_empty() {
        return Err(InitError::NoVulkanCapableDevice);
    }

    let mut evaluations = Vec::with_capacity(devices.len());
    let mut candidates = Vec::with_capacity(devices.len());
    for &pd in &devices {
        let eval = match evaluate(driver, pd, surface) {
            Ok(eval) => eval,
            Err(e) => {
                tracing::warn!("skipping device {:?}: {e}", pd);
                Evaluation {
                    name: String::new(),
                    score: 0,
                    queues: QueueFamilyResolution::default(),
                    support: None,
                }
            }
        };
        tracing::debug!("candidate `{}` scored {}", eval.name, eval.score);
        candidates.push(DeviceCandidate {
            physical: pd,
            score: eval.score,
        });
        evaluations.push(eval);
    }

    let best = pick_best(candidates).ok_or(InitError::NoSuitableDevice)?;
    let index = devices
        .iter()
        .position(|&pd| pd == best.physical)
        .ok_or(InitError::NoSuitableDevice)?;
    let eval = evaluations.swap_remove(index);

    tracing::info!(
        "selected `{}` (score {}, graphics family {:?}, present family {:?})",
        eval.name,
        eval.score,
        eval.queues.graphics,
        eval.queues.present
    );

    Ok(SelectedDevice {
        physical: best.physical,
        name: eval.name,
        score: eval.score,
        queues: eval.queues,
        support: eval.support,
    })
}

/// A logical device and the queues borrowed from it.
#[derive(Debug)]
pub struct LogicalDevice {
    pub handle: vk::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: Option<vk::Queue>,
}

pub(crate) fn create_logical_device<D: Driver>(
    driver: &mut D,
    selected: &SelectedDevice,
    layers: &[CString],
) -> Result<LogicalDevice> {
    let queues = &selected.queues;
    let Some(graphics) = queues.graphics.filter(|_| queues.is_complete()) else {
        return Err(InitError::NoSuitableDevice);
    };

    let req = DeviceRequest {
        physical: selected.physical,
        queue_families: queues.unique_families(),
        extensions: REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|e| (*e).to_owned())
            .collect(),
        layers: layers.to_vec(),
        features: vk::PhysicalDeviceFeatures::default(),
    };

    let handle = driver
        .create_device(&req)
        .map_err(InitError::LogicalDeviceCreation)?;
    let graphics_queue = driver.device_queue(handle, graphics, 0);
    let present_queue = queues.present.map(|p| driver.device_queue(handle, p, 0));

    tracing::info!(
        "logical device created on `{}` with queue families {:?}",
        selected.name,
        req.queue_families
    );

    Ok(LogicalDevice {
        handle,
        graphics_queue,
        present_queue,
    })
}
