// SPDX-License-Identifier: CEPL-1.0
//! Presentation surface binding.
use crate::driver::Driver;
use crate::error::{InitError, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::ffi::{CStr, CString};

/// Raw handles of the window a surface is created for.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceTarget {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
}

impl SurfaceTarget {
    pub fn from_window<W: HasDisplayHandle + HasWindowHandle>(window: &W) -> Result<Self> {
        Ok(Self {
            display: window.display_handle()?.as_raw(),
            window: window.window_handle()?.as_raw(),
        })
    }
}

/// Instance extensions the platform needs to present to `display`.
pub fn required_extensions(display: RawDisplayHandle) -> Result<Vec<CString>> {
    let names = ash_window::enumerate_required_extensions(display)
        .map_err(InitError::query("enumerate_required_extensions"))?;

    Ok(names
        .iter()
        // SAFETY: ash_window hands out pointers to static NUL terminated names.
        .map(|&p| unsafe { CStr::from_ptr(p) }.to_owned())
        .collect())
}

pub(crate) fn bind_surface<D: Driver>(
    driver: &mut D,
    instance: vk::Instance,
    target: &SurfaceTarget,
) -> Result<vk::SurfaceKHR> {
    let surface = driver
        .create_surface(instance, target.display, target.window)
        .map_err(InitError::SurfaceCreation)?;
    tracing::debug!("surface created: {:?}", surface);
    Ok(surface)
}
