// SPDX-License-Identifier: CEPL-1.0
//! Capability probing: which layers and instance extensions the loader offers.
//! Never fails; a driver error reads as "nothing available".
use crate::driver::Driver;
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};

fn names(list: Vec<CString>) -> impl Iterator<Item = String> {
    list.into_iter()
        .map(|name| name.to_string_lossy().into_owned())
}

pub fn available_layers<D: Driver>(driver: &D) -> BTreeSet<String> {
    match driver.enumerate_layers() {
        Ok(layers) => names(layers).collect(),
        Err(e) => {
            tracing::warn!("enumerate_instance_layer_properties failed: {e:?}");
            BTreeSet::new()
        }
    }
}

/// Extensions from the implementation plus those provided by `layers`.
pub fn available_instance_extensions<D: Driver>(
    driver: &D,
    layers: &[&CStr],
) -> BTreeSet<String> {
    let mut all = BTreeSet::new();

    for layer in std::iter::once(None).chain(layers.iter().copied().map(Some)) {
        match driver.enumerate_instance_extensions(layer) {
            Ok(exts) => all.extend(names(exts)),
            Err(e) => tracing::warn!(
                "enumerate_instance_extension_properties({:?}) failed: {e:?}",
                layer
            ),
        }
    }

    all
}
