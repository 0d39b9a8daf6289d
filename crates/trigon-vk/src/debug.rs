// SPDX-License-Identifier: CEPL-1.0
//! Debug channel: routes `VK_EXT_debug_utils` messages to a [`DebugSink`].
use crate::driver::{Driver, MessengerRequest};
use crate::error::{InitError, Result};
use ash::vk;
use std::ffi::{c_void, CStr};
use std::fmt;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Severity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl Severity {
    fn from_vk(flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            Severity::Error
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            Severity::Warning
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Severity::Info
        } else {
            Severity::Verbose
        }
    }

    fn flag(self) -> vk::DebugUtilsMessageSeverityFlagsEXT {
        match self {
            Severity::Verbose => vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
            Severity::Info => vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            Severity::Warning => vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            Severity::Error => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        }
    }

    /// Mask of this severity and everything above it.
    pub fn and_above(self) -> vk::DebugUtilsMessageSeverityFlagsEXT {
        [
            Severity::Verbose,
            Severity::Info,
            Severity::Warning,
            Severity::Error,
        ]
        .into_iter()
        .filter(|s| *s >= self)
        .fold(vk::DebugUtilsMessageSeverityFlagsEXT::empty(), |acc, s| {
            acc | s.flag()
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MessageKind {
    General,
    Validation,
    Performance,
    Other,
}

impl MessageKind {
    fn from_vk(flags: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            MessageKind::Validation
        } else if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            MessageKind::Performance
        } else if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL) {
            MessageKind::General
        } else {
            MessageKind::Other
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageKind::General => "GENERAL",
            MessageKind::Validation => "VALIDATION",
            MessageKind::Performance => "PERFORMANCE",
            MessageKind::Other => "UNKNOWN",
        })
    }
}

/// Receives driver diagnostics. Called synchronously from whatever thread the
/// driver reports on; must not block.
pub trait DebugSink: Send + Sync {
    fn message(&self, severity: Severity, kind: MessageKind, text: &str);
}

impl<F> DebugSink for F
where
    F: Fn(Severity, MessageKind, &str) + Send + Sync,
{
    fn message(&self, severity: Severity, kind: MessageKind, text: &str) {
        self(severity, kind, text)
    }
}

/// Forwards to `tracing` under the `trigon::vk-debug` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn message(&self, severity: Severity, kind: MessageKind, text: &str) {
        match severity {
            Severity::Verbose => tracing::trace!(target: "trigon::vk-debug", "[{}] {}", kind, text),
            Severity::Info => tracing::info!(target: "trigon::vk-debug", "[{}] {}", kind, text),
            Severity::Warning => tracing::warn!(target: "trigon::vk-debug", "[{}] {}", kind, text),
            Severity::Error => tracing::error!(target: "trigon::vk-debug", "[{}] {}", kind, text),
        }
    }
}

pub struct DebugConfig {
    pub min_severity: Severity,
    pub kinds: vk::DebugUtilsMessageTypeFlagsEXT,
    pub sink: Box<dyn DebugSink>,
}

impl DebugConfig {
    pub fn with_sink(sink: impl DebugSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            ..Self::default()
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            min_severity: Severity::Warning,
            kinds: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            sink: Box::new(TracingSink),
        }
    }
}

impl fmt::Debug for DebugConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugConfig")
            .field("min_severity", &self.min_severity)
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

/// Heap slot the callback's user-data pointer refers to. Boxed so the address
/// stays put while the owning [`DebugChannel`] moves around.
pub(crate) struct SinkSlot {
    sink: Box<dyn DebugSink>,
}

/// Sink plus messenger, when debugging is enabled.
///
/// The channel exists before the instance so its request can be chained into
/// instance creation (and destruction, which reports through the same chain).
/// It must therefore be dropped only after the instance is gone.
pub struct DebugChannel {
    slot: Box<SinkSlot>,
    request: MessengerRequest,
    messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl DebugChannel {
    pub(crate) fn new(cfg: DebugConfig) -> Self {
        let slot = Box::new(SinkSlot { sink: cfg.sink });
        let user_data = (&*slot as *const SinkSlot).cast_mut().cast::<c_void>();
        Self {
            request: MessengerRequest {
                severity: cfg.min_severity.and_above(),
                kinds: cfg.kinds,
                user_data,
            },
            slot,
            messenger: None,
        }
    }

    pub(crate) fn request(&self) -> MessengerRequest {
        self.request
    }

    /// Creates the persistent messenger on `instance`.
    pub(crate) fn install<D: Driver>(&mut self, driver: &mut D, instance: vk::Instance) -> Result<()> {
        let messenger = driver
            .create_debug_messenger(instance, &self.request)
            .map_err(InitError::DebugChannelCreationFailed)?;
        self.messenger = Some(messenger);
        tracing::debug!("debug messenger installed");
        Ok(())
    }

    pub fn messenger(&self) -> Option<vk::DebugUtilsMessengerEXT> {
        self.messenger
    }

    /// Must run before the instance is destroyed, and only after a successful
    /// [`install`](Self::install). Uninstalling a channel that was never
    /// installed is a caller bug.
    pub(crate) fn uninstall<D: Driver>(&mut self, driver: &mut D, instance: vk::Instance) {
        let Some(messenger) = self.messenger.take() else {
            tracing::error!("debug channel uninstalled without an installed messenger");
            debug_assert!(false, "debug channel uninstalled without an installed messenger");
            return;
        };
        driver.destroy_debug_messenger(instance, messenger);
        tracing::debug!("debug messenger destroyed");
    }

    #[cfg(test)]
    fn deliver(&self, severity: Severity, kind: MessageKind, text: &str) {
        self.slot.sink.message(severity, kind, text)
    }
}

impl fmt::Debug for DebugChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugChannel")
            .field("request", &self.request)
            .field("messenger", &self.messenger)
            .finish_non_exhaustive()
    }
}

/// Installed as `pfn_user_callback`. Never asks the driver to abort the call.
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || p_user_data.is_null() {
        return vk::FALSE;
    }

    // SAFETY: the driver hands back the callback data it owns for the duration
    // of this call.
    let p_message = unsafe { (*p_callback_data).p_message };
    let text = if p_message.is_null() {
        std::borrow::Cow::Borrowed("")
    } else {
        // SAFETY: p_message is a NUL terminated string valid for this call.
        unsafe { CStr::from_ptr(p_message) }.to_string_lossy()
    };

    // SAFETY: user_data is the SinkSlot owned by the DebugChannel, which
    // outlives both the messenger and the instance.
    let slot = unsafe { &*p_user_data.cast::<SinkSlot>() };
    let severity = Severity::from_vk(message_severity);
    let kind = MessageKind::from_vk(message_type);

    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        slot.sink.message(severity, kind, &text)
    }));

    vk::FALSE
}
