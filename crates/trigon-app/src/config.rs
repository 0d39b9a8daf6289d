// SPDX-License-Identifier: CEPL-1.0
//! `trigon.toml` plus command line overrides.
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use trigon_platform::WindowConfig;
use trigon_vk::{ContextConfig, DebugConfig, PresentModePreference, Severity};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file; missing means defaults
    #[arg(long, default_value = "trigon.toml")]
    pub config: PathBuf,
    /// Enable the validation layer and debug channel
    #[arg(long, action = clap::ArgAction::Set)]
    pub validation: Option<bool>,
    /// Preferred present mode: fifo | mailbox | immediate
    #[arg(long, value_enum)]
    pub present_mode: Option<PresentModeCfg>,
    /// Vertex shader SPIR-V
    #[arg(long)]
    pub vert: Option<PathBuf>,
    /// Fragment shader SPIR-V
    #[arg(long)]
    pub frag: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    Fifo,
    #[default]
    Mailbox,
    Immediate,
}

impl From<PresentModeCfg> for PresentModePreference {
    fn from(mode: PresentModeCfg) -> Self {
        match mode {
            PresentModeCfg::Fifo => PresentModePreference::Fifo,
            PresentModeCfg::Mailbox => PresentModePreference::Mailbox,
            PresentModeCfg::Immediate => PresentModePreference::Immediate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeverityCfg {
    Verbose,
    Info,
    #[default]
    Warning,
    Error,
}

impl From<SeverityCfg> for Severity {
    fn from(sev: SeverityCfg) -> Self {
        match sev {
            SeverityCfg::Verbose => Severity::Verbose,
            SeverityCfg::Info => Severity::Info,
            SeverityCfg::Warning => Severity::Warning,
            SeverityCfg::Error => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let w = WindowConfig::default();
        Self {
            width: w.width,
            height: w.height,
            title: w.title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VulkanCfg {
    pub app_name: String,
    pub engine_name: String,
    pub validation: bool,
    pub present_mode: PresentModeCfg,
    pub debug_severity: SeverityCfg,
}

impl Default for VulkanCfg {
    fn default() -> Self {
        let ctx = ContextConfig::default();
        Self {
            app_name: ctx.app_name,
            engine_name: ctx.engine_name,
            validation: ctx.debug.is_some(),
            present_mode: PresentModeCfg::default(),
            debug_severity: SeverityCfg::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShaderCfg {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub vulkan: VulkanCfg,
    pub shaders: ShaderCfg,
}

impl AppCfg {
    /// Reads `path`. A missing file means defaults; a malformed one is
    /// reported and ignored.
    pub fn load(path: &Path) -> AppCfg {
        match fs::read_to_string(path) {
            Ok(s) => Self::parse(&s)
                .with_context(|| format!("parse {}", path.display()))
                .unwrap_or_else(|e| {
                    warn!("{e:#}; using defaults");
                    AppCfg::default()
                }),
            Err(e) => {
                debug!("no config at {} ({e}); using defaults", path.display());
                AppCfg::default()
            }
        }
    }

    pub fn parse(s: &str) -> Result<AppCfg> {
        Ok(toml::from_str(s)?)
    }

    /// Command line wins over the file.
    pub fn apply(&mut self, args: &Args) {
        if let Some(v) = args.validation {
            self.vulkan.validation = v;
        }
        if let Some(mode) = args.present_mode {
            self.vulkan.present_mode = mode;
        }
        if let Some(p) = &args.vert {
            self.shaders.vertex = Some(p.clone());
        }
        if let Some(p) = &args.frag {
            self.shaders.fragment = Some(p.clone());
        }
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            width: self.window.width,
            height: self.window.height,
            title: self.window.title.clone(),
        }
    }

    pub fn context_config(&self, required_extensions: Vec<std::ffi::CString>) -> ContextConfig {
        let debug = self.vulkan.validation.then(|| DebugConfig {
            min_severity: self.vulkan.debug_severity.into(),
            ..DebugConfig::default()
        });
        ContextConfig {
            app_name: self.vulkan.app_name.clone(),
            engine_name: self.vulkan.engine_name.clone(),
            required_extensions,
            debug,
            present_mode: self.vulkan.present_mode.into(),
        }
    }
}
