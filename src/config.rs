//! Bridge configuration - `dotnet-bridge.toml`
//!
//! ```toml
//! [runtime]
//! tfm = "net8.0"
//! roll_forward = "LatestMinor"
//! framework_version = "8.0.0"
//! hostfxr_path = "/usr/share/dotnet/host/fxr/8.0.1/libhostfxr.so"
//!
//! [adapter]
//! assembly_path = "bin/Qt.DotNet.Adapter.dll"
//! ```
//!
//! `DOTNET_BRIDGE_HOSTFXR` and `DOTNET_BRIDGE_ADAPTER_PATH` override the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::adapter::GlueNames;
use crate::error::{Error, Result};
use crate::host::{RollForward, RuntimeConfig};

/// File name searched for by [`BridgeConfig::discover`]
pub const CONFIG_FILE: &str = "dotnet-bridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub runtime: RuntimeSection,

    #[serde(default)]
    pub adapter: GlueNames,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSection {
    #[serde(default = "default_tfm")]
    pub tfm: String,

    #[serde(default = "default_roll_forward")]
    pub roll_forward: RollForward,

    #[serde(default = "default_framework_name")]
    pub framework_name: String,

    #[serde(default = "default_framework_version")]
    pub framework_version: String,

    /// Explicit hosting library; discovered when absent
    #[serde(default)]
    pub hostfxr_path: Option<PathBuf>,
}

fn default_tfm() -> String {
    "net6.0".to_string()
}

fn default_roll_forward() -> RollForward {
    RollForward::LatestMinor
}

fn default_framework_name() -> String {
    "Microsoft.NETCore.App".to_string()
}

fn default_framework_version() -> String {
    "6.0.0".to_string()
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            tfm: default_tfm(),
            roll_forward: default_roll_forward(),
            framework_name: default_framework_name(),
            framework_version: default_framework_version(),
            hostfxr_path: None,
        }
    }
}

impl RuntimeSection {
    /// Runtime configuration document for the loader
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::new(
            &self.tfm,
            self.roll_forward,
            &self.framework_name,
            &self.framework_version,
        )
    }
}

impl BridgeConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Find configuration in the current directory or its parents
    ///
    /// Falls back to defaults. Environment overrides apply either way.
    pub fn discover() -> Self {
        let mut current = std::env::current_dir().ok();

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                match Self::load(&config_path) {
                    Ok(config) => return config.with_env_overrides(),
                    Err(e) => tracing::warn!(path = %config_path.display(), error = %e, "ignoring config"),
                }
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default().with_env_overrides()
    }

    /// Apply `DOTNET_BRIDGE_*` environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os("DOTNET_BRIDGE_HOSTFXR") {
            self.runtime.hostfxr_path = Some(PathBuf::from(path));
        }
        if let Some(path) = std::env::var_os("DOTNET_BRIDGE_ADAPTER_PATH") {
            self.adapter.assembly_path = PathBuf::from(path);
        }
        self
    }
}
