//! Runtime configuration document
//!
//! hostfxr only accepts a path to a `runtimeconfig.json`, so the document is
//! written to a transient file right before initialization and removed right
//! after, whether initialization succeeded or not.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::HostError;

/// Roll-forward policy for framework resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollForward {
    LatestPatch,
    Minor,
    LatestMinor,
    Major,
    LatestMajor,
    Disable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framework {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeOptions {
    pub tfm: String,
    pub roll_forward: RollForward,
    pub framework: Framework,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config_properties: BTreeMap<String, serde_json::Value>,
}

/// `runtimeconfig.json` contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub runtime_options: RuntimeOptions,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new("net6.0", RollForward::LatestMinor, "Microsoft.NETCore.App", "6.0.0")
    }
}

impl RuntimeConfig {
    pub fn new(tfm: &str, roll_forward: RollForward, framework: &str, version: &str) -> Self {
        Self {
            runtime_options: RuntimeOptions {
                tfm: tfm.to_string(),
                roll_forward,
                framework: Framework {
                    name: framework.to_string(),
                    version: version.to_string(),
                },
                config_properties: BTreeMap::new(),
            },
        }
    }

    /// Parse a raw `runtimeconfig.json` document
    pub fn from_json(text: &str) -> Result<Self, HostError> {
        serde_json::from_str(text).map_err(|e| HostError::Config(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, HostError> {
        serde_json::to_string_pretty(self).map_err(|e| HostError::Config(e.to_string()))
    }

    /// Add a `configProperties` entry
    pub fn with_property(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.runtime_options
            .config_properties
            .insert(name.to_string(), value.into());
        self
    }

    /// Write the document to a fresh temporary file
    pub fn materialize(&self) -> Result<TransientConfigFile, HostError> {
        let json = self.to_json()?;
        let mut file = tempfile::Builder::new()
            .prefix("runtimeconfig.")
            .suffix(".json")
            .tempfile()?;
        file.write_all(json.as_bytes())?;
        file.flush()?;
        Ok(TransientConfigFile { file: Some(file) })
    }
}

/// Temporary `runtimeconfig.json`, deleted on [`remove`](Self::remove) or drop
pub struct TransientConfigFile {
    file: Option<NamedTempFile>,
}

impl TransientConfigFile {
    pub fn path(&self) -> &Path {
        match &self.file {
            Some(file) => file.path(),
            None => Path::new(""),
        }
    }

    /// Delete the file now, logging instead of failing
    pub fn remove(mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.close() {
                tracing::warn!(error = %e, "failed to remove transient runtime config");
            }
        }
    }
}
