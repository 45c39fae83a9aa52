//! Locating the hosting library of an installed runtime
//!
//! Order: `DOTNET_ROOT`, then the runtimes listed by `dotnet --list-runtimes`.
//! The newest `Microsoft.NETCore.App` wins.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::HostError;

static RUNTIME_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bMicrosoft\.NETCore\.App[^0-9]*(?P<version>[0-9.]+)[^\[]*\[(?P<path>[^\]]+)\]")
        .expect("runtime list pattern is valid")
});

/// File name of the hosting library on this platform
pub const fn hostfxr_file_name() -> &'static str {
    if cfg!(windows) {
        "hostfxr.dll"
    } else if cfg!(target_os = "macos") {
        "libhostfxr.dylib"
    } else {
        "libhostfxr.so"
    }
}

/// Dotted numeric version, compared component-wise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVersion(Vec<u64>);

impl RuntimeVersion {
    pub fn parse(text: &str) -> Option<Self> {
        let parts = text
            .trim_matches('.')
            .split('.')
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            None
        } else {
            Some(Self(parts))
        }
    }
}

impl Ord for RuntimeVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let a = self.0.get(i).copied().unwrap_or(0);
                let b = other.0.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for RuntimeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// One `Microsoft.NETCore.App` entry of `dotnet --list-runtimes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRuntime {
    pub version: RuntimeVersion,
    /// `<root>/shared/Microsoft.NETCore.App`
    pub directory: PathBuf,
}

impl InstalledRuntime {
    /// `<root>/host/fxr/<version>/<hostfxr>`
    pub fn hostfxr_path(&self) -> PathBuf {
        self.directory
            .join("..")
            .join("..")
            .join("host")
            .join("fxr")
            .join(self.version.to_string())
            .join(hostfxr_file_name())
    }
}

/// Parse `dotnet --list-runtimes` output, returning the newest runtime
pub fn parse_list_runtimes(output: &str) -> Option<InstalledRuntime> {
    output
        .lines()
        .filter_map(|line| {
            let caps = RUNTIME_LINE.captures(line)?;
            let version = RuntimeVersion::parse(caps.name("version")?.as_str())?;
            let directory = PathBuf::from(caps.name("path")?.as_str().trim());
            Some(InstalledRuntime { version, directory })
        })
        .max_by(|a, b| a.version.cmp(&b.version))
}

/// Newest `host/fxr/<version>` under an installation root
pub fn hostfxr_in_root(root: &Path) -> Option<PathBuf> {
    let fxr = root.join("host").join("fxr");
    std::fs::read_dir(&fxr)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let version = RuntimeVersion::parse(&name.to_string_lossy())?;
            let path = entry.path().join(hostfxr_file_name());
            path.exists().then_some((version, path))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}

/// Find the hosting library of the newest installed runtime
pub fn find_hostfxr() -> Result<PathBuf, HostError> {
    if let Some(root) = std::env::var_os("DOTNET_ROOT") {
        if let Some(path) = hostfxr_in_root(Path::new(&root)) {
            return Ok(path);
        }
    }

    let output = Command::new("dotnet")
        .arg("--list-runtimes")
        .output()
        .map_err(|e| HostError::Discovery(format!("failed to run `dotnet --list-runtimes`: {e}")))?;

    if !output.status.success() {
        return Err(HostError::Discovery(format!(
            "`dotnet --list-runtimes` exited with {}",
            output.status
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let runtime = parse_list_runtimes(&text)
        .ok_or_else(|| HostError::Discovery("no Microsoft.NETCore.App runtime installed".into()))?;

    tracing::debug!(version = %runtime.version, directory = %runtime.directory.display(), "selected runtime");
    Ok(runtime.hostfxr_path())
}
