//! Error types for the bridge
//!
//! Infrastructure failures (loading, resolution) surface as [`HostError`] from the
//! loader and are recovered into null bindings above it. Managed failures surface
//! as [`Error::Managed`] at call sites that use a safe method.

use std::path::PathBuf;

use thiserror::Error;

use crate::host::hostfxr::StatusCode;
use crate::object::DotNetException;

/// Failures while locating, loading or talking to the hosting library
#[derive(Debug, Error)]
pub enum HostError {
    #[error("hosting library not found: {0}")]
    LibraryNotFound(PathBuf),

    #[error("failed to load hosting library {path}: {message}")]
    LibraryLoad { path: PathBuf, message: String },

    #[error("hosting library is missing entry point `{0}`")]
    MissingEntryPoint(&'static str),

    #[error("string contains an interior nul: {0:?}")]
    InvalidString(String),

    #[error("invalid runtime configuration: {0}")]
    Config(String),

    #[error("{function} failed with status {code}")]
    Status {
        function: &'static str,
        code: StatusCode,
    },

    #[error("runtime discovery failed: {0}")]
    Discovery(String),

    #[error("runtime is not loaded")]
    NotLoaded,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("managed exception: {0}")]
    Managed(#[from] DotNetException),

    #[error("adapter is not initialized")]
    NotInitialized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The managed exception carried by this error, if any
    pub fn as_managed(&self) -> Option<&DotNetException> {
        match self {
            Self::Managed(e) => Some(e),
            _ => None,
        }
    }
}
