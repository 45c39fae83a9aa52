//! Hosting library loading and export resolution
//!
//! Wraps `libloading::Library` and resolves the fixed set of hostfxr exports up
//! front, so a library missing any of them is rejected before it is used.

use std::path::{Path, PathBuf};

use libloading::Library;

use super::hostfxr::{
    symbols, CloseFn, GetRuntimeDelegateFn, GetRuntimePropertiesFn, GetRuntimePropertyValueFn,
    InitializeForRuntimeConfigFn, SetErrorWriterFn, SetRuntimePropertyValueFn,
};
use crate::error::HostError;

/// Resolved hostfxr exports
#[derive(Clone, Copy)]
pub struct HostFxrApi {
    pub initialize_for_runtime_config: InitializeForRuntimeConfigFn,
    pub get_runtime_delegate: GetRuntimeDelegateFn,
    pub close: CloseFn,
    pub set_error_writer: SetErrorWriterFn,
    pub get_runtime_properties: GetRuntimePropertiesFn,
    pub get_runtime_property_value: GetRuntimePropertyValueFn,
    pub set_runtime_property_value: SetRuntimePropertyValueFn,
}

/// Loaded hosting library plus its exports
///
/// The function pointers in `api` are only valid while `_library` is alive;
/// both are dropped together.
pub struct HostLibrary {
    api: HostFxrApi,
    path: PathBuf,
    _library: Library,
}

impl HostLibrary {
    /// Load the library at `path` and resolve every required export
    pub fn load(path: &Path) -> Result<Self, HostError> {
        if !path.exists() {
            return Err(HostError::LibraryNotFound(path.to_path_buf()));
        }

        // Safety: loading hostfxr runs its initializers, which have no
        // preconditions beyond being on a supported platform.
        let library = unsafe { Library::new(path) }.map_err(|e| HostError::LibraryLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // Safety: each symbol is declared in hostfxr.h with the signature of
        // the matching type alias.
        let api = unsafe {
            HostFxrApi {
                initialize_for_runtime_config: symbol(
                    &library,
                    symbols::INITIALIZE_FOR_RUNTIME_CONFIG,
                )?,
                get_runtime_delegate: symbol(&library, symbols::GET_RUNTIME_DELEGATE)?,
                close: symbol(&library, symbols::CLOSE)?,
                set_error_writer: symbol(&library, symbols::SET_ERROR_WRITER)?,
                get_runtime_properties: symbol(&library, symbols::GET_RUNTIME_PROPERTIES)?,
                get_runtime_property_value: symbol(
                    &library,
                    symbols::GET_RUNTIME_PROPERTY_VALUE,
                )?,
                set_runtime_property_value: symbol(
                    &library,
                    symbols::SET_RUNTIME_PROPERTY_VALUE,
                )?,
            }
        };

        Ok(Self {
            api,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    #[inline]
    pub fn api(&self) -> &HostFxrApi {
        &self.api
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, HostError> {
    library
        .get::<T>(name.as_bytes())
        .map(|s| *s)
        .map_err(|_| HostError::MissingEntryPoint(name))
}
