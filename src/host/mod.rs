//! Runtime loader - hostfxr hosting of the .NET runtime
//!
//! Design: one [`Host`] owns the loaded hosting library and one host context.
//! - `load` is idempotent and all-or-nothing: a failed step drops everything
//!   acquired before it
//! - `resolve_function` goes through the `load_assembly_and_get_function_pointer`
//!   runtime delegate
//! - property accessors are pass-throughs that return empty results when unloaded

pub mod discovery;
pub mod hostfxr;
pub mod library;
pub mod pdstr;
pub mod runtime_config;

use core::ffi::c_void;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::ptr;

use crate::error::HostError;
use crate::function::Function;
use crate::logging;

use hostfxr::{
    DelegateType, ErrorWriterFn, HostContextHandle, LoadAssemblyAndGetFunctionPointerFn, StatusCode,
};
use library::HostLibrary;
use pdstr::{PdChar, PdString};

pub use runtime_config::{RollForward, RuntimeConfig, TransientConfigFile};

/// Loaded runtime state; present only after a fully successful `load`
struct Loaded {
    library: HostLibrary,
    context: HostContextHandle,
    load_assembly_and_get_function_pointer: LoadAssemblyAndGetFunctionPointerFn,
}

/// Runtime loader
#[derive(Default)]
pub struct Host {
    loaded: Option<Loaded>,
}

// Safety: hostfxr entry points and the runtime delegate may be called from any
// thread once the context is initialized.
unsafe impl Send for Host {}
unsafe impl Sync for Host {}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Path of the loaded hosting library
    pub fn library_path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|l| l.library.path())
    }

    /// Load the runtime described by `config`
    ///
    /// `runtime_path` names the hosting library explicitly; otherwise it is
    /// discovered from the installed runtimes. Calling `load` on a loaded host
    /// succeeds without doing anything.
    pub fn load(
        &mut self,
        config: &RuntimeConfig,
        runtime_path: Option<&Path>,
    ) -> Result<(), HostError> {
        if self.is_loaded() {
            return Ok(());
        }

        let _perf = logging::perf::track("host_load");
        match Self::load_steps(config, runtime_path) {
            Ok(loaded) => {
                logging::log_host_load(loaded.library.path());
                self.loaded = Some(loaded);
                Ok(())
            }
            Err(e) => {
                logging::log_host_error(&e);
                Err(e)
            }
        }
    }

    /// Load with the default runtime configuration and discovery
    pub fn load_default(&mut self) -> Result<(), HostError> {
        self.load(&RuntimeConfig::default(), None)
    }

    fn load_steps(config: &RuntimeConfig, runtime_path: Option<&Path>) -> Result<Loaded, HostError> {
        let path: PathBuf = match runtime_path {
            Some(p) => p.to_path_buf(),
            None => discovery::find_hostfxr()?,
        };

        let library = HostLibrary::load(&path)?;
        let api = *library.api();

        // Safety: installing a plain function pointer is always valid.
        unsafe { (api.set_error_writer)(Some(default_error_writer)) };

        let config_file = config.materialize()?;
        let config_path = PdString::from_path(config_file.path());

        let mut context: HostContextHandle = ptr::null_mut();
        let status = match &config_path {
            // Safety: the path is nul-terminated and outlives the call.
            Ok(p) => StatusCode(unsafe {
                (api.initialize_for_runtime_config)(p.as_ptr(), ptr::null(), &mut context)
            }),
            Err(_) => StatusCode::INVALID_ARG_FAILURE,
        };
        config_file.remove();
        config_path?;

        if status.is_failure() || context.is_null() {
            if !context.is_null() {
                // Safety: context came from a successful-enough initialize call.
                unsafe { (api.close)(context) };
            }
            return Err(HostError::Status {
                function: hostfxr::symbols::INITIALIZE_FOR_RUNTIME_CONFIG,
                code: status,
            });
        }

        let mut delegate: *mut c_void = ptr::null_mut();
        // Safety: context is a live host context.
        let status = StatusCode(unsafe {
            (api.get_runtime_delegate)(
                context,
                DelegateType::LoadAssemblyAndGetFunctionPointer,
                &mut delegate,
            )
        });
        if status.is_failure() || delegate.is_null() {
            unsafe { (api.close)(context) };
            return Err(HostError::Status {
                function: hostfxr::symbols::GET_RUNTIME_DELEGATE,
                code: status,
            });
        }

        // Safety: the runtime hands back a delegate of exactly this signature
        // for `hdt_load_assembly_and_get_function_pointer`.
        let load_assembly_and_get_function_pointer: LoadAssemblyAndGetFunctionPointerFn =
            unsafe { std::mem::transmute::<*mut c_void, LoadAssemblyAndGetFunctionPointerFn>(delegate) };

        Ok(Loaded {
            library,
            context,
            load_assembly_and_get_function_pointer,
        })
    }

    /// Close the host context and unload the hosting library
    pub fn unload(&mut self) {
        let Some(loaded) = self.loaded.take() else {
            return;
        };

        // Safety: context is live until this call.
        let status = StatusCode(unsafe { (loaded.library.api().close)(loaded.context) });
        if status.is_failure() {
            tracing::warn!(event = "host_close", status = %status, "hostfxr_close failed");
        }
        drop(loaded);
        logging::log_host_unload();
    }

    /// Resolve a managed static method as a native function pointer
    ///
    /// Lazily loads the default runtime. `delegate_type_name` of `None` selects
    /// the default `ComponentEntryPoint` delegate.
    pub fn resolve_function_ptr(
        &mut self,
        assembly_path: &Path,
        type_name: &str,
        method_name: &str,
        delegate_type_name: Option<&str>,
    ) -> Result<*mut c_void, HostError> {
        if !self.is_loaded() {
            self.load_default()?;
        }
        self.resolve_loaded(assembly_path, type_name, method_name, delegate_type_name)
    }

    /// Typed form of [`resolve_function_ptr`](Self::resolve_function_ptr)
    ///
    /// Failures yield an unresolved binder that returns null sentinels.
    ///
    /// # Safety
    ///
    /// The managed method, or the delegate type named by
    /// `delegate_type_name`, must have the signature `R(A)` in wire types.
    pub unsafe fn resolve_function<R, A>(
        &mut self,
        assembly_path: &Path,
        type_name: &str,
        method_name: &str,
        delegate_type_name: Option<&str>,
    ) -> Function<R, A> {
        match self.resolve_function_ptr(assembly_path, type_name, method_name, delegate_type_name) {
            Ok(ptr) => Function::from_raw(ptr),
            Err(e) => {
                logging::log_unresolved("host_function", &format!("{type_name}::{method_name}: {e}"));
                Function::null()
            }
        }
    }

    /// Resolution without lazy loading
    pub(crate) fn resolve_loaded(
        &self,
        assembly_path: &Path,
        type_name: &str,
        method_name: &str,
        delegate_type_name: Option<&str>,
    ) -> Result<*mut c_void, HostError> {
        let loaded = self.loaded.as_ref().ok_or(HostError::NotLoaded)?;

        let assembly_path = PdString::from_path(assembly_path)?;
        let type_name = PdString::new(type_name)?;
        let method_name = PdString::new(method_name)?;
        let delegate_type_name = delegate_type_name.map(PdString::new).transpose()?;

        let mut func: *mut c_void = ptr::null_mut();
        // Safety: all strings are nul-terminated and outlive the call.
        let status = StatusCode(unsafe {
            (loaded.load_assembly_and_get_function_pointer)(
                assembly_path.as_ptr(),
                type_name.as_ptr(),
                method_name.as_ptr(),
                delegate_type_name
                    .as_ref()
                    .map_or(ptr::null(), |d| d.as_ptr()),
                ptr::null_mut(),
                &mut func,
            )
        });

        if status.is_failure() || func.is_null() {
            return Err(HostError::Status {
                function: "load_assembly_and_get_function_pointer",
                code: status,
            });
        }
        Ok(func)
    }

    /// All runtime properties of the host context
    pub fn runtime_properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        let Some(loaded) = &self.loaded else {
            return properties;
        };
        let api = loaded.library.api();

        let mut count = 0usize;
        // Safety: a null buffer with count 0 asks for the required size.
        let status = StatusCode(unsafe {
            (api.get_runtime_properties)(
                loaded.context,
                &mut count,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        });
        if status != StatusCode::HOST_API_BUFFER_TOO_SMALL && status.is_failure() {
            return properties;
        }

        let mut keys: Vec<*const PdChar> = vec![ptr::null(); count];
        let mut values: Vec<*const PdChar> = vec![ptr::null(); count];
        // Safety: both buffers hold `count` entries.
        let status = StatusCode(unsafe {
            (api.get_runtime_properties)(
                loaded.context,
                &mut count,
                keys.as_mut_ptr(),
                values.as_mut_ptr(),
            )
        });
        if status.is_failure() {
            return properties;
        }

        for (key, value) in keys.iter().zip(values.iter()).take(count) {
            // Safety: hostfxr returns nul-terminated strings owned by the context.
            let (key, value) = unsafe { (pdstr::to_string(*key), pdstr::to_string(*value)) };
            properties.insert(key, value);
        }
        properties
    }

    /// One runtime property, `None` when unset or not loaded
    pub fn runtime_property(&self, name: &str) -> Option<String> {
        let loaded = self.loaded.as_ref()?;
        let name = PdString::new(name).ok()?;
        let mut value: *const PdChar = ptr::null();
        // Safety: name is nul-terminated; value receives a context-owned string.
        let status = StatusCode(unsafe {
            (loaded.library.api().get_runtime_property_value)(loaded.context, name.as_ptr(), &mut value)
        });
        if status.is_failure() || value.is_null() {
            return None;
        }
        Some(unsafe { pdstr::to_string(value) })
    }

    /// Set a runtime property; `false` when not loaded or rejected
    pub fn set_runtime_property(&self, name: &str, value: &str) -> bool {
        let Some(loaded) = &self.loaded else {
            return false;
        };
        let (Ok(name), Ok(value)) = (PdString::new(name), PdString::new(value)) else {
            return false;
        };
        // Safety: both strings are nul-terminated and outlive the call.
        let status = StatusCode(unsafe {
            (loaded.library.api().set_runtime_property_value)(
                loaded.context,
                name.as_ptr(),
                value.as_ptr(),
            )
        });
        status.is_success()
    }

    /// Replace the hosting library's error writer
    ///
    /// `None` restores the default writer, which forwards to `tracing`.
    pub fn set_error_writer(&self, writer: Option<ErrorWriterFn>) {
        if let Some(loaded) = &self.loaded {
            let writer = writer.unwrap_or(default_error_writer);
            // Safety: installing a plain function pointer is always valid.
            unsafe { (loaded.library.api().set_error_writer)(Some(writer)) };
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.unload();
    }
}

extern "C" fn default_error_writer(message: *const PdChar) {
    // Safety: hostfxr passes a nul-terminated message.
    let message = unsafe { pdstr::to_string(message) };
    logging::log_host_message(message.trim_end());
}
