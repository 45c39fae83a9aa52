//! hostfxr ABI - entry point signatures and status codes
//!
//! Mirrors `hostfxr.h` and `coreclr_delegates.h`. Only the subset the loader
//! needs is declared here.

use core::ffi::c_void;
use core::fmt;

use super::pdstr::PdChar;

/// Opaque host context produced by `hostfxr_initialize_for_runtime_config`
pub type HostContextHandle = *mut c_void;

/// `hostfxr_initialize_parameters`
#[repr(C)]
pub struct InitializeParameters {
    pub size: usize,
    pub host_path: *const PdChar,
    pub dotnet_root: *const PdChar,
}

pub type ErrorWriterFn = extern "C" fn(message: *const PdChar);

pub type InitializeForRuntimeConfigFn = unsafe extern "C" fn(
    runtime_config_path: *const PdChar,
    parameters: *const InitializeParameters,
    host_context_handle: *mut HostContextHandle,
) -> i32;

pub type GetRuntimeDelegateFn = unsafe extern "C" fn(
    host_context_handle: HostContextHandle,
    delegate_type: DelegateType,
    delegate: *mut *mut c_void,
) -> i32;

pub type CloseFn = unsafe extern "C" fn(host_context_handle: HostContextHandle) -> i32;

pub type SetErrorWriterFn = unsafe extern "C" fn(error_writer: Option<ErrorWriterFn>) -> Option<ErrorWriterFn>;

pub type GetRuntimePropertiesFn = unsafe extern "C" fn(
    host_context_handle: HostContextHandle,
    count: *mut usize,
    keys: *mut *const PdChar,
    values: *mut *const PdChar,
) -> i32;

pub type GetRuntimePropertyValueFn = unsafe extern "C" fn(
    host_context_handle: HostContextHandle,
    name: *const PdChar,
    value: *mut *const PdChar,
) -> i32;

pub type SetRuntimePropertyValueFn = unsafe extern "C" fn(
    host_context_handle: HostContextHandle,
    name: *const PdChar,
    value: *const PdChar,
) -> i32;

/// `load_assembly_and_get_function_pointer_fn` from `coreclr_delegates.h`
pub type LoadAssemblyAndGetFunctionPointerFn = unsafe extern "system" fn(
    assembly_path: *const PdChar,
    type_name: *const PdChar,
    method_name: *const PdChar,
    delegate_type_name: *const PdChar,
    reserved: *mut c_void,
    delegate: *mut *mut c_void,
) -> i32;

/// `hostfxr_delegate_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DelegateType {
    ComActivation = 0,
    LoadInMemoryAssembly = 1,
    WinrtActivation = 2,
    ComRegister = 3,
    ComUnregister = 4,
    LoadAssemblyAndGetFunctionPointer = 5,
    GetFunctionPointer = 6,
}

/// Status code returned by every hostfxr entry point
///
/// Negative values are failures.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const SUCCESS: Self = Self(0);
    pub const SUCCESS_HOST_ALREADY_INITIALIZED: Self = Self(0x0000_0001);
    pub const SUCCESS_DIFFERENT_RUNTIME_PROPERTIES: Self = Self(0x0000_0002);

    pub const INVALID_ARG_FAILURE: Self = Self::failure(0x8000_8081);
    pub const CORE_HOST_LIB_LOAD_FAILURE: Self = Self::failure(0x8000_8082);
    pub const CORE_HOST_LIB_MISSING_FAILURE: Self = Self::failure(0x8000_8083);
    pub const CORE_HOST_ENTRY_POINT_FAILURE: Self = Self::failure(0x8000_8084);
    pub const CORE_HOST_CUR_HOST_FIND_FAILURE: Self = Self::failure(0x8000_8085);
    pub const CORE_CLR_RESOLVE_FAILURE: Self = Self::failure(0x8000_8087);
    pub const CORE_CLR_BIND_FAILURE: Self = Self::failure(0x8000_8088);
    pub const CORE_CLR_INIT_FAILURE: Self = Self::failure(0x8000_8089);
    pub const CORE_CLR_EXE_FAILURE: Self = Self::failure(0x8000_808a);
    pub const FRAMEWORK_MISSING_FAILURE: Self = Self::failure(0x8000_8096);
    pub const HOST_API_FAILED: Self = Self::failure(0x8000_8097);
    pub const HOST_API_BUFFER_TOO_SMALL: Self = Self::failure(0x8000_8098);
    pub const HOST_API_UNSUPPORTED_VERSION: Self = Self::failure(0x8000_809a);
    pub const INVALID_CONFIG_FILE: Self = Self::failure(0x8000_809b);
    pub const HOST_INVALID_STATE: Self = Self::failure(0x8000_80a3);
    pub const HOST_PROPERTY_NOT_FOUND: Self = Self::failure(0x8000_80a4);
    pub const HOST_INCOMPATIBLE_CONFIG: Self = Self::failure(0x8000_80a5);
    pub const HOST_API_UNSUPPORTED_SCENARIO: Self = Self::failure(0x8000_80a6);

    const fn failure(bits: u32) -> Self {
        Self(bits as i32)
    }

    /// hostfxr convention: any negative code is a failure
    #[inline]
    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        !self.is_failure()
    }

    /// Symbolic name for well-known codes
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::SUCCESS => "Success",
            Self::SUCCESS_HOST_ALREADY_INITIALIZED => "Success_HostAlreadyInitialized",
            Self::SUCCESS_DIFFERENT_RUNTIME_PROPERTIES => "Success_DifferentRuntimeProperties",
            Self::INVALID_ARG_FAILURE => "InvalidArgFailure",
            Self::CORE_HOST_LIB_LOAD_FAILURE => "CoreHostLibLoadFailure",
            Self::CORE_HOST_LIB_MISSING_FAILURE => "CoreHostLibMissingFailure",
            Self::CORE_HOST_ENTRY_POINT_FAILURE => "CoreHostEntryPointFailure",
            Self::CORE_HOST_CUR_HOST_FIND_FAILURE => "CoreHostCurHostFindFailure",
            Self::CORE_CLR_RESOLVE_FAILURE => "CoreClrResolveFailure",
            Self::CORE_CLR_BIND_FAILURE => "CoreClrBindFailure",
            Self::CORE_CLR_INIT_FAILURE => "CoreClrInitFailure",
            Self::CORE_CLR_EXE_FAILURE => "CoreClrExeFailure",
            Self::FRAMEWORK_MISSING_FAILURE => "FrameworkMissingFailure",
            Self::HOST_API_FAILED => "HostApiFailed",
            Self::HOST_API_BUFFER_TOO_SMALL => "HostApiBufferTooSmall",
            Self::HOST_API_UNSUPPORTED_VERSION => "HostApiUnsupportedVersion",
            Self::INVALID_CONFIG_FILE => "InvalidConfigFile",
            Self::HOST_INVALID_STATE => "HostInvalidState",
            Self::HOST_PROPERTY_NOT_FOUND => "HostPropertyNotFound",
            Self::HOST_INCOMPATIBLE_CONFIG => "HostIncompatibleConfig",
            Self::HOST_API_UNSUPPORTED_SCENARIO => "HostApiUnsupportedScenario",
            _ => return None,
        })
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:08x} ({})", self.0 as u32, name),
            None => write!(f, "0x{:08x}", self.0 as u32),
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusCode({})", self)
    }
}

/// Names of the exports the loader requires
pub mod symbols {
    pub const INITIALIZE_FOR_RUNTIME_CONFIG: &str = "hostfxr_initialize_for_runtime_config";
    pub const GET_RUNTIME_DELEGATE: &str = "hostfxr_get_runtime_delegate";
    pub const CLOSE: &str = "hostfxr_close";
    pub const SET_ERROR_WRITER: &str = "hostfxr_set_error_writer";
    pub const GET_RUNTIME_PROPERTIES: &str = "hostfxr_get_runtime_properties";
    pub const GET_RUNTIME_PROPERTY_VALUE: &str = "hostfxr_get_runtime_property_value";
    pub const SET_RUNTIME_PROPERTY_VALUE: &str = "hostfxr_set_runtime_property_value";
}
