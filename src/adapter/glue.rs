//! Glue component entry points
//!
//! The glue component is a small managed assembly exposing static methods the
//! adapter builds everything else on. Each method `M` of glue type `T` in
//! assembly `A` is resolved with the delegate type `T+Delegates+M, A`.

use core::ffi::c_void;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::function::Function;
use crate::host::Host;
use crate::logging;
use crate::marshal::ParameterArray;
use crate::object::ObjectRef;

/// Names identifying the glue component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlueNames {
    /// Path of the glue assembly file
    pub assembly_path: PathBuf,
    /// Assembly name, used in qualified type names
    pub assembly_name: String,
    /// Full name of the glue type
    pub type_name: String,
}

impl Default for GlueNames {
    fn default() -> Self {
        Self {
            assembly_path: default_assembly_path(),
            assembly_name: "Qt.DotNet.Adapter".to_string(),
            type_name: "Qt.DotNet.Adapter".to_string(),
        }
    }
}

fn default_assembly_path() -> PathBuf {
    const FILE: &str = "Qt.DotNet.Adapter.dll";
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(FILE)))
        .unwrap_or_else(|| PathBuf::from(FILE))
}

impl GlueNames {
    /// `Type, Assembly`
    pub fn type_full_name(&self) -> String {
        format!("{}, {}", self.type_name, self.assembly_name)
    }

    /// `Type+Delegates+Method, Assembly`
    pub fn delegate_type_name(&self, method: &str) -> String {
        format!("{}+Delegates+{}, {}", self.type_name, method, self.assembly_name)
    }
}

/// One glue entry point to resolve
#[derive(Debug, Clone, Copy)]
pub struct EntryPoint<'a> {
    pub assembly_path: &'a Path,
    pub type_name: &'a str,
    pub method_name: &'a str,
    pub delegate_type_name: &'a str,
}

/// Produces native function pointers for glue entry points
///
/// Implemented by [`Host`]; tests and embedders hosting the runtime themselves
/// provide their own.
pub trait EntryPointResolver: Send + Sync {
    /// Raw pointer for `entry`, null when it cannot be resolved
    fn resolve(&self, entry: &EntryPoint<'_>) -> *mut c_void;
}

impl EntryPointResolver for Host {
    fn resolve(&self, entry: &EntryPoint<'_>) -> *mut c_void {
        match self.resolve_loaded(
            entry.assembly_path,
            entry.type_name,
            entry.method_name,
            Some(entry.delegate_type_name),
        ) {
            Ok(ptr) => ptr,
            Err(e) => {
                logging::log_unresolved("glue", &format!("{}: {e}", entry.method_name));
                std::ptr::null_mut()
            }
        }
    }
}

/// Glue method names, in resolution order
pub const ENTRY_POINTS: [&str; 16] = [
    "LoadAssembly",
    "ResolveStaticMethod",
    "ResolveConstructor",
    "ResolveInstanceMethod",
    "ResolveSafeMethod",
    "AddEventHandler",
    "RemoveEventHandler",
    "RemoveAllEventHandlers",
    "AddObjectRef",
    "FreeDelegateRef",
    "FreeObjectRef",
    "FreeTypeRef",
    "AddInterfaceProxy",
    "SetInterfaceMethod",
    "Stats",
    "GetObject",
];

type Ptr = *mut c_void;

/// Resolved glue entry points
#[derive(Clone, Copy, Default)]
pub(crate) struct GlueTable {
    pub load_assembly: Function<bool, (String,)>,
    pub resolve_static_method: Function<Ptr, (String, String, i32, ParameterArray)>,
    pub resolve_constructor: Function<Ptr, (i32, ParameterArray)>,
    pub resolve_instance_method: Function<Ptr, (ObjectRef, String, i32, ParameterArray)>,
    pub resolve_safe_method: Function<Ptr, (Ptr, i32, ParameterArray)>,
    pub add_event_handler: Function<(), (ObjectRef, String, Ptr, Ptr)>,
    pub remove_event_handler: Function<(), (ObjectRef, String, Ptr)>,
    pub remove_all_event_handlers: Function<(), (ObjectRef,)>,
    pub add_object_ref: Function<Ptr, (ObjectRef, bool)>,
    pub free_delegate_ref: Function<(), (Ptr,)>,
    pub free_object_ref: Function<(), (Ptr,)>,
    pub free_type_ref: Function<(), (String,)>,
    pub add_interface_proxy: Function<Ptr, (String,)>,
    pub set_interface_method: Function<(), (ObjectRef, String, i32, ParameterArray, Ptr, Ptr, Ptr)>,
    pub stats: Function<(), (*mut i32, *mut i32, *mut i32)>,
    pub get_object: Function<Ptr, (ObjectRef, String)>,
}

impl GlueTable {
    /// Resolve every entry point; missing ones stay unresolved
    pub(crate) fn resolve(resolver: &dyn EntryPointResolver, names: &GlueNames) -> Self {
        let type_name = names.type_full_name();
        let entry = |method: &str| -> Ptr {
            let delegate_type_name = names.delegate_type_name(method);
            let ptr = resolver.resolve(&EntryPoint {
                assembly_path: &names.assembly_path,
                type_name: &type_name,
                method_name: method,
                delegate_type_name: &delegate_type_name,
            });
            if ptr.is_null() {
                tracing::warn!(event = "glue_missing", method = method, "glue entry point not resolved");
            }
            ptr
        };

        let [load_assembly, resolve_static_method, resolve_constructor, resolve_instance_method, resolve_safe_method, add_event_handler, remove_event_handler, remove_all_event_handlers, add_object_ref, free_delegate_ref, free_object_ref, free_type_ref, add_interface_proxy, set_interface_method, stats, get_object] =
            ENTRY_POINTS.map(entry);

        // Safety: each entry point is declared by the glue component with the
        // delegate type whose signature matches the field it is bound to.
        unsafe {
            Self {
                load_assembly: Function::from_raw(load_assembly),
                resolve_static_method: Function::from_raw(resolve_static_method),
                resolve_constructor: Function::from_raw(resolve_constructor),
                resolve_instance_method: Function::from_raw(resolve_instance_method),
                resolve_safe_method: Function::from_raw(resolve_safe_method),
                add_event_handler: Function::from_raw(add_event_handler),
                remove_event_handler: Function::from_raw(remove_event_handler),
                remove_all_event_handlers: Function::from_raw(remove_all_event_handlers),
                add_object_ref: Function::from_raw(add_object_ref),
                free_delegate_ref: Function::from_raw(free_delegate_ref),
                free_object_ref: Function::from_raw(free_object_ref),
                free_type_ref: Function::from_raw(free_type_ref),
                add_interface_proxy: Function::from_raw(add_interface_proxy),
                set_interface_method: Function::from_raw(set_interface_method),
                stats: Function::from_raw(stats),
                get_object: Function::from_raw(get_object),
            }
        }
    }

    /// Number of resolved entry points
    pub(crate) fn resolved_count(&self) -> usize {
        [
            self.load_assembly.is_valid(),
            self.resolve_static_method.is_valid(),
            self.resolve_constructor.is_valid(),
            self.resolve_instance_method.is_valid(),
            self.resolve_safe_method.is_valid(),
            self.add_event_handler.is_valid(),
            self.remove_event_handler.is_valid(),
            self.remove_all_event_handlers.is_valid(),
            self.add_object_ref.is_valid(),
            self.free_delegate_ref.is_valid(),
            self.free_object_ref.is_valid(),
            self.free_type_ref.is_valid(),
            self.add_interface_proxy.is_valid(),
            self.set_interface_method.is_valid(),
            self.stats.is_valid(),
            self.get_object.is_valid(),
        ]
        .iter()
        .filter(|v| **v)
        .count()
    }
}
