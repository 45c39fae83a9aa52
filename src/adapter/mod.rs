//! Adapter - process-wide dispatch facade over the glue component
//!
//! Design: one [`Adapter`] per process, reached through [`adapter()`].
//! - explicit `init` / `init_with_resolver` / `shutdown`
//! - any other operation initializes lazily from the discovered
//!   [`BridgeConfig`] on first use; a failed lazy attempt is not retried until
//!   the next explicit `init` or `shutdown`
//! - release operations never initialize; after `shutdown` they are logged no-ops
//!
//! Every operation validates its identifying arguments and degrades to
//! null / `false` / no-op instead of calling across the boundary with them.

mod glue;

use core::ffi::c_void;
use std::ptr;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::host::Host;
use crate::logging;
use crate::marshal::Parameter;
use crate::object::ObjectRef;

pub use glue::{EntryPoint, EntryPointResolver, GlueNames, ENTRY_POINTS};
use glue::GlueTable;

/// Native event handler signature expected by `AddEventHandler`
pub type EventCallback = unsafe extern "system" fn(
    context: *mut c_void,
    event_name: *const u16,
    source: *mut c_void,
    args: *mut c_void,
);

/// Outstanding resources held by the glue component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Live object references
    pub ref_count: i32,
    /// Cached static and constructor bindings
    pub static_count: i32,
    /// Registered event handlers
    pub event_count: i32,
}

struct Ready {
    glue: GlueTable,
    names: GlueNames,
    // Keeps the runtime (and so every resolved pointer) alive.
    _resolver: Box<dyn EntryPointResolver>,
}

enum State {
    Uninitialized,
    LazyInitFailed,
    Ready(Ready),
}

/// Dispatch facade; see the module docs
pub struct Adapter {
    state: RwLock<State>,
}

// Statics are never dropped: the runtime and its glue stay loaded until
// `shutdown` or process exit, and nothing is released for you at exit.
static ADAPTER: Lazy<Adapter> = Lazy::new(|| Adapter {
    state: RwLock::new(State::Uninitialized),
});

/// The process-wide adapter
#[inline]
pub fn adapter() -> &'static Adapter {
    &ADAPTER
}

impl Adapter {
    /// The process-wide adapter
    #[inline]
    pub fn instance() -> &'static Adapter {
        adapter()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load the runtime described by `config` and resolve the glue component
    ///
    /// No-op when already initialized.
    pub fn init(&self, config: &BridgeConfig) -> Result<()> {
        let mut state = self.state.write();
        if matches!(*state, State::Ready(_)) {
            return Ok(());
        }

        let mut host = Host::new();
        host.load(&config.runtime.runtime_config(), config.runtime.hostfxr_path.as_deref())?;
        *state = State::Ready(Ready::new(Box::new(host), config.adapter.clone()));
        Ok(())
    }

    /// Resolve the glue component through an existing runtime
    ///
    /// `resolver` is kept alive until `shutdown`. No-op when already initialized.
    pub fn init_with_resolver(&self, resolver: Box<dyn EntryPointResolver>, names: GlueNames) {
        let mut state = self.state.write();
        if matches!(*state, State::Ready(_)) {
            return;
        }
        *state = State::Ready(Ready::new(resolver, names));
    }

    /// `true` once the glue component has been resolved
    pub fn is_valid(&self) -> bool {
        matches!(*self.state.read(), State::Ready(_))
    }

    /// Names of the active glue component
    pub fn glue_names(&self) -> Option<GlueNames> {
        match &*self.state.read() {
            State::Ready(ready) => Some(ready.names.clone()),
            _ => None,
        }
    }

    /// Drop the glue table and release the runtime
    ///
    /// Handles still alive afterwards must not be used; their release is
    /// skipped.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), State::Uninitialized);
        crate::object::clear_bindings();
        if matches!(previous, State::Ready(_)) {
            tracing::info!(event = "adapter_shutdown", "Adapter shut down");
        }
    }

    fn glue(&self) -> Option<GlueTable> {
        match &*self.state.read() {
            State::Ready(ready) => return Some(ready.glue),
            State::LazyInitFailed => return None,
            State::Uninitialized => {}
        }

        let mut state = self.state.write();
        if let State::Uninitialized = *state {
            let config = BridgeConfig::discover();
            let mut host = Host::new();
            match host.load(&config.runtime.runtime_config(), config.runtime.hostfxr_path.as_deref()) {
                Ok(()) => *state = State::Ready(Ready::new(Box::new(host), config.adapter)),
                Err(_) => *state = State::LazyInitFailed,
            }
        }
        match &*state {
            State::Ready(ready) => Some(ready.glue),
            _ => None,
        }
    }

    fn glue_if_initialized(&self) -> Option<GlueTable> {
        match &*self.state.read() {
            State::Ready(ready) => Some(ready.glue),
            _ => None,
        }
    }

    /// Glue for releasing `what`; never initializes
    fn release_glue(&self, what: &str) -> Option<GlueTable> {
        let glue = self.glue_if_initialized();
        if glue.is_none() {
            logging::log_release_after_shutdown(what);
        }
        glue
    }

    // ========================================================================
    // Assemblies and member resolution
    // ========================================================================

    /// Load an assembly into the hosted runtime
    pub fn load_assembly(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        self.glue().map_or(false, |g| g.load_assembly.call(name))
    }

    /// Resolve a static method of `type_name`
    ///
    /// `params` lists the return descriptor first, then each argument.
    pub fn resolve_static_method(&self, type_name: &str, method: &str, params: &[Parameter]) -> *mut c_void {
        if type_name.is_empty() || method.is_empty() {
            return ptr::null_mut();
        }
        let Some(glue) = self.glue() else {
            return ptr::null_mut();
        };
        let func = glue
            .resolve_static_method
            .call(type_name, method, params.len() as i32, params);
        if func.is_null() {
            logging::log_unresolved("static_method", &format!("{type_name}::{method}"));
        }
        func
    }

    /// Resolve a constructor; `params[0]` names the type to construct
    pub fn resolve_constructor(&self, params: &[Parameter]) -> *mut c_void {
        if params.is_empty() {
            return ptr::null_mut();
        }
        let Some(glue) = self.glue() else {
            return ptr::null_mut();
        };
        let func = glue.resolve_constructor.call(params.len() as i32, params);
        if func.is_null() {
            logging::log_unresolved("constructor", &params[0].type_name().unwrap_or_default());
        }
        func
    }

    /// Resolve an instance method bound to `object`
    pub fn resolve_instance_method(&self, object: &ObjectRef, method: &str, params: &[Parameter]) -> *mut c_void {
        if !object.is_valid() || method.is_empty() {
            return ptr::null_mut();
        }
        let Some(glue) = self.glue() else {
            return ptr::null_mut();
        };
        let func = glue
            .resolve_instance_method
            .call(object, method, params.len() as i32, params);
        if func.is_null() {
            logging::log_unresolved("instance_method", method);
        }
        func
    }

    /// Wrap a resolved function with the exception-capturing convention
    ///
    /// The result takes the target object first and returns a `SafeReturn`.
    pub fn resolve_safe_method(&self, func: *mut c_void, params: &[Parameter]) -> *mut c_void {
        if func.is_null() {
            return ptr::null_mut();
        }
        let Some(glue) = self.glue() else {
            return ptr::null_mut();
        };
        glue.resolve_safe_method.call(func, params.len() as i32, params)
    }

    /// Resolve a member by dotted path, returning a new reference
    pub fn object_at_path(&self, object: &ObjectRef, path: &str) -> *mut c_void {
        if !object.is_valid() || path.is_empty() {
            return ptr::null_mut();
        }
        self.glue()
            .map_or(ptr::null_mut(), |g| g.get_object.call(object, path))
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn add_event_handler(&self, source: &ObjectRef, event: &str, context: *mut c_void, callback: EventCallback) {
        if !source.is_valid() || event.is_empty() || context.is_null() {
            return;
        }
        if let Some(glue) = self.glue() {
            glue.add_event_handler
                .call(source, event, context, callback as *mut c_void);
        }
    }

    pub fn remove_event_handler(&self, source: &ObjectRef, event: &str, context: *mut c_void) {
        if !source.is_valid() || event.is_empty() || context.is_null() {
            return;
        }
        if let Some(glue) = self.release_glue("event_handler") {
            glue.remove_event_handler.call(source, event, context);
        }
    }

    pub fn remove_all_event_handlers(&self, source: &ObjectRef) {
        if !source.is_valid() {
            return;
        }
        if let Some(glue) = self.release_glue("event_handlers") {
            glue.remove_all_event_handlers.call(source);
        }
    }

    // ========================================================================
    // References
    // ========================================================================

    /// Register another (optionally weak) GC reference to `object`
    pub fn add_object_ref(&self, object: &ObjectRef, weak: bool) -> *mut c_void {
        if !object.is_valid() {
            return ptr::null_mut();
        }
        let Some(glue) = self.release_glue("object_ref") else {
            return ptr::null_mut();
        };
        let handle = glue.add_object_ref.call(object, weak);
        logging::log_ref_added(handle, weak);
        handle
    }

    pub fn free_object_ref(&self, handle: *mut c_void) {
        if handle.is_null() {
            return;
        }
        if let Some(glue) = self.release_glue("object_ref") {
            glue.free_object_ref.call(handle);
            logging::log_ref_freed(handle);
        }
    }

    pub fn free_delegate_ref(&self, func: *mut c_void) {
        if func.is_null() {
            return;
        }
        if let Some(glue) = self.release_glue("delegate_ref") {
            glue.free_delegate_ref.call(func);
        }
    }

    /// Release the static and constructor bindings cached for `type_name`
    pub fn free_type_ref(&self, type_name: &str) {
        if type_name.is_empty() {
            return;
        }
        if let Some(glue) = self.release_glue("type_ref") {
            glue.free_type_ref.call(type_name);
        }
    }

    // ========================================================================
    // Interface proxies
    // ========================================================================

    /// Create a managed object implementing `interface_name` through callbacks
    pub fn add_interface_proxy(&self, interface_name: &str) -> *mut c_void {
        if interface_name.is_empty() {
            return ptr::null_mut();
        }
        self.glue()
            .map_or(ptr::null_mut(), |g| g.add_interface_proxy.call(interface_name))
    }

    /// Route `method` of a proxy to a native callback
    ///
    /// `params` lists the return descriptor, then the context and key
    /// descriptors, then each argument.
    pub fn set_interface_method(
        &self,
        proxy: &ObjectRef,
        method: &str,
        params: &[Parameter],
        callback: *mut c_void,
        cleanup: *mut c_void,
        context: *mut c_void,
    ) {
        if !proxy.is_valid() || method.is_empty() || callback.is_null() {
            return;
        }
        if let Some(glue) = self.glue() {
            glue.set_interface_method.call(
                proxy,
                method,
                params.len() as i32,
                params,
                callback,
                cleanup,
                context,
            );
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Outstanding references, static bindings and event handlers
    ///
    /// All zero when the glue component does not expose its counters.
    ///
    /// Unlike the other operations this never initializes the adapter: before
    /// `init` (or after `shutdown`) it reports zeros without loading a runtime.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        if let Some(glue) = self.glue_if_initialized() {
            glue.stats.call(
                &mut stats.ref_count as *mut i32,
                &mut stats.static_count as *mut i32,
                &mut stats.event_count as *mut i32,
            );
        }
        stats
    }
}

impl Ready {
    fn new(resolver: Box<dyn EntryPointResolver>, names: GlueNames) -> Self {
        let glue = GlueTable::resolve(resolver.as_ref(), &names);
        tracing::info!(
            event = "adapter_init",
            resolved = glue.resolved_count(),
            expected = ENTRY_POINTS.len(),
            "Adapter initialized"
        );
        Self {
            glue,
            names,
            _resolver: resolver,
        }
    }
}
