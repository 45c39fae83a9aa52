//! Managed objects implementing an interface through Rust callbacks

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use super::callback::CallbackDelegate;
use super::registry::{self, ContextKey};
use crate::adapter::adapter;
use crate::marshal::{Parameter, Parameters, TypeOf};
use crate::object::{ManagedObject, ObjectRef};

struct Binding {
    method: String,
    context: ContextKey,
    callback: Arc<dyn CallbackDelegate + Send + Sync>,
}

/// Managed proxy object whose interface methods call Rust closures
///
/// ```ignore
/// let mut proxy = InterfaceProxy::new("FooLib.IBarTransformation, FooLib");
/// proxy.set_callback("Transform", Callback::<String, (String,)>::new(|s| s.to_uppercase()));
/// foo.set_transformation(&proxy);
/// ```
///
/// Callbacks stay registered until the proxy is dropped. The managed proxy may
/// outlive it; its calls are then logged and ignored.
pub struct InterfaceProxy {
    object: ObjectRef,
    bindings: Vec<Binding>,
}

impl InterfaceProxy {
    /// New proxy implementing `interface_name`; null if the interface is unknown
    pub fn new(interface_name: &str) -> Self {
        // Safety: the glue component returns a fresh reference.
        Self::from_object_ref(unsafe { ObjectRef::from_raw(adapter().add_interface_proxy(interface_name)) })
    }

    /// Route `method` to `callback`
    pub fn set_callback<C: CallbackDelegate>(&mut self, method: &str, callback: C) {
        self.bind(method, C::parameters(), callback);
    }

    /// Route `method` to `callback` with explicit descriptors
    ///
    /// `params` lists the return descriptor, then each argument; the context
    /// and key descriptors are inserted after the return descriptor.
    pub fn set_callback_with_parameters<C: CallbackDelegate>(
        &mut self,
        method: &str,
        params: &[Parameter],
        callback: C,
    ) {
        let mut full: Parameters = params.iter().cloned().collect();
        let at = full.len().min(1);
        full.insert(at, <*mut core::ffi::c_void>::parameter());
        full.insert(at + 1, u64::parameter());
        self.bind(method, full, callback);
    }

    fn bind<C: CallbackDelegate>(&mut self, method: &str, params: Parameters, callback: C) {
        if !self.object.is_valid() {
            return;
        }
        let callback = Arc::new(callback);
        let context = registry::register(callback.clone());
        adapter().set_interface_method(
            &self.object,
            method,
            &params,
            C::delegate_ptr(),
            C::cleanup_ptr(),
            context.as_ptr(),
        );
        self.bindings.push(Binding {
            method: method.to_string(),
            context,
            callback,
        });
    }

    /// Methods routed so far
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.method.as_str())
    }

    /// Callback results the hosted runtime has not released yet
    pub fn pending_returns(&self) -> usize {
        self.bindings.iter().map(|b| b.callback.pending_returns()).sum()
    }
}

impl Drop for InterfaceProxy {
    fn drop(&mut self) {
        for binding in self.bindings.drain(..) {
            registry::unregister(binding.context);
        }
    }
}

impl fmt::Debug for InterfaceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceProxy")
            .field("handle", &self.object.as_ptr())
            .field("methods", &self.methods().collect::<Vec<_>>())
            .finish()
    }
}

impl ManagedObject for InterfaceProxy {
    fn qualified_type_name() -> Cow<'static, str> {
        Cow::Borrowed("System.Object")
    }

    fn from_object_ref(object: ObjectRef) -> Self {
        Self {
            object,
            bindings: Vec::new(),
        }
    }

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }
}
