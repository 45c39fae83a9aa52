//! Managed objects - reference handles and the wrappers built on them
//!
//! Design: every wrapper owns one [`ObjectRef`] and implements
//! [`ManagedObject`]. That single impl makes the wrapper marshalable:
//! - outbound it passes its handle by reference
//! - inbound it adopts the fresh handle returned by the hosted runtime
//!
//! Member bindings are resolved on demand and cached in `Cell`s owned by the
//! wrapper, so a wrapper is `Send` but not `Sync`.

mod array;
mod exception;
mod handle;
mod instance;
mod types;

use core::ffi::c_void;
use std::borrow::Cow;
use std::cell::Cell;
use std::sync::Arc;

pub use array::DotNetArray;
pub use exception::DotNetException;
pub use handle::ObjectRef;
pub use instance::DotNetObject;
pub use types::{DotNetType, TypeDescriptor};
pub(crate) use types::clear_bindings;

use crate::adapter::adapter;
use crate::bridge::{EventHandler, EventSubscription};
use crate::function::Function;
use crate::marshal::{signature, ArgList, AsArg, Inbound, Outbound, TypeOf, UnmanagedType};
use crate::safe::SafeMethod;

/// Rust wrapper around a managed object
///
/// ```ignore
/// struct Uri(DotNetObject);
///
/// impl ManagedObject for Uri {
///     fn qualified_type_name() -> Cow<'static, str> { "System.Uri".into() }
///     fn from_object_ref(object: ObjectRef) -> Self { Uri(DotNetObject::new(object)) }
///     fn object_ref(&self) -> &ObjectRef { self.0.object_ref() }
/// }
/// ```
pub trait ManagedObject: Sized + 'static {
    /// Assembly-qualified name of the managed type
    fn qualified_type_name() -> Cow<'static, str>;

    /// Wrap a handle, taking ownership of it
    fn from_object_ref(object: ObjectRef) -> Self;

    fn object_ref(&self) -> &ObjectRef;

    fn is_valid(&self) -> bool {
        self.object_ref().is_valid()
    }

    /// View the same object through another wrapper
    ///
    /// No type check happens; members missing on the managed side stay
    /// unresolved.
    fn cast<T: ManagedObject>(&self) -> T {
        T::from_object_ref(self.object_ref().clone())
    }

    /// Resolve an instance method by name and signature
    fn method<R: Inbound, A: ArgList>(&self, name: &str) -> Function<R, A> {
        let ptr = adapter().resolve_instance_method(self.object_ref(), name, &signature::<R, A>());
        // Safety: the glue builds the thunk for exactly `signature::<R, A>()`.
        unsafe { Function::from_raw(ptr) }
    }

    /// Resolve an instance method wrapped for exception capture
    fn safe_method<R: Inbound, A: ArgList>(&self, name: &str) -> SafeMethod<R, A> {
        SafeMethod::new(self.method(name))
    }

    /// Resolve once into `cell`, re-resolving while it stays unresolved
    fn cached_method<R: Inbound, A: ArgList>(&self, name: &str, cell: &Cell<Function<R, A>>) -> Function<R, A> {
        let func = cell.get();
        if func.is_valid() {
            return func;
        }
        let func = self.method(name);
        cell.set(func);
        func
    }

    fn cached_safe_method<R: Inbound, A: ArgList>(
        &self,
        name: &str,
        cell: &Cell<SafeMethod<R, A>>,
    ) -> SafeMethod<R, A> {
        let method = cell.get();
        if method.is_valid() {
            return method;
        }
        let method = self.safe_method(name);
        cell.set(method);
        method
    }

    /// Member reached through a dotted path of properties and fields
    fn object_at(&self, path: &str) -> DotNetObject {
        // Safety: the glue component returns a fresh reference.
        DotNetObject::new(unsafe { ObjectRef::from_raw(adapter().object_at_path(self.object_ref(), path)) })
    }

    /// Forward `event` to `handler` until the subscription is dropped
    fn subscribe_event(&self, event: &str, handler: Arc<dyn EventHandler>) -> EventSubscription {
        EventSubscription::subscribe(self.object_ref(), event, handler)
    }
}

impl<T: ManagedObject> TypeOf for T {
    const MARSHAL_AS: UnmanagedType = UnmanagedType::ObjectRef;

    fn type_name() -> Cow<'static, str> {
        T::qualified_type_name()
    }
}

impl<T: ManagedObject> Outbound for T {
    type Arg<'a> = &'a T;
    type Staged = *mut c_void;
    type Wire = *mut c_void;

    #[inline]
    fn stage(arg: &T) -> *mut c_void {
        arg.object_ref().as_ptr()
    }

    #[inline]
    fn wire(staged: &*mut c_void) -> *mut c_void {
        *staged
    }

    #[inline]
    fn null_wire() -> *mut c_void {
        std::ptr::null_mut()
    }
}

impl<T: ManagedObject> Inbound for T {
    type Wire = *mut c_void;
    type Target = T;

    unsafe fn convert(wire: *mut c_void) -> T {
        T::from_object_ref(ObjectRef::from_raw(wire))
    }

    fn null() -> T {
        T::from_object_ref(ObjectRef::null())
    }
}

impl<T: ManagedObject> AsArg for T {
    #[inline]
    fn as_arg(&self) -> &T {
        self
    }
}
