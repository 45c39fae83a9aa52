//! Object reference handle
//!
//! An [`ObjectRef`] owns exactly one GC reference registered by the glue
//! component. Cloning registers another reference; dropping frees this one.

use core::ffi::c_void;
use std::borrow::Cow;
use std::fmt;
use std::ptr;

use super::ManagedObject;
use crate::adapter::adapter;

/// Owned, possibly null, reference to a managed object
pub struct ObjectRef {
    ptr: *mut c_void,
}

// Safety: the handle is an opaque GC handle; the glue component accepts it
// from any thread.
unsafe impl Send for ObjectRef {}

impl ObjectRef {
    /// Null reference
    #[inline]
    pub const fn null() -> Self {
        Self { ptr: ptr::null_mut() }
    }

    /// Adopt a reference returned by the hosted runtime
    ///
    /// # Safety
    /// `ptr` must be null or a reference registered by the glue component that
    /// nothing else will free.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut c_void) -> Self {
        Self { ptr }
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null()
    }

    /// Give up ownership without freeing
    pub fn into_raw(self) -> *mut c_void {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }

    /// Move the reference out, leaving this handle null
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Free the reference now, leaving this handle null
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /// New weak reference to the same object
    ///
    /// A weak reference does not keep the object alive; once collected, calls
    /// through it resolve to nothing.
    pub fn downgrade(&self) -> Self {
        // Safety: the glue component returns a fresh reference.
        unsafe { Self::from_raw(adapter().add_object_ref(self, true)) }
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::null()
    }
}

impl Clone for ObjectRef {
    fn clone(&self) -> Self {
        if !self.is_valid() {
            return Self::null();
        }
        // Safety: the glue component returns a fresh reference.
        unsafe { Self::from_raw(adapter().add_object_ref(self, false)) }
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            adapter().free_object_ref(self.ptr);
            self.ptr = ptr::null_mut();
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectRef").field(&self.ptr).finish()
    }
}

impl ManagedObject for ObjectRef {
    fn qualified_type_name() -> Cow<'static, str> {
        Cow::Borrowed("System.Object")
    }

    fn from_object_ref(object: ObjectRef) -> Self {
        object
    }

    fn object_ref(&self) -> &ObjectRef {
        self
    }
}
