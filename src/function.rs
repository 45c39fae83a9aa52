//! Function binder - typed calls through raw function pointers
//!
//! A [`Function<R, (A0, A1, ..)>`] pairs a raw pointer produced by the hosted
//! runtime with the Rust signature it was resolved for. Calling it stages each
//! argument through [`Outbound`], invokes the pointer with the platform calling
//! convention used by runtime-generated thunks (`system`), and converts the
//! result through [`Inbound`].
//!
//! An unresolved binder (null pointer) returns `R::null()` without calling
//! anything. Managed exceptions must never reach a raw binder; use
//! [`SafeMethod`](crate::safe::SafeMethod) for members that can throw.

use core::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;

use crate::marshal::{Inbound, Outbound};

/// Typed binder over a raw function pointer
pub struct Function<R, A = ()> {
    ptr: *mut c_void,
    _signature: PhantomData<fn(A) -> R>,
}

// Safety: the pointer is an immutable code address; calling it is governed by
// the hosted runtime's own thread rules.
unsafe impl<R, A> Send for Function<R, A> {}
unsafe impl<R, A> Sync for Function<R, A> {}

impl<R, A> Clone for Function<R, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, A> Copy for Function<R, A> {}

impl<R, A> Default for Function<R, A> {
    fn default() -> Self {
        Self::null()
    }
}

impl<R, A> fmt::Debug for Function<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Function").field(&self.ptr).finish()
    }
}

impl<R, A> Function<R, A> {
    /// Unresolved binder
    pub const fn null() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            _signature: PhantomData,
        }
    }

    /// Bind a raw pointer
    ///
    /// A null pointer yields an unresolved binder.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must be a function with the `system` calling
    /// convention whose parameters and return value are the `Wire` types of
    /// `A` and `R`, and it must stay callable for as long as the binder (or
    /// any copy of it) is used.
    pub const unsafe fn from_raw(ptr: *mut c_void) -> Self {
        Self {
            ptr,
            _signature: PhantomData,
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null()
    }
}

macro_rules! impl_function_arity {
    ($($arg:ident: $ty:ident),*) => {
        impl<R: Inbound, $($ty: Outbound),*> Function<R, ($($ty,)*)> {
            /// Invoke the bound pointer, or return `R::null()` if unresolved
            #[allow(clippy::too_many_arguments, clippy::unused_unit)]
            pub fn call<'a>(&self, $($arg: $ty::Arg<'a>),*) -> R::Target {
                if self.ptr.is_null() {
                    return R::null();
                }
                $(let $arg = $ty::stage($arg);)*
                // Safety: the pointer was resolved by the hosted runtime for
                // this signature, whose wire types are the `Wire` associated
                // types of each argument and of the return value.
                let raw: unsafe extern "system" fn($($ty::Wire),*) -> R::Wire =
                    unsafe { std::mem::transmute_copy(&self.ptr) };
                let wire = unsafe { raw($($ty::wire(&$arg)),*) };
                // Safety: the wire value was produced by the runtime for `R`.
                unsafe { R::convert(wire) }
            }
        }
    };
}

impl_function_arity!();
impl_function_arity!(a0: A0);
impl_function_arity!(a0: A0, a1: A1);
impl_function_arity!(a0: A0, a1: A1, a2: A2);
impl_function_arity!(a0: A0, a1: A1, a2: A2, a3: A3);
impl_function_arity!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4);
impl_function_arity!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5);
impl_function_arity!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6);
impl_function_arity!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7);
