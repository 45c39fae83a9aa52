//! Safe calls - managed exceptions captured instead of crossing the boundary
//!
//! The glue component wraps a resolved function so that the wrapper takes the
//! target object first and returns a [`SafeReturn`]: a managed object holding
//! either the value or the exception that was thrown.

use core::ffi::c_void;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use crate::adapter::adapter;
use crate::function::Function;
use crate::logging;
use crate::marshal::{signature, ArgList, Inbound, Outbound, Parameter, Parameters};
use crate::object::{DotNetException, ManagedObject, ObjectRef};

/// Exception-capturing wrapper around a resolved method or constructor
pub struct SafeMethod<R, A = ()> {
    func: Function<R, A>,
    safe: *mut c_void,
}

// Safety: both pointers are immutable code addresses.
unsafe impl<R, A> Send for SafeMethod<R, A> {}
unsafe impl<R, A> Sync for SafeMethod<R, A> {}

impl<R, A> Clone for SafeMethod<R, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, A> Copy for SafeMethod<R, A> {}

impl<R, A> Default for SafeMethod<R, A> {
    fn default() -> Self {
        Self {
            func: Function::null(),
            safe: std::ptr::null_mut(),
        }
    }
}

impl<R, A> fmt::Debug for SafeMethod<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeMethod")
            .field("func", &self.func.as_ptr())
            .field("safe", &self.safe)
            .finish()
    }
}

impl<R, A> SafeMethod<R, A> {
    /// Pair a function with its safe wrapper, both already resolved
    ///
    /// # Safety
    ///
    /// A non-null `safe` must be the glue wrapper resolved for `func` with
    /// [`SafeMethod::parameters`]: a `system` function taking the target
    /// object followed by the wire types of `A`, returning a `SafeReturn`
    /// reference.
    pub unsafe fn from_raw(func: Function<R, A>, safe: *mut c_void) -> Self {
        Self { func, safe }
    }

    /// `true` when the safe wrapper was resolved
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.safe.is_null()
    }

    /// The unwrapped function
    pub fn function(&self) -> Function<R, A> {
        self.func
    }
}

impl<R: Inbound, A: ArgList> SafeMethod<R, A> {
    /// Wrap `func`; stays unresolved if `func` is
    pub fn new(func: Function<R, A>) -> Self {
        let safe = adapter().resolve_safe_method(func.as_ptr(), &Self::parameters());
        Self { func, safe }
    }

    /// Signature of the wrapper: `SafeReturn(object target, A..)`
    pub fn parameters() -> Parameters {
        let mut params = signature::<ObjectRef, A>();
        params.insert(1, Parameter::object_ref("System.Object"));
        params
    }
}

macro_rules! impl_safe_arity {
    ($($arg:ident: $ty:ident),*) => {
        impl<R: Inbound + 'static, $($ty: Outbound),*> SafeMethod<R, ($($ty,)*)> {
            /// Call on `target`; unresolved wrappers return `Ok(R::null())`
            #[allow(clippy::too_many_arguments)]
            pub fn invoke<'a>(
                &self,
                target: &ObjectRef,
                $($arg: $ty::Arg<'a>),*
            ) -> Result<R::Target, DotNetException> {
                // Safety: `self.safe` was resolved with `parameters()`, whose
                // first slot is the target object reference.
                let safe: Function<SafeReturn<R>, (*mut c_void, $($ty,)*)> =
                    unsafe { Function::from_raw(self.safe) };
                if !safe.is_valid() {
                    return Ok(R::null());
                }
                safe.call(target.as_ptr(), $($arg),*).into_result()
            }

            /// Call a static member or constructor
            #[allow(clippy::too_many_arguments)]
            pub fn invoke_static<'a>(&self, $($arg: $ty::Arg<'a>),*) -> Result<R::Target, DotNetException> {
                self.invoke(&ObjectRef::null(), $($arg),*)
            }
        }
    };
}

impl_safe_arity!();
impl_safe_arity!(a0: A0);
impl_safe_arity!(a0: A0, a1: A1);
impl_safe_arity!(a0: A0, a1: A1, a2: A2);
impl_safe_arity!(a0: A0, a1: A1, a2: A2, a3: A3);
impl_safe_arity!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4);
impl_safe_arity!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5);

/// Outcome of a safe call: a value or a captured exception
pub struct SafeReturn<R> {
    object: ObjectRef,
    _value: PhantomData<fn() -> R>,
}

impl<R: Inbound + 'static> SafeReturn<R> {
    /// Returned value; `R::null()` when an exception was captured
    pub fn value(&self) -> R::Target {
        self.method::<R, ()>("get_Value").call()
    }

    /// Captured exception; null when the call succeeded
    pub fn exception(&self) -> DotNetException {
        self.method::<DotNetException, ()>("get_Exception").call()
    }

    pub fn into_result(self) -> Result<R::Target, DotNetException> {
        let exception = self.exception();
        if exception.is_valid() {
            logging::log_managed_exception(&exception.message());
            return Err(exception);
        }
        if R::IS_VOID {
            return Ok(R::null());
        }
        Ok(self.value())
    }
}

impl<R: Inbound + 'static> ManagedObject for SafeReturn<R> {
    fn qualified_type_name() -> Cow<'static, str> {
        Cow::Borrowed("System.Object")
    }

    fn from_object_ref(object: ObjectRef) -> Self {
        Self {
            object,
            _value: PhantomData,
        }
    }

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }
}
