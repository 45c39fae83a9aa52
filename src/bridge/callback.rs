//! Native callbacks behind interface proxy methods
//!
//! The glue component calls a proxied method as
//! `R callback(context, key, A0, A1, ..)`. Non-void results are staged here
//! and kept alive under `key` until the glue component calls
//! `cleanup(context, key)` after copying them.

use core::ffi::c_void;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::Mutex;

use super::registry;
use crate::logging;
use crate::marshal::{AsArg, Inbound, InboundList, Outbound, Parameters, TypeOf};

/// Result kept alive until the hosted runtime has copied it
struct Boxed<R: Outbound> {
    _value: R,
    _staged: R::Staged,
}

// Safety: staged values only point into the boxed value they were made from.
unsafe impl<R: Outbound + Send> Send for Boxed<R> {}

/// Rust closure callable from the hosted runtime
pub struct Callback<R: Outbound, A: InboundList> {
    function: Box<dyn Fn(A::Targets) -> R + Send + Sync>,
    boxes: Mutex<HashMap<u64, Boxed<R>>>,
}

/// Native entry points of a callback type
pub trait CallbackDelegate: Send + Sync + 'static {
    /// `R callback(context, key, A0, A1, ..)`
    fn delegate_ptr() -> *mut c_void
    where
        Self: Sized;

    /// `void cleanup(context, key)`
    fn cleanup_ptr() -> *mut c_void
    where
        Self: Sized;

    /// Return descriptor, context and key descriptors, then each argument
    fn parameters() -> Parameters
    where
        Self: Sized;

    /// Results not yet released by the hosted runtime
    fn pending_returns(&self) -> usize;
}

impl<R, A> Callback<R, A>
where
    R: AsArg + Send + 'static,
    A: InboundList + 'static,
{
    fn from_boxed(function: Box<dyn Fn(A::Targets) -> R + Send + Sync>) -> Self {
        Self {
            function,
            boxes: Mutex::new(HashMap::new()),
        }
    }

    fn dispatch(&self, key: u64, args: A::Targets) -> R::Wire {
        let value = match catch_unwind(AssertUnwindSafe(|| (self.function)(args))) {
            Ok(value) => value,
            Err(_) => {
                logging::log_callback_error("interface", "callback panicked");
                return R::null_wire();
            }
        };
        let staged = R::stage(value.as_arg());
        let wire = R::wire(&staged);
        if !R::IS_VOID {
            self.boxes.lock().insert(
                key,
                Boxed {
                    _value: value,
                    _staged: staged,
                },
            );
        }
        wire
    }

    unsafe extern "system" fn cleanup(context: *mut c_void, key: u64) {
        match registry::lookup::<Self>(context) {
            Some(callback) => {
                callback.boxes.lock().remove(&key);
            }
            None => logging::log_dangling_context(context),
        }
    }
}

macro_rules! impl_callback_arity {
    ($($arg:ident: $ty:ident),*) => {
        impl<R, $($ty),*> Callback<R, ($($ty,)*)>
        where
            R: AsArg + Send + 'static,
            $($ty: Inbound + 'static,)*
        {
            pub fn new<F>(function: F) -> Self
            where
                F: Fn($($ty::Target),*) -> R + Send + Sync + 'static,
            {
                Self::from_boxed(Box::new(move |($($arg,)*): ($($ty::Target,)*)| function($($arg),*)))
            }

            #[allow(clippy::too_many_arguments)]
            unsafe extern "system" fn delegate(
                context: *mut c_void,
                key: u64,
                $($arg: <$ty as Inbound>::Wire),*
            ) -> <R as Outbound>::Wire {
                let Some(callback) = registry::lookup::<Self>(context) else {
                    logging::log_dangling_context(context);
                    return R::null_wire();
                };
                // Safety: the glue passes wire values matching the registered signature.
                callback.dispatch(key, ($(unsafe { $ty::convert($arg) },)*))
            }
        }

        impl<R, $($ty),*> CallbackDelegate for Callback<R, ($($ty,)*)>
        where
            R: AsArg + Send + 'static,
            $($ty: Inbound + 'static,)*
        {
            fn delegate_ptr() -> *mut c_void {
                let delegate: unsafe extern "system" fn(*mut c_void, u64, $(<$ty as Inbound>::Wire),*) -> <R as Outbound>::Wire =
                    Self::delegate;
                delegate as *mut c_void
            }

            fn cleanup_ptr() -> *mut c_void {
                let cleanup: unsafe extern "system" fn(*mut c_void, u64) = Self::cleanup;
                cleanup as *mut c_void
            }

            fn parameters() -> Parameters {
                let mut params = Parameters::new();
                params.push(R::parameter());
                params.push(<*mut c_void>::parameter());
                params.push(u64::parameter());
                <($($ty,)*) as InboundList>::push_parameters(&mut params);
                params
            }

            fn pending_returns(&self) -> usize {
                self.boxes.lock().len()
            }
        }
    };
}

impl_callback_arity!();
impl_callback_arity!(a0: A0);
impl_callback_arity!(a0: A0, a1: A1);
impl_callback_arity!(a0: A0, a1: A1, a2: A2);
impl_callback_arity!(a0: A0, a1: A1, a2: A2, a3: A3);
impl_callback_arity!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4);
impl_callback_arity!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5);
