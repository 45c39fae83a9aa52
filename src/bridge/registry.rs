//! Callback context registry
//!
//! Native callbacks receive an opaque context chosen by us. Contexts are keys
//! into this registry, never addresses, so a call arriving after the owner
//! was dropped finds nothing instead of freed memory.

use core::ffi::c_void;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

type Target = Arc<dyn Any + Send + Sync>;

/// Live contexts (lock-free concurrent map)
static CONTEXTS: Lazy<DashMap<usize, Target>> = Lazy::new(|| DashMap::with_capacity(64));

/// Zero is reserved; glue calls with a null context are rejected
static NEXT_KEY: AtomicUsize = AtomicUsize::new(1);

/// Registration of one callback target; removed by [`unregister`]
#[derive(Debug, PartialEq, Eq, Hash)]
pub(crate) struct ContextKey(usize);

impl ContextKey {
    /// Context value handed to the glue component
    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

/// Register `target`, returning its context
pub(crate) fn register(target: Target) -> ContextKey {
    let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
    CONTEXTS.insert(key, target);
    ContextKey(key)
}

/// Drop the registration; later calls with this context are ignored
pub(crate) fn unregister(key: ContextKey) {
    CONTEXTS.remove(&key.0);
}

/// Target registered under `context`, if it is still live and a `T`
pub(crate) fn lookup<T: Any + Send + Sync>(context: *mut c_void) -> Option<Arc<T>> {
    let target = CONTEXTS.get(&(context as usize))?.value().clone();
    target.downcast::<T>().ok()
}

/// Number of live callback contexts
pub fn live_contexts() -> usize {
    CONTEXTS.len()
}
