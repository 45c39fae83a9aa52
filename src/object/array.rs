//! Single-dimension managed arrays

use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use super::{DotNetException, ManagedObject, ObjectRef, TypeDescriptor};
use crate::function::Function;
use crate::marshal::{Inbound, Outbound};
use crate::safe::SafeMethod;

/// `T[]`
///
/// Element access goes through safe calls; an out-of-range index comes back
/// as an `IndexOutOfRangeException`.
pub struct DotNetArray<T> {
    object: ObjectRef,
    length: Cell<Function<i32>>,
    get: Cell<SafeMethod<T, (i32,)>>,
    set: Cell<SafeMethod<(), (i32, T)>>,
    _element: PhantomData<fn() -> T>,
}

/// `System.Int32` -> `System.Int32[]`, `A.B, Lib` -> `A.B[], Lib`
pub(crate) fn array_type_name(element: &str) -> String {
    match element.find(',') {
        Some(comma) => format!("{}[]{}", &element[..comma], &element[comma..]),
        None => format!("{element}[]"),
    }
}

impl<T> DotNetArray<T>
where
    T: Outbound + Inbound + 'static,
{
    /// New array of `length` default elements
    pub fn new(length: usize) -> Self {
        let Ok(length) = i32::try_from(length) else {
            return Self::from_object_ref(ObjectRef::null());
        };
        TypeDescriptor::new(&Self::qualified_type_name())
            .constructor::<Self, (i32,)>()
            .call(length)
    }

    /// Element count, zero for a null array
    pub fn len(&self) -> usize {
        let length = self.cached_method("get_Length", &self.length).call();
        usize::try_from(length).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `array[index]`
    pub fn get(&self, index: usize) -> Result<<T as Inbound>::Target, DotNetException> {
        let index = i32::try_from(index).unwrap_or(i32::MAX);
        self.cached_safe_method("Get", &self.get)
            .invoke(&self.object, index)
    }

    /// `array[index] = value`
    pub fn set(&self, index: usize, value: <T as Outbound>::Arg<'_>) -> Result<(), DotNetException> {
        let index = i32::try_from(index).unwrap_or(i32::MAX);
        self.cached_safe_method("Set", &self.set)
            .invoke(&self.object, index, value)
    }

    /// Copy every element out
    pub fn to_vec(&self) -> Result<Vec<<T as Inbound>::Target>, DotNetException> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}

impl<T> ManagedObject for DotNetArray<T>
where
    T: Outbound + Inbound + 'static,
{
    fn qualified_type_name() -> Cow<'static, str> {
        Cow::Owned(array_type_name(&T::type_name()))
    }

    fn from_object_ref(object: ObjectRef) -> Self {
        Self {
            object,
            length: Cell::default(),
            get: Cell::default(),
            set: Cell::default(),
            _element: PhantomData,
        }
    }

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }
}

impl<T> Clone for DotNetArray<T>
where
    T: Outbound + Inbound + 'static,
{
    fn clone(&self) -> Self {
        Self::from_object_ref(self.object.clone())
    }
}

impl<T> fmt::Debug for DotNetArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DotNetArray").field("handle", &self.object.as_ptr()).finish()
    }
}
