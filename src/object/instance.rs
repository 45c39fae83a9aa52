//! Generic object wrapper

use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;

use super::{DotNetType, ManagedObject, ObjectRef, TypeDescriptor};
use crate::function::Function;
use crate::marshal::ArgList;

/// Any managed object, with the members every object has
#[derive(Default)]
pub struct DotNetObject {
    object: ObjectRef,
    get_type: Cell<Function<DotNetType>>,
    to_string: Cell<Function<String>>,
    equals: Cell<Function<bool, (ObjectRef,)>>,
}

impl DotNetObject {
    pub fn new(object: ObjectRef) -> Self {
        Self {
            object,
            ..Self::default()
        }
    }

    pub fn null() -> Self {
        Self::default()
    }

    /// Constructor of `type_name` taking arguments `A`
    pub fn constructor<A: ArgList>(type_name: &str) -> Function<DotNetObject, A> {
        TypeDescriptor::new(type_name).constructor()
    }

    /// The handle, consuming the wrapper
    pub fn into_object_ref(self) -> ObjectRef {
        self.object
    }

    /// `Object.GetType()`
    pub fn get_type(&self) -> DotNetType {
        self.cached_method("GetType", &self.get_type).call()
    }

    /// `Object.ToString()`
    pub fn to_dotnet_string(&self) -> String {
        self.cached_method("ToString", &self.to_string).call()
    }

    /// `Object.Equals(object)`
    pub fn equals<T: ManagedObject>(&self, other: &T) -> bool {
        self.cached_method("Equals", &self.equals).call(other.object_ref())
    }
}

impl Clone for DotNetObject {
    fn clone(&self) -> Self {
        Self::new(self.object.clone())
    }
}

impl fmt::Debug for DotNetObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DotNetObject").field("handle", &self.object.as_ptr()).finish()
    }
}

impl ManagedObject for DotNetObject {
    fn qualified_type_name() -> Cow<'static, str> {
        Cow::Borrowed("System.Object")
    }

    fn from_object_ref(object: ObjectRef) -> Self {
        Self::new(object)
    }

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }
}

impl From<ObjectRef> for DotNetObject {
    fn from(object: ObjectRef) -> Self {
        Self::new(object)
    }
}
