//! `System.Exception`

use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;

use super::{DotNetType, ManagedObject, ObjectRef, TypeDescriptor};
use crate::function::Function;

/// A managed exception, usually captured by a safe call
///
/// Accessors resolve lazily and return empty values on a null exception.
#[derive(Default)]
pub struct DotNetException {
    object: ObjectRef,
    message: Cell<Function<String>>,
    source: Cell<Function<String>>,
    stack_trace: Cell<Function<String>>,
    h_result: Cell<Function<i32>>,
    inner_exception: Cell<Function<DotNetException>>,
    get_type: Cell<Function<DotNetType>>,
    to_string: Cell<Function<String>>,
    equals: Cell<Function<bool, (ObjectRef,)>>,
}

impl DotNetException {
    /// Construct an exception of `type_name` with a message
    pub fn new(type_name: &str, message: &str) -> Self {
        TypeDescriptor::new(type_name)
            .constructor::<DotNetException, (String,)>()
            .call(message)
    }

    pub fn message(&self) -> String {
        self.cached_method("get_Message", &self.message).call()
    }

    pub fn source(&self) -> String {
        self.cached_method("get_Source", &self.source).call()
    }

    pub fn stack_trace(&self) -> String {
        self.cached_method("get_StackTrace", &self.stack_trace).call()
    }

    /// `HResult`, zero on a null exception
    pub fn h_result(&self) -> i32 {
        self.cached_method("get_HResult", &self.h_result).call()
    }

    /// Wrapped exception; null when there is none
    pub fn inner_exception(&self) -> DotNetException {
        self.cached_method("get_InnerException", &self.inner_exception)
            .call()
    }

    pub fn get_type(&self) -> DotNetType {
        self.cached_method("GetType", &self.get_type).call()
    }

    /// Full description including the stack trace
    pub fn to_dotnet_string(&self) -> String {
        self.cached_method("ToString", &self.to_string).call()
    }

    pub fn equals<T: ManagedObject>(&self, other: &T) -> bool {
        self.cached_method("Equals", &self.equals).call(other.object_ref())
    }

    /// `true` if this exception's type is `type_name`
    ///
    /// Compares full names, so `type_name` must not be assembly-qualified.
    pub fn is_type(&self, type_name: &str) -> bool {
        self.is_valid() && self.get_type().full_name() == type_name
    }
}

impl Clone for DotNetException {
    fn clone(&self) -> Self {
        Self::from_object_ref(self.object.clone())
    }
}

impl ManagedObject for DotNetException {
    fn qualified_type_name() -> Cow<'static, str> {
        Cow::Borrowed("System.Exception")
    }

    fn from_object_ref(object: ObjectRef) -> Self {
        Self {
            object,
            ..Self::default()
        }
    }

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }
}

impl fmt::Display for DotNetException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("unknown managed exception");
        }
        f.write_str(&self.message())
    }
}

impl fmt::Debug for DotNetException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DotNetException")
            .field("handle", &self.object.as_ptr())
            .finish()
    }
}

impl std::error::Error for DotNetException {}
