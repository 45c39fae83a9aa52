//! Managed types - static members, constructors and `System.Type`
//!
//! Static and constructor bindings are cached process-wide, keyed by type,
//! member and signature, mirroring the glue component's own cache. Both are
//! dropped together by [`TypeDescriptor::free`].

use core::ffi::c_void;
use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::{ManagedObject, ObjectRef};
use crate::adapter::adapter;
use crate::function::Function;
use crate::marshal::{signature, ArgList, Inbound, Parameter, Parameters, TypeOf};
use crate::safe::SafeMethod;

#[derive(Clone, PartialEq, Eq, Hash)]
struct BindingKey {
    type_name: Arc<str>,
    member: String,
    signature: Parameters,
}

/// Resolved static bindings, as addresses
static BINDINGS: Lazy<DashMap<BindingKey, usize>> = Lazy::new(DashMap::new);

/// Forget every cached binding; they die with the runtime
pub(crate) fn clear_bindings() {
    BINDINGS.clear();
}

const CONSTRUCTOR: &str = ".ctor";

/// A managed type named by its assembly-qualified name
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    name: Arc<str>,
}

impl TypeDescriptor {
    pub fn new(name: &str) -> Self {
        Self { name: Arc::from(name) }
    }

    /// Descriptor of a marshalable Rust type
    pub fn of<T: TypeOf>() -> Self {
        Self::new(&T::type_name())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Static method `name` with signature `R(A)`
    pub fn static_method<R: Inbound, A: ArgList>(&self, name: &str) -> Function<R, A> {
        let params = signature::<R, A>();
        let ptr = self.cached(name, params, |params| adapter().resolve_static_method(&self.name, name, params));
        // Safety: the glue builds the thunk for exactly `signature::<R, A>()`.
        unsafe { Function::from_raw(ptr) }
    }

    /// Static method `name`, wrapped for exception capture
    pub fn safe_static_method<R: Inbound, A: ArgList>(&self, name: &str) -> SafeMethod<R, A> {
        let func = self.static_method::<R, A>(name);
        if !func.is_valid() {
            return SafeMethod::default();
        }
        let safe = self.cached(&format!("{name}#safe"), signature::<R, A>(), |_| {
            adapter().resolve_safe_method(func.as_ptr(), &SafeMethod::<R, A>::parameters())
        });
        // Safety: the wrapper was resolved for `func` with the safe parameter layout.
        unsafe { SafeMethod::from_raw(func, safe) }
    }

    /// Constructor taking arguments `A`, producing `T`
    ///
    /// `T` only decides how the new object is wrapped; the object created is
    /// always of this type.
    pub fn constructor<T: Inbound, A: ArgList>(&self) -> Function<T, A> {
        let ptr = self.cached(CONSTRUCTOR, self.constructor_parameters::<A>(), |params| {
            adapter().resolve_constructor(params)
        });
        // Safety: the glue builds the thunk for the constructor parameter list.
        unsafe { Function::from_raw(ptr) }
    }

    /// Constructor wrapped for exception capture
    pub fn safe_constructor<T: Inbound, A: ArgList>(&self) -> SafeMethod<T, A> {
        let func = self.constructor::<T, A>();
        if !func.is_valid() {
            return SafeMethod::default();
        }
        let safe = self.cached(&format!("{CONSTRUCTOR}#safe"), self.constructor_parameters::<A>(), |_| {
            adapter().resolve_safe_method(func.as_ptr(), &SafeMethod::<T, A>::parameters())
        });
        // Safety: as in `safe_static_method`.
        unsafe { SafeMethod::from_raw(func, safe) }
    }

    /// `System.Type` for this name, null when the type cannot be found
    pub fn find(&self) -> DotNetType {
        DotNetType::find(&self.name)
    }

    /// Release the bindings cached for this type on both sides
    pub fn free(&self) {
        BINDINGS.retain(|key, _| key.type_name != self.name);
        adapter().free_type_ref(&self.name);
    }

    /// Number of bindings cached for this type
    pub fn cached_bindings(&self) -> usize {
        BINDINGS.iter().filter(|entry| entry.key().type_name == self.name).count()
    }

    pub(crate) fn constructor_parameters<A: ArgList>(&self) -> Parameters {
        let mut params = Parameters::new();
        params.push(Parameter::object_ref(&*self.name));
        A::push_parameters(&mut params);
        params
    }

    /// Cached binding for `member` with `signature`, resolving on a miss
    ///
    /// Unresolved members are not cached.
    fn cached(
        &self,
        member: &str,
        signature: Parameters,
        resolve: impl FnOnce(&[Parameter]) -> *mut c_void,
    ) -> *mut c_void {
        let key = BindingKey {
            type_name: self.name.clone(),
            member: member.to_string(),
            signature,
        };
        if let Some(address) = BINDINGS.get(&key) {
            return *address as *mut c_void;
        }
        let func = resolve(&key.signature);
        if !func.is_null() {
            BINDINGS.insert(key, func as usize);
        }
        func
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeDescriptor").field(&&*self.name).finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// `System.Type`
#[derive(Default)]
pub struct DotNetType {
    object: ObjectRef,
    full_name: Cell<Function<String>>,
    assembly_qualified_name: Cell<Function<String>>,
}

impl DotNetType {
    /// `Type.GetType(name)`
    pub fn find(type_name: &str) -> Self {
        TypeDescriptor::new("System.Type")
            .static_method::<DotNetType, (String,)>("GetType")
            .call(type_name)
    }

    /// `Type.FullName`
    pub fn full_name(&self) -> String {
        self.cached_method("get_FullName", &self.full_name).call()
    }

    /// `Type.AssemblyQualifiedName`
    pub fn assembly_qualified_name(&self) -> String {
        self.cached_method("get_AssemblyQualifiedName", &self.assembly_qualified_name)
            .call()
    }

    /// Descriptor for static access to this type
    pub fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::new(&self.assembly_qualified_name())
    }
}

impl fmt::Debug for DotNetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DotNetType").field("handle", &self.object.as_ptr()).finish()
    }
}

impl ManagedObject for DotNetType {
    fn qualified_type_name() -> Cow<'static, str> {
        Cow::Borrowed("System.Type")
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
