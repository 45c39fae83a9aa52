//! Type marshaling - compile-time mapping between Rust values and wire values
//!
//! Design: every marshalable type implements [`TypeOf`] (runtime type name and
//! interop code) plus one or both directions:
//! - [`Outbound`]: argument passed into the hosted runtime
//! - [`Inbound`]: value returned from the hosted runtime
//!
//! Both directions carry a null sentinel used when a binding is unresolved.
//! New types plug in by implementing the traits; nothing here needs to change.
//!
//! ```ignore
//! struct Celsius;
//! impl TypeOf for Celsius {
//!     const MARSHAL_AS: UnmanagedType = UnmanagedType::R8;
//!     fn type_name() -> Cow<'static, str> { "System.Double".into() }
//! }
//! ```

mod parameter;
mod primitives;
mod string;
mod unmanaged;

use std::borrow::Cow;
use std::marker::PhantomData;

pub use parameter::{ParamFlags, ParamInfo, Parameter, ParameterWire, Parameters, STRING_MARSHALER};
pub use string::{read_wide, WideString};
pub use unmanaged::UnmanagedType;

/// Runtime type name and interop code of a marshalable type
pub trait TypeOf {
    /// How values of this type cross the boundary
    const MARSHAL_AS: UnmanagedType;

    /// `true` only for the unit type
    const IS_VOID: bool = false;

    /// Name used for overload resolution, e.g. `System.Int32`
    fn type_name() -> Cow<'static, str>;

    /// Descriptor used in resolution calls
    fn parameter() -> Parameter {
        Parameter::new(Self::type_name(), Self::MARSHAL_AS)
    }
}

/// Rust value passed as an argument
pub trait Outbound: TypeOf {
    /// What call sites pass
    type Arg<'a>;
    /// Owns whatever must stay alive while the call runs
    type Staged;
    /// Value handed to the hosted runtime
    type Wire: Copy;

    fn stage(arg: Self::Arg<'_>) -> Self::Staged;
    fn wire(staged: &Self::Staged) -> Self::Wire;

    /// Wire value meaning "nothing", returned by failed native callbacks
    fn null_wire() -> Self::Wire;
}

/// Value returned by the hosted runtime
pub trait Inbound: TypeOf {
    type Wire: Copy;
    type Target;

    /// Take ownership of a value returned across the boundary
    ///
    /// # Safety
    ///
    /// `wire` must have been produced by the hosted runtime (or a native
    /// callback) for this type. Pointer wires are dereferenced or adopted.
    unsafe fn convert(wire: Self::Wire) -> Self::Target;

    /// Value produced by unresolved bindings
    fn null() -> Self::Target;
}

/// Owned values that can be passed by reference as their own argument type
///
/// Needed where an owned result must be staged later, such as the return
/// value of a native callback.
pub trait AsArg: Outbound {
    fn as_arg(&self) -> Self::Arg<'_>;
}

/// Argument tuple of an outbound call
pub trait ArgList {
    fn push_parameters(params: &mut Parameters);
}

/// Argument tuple of a native callback invoked by the hosted runtime
pub trait InboundList {
    /// Converted arguments handed to the Rust callback
    type Targets;

    fn push_parameters(params: &mut Parameters);
}

macro_rules! impl_lists {
    ($($ty:ident),*) => {
        impl<$($ty: Outbound),*> ArgList for ($($ty,)*) {
            #[allow(unused_variables)]
            fn push_parameters(params: &mut Parameters) {
                $(params.push($ty::parameter());)*
            }
        }

        impl<$($ty: Inbound),*> InboundList for ($($ty,)*) {
            type Targets = ($($ty::Target,)*);

            #[allow(unused_variables)]
            fn push_parameters(params: &mut Parameters) {
                $(params.push($ty::parameter());)*
            }
        }
    };
}

impl_lists!();
impl_lists!(A0);
impl_lists!(A0, A1);
impl_lists!(A0, A1, A2);
impl_lists!(A0, A1, A2, A3);
impl_lists!(A0, A1, A2, A3, A4);
impl_lists!(A0, A1, A2, A3, A4, A5);
impl_lists!(A0, A1, A2, A3, A4, A5, A6);
impl_lists!(A0, A1, A2, A3, A4, A5, A6, A7);

/// Resolution descriptors: return type first, then each argument
pub fn signature<R: TypeOf, A: ArgList>() -> Parameters {
    let mut params = Parameters::new();
    params.push(R::parameter());
    A::push_parameters(&mut params);
    params
}

/// Typed null object argument
///
/// Passes a null reference while still presenting `T`'s type name to overload
/// resolution.
pub struct Null<T>(PhantomData<fn() -> T>);

impl<T: TypeOf> TypeOf for Null<T> {
    const MARSHAL_AS: UnmanagedType = UnmanagedType::ObjectRef;

    fn type_name() -> Cow<'static, str> {
        T::type_name()
    }
}

impl<T: TypeOf> Outbound for Null<T> {
    type Arg<'a> = ();
    type Staged = ();
    type Wire = *mut core::ffi::c_void;

    #[inline]
    fn stage(_: ()) {}

    #[inline]
    fn wire(_: &()) -> Self::Wire {
        std::ptr::null_mut()
    }

    #[inline]
    fn null_wire() -> Self::Wire {
        std::ptr::null_mut()
    }
}

/// Marker for a list of parameter descriptors passed to the glue component
pub struct ParameterArray;

impl TypeOf for ParameterArray {
    const MARSHAL_AS: UnmanagedType = UnmanagedType::LPArray;

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("Qt.DotNet.Parameter[]")
    }
}

impl Outbound for ParameterArray {
    type Arg<'a> = &'a [Parameter];
    type Staged = Vec<ParameterWire>;
    type Wire = *const ParameterWire;

    fn stage(params: &[Parameter]) -> Vec<ParameterWire> {
        params.iter().map(Parameter::to_wire).collect()
    }

    fn wire(staged: &Vec<ParameterWire>) -> *const ParameterWire {
        if staged.is_empty() {
            std::ptr::null()
        } else {
            staged.as_ptr()
        }
    }

    fn null_wire() -> *const ParameterWire {
        std::ptr::null()
    }
}
