//! Fundamental types: unit, bool, integers, floats, raw pointers

use std::borrow::Cow;

use super::{AsArg, Inbound, Outbound, TypeOf, UnmanagedType};

/// Types whose wire form is the value itself
macro_rules! pass_through {
    ($($ty:ty => $name:literal, $marshal:ident;)*) => {$(
        impl TypeOf for $ty {
            const MARSHAL_AS: UnmanagedType = UnmanagedType::$marshal;

            fn type_name() -> Cow<'static, str> {
                Cow::Borrowed($name)
            }
        }

        impl Outbound for $ty {
            type Arg<'a> = $ty;
            type Staged = $ty;
            type Wire = $ty;

            #[inline]
            fn stage(arg: $ty) -> $ty {
                arg
            }

            #[inline]
            fn wire(staged: &$ty) -> $ty {
                *staged
            }

            #[inline]
            fn null_wire() -> $ty {
                <$ty>::default()
            }
        }

        impl Inbound for $ty {
            type Wire = $ty;
            type Target = $ty;

            #[inline]
            unsafe fn convert(wire: $ty) -> $ty {
                wire
            }

            #[inline]
            fn null() -> $ty {
                <$ty>::default()
            }
        }

        impl AsArg for $ty {
            #[inline]
            fn as_arg(&self) -> $ty {
                *self
            }
        }
    )*};
}

pass_through! {
    i8 => "System.SByte", I1;
    u8 => "System.Byte", U1;
    i16 => "System.Int16", I2;
    u16 => "System.UInt16", U2;
    i32 => "System.Int32", I4;
    u32 => "System.UInt32", U4;
    i64 => "System.Int64", I8;
    u64 => "System.UInt64", U8;
    f32 => "System.Single", R4;
    f64 => "System.Double", R8;
    isize => "System.IntPtr", SysInt;
    usize => "System.UIntPtr", SysUInt;
}

impl TypeOf for () {
    const MARSHAL_AS: UnmanagedType = UnmanagedType::Void;
    const IS_VOID: bool = true;

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("System.Void")
    }
}

impl Outbound for () {
    type Arg<'a> = ();
    type Staged = ();
    type Wire = ();

    #[inline]
    fn stage(_: ()) {}

    #[inline]
    fn wire(_: &()) {}

    #[inline]
    fn null_wire() {}
}

impl Inbound for () {
    type Wire = ();
    type Target = ();

    #[inline]
    unsafe fn convert(_: ()) {}

    #[inline]
    fn null() {}
}

impl AsArg for () {
    #[inline]
    fn as_arg(&self) {}
}

/// `bool` crosses as a 4-byte Win32 `BOOL`
impl TypeOf for bool {
    const MARSHAL_AS: UnmanagedType = UnmanagedType::Bool;

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("System.Boolean")
    }
}

impl Outbound for bool {
    type Arg<'a> = bool;
    type Staged = i32;
    type Wire = i32;

    #[inline]
    fn stage(arg: bool) -> i32 {
        arg as i32
    }

    #[inline]
    fn wire(staged: &i32) -> i32 {
        *staged
    }

    #[inline]
    fn null_wire() -> i32 {
        0
    }
}

impl Inbound for bool {
    type Wire = i32;
    type Target = bool;

    #[inline]
    unsafe fn convert(wire: i32) -> bool {
        wire != 0
    }

    #[inline]
    fn null() -> bool {
        false
    }
}

impl AsArg for bool {
    #[inline]
    fn as_arg(&self) -> bool {
        *self
    }
}

macro_rules! raw_pointer {
    ($($ptr:ty => $null:path;)*) => {$(
        impl<T> TypeOf for $ptr {
            const MARSHAL_AS: UnmanagedType = UnmanagedType::SysInt;

            fn type_name() -> Cow<'static, str> {
                Cow::Borrowed("System.IntPtr")
            }
        }

        impl<T> Outbound for $ptr {
            type Arg<'a> = $ptr;
            type Staged = $ptr;
            type Wire = $ptr;

            #[inline]
            fn stage(arg: $ptr) -> $ptr {
                arg
            }

            #[inline]
            fn wire(staged: &$ptr) -> $ptr {
                *staged
            }

            #[inline]
            fn null_wire() -> $ptr {
                $null()
            }
        }

        impl<T> Inbound for $ptr {
            type Wire = $ptr;
            type Target = $ptr;

            #[inline]
            unsafe fn convert(wire: $ptr) -> $ptr {
                wire
            }

            #[inline]
            fn null() -> $ptr {
                $null()
            }
        }

        impl<T> AsArg for $ptr {
            #[inline]
            fn as_arg(&self) -> $ptr {
                *self
            }
        }
    )*};
}

raw_pointer! {
    *mut T => std::ptr::null_mut;
    *const T => std::ptr::null;
}
