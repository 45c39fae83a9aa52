//! Interop type codes
//!
//! Values match `System.Runtime.InteropServices.UnmanagedType`, plus `Void` and
//! `ObjectRef` which the glue component uses for "no value" and GC handles.

/// Marshaling kind of a parameter or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum UnmanagedType {
    ObjectRef = -1,
    Void = 0,
    Bool = 2,
    I1 = 3,
    U1 = 4,
    I2 = 5,
    U2 = 6,
    I4 = 7,
    U4 = 8,
    I8 = 9,
    U8 = 10,
    R4 = 11,
    R8 = 12,
    Currency = 15,
    BStr = 19,
    LPStr = 20,
    LPWStr = 21,
    LPTStr = 22,
    ByValTStr = 23,
    IUnknown = 25,
    IDispatch = 26,
    Struct = 27,
    Interface = 28,
    SafeArray = 29,
    ByValArray = 30,
    SysInt = 31,
    SysUInt = 32,
    VBByRefStr = 34,
    AnsiBStr = 35,
    TBStr = 36,
    VariantBool = 37,
    FunctionPtr = 38,
    AsAny = 40,
    LPArray = 42,
    LPStruct = 43,
    CustomMarshaler = 44,
    Error = 45,
    IInspectable = 46,
    HString = 47,
    LPUTF8Str = 48,
}

impl UnmanagedType {
    const ALL: [Self; 40] = [
        Self::ObjectRef,
        Self::Void,
        Self::Bool,
        Self::I1,
        Self::U1,
        Self::I2,
        Self::U2,
        Self::I4,
        Self::U4,
        Self::I8,
        Self::U8,
        Self::R4,
        Self::R8,
        Self::Currency,
        Self::BStr,
        Self::LPStr,
        Self::LPWStr,
        Self::LPTStr,
        Self::ByValTStr,
        Self::IUnknown,
        Self::IDispatch,
        Self::Struct,
        Self::Interface,
        Self::SafeArray,
        Self::ByValArray,
        Self::SysInt,
        Self::SysUInt,
        Self::VBByRefStr,
        Self::AnsiBStr,
        Self::TBStr,
        Self::VariantBool,
        Self::FunctionPtr,
        Self::AsAny,
        Self::LPArray,
        Self::LPStruct,
        Self::CustomMarshaler,
        Self::Error,
        Self::IInspectable,
        Self::HString,
        Self::LPUTF8Str,
    ];

    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    /// Decode the 16-bit field of a packed parameter word
    #[inline]
    pub fn from_bits(bits: u16) -> Option<Self> {
        Self::from_code(bits as i16 as i32)
    }

    /// Encode into the 16-bit field of a packed parameter word
    #[inline]
    pub const fn bits(self) -> u16 {
        self.code() as u16
    }

    /// Text encodings
    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(
            self,
            Self::BStr
                | Self::LPStr
                | Self::LPWStr
                | Self::LPTStr
                | Self::ByValTStr
                | Self::AnsiBStr
                | Self::TBStr
                | Self::LPUTF8Str
                | Self::HString
        )
    }

    /// Values that cross the boundary as a pointer-sized word
    #[inline]
    pub const fn is_pointer_sized(self) -> bool {
        matches!(
            self,
            Self::ObjectRef | Self::SysInt | Self::SysUInt | Self::FunctionPtr | Self::LPArray
        ) || self.is_string()
    }
}
