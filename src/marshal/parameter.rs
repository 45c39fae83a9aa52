//! Parameter descriptors and their wire format
//!
//! Layout of the packed 64-bit word:
//! - bits [0, 16): unmanaged type code
//! - bits [16, 32): flags (in, out, array, fixed length, weak reference)
//! - bits [32, 64): array length
//!
//! The type name travels out of band as a UTF-16 pointer next to the word.

use std::borrow::Cow;

use smallvec::SmallVec;

use super::string::WideString;
use super::unmanaged::UnmanagedType;

/// Type name of the glue component's custom string marshaler
pub const STRING_MARSHALER: &str = "Qt.DotNet.StringMarshaler, Qt.DotNet.Adapter, CleanUp=false";

/// Direction and shape flags of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParamFlags {
    pub is_in: bool,
    pub is_out: bool,
    pub is_array: bool,
    pub is_fixed_length: bool,
    pub is_weak_ref: bool,
}

impl ParamFlags {
    const IN: u16 = 1 << 0;
    const OUT: u16 = 1 << 1;
    const ARRAY: u16 = 1 << 2;
    const FIXED_LENGTH: u16 = 1 << 3;
    const WEAK_REF: u16 = 1 << 4;

    pub const fn bits(self) -> u16 {
        (self.is_in as u16) * Self::IN
            | (self.is_out as u16) * Self::OUT
            | (self.is_array as u16) * Self::ARRAY
            | (self.is_fixed_length as u16) * Self::FIXED_LENGTH
            | (self.is_weak_ref as u16) * Self::WEAK_REF
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self {
            is_in: bits & Self::IN != 0,
            is_out: bits & Self::OUT != 0,
            is_array: bits & Self::ARRAY != 0,
            is_fixed_length: bits & Self::FIXED_LENGTH != 0,
            is_weak_ref: bits & Self::WEAK_REF != 0,
        }
    }
}

/// Packed parameter word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParamInfo(u64);

impl ParamInfo {
    const TYPE_SHIFT: u32 = 0;
    const FLAGS_SHIFT: u32 = 16;
    const LENGTH_SHIFT: u32 = 32;

    pub fn new(marshal_as: UnmanagedType, flags: ParamFlags, array_length: u32) -> Self {
        Self(
            (marshal_as.bits() as u64) << Self::TYPE_SHIFT
                | (flags.bits() as u64) << Self::FLAGS_SHIFT
                | (array_length as u64) << Self::LENGTH_SHIFT,
        )
    }

    #[inline]
    pub const fn from_raw(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn type_bits(self) -> u16 {
        (self.0 >> Self::TYPE_SHIFT) as u16
    }

    /// `None` for codes outside the known set
    pub fn marshal_as(self) -> Option<UnmanagedType> {
        UnmanagedType::from_bits(self.type_bits())
    }

    #[inline]
    pub fn flags(self) -> ParamFlags {
        ParamFlags::from_bits((self.0 >> Self::FLAGS_SHIFT) as u16)
    }

    #[inline]
    pub fn array_length(self) -> u32 {
        (self.0 >> Self::LENGTH_SHIFT) as u32
    }

    fn with_flags(self, f: impl FnOnce(&mut ParamFlags)) -> Self {
        let mut flags = self.flags();
        f(&mut flags);
        Self((self.0 & !(0xffff << Self::FLAGS_SHIFT)) | (flags.bits() as u64) << Self::FLAGS_SHIFT)
    }

    fn with_length(self, length: u32) -> Self {
        Self((self.0 & 0xffff_ffff) | (length as u64) << Self::LENGTH_SHIFT)
    }
}

/// Wire record read by the glue component
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ParameterWire {
    pub type_name: *const u16,
    pub param_info: u64,
}

/// Description of one argument or return value used to select overloads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    type_name: Option<WideString>,
    info: ParamInfo,
}

/// Parameter lists; return descriptor first
pub type Parameters = SmallVec<[Parameter; 8]>;

impl Parameter {
    /// Named type marshaled as `marshal_as`
    pub fn new<'a>(type_name: impl Into<Cow<'a, str>>, marshal_as: UnmanagedType) -> Self {
        let type_name = type_name.into();
        Self {
            type_name: (!type_name.is_empty()).then(|| WideString::new(&type_name)),
            info: ParamInfo::new(marshal_as, ParamFlags::default(), 0),
        }
    }

    /// Unnamed parameter; the glue infers the type from `marshal_as`
    pub fn unnamed(marshal_as: UnmanagedType) -> Self {
        Self {
            type_name: None,
            info: ParamInfo::new(marshal_as, ParamFlags::default(), 0),
        }
    }

    pub fn void() -> Self {
        Self::new("System.Void", UnmanagedType::Void)
    }

    /// Object reference of the named type
    pub fn object_ref<'a>(type_name: impl Into<Cow<'a, str>>) -> Self {
        Self::new(type_name, UnmanagedType::ObjectRef)
    }

    /// Weak object reference of the named type
    pub fn object_weak_ref<'a>(type_name: impl Into<Cow<'a, str>>) -> Self {
        Self::object_ref(type_name).weak_ref()
    }

    /// String handled by the glue component's custom marshaler
    pub fn string_marshaler() -> Self {
        Self::new(STRING_MARSHALER, UnmanagedType::CustomMarshaler)
    }

    pub fn input(mut self) -> Self {
        self.info = self.info.with_flags(|f| f.is_in = true);
        self
    }

    pub fn output(mut self) -> Self {
        self.info = self.info.with_flags(|f| f.is_out = true);
        self
    }

    pub fn array(mut self, length: u32) -> Self {
        self.info = self.info.with_flags(|f| f.is_array = true).with_length(length);
        self
    }

    pub fn fixed_length(mut self) -> Self {
        self.info = self.info.with_flags(|f| f.is_fixed_length = true);
        self
    }

    pub fn weak_ref(mut self) -> Self {
        self.info = self.info.with_flags(|f| f.is_weak_ref = true);
        self
    }

    pub fn type_name(&self) -> Option<String> {
        self.type_name.as_ref().map(WideString::to_string_lossy)
    }

    #[inline]
    pub fn info(&self) -> ParamInfo {
        self.info
    }

    pub fn marshal_as(&self) -> Option<UnmanagedType> {
        self.info.marshal_as()
    }

    /// Wire record borrowing this parameter's type name buffer
    pub fn to_wire(&self) -> ParameterWire {
        ParameterWire {
            type_name: self
                .type_name
                .as_ref()
                .map_or(std::ptr::null(), WideString::as_ptr),
            param_info: self.info.raw(),
        }
    }
}

impl ParameterWire {
    pub fn info(&self) -> ParamInfo {
        ParamInfo::from_raw(self.param_info)
    }

    /// Type name carried by the record
    ///
    /// # Safety
    /// `type_name` must be null or a nul-terminated UTF-16 string.
    pub unsafe fn type_name(&self) -> Option<String> {
        if self.type_name.is_null() {
            None
        } else {
            Some(super::string::read_wide(self.type_name))
        }
    }
}
