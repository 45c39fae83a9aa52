//! Text marshaling
//!
//! Outbound text is staged as a nul-terminated UTF-16 buffer that lives for the
//! duration of the call. Inbound text is copied; the wire buffer stays owned by
//! the hosted side.

use std::borrow::Cow;

use super::{AsArg, Inbound, Outbound, TypeOf, UnmanagedType};

/// Nul-terminated UTF-16 buffer
///
/// The hosted side reads these as `LPWStr`, which ends at the first nul. Text
/// with an interior `\0` is truncated there when staged, so the buffer always
/// holds exactly what the runtime will see.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WideString(Vec<u16>);

impl WideString {
    pub fn new(s: &str) -> Self {
        let text = match s.find('\0') {
            Some(offset) => {
                crate::logging::log_interior_nul(offset);
                &s[..offset]
            }
            None => s,
        };
        Self(text.encode_utf16().chain(Some(0)).collect())
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u16 {
        self.0.as_ptr()
    }

    /// Code units without the terminator
    pub fn as_units(&self) -> &[u16] {
        &self.0[..self.0.len() - 1]
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_units())
    }
}

impl From<&str> for WideString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Copy a nul-terminated UTF-16 string; null reads as empty
///
/// # Safety
/// `ptr` must be null or point to a nul-terminated UTF-16 string.
pub unsafe fn read_wide(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
}

impl TypeOf for String {
    const MARSHAL_AS: UnmanagedType = UnmanagedType::LPWStr;

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("System.String")
    }
}

/// Staged as a [`WideString`]; an interior `\0` ends the text early.
impl Outbound for String {
    type Arg<'a> = &'a str;
    type Staged = WideString;
    type Wire = *const u16;

    #[inline]
    fn stage(arg: &str) -> WideString {
        WideString::new(arg)
    }

    #[inline]
    fn wire(staged: &WideString) -> *const u16 {
        staged.as_ptr()
    }

    #[inline]
    fn null_wire() -> *const u16 {
        std::ptr::null()
    }
}

impl Inbound for String {
    type Wire = *const u16;
    type Target = String;

    unsafe fn convert(wire: *const u16) -> String {
        read_wide(wire)
    }

    #[inline]
    fn null() -> String {
        String::new()
    }
}

impl AsArg for String {
    #[inline]
    fn as_arg(&self) -> &str {
        self
    }
}
