//! Platform strings for the hosting API
//!
//! hostfxr's `char_t` is UTF-16 on Windows and narrow (UTF-8) elsewhere.

use std::path::Path;

use crate::error::HostError;

#[cfg(windows)]
pub type PdChar = u16;
#[cfg(not(windows))]
pub type PdChar = std::os::raw::c_char;

/// Owned, nul-terminated platform string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdString(Vec<PdChar>);

impl PdString {
    /// Encode `s`, rejecting interior nuls
    pub fn new(s: &str) -> Result<Self, HostError> {
        if s.contains('\0') {
            return Err(HostError::InvalidString(s.to_string()));
        }
        Ok(Self(encode(s)))
    }

    pub fn from_path(path: &Path) -> Result<Self, HostError> {
        Self::new(&path.to_string_lossy())
    }

    #[inline]
    pub fn as_ptr(&self) -> *const PdChar {
        self.0.as_ptr()
    }
}

#[cfg(windows)]
fn encode(s: &str) -> Vec<PdChar> {
    s.encode_utf16().chain(Some(0)).collect()
}

#[cfg(not(windows))]
fn encode(s: &str) -> Vec<PdChar> {
    s.bytes().map(|b| b as PdChar).chain(Some(0)).collect()
}

/// Copy a nul-terminated platform string into an owned `String`
///
/// # Safety
/// `ptr` must be null or point to a nul-terminated platform string.
pub unsafe fn to_string(ptr: *const PdChar) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    let units = std::slice::from_raw_parts(ptr, len);
    decode(units)
}

#[cfg(windows)]
fn decode(units: &[PdChar]) -> String {
    String::from_utf16_lossy(units)
}

#[cfg(not(windows))]
fn decode(units: &[PdChar]) -> String {
    let bytes: Vec<u8> = units.iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
