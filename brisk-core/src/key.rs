//! Map key protocol.
//!
//! JSON object keys are strings; a Rust map can participate when its key
//! type knows how to parse itself from the unescaped key text and format
//! itself back. String and integer keys are built in; a type with text
//! hooks implements [`MapKey`] by delegating to them.

use std::io::Write as _;

use crate::hooks::BoxError;
use crate::shape::KeyError;

pub trait MapKey: Sized {
    /// Integral key domains sort numerically in encode output.
    const NUMERIC: bool = false;

    /// Parse the unescaped JSON key text.
    fn parse_key(raw: &[u8]) -> Result<Self, KeyError>;

    /// Append the key's unescaped text form.
    fn write_key(&self, out: &mut Vec<u8>) -> Result<(), BoxError>;
}

impl MapKey for String {
    fn parse_key(raw: &[u8]) -> Result<Self, KeyError> {
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    fn write_key(&self, out: &mut Vec<u8>) -> Result<(), BoxError> {
        out.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

macro_rules! int_map_key {
    ($($ty:ty)*) => {$(
        impl MapKey for $ty {
            const NUMERIC: bool = true;

            fn parse_key(raw: &[u8]) -> Result<Self, KeyError> {
                let text = core::str::from_utf8(raw).map_err(|_| KeyError::Invalid)?;
                text.parse::<$ty>().map_err(|err| {
                    use core::num::IntErrorKind::*;
                    match err.kind() {
                        PosOverflow | NegOverflow => KeyError::OutOfRange,
                        _ => KeyError::Invalid,
                    }
                })
            }

            fn write_key(&self, out: &mut Vec<u8>) -> Result<(), BoxError> {
                write!(out, "{}", self)?;
                Ok(())
            }
        }
    )*};
}

int_map_key!(i8 i16 i32 i64 isize u8 u16 u32 u64 usize);
