//! The dynamic value tree and the opaque decimal literal.

use core::any::TypeId;
use core::mem::{align_of, size_of};

use brisk_core::{default_in_place_of, Kind, Shape, Shaped, VTable};
use indexmap::IndexMap;

use crate::error::{Error, UnsupportedValueError};
use crate::float;

/// An opaque decimal literal, kept as written on the wire.
///
/// `Number` decodes from any JSON number without rounding and converts on
/// demand. The default value is the empty literal, which cannot be
/// encoded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Number(pub(crate) String);

impl Number {
    /// Wrap a literal, validating it against the number grammar.
    pub fn new(literal: impl Into<String>) -> Option<Number> {
        let literal = literal.into();
        is_valid_number(literal.as_bytes()).then_some(Number(literal))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_f64(&self) -> Result<f64, Error> {
        if !is_valid_number(self.0.as_bytes()) {
            return Err(invalid_literal(&self.0));
        }
        let parsed = float::parse_f64(self.0.as_bytes());
        if parsed.is_infinite() {
            return Err(invalid_literal(&self.0));
        }
        Ok(parsed)
    }

    pub fn as_i64(&self) -> Result<i64, Error> {
        self.0.parse::<i64>().map_err(|_| invalid_literal(&self.0))
    }

    pub fn as_u64(&self) -> Result<u64, Error> {
        self.0.parse::<u64>().map_err(|_| invalid_literal(&self.0))
    }
}

impl core::fmt::Display for Number {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

fn invalid_literal(literal: &str) -> Error {
    UnsupportedValueError {
        value: format!("invalid number literal {:?}", literal),
    }
    .into()
}

/// A decoded JSON value.
///
/// Objects preserve insertion order, so a decode/encode round trip keeps
/// keys discoverable — though encoding always emits keys sorted.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    /// A number decoded to a double, the default.
    Float(f64),
    /// A number kept as its literal, under use-number mode.
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Member lookup on objects; `None` elsewhere.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(members) => members.get(key),
            _ => None,
        }
    }

    /// Index into arrays; `None` elsewhere.
    pub fn at(&self, idx: usize) -> Option<&Value> {
        match self {
            Value::Array(items) => items.get(idx),
            _ => None,
        }
    }
}

/// Validate a byte string against the RFC 8259 number grammar.
pub(crate) fn is_valid_number(mut src: &[u8]) -> bool {
    if src.first() == Some(&b'-') {
        src = &src[1..];
    }
    let mut idx = match src.first() {
        Some(b'0') => 1,
        Some(b'1'..=b'9') => src.iter().take_while(|byte| byte.is_ascii_digit()).count(),
        _ => return false,
    };
    if src.get(idx) == Some(&b'.') {
        idx += 1;
        let frac = src[idx..].iter().take_while(|byte| byte.is_ascii_digit()).count();
        if frac == 0 {
            return false;
        }
        idx += frac;
    }
    if matches!(src.get(idx), Some(b'e') | Some(b'E')) {
        idx += 1;
        if matches!(src.get(idx), Some(b'+') | Some(b'-')) {
            idx += 1;
        }
        let exp = src[idx..].iter().take_while(|byte| byte.is_ascii_digit()).count();
        if exp == 0 {
            return false;
        }
        idx += exp;
    }
    idx == src.len()
}

unsafe fn value_is_empty(ptr: *const u8) -> bool {
    (*(ptr as *const Value)).is_null()
}

// The `Dynamic` and `Number` kinds are reserved for these exact types;
// the codec casts on that basis.
unsafe impl Shaped for Value {
    const SHAPE: &'static Shape = &Shape {
        name: "Value",
        size: size_of::<Value>(),
        align: align_of::<Value>(),
        type_id: TypeId::of::<Value>,
        kind: Kind::Dynamic,
        vtable: VTable::new(default_in_place_of::<Value>, value_is_empty),
    };
}

unsafe fn number_is_empty(ptr: *const u8) -> bool {
    (&(*(ptr as *const Number)).0).is_empty()
}

unsafe impl Shaped for Number {
    const SHAPE: &'static Shape = &Shape {
        name: "Number",
        size: size_of::<Number>(),
        align: align_of::<Number>(),
        type_id: TypeId::of::<Number>,
        kind: Kind::Number,
        vtable: VTable::new(default_in_place_of::<Number>, number_is_empty),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_grammar() {
        for ok in ["0", "-0", "1", "12.75", "2e10", "2E+3", "-0.1e-2"] {
            assert!(is_valid_number(ok.as_bytes()), "{}", ok);
        }
        for bad in ["", "-", "01", "1.", ".5", "1e", "1e+", "+1", "0x1", "1 "] {
            assert!(!is_valid_number(bad.as_bytes()), "{}", bad);
        }
    }

    #[test]
    fn number_conversions() {
        let num = Number::new("-42").unwrap();
        assert_eq!(num.as_i64().unwrap(), -42);
        assert_eq!(num.as_f64().unwrap(), -42.0);
        assert!(num.as_u64().is_err());

        let pi = Number::new("3.125").unwrap();
        assert_eq!(pi.as_f64().unwrap(), 3.125);
        assert!(pi.as_i64().is_err());

        assert!(Number::new("bogus").is_none());
        assert!(Number("1e999".to_owned()).as_f64().is_err());
    }

    #[test]
    fn value_navigation() {
        let mut members = IndexMap::new();
        members.insert("items".to_owned(), Value::Array(vec![Value::Bool(true)]));
        let root = Value::Object(members);
        assert_eq!(root.get("items").and_then(|v| v.at(0)), Some(&Value::Bool(true)));
        assert_eq!(root.get("missing"), None);
        assert!(Value::default().is_null());
    }
}
