//! The error taxonomy. Variant shapes and `Display` wording follow the
//! long-standing contract of the standard JSON package this codec tracks:
//! parse errors carry stream-absolute byte offsets, type mismatches carry
//! the destination type and, inside structs, the dotted field path.

use brisk_core::BoxError;
use thiserror::Error;

/// A description of a JSON syntax error.
#[derive(Debug, Error)]
#[error("{msg}")]
pub struct SyntaxError {
    pub(crate) msg: String,
    /// Error occurred after reading this many bytes.
    pub offset: u64,
}

impl SyntaxError {
    pub(crate) fn new(msg: impl Into<String>, offset: u64) -> Self {
        SyntaxError {
            msg: msg.into(),
            offset,
        }
    }
}

/// A JSON value that was not appropriate for a value of a specific Rust
/// type.
#[derive(Debug, Error)]
pub struct UnmarshalTypeError {
    /// Description of the JSON value — "bool", "number 1e400", …
    pub value: String,
    /// Name of the destination type.
    pub type_name: &'static str,
    /// Error occurred after reading this many bytes.
    pub offset: u64,
    /// Name of the struct type containing the field, when inside one.
    pub struct_name: &'static str,
    /// Dotted path from the root struct to the field.
    pub field: String,
}

impl core::fmt::Display for UnmarshalTypeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if !self.struct_name.is_empty() || !self.field.is_empty() {
            write!(
                f,
                "brisk: cannot unmarshal {} into struct field {}.{} of type {}",
                self.value, self.struct_name, self.field, self.type_name
            )
        } else {
            write!(
                f,
                "brisk: cannot unmarshal {} into value of type {}",
                self.value, self.type_name
            )
        }
    }
}

impl UnmarshalTypeError {
    pub(crate) fn new(value: impl Into<String>, type_name: &'static str, offset: u64) -> Self {
        UnmarshalTypeError {
            value: value.into(),
            type_name,
            offset,
            struct_name: "",
            field: String::new(),
        }
    }
}

/// The decode destination's type cannot be decoded into at all.
#[derive(Debug, Error)]
#[error("brisk: cannot unmarshal into value of type {type_name}")]
pub struct InvalidUnmarshalError {
    pub type_name: &'static str,
}

/// Returned when attempting to encode an unsupported type.
#[derive(Debug, Error)]
#[error("brisk: unsupported type: {type_name}")]
pub struct UnsupportedTypeError {
    pub type_name: &'static str,
}

/// Returned when attempting to encode an unsupported value, such as a
/// non-finite float or a cyclic structure.
#[derive(Debug, Error)]
#[error("brisk: unsupported value: {value}")]
pub struct UnsupportedValueError {
    pub value: String,
}

/// An error from calling a user `marshal_json` or `marshal_text` hook.
#[derive(Debug, Error)]
#[error("brisk: error calling {source_fn} for type {type_name}: {source}")]
pub struct MarshalerError {
    pub type_name: &'static str,
    pub source_fn: &'static str,
    #[source]
    pub source: BoxError,
}

/// Any error this crate produces.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    UnmarshalType(#[from] UnmarshalTypeError),
    #[error(transparent)]
    InvalidUnmarshal(#[from] InvalidUnmarshalError),
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedTypeError),
    #[error(transparent)]
    UnsupportedValue(#[from] UnsupportedValueError),
    #[error(transparent)]
    Marshaler(#[from] MarshalerError),
    /// A user `unmarshal_json`/`unmarshal_text` hook failed.
    #[error("{0}")]
    Unmarshaler(#[source] BoxError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub(crate) fn syntax(msg: impl Into<String>, offset: u64) -> Error {
    Error::Syntax(SyntaxError::new(msg, offset))
}

/// Short description of the JSON value a head byte begins, for
/// `UnmarshalTypeError::value`.
pub(crate) fn head_desc(head: u8) -> String {
    match head {
        b't' | b'f' => "bool".to_owned(),
        b'n' => "null".to_owned(),
        b'"' => "string".to_owned(),
        b'[' => "array".to_owned(),
        b'{' => "object".to_owned(),
        b'0'..=b'9' | b'-' => "number".to_owned(),
        other => format!("{:?} (head)", other as char),
    }
}
