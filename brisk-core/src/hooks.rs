//! User conversion hooks.
//!
//! A type can take over its own JSON conversion by implementing
//! [`JsonMarshaler`]/[`JsonUnmarshaler`], or its text form with
//! [`TextMarshaler`]/[`TextUnmarshaler`]. Hooks are wired into the type's
//! [`Shape`](crate::Shape) vtable — by the derive macro when the container
//! carries the matching `#[json(...)]` attribute, or directly in a
//! hand-written `Shaped` impl.

/// Error type produced by user hooks. The codec wraps marshal-side hook
/// failures in its `MarshalerError`, preserving the source chain.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Produces the value's JSON encoding. The returned bytes are compacted
/// (and HTML-escaped when the call is HTML-safe) before emission.
pub trait JsonMarshaler {
    fn marshal_json(&self) -> Result<Vec<u8>, BoxError>;
}

/// Consumes the exact byte extent of one JSON value.
pub trait JsonUnmarshaler {
    fn unmarshal_json(&mut self, data: &[u8]) -> Result<(), BoxError>;
}

/// Produces the value's text form, encoded as a JSON string.
pub trait TextMarshaler {
    fn marshal_text(&self) -> Result<String, BoxError>;
}

/// Consumes the unescaped contents of a JSON string.
pub trait TextUnmarshaler {
    fn unmarshal_text(&mut self, text: &str) -> Result<(), BoxError>;
}

/// Adapts a [`JsonMarshaler`] impl to a vtable entry.
///
/// # Safety
/// `ptr` must point at a valid `T`.
pub unsafe fn marshal_json_raw<T: JsonMarshaler>(ptr: *const u8) -> Result<Vec<u8>, BoxError> {
    (*(ptr as *const T)).marshal_json()
}

/// Adapts a [`JsonUnmarshaler`] impl to a vtable entry.
///
/// # Safety
/// `ptr` must point at a valid `T`.
pub unsafe fn unmarshal_json_raw<T: JsonUnmarshaler>(
    ptr: *mut u8,
    data: &[u8],
) -> Result<(), BoxError> {
    (*(ptr as *mut T)).unmarshal_json(data)
}

/// Adapts a [`TextMarshaler`] impl to a vtable entry.
///
/// # Safety
/// `ptr` must point at a valid `T`.
pub unsafe fn marshal_text_raw<T: TextMarshaler>(ptr: *const u8) -> Result<String, BoxError> {
    (*(ptr as *const T)).marshal_text()
}

/// Adapts a [`TextUnmarshaler`] impl to a vtable entry.
///
/// # Safety
/// `ptr` must point at a valid `T`.
pub unsafe fn unmarshal_text_raw<T: TextUnmarshaler>(
    ptr: *mut u8,
    text: &str,
) -> Result<(), BoxError> {
    (*(ptr as *mut T)).unmarshal_text(text)
}
