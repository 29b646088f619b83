//! A high-throughput JSON codec.
//!
//! Conversion between RFC 8259 text and statically-typed values goes
//! through type-compiled codecs: the first encounter with a type compiles
//! a specialized encoder/decoder from its [`Shape`](brisk_core::Shape)
//! and interns it in a sharded cache. Structs get a field plan with
//! perfect-hash key tables; byte scanning runs 8 bytes at a time with
//! SWAR predicates; scratch buffers come from a size-bucketed pool.
//!
//! The external contract tracks the long-established standard JSON
//! package semantics: field attributes (`rename`, `omitempty`, `string`,
//! `skip`, `embed`), case-insensitive key fallback with exact-match
//! priority, sorted map keys in output, HTML-safe escaping by default,
//! base64 byte slices, and the familiar error taxonomy.
//!
//! # Example
//!
//! ```
//! use brisk_json::Shaped;
//!
//! #[derive(Shaped, Default, Debug, PartialEq)]
//! struct Server {
//!     #[json(rename = "Name")]
//!     name: String,
//!     port: u16,
//!     #[json(omitempty)]
//!     tags: Vec<String>,
//! }
//!
//! let server: Server = brisk_json::from_str(r#"{"Name":"edge","port":443}"#).unwrap();
//! assert_eq!(server, Server { name: "edge".into(), port: 443, tags: vec![] });
//!
//! let encoded = brisk_json::to_string(&server).unwrap();
//! assert_eq!(encoded, r#"{"Name":"edge","port":443}"#);
//! ```

mod arith;
mod cache;
mod compact;
mod dec;
mod enc;
mod error;
mod float;
mod plan;
mod pool;
mod raw;
mod reader;
mod skip;
mod stream;
mod table;
mod value;

pub use brisk_core::{
    BoxError, JsonMarshaler, JsonUnmarshaler, MapKey, Shaped, TextMarshaler, TextUnmarshaler,
};
/// Derives a shape descriptor; see the crate-level docs for the
/// recognized `#[json(...)]` attributes.
pub use brisk_derive::Shaped;

pub use compact::{compact, html_escape, indent};
pub use error::{
    Error, InvalidUnmarshalError, MarshalerError, SyntaxError, UnmarshalTypeError,
    UnsupportedTypeError, UnsupportedValueError,
};
pub use raw::RawMessage;
pub use stream::{Decoder, Encoder, Token};
pub use value::{Number, Value};

use brisk_core::default_of;

use crate::cache::cell_for;
use crate::enc::EncSession;
use crate::error::syntax;
use crate::reader::{DecSession, ReaderBuf};

/// Encode `value` as JSON, HTML-safe.
///
/// For output destined elsewhere than HTML, use an [`Encoder`] with
/// [`Encoder::set_escape_html`] disabled.
pub fn to_vec<T: Shaped>(value: &T) -> Result<Vec<u8>, Error> {
    let cell = cell_for(T::SHAPE);
    let mut buf = pool::get(0);
    let mut sess = EncSession::new(true);
    let result = enc::encode_from(&cell, value as *const T as *const u8, &mut buf, &mut sess);
    let result = result.map(|()| buf.as_slice().to_vec());
    pool::put(buf);
    result
}

/// Like [`to_vec`], reflowed with [`indent`].
pub fn to_vec_indent<T: Shaped>(value: &T, prefix: &str, ind: &str) -> Result<Vec<u8>, Error> {
    let compacted = to_vec(value)?;
    let mut pretty = Vec::with_capacity(compacted.len() * 2);
    indent(&mut pretty, &compacted, prefix, ind)?;
    Ok(pretty)
}

/// [`to_vec`], as a `String`.
pub fn to_string<T: Shaped>(value: &T) -> Result<String, Error> {
    let bytes = to_vec(value)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        // The encoder only emits well-formed UTF-8; coerce defensively
        // rather than fail.
        Err(err) => Ok(String::from_utf8_lossy(err.as_bytes()).into_owned()),
    }
}

/// Decode one JSON value into a fresh `T`. Trailing non-space input is an
/// error.
pub fn from_slice<T: Shaped>(data: &[u8]) -> Result<T, Error> {
    let mut dest = default_of::<T>();
    from_slice_into(data, &mut dest)?;
    Ok(dest)
}

/// Decode one JSON value into an existing destination, merging into
/// present struct fields like the wire contract prescribes: absent keys
/// leave the destination untouched.
pub fn from_slice_into<T: Shaped>(data: &[u8], dest: &mut T) -> Result<(), Error> {
    let cell = cell_for(T::SHAPE);
    let mut rd = ReaderBuf::from_slice(data);
    let mut sess = DecSession::new(&mut rd, None);
    let head = sess.read_byte()?;
    dec::decode_into(&cell, head, dest as *mut T as *mut u8, &mut sess)?;
    if let Some(stray) = sess.peek()? {
        return Err(syntax(
            format!("invalid character {:?} after top-level value", stray as char),
            sess.input_offset(),
        ));
    }
    Ok(())
}

/// [`from_slice`] over a `&str`.
pub fn from_str<T: Shaped>(text: &str) -> Result<T, Error> {
    from_slice(text.as_bytes())
}

/// [`from_slice_into`] over a `&str`.
pub fn from_str_into<T: Shaped>(text: &str, dest: &mut T) -> Result<(), Error> {
    from_slice_into(text.as_bytes(), dest)
}

/// Whether `data` is a single well-formed JSON value — exactly the inputs
/// [`from_slice`] accepts into a [`Value`].
pub fn valid(data: &[u8]) -> bool {
    let mut rd = ReaderBuf::from_slice(data);
    let mut sess = DecSession::new(&mut rd, None);
    let Ok(head) = sess.read_byte() else {
        return false;
    };
    if dec::decode_value(head, &mut sess).is_err() {
        return false;
    }
    matches!(sess.peek(), Ok(None))
}
