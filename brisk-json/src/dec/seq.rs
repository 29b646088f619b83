//! Array, slice and byte-slice decoding.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use brisk_core::{ArrayDef, ListDef};

use crate::cache::CodecCell;
use crate::dec::{decode_into, type_mismatch};
use crate::error::{syntax, Error};
use crate::reader::DecSession;

/// Fixed-length array: surplus JSON elements are parsed and discarded,
/// missing slots are reset to their defaults.
pub(super) fn decode_array(
    def: &ArrayDef,
    elem: &Arc<CodecCell>,
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<(), Error> {
    if head == b'n' {
        return sess.expect_null();
    }
    if head != b'[' {
        return Err(type_mismatch(head, type_name, sess));
    }

    let mut idx = 0usize;
    let filled = loop {
        let head = sess.read_byte()?;
        if head == b']' && idx == 0 {
            break 0;
        }
        if idx < def.len {
            decode_into(elem, head, unsafe { ptr.add(idx * def.stride) }, sess)?;
        } else {
            sess.skip(head)?;
        }
        idx += 1;

        let head = sess.read_byte()?;
        if head == b']' {
            break idx;
        }
        if head != b',' {
            return Err(syntax(
                format!("expected a comma or a closing ], got: {:?}", head as char),
                sess.input_offset(),
            ));
        }
    };

    for slot in filled..def.len {
        unsafe { (def.reset_elem)(ptr.add(slot * def.stride)) };
    }
    Ok(())
}

/// Growable slice: cleared, then filled element by element with capacity
/// doubling underneath.
pub(super) fn decode_list(
    def: &ListDef,
    elem: &Arc<CodecCell>,
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<(), Error> {
    if head == b'n' {
        return sess.expect_null();
    }
    if head != b'[' {
        return Err(type_mismatch(head, type_name, sess));
    }

    unsafe { (def.clear)(ptr) };
    let mut first = true;
    loop {
        let head = sess.read_byte()?;
        if head == b']' && first {
            return Ok(());
        }
        let slot = unsafe { (def.push_default)(ptr) };
        decode_into(elem, head, slot, sess)?;
        first = false;

        let head = sess.read_byte()?;
        if head == b']' {
            return Ok(());
        }
        if head != b',' {
            return Err(syntax(
                format!("expected a comma or a closing ], got: {:?}", head as char),
                sess.input_offset(),
            ));
        }
    }
}

/// Byte slices accept standard base64 strings, or fall back to the
/// element-wise array form.
pub(super) fn decode_bytes(
    def: &ListDef,
    elem: &Arc<CodecCell>,
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<(), Error> {
    match head {
        b'n' => sess.expect_null(),
        b'"' => {
            let offset = sess.input_offset();
            let encoded = sess.read_string()?;
            let decoded = BASE64
                .decode(encoded)
                .map_err(|err| syntax(format!("invalid base64 string: {err}"), offset))?;
            unsafe { *(ptr as *mut Vec<u8>) = decoded };
            Ok(())
        }
        b'[' => decode_list(def, elem, head, ptr, sess, type_name),
        _ => Err(type_mismatch(head, type_name, sess)),
    }
}
