//! Array, slice and byte-slice emission.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use brisk_core::{ArrayDef, ListDef};

use crate::cache::CodecCell;
use crate::enc::{encode_from, EncSession};
use crate::error::Error;

pub(super) fn encode_array(
    def: &ArrayDef,
    elem: &Arc<CodecCell>,
    ptr: *const u8,
    out: &mut Vec<u8>,
    sess: &mut EncSession,
) -> Result<(), Error> {
    out.push(b'[');
    for idx in 0..def.len {
        if idx > 0 {
            out.push(b',');
        }
        encode_from(elem, unsafe { ptr.add(idx * def.stride) }, out, sess)?;
    }
    out.push(b']');
    Ok(())
}

pub(super) fn encode_list(
    def: &ListDef,
    elem: &Arc<CodecCell>,
    ptr: *const u8,
    out: &mut Vec<u8>,
    sess: &mut EncSession,
) -> Result<(), Error> {
    let len = unsafe { (def.len)(ptr) };
    let base = unsafe { (def.as_ptr)(ptr) };
    let key = (base as usize, len, unsafe { (def.capacity)(ptr) });
    let recorded = sess.enter(key)?;

    let mut emit = || -> Result<(), Error> {
        out.push(b'[');
        for idx in 0..len {
            if idx > 0 {
                out.push(b',');
            }
            encode_from(elem, unsafe { base.add(idx * def.stride) }, out, sess)?;
        }
        out.push(b']');
        Ok(())
    };
    let result = emit();
    sess.leave(key, recorded);
    result
}

/// Byte slices travel as standard base64 strings.
pub(super) fn encode_bytes(ptr: *const u8, out: &mut Vec<u8>) -> Result<(), Error> {
    let bytes = unsafe { &*(ptr as *const Vec<u8>) };
    out.push(b'"');
    out.extend_from_slice(BASE64.encode(bytes).as_bytes());
    out.push(b'"');
    Ok(())
}
