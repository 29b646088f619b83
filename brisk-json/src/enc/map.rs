//! Map emission with deterministic key order.
//!
//! All entries are snapshotted as (formatted key, value pointer) pairs,
//! sorted — numerically for integral key domains, bytewise otherwise —
//! and emitted with stable comma placement.

use std::sync::Arc;

use brisk_core::MapDef;

use crate::cache::CodecCell;
use crate::enc::{encode_from, string::append_string, EncSession};
use crate::error::{Error, MarshalerError};

pub(super) fn encode_map(
    def: &MapDef,
    value: &Arc<CodecCell>,
    ptr: *const u8,
    out: &mut Vec<u8>,
    sess: &mut EncSession,
) -> Result<(), Error> {
    let key = (ptr as usize, usize::MAX, 0);
    let recorded = sess.enter(key)?;
    let result = encode_entries(def, value, ptr, out, sess);
    sess.leave(key, recorded);
    result
}

fn encode_entries(
    def: &MapDef,
    value: &Arc<CodecCell>,
    ptr: *const u8,
    out: &mut Vec<u8>,
    sess: &mut EncSession,
) -> Result<(), Error> {
    let len = unsafe { (def.len)(ptr) };
    let mut entries: Vec<(Vec<u8>, *const u8)> = Vec::with_capacity(len);
    let mut key_err: Option<brisk_core::BoxError> = None;

    unsafe {
        (def.iter)(ptr, &mut |key_ptr, val_ptr| {
            if key_err.is_some() {
                return;
            }
            let mut formatted = Vec::new();
            match (def.write_key)(key_ptr, &mut formatted) {
                Ok(()) => entries.push((formatted, val_ptr)),
                Err(err) => key_err = Some(err),
            }
        });
    }
    if let Some(err) = key_err {
        return Err(MarshalerError {
            type_name: def.key.get().name,
            source_fn: "marshal_text",
            source: err,
        }
        .into());
    }

    if def.numeric_keys {
        // Signed ordering groups negatives first; every integral key
        // formats as a decimal that fits in i128.
        entries.sort_by_key(|(key, _)| parse_decimal(key));
    } else {
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    }

    out.push(b'{');
    for (idx, (key, val_ptr)) in entries.iter().enumerate() {
        if idx > 0 {
            out.push(b',');
        }
        append_string(out, &String::from_utf8_lossy(key), sess.html);
        out.push(b':');
        encode_from(value, *val_ptr, out, sess)?;
    }
    out.push(b'}');
    Ok(())
}

fn parse_decimal(key: &[u8]) -> i128 {
    let mut value = 0i128;
    let neg = key.first() == Some(&b'-');
    for &byte in if neg { &key[1..] } else { key } {
        if byte.is_ascii_digit() {
            value = value * 10 + (byte - b'0') as i128;
        }
    }
    if neg {
        -value
    } else {
        value
    }
}
