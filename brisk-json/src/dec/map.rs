//! Map decoding: JSON string keys are converted through the map's key
//! parser, the value slot is acquired directly, and the element codec
//! writes in place.

use std::sync::Arc;

use brisk_core::{KeyError, MapDef};

use crate::cache::CodecCell;
use crate::dec::{decode_into, type_mismatch};
use crate::error::{syntax, Error, UnmarshalTypeError};
use crate::reader::DecSession;

pub(super) fn decode_map(
    def: &MapDef,
    value: &Arc<CodecCell>,
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<(), Error> {
    if head == b'n' {
        return sess.expect_null();
    }
    if head != b'{' {
        return Err(type_mismatch(head, type_name, sess));
    }

    let key_type = def.key.get().name;
    let mut first = true;
    loop {
        let head = sess.read_byte()?;
        if head == b'}' && first {
            return Ok(());
        }
        if head != b'"' {
            return Err(syntax(
                "expected a string for an object key",
                sess.offset_of_last(),
            ));
        }

        // The offset of the key literal, for key-conversion errors.
        let key_offset = sess.input_offset() - 1;
        let slot = {
            let key = sess.read_string()?;
            match unsafe { (def.insert_default)(ptr, key) } {
                Ok(slot) => slot,
                Err(kind) => {
                    let key = String::from_utf8_lossy(key).into_owned();
                    let value = match kind {
                        KeyError::OutOfRange => format!("number {key}"),
                        KeyError::Invalid => format!("object key {:?}", key),
                    };
                    return Err(UnmarshalTypeError::new(value, key_type, key_offset).into());
                }
            }
        };
        first = false;

        let head = sess.read_byte()?;
        if head != b':' {
            return Err(syntax(
                format!("expected a colon, got: {:?}", head as char),
                sess.offset_of_last(),
            ));
        }

        let head = sess.read_byte()?;
        decode_into(value, head, slot, sess)?;

        let head = sess.read_byte()?;
        if head == b'}' {
            return Ok(());
        }
        if head != b',' {
            return Err(syntax(
                format!("expected a comma or a closing }}, got: {:?}", head as char),
                sess.offset_of_last(),
            ));
        }
    }
}
