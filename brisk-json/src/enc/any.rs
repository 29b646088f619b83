//! Dynamic value emission. Objects emit in sorted key order regardless of
//! the tree's insertion order, matching every other mapping.

use crate::enc::{number, string::append_string, EncSession};
use crate::error::{Error, UnsupportedValueError};
use crate::value::{is_valid_number, Value};

pub(crate) fn encode_value(
    value: &Value,
    out: &mut Vec<u8>,
    sess: &mut EncSession,
) -> Result<(), Error> {
    match value {
        Value::Null => {
            out.extend_from_slice(b"null");
            Ok(())
        }
        Value::Bool(true) => {
            out.extend_from_slice(b"true");
            Ok(())
        }
        Value::Bool(false) => {
            out.extend_from_slice(b"false");
            Ok(())
        }
        Value::Float(number) => number::append_f64(out, *number),
        Value::Number(literal) => {
            if !is_valid_number(literal.0.as_bytes()) {
                return Err(UnsupportedValueError {
                    value: format!("invalid number literal {:?}", literal.0),
                }
                .into());
            }
            out.extend_from_slice(literal.0.as_bytes());
            Ok(())
        }
        Value::String(text) => {
            append_string(out, text, sess.html);
            Ok(())
        }
        Value::Array(items) => {
            let key = (items.as_ptr() as usize, items.len(), items.capacity());
            let recorded = sess.enter(key)?;
            let result = (|| {
                out.push(b'[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(b',');
                    }
                    encode_value(item, out, sess)?;
                }
                out.push(b']');
                Ok(())
            })();
            sess.leave(key, recorded);
            result
        }
        Value::Object(members) => {
            let key = (members as *const _ as usize, usize::MAX, 0);
            let recorded = sess.enter(key)?;
            let result = (|| {
                let mut ordered: Vec<(&String, &Value)> = members.iter().collect();
                ordered.sort_by(|(a, _), (b, _)| a.cmp(b));
                out.push(b'{');
                for (idx, (name, member)) in ordered.into_iter().enumerate() {
                    if idx > 0 {
                        out.push(b',');
                    }
                    append_string(out, name, sess.html);
                    out.push(b':');
                    encode_value(member, out, sess)?;
                }
                out.push(b'}');
                Ok(())
            })();
            sess.leave(key, recorded);
            result
        }
    }
}
