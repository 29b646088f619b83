//! Struct decoding: key resolution through the plan's perfect-hash
//! tables, embedded-field traversal with on-demand allocation, the
//! `string` option, and field context attachment on the way out.

use std::sync::Arc;

use crate::dec::{decode_into, type_mismatch};
use crate::error::{syntax, Error};
use crate::plan::{field_ptr_mut, Plan, PlanField};
use crate::reader::{DecSession, ReaderBuf};

pub(super) fn decode_struct(
    plan: &Arc<Plan>,
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
) -> Result<(), Error> {
    if head == b'n' {
        return sess.expect_null();
    }
    if head != b'{' {
        return Err(type_mismatch(head, plan.struct_name, sess));
    }

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
        first = false;

        let resolved = {
            let key = sess.read_string()?;
            match plan.lookup(key) {
                Some(idx) => Ok(idx),
                None => Err(String::from_utf8_lossy(key).into_owned()),
            }
        };

        let head = sess.read_byte()?;
        if head != b':' {
            return Err(syntax(
                format!("expected a colon, got: {:?}", head as char),
                sess.offset_of_last(),
            ));
        }

        let head = sess.read_byte()?;
        match resolved {
            Ok(idx) => {
                let field = &plan.fields[idx];
                let field_ptr = unsafe { field_ptr_mut(ptr, field) };
                let result = if field.quoted {
                    decode_quoted(field, head, field_ptr, sess)
                } else {
                    decode_into(&field.cell, head, field_ptr, sess)
                };
                result.map_err(|err| attach_context(err, plan, field))?;
            }
            Err(key) => {
                if sess.disallow_unknown {
                    return Err(syntax(
                        format!("unknown field {:?}", key),
                        sess.input_offset(),
                    ));
                }
                sess.skip(head)?;
            }
        }

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

/// The `string` option: the field's value arrives wrapped in a JSON
/// string whose unescaped contents must be exactly one scalar of the
/// field's kind.
fn decode_quoted(
    field: &PlanField,
    head: u8,
    field_ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
) -> Result<(), Error> {
    if head == b'n' {
        return sess.expect_null();
    }
    if head != b'"' {
        return Err(type_mismatch(head, field.shape.name, sess));
    }
    let offset = sess.input_offset();
    let payload = sess.read_string()?.to_vec();

    let mut nested = ReaderBuf::from_slice(&payload);
    let mut sub = DecSession::new(&mut nested, None);
    let head = sub
        .read_byte()
        .map_err(|_| invalid_string_option(offset))?;
    decode_into(&field.cell, head, field_ptr, &mut sub)?;
    if sub.peek()?.is_some() {
        return Err(invalid_string_option(offset));
    }
    Ok(())
}

fn invalid_string_option(offset: u64) -> Error {
    syntax("invalid use of the string option: payload is not a scalar", offset)
}

/// Attach the struct and dotted field path while unwinding; the outermost
/// struct wins the name slot.
fn attach_context(err: Error, plan: &Arc<Plan>, field: &PlanField) -> Error {
    match err {
        Error::UnmarshalType(mut err) => {
            err.struct_name = plan.struct_name;
            err.field = if err.field.is_empty() {
                field.name.clone()
            } else {
                format!("{}.{}", field.name, err.field)
            };
            Error::UnmarshalType(err)
        }
        other => other,
    }
}
