//! Struct emission: plan order, precomputed key literals, `omitempty`,
//! and the `string` option.

use std::sync::Arc;

use crate::enc::{encode_from, string::append_string, EncSession};
use crate::error::Error;
use crate::plan::{field_ptr, Plan};

pub(super) fn encode_struct(
    plan: &Arc<Plan>,
    ptr: *const u8,
    out: &mut Vec<u8>,
    sess: &mut EncSession,
) -> Result<(), Error> {
    out.push(b'{');
    let mut first = true;
    for field in &plan.fields {
        // A `None` along an embedded path hides the whole field.
        let Some(field_ptr) = (unsafe { field_ptr(ptr, field) }) else {
            continue;
        };
        if field.omitempty && unsafe { (field.shape.vtable.is_empty)(field_ptr) } {
            continue;
        }

        let literal = if sess.html {
            &field.key_html
        } else {
            &field.key_plain
        };
        if first {
            // The literal carries a leading comma; the first surviving
            // field drops it.
            out.extend_from_slice(&literal[1..]);
            first = false;
        } else {
            out.extend_from_slice(literal);
        }

        if field.quoted {
            encode_quoted(field, field_ptr, out, sess)?;
        } else {
            encode_from(&field.cell, field_ptr, out, sess)?;
        }
    }
    out.push(b'}');
    Ok(())
}

/// The `string` option: render the field to scratch, then requote. A
/// string field's already-quoted form is re-escaped whole; numbers and
/// booleans are wrapped directly.
fn encode_quoted(
    field: &crate::plan::PlanField,
    field_ptr: *const u8,
    out: &mut Vec<u8>,
    sess: &mut EncSession,
) -> Result<(), Error> {
    let mut scratch = Vec::new();
    encode_from(&field.cell, field_ptr, &mut scratch, sess)?;
    if matches!(field.shape.kind, brisk_core::Kind::Str) {
        append_string(out, &String::from_utf8_lossy(&scratch), sess.html);
    } else {
        out.push(b'"');
        out.extend_from_slice(&scratch);
        out.push(b'"');
    }
    Ok(())
}
