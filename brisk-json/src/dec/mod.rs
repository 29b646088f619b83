//! The decode-side codec compiler and the compiled codec interpreter.
//!
//! A `DecCodec` is compiled once per shape and interned on the shape's
//! cache cell. Dispatch order follows the contract: user JSON hooks win,
//! then text hooks, then the structural kind. Every decoder accepts JSON
//! `null` as a no-op (except `Option`, which records it), checks its head
//! byte, and reports anything else as an `UnmarshalTypeError`.

mod any;
mod map;
mod object;
mod seq;

pub(crate) use any::decode_value;

use std::sync::Arc;

use brisk_core::{ArrayDef, BoxError, Kind, ListDef, MapDef, OptionDef, PtrDef, Shape};
use log::trace;

use crate::cache::{cell_for, CodecCell};
use crate::error::{head_desc, syntax, Error, InvalidUnmarshalError, UnmarshalTypeError};
use crate::float;
use crate::plan::Plan;
use crate::raw::RawMessage;
use crate::reader::DecSession;
use crate::value::Number;

pub(crate) enum DecCodec {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Str,
    Number,
    Raw,
    Dynamic,
    Bytes {
        def: &'static ListDef,
        elem: Arc<CodecCell>,
    },
    Array {
        def: &'static ArrayDef,
        elem: Arc<CodecCell>,
    },
    List {
        def: &'static ListDef,
        elem: Arc<CodecCell>,
    },
    Map {
        def: &'static MapDef,
        value: Arc<CodecCell>,
    },
    Struct(Arc<Plan>),
    Opt {
        def: &'static OptionDef,
        elem: Arc<CodecCell>,
    },
    Ptr {
        def: &'static PtrDef,
        elem: Arc<CodecCell>,
    },
    Unmarshaler(unsafe fn(*mut u8, &[u8]) -> Result<(), BoxError>),
    TextUnmarshaler(unsafe fn(*mut u8, &str) -> Result<(), BoxError>),
}

/// The compiled decoder for a cell, compiling on first use. A cell being
/// compiled is already visible in the cache, so recursive type graphs
/// resolve to the in-progress entry instead of recursing.
pub(crate) fn get_dec(cell: &CodecCell) -> Result<&DecCodec, Error> {
    loop {
        if let Some(codec) = cell.dec.get() {
            return Ok(codec);
        }
        let codec = compile(cell.shape)?;
        // A racing compile may have won; the loop re-reads either way.
        let _ = cell.dec.set(codec);
    }
}

/// Decode one value (its head byte already consumed) into `ptr`.
///
/// # Safety contract
/// `ptr` must point at a valid, initialized value of the cell's type.
pub(crate) fn decode_into(
    cell: &CodecCell,
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
) -> Result<(), Error> {
    get_dec(cell)?.decode(head, ptr, sess, cell.shape.name)
}

fn compile(shape: &'static Shape) -> Result<DecCodec, Error> {
    trace!("compiling decoder for {}", shape.name);

    if let Some(hook) = shape.vtable.unmarshal_json {
        return Ok(DecCodec::Unmarshaler(hook));
    }
    if let Some(hook) = shape.vtable.unmarshal_text {
        return Ok(DecCodec::TextUnmarshaler(hook));
    }

    Ok(match shape.kind {
        Kind::Bool => DecCodec::Bool,
        Kind::I8 => DecCodec::I8,
        Kind::I16 => DecCodec::I16,
        Kind::I32 => DecCodec::I32,
        Kind::I64 => DecCodec::I64,
        Kind::Isize => DecCodec::Isize,
        Kind::U8 => DecCodec::U8,
        Kind::U16 => DecCodec::U16,
        Kind::U32 => DecCodec::U32,
        Kind::U64 => DecCodec::U64,
        Kind::Usize => DecCodec::Usize,
        Kind::F32 => DecCodec::F32,
        Kind::F64 => DecCodec::F64,
        Kind::Str => DecCodec::Str,
        Kind::Number => DecCodec::Number,
        Kind::Raw => DecCodec::Raw,
        Kind::Dynamic => DecCodec::Dynamic,
        Kind::Array(def) => DecCodec::Array {
            def,
            elem: cell_for(def.elem.get()),
        },
        Kind::List(def) => {
            let elem = def.elem.get();
            if matches!(elem.kind, Kind::U8) && !elem.vtable.has_json_hooks() {
                DecCodec::Bytes {
                    def,
                    elem: cell_for(elem),
                }
            } else {
                DecCodec::List {
                    def,
                    elem: cell_for(elem),
                }
            }
        }
        Kind::Map(def) => DecCodec::Map {
            def,
            value: cell_for(def.value.get()),
        },
        Kind::Struct(_) => DecCodec::Struct(crate::plan::plan_for(shape)?),
        Kind::Option(def) => DecCodec::Opt {
            def,
            elem: cell_for(def.elem.get()),
        },
        Kind::Ptr(def) => DecCodec::Ptr {
            def,
            elem: cell_for(def.elem.get()),
        },
        Kind::Opaque => {
            return Err(InvalidUnmarshalError {
                type_name: shape.name,
            }
            .into())
        }
    })
}

impl DecCodec {
    pub(crate) fn decode(
        &self,
        head: u8,
        ptr: *mut u8,
        sess: &mut DecSession<'_, '_>,
        type_name: &'static str,
    ) -> Result<(), Error> {
        match self {
            DecCodec::Bool => decode_bool(head, ptr, sess, type_name),
            DecCodec::I8 => decode_signed(head, ptr, sess, type_name, i8::MIN as i64, i8::MAX as i64, |p, v| unsafe {
                *(p as *mut i8) = v as i8;
            }),
            DecCodec::I16 => decode_signed(head, ptr, sess, type_name, i16::MIN as i64, i16::MAX as i64, |p, v| unsafe {
                *(p as *mut i16) = v as i16;
            }),
            DecCodec::I32 => decode_signed(head, ptr, sess, type_name, i32::MIN as i64, i32::MAX as i64, |p, v| unsafe {
                *(p as *mut i32) = v as i32;
            }),
            DecCodec::I64 => decode_signed(head, ptr, sess, type_name, i64::MIN, i64::MAX, |p, v| unsafe {
                *(p as *mut i64) = v;
            }),
            DecCodec::Isize => decode_signed(
                head,
                ptr,
                sess,
                type_name,
                isize::MIN as i64,
                isize::MAX as i64,
                |p, v| unsafe {
                    *(p as *mut isize) = v as isize;
                },
            ),
            DecCodec::U8 => decode_unsigned(head, ptr, sess, type_name, u8::MAX as u64, |p, v| unsafe {
                *(p as *mut u8) = v as u8;
            }),
            DecCodec::U16 => decode_unsigned(head, ptr, sess, type_name, u16::MAX as u64, |p, v| unsafe {
                *(p as *mut u16) = v as u16;
            }),
            DecCodec::U32 => decode_unsigned(head, ptr, sess, type_name, u32::MAX as u64, |p, v| unsafe {
                *(p as *mut u32) = v as u32;
            }),
            DecCodec::U64 => decode_unsigned(head, ptr, sess, type_name, u64::MAX, |p, v| unsafe {
                *(p as *mut u64) = v;
            }),
            DecCodec::Usize => decode_unsigned(head, ptr, sess, type_name, usize::MAX as u64, |p, v| unsafe {
                *(p as *mut usize) = v as usize;
            }),
            DecCodec::F32 => decode_f32(head, ptr, sess, type_name),
            DecCodec::F64 => decode_f64(head, ptr, sess, type_name),
            DecCodec::Str => decode_string(head, ptr, sess, type_name),
            DecCodec::Number => decode_number(head, ptr, sess, type_name),
            DecCodec::Raw => decode_raw(head, ptr, sess),
            DecCodec::Dynamic => {
                let value = any::decode_value(head, sess)?;
                unsafe { *(ptr as *mut crate::Value) = value };
                Ok(())
            }
            DecCodec::Bytes { def, elem } => seq::decode_bytes(def, elem, head, ptr, sess, type_name),
            DecCodec::Array { def, elem } => seq::decode_array(def, elem, head, ptr, sess, type_name),
            DecCodec::List { def, elem } => seq::decode_list(def, elem, head, ptr, sess, type_name),
            DecCodec::Map { def, value } => map::decode_map(def, value, head, ptr, sess, type_name),
            DecCodec::Struct(plan) => object::decode_struct(plan, head, ptr, sess),
            DecCodec::Opt { def, elem } => decode_option(def, elem, head, ptr, sess),
            DecCodec::Ptr { def, elem } => decode_ptr(def, elem, head, ptr, sess),
            DecCodec::Unmarshaler(hook) => decode_with_hook(*hook, head, ptr, sess),
            DecCodec::TextUnmarshaler(hook) => decode_with_text_hook(*hook, head, ptr, sess, type_name),
        }
    }
}

pub(crate) fn type_mismatch(head: u8, type_name: &'static str, sess: &DecSession<'_, '_>) -> Error {
    UnmarshalTypeError::new(head_desc(head), type_name, sess.input_offset()).into()
}

fn decode_bool(
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<(), Error> {
    match head {
        b'n' => sess.expect_null(),
        b't' => {
            sess.expect_keyword(b't', "rue")?;
            unsafe { *(ptr as *mut bool) = true };
            Ok(())
        }
        b'f' => {
            sess.expect_keyword(b'f', "alse")?;
            unsafe { *(ptr as *mut bool) = false };
            Ok(())
        }
        _ => Err(type_mismatch(head, type_name, sess)),
    }
}

/// Capture an integer literal: digits via the SWAR reader, with a lookout
/// for fraction/exponent tails that make the literal a float.
enum IntLit {
    Null,
    Value(u64, bool),
    /// Overflow or a non-integer literal; carries the literal text.
    Bad(String),
}

fn read_int_literal(
    head: u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
    allow_minus: bool,
) -> Result<IntLit, Error> {
    if head == b'n' {
        sess.expect_null()?;
        return Ok(IntLit::Null);
    }
    let neg = head == b'-';
    if !head.is_ascii_digit() && !(neg && allow_minus) {
        if neg {
            // A minus into an unsigned destination: still a number
            // syntactically, so consume it before reporting.
            let start = sess.keep_from_head();
            sess.consume_number(head)?;
            let literal = String::from_utf8_lossy(sess.take_kept(start)).into_owned();
            return Ok(IntLit::Bad(format!("number {literal}")));
        }
        return Err(type_mismatch(head, type_name, sess));
    }

    let start = sess.keep_from_head();
    let acc = if neg { 0 } else { (head - b'0') as u64 };
    let parsed = sess.read_digits(acc)?;
    if neg && sess.rd.pos == start + 1 {
        sess.end_keep();
        return Err(syntax("JSON number ended with '-'", sess.input_offset()));
    }

    if matches!(sess.peek_raw()?, Some(b'.') | Some(b'e') | Some(b'E')) {
        // It is a float literal; validate the tail, then report the whole
        // literal as the offending value.
        sess.consume_number(b'0')?;
        let literal = String::from_utf8_lossy(sess.take_kept(start)).into_owned();
        return Ok(IntLit::Bad(format!("number {literal}")));
    }

    match parsed {
        Some(value) => {
            sess.end_keep();
            Ok(IntLit::Value(value, neg))
        }
        None => {
            // Overflow: the accumulator lost the value, so the error
            // carries the literal itself.
            let literal = String::from_utf8_lossy(sess.take_kept(start)).into_owned();
            Ok(IntLit::Bad(literal))
        }
    }
}

fn decode_signed(
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
    min: i64,
    max: i64,
    store: impl FnOnce(*mut u8, i64),
) -> Result<(), Error> {
    match read_int_literal(head, sess, type_name, true)? {
        IntLit::Null => Ok(()),
        IntLit::Bad(literal) => {
            Err(UnmarshalTypeError::new(literal, type_name, sess.input_offset()).into())
        }
        IntLit::Value(magnitude, neg) => {
            let value = if neg {
                if magnitude > i64::MAX as u64 + 1 {
                    return Err(range_error(magnitude, true, type_name, sess));
                }
                (magnitude as i128).wrapping_neg() as i64
            } else {
                if magnitude > i64::MAX as u64 {
                    return Err(range_error(magnitude, false, type_name, sess));
                }
                magnitude as i64
            };
            if value < min || value > max {
                return Err(range_error(magnitude, neg, type_name, sess));
            }
            store(ptr, value);
            Ok(())
        }
    }
}

fn decode_unsigned(
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
    max: u64,
    store: impl FnOnce(*mut u8, u64),
) -> Result<(), Error> {
    match read_int_literal(head, sess, type_name, false)? {
        IntLit::Null => Ok(()),
        IntLit::Bad(literal) => {
            Err(UnmarshalTypeError::new(literal, type_name, sess.input_offset()).into())
        }
        IntLit::Value(value, _) => {
            if value > max {
                return Err(range_error(value, false, type_name, sess));
            }
            store(ptr, value);
            Ok(())
        }
    }
}

fn range_error(
    magnitude: u64,
    neg: bool,
    type_name: &'static str,
    sess: &DecSession<'_, '_>,
) -> Error {
    let literal = if neg {
        format!("-{magnitude}")
    } else {
        magnitude.to_string()
    };
    UnmarshalTypeError::new(literal, type_name, sess.input_offset()).into()
}

fn read_float_literal(
    head: u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<Option<f64>, Error> {
    if head == b'n' {
        sess.expect_null()?;
        return Ok(None);
    }
    if !head.is_ascii_digit() && head != b'-' {
        return Err(type_mismatch(head, type_name, sess));
    }
    let start = sess.keep_from_head();
    sess.consume_number(head)?;
    let parsed = float::parse_f64(sess.take_kept(start));
    if parsed.is_infinite() {
        let literal = String::from_utf8_lossy(sess.literal(start)).into_owned();
        return Err(UnmarshalTypeError::new(literal, type_name, sess.input_offset()).into());
    }
    Ok(Some(parsed))
}

fn decode_f64(
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<(), Error> {
    if let Some(value) = read_float_literal(head, sess, type_name)? {
        unsafe { *(ptr as *mut f64) = value };
    }
    Ok(())
}

fn decode_f32(
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<(), Error> {
    if head == b'n' {
        sess.expect_null()?;
        return Ok(());
    }
    if !head.is_ascii_digit() && head != b'-' {
        return Err(type_mismatch(head, type_name, sess));
    }
    let start = sess.keep_from_head();
    sess.consume_number(head)?;
    let parsed = float::parse_f64(sess.take_kept(start));
    if parsed.is_infinite() || parsed.abs() > f32::MAX as f64 {
        let literal = String::from_utf8_lossy(sess.literal(start)).into_owned();
        return Err(UnmarshalTypeError::new(literal, type_name, sess.input_offset()).into());
    }
    unsafe { *(ptr as *mut f32) = parsed as f32 };
    Ok(())
}

fn decode_string(
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<(), Error> {
    match head {
        b'n' => sess.expect_null(),
        b'"' => {
            let bytes = sess.read_string()?;
            let text = String::from_utf8_lossy(bytes).into_owned();
            unsafe { *(ptr as *mut String) = text };
            Ok(())
        }
        _ => Err(type_mismatch(head, type_name, sess)),
    }
}

fn decode_number(
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<(), Error> {
    if head == b'n' {
        return sess.expect_null();
    }
    if !head.is_ascii_digit() && head != b'-' {
        return Err(type_mismatch(head, type_name, sess));
    }
    let start = sess.keep_from_head();
    sess.consume_number(head)?;
    let literal = String::from_utf8_lossy(sess.take_kept(start)).into_owned();
    unsafe { *(ptr as *mut Number) = Number(literal) };
    Ok(())
}

fn decode_raw(head: u8, ptr: *mut u8, sess: &mut DecSession<'_, '_>) -> Result<(), Error> {
    let start = sess.keep_from_head();
    sess.skip(head)?;
    let bytes = sess.take_kept(start).to_vec();
    unsafe { *(ptr as *mut RawMessage) = RawMessage(bytes) };
    Ok(())
}

fn decode_option(
    def: &OptionDef,
    elem: &Arc<CodecCell>,
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
) -> Result<(), Error> {
    if head == b'n' {
        sess.expect_null()?;
        unsafe { (def.set_none)(ptr) };
        return Ok(());
    }
    let payload = unsafe {
        let existing = (def.get)(ptr);
        if existing.is_null() {
            (def.insert_default)(ptr)
        } else {
            existing as *mut u8
        }
    };
    decode_into(elem, head, payload, sess)
}

fn decode_ptr(
    def: &PtrDef,
    elem: &Arc<CodecCell>,
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
) -> Result<(), Error> {
    if head == b'n' {
        return sess.expect_null();
    }
    let payload = unsafe { (def.get_mut)(ptr) };
    decode_into(elem, head, payload, sess)
}

fn decode_with_hook(
    hook: unsafe fn(*mut u8, &[u8]) -> Result<(), BoxError>,
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
) -> Result<(), Error> {
    let start = sess.keep_from_head();
    sess.skip(head)?;
    let bytes = sess.take_kept(start);
    unsafe { hook(ptr, bytes) }.map_err(Error::Unmarshaler)
}

fn decode_with_text_hook(
    hook: unsafe fn(*mut u8, &str) -> Result<(), BoxError>,
    head: u8,
    ptr: *mut u8,
    sess: &mut DecSession<'_, '_>,
    type_name: &'static str,
) -> Result<(), Error> {
    match head {
        b'n' => sess.expect_null(),
        b'"' => {
            let bytes = sess.read_string()?;
            let text = String::from_utf8_lossy(bytes);
            unsafe { hook(ptr, &text) }.map_err(Error::Unmarshaler)
        }
        _ => Err(type_mismatch(head, type_name, sess)),
    }
}
