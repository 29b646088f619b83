//! The encode-side codec compiler and the compiled codec emitter.
//!
//! Compiled codecs append JSON bytes to a caller-owned buffer. The
//! per-call session carries the HTML-safe flag and the cycle tracker: a
//! depth counter that, past a threshold, starts recording the addresses
//! of pointers and the (base, len, cap) triples of slices it descends
//! through. The common case never allocates the seen-set.

pub(crate) mod any;
mod map;
mod object;
pub(crate) mod number;
mod seq;
pub(crate) mod string;

use std::collections::HashSet;
use std::sync::Arc;

use brisk_core::{ArrayDef, BoxError, Kind, ListDef, MapDef, OptionDef, PtrDef, Shape};
use log::trace;

use crate::cache::{cell_for, CodecCell};
use crate::compact::compact_escaped;
use crate::error::{Error, MarshalerError, UnsupportedTypeError, UnsupportedValueError};
use crate::plan::Plan;
use crate::raw::RawMessage;
use crate::value::{is_valid_number, Number, Value};

/// Cycle tracking starts after this many pointer/slice/map descents.
const CYCLE_DEPTH: usize = 1000;

/// Identity of a traversed container: pointer address for indirections,
/// (base, len, cap) for slices, tagged location for maps.
pub(crate) type SeenKey = (usize, usize, usize);

pub(crate) struct EncSession {
    pub(crate) html: bool,
    depth: usize,
    seen: Option<HashSet<SeenKey>>,
}

impl EncSession {
    pub(crate) fn new(html: bool) -> Self {
        EncSession {
            html,
            depth: 0,
            // The seen-set is allocated lazily; tracking every pointer
            // from depth zero costs measurably on small values.
            seen: None,
        }
    }

    /// Descend into a container. Returns whether `key` was recorded and
    /// must be released by [`EncSession::leave`].
    fn enter(&mut self, key: SeenKey) -> Result<bool, Error> {
        self.depth += 1;
        if self.depth > CYCLE_DEPTH {
            let seen = self.seen.get_or_insert_with(HashSet::new);
            if !seen.insert(key) {
                return Err(UnsupportedValueError {
                    value: "encountered a cycle".to_owned(),
                }
                .into());
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn leave(&mut self, key: SeenKey, recorded: bool) {
        self.depth -= 1;
        if recorded {
            if let Some(seen) = self.seen.as_mut() {
                seen.remove(&key);
            }
        }
    }
}

pub(crate) enum EncCodec {
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
    Bytes(&'static ListDef),
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
    Marshaler(unsafe fn(*const u8) -> Result<Vec<u8>, BoxError>),
    TextMarshaler(unsafe fn(*const u8) -> Result<String, BoxError>),
}

/// The compiled encoder for a cell, compiling on first use.
pub(crate) fn get_enc(cell: &CodecCell) -> Result<&EncCodec, Error> {
    loop {
        if let Some(codec) = cell.enc.get() {
            return Ok(codec);
        }
        let codec = compile(cell.shape)?;
        let _ = cell.enc.set(codec);
    }
}

/// Encode the value at `ptr` into `out`.
///
/// # Safety contract
/// `ptr` must point at a valid value of the cell's type.
pub(crate) fn encode_from(
    cell: &CodecCell,
    ptr: *const u8,
    out: &mut Vec<u8>,
    sess: &mut EncSession,
) -> Result<(), Error> {
    get_enc(cell)?.encode(ptr, out, sess, cell.shape.name)
}

fn compile(shape: &'static Shape) -> Result<EncCodec, Error> {
    trace!("compiling encoder for {}", shape.name);

    if let Some(hook) = shape.vtable.marshal_json {
        return Ok(EncCodec::Marshaler(hook));
    }
    if let Some(hook) = shape.vtable.marshal_text {
        return Ok(EncCodec::TextMarshaler(hook));
    }

    Ok(match shape.kind {
        Kind::Bool => EncCodec::Bool,
        Kind::I8 => EncCodec::I8,
        Kind::I16 => EncCodec::I16,
        Kind::I32 => EncCodec::I32,
        Kind::I64 => EncCodec::I64,
        Kind::Isize => EncCodec::Isize,
        Kind::U8 => EncCodec::U8,
        Kind::U16 => EncCodec::U16,
        Kind::U32 => EncCodec::U32,
        Kind::U64 => EncCodec::U64,
        Kind::Usize => EncCodec::Usize,
        Kind::F32 => EncCodec::F32,
        Kind::F64 => EncCodec::F64,
        Kind::Str => EncCodec::Str,
        Kind::Number => EncCodec::Number,
        Kind::Raw => EncCodec::Raw,
        Kind::Dynamic => EncCodec::Dynamic,
        Kind::Array(def) => EncCodec::Array {
            def,
            elem: cell_for(def.elem.get()),
        },
        Kind::List(def) => {
            let elem = def.elem.get();
            if matches!(elem.kind, Kind::U8) && elem.vtable.marshal_json.is_none() {
                EncCodec::Bytes(def)
            } else {
                EncCodec::List {
                    def,
                    elem: cell_for(elem),
                }
            }
        }
        Kind::Map(def) => EncCodec::Map {
            def,
            value: cell_for(def.value.get()),
        },
        Kind::Struct(_) => EncCodec::Struct(crate::plan::plan_for(shape)?),
        Kind::Option(def) => EncCodec::Opt {
            def,
            elem: cell_for(def.elem.get()),
        },
        Kind::Ptr(def) => EncCodec::Ptr {
            def,
            elem: cell_for(def.elem.get()),
        },
        Kind::Opaque => {
            return Err(UnsupportedTypeError {
                type_name: shape.name,
            }
            .into())
        }
    })
}

impl EncCodec {
    pub(crate) fn encode(
        &self,
        ptr: *const u8,
        out: &mut Vec<u8>,
        sess: &mut EncSession,
        type_name: &'static str,
    ) -> Result<(), Error> {
        match self {
            EncCodec::Bool => {
                out.extend_from_slice(if unsafe { *(ptr as *const bool) } {
                    b"true"
                } else {
                    b"false"
                });
                Ok(())
            }
            EncCodec::I8 => {
                number::append_i64(out, unsafe { *(ptr as *const i8) } as i64);
                Ok(())
            }
            EncCodec::I16 => {
                number::append_i64(out, unsafe { *(ptr as *const i16) } as i64);
                Ok(())
            }
            EncCodec::I32 => {
                number::append_i64(out, unsafe { *(ptr as *const i32) } as i64);
                Ok(())
            }
            EncCodec::I64 => {
                number::append_i64(out, unsafe { *(ptr as *const i64) });
                Ok(())
            }
            EncCodec::Isize => {
                number::append_i64(out, unsafe { *(ptr as *const isize) } as i64);
                Ok(())
            }
            EncCodec::U8 => {
                number::append_u64(out, unsafe { *(ptr as *const u8) } as u64);
                Ok(())
            }
            EncCodec::U16 => {
                number::append_u64(out, unsafe { *(ptr as *const u16) } as u64);
                Ok(())
            }
            EncCodec::U32 => {
                number::append_u64(out, unsafe { *(ptr as *const u32) } as u64);
                Ok(())
            }
            EncCodec::U64 => {
                number::append_u64(out, unsafe { *(ptr as *const u64) });
                Ok(())
            }
            EncCodec::Usize => {
                number::append_u64(out, unsafe { *(ptr as *const usize) } as u64);
                Ok(())
            }
            EncCodec::F32 => number::append_f32(out, unsafe { *(ptr as *const f32) }),
            EncCodec::F64 => number::append_f64(out, unsafe { *(ptr as *const f64) }),
            EncCodec::Str => {
                string::append_string(out, unsafe { &*(ptr as *const String) }, sess.html);
                Ok(())
            }
            EncCodec::Number => encode_number(ptr, out),
            EncCodec::Raw => encode_raw(ptr, out, sess),
            EncCodec::Dynamic => any::encode_value(unsafe { &*(ptr as *const Value) }, out, sess),
            EncCodec::Bytes(_) => seq::encode_bytes(ptr, out),
            EncCodec::Array { def, elem } => seq::encode_array(def, elem, ptr, out, sess),
            EncCodec::List { def, elem } => seq::encode_list(def, elem, ptr, out, sess),
            EncCodec::Map { def, value } => map::encode_map(def, value, ptr, out, sess),
            EncCodec::Struct(plan) => object::encode_struct(plan, ptr, out, sess),
            EncCodec::Opt { def, elem } => {
                let payload = unsafe { (def.get)(ptr) };
                if payload.is_null() {
                    out.extend_from_slice(b"null");
                    Ok(())
                } else {
                    encode_from(elem, payload, out, sess)
                }
            }
            EncCodec::Ptr { def, elem } => {
                let payload = unsafe { (def.get)(ptr) };
                let key = (payload as usize, 0, 0);
                let recorded = sess.enter(key)?;
                let result = encode_from(elem, payload, out, sess);
                sess.leave(key, recorded);
                result
            }
            EncCodec::Marshaler(hook) => {
                let bytes = unsafe { hook(ptr) }.map_err(|err| MarshalerError {
                    type_name,
                    source_fn: "marshal_json",
                    source: err,
                })?;
                compact_escaped(out, &bytes, sess.html).map_err(|err| {
                    MarshalerError {
                        type_name,
                        source_fn: "marshal_json",
                        source: Box::new(err),
                    }
                    .into()
                })
            }
            EncCodec::TextMarshaler(hook) => {
                let text = unsafe { hook(ptr) }.map_err(|err| MarshalerError {
                    type_name,
                    source_fn: "marshal_text",
                    source: err,
                })?;
                string::append_string(out, &text, sess.html);
                Ok(())
            }
        }
    }
}

fn encode_number(ptr: *const u8, out: &mut Vec<u8>) -> Result<(), Error> {
    let literal = unsafe { &*(ptr as *const Number) };
    if !is_valid_number(literal.0.as_bytes()) {
        return Err(UnsupportedValueError {
            value: format!("invalid number literal {:?}", literal.0),
        }
        .into());
    }
    out.extend_from_slice(literal.0.as_bytes());
    Ok(())
}

fn encode_raw(ptr: *const u8, out: &mut Vec<u8>, sess: &mut EncSession) -> Result<(), Error> {
    let raw = unsafe { &*(ptr as *const RawMessage) };
    if raw.0.is_empty() {
        out.extend_from_slice(b"null");
        return Ok(());
    }
    compact_escaped(out, &raw.0, sess.html).map_err(|err| {
        MarshalerError {
            type_name: "RawMessage",
            source_fn: "marshal_json",
            source: Box::new(err),
        }
        .into()
    })
}
