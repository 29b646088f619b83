//! Static type descriptors for the brisk JSON codec.
//!
//! Every codec-visible type exposes a [`Shape`]: its structural kind, the
//! field layout for structs (offsets from `core::mem::offset_of!`), and a
//! vtable of monomorphized operations. The codec crate compiles shapes
//! into specialized encode/decode functions; this crate only describes.
//!
//! Shapes are produced three ways:
//! - built-in impls for std types (scalars, `String`, `Vec`, arrays,
//!   `HashMap`/`BTreeMap`, `Option`, `Box`/`Rc`/`Arc`/`RefCell`),
//! - `#[derive(Shaped)]` from the `brisk-derive` crate for user structs,
//! - hand-written impls for special types (raw literals, dynamic values).
//!
//! # Safety
//!
//! `Shaped` is an `unsafe` trait: the implementation promises that
//! `SHAPE` faithfully describes `Self`'s layout — a scalar kind is only
//! used when `Self` *is* that Rust type, offsets are real field offsets,
//! and vtable entries treat their pointer argument as `Self`. The codec
//! reads and writes memory on the strength of that promise.

mod field;
mod hooks;
mod impls;
mod key;
mod shape;

pub use field::{Field, FieldFlags};
pub use hooks::{
    marshal_json_raw, marshal_text_raw, unmarshal_json_raw, unmarshal_text_raw, BoxError,
    JsonMarshaler, JsonUnmarshaler, TextMarshaler, TextUnmarshaler,
};
pub use impls::{
    default_fields_in_place, default_in_place_of, default_of, empty_eq_default, empty_never,
};
pub use key::MapKey;
pub use shape::{
    ArrayDef, KeyError, Kind, ListDef, MapDef, OptionDef, PtrDef, Shape, ShapeRef, StructDef,
    VTable,
};

/// A type with a static shape descriptor.
///
/// # Safety
///
/// `SHAPE` must describe `Self` exactly; see the crate-level safety notes.
pub unsafe trait Shaped: Sized + 'static {
    const SHAPE: &'static Shape;
}

/// Shorthand for `T::SHAPE`.
#[inline]
pub fn shape_of<T: Shaped>() -> &'static Shape {
    T::SHAPE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn scalar_shapes_report_layout() {
        assert_eq!(shape_of::<i64>().size, 8);
        assert_eq!(shape_of::<u8>().size, 1);
        assert!(matches!(shape_of::<bool>().kind, Kind::Bool));
        assert!(matches!(shape_of::<String>().kind, Kind::Str));
    }

    #[test]
    fn shape_identity_is_per_type() {
        assert_eq!(shape_of::<Vec<u32>>().id(), shape_of::<Vec<u32>>().id());
        assert_ne!(shape_of::<Vec<u32>>().id(), shape_of::<Vec<u64>>().id());
    }

    #[test]
    fn default_of_builds_zero_values() {
        assert_eq!(default_of::<i32>(), 0);
        assert_eq!(default_of::<String>(), "");
        assert_eq!(default_of::<Vec<bool>>(), Vec::<bool>::new());
        assert_eq!(default_of::<Option<u8>>(), None);
    }

    #[test]
    fn list_push_default_doubles_capacity() {
        let mut list: Vec<u16> = Vec::new();
        let def = match shape_of::<Vec<u16>>().kind {
            Kind::List(def) => def,
            _ => unreachable!(),
        };
        let base = &mut list as *mut Vec<u16> as *mut u8;
        let mut caps = Vec::new();
        for _ in 0..9 {
            unsafe {
                let slot = (def.push_default)(base);
                *(slot as *mut u16) = 7;
            }
            caps.push(list.capacity());
        }
        assert_eq!(list, vec![7u16; 9]);
        assert!(caps.windows(2).all(|w| w[1] == w[0] || w[1] == w[0] * 2));
    }

    #[test]
    fn map_insert_default_parses_keys() {
        let mut map: HashMap<i32, String> = HashMap::new();
        let def = match shape_of::<HashMap<i32, String>>().kind {
            Kind::Map(def) => def,
            _ => unreachable!(),
        };
        let base = &mut map as *mut HashMap<i32, String> as *mut u8;
        unsafe {
            let slot = (def.insert_default)(base, b"-12").unwrap();
            *(slot as *mut String) = "x".to_owned();
            assert!((def.insert_default)(base, b"1e3").is_err());
            assert!((def.insert_default)(base, b"999999999999999999999").is_err());
        }
        assert_eq!(map.get(&-12).map(String::as_str), Some("x"));
    }

    #[test]
    fn option_vtable_round_trips() {
        let mut opt: Option<u32> = None;
        let def = match shape_of::<Option<u32>>().kind {
            Kind::Option(def) => def,
            _ => unreachable!(),
        };
        let base = &mut opt as *mut Option<u32> as *mut u8;
        unsafe {
            assert!((def.get)(base).is_null());
            let payload = (def.insert_default)(base);
            *(payload as *mut u32) = 41;
            assert!(!(def.get)(base).is_null());
            (def.set_none)(base);
        }
        assert_eq!(opt, None);
    }
}
