//! `Shaped` implementations for std types, plus the monomorphized helper
//! functions that vtables and container defs point at.

use core::any::TypeId;
use core::cell::RefCell;
use core::hash::Hash;
use core::mem::{size_of, MaybeUninit};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use crate::hooks::BoxError;
use crate::key::MapKey;
use crate::shape::{
    ArrayDef, KeyError, Kind, ListDef, MapDef, OptionDef, PtrDef, Shape, ShapeRef, VTable,
};
use crate::Shaped;

/// Build a `T` by running its shape's `default_in_place` into fresh memory.
pub fn default_of<T: Shaped>() -> T {
    let mut slot = MaybeUninit::<T>::uninit();
    unsafe {
        (T::SHAPE.vtable.default_in_place)(slot.as_mut_ptr() as *mut u8);
        slot.assume_init()
    }
}

// --- vtable helpers -------------------------------------------------------

/// `default_in_place` via `Default`.
///
/// # Safety
/// `ptr` must be valid for writes of `T` and properly aligned.
pub unsafe fn default_in_place_of<T: Default>(ptr: *mut u8) {
    (ptr as *mut T).write(T::default());
}

/// `default_in_place` for derived structs: default every field through its
/// own shape, so no `Default` impl is required on the container.
///
/// # Safety
/// `ptr` must be valid for writes of `T` and properly aligned.
pub unsafe fn default_fields_in_place<T: Shaped>(ptr: *mut u8) {
    if let Kind::Struct(def) = T::SHAPE.kind {
        for field in def.fields {
            (field.shape().vtable.default_in_place)(ptr.add(field.offset));
        }
    }
}

/// `is_empty` for types that never count as empty (structs, indirections).
///
/// # Safety
/// Trivially safe; takes no action.
pub unsafe fn empty_never(_ptr: *const u8) -> bool {
    false
}

/// `is_empty` via comparison with the default value.
///
/// # Safety
/// `ptr` must point at a valid `T`.
pub unsafe fn empty_eq_default<T: Default + PartialEq>(ptr: *const u8) -> bool {
    *(ptr as *const T) == T::default()
}

unsafe fn empty_str(ptr: *const u8) -> bool {
    (&*(ptr as *const String)).is_empty()
}

unsafe fn empty_list<T>(ptr: *const u8) -> bool {
    (&*(ptr as *const Vec<T>)).is_empty()
}

unsafe fn empty_option<T>(ptr: *const u8) -> bool {
    (*(ptr as *const Option<T>)).is_none()
}

// --- scalar shapes --------------------------------------------------------

macro_rules! scalar_shaped {
    ($($ty:ty => $kind:ident, $name:literal;)*) => {$(
        unsafe impl Shaped for $ty {
            const SHAPE: &'static Shape = &Shape {
                name: $name,
                size: size_of::<$ty>(),
                align: core::mem::align_of::<$ty>(),
                type_id: TypeId::of::<$ty>,
                kind: Kind::$kind,
                vtable: VTable::new(default_in_place_of::<$ty>, empty_eq_default::<$ty>),
            };
        }
    )*};
}

scalar_shaped! {
    bool => Bool, "bool";
    i8 => I8, "i8";
    i16 => I16, "i16";
    i32 => I32, "i32";
    i64 => I64, "i64";
    isize => Isize, "isize";
    u8 => U8, "u8";
    u16 => U16, "u16";
    u32 => U32, "u32";
    u64 => U64, "u64";
    usize => Usize, "usize";
    f32 => F32, "f32";
    f64 => F64, "f64";
}

unsafe impl Shaped for String {
    const SHAPE: &'static Shape = &Shape {
        name: "String",
        size: size_of::<String>(),
        align: core::mem::align_of::<String>(),
        type_id: TypeId::of::<String>,
        kind: Kind::Str,
        vtable: VTable::new(default_in_place_of::<String>, empty_str),
    };
}

// --- arrays ---------------------------------------------------------------

unsafe fn default_array<T: Shaped, const N: usize>(ptr: *mut u8) {
    for idx in 0..N {
        (T::SHAPE.vtable.default_in_place)(ptr.add(idx * size_of::<T>()));
    }
}

unsafe fn empty_array<const N: usize>(_ptr: *const u8) -> bool {
    N == 0
}

unsafe fn reset_elem<T: Shaped>(ptr: *mut u8) {
    *(ptr as *mut T) = default_of::<T>();
}

unsafe impl<T: Shaped, const N: usize> Shaped for [T; N] {
    const SHAPE: &'static Shape = &Shape {
        name: "array",
        size: size_of::<[T; N]>(),
        align: core::mem::align_of::<[T; N]>(),
        type_id: TypeId::of::<[T; N]>,
        kind: Kind::Array(&ArrayDef {
            elem: ShapeRef::Static(T::SHAPE),
            len: N,
            stride: size_of::<T>(),
            reset_elem: reset_elem::<T>,
        }),
        vtable: VTable::new(default_array::<T, N>, empty_array::<N>),
    };
}

// --- lists ----------------------------------------------------------------

unsafe fn list_clear<T>(ptr: *mut u8) {
    (*(ptr as *mut Vec<T>)).clear();
}

unsafe fn list_push_default<T: Shaped>(ptr: *mut u8) -> *mut u8 {
    let list = &mut *(ptr as *mut Vec<T>);
    if list.len() == list.capacity() {
        // new_cap = max(old_cap * 2, 1)
        list.reserve_exact(list.capacity().max(1));
    }
    list.push(default_of::<T>());
    let last = list.len() - 1;
    list.as_mut_ptr().add(last) as *mut u8
}

unsafe fn list_len<T>(ptr: *const u8) -> usize {
    (*(ptr as *const Vec<T>)).len()
}

unsafe fn list_capacity<T>(ptr: *const u8) -> usize {
    (*(ptr as *const Vec<T>)).capacity()
}

unsafe fn list_as_ptr<T>(ptr: *const u8) -> *const u8 {
    (*(ptr as *const Vec<T>)).as_ptr() as *const u8
}

unsafe impl<T: Shaped> Shaped for Vec<T> {
    const SHAPE: &'static Shape = &Shape {
        name: "Vec",
        size: size_of::<Vec<T>>(),
        align: core::mem::align_of::<Vec<T>>(),
        type_id: TypeId::of::<Vec<T>>,
        kind: Kind::List(&ListDef {
            elem: ShapeRef::Static(T::SHAPE),
            stride: size_of::<T>(),
            clear: list_clear::<T>,
            push_default: list_push_default::<T>,
            len: list_len::<T>,
            capacity: list_capacity::<T>,
            as_ptr: list_as_ptr::<T>,
        }),
        vtable: VTable::new(default_in_place_of::<Vec<T>>, empty_list::<T>),
    };
}

// --- maps -----------------------------------------------------------------

unsafe fn hash_map_len<K, V>(ptr: *const u8) -> usize
where
    K: Eq + Hash,
{
    (*(ptr as *const HashMap<K, V>)).len()
}

unsafe fn hash_map_insert_default<K, V>(ptr: *mut u8, raw: &[u8]) -> Result<*mut u8, KeyError>
where
    K: MapKey + Eq + Hash,
    V: Shaped,
{
    let map = &mut *(ptr as *mut HashMap<K, V>);
    let key = K::parse_key(raw)?;
    let slot = map.entry(key).or_insert_with(default_of::<V>);
    Ok(slot as *mut V as *mut u8)
}

unsafe fn hash_map_iter<K, V>(ptr: *const u8, visit: &mut dyn FnMut(*const u8, *const u8))
where
    K: Eq + Hash,
{
    for (key, value) in (*(ptr as *const HashMap<K, V>)).iter() {
        visit(key as *const K as *const u8, value as *const V as *const u8);
    }
}

unsafe fn btree_map_len<K, V>(ptr: *const u8) -> usize
where
    K: Ord,
{
    (*(ptr as *const BTreeMap<K, V>)).len()
}

unsafe fn btree_map_insert_default<K, V>(ptr: *mut u8, raw: &[u8]) -> Result<*mut u8, KeyError>
where
    K: MapKey + Ord,
    V: Shaped,
{
    let map = &mut *(ptr as *mut BTreeMap<K, V>);
    let key = K::parse_key(raw)?;
    let slot = map.entry(key).or_insert_with(default_of::<V>);
    Ok(slot as *mut V as *mut u8)
}

unsafe fn btree_map_iter<K, V>(ptr: *const u8, visit: &mut dyn FnMut(*const u8, *const u8))
where
    K: Ord,
{
    for (key, value) in (*(ptr as *const BTreeMap<K, V>)).iter() {
        visit(key as *const K as *const u8, value as *const V as *const u8);
    }
}

unsafe fn map_write_key<K: MapKey>(ptr: *const u8, out: &mut Vec<u8>) -> Result<(), BoxError> {
    (*(ptr as *const K)).write_key(out)
}

unsafe fn empty_hash_map<K: Eq + Hash, V>(ptr: *const u8) -> bool {
    (*(ptr as *const HashMap<K, V>)).is_empty()
}

unsafe fn empty_btree_map<K: Ord, V>(ptr: *const u8) -> bool {
    (*(ptr as *const BTreeMap<K, V>)).is_empty()
}

unsafe impl<K, V> Shaped for HashMap<K, V>
where
    K: Shaped + MapKey + Eq + Hash,
    V: Shaped,
{
    const SHAPE: &'static Shape = &Shape {
        name: "HashMap",
        size: size_of::<HashMap<K, V>>(),
        align: core::mem::align_of::<HashMap<K, V>>(),
        type_id: TypeId::of::<HashMap<K, V>>,
        kind: Kind::Map(&MapDef {
            key: ShapeRef::Static(K::SHAPE),
            value: ShapeRef::Static(V::SHAPE),
            numeric_keys: K::NUMERIC,
            len: hash_map_len::<K, V>,
            insert_default: hash_map_insert_default::<K, V>,
            iter: hash_map_iter::<K, V>,
            write_key: map_write_key::<K>,
        }),
        vtable: VTable::new(default_in_place_of::<HashMap<K, V>>, empty_hash_map::<K, V>),
    };
}

unsafe impl<K, V> Shaped for BTreeMap<K, V>
where
    K: Shaped + MapKey + Ord,
    V: Shaped,
{
    const SHAPE: &'static Shape = &Shape {
        name: "BTreeMap",
        size: size_of::<BTreeMap<K, V>>(),
        align: core::mem::align_of::<BTreeMap<K, V>>(),
        type_id: TypeId::of::<BTreeMap<K, V>>,
        kind: Kind::Map(&MapDef {
            key: ShapeRef::Static(K::SHAPE),
            value: ShapeRef::Static(V::SHAPE),
            numeric_keys: K::NUMERIC,
            len: btree_map_len::<K, V>,
            insert_default: btree_map_insert_default::<K, V>,
            iter: btree_map_iter::<K, V>,
            write_key: map_write_key::<K>,
        }),
        vtable: VTable::new(
            default_in_place_of::<BTreeMap<K, V>>,
            empty_btree_map::<K, V>,
        ),
    };
}

// --- option ---------------------------------------------------------------

unsafe fn option_get<T>(ptr: *const u8) -> *const u8 {
    match &*(ptr as *const Option<T>) {
        Some(value) => value as *const T as *const u8,
        None => core::ptr::null(),
    }
}

unsafe fn option_set_none<T>(ptr: *mut u8) {
    *(ptr as *mut Option<T>) = None;
}

unsafe fn option_insert_default<T: Shaped>(ptr: *mut u8) -> *mut u8 {
    let opt = &mut *(ptr as *mut Option<T>);
    *opt = Some(default_of::<T>());
    match opt {
        Some(value) => value as *mut T as *mut u8,
        None => unreachable!(),
    }
}

unsafe impl<T: Shaped> Shaped for Option<T> {
    const SHAPE: &'static Shape = &Shape {
        name: "Option",
        size: size_of::<Option<T>>(),
        align: core::mem::align_of::<Option<T>>(),
        type_id: TypeId::of::<Option<T>>,
        kind: Kind::Option(&OptionDef {
            elem: ShapeRef::Static(T::SHAPE),
            get: option_get::<T>,
            set_none: option_set_none::<T>,
            insert_default: option_insert_default::<T>,
        }),
        vtable: VTable::new(default_in_place_of::<Option<T>>, empty_option::<T>),
    };
}

// --- owning indirections --------------------------------------------------

unsafe fn box_default<T: Shaped>(ptr: *mut u8) {
    (ptr as *mut Box<T>).write(Box::new(default_of::<T>()));
}

unsafe fn box_get<T>(ptr: *const u8) -> *const u8 {
    &**(ptr as *const Box<T>) as *const T as *const u8
}

unsafe fn box_get_mut<T>(ptr: *mut u8) -> *mut u8 {
    &mut **(ptr as *mut Box<T>) as *mut T as *mut u8
}

unsafe impl<T: Shaped> Shaped for Box<T> {
    const SHAPE: &'static Shape = &Shape {
        name: "Box",
        size: size_of::<Box<T>>(),
        align: core::mem::align_of::<Box<T>>(),
        type_id: TypeId::of::<Box<T>>,
        kind: Kind::Ptr(&PtrDef {
            elem: ShapeRef::Static(T::SHAPE),
            get: box_get::<T>,
            get_mut: box_get_mut::<T>,
        }),
        vtable: VTable::new(box_default::<T>, empty_never),
    };
}

unsafe fn rc_default<T: Shaped>(ptr: *mut u8) {
    (ptr as *mut Rc<T>).write(Rc::new(default_of::<T>()));
}

unsafe fn rc_get<T>(ptr: *const u8) -> *const u8 {
    Rc::as_ptr(&*(ptr as *const Rc<T>)) as *const u8
}

unsafe fn rc_get_mut<T: Shaped>(ptr: *mut u8) -> *mut u8 {
    let rc = &mut *(ptr as *mut Rc<T>);
    if Rc::get_mut(rc).is_none() {
        // Shared: decoding replaces rather than mutating through aliases.
        *rc = Rc::new(default_of::<T>());
    }
    match Rc::get_mut(rc) {
        Some(value) => value as *mut T as *mut u8,
        None => unreachable!(),
    }
}

unsafe impl<T: Shaped> Shaped for Rc<T> {
    const SHAPE: &'static Shape = &Shape {
        name: "Rc",
        size: size_of::<Rc<T>>(),
        align: core::mem::align_of::<Rc<T>>(),
        type_id: TypeId::of::<Rc<T>>,
        kind: Kind::Ptr(&PtrDef {
            elem: ShapeRef::Static(T::SHAPE),
            get: rc_get::<T>,
            get_mut: rc_get_mut::<T>,
        }),
        vtable: VTable::new(rc_default::<T>, empty_never),
    };
}

unsafe fn arc_default<T: Shaped>(ptr: *mut u8) {
    (ptr as *mut Arc<T>).write(Arc::new(default_of::<T>()));
}

unsafe fn arc_get<T>(ptr: *const u8) -> *const u8 {
    Arc::as_ptr(&*(ptr as *const Arc<T>)) as *const u8
}

unsafe fn arc_get_mut<T: Shaped>(ptr: *mut u8) -> *mut u8 {
    let arc = &mut *(ptr as *mut Arc<T>);
    if Arc::get_mut(arc).is_none() {
        *arc = Arc::new(default_of::<T>());
    }
    match Arc::get_mut(arc) {
        Some(value) => value as *mut T as *mut u8,
        None => unreachable!(),
    }
}

unsafe impl<T: Shaped> Shaped for Arc<T> {
    const SHAPE: &'static Shape = &Shape {
        name: "Arc",
        size: size_of::<Arc<T>>(),
        align: core::mem::align_of::<Arc<T>>(),
        type_id: TypeId::of::<Arc<T>>,
        kind: Kind::Ptr(&PtrDef {
            elem: ShapeRef::Static(T::SHAPE),
            get: arc_get::<T>,
            get_mut: arc_get_mut::<T>,
        }),
        vtable: VTable::new(arc_default::<T>, empty_never),
    };
}

unsafe fn refcell_default<T: Shaped>(ptr: *mut u8) {
    (ptr as *mut RefCell<T>).write(RefCell::new(default_of::<T>()));
}

unsafe fn refcell_get<T>(ptr: *const u8) -> *const u8 {
    (*(ptr as *const RefCell<T>)).as_ptr() as *const u8
}

unsafe fn refcell_get_mut<T>(ptr: *mut u8) -> *mut u8 {
    (*(ptr as *mut RefCell<T>)).as_ptr() as *mut u8
}

unsafe impl<T: Shaped> Shaped for RefCell<T> {
    const SHAPE: &'static Shape = &Shape {
        name: "RefCell",
        size: size_of::<RefCell<T>>(),
        align: core::mem::align_of::<RefCell<T>>(),
        type_id: TypeId::of::<RefCell<T>>,
        kind: Kind::Ptr(&PtrDef {
            elem: ShapeRef::Static(T::SHAPE),
            get: refcell_get::<T>,
            get_mut: refcell_get_mut::<T>,
        }),
        vtable: VTable::new(refcell_default::<T>, empty_never),
    };
}
