//! The struct field planner.
//!
//! Breadth-first exploration over the root struct and the structs
//! reachable through `embed`-flagged fields produces one plan entry per
//! surviving field. Promotion, name dominance and annihilation follow the
//! embedding rules of the wire contract: the least-deeply nested field
//! with a name wins; ties on depth and tag presence drop every candidate
//! for that name. The finished plan carries precomputed key literals and
//! two perfect-hash tables — exact bytes and case-folded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use brisk_core::{FieldFlags, Kind, Shape};
use log::trace;

use crate::arith;
use crate::cache::{cell_for, CodecCell};
use crate::enc::string::append_string;
use crate::error::{Error, UnsupportedTypeError};
use crate::table::Table;

/// One hop of an embedded-field path: the embedded field's offset within
/// its parent, and its shape (possibly `Option`/`Ptr` wrapped).
#[derive(Clone)]
pub(crate) struct Hop {
    pub(crate) offset: usize,
    pub(crate) shape: &'static Shape,
}

pub(crate) struct PlanField {
    pub(crate) name: String,
    /// `,"name":` — plain and HTML-escaped spellings.
    pub(crate) key_plain: Vec<u8>,
    pub(crate) key_html: Vec<u8>,
    pub(crate) shape: &'static Shape,
    pub(crate) cell: Arc<CodecCell>,
    /// Embedded-struct hops from the root struct base to the field's
    /// containing struct.
    pub(crate) hops: Vec<Hop>,
    /// Offset of the field within its containing struct.
    pub(crate) offset: usize,
    pub(crate) omitempty: bool,
    /// The `string` option: quote the primitive JSON form.
    pub(crate) quoted: bool,
}

pub(crate) struct Plan {
    pub(crate) struct_name: &'static str,
    pub(crate) fields: Vec<PlanField>,
    exact: Table,
    fold: Table,
    ascii_names: bool,
}

#[derive(Clone)]
struct Candidate {
    name: String,
    tagged: bool,
    omitempty: bool,
    quoted: bool,
    shape: &'static Shape,
    hops: Vec<Hop>,
    offset: usize,
    index: Vec<u16>,
}

/// The plan for a struct shape, built once and interned on its cache
/// cell.
pub(crate) fn plan_for(shape: &'static Shape) -> Result<Arc<Plan>, Error> {
    let cell = cell_for(shape);
    if let Some(plan) = cell.plan.get() {
        return Ok(plan.clone());
    }
    let plan = Arc::new(build(shape)?);
    let _ = cell.plan.set(plan.clone());
    Ok(cell.plan.get().cloned().unwrap_or(plan))
}

fn build(shape: &'static Shape) -> Result<Plan, Error> {
    trace!("planning struct fields for {}", shape.name);
    let candidates = collect(shape)?;
    let kept = dominate(candidates);

    let mut fields = Vec::with_capacity(kept.len());
    let mut ascii_names = true;
    for candidate in kept {
        ascii_names = ascii_names && candidate.name.is_ascii();

        let mut key_plain = Vec::with_capacity(candidate.name.len() + 4);
        key_plain.push(b',');
        append_string(&mut key_plain, &candidate.name, false);
        key_plain.push(b':');

        let mut key_html = Vec::with_capacity(candidate.name.len() + 4);
        key_html.push(b',');
        append_string(&mut key_html, &candidate.name, true);
        key_html.push(b':');

        fields.push(PlanField {
            key_plain,
            key_html,
            shape: candidate.shape,
            cell: cell_for(candidate.shape),
            hops: candidate.hops,
            offset: candidate.offset,
            omitempty: candidate.omitempty,
            quoted: candidate.quoted,
            name: candidate.name,
        });
    }

    // Deterministic seed from the struct identity and its field names, so
    // table layout is reproducible run to run.
    let mut seed = 0u64;
    for byte in shape.name.bytes() {
        seed = seed.wrapping_mul(31).wrapping_add(byte as u64);
    }
    for field in &fields {
        for byte in field.name.bytes() {
            seed = seed.wrapping_mul(31).wrapping_add(byte as u64);
        }
    }

    let exact_keys: Vec<(Vec<u8>, u32)> = fields
        .iter()
        .enumerate()
        .map(|(idx, field)| (field.name.clone().into_bytes(), idx as u32))
        .collect();
    let exact = Table::build(&exact_keys, seed);

    let mut seen_folds = HashSet::new();
    let mut fold_keys: Vec<(Vec<u8>, u32)> = Vec::with_capacity(fields.len());
    for (idx, field) in fields.iter().enumerate() {
        let folded = fold_name(&field.name, ascii_names);
        // On a fold collision the first field in plan order wins.
        if seen_folds.insert(folded.clone()) {
            fold_keys.push((folded, idx as u32));
        }
    }
    let fold = Table::build(&fold_keys, seed ^ 0x5bd1_e995);

    Ok(Plan {
        struct_name: shape.name,
        fields,
        exact,
        fold,
        ascii_names,
    })
}

fn collect(shape: &'static Shape) -> Result<Vec<Candidate>, Error> {
    let mut candidates = Vec::new();
    let mut next: Vec<(&'static Shape, Vec<Hop>, Vec<u16>)> = vec![(shape, Vec::new(), Vec::new())];
    let mut visited: HashSet<core::any::TypeId> = HashSet::new();
    let mut curr_count: HashMap<core::any::TypeId, u32> = HashMap::new();

    while !next.is_empty() {
        let curr = std::mem::take(&mut next);
        let mut next_count: HashMap<core::any::TypeId, u32> = HashMap::new();

        for (owner, hops, index) in curr {
            if !visited.insert(owner.id()) {
                continue;
            }
            let def = match owner.kind {
                Kind::Struct(def) => def,
                _ => continue,
            };

            for (field_idx, field) in def.fields.iter().enumerate() {
                if field.flags.contains(FieldFlags::SKIP) {
                    continue;
                }
                let field_shape = field.shape();
                let mut field_index = index.clone();
                field_index.push(field_idx as u16);

                let rename = field.rename.filter(|name| is_valid_key(name));
                let tagged = rename.is_some();

                if field.flags.contains(FieldFlags::EMBED) && !tagged {
                    let inner = unwrap_indirections(field_shape);
                    if matches!(inner.kind, Kind::Struct(_)) {
                        // Expand in the next round; repeat sightings only
                        // matter as duplicate markers.
                        let count = next_count.entry(inner.id()).or_insert(0);
                        *count += 1;
                        if *count == 1 {
                            let mut deeper = hops.clone();
                            deeper.push(Hop {
                                offset: field.offset,
                                shape: field_shape,
                            });
                            next.push((inner, deeper, field_index));
                        }
                        continue;
                    }
                }

                let quoted = field.flags.contains(FieldFlags::STRING);
                if quoted && !string_option_applies(field_shape) {
                    return Err(UnsupportedTypeError {
                        type_name: field_shape.name,
                    }
                    .into());
                }

                let candidate = Candidate {
                    name: rename
                        .map(str::to_owned)
                        .unwrap_or_else(|| field.name.to_owned()),
                    tagged,
                    omitempty: field.flags.contains(FieldFlags::OMITEMPTY),
                    quoted,
                    shape: field_shape,
                    hops: hops.clone(),
                    offset: field.offset,
                    index: field_index,
                };
                let duplicate_owner = curr_count.get(&owner.id()).copied().unwrap_or(0) > 1;
                candidates.push(candidate);
                if duplicate_owner {
                    // A second copy so the annihilation pass sees the
                    // conflict; it only distinguishes one from many.
                    let copy = candidates[candidates.len() - 1].clone();
                    candidates.push(copy);
                }
            }
        }
        curr_count = next_count;
    }
    Ok(candidates)
}

fn dominate(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    // Sort by name, breaking ties with depth, then presence of a key
    // override, then source index order.
    candidates.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.index.len().cmp(&b.index.len()))
            .then_with(|| b.tagged.cmp(&a.tagged))
            .then_with(|| a.index.cmp(&b.index))
    });

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut idx = 0;
    while idx < candidates.len() {
        let mut end = idx + 1;
        while end < candidates.len() && candidates[end].name == candidates[idx].name {
            end += 1;
        }
        if end - idx == 1 {
            kept.push(candidates[idx].clone());
        } else {
            // The sort put the dominant candidate first; the group is
            // dropped entirely when the top two tie on both depth and tag
            // presence.
            let first = &candidates[idx];
            let second = &candidates[idx + 1];
            if first.index.len() != second.index.len() || first.tagged != second.tagged {
                kept.push(first.clone());
            }
        }
        idx = end;
    }

    kept.sort_by(|a, b| a.index.cmp(&b.index));
    kept
}

impl Plan {
    /// Resolve a raw object key to a field index: exact match first, then
    /// a case-folded retry. An exact match always wins over a fold.
    pub(crate) fn lookup(&self, key: &[u8]) -> Option<usize> {
        if let Some(idx) = self.exact.get(key) {
            return Some(idx as usize);
        }
        let folded = fold_key(key, self.ascii_names);
        self.fold.get(&folded).map(|idx| idx as usize)
    }
}

fn fold_name(name: &str, ascii: bool) -> Vec<u8> {
    if ascii {
        fold_key(name.as_bytes(), true)
    } else {
        name.to_lowercase().into_bytes()
    }
}

/// Case-fold a lookup key. ASCII-only tables use a branchless byte-wise
/// lowercase, 8 bytes at a time; otherwise fold through the Unicode
/// tables.
fn fold_key(key: &[u8], ascii: bool) -> Vec<u8> {
    if ascii && key.is_ascii() {
        let mut folded = Vec::with_capacity(key.len());
        let mut idx = 0;
        while idx + 8 <= key.len() {
            let word = arith::to_lower8(arith::load8(&key[idx..]));
            folded.extend_from_slice(&word.to_le_bytes());
            idx += 8;
        }
        for &byte in &key[idx..] {
            folded.push(byte.to_ascii_lowercase());
        }
        folded
    } else {
        String::from_utf8_lossy(key).to_lowercase().into_bytes()
    }
}

fn string_option_applies(shape: &'static Shape) -> bool {
    matches!(
        shape.kind,
        Kind::Bool
            | Kind::I8
            | Kind::I16
            | Kind::I32
            | Kind::I64
            | Kind::Isize
            | Kind::U8
            | Kind::U16
            | Kind::U32
            | Kind::U64
            | Kind::Usize
            | Kind::F32
            | Kind::F64
            | Kind::Str
            | Kind::Number
    )
}

fn unwrap_indirections(mut shape: &'static Shape) -> &'static Shape {
    loop {
        shape = match shape.kind {
            Kind::Option(def) => def.elem.get(),
            Kind::Ptr(def) => def.elem.get(),
            _ => return shape,
        };
    }
}

/// The accepted key character set: letters, digits, and a punctuation set
/// that excludes quotes, backslash and comma.
fn is_valid_key(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_alphanumeric() || "!#$%&()*+-./:;<=>?@[]^_{|}~ ".contains(ch))
}

/// Walk the embedded-field hops to the field's containing struct,
/// allocating `None` options and fresh indirections on demand.
///
/// # Safety
/// `base` must point at a valid value of the plan's struct type.
pub(crate) unsafe fn field_ptr_mut(base: *mut u8, field: &PlanField) -> *mut u8 {
    let mut ptr = base;
    for hop in &field.hops {
        ptr = ptr.add(hop.offset);
        let mut shape = hop.shape;
        loop {
            match shape.kind {
                Kind::Option(def) => {
                    let payload = (def.get)(ptr);
                    ptr = if payload.is_null() {
                        (def.insert_default)(ptr)
                    } else {
                        payload as *mut u8
                    };
                    shape = def.elem.get();
                }
                Kind::Ptr(def) => {
                    ptr = (def.get_mut)(ptr);
                    shape = def.elem.get();
                }
                _ => break,
            }
        }
    }
    ptr.add(field.offset)
}

/// Read-only hop walk; `None` when an option along the path is `None`.
///
/// # Safety
/// `base` must point at a valid value of the plan's struct type.
pub(crate) unsafe fn field_ptr(base: *const u8, field: &PlanField) -> Option<*const u8> {
    let mut ptr = base;
    for hop in &field.hops {
        ptr = ptr.add(hop.offset);
        let mut shape = hop.shape;
        loop {
            match shape.kind {
                Kind::Option(def) => {
                    let payload = (def.get)(ptr);
                    if payload.is_null() {
                        return None;
                    }
                    ptr = payload;
                    shape = def.elem.get();
                }
                Kind::Ptr(def) => {
                    ptr = (def.get)(ptr);
                    shape = def.elem.get();
                }
                _ => break,
            }
        }
    }
    Some(ptr.add(field.offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_charset_matches_contract() {
        assert!(is_valid_key("name"));
        assert!(is_valid_key("first-name"));
        assert!(is_valid_key("a b.c/d"));
        assert!(is_valid_key("ключ"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("a,b"));
        assert!(!is_valid_key("a\"b"));
        assert!(!is_valid_key("a\\b"));
    }

    #[test]
    fn fold_key_lowercases_ascii_branchlessly() {
        assert_eq!(fold_key(b"UserName_01", true), b"username_01".to_vec());
        assert_eq!(fold_key(b"ALLCAPSFIELDNAME", true), b"allcapsfieldname".to_vec());
        assert_eq!(fold_key("ÅNGSTRÖM".as_bytes(), false), "ångström".as_bytes().to_vec());
    }
}
