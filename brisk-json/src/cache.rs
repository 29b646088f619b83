//! Sharded codec cache.
//!
//! Cells are keyed by type identity across 16 shards. Each shard holds an
//! immutable snapshot map: readers clone the snapshot `Arc` under a
//! momentary read lock, writers copy the map, insert, and swap the
//! snapshot. A cell is published *before* its codecs are compiled, so a
//! recursive compilation finds the in-progress cell instead of recursing
//! forever; concurrent duplicate compilations are benign — the first
//! stored codec wins and the rest are dropped.

use core::any::TypeId;
use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};
use std::sync::{Arc, OnceLock};

use brisk_core::Shape;
use parking_lot::RwLock;

use crate::dec::DecCodec;
use crate::enc::EncCodec;
use crate::plan::Plan;

const SHARDS: usize = 16;

pub(crate) struct CodecCell {
    pub(crate) shape: &'static Shape,
    pub(crate) dec: OnceLock<DecCodec>,
    pub(crate) enc: OnceLock<EncCodec>,
    pub(crate) plan: OnceLock<Arc<Plan>>,
}

struct Shard {
    map: RwLock<Arc<HashMap<TypeId, Arc<CodecCell>>>>,
}

struct Cache {
    shards: [Shard; SHARDS],
    hasher: RandomState,
}

fn cache() -> &'static Cache {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE.get_or_init(|| Cache {
        shards: std::array::from_fn(|_| Shard {
            map: RwLock::new(Arc::new(HashMap::new())),
        }),
        hasher: RandomState::new(),
    })
}

/// The cache cell for a shape, created on first sight.
pub(crate) fn cell_for(shape: &'static Shape) -> Arc<CodecCell> {
    let cache = cache();
    let id = shape.id();
    let shard = &cache.shards[(cache.hasher.hash_one(id) as usize) & (SHARDS - 1)];

    let snapshot = shard.map.read().clone();
    if let Some(cell) = snapshot.get(&id) {
        return cell.clone();
    }

    let cell = Arc::new(CodecCell {
        shape,
        dec: OnceLock::new(),
        enc: OnceLock::new(),
        plan: OnceLock::new(),
    });
    let mut guard = shard.map.write();
    if let Some(existing) = guard.get(&id) {
        return existing.clone();
    }
    let mut next: HashMap<TypeId, Arc<CodecCell>> = (**guard).clone();
    next.insert(id, cell.clone());
    *guard = Arc::new(next);
    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use brisk_core::shape_of;

    #[test]
    fn cells_are_interned_per_type() {
        let first = cell_for(shape_of::<Vec<i64>>());
        let second = cell_for(shape_of::<Vec<i64>>());
        assert!(Arc::ptr_eq(&first, &second));
        let other = cell_for(shape_of::<Vec<u64>>());
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn concurrent_lookups_converge() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| Arc::as_ptr(&cell_for(shape_of::<Vec<String>>())) as usize))
            .collect();
        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.join().expect("thread panicked"));
        }
        assert!(seen.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
