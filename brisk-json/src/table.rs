//! Perfect-hash key tables for struct field lookup.
//!
//! Each table is a power-of-two slot array sized at least one past the key
//! count. Placement tries up to 100 seeds of a seeded FNV-1a; if no seed
//! places every key without collision the table doubles and the search
//! restarts. Because placement is perfect, lookup compares only the stored
//! 64-bit hash — never the key bytes.

use log::debug;

const FNV_OFFSET: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;

const SEED_ATTEMPTS: u64 = 100;

#[derive(Clone, Copy, Default)]
struct Slot {
    hash: u64,
    idx: u32,
}

pub(crate) struct Table {
    slots: Box<[Slot]>,
    mask: u64,
    seed: u64,
}

impl Table {
    /// Build a perfect table over `(key, index)` pairs. Keys must be
    /// distinct. `seed0` makes the search deterministic per caller.
    pub(crate) fn build(keys: &[(Vec<u8>, u32)], seed0: u64) -> Table {
        let mut size = (keys.len() + 1).next_power_of_two();
        loop {
            'seed: for attempt in 0..SEED_ATTEMPTS {
                let seed = fnv(seed0 ^ FNV_OFFSET, &attempt.to_le_bytes());
                let mask = size as u64 - 1;
                let mut slots = vec![Slot::default(); size].into_boxed_slice();
                for (key, idx) in keys {
                    let hash = fnv(seed, key);
                    if hash == 0 {
                        continue 'seed;
                    }
                    let slot = &mut slots[(hash & mask) as usize];
                    if slot.hash != 0 {
                        continue 'seed;
                    }
                    *slot = Slot { hash, idx: *idx };
                }
                return Table { slots, mask, seed };
            }
            size <<= 1;
            debug!("field table collision pressure; doubling to {size} slots");
        }
    }

    /// Perfect-hash lookup: a single comparison against the stored hash.
    #[inline]
    pub(crate) fn get(&self, key: &[u8]) -> Option<u32> {
        let hash = fnv(self.seed, key);
        let slot = &self.slots[(hash & self.mask) as usize];
        (slot.hash == hash).then_some(slot.idx)
    }
}

fn fnv(seed: u64, mut word: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET ^ seed;
    while word.len() >= 8 {
        for &byte in &word[..8] {
            hash = (hash ^ byte as u64).wrapping_mul(FNV_PRIME);
        }
        word = &word[8..];
    }
    for &byte in word {
        hash = (hash ^ byte as u64).wrapping_mul(FNV_PRIME);
    }
    hash
}
