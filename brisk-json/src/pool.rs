//! Size-bucketed reuse of scratch byte buffers.
//!
//! Buffers are parked in power-of-two buckets keyed by capacity. Every
//! acquisition is paired with a release on all exit paths; a buffer whose
//! capacity outgrew the largest bucket is simply dropped.

use parking_lot::Mutex;

const SHIFT: usize = 10;
/// Smallest pooled capacity, and the reader's minimum free space.
pub(crate) const MIN: usize = 1 << SHIFT;
const BUCKETS: usize = 16;
const PER_BUCKET: usize = 8;

static POOL: [Mutex<Vec<Vec<u8>>>; BUCKETS] = [const { Mutex::new(Vec::new()) }; BUCKETS];

fn bucket_index(size: usize) -> usize {
    let div = size >> SHIFT;
    let mut idx = (usize::BITS - div.leading_zeros()) as usize;
    if div != 0 && size & (MIN - 1) == 0 {
        idx -= 1;
    }
    idx
}

/// An empty buffer with capacity at least `max(size, MIN)`.
pub(crate) fn get(size: usize) -> Vec<u8> {
    let want = size.max(MIN);
    let idx = bucket_index(want);
    if idx < BUCKETS {
        let mut bucket = POOL[idx].lock();
        while let Some(buf) = bucket.pop() {
            if buf.capacity() >= want {
                return buf;
            }
        }
    }
    Vec::with_capacity(want)
}

/// Return a buffer to its bucket.
pub(crate) fn put(mut buf: Vec<u8>) {
    let idx = bucket_index(buf.capacity());
    if buf.capacity() < MIN || idx >= BUCKETS {
        return;
    }
    buf.clear();
    let mut bucket = POOL[idx].lock();
    if bucket.len() < PER_BUCKET {
        bucket.push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_buckets() {
        let mut buf = get(MIN);
        assert!(buf.capacity() >= MIN);
        buf.extend_from_slice(b"junk");
        let cap = buf.capacity();
        put(buf);
        let again = get(cap);
        assert!(again.is_empty());
        assert!(again.capacity() >= cap);
    }

    #[test]
    fn bucket_index_is_power_of_two_aligned() {
        assert_eq!(bucket_index(MIN), 0);
        assert_eq!(bucket_index(MIN + 1), 1);
        assert_eq!(bucket_index(MIN * 2), 1);
        assert_eq!(bucket_index(MIN * 4), 2);
    }
}
