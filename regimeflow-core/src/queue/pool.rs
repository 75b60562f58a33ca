//! Fixed-size object pool with a mutex-guarded free list and geometric
//! chunk growth (§4.2).
//!
//! The growth rule is explicit doubling from the initial chunk size: the
//! first refill allocates 1024 objects, each subsequent refill allocates
//! twice the previous chunk's size. This resolves the ambiguity flagged in
//! spec §9 ("the existing growth function conflates requested capacity with
//! next chunk size") by tracking the next chunk size as independent state
//! rather than deriving it from a caller-supplied capacity.

use parking_lot::Mutex;

const INITIAL_CHUNK: usize = 1024;

/// A pool of pre-constructed `T::default()` objects. `allocate` pops a free
/// slot (growing the pool first if none are free); `deallocate` pushes a
/// slot back. Callers are responsible for resetting an object's contents
/// before reuse if `Default` doesn't already leave it in a usable state.
pub struct Pool<T: Default> {
    free: Mutex<Vec<Box<T>>>,
    next_chunk: Mutex<usize>,
}

impl<T: Default> Pool<T> {
    pub fn new() -> Self {
        let pool = Self {
            free: Mutex::new(Vec::new()),
            next_chunk: Mutex::new(INITIAL_CHUNK),
        };
        pool.grow();
        pool
    }

    fn grow(&self) {
        let mut next_chunk = self.next_chunk.lock();
        let chunk_size = *next_chunk;
        let mut free = self.free.lock();
        free.reserve(chunk_size);
        for _ in 0..chunk_size {
            free.push(Box::new(T::default()));
        }
        *next_chunk = chunk_size.saturating_mul(2);
    }

    /// Allocation failure is treated as fatal by callers per §4.1; this
    /// pool itself never reports "full" because it grows on demand.
    pub fn allocate(&self) -> Box<T> {
        loop {
            if let Some(obj) = self.free.lock().pop() {
                return obj;
            }
            self.grow();
        }
    }

    pub fn deallocate(&self, obj: Box<T>) {
        self.free.lock().push(obj);
    }

    /// Number of objects currently sitting idle in the free list.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }
}

impl<T: Default> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Slot {
        value: u64,
    }

    #[test]
    fn allocate_and_deallocate_round_trip() {
        let pool = Pool::<Slot>::new();
        let before = pool.available();
        let mut obj = pool.allocate();
        obj.value = 42;
        assert_eq!(pool.available(), before - 1);
        pool.deallocate(obj);
        assert_eq!(pool.available(), before);
    }

    #[test]
    fn grows_by_doubling_from_initial_chunk() {
        let pool = Pool::<Slot>::new();
        assert_eq!(pool.available(), INITIAL_CHUNK);

        let drained: Vec<_> = (0..INITIAL_CHUNK).map(|_| pool.allocate()).collect();
        assert_eq!(pool.available(), 0);

        // one more allocation forces a refill; the refill chunk is 2x the
        // initial chunk, so after taking one object 2*INITIAL_CHUNK - 1
        // remain.
        let extra = pool.allocate();
        assert_eq!(pool.available(), INITIAL_CHUNK * 2 - 1);

        drop(drained);
        drop(extra);
    }

    #[test]
    fn never_reports_full() {
        let pool = Pool::<Slot>::new();
        for _ in 0..(INITIAL_CHUNK * 3 + 7) {
            let _ = pool.allocate();
        }
        // no panic, no Option::None — allocation just keeps succeeding
    }
}
