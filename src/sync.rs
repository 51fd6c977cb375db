//! Spin locks and the sparse lock collection guarding the state table.
//!
//! The state table has one logical lock per contiguous range of buckets,
//! far fewer locks than buckets: a per-bucket lock would cost more memory
//! than the 6-bit payload it guards.

use std::sync::atomic::{AtomicBool, Ordering};

// ---------------------------------------------------------------------------
// SpinLock
// ---------------------------------------------------------------------------

/// A minimal test-and-set spin lock with acquire/release semantics.
///
/// Critical sections under this lock are a handful of word operations, so
/// spinning beats parking.
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Acquire the lock, spinning until it is free.
    pub fn lock(&self) -> SpinLockGuard<'_> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
        SpinLockGuard { lock: self }
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard; releases the lock on drop, on every exit path.
pub struct SpinLockGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// SparseLock
// ---------------------------------------------------------------------------

/// A collection of spin locks sparsely distributed over an index range.
///
/// Each lock guards a contiguous, power-of-two sized range of indices:
/// `lock_id(idx) = idx >> lg(per_lock_range)`.
pub struct SparseLock {
    lg_per_lock_range: u32,
    locks: Vec<SpinLock>,
}

impl SparseLock {
    /// A sparse lock collection of (at most) `lock_count` locks covering
    /// `range_size` indices.
    pub fn new(range_size: usize, lock_count: usize) -> Self {
        assert!(lock_count > 0);
        let per_lock = range_size.div_ceil(lock_count).max(1);
        let lg_per_lock_range = per_lock.ilog2();
        let per_lock_range = 1usize << lg_per_lock_range;
        let num_locks = range_size.div_ceil(per_lock_range).max(1);
        let locks = (0..num_locks).map(|_| SpinLock::new()).collect();
        Self {
            lg_per_lock_range,
            locks,
        }
    }

    #[inline]
    fn lock_id(&self, idx: usize) -> usize {
        idx >> self.lg_per_lock_range
    }

    /// Acquire the lock guarding index `idx`.
    #[inline]
    pub fn guard(&self, idx: usize) -> SpinLockGuard<'_> {
        self.locks[self.lock_id(idx)].lock()
    }

    /// Acquire the lock(s) guarding the two indices, in ascending lock-id
    /// order, taking a lock only once when both indices alias to it.
    pub fn guard_pair(&self, a: usize, b: usize) -> (SpinLockGuard<'_>, Option<SpinLockGuard<'_>>) {
        let (lo, hi) = {
            let (la, lb) = (self.lock_id(a), self.lock_id(b));
            if la <= lb { (la, lb) } else { (lb, la) }
        };
        let first = self.locks[lo].lock();
        let second = (hi != lo).then(|| self.locks[hi].lock());
        (first, second)
    }

    /// Number of locks in the collection.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
