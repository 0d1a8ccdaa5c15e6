//! Recursive spin lock keyed on a hash of the owning thread's id.

use super::{RawLock, SyncLock};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

const UNOWNED: u64 = 0;

/// A spin lock the owning thread may re-acquire.
///
/// One atomic word stores the owner's thread-id hash (0 = unlocked). The
/// reentrancy depth is deliberately non-atomic: only the owner ever reads or
/// writes it, and ownership itself is what the atomic word arbitrates.
#[derive(Debug, Default)]
pub struct ReentrantLock {
    owner: AtomicU64,
    depth: UnsafeCell<u32>,
}

// SAFETY: `depth` is only touched by the thread whose id hash is published
// in `owner`, which is acquired/released with the proper orderings.
unsafe impl Send for ReentrantLock {}
unsafe impl Sync for ReentrantLock {}

fn current_thread_hash() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    // Never collides with UNOWNED.
    hasher.finish() | 1
}

impl ReentrantLock {
    pub const fn new() -> Self {
        Self {
            owner: AtomicU64::new(UNOWNED),
            depth: UnsafeCell::new(0),
        }
    }

    /// True if the calling thread currently owns the lock.
    pub fn held_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == current_thread_hash()
    }

    /// Current reentrancy depth. Only meaningful to the owner.
    pub fn depth(&self) -> u32 {
        if self.held_by_current_thread() {
            // SAFETY: we are the owner, so nobody else touches `depth`.
            unsafe { *self.depth.get() }
        } else {
            0
        }
    }
}

impl RawLock for ReentrantLock {
    fn lock(&self) {
        let tid = current_thread_hash();
        // Relaxed is enough here: only the owner can observe its own hash,
        // and the owner needs no synchronization with itself.
        if self.owner.load(Ordering::Relaxed) == tid {
            // SAFETY: owner-only access, see struct invariant.
            unsafe {
                *self.depth.get() += 1;
            }
            return;
        }

        loop {
            match self
                .owner
                .compare_exchange_weak(UNOWNED, tid, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(_) => std::hint::spin_loop(),
            }
        }
        // SAFETY: we just became the owner.
        unsafe {
            *self.depth.get() = 1;
        }
    }

    fn try_lock(&self) -> bool {
        let tid = current_thread_hash();
        if self.owner.load(Ordering::Relaxed) == tid {
            // SAFETY: owner-only access.
            unsafe {
                *self.depth.get() += 1;
            }
            return true;
        }

        if self
            .owner
            .compare_exchange(UNOWNED, tid, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            // SAFETY: we just became the owner.
            unsafe {
                *self.depth.get() = 1;
            }
            true
        } else {
            false
        }
    }

    fn unlock(&self) {
        let tid = current_thread_hash();
        assert_eq!(
            self.owner.load(Ordering::Relaxed),
            tid,
            "unlock of a ReentrantLock by a non-owner thread"
        );
        // SAFETY: owner-only access.
        let depth = unsafe {
            let depth = self.depth.get();
            assert!(*depth > 0, "unlock of a ReentrantLock that was not held");
            *depth -= 1;
            *depth
        };
        if depth == 0 {
            self.owner.store(UNOWNED, Ordering::Release);
        }
    }
}

// SAFETY: final unlock stores with release ordering, acquisition with
// acquire ordering.
unsafe impl SyncLock for ReentrantLock {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reacquire_increments_depth() {
        let lock = ReentrantLock::new();
        lock.lock();
        lock.lock();
        assert!(lock.try_lock());
        assert_eq!(lock.depth(), 3);

        lock.unlock();
        lock.unlock();
        assert!(lock.held_by_current_thread());
        lock.unlock();
        assert!(!lock.held_by_current_thread());
    }

    #[test]
    fn other_thread_blocked_while_held() {
        let lock = ReentrantLock::new();
        lock.lock();
        std::thread::scope(|s| {
            let handle = s.spawn(|| lock.try_lock());
            assert!(!handle.join().unwrap());
        });
        lock.unlock();

        std::thread::scope(|s| {
            let handle = s.spawn(|| {
                let ok = lock.try_lock();
                if ok {
                    lock.unlock();
                }
                ok
            });
            assert!(handle.join().unwrap());
        });
    }

    #[test]
    fn non_owner_unlock_asserts() {
        let lock = ReentrantLock::new();
        lock.lock();
        std::thread::scope(|s| {
            let result = s.spawn(|| lock.unlock()).join();
            assert!(result.is_err(), "non-owner unlock must assert");
        });
        lock.unlock();
    }
}
