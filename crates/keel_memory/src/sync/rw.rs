//! Reader-writer spin lock on a single 32-bit counter.

use super::{RawLock, SyncLock};
use std::sync::atomic::{AtomicU32, Ordering};

/// Top bit of the state word marks writer ownership; the low bits count
/// active readers.
const WRITE_MODE: u32 = 1 << 31;

/// Many concurrent readers, one exclusive writer, no fairness guarantee.
///
/// Readers CAS-increment the counter while the write bit is clear; a writer
/// CAS-sets the bit only when the counter is exactly zero. The `RawLock`
/// impl is the writer side; use [`RwSpinLock::read_half`] to adapt read
/// acquisition onto the generic contract.
#[derive(Debug, Default)]
pub struct RwSpinLock {
    state: AtomicU32,
}

impl RwSpinLock {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
        }
    }

    pub fn acquire_read(&self) {
        while !self.try_acquire_read() {
            while self.state.load(Ordering::Relaxed) & WRITE_MODE != 0 {
                std::hint::spin_loop();
            }
        }
    }

    pub fn try_acquire_read(&self) -> bool {
        let state = self.state.load(Ordering::Relaxed);
        if state & WRITE_MODE != 0 {
            return false;
        }
        self.state
            .compare_exchange(state, state + 1, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn release_read(&self) {
        let prev = self.state.fetch_sub(1, Ordering::Release);
        assert!(
            prev != 0 && prev & WRITE_MODE == 0,
            "release_read without a matching acquire_read"
        );
    }

    /// Number of readers currently inside the lock. Diagnostic only; stale
    /// the moment it is read.
    pub fn reader_count(&self) -> u32 {
        self.state.load(Ordering::Relaxed) & !WRITE_MODE
    }

    /// Adapter exposing read acquisition through the `RawLock` contract.
    pub fn read_half(&self) -> ReadHalf<'_> {
        ReadHalf { inner: self }
    }
}

impl RawLock for RwSpinLock {
    fn lock(&self) {
        while !self.try_lock() {
            while self.state.load(Ordering::Relaxed) != 0 {
                std::hint::spin_loop();
            }
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        // AcqRel on success: acquire the readers' releases, and order this
        // write against a competing writer's release of WRITE_MODE.
        self.state
            .compare_exchange(0, WRITE_MODE, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    fn unlock(&self) {
        let prev = self.state.swap(0, Ordering::Release);
        assert_eq!(prev, WRITE_MODE, "unlock of an RwSpinLock not write-held");
    }
}

// SAFETY: write acquisition synchronizes with both reader and writer
// releases via the orderings above.
unsafe impl SyncLock for RwSpinLock {}

/// Maps `lock()` onto `acquire_read()` so read-side critical sections can use
/// the generic guard machinery.
#[derive(Debug, Clone, Copy)]
pub struct ReadHalf<'a> {
    inner: &'a RwSpinLock,
}

impl RawLock for ReadHalf<'_> {
    #[inline]
    fn lock(&self) {
        self.inner.acquire_read();
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.inner.try_acquire_read()
    }

    #[inline]
    fn unlock(&self) {
        self.inner.release_read();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::LockGuard;

    #[test]
    fn readers_share_writer_excludes() {
        let lock = RwSpinLock::new();

        lock.acquire_read();
        assert!(lock.try_acquire_read());
        assert_eq!(lock.reader_count(), 2);
        assert!(!lock.try_lock(), "writer must wait for readers");

        lock.release_read();
        lock.release_read();
        assert!(lock.try_lock());
        assert!(!lock.try_acquire_read(), "readers must wait for the writer");
        lock.unlock();
    }

    #[test]
    fn read_half_adapts_generic_contract() {
        let lock = RwSpinLock::new();
        {
            let read = lock.read_half();
            let _guard = LockGuard::new(&read);
            assert_eq!(lock.reader_count(), 1);
        }
        assert_eq!(lock.reader_count(), 0);
    }

    #[test]
    fn writer_visibility_across_threads() {
        let lock = RwSpinLock::new();
        let mut shared = 0u64;
        let shared_ptr = std::ptr::addr_of_mut!(shared) as usize;

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1_000 {
                        lock.lock();
                        // SAFETY: write lock held.
                        unsafe {
                            *(shared_ptr as *mut u64) += 1;
                        }
                        lock.unlock();

                        lock.acquire_read();
                        // SAFETY: read lock held, writers excluded.
                        let seen = unsafe { *(shared_ptr as *const u64) };
                        assert!(seen >= 1);
                        lock.release_read();
                    }
                });
            }
        });

        assert_eq!(shared, 4_000);
    }
}
