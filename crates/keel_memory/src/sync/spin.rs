//! Test-and-set spin lock.

use super::{RawLock, SyncLock};
use std::sync::atomic::{AtomicBool, Ordering};

/// One atomic flag, no fairness guarantee.
///
/// Livelock is possible under pathological contention; accepted for the
/// short critical sections this subsystem uses it for.
#[derive(Debug, Default)]
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl RawLock for SpinLock {
    fn lock(&self) {
        while !self.try_lock() {
            // Test before retrying the RMW so contended waiters spin on a
            // shared cache line instead of hammering exclusive ownership.
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        !self.locked.swap(true, Ordering::Acquire)
    }

    #[inline]
    fn unlock(&self) {
        let was_locked = self.locked.swap(false, Ordering::Release);
        debug_assert!(was_locked, "unlock of a SpinLock that was not held");
    }
}

// SAFETY: acquire on lock / release on unlock establishes the critical
// section discipline RawLock requires.
unsafe impl SyncLock for SpinLock {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn try_lock_fails_while_held() {
        let lock = SpinLock::new();
        assert!(lock.try_lock());
        assert!(!lock.try_lock());
        lock.unlock();
        assert!(lock.try_lock());
        lock.unlock();
    }

    #[test]
    fn try_lock_observed_from_second_thread() {
        let lock = SpinLock::new();
        let attempted = AtomicBool::new(false);
        let release = AtomicBool::new(false);

        lock.lock();
        std::thread::scope(|s| {
            let observer = s.spawn(|| {
                // Held by the main thread until `attempted` is published.
                let first = lock.try_lock();
                attempted.store(true, Ordering::Release);
                while !release.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                // Released by now; acquisition must succeed.
                lock.lock();
                lock.unlock();
                first
            });

            while !attempted.load(Ordering::Acquire) {
                std::hint::spin_loop();
            }
            lock.unlock();
            release.store(true, Ordering::Release);
            assert!(!observer.join().unwrap());
        });
    }

    #[test]
    fn critical_section_excludes_writers() {
        let lock = SpinLock::new();
        let mut counter = 0usize;
        let counter_ptr = std::ptr::addr_of_mut!(counter) as usize;

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..10_000 {
                        lock.lock();
                        // SAFETY: mutation only happens while holding the lock.
                        unsafe {
                            *(counter_ptr as *mut usize) += 1;
                        }
                        lock.unlock();
                    }
                });
            }
        });

        assert_eq!(counter, 40_000);
    }
}
