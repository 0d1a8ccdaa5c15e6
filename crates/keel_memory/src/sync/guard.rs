//! Scope-bound lock acquisition.

use super::RawLock;

/// RAII guard: acquires on construction, releases on drop.
pub struct LockGuard<'a, L: RawLock> {
    lock: &'a L,
}

impl<'a, L: RawLock> LockGuard<'a, L> {
    pub fn new(lock: &'a L) -> Self {
        lock.lock();
        Self { lock }
    }

    pub fn try_new(lock: &'a L) -> Option<Self> {
        // Lazily built: constructing a guard on a failed attempt would
        // unlock on drop.
        lock.try_lock().then(|| Self { lock })
    }

    /// Wrap a lock the caller has already acquired.
    fn adopt(lock: &'a L) -> Self {
        Self { lock }
    }
}

impl<L: RawLock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// Acquire two locks without a fixed global order.
///
/// Lock-first / try-lock-second; on failure release and retry with the
/// roles swapped. Two threads taking the same pair in opposite order cannot
/// deadlock, since neither ever blocks while holding the other lock.
pub fn lock_pair<'a, A: RawLock, B: RawLock>(
    a: &'a A,
    b: &'a B,
) -> (LockGuard<'a, A>, LockGuard<'a, B>) {
    loop {
        a.lock();
        if b.try_lock() {
            return (LockGuard::adopt(a), LockGuard::adopt(b));
        }
        a.unlock();
        std::hint::spin_loop();

        b.lock();
        if a.try_lock() {
            return (LockGuard::adopt(a), LockGuard::adopt(b));
        }
        b.unlock();
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SpinLock;

    #[test]
    fn guard_releases_on_drop() {
        let lock = SpinLock::new();
        {
            let _guard = LockGuard::new(&lock);
            assert!(lock.is_locked());
            assert!(LockGuard::try_new(&lock).is_none());
        }
        assert!(!lock.is_locked());
        assert!(LockGuard::try_new(&lock).is_some());
    }

    #[test]
    fn opposite_order_acquisition_makes_progress() {
        let a = SpinLock::new();
        let b = SpinLock::new();

        std::thread::scope(|s| {
            let (a, b) = (&a, &b);
            for flip in 0..2 {
                s.spawn(move || {
                    for _ in 0..5_000 {
                        if flip == 0 {
                            let _guards = lock_pair(a, b);
                        } else {
                            let _guards = lock_pair(b, a);
                        }
                    }
                });
            }
        });

        assert!(!a.is_locked());
        assert!(!b.is_locked());
    }
}
