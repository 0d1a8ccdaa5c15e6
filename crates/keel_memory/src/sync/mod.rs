//! Lock primitives used to make shared ownership safe under multithreaded
//! access.
//!
//! Every lock exposes the same `lock`/`try_lock`/`unlock` contract via
//! [`RawLock`], so call sites can pick their synchronization cost at compile
//! time: [`NullLock`] strips locking entirely for single-threaded use,
//! [`SpinLock`]/[`ReentrantLock`]/[`RwSpinLock`] busy-wait with explicit
//! memory ordering. None of them sleep; callers must keep critical sections
//! short (allocation bookkeeping, refcount mutation).

mod guard;
mod mutex;
mod reentrant;
mod rw;
mod spin;

pub use guard::{lock_pair, LockGuard};
pub use mutex::{Mutex, MutexGuard};
pub use reentrant::ReentrantLock;
pub use rw::{ReadHalf, RwSpinLock};
pub use spin::SpinLock;

/// Uniform mutual-exclusion contract.
///
/// `lock` spins until acquisition, `try_lock` is a single non-blocking
/// attempt, `unlock` releases. Unlocking a lock the caller does not hold is
/// a contract violation and asserts where the lock can detect it.
pub trait RawLock {
    fn lock(&self);
    fn try_lock(&self) -> bool;
    fn unlock(&self);
}

/// Marker for locks that actually synchronize between threads.
///
/// # Safety
///
/// Implementors must guarantee that writes made before `unlock` are visible
/// to any thread that subsequently succeeds in `lock`/`try_lock`. `NullLock`
/// deliberately does not implement this, which is what keeps
/// `SharedBox<T, NullLock>` confined to one thread.
pub unsafe trait SyncLock: RawLock + Sync {}

/// A lock that does nothing. Statically strips locking overhead for
/// single-threaded call sites.
#[derive(Debug, Default)]
pub struct NullLock;

impl RawLock for NullLock {
    #[inline]
    fn lock(&self) {}

    #[inline]
    fn try_lock(&self) -> bool {
        true
    }

    #[inline]
    fn unlock(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_lock_always_succeeds() {
        let lock = NullLock;
        assert!(lock.try_lock());
        lock.lock();
        lock.unlock();
        assert!(lock.try_lock());
    }
}
