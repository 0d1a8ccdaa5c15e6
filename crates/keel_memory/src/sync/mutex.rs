//! Data-carrying wrapper over a [`RawLock`].

use super::{RawLock, SpinLock, SyncLock};
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

/// Pairs a value with the lock that guards it, generic over the lock type so
/// the synchronization cost is chosen at compile time.
pub struct Mutex<T, L: RawLock = SpinLock> {
    lock: L,
    value: UnsafeCell<T>,
}

// SAFETY: the value only moves between threads with the Mutex itself.
unsafe impl<T: Send, L: RawLock + Send> Send for Mutex<T, L> {}
// SAFETY: shared access requires a lock that really synchronizes; gating on
// `SyncLock` keeps `Mutex<T, NullLock>` out of cross-thread use.
unsafe impl<T: Send, L: SyncLock> Sync for Mutex<T, L> {}

impl<T, L: RawLock + Default> Mutex<T, L> {
    pub fn new(value: T) -> Self {
        Self {
            lock: L::default(),
            value: UnsafeCell::new(value),
        }
    }
}

impl<T, L: RawLock> Mutex<T, L> {
    pub fn lock(&self) -> MutexGuard<'_, T, L> {
        self.lock.lock();
        MutexGuard { mutex: self }
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, L>> {
        // Lazily built: constructing a guard on a failed attempt would
        // unlock on drop.
        self.lock.try_lock().then(|| MutexGuard { mutex: self })
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

pub struct MutexGuard<'a, T, L: RawLock> {
    mutex: &'a Mutex<T, L>,
}

impl<T, L: RawLock> Deref for MutexGuard<'_, T, L> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T, L: RawLock> DerefMut for MutexGuard<'_, T, L> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock exclusively.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T, L: RawLock> Drop for MutexGuard<'_, T, L> {
    fn drop(&mut self) {
        self.mutex.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ReentrantLock;

    #[test]
    fn serializes_mutation() {
        let counter: Mutex<usize> = Mutex::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1_000 {
                        *counter.lock() += 1;
                    }
                });
            }
        });

        assert_eq!(*counter.lock(), 8_000);
    }

    #[test]
    fn try_lock_respects_holder() {
        let m: Mutex<u32> = Mutex::new(7);
        let guard = m.lock();
        assert!(m.try_lock().is_none());
        drop(guard);
        assert_eq!(*m.try_lock().unwrap(), 7);
    }

    #[test]
    fn works_over_any_raw_lock() {
        let m: Mutex<Vec<u32>, ReentrantLock> = Mutex::new(Vec::new());
        m.lock().push(1);
        m.lock().push(2);
        assert_eq!(m.lock().len(), 2);
    }
}
