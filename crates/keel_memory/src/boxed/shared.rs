//! Shared ownership through a manager-allocated control block.

use crate::handle::AllocSource;
use crate::manager::MemoryManager;
use crate::sync::{NullLock, RawLock, SyncLock};
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;

/// Out-of-line state every `SharedBox` clone points at: the owned value, the
/// strong count, and the lock serializing count mutation.
pub(crate) struct ControlBlock<T, L: RawLock> {
    refs: UnsafeCell<usize>,
    lock: L,
    value: ManuallyDrop<T>,
}

impl<T, L: RawLock + Default> ControlBlock<T, L> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            refs: UnsafeCell::new(1),
            lock: L::default(),
            value: ManuallyDrop::new(value),
        }
    }
}

/// Shared ownership of a value in manager memory.
///
/// The refcount lock is a compile-time parameter: `SharedBox<T>` defaults to
/// [`NullLock`] and pays no synchronization cost, which also keeps it off
/// other threads; instantiate with a real lock ([`SpinLock`],
/// [`ReentrantLock`], ...) to make clone/drop individually thread-safe.
/// Concurrent access to the pointee itself is never implied.
///
/// [`SpinLock`]: crate::sync::SpinLock
/// [`ReentrantLock`]: crate::sync::ReentrantLock
pub struct SharedBox<'m, T, L: RawLock = NullLock> {
    ctrl: NonNull<ControlBlock<T, L>>,
    source: AllocSource,
    mgr: &'m MemoryManager,
}

// SAFETY: crossing threads requires a lock that really synchronizes the
// refcount (SyncLock excludes NullLock); the value moves/drops on the last
// owner's thread (T: Send) and is readable from any owner (T: Sync).
unsafe impl<T: Send + Sync, L: SyncLock> Send for SharedBox<'_, T, L> {}
unsafe impl<T: Send + Sync, L: SyncLock> Sync for SharedBox<'_, T, L> {}

impl<'m, T, L: RawLock> SharedBox<'m, T, L> {
    /// # Safety
    ///
    /// `ctrl` must hold a live control block allocated by `mgr` with the
    /// given `source`, whose refcount already accounts for this instance.
    pub(crate) unsafe fn from_raw_parts(
        mgr: &'m MemoryManager,
        ctrl: NonNull<ControlBlock<T, L>>,
        source: AllocSource,
    ) -> Self {
        Self { ctrl, source, mgr }
    }

    /// Number of live `SharedBox` instances referencing the control block.
    pub fn use_count(&self) -> usize {
        let ctrl = self.ctrl.as_ptr();
        // SAFETY: control block is live while this instance exists; the
        // count is only read under its lock.
        unsafe {
            (*ctrl).lock.lock();
            let count = *(*ctrl).refs.get();
            (*ctrl).lock.unlock();
            count
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        // SAFETY: control block is live.
        unsafe { &*(*self.ctrl.as_ptr()).value as *const T }
    }
}

impl<T, L: RawLock> Clone for SharedBox<'_, T, L> {
    fn clone(&self) -> Self {
        let ctrl = self.ctrl.as_ptr();
        // SAFETY: control block is live; count mutation under its lock.
        unsafe {
            (*ctrl).lock.lock();
            *(*ctrl).refs.get() += 1;
            (*ctrl).lock.unlock();
        }
        Self {
            ctrl: self.ctrl,
            source: self.source,
            mgr: self.mgr,
        }
    }
}

impl<T, L: RawLock> Deref for SharedBox<'_, T, L> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the value is live until the last owner drops.
        unsafe { &(*self.ctrl.as_ptr()).value }
    }
}

impl<T: fmt::Debug, L: RawLock> fmt::Debug for SharedBox<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T, L: RawLock> Drop for SharedBox<'_, T, L> {
    fn drop(&mut self) {
        let ctrl = self.ctrl.as_ptr();
        // SAFETY: control block is live; count mutation under its lock.
        let last = unsafe {
            (*ctrl).lock.lock();
            let refs = (*ctrl).refs.get();
            debug_assert!(*refs > 0, "refcount underflow");
            *refs -= 1;
            let last = *refs == 0;
            (*ctrl).lock.unlock();
            last
        };

        if last {
            // SAFETY: final owner; no other instance can observe the block,
            // and the lock release above synchronized with every clone.
            unsafe {
                ManuallyDrop::drop(&mut (*ctrl).value);
            }
            self.mgr.free_raw(self.ctrl.cast(), self.source);
        }
    }
}
