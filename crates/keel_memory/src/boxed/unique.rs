//! Exclusive ownership of managed allocations.

use crate::handle::AllocSource;
use crate::manager::MemoryManager;
use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

/// Exclusively owns a value constructed in manager memory.
///
/// Move-only by construction: transferring a `UniqueBox` transfers the
/// allocation with it, so at most one owner ever observes the pointer.
/// Dropping destroys the value and returns the block to its origin
/// allocator.
pub struct UniqueBox<'m, T> {
    ptr: NonNull<T>,
    source: AllocSource,
    mgr: &'m MemoryManager,
}

// SAFETY: the box is the sole owner of the pointee; the manager reference
// is Sync.
unsafe impl<T: Send> Send for UniqueBox<'_, T> {}
unsafe impl<T: Sync> Sync for UniqueBox<'_, T> {}

impl<'m, T> UniqueBox<'m, T> {
    /// # Safety
    ///
    /// `ptr` must hold a live `T` in a block allocated by `mgr` with the
    /// given `source`, with no other owner.
    pub(crate) unsafe fn from_raw_parts(
        mgr: &'m MemoryManager,
        ptr: NonNull<T>,
        source: AllocSource,
    ) -> Self {
        Self { ptr, source, mgr }
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn source(&self) -> AllocSource {
        self.source
    }

    /// Give up ownership without destroying the value. The caller becomes
    /// responsible for dropping the pointee and freeing the block through
    /// the manager.
    pub fn into_raw(self) -> (NonNull<T>, AllocSource) {
        let this = ManuallyDrop::new(self);
        (this.ptr, this.source)
    }
}

impl<T> Deref for UniqueBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: exclusive owner of a live value.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for UniqueBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: exclusive owner of a live value.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: fmt::Debug> fmt::Debug for UniqueBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T> Drop for UniqueBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: sole owner; the value is live until this point.
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
        }
        self.mgr.free_raw(self.ptr.cast(), self.source);
    }
}

/// Exclusively owns a slice of values in one managed block.
///
/// The distinct type keeps the array destruction path (drop every element)
/// separate from the scalar one.
pub struct UniqueSlice<'m, T> {
    ptr: NonNull<T>,
    len: usize,
    source: AllocSource,
    mgr: &'m MemoryManager,
}

// SAFETY: as for UniqueBox.
unsafe impl<T: Send> Send for UniqueSlice<'_, T> {}
unsafe impl<T: Sync> Sync for UniqueSlice<'_, T> {}

impl<'m, T> UniqueSlice<'m, T> {
    /// # Safety
    ///
    /// `ptr` must hold `len` live `T`s in a block allocated by `mgr` with
    /// the given `source`, with no other owner.
    pub(crate) unsafe fn from_raw_parts(
        mgr: &'m MemoryManager,
        ptr: NonNull<T>,
        len: usize,
        source: AllocSource,
    ) -> Self {
        Self {
            ptr,
            len,
            source,
            mgr,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Deref for UniqueSlice<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: exclusive owner of len live elements.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> DerefMut for UniqueSlice<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: exclusive owner of len live elements.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: fmt::Debug> fmt::Debug for UniqueSlice<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T> Drop for UniqueSlice<'_, T> {
    fn drop(&mut self) {
        // SAFETY: sole owner; every element is live.
        unsafe {
            ptr::drop_in_place(std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len));
        }
        self.mgr.free_raw(self.ptr.cast(), self.source);
    }
}

#[cfg(test)]
mod tests {
    use crate::manager::{MemoryManagerDesc, PoolSpec};
    use crate::MemoryManager;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn manager() -> MemoryManager {
        MemoryManager::new(MemoryManagerDesc {
            frame_arena_size: 1024,
            frames_in_flight: 1,
            pools: vec![PoolSpec {
                block_size: 64,
                block_count: 32,
            }],
        })
        .unwrap()
    }

    struct DropProbe(Arc<AtomicUsize>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn owns_and_mutates() {
        let mgr = manager();
        let mut boxed = mgr.make_unique(41u32);
        *boxed += 1;
        assert_eq!(*boxed, 42);
        drop(boxed);
        assert_eq!(mgr.allocated_size(), 0);
    }

    #[test]
    fn move_transfers_without_double_free() {
        let mgr = manager();
        let drops = Arc::new(AtomicUsize::new(0));

        let a = mgr.make_unique(DropProbe(drops.clone()));
        let ptr_before = a.as_ptr();
        let b = a; // move; `a` is statically dead from here
        assert_eq!(b.as_ptr(), ptr_before);

        drop(b);
        assert_eq!(drops.load(Ordering::SeqCst), 1, "destroyed exactly once");
        assert_eq!(mgr.allocated_size(), 0);
    }

    #[test]
    fn into_raw_defers_destruction() {
        let mgr = manager();
        let drops = Arc::new(AtomicUsize::new(0));

        let boxed = mgr.make_unique(DropProbe(drops.clone()));
        let (ptr, source) = boxed.into_raw();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        // SAFETY: ptr holds a live DropProbe from into_raw.
        unsafe {
            std::ptr::drop_in_place(ptr.as_ptr());
        }
        mgr.free_raw(ptr.cast(), source);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.allocated_size(), 0);
    }

    #[test]
    fn slice_drops_every_element() {
        let mgr = manager();
        let drops = Arc::new(AtomicUsize::new(0));

        let slice = mgr.make_unique_slice_with(4, |_| DropProbe(drops.clone()));
        assert_eq!(slice.len(), 4);
        drop(slice);
        assert_eq!(drops.load(Ordering::SeqCst), 4);
        assert_eq!(mgr.allocated_size(), 0);
    }

    #[test]
    fn slice_is_indexable() {
        let mgr = manager();
        let mut slice = mgr.make_unique_slice_with(8, |i| i as u32 * 3);
        assert_eq!(slice[5], 15);
        slice[5] = 99;
        assert_eq!(slice.iter().copied().max(), Some(99));
    }
}
