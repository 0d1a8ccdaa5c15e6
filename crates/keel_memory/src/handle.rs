//! Copyable locators for manager-owned blocks.

use std::ptr::{self, NonNull};

/// Which allocator inside the manager a block came from.
///
/// Carried alongside every managed pointer so deallocation routes by an
/// explicit discriminant instead of probing address ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocSource {
    /// Block from the pool bank; the payload indexes the size-class table.
    Pool(u32),
    /// Fallback allocation from the process allocator.
    System,
}

/// An indirect, copyable token referencing a manager-owned block.
///
/// A handle is a *locator*, not an owner: copying one duplicates the
/// reference, never the memory, and the caller is responsible for routing it
/// through [`MemoryManager::free_handle`](crate::MemoryManager::free_handle)
/// exactly once. Decouples "owns memory" from "owns object lifetime" for
/// two-phase allocate-then-construct flows.
#[derive(Debug, Clone, Copy)]
pub struct RawHandle {
    ptr: Option<NonNull<u8>>,
    source: AllocSource,
}

impl RawHandle {
    pub(crate) fn new(ptr: NonNull<u8>, source: AllocSource) -> Self {
        Self {
            ptr: Some(ptr),
            source,
        }
    }

    /// A handle referencing nothing.
    pub const fn invalid() -> Self {
        Self {
            ptr: None,
            source: AllocSource::System,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.ptr.is_some()
    }

    #[inline]
    pub fn get(&self) -> Option<NonNull<u8>> {
        self.ptr
    }

    #[inline]
    pub fn source(&self) -> AllocSource {
        self.source
    }

    /// Reinterpret the cached pointer. Null when the handle is invalid.
    #[inline]
    pub fn get_as<T>(&self) -> *mut T {
        self.ptr.map_or(ptr::null_mut(), |p| p.as_ptr() as *mut T)
    }

    /// Construct `value` directly in the handle's block without a fresh
    /// allocation.
    ///
    /// # Safety
    ///
    /// The block must be at least `size_of::<T>()` bytes and satisfy `T`'s
    /// alignment, and must not already hold a live object. The caller later
    /// destroys the object through
    /// [`MemoryManager::release`](crate::MemoryManager::release) (or
    /// `drop_in_place` plus `free_handle`).
    pub unsafe fn emplace<T>(&self, value: T) -> NonNull<T> {
        let block = self
            .ptr
            .expect("emplace into an invalid handle")
            .cast::<T>();
        ptr::write(block.as_ptr(), value);
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handle_reads_null() {
        let handle = RawHandle::invalid();
        assert!(!handle.is_valid());
        assert!(handle.get_as::<u64>().is_null());
    }

    #[test]
    fn copies_reference_same_block() {
        let mut word = 0u64;
        let ptr = NonNull::new(&mut word as *mut u64 as *mut u8).unwrap();
        let a = RawHandle::new(ptr, AllocSource::Pool(3));
        let b = a;
        assert!(b.is_valid());
        assert_eq!(a.get_as::<u64>(), b.get_as::<u64>());
        assert_eq!(b.source(), AllocSource::Pool(3));
    }
}
