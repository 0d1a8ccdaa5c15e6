//! Bump allocator with O(1) reset and stack-discipline rewind.

use std::ptr::NonNull;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("arena capacity must be non-zero")]
    EmptyRegion,
}

/// Bump allocator over a caller-owned region.
///
/// `allocate` bumps an offset and never frees individually; `free_to`
/// rewinds the offset to a previous allocation boundary, releasing it and
/// everything allocated after it; `reset` releases the whole arena in O(1).
/// The frame arenas the manager rotates are never freed element-by-element,
/// they are reset once per frame boundary.
pub struct ArenaAllocator {
    base: NonNull<u8>,
    capacity: usize,
    offset: usize,
}

// SAFETY: exclusive access to the region travels with the value.
unsafe impl Send for ArenaAllocator {}

impl ArenaAllocator {
    /// # Safety
    ///
    /// `region` must be valid for reads and writes of `capacity` bytes for
    /// the allocator's whole lifetime, and nothing else may touch those
    /// bytes except through pointers returned by the allocate methods.
    pub unsafe fn new(region: NonNull<u8>, capacity: usize) -> Result<Self, ArenaError> {
        if capacity == 0 {
            return Err(ArenaError::EmptyRegion);
        }
        Ok(Self {
            base: region,
            capacity,
            offset: 0,
        })
    }

    /// Bump-allocate `size` bytes at the current offset.
    ///
    /// Fails when fewer than `size + 1` bytes remain; arena exhaustion
    /// indicates a sizing bug, so callers treat `None` as fatal.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if self.capacity - self.offset > size {
            // SAFETY: offset + size is inside the region, checked above.
            let ptr = unsafe { self.base.as_ptr().add(self.offset) };
            self.offset += size;
            NonNull::new(ptr)
        } else {
            None
        }
    }

    /// Alignment-aware allocation.
    ///
    /// Reserves `size + align` bytes, shifts the returned pointer forward to
    /// the next `align` boundary, and stores the shift amount in the byte
    /// immediately preceding it so [`unshift`](Self::unshift) can recover
    /// the raw allocation start.
    pub fn allocate_aligned(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        assert!(
            align.is_power_of_two() && align <= 128,
            "unsupported alignment {align}"
        );
        if self.capacity - self.offset <= size + align {
            return None;
        }

        // SAFETY: offset + size + align is inside the region, checked above.
        unsafe {
            let raw = self.base.as_ptr().add(self.offset);
            let misalign = raw as usize & (align - 1);
            // 1..=align, so there is always a byte for the shift tag.
            let shift = align - misalign;
            let aligned = raw.add(shift);
            *aligned.sub(1) = shift as u8;
            self.offset = (aligned as usize - self.base.as_ptr() as usize) + size;
            NonNull::new(aligned)
        }
    }

    /// Recover the raw allocation start of an aligned allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by
    /// [`allocate_aligned`](Self::allocate_aligned) on this arena, and the
    /// allocation must still be live (not rewound past).
    pub unsafe fn unshift(&self, ptr: NonNull<u8>) -> NonNull<u8> {
        debug_assert!(self.owns(ptr.as_ptr()));
        let shift = *ptr.as_ptr().sub(1) as usize;
        debug_assert!(shift >= 1 && shift <= 128);
        NonNull::new_unchecked(ptr.as_ptr().sub(shift))
    }

    /// Rewind the offset to `ptr`, releasing it and everything allocated
    /// after it. Stack discipline: `ptr` must precede the current offset.
    pub fn free_to(&mut self, ptr: NonNull<u8>) {
        assert!(
            self.owns(ptr.as_ptr()),
            "rewind to a pointer outside the arena region"
        );
        let offset = ptr.as_ptr() as usize - self.base.as_ptr() as usize;
        assert!(
            offset < self.offset,
            "rewind target must precede the current offset"
        );
        self.offset = offset;
    }

    /// Release everything. O(1); previously returned pointers become dead.
    #[inline]
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    #[inline]
    pub fn owns(&self, ptr: *const u8) -> bool {
        let base = self.base.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= base && addr < base + self.capacity
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.offset
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
