//! Fixed block-size free-list allocator.

use std::ptr::{self, NonNull};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("block size {block_size} is smaller than a free-list link ({min} bytes)")]
    BlockTooSmall { block_size: usize, min: usize },

    #[error("region of {region_len} bytes must exceed one {block_size}-byte block")]
    RegionTooSmall {
        region_len: usize,
        block_size: usize,
    },
}

/// Fixed-size block allocator over a caller-owned region.
///
/// While a block is free, its first machine word overlays a link to the next
/// free block (null for never-used blocks); while allocated, all of its
/// bytes belong to the caller. The free list is built lazily: the cursor
/// strides through never-used blocks and only follows embedded links once
/// blocks have been freed, so reuse is LIFO.
///
/// Links are read and written unaligned, so the region itself carries no
/// alignment requirement; the manager carves 16-aligned regions and callers
/// get 16-aligned blocks from it.
pub struct PoolAllocator {
    base: NonNull<u8>,
    cursor: *mut u8,
    block_size: usize,
    total_blocks: usize,
    free_blocks: usize,
}

// SAFETY: the allocator has exclusive access to its region; moving it to
// another thread moves that access with it.
unsafe impl Send for PoolAllocator {}

impl PoolAllocator {
    /// Take over `region_len` bytes at `region` and zero them.
    ///
    /// # Safety
    ///
    /// `region` must be valid for reads and writes of `region_len` bytes for
    /// the allocator's whole lifetime, and nothing else may touch those
    /// bytes except through blocks returned by [`allocate`](Self::allocate).
    pub unsafe fn new(
        region: NonNull<u8>,
        region_len: usize,
        block_size: usize,
    ) -> Result<Self, PoolError> {
        let min = std::mem::size_of::<*mut u8>();
        if block_size < min {
            return Err(PoolError::BlockTooSmall { block_size, min });
        }
        if region_len <= block_size {
            return Err(PoolError::RegionTooSmall {
                region_len,
                block_size,
            });
        }

        let total_blocks = region_len / block_size;
        // Zeroed words mark never-used blocks for the lazy free list.
        ptr::write_bytes(region.as_ptr(), 0, total_blocks * block_size);

        Ok(Self {
            base: region,
            cursor: region.as_ptr(),
            block_size,
            total_blocks,
            free_blocks: total_blocks,
        })
    }

    /// Hand out one block. `None` iff the pool is exhausted.
    ///
    /// `size` must not exceed the block size; blocks are indivisible and the
    /// full block is charged regardless of `size`.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        debug_assert!(
            size <= self.block_size,
            "allocation of {size} bytes exceeds block size {}",
            self.block_size
        );
        if self.free_blocks == 0 {
            return None;
        }

        let block = self.cursor;
        // SAFETY: while free_blocks > 0 the cursor points at a free block
        // inside the region, and free blocks hold a readable link word.
        let next = unsafe { ptr::read_unaligned(block as *const *mut u8) };
        self.cursor = if next.is_null() {
            // Never-used block: the one after it is the next fresh block.
            // SAFETY: stays within or one-past the region.
            unsafe { block.add(self.block_size) }
        } else {
            next
        };
        self.free_blocks -= 1;
        NonNull::new(block)
    }

    /// As [`allocate`](Self::allocate), for callers with an alignment
    /// requirement. Alignment above 16 is not implemented.
    pub fn allocate_aligned(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        assert!(
            align <= 16,
            "pool alignment above 16 is not implemented (requested {align})"
        );
        self.allocate(size)
    }

    /// Return a block to the pool. The block becomes the new cursor, so the
    /// next allocation reuses it (LIFO).
    pub fn free(&mut self, ptr: NonNull<u8>) {
        assert!(
            self.owns(ptr.as_ptr()),
            "free of a pointer outside the pool region"
        );
        let offset = ptr.as_ptr() as usize - self.base.as_ptr() as usize;
        debug_assert_eq!(
            offset % self.block_size,
            0,
            "free of a pointer not at a block boundary"
        );
        debug_assert!(
            self.free_blocks < self.total_blocks,
            "free with no blocks outstanding"
        );

        // SAFETY: ptr is a block inside the region, checked above.
        unsafe {
            ptr::write_unaligned(ptr.as_ptr() as *mut *mut u8, self.cursor);
        }
        self.cursor = ptr.as_ptr();
        self.free_blocks += 1;
    }

    /// Zero the region and restore full capacity. Not safe to call while any
    /// block is still referenced.
    pub fn reset(&mut self) {
        // SAFETY: region validity is the constructor's contract.
        unsafe {
            ptr::write_bytes(self.base.as_ptr(), 0, self.region_len());
        }
        self.cursor = self.base.as_ptr();
        self.free_blocks = self.total_blocks;
    }

    #[inline]
    pub fn owns(&self, ptr: *const u8) -> bool {
        let base = self.base.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= base && addr < base + self.region_len()
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    #[inline]
    pub fn free_blocks(&self) -> usize {
        self.free_blocks
    }

    #[inline]
    pub fn allocated_blocks(&self) -> usize {
        self.total_blocks - self.free_blocks
    }

    #[inline]
    pub fn region_len(&self) -> usize {
        self.total_blocks * self.block_size
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.free_blocks == 0
    }
}
