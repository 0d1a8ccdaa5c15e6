//! The memory manager: one backing region, a bank of size-class pools, and
//! rotating per-frame scratch arenas.
//!
//! The manager is an explicitly constructed context object handed to the
//! systems that allocate through it; process bootstrap owns its
//! `new(desc)`/`shutdown()` lifecycle. Interior state sits behind the
//! subsystem's own spin-locked [`Mutex`], so `allocate`/`free`/`scratch`
//! are `&self` and safe to share across worker threads; critical sections
//! are short bookkeeping only.

mod stats;

pub use stats::MemoryStats;

use crate::alloc::{ArenaAllocator, PoolAllocator};
use crate::boxed::shared::ControlBlock;
use crate::boxed::{SharedBox, UniqueBox, UniqueSlice};
use crate::error::MemoryError;
use crate::handle::{AllocSource, RawHandle};
use crate::sync::{Mutex, NullLock, RawLock, SpinLock};
use serde::{Deserialize, Serialize};
use stats::StatsTracker;
use std::alloc::Layout;
use std::collections::HashMap;
use std::ptr::{self, NonNull};

/// Pool blocks are handed out with this alignment; requests beyond it are
/// rejected as unsupported.
pub const MAX_BLOCK_ALIGN: usize = 16;

/// One size class in the pool bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub block_size: usize,
    pub block_count: usize,
}

/// The default size-class table: 32 B blocks up through 64 KiB, halving the
/// count per step down to a floor of 512 blocks.
pub fn default_pool_table() -> Vec<PoolSpec> {
    let mut table = Vec::new();
    let mut block_size = 32usize;
    let mut block_count = 65536usize;
    while block_size <= 64 * 1024 {
        table.push(PoolSpec {
            block_size,
            block_count: block_count.max(512),
        });
        block_size *= 2;
        block_count /= 2;
    }
    table
}

/// Boot-time description of the manager's memory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryManagerDesc {
    /// Capacity of each frame arena in bytes. Must be a power of two.
    pub frame_arena_size: usize,
    /// Number of frame arenas rotated by `begin_frame`. At least 1; use 2-3
    /// so consumers of last frame's data never read a clobbered arena.
    pub frames_in_flight: usize,
    /// Size-class table, strictly ascending block sizes.
    pub pools: Vec<PoolSpec>,
}

impl Default for MemoryManagerDesc {
    fn default() -> Self {
        Self {
            frame_arena_size: 4 * 1024 * 1024,
            frames_in_flight: 3,
            pools: default_pool_table(),
        }
    }
}

impl MemoryManagerDesc {
    fn validate(&self) -> Result<(), MemoryError> {
        if self.frames_in_flight < 1 {
            return Err(MemoryError::InvalidFramesInFlight {
                got: self.frames_in_flight,
            });
        }
        if self.frame_arena_size == 0 || !self.frame_arena_size.is_power_of_two() {
            return Err(MemoryError::InvalidFrameArenaSize {
                got: self.frame_arena_size,
            });
        }

        let min = std::mem::size_of::<*mut u8>();
        let mut previous = 0usize;
        for (index, spec) in self.pools.iter().enumerate() {
            if spec.block_size < min {
                return Err(MemoryError::BlockTooSmall {
                    block_size: spec.block_size,
                    min,
                });
            }
            if spec.block_size % MAX_BLOCK_ALIGN != 0 {
                return Err(MemoryError::MisalignedBlockSize {
                    block_size: spec.block_size,
                });
            }
            if spec.block_size <= previous {
                return Err(MemoryError::UnsortedPoolTable { index });
            }
            if spec.block_count < 2 {
                return Err(MemoryError::TooFewBlocks { index });
            }
            previous = spec.block_size;
        }
        Ok(())
    }

    fn pool_bytes(&self) -> usize {
        self.pools
            .iter()
            .map(|s| s.block_size * s.block_count)
            .sum()
    }

    fn total_bytes(&self) -> usize {
        self.pool_bytes() + self.frame_arena_size * self.frames_in_flight
    }
}

struct Inner {
    pools: Vec<PoolAllocator>,
    frames: Vec<ArenaAllocator>,
    current_frame: usize,
    /// System-fallback allocations, keyed by address so `free` can recover
    /// the layout.
    system: HashMap<usize, Layout>,
    stats: StatsTracker,
}

impl Inner {
    fn scratch_used(&self) -> usize {
        self.frames[self.current_frame].used()
    }

    fn allocate(&mut self, size: usize) -> Option<(NonNull<u8>, AllocSource)> {
        // Smallest fitting size class first, escalating through larger
        // classes when one is exhausted.
        if let Some(first_fit) = self.pools.iter().position(|p| p.block_size() >= size) {
            for index in first_fit..self.pools.len() {
                let block_size = self.pools[index].block_size();
                if let Some(ptr) = self.pools[index].allocate(size) {
                    let scratch = self.scratch_used();
                    self.stats.note_alloc(block_size, scratch, "pool_alloc");
                    return Some((ptr, AllocSource::Pool(index as u32)));
                }
            }
            tracing::debug!(size, "pool bank exhausted, falling back to system allocator");
        }

        let layout = Layout::from_size_align(size.max(1), MAX_BLOCK_ALIGN).ok()?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe { std::alloc::alloc(layout) };
        let ptr = NonNull::new(raw)?;
        self.system.insert(ptr.as_ptr() as usize, layout);
        let scratch = self.scratch_used();
        self.stats.note_alloc(layout.size(), scratch, "system_alloc");
        Some((ptr, AllocSource::System))
    }

    fn free_from(&mut self, ptr: NonNull<u8>, source: AllocSource) {
        match source {
            AllocSource::Pool(index) => {
                let index = index as usize;
                assert!(index < self.pools.len(), "handle names a missing pool");
                let block_size = self.pools[index].block_size();
                self.pools[index].free(ptr);
                self.stats.note_free(block_size);
            }
            AllocSource::System => {
                let layout = self
                    .system
                    .remove(&(ptr.as_ptr() as usize))
                    .expect("free of an untracked system allocation");
                // SAFETY: allocated in `allocate` with exactly this layout.
                unsafe {
                    std::alloc::dealloc(ptr.as_ptr(), layout);
                }
                self.stats.note_free(layout.size());
            }
        }
    }
}

/// Tiered allocator every other engine system allocates through.
pub struct MemoryManager {
    region: NonNull<u8>,
    region_layout: Layout,
    inner: Mutex<Inner, SpinLock>,
}

// SAFETY: the backing region is only mutated through `inner`, which is a
// spin-locked Mutex; the raw region pointer itself is never handed out
// without bookkeeping.
unsafe impl Send for MemoryManager {}
unsafe impl Sync for MemoryManager {}

impl MemoryManager {
    /// Allocate the backing region and carve it: pool bank first in
    /// size-class order, then the frame arenas.
    pub fn new(desc: MemoryManagerDesc) -> Result<Self, MemoryError> {
        desc.validate()?;

        let total = desc.total_bytes();
        let region_layout = Layout::from_size_align(total, 64)
            .map_err(|_| MemoryError::BackingRegionFailed { bytes: total })?;
        // SAFETY: total is non-zero (frame arenas are non-empty). Zeroed so
        // the pools see a clean free-list state.
        let raw = unsafe { std::alloc::alloc_zeroed(region_layout) };
        let region =
            NonNull::new(raw).ok_or(MemoryError::BackingRegionFailed { bytes: total })?;

        let mut pools = Vec::with_capacity(desc.pools.len());
        let mut offset = 0usize;
        for spec in &desc.pools {
            let len = spec.block_size * spec.block_count;
            // SAFETY: disjoint sub-range of the backing region; block sizes
            // and counts were validated, so len > block_size.
            let pool = unsafe {
                let base = NonNull::new_unchecked(region.as_ptr().add(offset));
                PoolAllocator::new(base, len, spec.block_size)
                    .expect("validated pool spec must carve")
            };
            pools.push(pool);
            offset += len;
        }

        let mut frames = Vec::with_capacity(desc.frames_in_flight);
        for _ in 0..desc.frames_in_flight {
            // SAFETY: disjoint sub-range following the pool bank.
            let arena = unsafe {
                let base = NonNull::new_unchecked(region.as_ptr().add(offset));
                ArenaAllocator::new(base, desc.frame_arena_size)
                    .expect("validated frame arena must carve")
            };
            frames.push(arena);
            offset += desc.frame_arena_size;
        }
        debug_assert_eq!(offset, total);

        tracing::info!(
            total_bytes = total,
            pools = pools.len(),
            frames_in_flight = desc.frames_in_flight,
            frame_arena_size = desc.frame_arena_size,
            "memory manager initialized"
        );

        Ok(Self {
            region,
            region_layout,
            inner: Mutex::new(Inner {
                pools,
                frames,
                current_frame: 0,
                system: HashMap::new(),
                stats: StatsTracker::new(total),
            }),
        })
    }

    /// Allocate `size` bytes from the smallest fitting size class, escalating
    /// to larger classes and finally the system allocator. `None` means
    /// genuine OOM and is not recoverable mid-frame.
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.inner.lock().allocate(size).map(|(ptr, _)| ptr)
    }

    /// As [`allocate`](Self::allocate), returning a copyable locator that
    /// remembers the block's origin.
    pub fn allocate_handle(&self, size: usize) -> Option<RawHandle> {
        self.inner
            .lock()
            .allocate(size)
            .map(|(ptr, source)| RawHandle::new(ptr, source))
    }

    /// Return an allocation, routing by address containment. Freeing a
    /// pointer the manager does not own is a misuse assertion.
    pub fn free(&self, ptr: NonNull<u8>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(index) = inner.pools.iter().position(|p| p.owns(ptr.as_ptr())) {
            inner.free_from(ptr, AllocSource::Pool(index as u32));
            return;
        }
        if inner.system.contains_key(&(ptr.as_ptr() as usize)) {
            inner.free_from(ptr, AllocSource::System);
            return;
        }
        assert!(
            !self.region_contains(ptr.as_ptr()),
            "scratch memory is reclaimed by frame reset, not freed"
        );
        panic!("free of an unmanaged pointer");
    }

    /// Return the block a handle references. Must be called exactly once per
    /// allocation; handles are copyable locators, not owners.
    pub fn free_handle(&self, handle: RawHandle) {
        let ptr = handle.get().expect("free of an invalid handle");
        self.inner.lock().free_from(ptr, handle.source());
    }

    /// Destroy a `T` previously emplaced in the handle's block, then free
    /// the block.
    ///
    /// # Safety
    ///
    /// The block must hold a live, properly constructed `T`.
    pub unsafe fn release<T>(&self, handle: RawHandle) {
        ptr::drop_in_place(handle.get_as::<T>());
        self.free_handle(handle);
    }

    pub(crate) fn free_raw(&self, ptr: NonNull<u8>, source: AllocSource) {
        self.inner.lock().free_from(ptr, source);
    }

    pub(crate) fn allocate_raw(&self, size: usize) -> Option<(NonNull<u8>, AllocSource)> {
        self.inner.lock().allocate(size)
    }

    /// One-shot intra-frame scratch memory; no matching free. Reclaimed when
    /// this arena's slot comes around again, so callers must not retain the
    /// pointer past frame end.
    pub fn scratch_alloc(&self, size: usize) -> Option<NonNull<u8>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let current = inner.current_frame;
        let ptr = inner.frames[current].allocate(size)?;
        let scratch = inner.scratch_used();
        inner.stats.note_scratch(scratch);
        Some(ptr)
    }

    /// Scratch with an alignment requirement, using the arena's shift-byte
    /// path.
    pub fn scratch_alloc_aligned(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let current = inner.current_frame;
        let ptr = inner.frames[current].allocate_aligned(size, align)?;
        let scratch = inner.scratch_used();
        inner.stats.note_scratch(scratch);
        Some(ptr)
    }

    /// Rotate to the next frame arena and reset it. Samples usage for the
    /// rolling average and clears the in-frame counters.
    pub fn begin_frame(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let scratch = inner.scratch_used();
        inner.stats.end_frame(scratch);
        inner.current_frame = (inner.current_frame + 1) % inner.frames.len();
        let current = inner.current_frame;
        inner.frames[current].reset();
    }

    /// Index of the frame arena currently serving scratch allocations.
    pub fn frame_index(&self) -> usize {
        self.inner.lock().current_frame
    }

    pub fn frames_in_flight(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// True when the manager can trace `ptr` to one of its allocators
    /// (pool bank, frame arenas, or a tracked system fallback).
    pub fn is_managed(&self, ptr: *const u8) -> bool {
        if self.region_contains(ptr) {
            return true;
        }
        self.inner.lock().system.contains_key(&(ptr as usize))
    }

    /// True when `free(ptr)` would be legal: pool-owned or a tracked system
    /// fallback. Scratch pointers are managed but not freeable.
    pub fn can_free(&self, ptr: *const u8) -> bool {
        let guard = self.inner.lock();
        guard.pools.iter().any(|p| p.owns(ptr))
            || guard.system.contains_key(&(ptr as usize))
    }

    pub fn total_capacity(&self) -> usize {
        self.region_layout.size()
    }

    /// Bytes currently charged to pool blocks and system fallbacks.
    pub fn allocated_size(&self) -> usize {
        self.inner.lock().stats.allocated_bytes()
    }

    /// Diagnostics snapshot for telemetry overlays.
    pub fn stats(&self) -> MemoryStats {
        let guard = self.inner.lock();
        guard.stats.snapshot(guard.scratch_used())
    }

    /// Named event counters (empty without the `metrics` feature).
    pub fn counters(&self) -> Vec<(String, usize)> {
        self.inner.lock().stats.counters()
    }

    /// Construct `value` in managed memory under exclusive ownership.
    /// Allocation failure traps; mid-frame OOM is not recoverable.
    pub fn make_unique<T>(&self, value: T) -> UniqueBox<'_, T> {
        self.try_make_unique(value)
            .unwrap_or_else(|| panic!("out of memory constructing {}", std::any::type_name::<T>()))
    }

    pub fn try_make_unique<T>(&self, value: T) -> Option<UniqueBox<'_, T>> {
        assert!(
            std::mem::align_of::<T>() <= MAX_BLOCK_ALIGN,
            "alignment above {MAX_BLOCK_ALIGN} is not implemented"
        );
        let size = std::mem::size_of::<T>().max(1);
        let (ptr, source) = self.allocate_raw(size)?;
        let typed = ptr.cast::<T>();
        // SAFETY: freshly allocated block of at least size_of::<T>() bytes,
        // alignment checked above.
        unsafe {
            ptr::write(typed.as_ptr(), value);
            Some(UniqueBox::from_raw_parts(self, typed, source))
        }
    }

    /// Construct a managed slice, filling each element from `fill`.
    pub fn make_unique_slice_with<T>(
        &self,
        len: usize,
        fill: impl FnMut(usize) -> T,
    ) -> UniqueSlice<'_, T> {
        self.try_make_unique_slice_with(len, fill)
            .unwrap_or_else(|| {
                panic!(
                    "out of memory constructing [{}; {len}]",
                    std::any::type_name::<T>()
                )
            })
    }

    pub fn try_make_unique_slice_with<T>(
        &self,
        len: usize,
        mut fill: impl FnMut(usize) -> T,
    ) -> Option<UniqueSlice<'_, T>> {
        assert!(len > 0, "zero-length managed slice");
        assert!(
            std::mem::align_of::<T>() <= MAX_BLOCK_ALIGN,
            "alignment above {MAX_BLOCK_ALIGN} is not implemented"
        );
        let size = std::mem::size_of::<T>().checked_mul(len)?.max(1);
        let (ptr, source) = self.allocate_raw(size)?;
        let typed = ptr.cast::<T>();
        // SAFETY: block covers len elements; each slot is written exactly
        // once before the slice is returned.
        unsafe {
            for i in 0..len {
                ptr::write(typed.as_ptr().add(i), fill(i));
            }
            Some(UniqueSlice::from_raw_parts(self, typed, len, source))
        }
    }

    /// Construct `value` in managed memory under shared ownership. The lock
    /// type is chosen at compile time; `NullLock` keeps single-threaded call
    /// sites free of synchronization cost.
    pub fn make_shared<T, L: RawLock + Default>(&self, value: T) -> SharedBox<'_, T, L> {
        self.try_make_shared(value)
            .unwrap_or_else(|| panic!("out of memory constructing {}", std::any::type_name::<T>()))
    }

    /// `make_shared` fixed to the no-op lock.
    pub fn make_shared_local<T>(&self, value: T) -> SharedBox<'_, T, NullLock> {
        self.make_shared::<T, NullLock>(value)
    }

    pub fn try_make_shared<T, L: RawLock + Default>(
        &self,
        value: T,
    ) -> Option<SharedBox<'_, T, L>> {
        assert!(
            std::mem::align_of::<ControlBlock<T, L>>() <= MAX_BLOCK_ALIGN,
            "alignment above {MAX_BLOCK_ALIGN} is not implemented"
        );
        let size = std::mem::size_of::<ControlBlock<T, L>>();
        let (ptr, source) = self.allocate_raw(size)?;
        let ctrl = ptr.cast::<ControlBlock<T, L>>();
        // SAFETY: freshly allocated block sized for the control block.
        unsafe {
            ptr::write(ctrl.as_ptr(), ControlBlock::new(value));
            Some(SharedBox::from_raw_parts(self, ctrl, source))
        }
    }

    /// Log a leak report and release the backing region.
    pub fn shutdown(self) {
        {
            let guard = self.inner.lock();
            for (index, pool) in guard.pools.iter().enumerate() {
                if pool.allocated_blocks() > 0 {
                    tracing::warn!(
                        pool = index,
                        block_size = pool.block_size(),
                        live_blocks = pool.allocated_blocks(),
                        "pool has live blocks at shutdown"
                    );
                }
            }
            if !guard.system.is_empty() {
                tracing::warn!(
                    count = guard.system.len(),
                    "system fallback allocations live at shutdown"
                );
            }
            let snapshot = guard.stats.snapshot(guard.scratch_used());
            tracing::info!(
                total_allocations = snapshot.num_allocations,
                max_usage = snapshot.max_usage,
                "memory manager shut down"
            );
        }
        drop(self);
    }

    fn region_contains(&self, ptr: *const u8) -> bool {
        let base = self.region.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= base && addr < base + self.region_layout.size()
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        // Reclaim anything still parked on the system fallback so shutdown
        // does not leak.
        for (addr, layout) in inner.system.drain() {
            // SAFETY: tracked allocations came from std::alloc::alloc with
            // this exact layout.
            unsafe {
                std::alloc::dealloc(addr as *mut u8, layout);
            }
        }
        // SAFETY: region was allocated in `new` with this layout.
        unsafe {
            std::alloc::dealloc(self.region.as_ptr(), self.region_layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SpinLock;

    fn small_desc() -> MemoryManagerDesc {
        MemoryManagerDesc {
            frame_arena_size: 1024,
            frames_in_flight: 2,
            pools: vec![
                PoolSpec {
                    block_size: 32,
                    block_count: 8,
                },
                PoolSpec {
                    block_size: 64,
                    block_count: 4,
                },
            ],
        }
    }

    #[test]
    fn desc_validation() {
        let mut desc = small_desc();
        desc.frames_in_flight = 0;
        assert!(matches!(
            MemoryManager::new(desc),
            Err(MemoryError::InvalidFramesInFlight { .. })
        ));

        let mut desc = small_desc();
        desc.frame_arena_size = 1000;
        assert!(matches!(
            MemoryManager::new(desc),
            Err(MemoryError::InvalidFrameArenaSize { .. })
        ));

        let mut desc = small_desc();
        desc.pools.reverse();
        assert!(matches!(
            MemoryManager::new(desc),
            Err(MemoryError::UnsortedPoolTable { .. })
        ));
    }

    #[test]
    fn routes_to_smallest_fitting_pool() {
        let mgr = MemoryManager::new(small_desc()).unwrap();

        let small = mgr.allocate(16).unwrap();
        let large = mgr.allocate(48).unwrap();
        assert!(mgr.is_managed(small.as_ptr()));
        assert!(mgr.can_free(large.as_ptr()));

        // 16-byte request charged a 32-byte block, 48-byte request a
        // 64-byte block.
        assert_eq!(mgr.allocated_size(), 32 + 64);

        mgr.free(small);
        mgr.free(large);
        assert_eq!(mgr.allocated_size(), 0);
    }

    #[test]
    fn escalates_then_falls_back() {
        let mgr = MemoryManager::new(small_desc()).unwrap();

        // Drain the 32-byte class; further small requests escalate into the
        // 64-byte class.
        let mut blocks: Vec<_> = (0..8).map(|_| mgr.allocate(32).unwrap()).collect();
        let escalated = mgr.allocate(32).unwrap();
        assert!(mgr.can_free(escalated.as_ptr()));

        // Larger than any class: system fallback, still freeable and
        // managed.
        let huge = mgr.allocate(4096).unwrap();
        assert!(mgr.is_managed(huge.as_ptr()));
        assert!(mgr.can_free(huge.as_ptr()));
        mgr.free(huge);
        assert!(!mgr.is_managed(huge.as_ptr()));

        mgr.free(escalated);
        for ptr in blocks.drain(..) {
            mgr.free(ptr);
        }
        assert_eq!(mgr.allocated_size(), 0);
    }

    #[test]
    fn scratch_rotates_with_frames() {
        let mgr = MemoryManager::new(small_desc()).unwrap();
        assert_eq!(mgr.frame_index(), 0);

        let a = mgr.scratch_alloc(100).unwrap();
        assert!(mgr.is_managed(a.as_ptr()));
        assert!(!mgr.can_free(a.as_ptr()), "scratch has no matching free");
        assert_eq!(mgr.stats().scratch_bytes, 100);

        mgr.begin_frame();
        assert_eq!(mgr.frame_index(), 1);
        assert_eq!(mgr.stats().scratch_bytes, 0);

        let b = mgr.scratch_alloc(100).unwrap();
        assert_ne!(a, b, "frames in flight must not clobber each other");

        // Wrap back around: same arena as frame 0, reset.
        mgr.begin_frame();
        assert_eq!(mgr.frame_index(), 0);
        let c = mgr.scratch_alloc(100).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn aligned_scratch() {
        let mgr = MemoryManager::new(small_desc()).unwrap();
        let p = mgr.scratch_alloc_aligned(64, 64).unwrap();
        assert_eq!(p.as_ptr() as usize % 64, 0);
    }

    #[test]
    fn in_frame_stats_reset_at_boundary() {
        let mgr = MemoryManager::new(small_desc()).unwrap();

        let p = mgr.allocate(32).unwrap();
        let _ = mgr.scratch_alloc(64).unwrap();
        let snap = mgr.stats();
        assert_eq!(snap.num_allocations, 2);
        assert_eq!(snap.num_allocations_in_frame, 2);
        assert_eq!(snap.max_usage_in_frame, 96);

        mgr.begin_frame();
        let snap = mgr.stats();
        assert_eq!(snap.num_allocations, 2, "lifetime counters never reset");
        assert_eq!(snap.num_allocations_in_frame, 0);
        assert_eq!(snap.max_usage_in_frame, 0);
        assert_eq!(snap.total_capacity, mgr.total_capacity());

        mgr.free(p);
    }

    #[test]
    fn handle_two_phase_construction() {
        let mgr = MemoryManager::new(small_desc()).unwrap();

        let handle = mgr.allocate_handle(std::mem::size_of::<u64>()).unwrap();
        assert!(handle.is_valid());
        let copy = handle;
        assert_eq!(copy.get_as::<u64>(), handle.get_as::<u64>());

        // SAFETY: block is at least 32 bytes and 16-aligned; no live object.
        let value = unsafe { handle.emplace(0xDEAD_BEEFu64) };
        // SAFETY: emplaced just above.
        assert_eq!(unsafe { *value.as_ptr() }, 0xDEAD_BEEF);

        // SAFETY: the block holds a live u64.
        unsafe { mgr.release::<u64>(handle) };
        assert_eq!(mgr.allocated_size(), 0);
    }

    #[test]
    #[should_panic(expected = "unmanaged pointer")]
    fn foreign_free_asserts() {
        let mgr = MemoryManager::new(small_desc()).unwrap();
        let mut local = 0u64;
        mgr.free(NonNull::new(&mut local as *mut u64 as *mut u8).unwrap());
    }

    #[test]
    fn desc_round_trips_through_json() {
        let desc = small_desc();
        let text = serde_json::to_string(&desc).unwrap();
        let back: MemoryManagerDesc = serde_json::from_str(&text).unwrap();
        assert_eq!(back.pools, desc.pools);
        assert_eq!(back.frame_arena_size, desc.frame_arena_size);
    }

    #[test]
    fn concurrent_allocation_storm() {
        use rayon::prelude::*;

        let mgr = MemoryManager::new(MemoryManagerDesc {
            frame_arena_size: 4096,
            frames_in_flight: 2,
            pools: vec![PoolSpec {
                block_size: 64,
                block_count: 4096,
            }],
        })
        .unwrap();

        (0..8usize).into_par_iter().for_each(|_| {
            for _ in 0..200 {
                let boxed = mgr.make_unique([0u8; 48]);
                std::hint::black_box(&*boxed);
            }
        });

        assert_eq!(mgr.allocated_size(), 0);
        let shared = mgr.make_shared::<u32, SpinLock>(99);
        assert_eq!(*shared, 99);
        drop(shared);
        mgr.shutdown();
    }
}
