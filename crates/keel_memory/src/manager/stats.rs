//! Usage accounting for the memory manager.
//!
//! Lifetime counters never reset; the `in_frame` variants reset at every
//! frame boundary. The rolling average is collected through `keel_metrics`
//! and vanishes (reports zero) when the `metrics` feature is off.

use keel_metrics::{Counter, RingBuffer};

/// Frames of usage history feeding the rolling average.
const USAGE_WINDOW: usize = 120;

/// Point-in-time snapshot of the manager's diagnostics surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    /// Bytes in the backing region (pool bank + frame arenas).
    pub total_capacity: usize,
    /// Bytes currently charged to pool blocks and system fallbacks.
    pub allocated_bytes: usize,
    /// Bytes bumped off the current frame arena.
    pub scratch_bytes: usize,
    /// Allocations served over the manager's lifetime.
    pub num_allocations: u64,
    /// Allocations served since the last frame boundary.
    pub num_allocations_in_frame: u64,
    /// Peak usage (allocated + scratch) over the manager's lifetime.
    pub max_usage: usize,
    /// Peak usage since the last frame boundary.
    pub max_usage_in_frame: usize,
    /// Rolling average of usage sampled at frame boundaries.
    pub average_usage: f64,
}

pub(crate) struct StatsTracker {
    total_capacity: usize,
    allocated_bytes: usize,
    num_allocations: u64,
    num_allocations_in_frame: u64,
    max_usage: usize,
    max_usage_in_frame: usize,
    frame_usage: RingBuffer<f64>,
    counters: Counter,
}

impl StatsTracker {
    pub fn new(total_capacity: usize) -> Self {
        Self {
            total_capacity,
            allocated_bytes: 0,
            num_allocations: 0,
            num_allocations_in_frame: 0,
            max_usage: 0,
            max_usage_in_frame: 0,
            frame_usage: RingBuffer::new(USAGE_WINDOW),
            counters: Counter::new(),
        }
    }

    /// Record an allocation charged against the pool bank or the system
    /// fallback. `scratch_used` is the current frame arena offset.
    pub fn note_alloc(&mut self, charged: usize, scratch_used: usize, counter: &'static str) {
        self.allocated_bytes += charged;
        self.num_allocations += 1;
        self.num_allocations_in_frame += 1;
        self.counters.increment(counter, 1);
        self.touch_usage(scratch_used);
    }

    /// Record a scratch allocation; the bytes live in the arena offset, not
    /// in `allocated_bytes`.
    pub fn note_scratch(&mut self, scratch_used: usize) {
        self.num_allocations += 1;
        self.num_allocations_in_frame += 1;
        self.counters.increment("scratch_alloc", 1);
        self.touch_usage(scratch_used);
    }

    pub fn note_free(&mut self, charged: usize) {
        debug_assert!(charged <= self.allocated_bytes);
        self.allocated_bytes -= charged;
        self.counters.increment("free", 1);
    }

    /// Close out a frame: sample usage for the rolling average and reset the
    /// in-frame counters.
    pub fn end_frame(&mut self, scratch_used: usize) {
        let usage = self.allocated_bytes + scratch_used;
        self.frame_usage.push(usage as f64);
        self.num_allocations_in_frame = 0;
        self.max_usage_in_frame = 0;
    }

    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    pub fn counters(&self) -> Vec<(String, usize)> {
        self.counters.snapshot()
    }

    pub fn snapshot(&self, scratch_used: usize) -> MemoryStats {
        MemoryStats {
            total_capacity: self.total_capacity,
            allocated_bytes: self.allocated_bytes,
            scratch_bytes: scratch_used,
            num_allocations: self.num_allocations,
            num_allocations_in_frame: self.num_allocations_in_frame,
            max_usage: self.max_usage,
            max_usage_in_frame: self.max_usage_in_frame,
            average_usage: self.frame_usage.average(),
        }
    }

    fn touch_usage(&mut self, scratch_used: usize) {
        let usage = self.allocated_bytes + scratch_used;
        self.max_usage = self.max_usage.max(usage);
        self.max_usage_in_frame = self.max_usage_in_frame.max(usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_counters_survive_frames() {
        let mut stats = StatsTracker::new(1024);

        stats.note_alloc(64, 0, "pool_alloc");
        stats.note_scratch(32);
        assert_eq!(stats.snapshot(32).num_allocations_in_frame, 2);
        assert_eq!(stats.snapshot(32).max_usage_in_frame, 96);

        stats.end_frame(32);
        let snap = stats.snapshot(0);
        assert_eq!(snap.num_allocations, 2);
        assert_eq!(snap.num_allocations_in_frame, 0);
        assert_eq!(snap.max_usage_in_frame, 0);
        assert_eq!(snap.max_usage, 96);
        assert_eq!(snap.allocated_bytes, 64);

        stats.note_free(64);
        assert_eq!(stats.snapshot(0).allocated_bytes, 0);
    }
}
