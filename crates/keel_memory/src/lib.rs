//! Keel Engine Memory Subsystem
//!
//! The substrate every other engine system allocates through:
//! - Spin-based lock primitives with a uniform lock/try_lock/unlock contract
//! - Fixed-block pool allocators and bump arenas over raw regions
//! - A memory manager that carves one backing region into a size-class pool
//!   bank plus per-frame scratch arenas
//! - Copyable handles that locate manager-owned blocks
//! - Exclusive and shared ownership wrappers routed through the manager

pub mod alloc;
pub mod boxed;
pub mod error;
pub mod handle;
pub mod manager;
pub mod sync;

pub use alloc::{ArenaAllocator, ArenaError, PoolAllocator, PoolError};
pub use boxed::{SharedBox, UniqueBox, UniqueSlice};
pub use error::MemoryError;
pub use handle::{AllocSource, RawHandle};
pub use manager::{MemoryManager, MemoryManagerDesc, MemoryStats, PoolSpec};
pub use sync::{
    lock_pair, LockGuard, Mutex, MutexGuard, NullLock, RawLock, ReadHalf, ReentrantLock,
    RwSpinLock, SpinLock, SyncLock,
};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
