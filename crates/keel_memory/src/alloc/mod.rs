//! Block allocators operating over caller-supplied memory regions.
//!
//! Neither allocator owns its region or synchronizes internally; the memory
//! manager supplies both. [`PoolAllocator`] hands out fixed-size blocks off a
//! lazily-built LIFO free list. [`ArenaAllocator`] bump-allocates with O(1)
//! reset and stack-discipline rewind.

mod arena;
mod pool;

pub use arena::{ArenaAllocator, ArenaError};
pub use pool::{PoolAllocator, PoolError};
