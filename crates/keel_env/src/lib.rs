//! Keel Env - host environment probing
//!
//! Cross-platform helpers used to size and report on the memory subsystem.

pub mod memory;

pub use memory::HostMemory;
