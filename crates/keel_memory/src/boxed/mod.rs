//! Ownership wrappers over manager-allocated memory.
//!
//! [`UniqueBox`] is the exclusive, move-only owner; [`SharedBox`] is shared
//! ownership through an out-of-line control block whose lock type is chosen
//! at compile time. Both route destruction back through the manager by the
//! allocation's recorded origin.

pub(crate) mod shared;
mod unique;

pub use shared::SharedBox;
pub use unique::{UniqueBox, UniqueSlice};
