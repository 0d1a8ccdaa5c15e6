use thiserror::Error;

/// Errors that can occur while bringing up the memory manager.
///
/// Exhaustion is not an error here - `allocate` reports it as `None`.
/// Misuse (foreign frees, double unlocks) is an assertion failure, not a
/// recoverable error.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("frames_in_flight must be at least 1, got {got}")]
    InvalidFramesInFlight { got: usize },

    #[error("frame arena size must be a non-zero power of two, got {got}")]
    InvalidFrameArenaSize { got: usize },

    #[error("pool table must list block sizes in strictly ascending order (entry {index})")]
    UnsortedPoolTable { index: usize },

    #[error("pool table entry {index} must provide at least two blocks")]
    TooFewBlocks { index: usize },

    #[error("pool block size {block_size} is below the minimum of {min} bytes")]
    BlockTooSmall { block_size: usize, min: usize },

    #[error("pool block size {block_size} must be a multiple of 16")]
    MisalignedBlockSize { block_size: usize },

    #[error("backing region of {bytes} bytes could not be allocated")]
    BackingRegionFailed { bytes: usize },
}
