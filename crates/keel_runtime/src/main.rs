//! Keel Engine Runtime
//!
//! Minimal binary that boots the memory subsystem and exercises a few
//! frames of the allocation loop.

use anyhow::{Context, Result};
use keel_env::HostMemory;
use keel_memory::{MemoryManager, MemoryManagerDesc, SpinLock};

fn load_desc() -> Result<MemoryManagerDesc> {
    // Optional path to a JSON descriptor; defaults otherwise.
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading memory descriptor {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {path}"))
        }
        None => Ok(MemoryManagerDesc::default()),
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Keel Engine v{}", keel_memory::VERSION);

    let host = HostMemory::detect();
    tracing::info!(
        cache_line = host.cache_line,
        page_size = host.page_size,
        total_ram = host.total_ram,
        "host memory"
    );

    let desc = load_desc()?;
    let manager = MemoryManager::new(desc)?;

    // A few frames of representative traffic: scratch for transient data,
    // boxes for objects that outlive the frame.
    let world_seed = manager.make_shared::<u64, SpinLock>(0x5EED);
    for frame in 0..3u64 {
        manager.begin_frame();

        let scratch = manager
            .scratch_alloc_aligned(4096, 64)
            .context("frame scratch exhausted")?;
        tracing::debug!(frame, ptr = ?scratch, "frame scratch ready");

        let transform = manager.make_unique([frame as f32; 16]);
        let shared = world_seed.clone();
        tracing::debug!(frame, seed = *shared, sum = transform.iter().sum::<f32>());
    }
    drop(world_seed);

    let stats = manager.stats();
    tracing::info!(
        total_capacity = stats.total_capacity,
        peak_usage = stats.max_usage,
        lifetime_allocations = stats.num_allocations,
        average_usage = stats.average_usage,
        "frame loop complete"
    );
    for (name, value) in manager.counters() {
        tracing::info!(counter = %name, value, "allocation counter");
    }

    manager.shutdown();
    tracing::info!("Runtime shut down cleanly");

    Ok(())
}
