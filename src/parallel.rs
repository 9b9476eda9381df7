//! Process-wide parallelism level.
//!
//! The job count is set once from `--jobs` and read by the `-MM`/test
//! detection region and the ninja invocations. Zero means "not set"; the
//! default is the hardware concurrency.

use std::sync::atomic::{AtomicUsize, Ordering};

static NUM_THREADS: AtomicUsize = AtomicUsize::new(0);

pub fn set_parallelism(num_threads: usize) {
    NUM_THREADS.store(num_threads.max(1), Ordering::Relaxed);
}

pub fn parallelism() -> usize {
    let set = NUM_THREADS.load(Ordering::Relaxed);
    if set != 0 {
        return set;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub fn is_parallel() -> bool {
    parallelism() > 1
}
