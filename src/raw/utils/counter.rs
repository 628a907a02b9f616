use std::sync::{
    atomic::{AtomicIsize, Ordering},
    OnceLock,
};

use super::CachePadded;

// A sharded atomic counter.
//
// Every shard of a `ShardedMap` updates the same length counter, so a single
// atomic would become the one point of contention the shards exist to avoid.
pub struct Counter(Box<[CachePadded<AtomicIsize>]>);

impl Default for Counter {
    /// Create a new `Counter`.
    fn default() -> Counter {
        // available_parallelism is quite slow (microseconds).
        static CPUS: OnceLock<usize> = OnceLock::new();
        let num_cpus = *CPUS.get_or_init(|| {
            std::thread::available_parallelism()
                .map(Into::into)
                .unwrap_or(1)
        });

        // Round up to the next power-of-two for fast modulo.
        let shards = (0..num_cpus.next_power_of_two())
            .map(|_| Default::default())
            .collect();

        Counter(shards)
    }
}

impl Counter {
    // Return the shard for the given thread ID.
    #[inline]
    pub fn get(&self, guard: &impl seize::Guard) -> &AtomicIsize {
        // Guard thread IDs are allocated densely, so threads rarely share a shard.
        let shard = guard.thread_id() & (self.0.len() - 1);

        &self.0[shard]
    }

    // Returns the sum of all counter shards.
    #[inline]
    pub fn sum(&self) -> usize {
        self.0
            .iter()
            .map(|x| x.load(Ordering::Relaxed))
            .sum::<isize>()
            .try_into()
            // A removal may be counted on one shard before the matching insert
            // is counted on another, in which case we assume the map is empty.
            .unwrap_or(0)
    }

    // Subtract `n` from the counter.
    #[inline]
    pub fn sub(&self, n: usize, guard: &impl seize::Guard) {
        if n != 0 {
            self.get(guard).fetch_sub(n as isize, Ordering::Relaxed);
        }
    }
}
