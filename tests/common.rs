#![allow(dead_code)]

use shardlist::{LinkedList, ShardedMap};

// Run the test on different configurations of a `ShardedMap`.
pub fn with_map<K, V>(mut test: impl FnMut(&dyn Fn() -> ShardedMap<K, V>)) {
    // A single bucket, every operation contends on the same list.
    test(&(|| ShardedMap::new(1)));

    // A handful of buckets, so lists are still long enough to interfere.
    test(&(|| ShardedMap::new(7)));

    // The default configuration.
    if !cfg!(shardlist_stress) {
        test(&(|| ShardedMap::builder().build()));
    }
}

// Run the test on a standalone `LinkedList`.
pub fn with_list<K, V>(mut test: impl FnMut(&dyn Fn() -> LinkedList<K, V>)) {
    test(&(|| LinkedList::new()));
}

// Prints a log message if `RUST_LOG=debug` is set.
#[macro_export]
macro_rules! debug {
    ($($x:tt)*) => {
        if std::env::var("RUST_LOG").as_deref() == Ok("debug") {
            println!($($x)*);
        }
    };
}

// Returns the number of threads to use for stress testing, at least two even on a
// single core so the threads still interleave.
pub fn threads() -> usize {
    if cfg!(miri) {
        2
    } else {
        num_cpus::get_physical().next_power_of_two().max(2)
    }
}
