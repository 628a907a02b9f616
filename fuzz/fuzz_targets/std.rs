#![no_main]

use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;
use shardlist::{Guard, MapRef, ShardedMap};
use std::collections::HashMap as StdHashMap;
use std::hash::BuildHasher;

#[derive(Debug, Arbitrary)]
enum Operation<K, V> {
    Insert(K, V),
    TryInsert(K, V),
    Remove(K),
    Get(K),
    Contains(K),
    Clear,
    Purge,
    Len,
    IsEmpty,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    buckets: u8,
    operations: Vec<Operation<u16, u32>>,
}

fn fuzz_map(input: FuzzInput) {
    let mut std_map = StdHashMap::new();
    let shard_raw = ShardedMap::new(usize::from(input.buckets).max(1));
    let shard_map = shard_raw.pin();

    for op in input.operations {
        match op {
            Operation::Insert(k, v) => {
                let std_result = std_map.insert(k, v);
                let shard_result = shard_map.insert(k, v);
                assert_eq!(std_result.as_ref(), shard_result);
            }
            Operation::TryInsert(k, v) => {
                let std_result = std_map.get(&k).copied();
                if std_result.is_none() {
                    std_map.insert(k, v);
                }

                match shard_map.try_insert(k, v) {
                    Ok(inserted) => {
                        assert_eq!(std_result, None);
                        assert_eq!(*inserted, v);
                    }
                    Err(err) => {
                        assert_eq!(std_result.as_ref(), Some(err.current));
                        assert_eq!(err.not_inserted, v);
                    }
                }
            }
            Operation::Remove(k) => {
                let std_result = std_map.remove(&k);
                let shard_result = shard_map.remove(&k);
                assert_eq!(std_result.is_some(), shard_result);
            }
            Operation::Get(k) => {
                let std_result = std_map.get(&k);
                let shard_result = shard_map.get(&k);
                assert_eq!(std_result, shard_result);
            }
            Operation::Contains(k) => {
                let std_result = std_map.contains_key(&k);
                let shard_result = shard_map.contains_key(&k);
                assert_eq!(std_result, shard_result);
            }
            Operation::Clear => {
                std_map.clear();
                shard_map.clear();
            }
            Operation::Purge => shard_map.purge(),
            Operation::Len => {
                assert_eq!(std_map.len(), shard_map.len());
            }
            Operation::IsEmpty => {
                assert_eq!(std_map.is_empty(), shard_map.is_empty());
            }
        }
    }

    check_consistent(&std_map, &shard_map);
}

// Every entry is visited exactly once, and nothing else is.
fn check_consistent<S, G>(std: &StdHashMap<u16, u32>, map: &MapRef<'_, u16, u32, S, G>)
where
    S: BuildHasher,
    G: Guard,
{
    for (k, v) in std.iter() {
        assert_eq!(Some(v), map.get(k));
    }

    let mut visited = 0;
    for (k, v) in map.iter() {
        assert_eq!(std.get(k), Some(v));
        visited += 1;
    }

    assert_eq!(std.len(), visited);
    assert_eq!(std.len(), map.len());
}

fuzz_target!(|data: FuzzInput| {
    fuzz_map(data);
});
