use shardlist::{Removed, ShardedMap};

use std::collections::hash_map::DefaultHasher;
use std::hash::BuildHasherDefault;
use std::sync::{Arc, Barrier};

mod common;
use common::with_map;

#[test]
fn new() {
    with_map::<usize, usize>(|map| drop(map()));
}

#[test]
#[should_panic(expected = "at least one bucket")]
fn zero_buckets() {
    let _map: ShardedMap<usize, usize> = ShardedMap::new(0);
}

#[test]
#[should_panic(expected = "at least one bucket")]
fn zero_buckets_builder() {
    let _map: ShardedMap<usize, usize> = ShardedMap::builder().buckets(0).build();
}

#[test]
fn buckets() {
    let map: ShardedMap<usize, usize> = ShardedMap::new(10);
    assert_eq!(map.buckets(), 10);

    let map: ShardedMap<usize, usize> = ShardedMap::default();
    assert_eq!(map.buckets(), shardlist::DEFAULT_BUCKETS);

    let map: ShardedMap<usize, usize> = ShardedMap::builder().buckets(3).build();
    assert_eq!(map.buckets(), 3);
}

#[test]
fn clear() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        {
            map.insert(0, 1, &guard);
            map.insert(1, 1, &guard);
            map.insert(2, 1, &guard);
            map.insert(3, 1, &guard);
            map.insert(4, 1, &guard);
        }
        map.clear(&guard);
        assert!(map.is_empty());
        assert_eq!(map.iter(&guard).count(), 0);

        map.insert(2, 2, &guard);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&2, &guard), Some(&2));
    });
}

#[test]
fn insert() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        let old = map.insert(42, 0, &guard);
        assert!(old.is_none());
    });
}

#[test]
fn get_empty() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        let e = map.get(&42, &guard);
        assert!(e.is_none());
    });
}

#[test]
fn get_key_value_empty() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        let e = map.get_key_value(&42, &guard);
        assert!(e.is_none());
    });
}

#[test]
fn remove_empty() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        assert!(!map.remove(&42, &guard));
        assert_eq!(map.remove_entry(&42, &guard), Removed::NotFound);
    });
}

#[test]
fn insert_and_remove() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        map.insert(42, 0, &guard);
        assert!(map.remove(&42, &guard));
        assert!(map.get(&42, &guard).is_none());
        assert!(!map.remove(&42, &guard));
    });
}

#[test]
fn insert_and_get() {
    with_map::<usize, usize>(|map| {
        let map = map();
        map.insert(42, 0, &map.guard());

        {
            let guard = map.guard();
            let e = map.get(&42, &guard).unwrap();
            assert_eq!(e, &0);
        }
    });
}

#[test]
fn insert_and_get_key_value() {
    with_map::<usize, usize>(|map| {
        let map = map();
        map.insert(42, 0, &map.guard());

        {
            let guard = map.guard();
            let e = map.get_key_value(&42, &guard).unwrap();
            assert_eq!(e, (&42, &0));
        }
    });
}

#[test]
fn reinsert() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        map.insert(42, 0, &guard);
        let old = map.insert(42, 1, &guard);
        assert_eq!(old, Some(&0));
        {
            let guard = map.guard();
            let e = map.get(&42, &guard).unwrap();
            assert_eq!(e, &1);
        }
    });
}

#[test]
fn reinsert_after_remove() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        map.insert(42, 0, &guard);
        assert!(map.remove(&42, &guard));
        assert_eq!(map.insert(42, 1, &guard), None);
        assert_eq!(map.get(&42, &guard), Some(&1));
        assert_eq!(map.len(), 1);
    });
}

#[test]
fn try_insert() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();

        assert_eq!(map.try_insert(42, 1, &guard), Ok(&1));

        let err = map.try_insert(42, 2, &guard).unwrap_err();
        assert_eq!(err.current, &1);
        assert_eq!(err.not_inserted, 2);

        assert_eq!(map.get(&42, &guard), Some(&1));
        assert_eq!(map.len(), 1);
    });
}

#[test]
fn borrowed_lookups() {
    with_map::<String, usize>(|map| {
        let map = map();
        let guard = map.guard();

        map.insert("hello".to_owned(), 1, &guard);
        assert_eq!(map.get("hello", &guard), Some(&1));
        assert!(map.contains_key("hello", &guard));
        assert!(!map.contains_key("hello2", &guard));
        assert!(map.remove("hello", &guard));
    });
}

#[test]
fn len_counts_distinct_keys() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();

        for i in 0..32 {
            map.insert(i, i, &guard);
        }
        assert_eq!(map.len(), 32);

        // Updates do not change the count.
        for i in 0..32 {
            map.insert(i, i + 1, &guard);
        }
        assert_eq!(map.len(), 32);

        for i in 0..8 {
            assert!(map.remove(&i, &guard));
        }
        assert_eq!(map.len(), 24);

        // Failed removals do not change the count.
        for i in 0..8 {
            assert!(!map.remove(&i, &guard));
        }
        assert_eq!(map.len(), 24);
    });
}

#[test]
fn iter() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();

        for i in 0..100 {
            map.insert(i, i * 2, &guard);
        }
        for i in (0..100).step_by(3) {
            map.remove(&i, &guard);
        }

        let mut entries: Vec<_> = map.iter(&guard).map(|(k, v)| (*k, *v)).collect();
        entries.sort();

        let expected: Vec<_> = (0..100).filter(|i| i % 3 != 0).map(|i| (i, i * 2)).collect();
        assert_eq!(entries, expected);
    });
}

#[test]
fn purge() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();

        for i in 0..16 {
            map.insert(i, i, &guard);
        }
        for i in 0..16 {
            map.remove(&i, &guard);
        }
        map.purge(&guard);

        assert!(map.is_empty());
        assert_eq!(map.iter(&guard).count(), 0);
    });
}

#[test]
fn shard_routing_is_stable() {
    let map: ShardedMap<&str, usize> = ShardedMap::new(10);

    for key in ["hello", "hello1", "hello2"] {
        let shard = map.shard_for(key);
        assert!(shard < 10);

        for _ in 0..16 {
            assert_eq!(map.shard_for(key), shard);
        }
    }
}

#[test]
fn fixed_hasher_routes_identically() {
    let hasher = BuildHasherDefault::<DefaultHasher>::default();
    let a: ShardedMap<usize, usize, _> = ShardedMap::with_hasher(13, hasher.clone());
    let b: ShardedMap<usize, usize, _> = ShardedMap::builder().buckets(13).hasher(hasher).build();

    for key in 0..1000 {
        assert_eq!(a.shard_for(&key), b.shard_for(&key));
    }
}

#[test]
fn pinned() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let pinned = map.pin();

        assert_eq!(pinned.insert(1, 1), None);
        assert_eq!(pinned.insert(1, 2), Some(&1));
        assert_eq!(pinned.get(&1), Some(&2));
        assert!(pinned.contains_key(&1));
        assert_eq!(pinned.len(), 1);
        assert_eq!((&pinned).into_iter().count(), 1);
        assert_ne!(pinned.remove_entry(&1), Removed::NotFound);
        assert!(pinned.is_empty());
    });
}

#[test]
fn pinned_owned() {
    with_map::<usize, usize>(|map| {
        let map = map();

        std::thread::scope(|s| {
            let pinned = map.pin_owned();
            s.spawn(move || {
                pinned.insert(1, 1);
                assert_eq!(pinned.get(&1), Some(&1));
            });
        });

        assert_eq!(map.pin().get(&1), Some(&1));
    });
}

#[test]
#[should_panic(expected = "incorrect guard")]
fn foreign_guard() {
    let map: ShardedMap<usize, usize> = ShardedMap::new(4);
    let other: ShardedMap<usize, usize> = ShardedMap::new(4);

    let guard = other.guard();
    map.insert(1, 1, &guard);
}

#[test]
fn from_iter_and_debug() {
    let map: ShardedMap<usize, usize> = (0..4).map(|i| (i, i)).collect();
    assert_eq!(map.len(), 4);

    let debug = format!("{:?}", map);
    for i in 0..4 {
        assert!(debug.contains(&format!("{i}: {i}")));
    }

    let mut extended = &map;
    extended.extend([(4, 4), (5, 5)]);
    assert_eq!(map.len(), 6);
}

#[test]
fn concurrent_insert() {
    with_map::<usize, usize>(|map| {
        let map = Arc::new(map());

        let map1 = map.clone();
        let t1 = std::thread::spawn(move || {
            for i in 0..64 {
                map1.insert(i, 0, &map1.guard());
            }
        });
        let map2 = map.clone();
        let t2 = std::thread::spawn(move || {
            for i in 0..64 {
                map2.insert(i, 1, &map2.guard());
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();

        let guard = map.guard();
        for i in 0..64 {
            let v = map.get(&i, &guard).unwrap();
            assert!(v == &0 || v == &1);

            let kv = map.get_key_value(&i, &guard).unwrap();
            assert!(kv == (&i, &0) || kv == (&i, &1));
        }

        // Racing inserts of the same key never create duplicates.
        assert_eq!(map.len(), 64);
        assert_eq!(map.iter(&guard).count(), 64);
    });
}

#[test]
fn concurrent_remove() {
    with_map::<usize, usize>(|map| {
        let map = Arc::new(map());

        {
            let guard = map.guard();
            for i in 0..64 {
                map.insert(i, i, &guard);
            }
        }

        let remove = |map: Arc<ShardedMap<usize, usize>>| {
            std::thread::spawn(move || {
                let guard = map.guard();
                (0..64).filter(|i| map.remove(i, &guard)).count()
            })
        };

        let t1 = remove(map.clone());
        let t2 = remove(map.clone());

        // Every key is removed by exactly one thread.
        assert_eq!(t1.join().unwrap() + t2.join().unwrap(), 64);

        let guard = map.guard();
        for i in 0..64 {
            assert!(map.get(&i, &guard).is_none());
        }
        assert!(map.is_empty());
    });
}

// Two writers insert distinct keys while readers poll for them.
#[test]
fn concurrent_insert_while_polling() {
    let map: ShardedMap<&str, usize> = ShardedMap::new(10);

    {
        let guard = map.guard();
        assert_eq!(map.get("hello", &guard), None);
        assert_eq!(map.get("hello2", &guard), None);
    }

    std::thread::scope(|s| {
        for (key, value) in [("hello", 1), ("hello2", 2)] {
            let map = &map;

            s.spawn(move || loop {
                if let Some(found) = map.pin().get(key) {
                    assert_eq!(*found, value);
                    break;
                }

                std::thread::yield_now();
            });
        }

        s.spawn(|| {
            map.pin().insert("hello", 1);
        });
        s.spawn(|| {
            map.pin().insert("hello2", 2);
        });
    });

    assert_eq!(map.len(), 2);
}

// A value read before a concurrent removal remains readable, but later lookups miss.
#[test]
fn remove_while_reading() {
    let map: ShardedMap<&str, usize> = ShardedMap::new(10);
    map.pin().insert("hello", 1);

    let read = Barrier::new(2);
    let removed = Barrier::new(2);

    std::thread::scope(|s| {
        s.spawn(|| {
            let guard = map.guard();
            let value = map.get("hello", &guard).unwrap();

            read.wait();
            removed.wait();

            assert_eq!(*value, 1);
            assert_eq!(map.get("hello", &guard), None);
        });

        read.wait();
        assert!(map.pin().remove("hello"));
        removed.wait();
    });
}

#[test]
fn current_kv_dropped() {
    let dropped1 = Arc::new(0);
    let dropped2 = Arc::new(0);

    with_map::<Arc<usize>, Arc<usize>>(|map| {
        let map = map();
        map.insert(dropped1.clone(), dropped2.clone(), &map.guard());
        assert_eq!(Arc::strong_count(&dropped1), 2);
        assert_eq!(Arc::strong_count(&dropped2), 2);

        drop(map);

        // dropping the map should drop all keys and values
        assert_eq!(Arc::strong_count(&dropped1), 1);
        assert_eq!(Arc::strong_count(&dropped2), 1);
    });
}

#[test]
fn replaced_and_removed_kv_dropped() {
    let key = Arc::new(0);
    let value = Arc::new(0);

    with_map::<Arc<usize>, Arc<usize>>(|map| {
        let map = map();

        {
            let guard = map.guard();
            map.insert(key.clone(), value.clone(), &guard);
            map.insert(key.clone(), value.clone(), &guard);
            assert!(map.remove(&key, &guard));
        }

        drop(map);

        // Retired entries are reclaimed with the map's collector at the latest.
        assert_eq!(Arc::strong_count(&key), 1);
        assert_eq!(Arc::strong_count(&value), 1);
    });
}
