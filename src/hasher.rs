use std::hash::{BuildHasher, Hash};

// Maps keys onto a fixed number of shards.
//
// The hasher is seeded once per map, so placement is stable for the lifetime of a map but
// differs between maps. Hashes are never used for ordering or persisted anywhere.
pub struct ShardRouter<S> {
    build_hasher: S,
    shards: usize,
}

impl<S> ShardRouter<S> {
    pub fn new(build_hasher: S, shards: usize) -> ShardRouter<S> {
        assert!(shards > 0, "a sharded map requires at least one bucket");

        ShardRouter {
            build_hasher,
            shards,
        }
    }

    #[inline]
    pub fn shards(&self) -> usize {
        self.shards
    }

    #[inline]
    pub fn hasher(&self) -> &S {
        &self.build_hasher
    }
}

impl<S> ShardRouter<S>
where
    S: BuildHasher,
{
    // Returns the index of the shard responsible for `key`.
    #[inline]
    pub fn route<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        let hash = self.build_hasher.hash_one(key);
        (hash % self.shards as u64) as usize
    }
}
