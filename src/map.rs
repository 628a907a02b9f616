use crate::hasher::ShardRouter;
use crate::list::{OccupiedError, Removed};
use crate::raw::{self, Counter, InsertResult, RawList};
use seize::{Collector, Guard, LocalGuard, OwnedGuard};

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::atomic::Ordering;

/// The number of buckets used by [`ShardedMap::default`] and the builder.
pub const DEFAULT_BUCKETS: usize = 64;

/// A concurrent hash map made of independent lock-free lists.
///
/// Keys are routed to one of a fixed number of buckets ("shards") by a randomly seeded
/// hash, and every operation is carried out entirely by that shard's list. Shards never
/// coordinate with each other, so operations on different shards never contend.
///
/// The number of buckets is fixed at construction and the map is never resized. Too few
/// buckets lengthens every shard's list, while too many wastes memory.
///
/// Most map operations require a [`Guard`](crate::Guard), which can be acquired through
/// [`ShardedMap::guard`] or using the [`ShardedMap::pin`] API. See the [crate-level
/// documentation](crate#usage) for details.
pub struct ShardedMap<K, V, S = RandomState> {
    shards: Box<[RawList<K, V>]>,
    router: ShardRouter<S>,
    count: Counter,
    collector: Collector,
}

// Safety: We only ever hand out &K and &V through shared references to the map,
// but keys and values may be dropped by whichever thread reclaims them.
unsafe impl<K: Send, V: Send, S: Send> Send for ShardedMap<K, V, S> {}
unsafe impl<K: Send + Sync, V: Send + Sync, S: Sync> Sync for ShardedMap<K, V, S> {}

/// A builder for a [`ShardedMap`].
///
/// # Examples
///
/// ```rust
/// use shardlist::ShardedMap;
/// use seize::Collector;
/// use std::collections::hash_map::RandomState;
///
/// let map: ShardedMap<i32, i32> = ShardedMap::builder()
///     // Set the number of buckets.
///     .buckets(128)
///     // Set the hasher.
///     .hasher(RandomState::new())
///     // Set a custom garbage collector.
///     .collector(Collector::new().batch_size(128))
///     // Construct the map.
///     .build();
/// ```
pub struct ShardedMapBuilder<K, V, S = RandomState> {
    hasher: S,
    buckets: usize,
    collector: Collector,
    _kv: PhantomData<(K, V)>,
}

impl<K, V> ShardedMapBuilder<K, V> {
    /// Set the hash builder used to route keys to buckets.
    ///
    /// Warning: by default every map gets a freshly seeded [`RandomState`], so an attacker
    /// cannot predict which bucket a key lands in. A fixed or predictable `hasher` lets
    /// crafted keys pile up in one bucket, turning every lookup into a scan of one long
    /// list.
    pub fn hasher<S>(self, hasher: S) -> ShardedMapBuilder<K, V, S> {
        ShardedMapBuilder {
            hasher,
            buckets: self.buckets,
            collector: self.collector,
            _kv: PhantomData,
        }
    }
}

impl<K, V, S> ShardedMapBuilder<K, V, S> {
    /// Set the number of buckets.
    ///
    /// The bucket count is fixed for the lifetime of the map. Building a map with zero
    /// buckets panics.
    pub fn buckets(self, buckets: usize) -> ShardedMapBuilder<K, V, S> {
        ShardedMapBuilder { buckets, ..self }
    }

    /// Set the [`seize::Collector`] used for garbage collection.
    ///
    /// This method may be useful when you want more control over garbage collection.
    ///
    /// Note that all `Guard` references used to access the map must be produced by
    /// the provided `collector`.
    pub fn collector(self, collector: Collector) -> Self {
        ShardedMapBuilder { collector, ..self }
    }

    /// Construct a [`ShardedMap`] from the builder, using the configured options.
    ///
    /// # Panics
    ///
    /// Panics if the bucket count is zero.
    pub fn build(self) -> ShardedMap<K, V, S> {
        ShardedMap {
            router: ShardRouter::new(self.hasher, self.buckets),
            shards: (0..self.buckets).map(|_| RawList::new()).collect(),
            count: Counter::default(),
            collector: self.collector,
        }
    }
}

impl<K, V, S> fmt::Debug for ShardedMapBuilder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedMapBuilder")
            .field("buckets", &self.buckets)
            .field("collector", &self.collector)
            .finish()
    }
}

impl<K, V> ShardedMap<K, V> {
    /// Creates an empty `ShardedMap` with the given number of buckets.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::ShardedMap;
    /// let map: ShardedMap<&str, i32> = ShardedMap::new(10);
    /// assert_eq!(map.buckets(), 10);
    /// ```
    pub fn new(buckets: usize) -> ShardedMap<K, V> {
        ShardedMap::with_hasher(buckets, RandomState::new())
    }

    /// Returns a builder for a `ShardedMap`.
    ///
    /// The builder can be used for more complex configuration, such as using
    /// a custom [`Collector`], or a custom hasher.
    pub fn builder() -> ShardedMapBuilder<K, V> {
        ShardedMapBuilder {
            buckets: DEFAULT_BUCKETS,
            hasher: RandomState::default(),
            collector: Collector::new(),
            _kv: PhantomData,
        }
    }
}

impl<K, V, S> Default for ShardedMap<K, V, S>
where
    S: Default,
{
    fn default() -> Self {
        ShardedMap::with_hasher(DEFAULT_BUCKETS, S::default())
    }
}

impl<K, V, S> ShardedMap<K, V, S> {
    /// Creates an empty `ShardedMap` with the given number of buckets, which will use the
    /// given hash builder to route keys.
    ///
    /// Warning: [`ShardedMap::new`] seeds a fresh [`RandomState`] for every map, so an attacker
    /// cannot predict which bucket a key lands in. A fixed or predictable `hash_builder` lets
    /// crafted keys pile up in one bucket, turning every lookup into a scan of one long list.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::ShardedMap;
    /// use std::collections::hash_map::RandomState;
    ///
    /// let s = RandomState::new();
    /// let map = ShardedMap::with_hasher(16, s);
    /// map.pin().insert(1, 2);
    /// ```
    pub fn with_hasher(buckets: usize, hash_builder: S) -> ShardedMap<K, V, S> {
        ShardedMapBuilder {
            hasher: hash_builder,
            buckets,
            collector: Collector::new(),
            _kv: PhantomData,
        }
        .build()
    }

    /// Returns a pinned reference to the map.
    ///
    /// The returned reference manages a guard internally, preventing garbage collection
    /// for as long as it is held. See the [crate-level documentation](crate#usage) for details.
    #[inline]
    pub fn pin(&self) -> MapRef<'_, K, V, S, LocalGuard<'_>> {
        MapRef {
            guard: self.guard(),
            map: self,
        }
    }

    /// Returns a pinned reference to the map.
    ///
    /// Unlike [`ShardedMap::pin`], the returned reference implements `Send` and `Sync`,
    /// allowing it to be held across `.await` points in work-stealing schedulers.
    #[inline]
    pub fn pin_owned(&self) -> MapRef<'_, K, V, S, OwnedGuard<'_>> {
        MapRef {
            guard: self.owned_guard(),
            map: self,
        }
    }

    /// Returns a guard for use with this map.
    ///
    /// Note that holding on to a guard prevents garbage collection.
    /// See the [crate-level documentation](crate#usage) for details.
    #[inline]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.collector.enter()
    }

    /// Returns an owned guard for use with this map.
    ///
    /// Owned guards implement `Send` and `Sync`, allowing them to be held across
    /// `.await` points in work-stealing schedulers.
    ///
    /// Note that holding on to a guard prevents garbage collection.
    /// See the [crate-level documentation](crate#usage) for details.
    #[inline]
    pub fn owned_guard(&self) -> OwnedGuard<'_> {
        self.collector.enter_owned()
    }

    /// Returns the approximate number of entries in the map.
    ///
    /// The count is maintained by insertions of new keys and successful removals, and has no
    /// consistency guarantee relative to concurrent operations.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::ShardedMap;
    ///
    /// let map = ShardedMap::new(4);
    ///
    /// map.pin().insert(1, "a");
    /// map.pin().insert(2, "b");
    /// map.pin().insert(2, "c");
    /// assert!(map.len() == 2);
    /// ```
    #[inline]
    pub fn len(&self) -> usize {
        self.count.sum()
    }

    /// Returns `true` if the map is empty. Otherwise returns `false`.
    ///
    /// This has the same staleness caveat as [`ShardedMap::len`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of buckets in the map.
    #[inline]
    pub fn buckets(&self) -> usize {
        self.router.shards()
    }

    /// Returns a reference to the map's [`BuildHasher`].
    #[inline]
    pub fn hasher(&self) -> &S {
        self.router.hasher()
    }

    /// An iterator visiting all live key-value pairs, bucket by bucket.
    ///
    /// Entries inserted or removed during iteration may or may not be observed.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::ShardedMap;
    ///
    /// let map = ShardedMap::new(4);
    /// let guard = map.guard();
    ///
    /// map.insert("a", 1, &guard);
    /// map.insert("b", 2, &guard);
    ///
    /// let mut entries: Vec<_> = map.iter(&guard).collect();
    /// entries.sort();
    /// assert_eq!(entries, [(&"a", &1), (&"b", &2)]);
    /// ```
    #[inline]
    pub fn iter<'g, G>(&'g self, guard: &'g G) -> Iter<'g, K, V, G>
    where
        G: Guard,
    {
        self.check_guard(guard);

        Iter {
            shards: self.shards.iter(),
            current: None,
            guard,
        }
    }

    /// Removes every live entry from the map.
    ///
    /// Entries inserted concurrently may survive the call.
    #[inline]
    pub fn clear(&self, guard: &impl Guard) {
        self.check_guard(guard);

        for shard in self.shards.iter() {
            // Safety: Checked the guard above.
            let deleted = unsafe { shard.clear(guard) };
            self.count.sub(deleted, guard);
        }
    }

    /// Unlinks any entries that were removed but whose unlinking was left pending.
    ///
    /// Every traversal already does this work for the bucket it visits. Calling `purge`
    /// forces a full pass over every bucket.
    #[inline]
    pub fn purge(&self, guard: &impl Guard) {
        self.check_guard(guard);

        for shard in self.shards.iter() {
            // Safety: Checked the guard above.
            unsafe { shard.purge(guard) }
        }
    }

    #[inline]
    fn check_guard(&self, guard: &impl Guard) {
        assert_eq!(
            *guard.collector(),
            self.collector,
            "Attempted to access map with incorrect guard"
        );
    }
}

impl<K, V, S> ShardedMap<K, V, S>
where
    S: BuildHasher,
{
    /// Returns the index of the bucket the key is routed to.
    ///
    /// The index is stable for the lifetime of this map, but a different map may route the
    /// same key elsewhere.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::ShardedMap;
    ///
    /// let map: ShardedMap<&str, i32> = ShardedMap::new(10);
    /// let bucket = map.shard_for("hello");
    /// assert!(bucket < 10);
    /// assert_eq!(map.shard_for("hello"), bucket);
    /// ```
    #[inline]
    pub fn shard_for<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        self.router.route(key)
    }

    #[inline]
    fn shard<Q>(&self, key: &Q) -> &RawList<K, V>
    where
        Q: Hash + ?Sized,
    {
        &self.shards[self.router.route(key)]
    }
}

impl<K, V, S> ShardedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// The key may be any borrowed form of the map's key type, but
    /// [`Hash`] and [`Eq`] on the borrowed form *must* match those for
    /// the key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::ShardedMap;
    ///
    /// let map = ShardedMap::new(4);
    /// map.pin().insert(1, "a");
    /// assert_eq!(map.pin().contains_key(&1), true);
    /// assert_eq!(map.pin().contains_key(&2), false);
    /// ```
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q, guard: &impl Guard) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key, guard).is_some()
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The reference is a snapshot: it remains valid for as long as the guard is held, even if
    /// the entry is concurrently updated or removed. A lookup made after a removal completes
    /// does not find the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::ShardedMap;
    ///
    /// let map = ShardedMap::new(4);
    /// map.pin().insert(1, "a");
    /// assert_eq!(map.pin().get(&1), Some(&"a"));
    /// assert_eq!(map.pin().get(&2), None);
    /// ```
    #[inline]
    pub fn get<'g, Q>(&self, key: &Q, guard: &'g impl Guard) -> Option<&'g V>
    where
        K: Borrow<Q> + 'g,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key, guard).map(|(_, v)| v)
    }

    /// Returns the key-value pair corresponding to the supplied key.
    #[inline]
    pub fn get_key_value<'g, Q>(&self, key: &Q, guard: &'g impl Guard) -> Option<(&'g K, &'g V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.check_guard(guard);

        // Safety: Checked the guard above.
        unsafe { self.shard(key).get(key, guard) }
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, [`None`] is returned.
    ///
    /// If the map did have this key present, the value is updated, and the old
    /// value is returned. The key is not updated.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::ShardedMap;
    ///
    /// let map = ShardedMap::new(4);
    /// assert_eq!(map.pin().insert(37, "a"), None);
    /// assert_eq!(map.pin().is_empty(), false);
    ///
    /// map.pin().insert(37, "b");
    /// assert_eq!(map.pin().insert(37, "c"), Some(&"b"));
    /// assert_eq!(map.pin().get(&37), Some(&"c"));
    /// ```
    #[inline]
    pub fn insert<'g>(&self, key: K, value: V, guard: &'g impl Guard) -> Option<&'g V> {
        self.check_guard(guard);

        let shard = self.shard(&key);

        // Safety: Checked the guard above.
        match unsafe { shard.insert(key, value, true, guard) } {
            InsertResult::Inserted(_) => {
                self.count.get(guard).fetch_add(1, Ordering::Relaxed);
                None
            }
            InsertResult::Replaced(value) => Some(value),
            InsertResult::Error { .. } => unreachable!(),
        }
    }

    /// Tries to insert a key-value pair into the map, and returns
    /// a reference to the value that was inserted.
    ///
    /// If the map already had this key present, nothing is updated, and
    /// an error containing the existing value is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::ShardedMap;
    ///
    /// let map = ShardedMap::new(4);
    /// let map = map.pin();
    ///
    /// assert_eq!(map.try_insert(37, "a").unwrap(), &"a");
    ///
    /// let err = map.try_insert(37, "b").unwrap_err();
    /// assert_eq!(err.current, &"a");
    /// assert_eq!(err.not_inserted, "b");
    /// ```
    #[inline]
    pub fn try_insert<'g>(
        &self,
        key: K,
        value: V,
        guard: &'g impl Guard,
    ) -> Result<&'g V, OccupiedError<'g, V>> {
        self.check_guard(guard);

        let shard = self.shard(&key);

        // Safety: Checked the guard above.
        match unsafe { shard.insert(key, value, false, guard) } {
            InsertResult::Inserted(value) => {
                self.count.get(guard).fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            InsertResult::Error {
                current,
                not_inserted,
            } => Err(OccupiedError {
                current,
                not_inserted,
            }),
            InsertResult::Replaced(_) => unreachable!(),
        }
    }

    /// Removes a key from the map, returning `true` if this call removed it.
    ///
    /// The key may be any borrowed form of the map's key type, but
    /// [`Hash`] and [`Eq`] on the borrowed form *must* match those for
    /// the key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::ShardedMap;
    ///
    /// let map = ShardedMap::new(4);
    /// map.pin().insert(1, "a");
    /// assert_eq!(map.pin().remove(&1), true);
    /// assert_eq!(map.pin().remove(&1), false);
    /// ```
    #[inline]
    pub fn remove<Q>(&self, key: &Q, guard: &impl Guard) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key, guard).is_removed()
    }

    /// Removes a key from the map, reporting whether the entry was also unlinked.
    ///
    /// See [`Removed`] for details.
    #[inline]
    pub fn remove_entry<Q>(&self, key: &Q, guard: &impl Guard) -> Removed
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.check_guard(guard);

        // Safety: Checked the guard above.
        let removed = unsafe { self.shard(key).remove(key, guard) };
        self.count_removal(removed, guard)
    }

    // A deletion counts whether or not this call managed to unlink the node.
    #[inline]
    fn count_removal(&self, removed: Removed, guard: &impl Guard) -> Removed {
        if removed.is_removed() {
            self.count.sub(1, guard);
        }

        removed
    }
}

impl<K, V, S> fmt::Debug for ShardedMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.guard();
        f.debug_map().entries(self.iter(&guard)).finish()
    }
}

impl<K, V, S> Extend<(K, V)> for &ShardedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let guard = self.guard();

        for (key, value) in iter {
            self.insert(key, value, &guard);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for ShardedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let map = ShardedMap::default();

        {
            let guard = map.guard();
            for (key, value) in iter {
                map.insert(key, value, &guard);
            }
        }

        map
    }
}

/// A pinned reference to a [`ShardedMap`].
///
/// This type is created with [`ShardedMap::pin`] and can be used to easily access a
/// [`ShardedMap`] without explicitly managing a guard. See the [crate-level
/// documentation](crate#usage) for details.
pub struct MapRef<'map, K, V, S, G> {
    guard: G,
    map: &'map ShardedMap<K, V, S>,
}

impl<'map, K, V, S, G> MapRef<'map, K, V, S, G>
where
    G: Guard,
{
    /// Returns a reference to the inner [`ShardedMap`].
    #[inline]
    pub fn map(&self) -> &'map ShardedMap<K, V, S> {
        self.map
    }

    /// Returns the approximate number of entries in the map.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the map is empty. Otherwise returns `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// An iterator visiting all live key-value pairs, bucket by bucket.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V, G> {
        self.map.iter(&self.guard)
    }

    /// Removes every live entry from the map.
    #[inline]
    pub fn clear(&self) {
        self.map.clear(&self.guard)
    }

    /// Unlinks any entries whose unlinking was left pending.
    #[inline]
    pub fn purge(&self) {
        self.map.purge(&self.guard)
    }
}

impl<'map, K, V, S, G> MapRef<'map, K, V, S, G>
where
    K: Hash + Eq,
    S: BuildHasher,
    G: Guard,
{
    /// Returns `true` if the map contains a value for the specified key.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key, &self.guard)
    }

    /// Returns a reference to the value corresponding to the key.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key, &self.guard)
    }

    /// Returns the key-value pair corresponding to the supplied key.
    #[inline]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get_key_value(key, &self.guard)
    }

    /// Inserts a key-value pair into the map, returning the previous value if there was one.
    #[inline]
    pub fn insert(&self, key: K, value: V) -> Option<&V> {
        self.map.insert(key, value, &self.guard)
    }

    /// Tries to insert a key-value pair into the map.
    #[inline]
    pub fn try_insert(&self, key: K, value: V) -> Result<&V, OccupiedError<'_, V>> {
        self.map.try_insert(key, value, &self.guard)
    }

    /// Removes a key from the map, returning `true` if this call removed it.
    #[inline]
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(key, &self.guard)
    }

    /// Removes a key from the map, reporting whether the entry was also unlinked.
    #[inline]
    pub fn remove_entry<Q>(&self, key: &Q) -> Removed
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove_entry(key, &self.guard)
    }

    /// Returns the index of the bucket the key is routed to.
    #[inline]
    pub fn shard_for<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        self.map.shard_for(key)
    }
}

impl<K, V, S, G> fmt::Debug for MapRef<'_, K, V, S, G>
where
    K: fmt::Debug,
    V: fmt::Debug,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, S, G> IntoIterator for &'a MapRef<'_, K, V, S, G>
where
    G: Guard,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, G>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over a map's entries.
///
/// This struct is created by the [`iter`](ShardedMap::iter) method on [`ShardedMap`].
/// See its documentation for details.
pub struct Iter<'g, K, V, G> {
    shards: std::slice::Iter<'g, RawList<K, V>>,
    current: Option<raw::Iter<'g, K, V, G>>,
    guard: &'g G,
}

impl<'g, K: 'g, V: 'g, G> Iterator for Iter<'g, K, V, G>
where
    G: Guard,
{
    type Item = (&'g K, &'g V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.as_mut().and_then(Iterator::next) {
                return Some(entry);
            }

            let shard = self.shards.next()?;

            // Safety: The guard was checked when the iterator was created.
            self.current = Some(unsafe { shard.iter(self.guard) });
        }
    }
}

impl<K, V, G> fmt::Debug for Iter<'_, K, V, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("remaining_buckets", &self.shards.len())
            .finish_non_exhaustive()
    }
}
