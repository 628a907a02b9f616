use crate::raw::{self, InsertResult};
use seize::{Collector, Guard, LocalGuard, OwnedGuard};

use std::borrow::Borrow;
use std::fmt;

/// A concurrent, lock-free linked list of key-value pairs.
///
/// The list is unordered: new keys are appended at the tail, and each key maps to at most one
/// live node. Lookups and updates never take a lock; all coordination is done through
/// compare-and-swap on the nodes themselves.
///
/// Most list operations require a [`Guard`](crate::Guard), which can be acquired through
/// [`LinkedList::guard`] or using the [`LinkedList::pin`] API. See the [crate-level
/// documentation](crate#usage) for details.
pub struct LinkedList<K, V> {
    raw: raw::RawList<K, V>,
    collector: Collector,
}

// Safety: We only ever hand out &K and &V through shared references to the list,
// but keys and values may be dropped by whichever thread reclaims them.
unsafe impl<K: Send, V: Send> Send for LinkedList<K, V> {}
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for LinkedList<K, V> {}

/// A builder for a [`LinkedList`].
///
/// # Examples
///
/// ```rust
/// use shardlist::LinkedList;
/// use seize::Collector;
///
/// let list: LinkedList<i32, i32> = LinkedList::builder()
///     // Set a custom garbage collector.
///     .collector(Collector::new().batch_size(128))
///     // Construct the list.
///     .build();
/// ```
pub struct LinkedListBuilder<K, V> {
    collector: Collector,
    _kv: std::marker::PhantomData<(K, V)>,
}

impl<K, V> LinkedListBuilder<K, V> {
    /// Set the [`seize::Collector`] used for garbage collection.
    ///
    /// Note that all `Guard` references used to access the list must be produced by
    /// the provided `collector`.
    pub fn collector(self, collector: Collector) -> Self {
        LinkedListBuilder {
            collector,
            _kv: std::marker::PhantomData,
        }
    }

    /// Construct a [`LinkedList`] from the builder, using the configured options.
    pub fn build(self) -> LinkedList<K, V> {
        LinkedList {
            raw: raw::RawList::new(),
            collector: self.collector,
        }
    }
}

impl<K, V> fmt::Debug for LinkedListBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedListBuilder")
            .field("collector", &self.collector)
            .finish()
    }
}

/// The outcome of a removal from a [`LinkedList`].
///
/// Removal happens in two steps: the node is first marked as deleted, which is what makes the
/// key absent, and is then unlinked from the list. Unlinking is best-effort; if it loses a race
/// the node is unlinked by a later traversal instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum Removed {
    /// No live entry for the key was found, or a concurrent removal deleted it first.
    NotFound,

    /// The entry was deleted by this call, and will be unlinked by a later traversal.
    Pending,

    /// The entry was deleted and unlinked by this call.
    Unlinked,
}

impl Removed {
    /// Returns `true` if this call deleted the entry.
    #[inline]
    pub fn is_removed(self) -> bool {
        !matches!(self, Removed::NotFound)
    }
}

/// An error returned by [`try_insert`](LinkedList::try_insert) when the key already exists.
///
/// Contains the existing value, and the value that was not inserted.
#[derive(Debug, PartialEq, Eq)]
pub struct OccupiedError<'a, V: 'a> {
    /// The value in the list that was already present.
    pub current: &'a V,
    /// The value which was not inserted, because the entry was already occupied.
    pub not_inserted: V,
}

impl<K, V> LinkedList<K, V> {
    /// Creates an empty `LinkedList`.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::LinkedList;
    /// let list: LinkedList<&str, i32> = LinkedList::new();
    /// ```
    pub fn new() -> LinkedList<K, V> {
        LinkedList::builder().build()
    }

    /// Returns a builder for a `LinkedList`.
    ///
    /// The builder can be used for more complex configuration, such as using
    /// a custom [`Collector`].
    pub fn builder() -> LinkedListBuilder<K, V> {
        LinkedListBuilder {
            collector: Collector::new(),
            _kv: std::marker::PhantomData,
        }
    }

    /// Returns a pinned reference to the list.
    ///
    /// The returned reference manages a guard internally, preventing garbage collection
    /// for as long as it is held. See the [crate-level documentation](crate#usage) for details.
    #[inline]
    pub fn pin(&self) -> ListRef<'_, K, V, LocalGuard<'_>> {
        ListRef {
            guard: self.guard(),
            list: self,
        }
    }

    /// Returns a pinned reference to the list.
    ///
    /// Unlike [`LinkedList::pin`], the returned reference implements `Send` and `Sync`,
    /// allowing it to be held across `.await` points in work-stealing schedulers.
    #[inline]
    pub fn pin_owned(&self) -> ListRef<'_, K, V, OwnedGuard<'_>> {
        ListRef {
            guard: self.owned_guard(),
            list: self,
        }
    }

    /// Returns a guard for use with this list.
    ///
    /// Note that holding on to a guard prevents garbage collection.
    /// See the [crate-level documentation](crate#usage) for details.
    #[inline]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.collector.enter()
    }

    /// Returns an owned guard for use with this list.
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

    /// Returns `true` if the list contains no live entries.
    #[inline]
    pub fn is_empty<'g>(&'g self, guard: &'g impl Guard) -> bool {
        self.iter(guard).next().is_none()
    }

    /// Returns the number of live entries in the list.
    ///
    /// This walks the whole list, and the result may be stale by the time it is returned
    /// if the list is modified concurrently.
    #[inline]
    pub fn len<'g>(&'g self, guard: &'g impl Guard) -> usize {
        self.iter(guard).count()
    }

    /// An iterator visiting all live key-value pairs in list order.
    ///
    /// Entries inserted or removed during iteration may or may not be observed.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::LinkedList;
    ///
    /// let list = LinkedList::new();
    /// let guard = list.guard();
    ///
    /// list.insert("a", 1, &guard);
    /// list.insert("b", 2, &guard);
    ///
    /// let entries: Vec<_> = list.iter(&guard).collect();
    /// assert_eq!(entries, [(&"a", &1), (&"b", &2)]);
    /// ```
    #[inline]
    pub fn iter<'g, G>(&self, guard: &'g G) -> ListIter<'g, K, V, G>
    where
        G: Guard,
    {
        self.check_guard(guard);

        // Safety: Checked the guard above.
        ListIter {
            raw: unsafe { self.raw.iter(guard) },
        }
    }

    /// Removes every live entry from the list, returning how many entries this call removed.
    ///
    /// Entries inserted concurrently may survive the call.
    #[inline]
    pub fn clear(&self, guard: &impl Guard) -> usize {
        self.check_guard(guard);

        // Safety: Checked the guard above.
        unsafe { self.raw.clear(guard) }
    }

    /// Unlinks any entries that were removed but whose unlinking was left pending.
    ///
    /// Every traversal already does this work as it goes. Calling `purge` forces a full pass,
    /// handing the unlinked entries to the garbage collector.
    #[inline]
    pub fn purge(&self, guard: &impl Guard) {
        self.check_guard(guard);

        // Safety: Checked the guard above.
        unsafe { self.raw.purge(guard) }
    }

    #[inline]
    fn check_guard(&self, guard: &impl Guard) {
        assert_eq!(
            *guard.collector(),
            self.collector,
            "Attempted to access list with incorrect guard"
        );
    }
}

impl<K, V> LinkedList<K, V>
where
    K: Eq,
{
    /// Returns `true` if the list contains a live entry for the specified key.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::LinkedList;
    ///
    /// let list = LinkedList::new();
    /// list.pin().insert(1, "a");
    /// assert_eq!(list.pin().contains_key(&1), true);
    /// assert_eq!(list.pin().contains_key(&2), false);
    /// ```
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q, guard: &impl Guard) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.get(key, guard).is_some()
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The reference is a snapshot: it remains valid for as long as the guard is held, even if
    /// the entry is concurrently updated or removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::LinkedList;
    ///
    /// let list = LinkedList::new();
    /// list.pin().insert(1, "a");
    /// assert_eq!(list.pin().get(&1), Some(&"a"));
    /// assert_eq!(list.pin().get(&2), None);
    /// ```
    #[inline]
    pub fn get<'g, Q>(&self, key: &Q, guard: &'g impl Guard) -> Option<&'g V>
    where
        K: Borrow<Q> + 'g,
        Q: Eq + ?Sized,
    {
        self.get_key_value(key, guard).map(|(_, v)| v)
    }

    /// Returns the key-value pair corresponding to the supplied key.
    #[inline]
    pub fn get_key_value<'g, Q>(&self, key: &Q, guard: &'g impl Guard) -> Option<(&'g K, &'g V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.check_guard(guard);

        // Safety: Checked the guard above.
        unsafe { self.raw.get(key, guard) }
    }

    /// Inserts a key-value pair into the list.
    ///
    /// If the list did not have this key present, [`None`] is returned and the pair is
    /// appended at the tail.
    ///
    /// If the list did have this key present, the value is updated in place, and the old
    /// value is returned. The key is not updated.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::LinkedList;
    ///
    /// let list = LinkedList::new();
    /// assert_eq!(list.pin().insert(37, "a"), None);
    /// assert_eq!(list.pin().is_empty(), false);
    ///
    /// list.pin().insert(37, "b");
    /// assert_eq!(list.pin().insert(37, "c"), Some(&"b"));
    /// assert_eq!(list.pin().get(&37), Some(&"c"));
    /// ```
    #[inline]
    pub fn insert<'g>(&self, key: K, value: V, guard: &'g impl Guard) -> Option<&'g V> {
        self.check_guard(guard);

        // Safety: Checked the guard above.
        match unsafe { self.raw.insert(key, value, true, guard) } {
            InsertResult::Inserted(_) => None,
            InsertResult::Replaced(value) => Some(value),
            InsertResult::Error { .. } => unreachable!(),
        }
    }

    /// Tries to insert a key-value pair into the list, and returns
    /// a reference to the value that was inserted.
    ///
    /// If the list already had this key present, nothing is updated, and
    /// an error containing the existing value is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::LinkedList;
    ///
    /// let list = LinkedList::new();
    /// let list = list.pin();
    ///
    /// assert_eq!(list.try_insert(37, "a").unwrap(), &"a");
    ///
    /// let err = list.try_insert(37, "b").unwrap_err();
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

        // Safety: Checked the guard above.
        match unsafe { self.raw.insert(key, value, false, guard) } {
            InsertResult::Inserted(value) => Ok(value),
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

    /// Removes a key from the list.
    ///
    /// Returns whether this call removed the entry, and whether it also managed to unlink it.
    /// See [`Removed`] for details.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardlist::{LinkedList, Removed};
    ///
    /// let list = LinkedList::new();
    /// list.pin().insert(1, "a");
    /// assert_eq!(list.pin().remove(&1), Removed::Unlinked);
    /// assert_eq!(list.pin().remove(&1), Removed::NotFound);
    /// ```
    #[inline]
    pub fn remove<Q>(&self, key: &Q, guard: &impl Guard) -> Removed
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.check_guard(guard);

        // Safety: Checked the guard above.
        unsafe { self.raw.remove(key, guard) }
    }
}

impl<K, V> Default for LinkedList<K, V> {
    fn default() -> Self {
        LinkedList::new()
    }
}

impl<K, V> fmt::Debug for LinkedList<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.guard();
        f.debug_map().entries(self.iter(&guard)).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for LinkedList<K, V>
where
    K: Eq,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let list = LinkedList::new();

        {
            let guard = list.guard();
            for (key, value) in iter {
                list.insert(key, value, &guard);
            }
        }

        list
    }
}

/// A pinned reference to a [`LinkedList`].
///
/// This type is created with [`LinkedList::pin`] and can be used to easily access a
/// [`LinkedList`] without explicitly managing a guard. See the [crate-level
/// documentation](crate#usage) for details.
pub struct ListRef<'list, K, V, G> {
    guard: G,
    list: &'list LinkedList<K, V>,
}

impl<'list, K, V, G> ListRef<'list, K, V, G>
where
    G: Guard,
{
    /// Returns a reference to the inner [`LinkedList`].
    #[inline]
    pub fn list(&self) -> &'list LinkedList<K, V> {
        self.list
    }

    /// Returns `true` if the list contains no live entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty(&self.guard)
    }

    /// Returns the number of live entries in the list.
    #[inline]
    pub fn len(&self) -> usize {
        self.list.len(&self.guard)
    }

    /// An iterator visiting all live key-value pairs in list order.
    #[inline]
    pub fn iter(&self) -> ListIter<'_, K, V, G> {
        self.list.iter(&self.guard)
    }

    /// Removes every live entry from the list.
    #[inline]
    pub fn clear(&self) -> usize {
        self.list.clear(&self.guard)
    }

    /// Unlinks any entries whose unlinking was left pending.
    #[inline]
    pub fn purge(&self) {
        self.list.purge(&self.guard)
    }
}

impl<'list, K, V, G> ListRef<'list, K, V, G>
where
    K: Eq,
    G: Guard,
{
    /// Returns `true` if the list contains a live entry for the specified key.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.list.contains_key(key, &self.guard)
    }

    /// Returns a reference to the value corresponding to the key.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.list.get(key, &self.guard)
    }

    /// Returns the key-value pair corresponding to the supplied key.
    #[inline]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.list.get_key_value(key, &self.guard)
    }

    /// Inserts a key-value pair into the list, returning the previous value if there was one.
    #[inline]
    pub fn insert(&self, key: K, value: V) -> Option<&V> {
        self.list.insert(key, value, &self.guard)
    }

    /// Tries to insert a key-value pair into the list.
    #[inline]
    pub fn try_insert(&self, key: K, value: V) -> Result<&V, OccupiedError<'_, V>> {
        self.list.try_insert(key, value, &self.guard)
    }

    /// Removes a key from the list.
    #[inline]
    pub fn remove<Q>(&self, key: &Q) -> Removed
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.list.remove(key, &self.guard)
    }
}

impl<K, V, G> fmt::Debug for ListRef<'_, K, V, G>
where
    K: fmt::Debug,
    V: fmt::Debug,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, G> IntoIterator for &'a ListRef<'_, K, V, G>
where
    G: Guard,
{
    type Item = (&'a K, &'a V);
    type IntoIter = ListIter<'a, K, V, G>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over a list's live entries.
///
/// This struct is created by the [`iter`](LinkedList::iter) method on [`LinkedList`].
/// See its documentation for details.
pub struct ListIter<'g, K, V, G> {
    raw: raw::Iter<'g, K, V, G>,
}

impl<'g, K: 'g, V: 'g, G> Iterator for ListIter<'g, K, V, G>
where
    G: Guard,
{
    type Item = (&'g K, &'g V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.raw.next()
    }
}

impl<K, V, G> fmt::Debug for ListIter<'_, K, V, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListIter").finish_non_exhaustive()
    }
}
