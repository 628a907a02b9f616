use std::borrow::Borrow;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use seize::{reclaim, Guard};

use super::utils::{trace, untagged, AtomicPtrFetchOps, StrictProvenance, Unpack};
use crate::list::Removed;

/// An unordered lock-free list of key-value nodes.
///
/// Every operation takes a guard, and all nodes and values are retired to the collector
/// that guard belongs to. The caller is responsible for passing guards of a single collector,
/// which is why most methods are `unsafe`.
pub struct RawList<K, V> {
    /// The first node of the list, never tagged.
    head: AtomicPtr<Node<K, V>>,

    _kv: PhantomData<*const (K, V)>,
}

// A node in the list.
pub struct Node<K, V> {
    /// The key for this node.
    pub key: K,

    /// The current value, owned by the node. Replaced values are retired separately.
    value: AtomicPtr<V>,

    /// The next node. Tagged with `MARKED` once the node is being unlinked.
    next: AtomicPtr<Node<K, V>>,

    /// Whether the node is logically live. Only ever goes from `true` to `false`.
    active: AtomicBool,
}

/// The node is being unlinked, its `next` pointer is frozen.
const MARKED: usize = 0b1;

impl<K, V> Unpack for Node<K, V> {
    /// Mask for a node pointer, ignoring the mark bit.
    const MASK: usize = !MARKED;
}

impl<K, V> Node<K, V> {
    fn alloc(key: K, value: V) -> *mut Node<K, V> {
        Box::into_raw(Box::new(Node {
            key,
            value: AtomicPtr::new(Box::into_raw(Box::new(value))),
            next: AtomicPtr::new(ptr::null_mut()),
            active: AtomicBool::new(true),
        }))
    }

    // Frees a node that was never published, without dropping its value.
    //
    // Safety: `node` must be a valid, unshared node allocated by `Node::alloc`.
    unsafe fn discard(node: *mut Node<K, V>) {
        let mut node = unsafe { Box::from_raw(node) };
        *node.value.get_mut() = ptr::null_mut();
    }
}

impl<K, V> Drop for Node<K, V> {
    fn drop(&mut self) {
        let value = *self.value.get_mut();
        if !value.is_null() {
            // Safety: the node owns its current value.
            let _ = unsafe { Box::from_raw(value) };
        }
    }
}

// Where a scan stopped.
enum Position<'a, K, V> {
    /// A live node matching the key, along with the link slot that pointed to it.
    Found {
        prev: &'a AtomicPtr<Node<K, V>>,
        node: *mut Node<K, V>,
    },

    /// No live node matched. `slot` is the link slot the scan ended on.
    Tail { slot: &'a AtomicPtr<Node<K, V>> },
}

// The raw result of an insert operation.
pub enum InsertResult<'g, V> {
    /// Appended a new node.
    Inserted(&'g V),

    /// Replaced the value of a live node.
    Replaced(&'g V),

    /// Did not insert because the key was present.
    Error { current: &'g V, not_inserted: V },
}

impl<K, V> RawList<K, V> {
    /// Creates an empty list.
    pub const fn new() -> RawList<K, V> {
        RawList {
            head: AtomicPtr::new(ptr::null_mut()),
            _kv: PhantomData,
        }
    }

    /// Returns an iterator over the live entries of the list.
    ///
    /// # Safety
    ///
    /// `guard` must belong to the collector this list retires to.
    #[inline]
    pub unsafe fn iter<'g, G>(&self, guard: &'g G) -> Iter<'g, K, V, G>
    where
        G: Guard,
    {
        Iter {
            next: guard.protect(&self.head, Ordering::Acquire),
            guard,
        }
    }

    /// Logically deletes every live node, returning how many this call deleted.
    ///
    /// Deleted nodes are then unlinked by a full helping pass.
    ///
    /// # Safety
    ///
    /// `guard` must belong to the collector this list retires to.
    pub unsafe fn clear(&self, guard: &impl Guard) -> usize {
        let mut deleted = 0;
        let mut curr = guard.protect(&self.head, Ordering::Acquire);

        while !curr.is_null() {
            // Safety: `curr` is non-null and was loaded under the guard.
            let node = unsafe { &*curr };

            if node
                .active
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                deleted += 1;
            }

            curr = guard.protect(&node.next, Ordering::Acquire).unpack().ptr;
        }

        // Safety: guaranteed by caller.
        unsafe { self.purge(guard) };
        deleted
    }

    /// Walks the whole list, unlinking any logically deleted nodes.
    ///
    /// # Safety
    ///
    /// `guard` must belong to the collector this list retires to.
    pub unsafe fn purge(&self, guard: &impl Guard) {
        // Safety: guaranteed by caller.
        let _ = unsafe { self.find(&self.head, |_| false, guard) };
    }

    // Scans for a live node whose key satisfies `eq`, starting at the link slot `start`.
    //
    // Any logically deleted node met along the way is marked and spliced out of its
    // predecessor. If splicing fails the predecessor changed under us, and the scan
    // restarts from the head.
    //
    // Safety: `start` must be the head or a link slot of a node protected by `guard`,
    // and `guard` must belong to the collector this list retires to.
    unsafe fn find<'a, G>(
        &'a self,
        start: &'a AtomicPtr<Node<K, V>>,
        eq: impl Fn(&K) -> bool,
        guard: &'a G,
    ) -> Position<'a, K, V>
    where
        G: Guard,
    {
        let mut start = start;

        'scan: loop {
            let mut prev = start;
            let mut curr = guard.protect(prev, Ordering::Acquire).unpack();

            loop {
                if curr.ptr.is_null() {
                    return Position::Tail { slot: prev };
                }

                // Safety: `curr` is non-null and was loaded under the guard.
                let node = unsafe { &*curr.ptr };
                let next = guard.protect(&node.next, Ordering::Acquire).unpack();

                if next.tag() & MARKED != 0 || !node.active.load(Ordering::Acquire) {
                    // Safety: `prev` pointed to `curr`, and the guard protects both.
                    match unsafe { self.unlink(prev, curr.ptr, guard) } {
                        Some(next) => {
                            curr = untagged(next);
                            continue;
                        }
                        None => {
                            start = &self.head;
                            continue 'scan;
                        }
                    }
                }

                if eq(&node.key) {
                    return Position::Found {
                        prev,
                        node: curr.ptr,
                    };
                }

                prev = &node.next;
                curr = next;
            }
        }
    }

    // Marks a logically deleted node and tries once to splice it out of `prev`.
    //
    // Returns the node's successor if this call unlinked (and retired) the node.
    //
    // Safety: `node` must be logically deleted, protected by `guard`, and `prev` must be
    // the link slot it was found through.
    unsafe fn unlink(
        &self,
        prev: &AtomicPtr<Node<K, V>>,
        node: *mut Node<K, V>,
        guard: &impl Guard,
    ) -> Option<*mut Node<K, V>> {
        // Freeze the successor. Once marked, appends after this node fail and
        // helpers agree on which node to splice in.
        //
        // Safety: guaranteed by caller.
        let next = unsafe { (*node).next.fetch_or(MARKED, Ordering::AcqRel) }.unpack();

        match prev.compare_exchange(node, next.ptr, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                trace!("unlinked node {:p}", node);

                // Safety: our CAS made the node unreachable. Every other CAS on `prev`
                // expecting `node` now fails, so the node is retired exactly once.
                unsafe { guard.defer_retire(node, reclaim::boxed::<Node<K, V>>) };
                Some(next.ptr)
            }
            Err(_found) => {
                trace!(
                    "failed to unlink node {:p}, predecessor now holds {:p}",
                    node,
                    _found
                );
                None
            }
        }
    }
}

impl<K, V> RawList<K, V>
where
    K: Eq,
{
    /// Returns the live entry for the given key.
    ///
    /// # Safety
    ///
    /// `guard` must belong to the collector this list retires to.
    #[inline]
    pub unsafe fn get<'g, Q>(&self, key: &Q, guard: &'g impl Guard) -> Option<(&'g K, &'g V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        // Safety: guaranteed by caller.
        match unsafe { self.find(&self.head, |k| k.borrow() == key, guard) } {
            Position::Found { node, .. } => {
                // Safety: the node is protected by the guard, and so is every value it
                // has ever held. The value stays readable after the node is removed.
                unsafe {
                    let value = guard.protect(&(*node).value, Ordering::Acquire);
                    Some((&(*node).key, &*value))
                }
            }
            Position::Tail { .. } => None,
        }
    }

    /// Inserts a key-value pair, replacing the value of a live node with the same key
    /// if `replace` is set.
    ///
    /// # Safety
    ///
    /// `guard` must belong to the collector this list retires to.
    pub unsafe fn insert<'g>(
        &self,
        key: K,
        value: V,
        replace: bool,
        guard: &'g impl Guard,
    ) -> InsertResult<'g, V> {
        let new_node = Node::alloc(key, value);

        // Safety: `new_node` is ours until it is published.
        let (new_key, new_value) = unsafe {
            (
                &(*new_node).key,
                (*new_node).value.load(Ordering::Relaxed),
            )
        };

        let mut start = &self.head;

        'insert: loop {
            // Safety: `start` is the head, or a link slot of a node protected by the guard.
            match unsafe { self.find(start, |k| k == new_key, guard) } {
                // The key is live, update the node in place.
                Position::Found { node, .. } => {
                    // Safety: the node is protected by the guard.
                    let node = unsafe { &*node };
                    let mut current = guard.protect(&node.value, Ordering::Acquire);

                    if !replace {
                        // Safety: `new_node` was never published, and its value was never
                        // shared.
                        let not_inserted = unsafe {
                            Node::discard(new_node);
                            *Box::from_raw(new_value)
                        };

                        return InsertResult::Error {
                            // Safety: values are protected by the guard.
                            current: unsafe { &*current },
                            not_inserted,
                        };
                    }

                    loop {
                        // Writing into a deleted node would lose the update. The node is
                        // still ours to append, so look again.
                        if !node.active.load(Ordering::Acquire) {
                            start = &self.head;
                            continue 'insert;
                        }

                        match node.value.compare_exchange_weak(
                            current,
                            new_value,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        ) {
                            Ok(_) => unsafe {
                                // Safety: the value moved into `node`, free the empty shell.
                                Node::discard(new_node);

                                // Safety: our CAS made the old value unreachable.
                                guard.defer_retire(current, reclaim::boxed::<V>);

                                return InsertResult::Replaced(&*current);
                            },

                            // Lost to a concurrent update, retry.
                            Err(_) => {
                                trace!("lost value update race, retrying");
                                current = guard.protect(&node.value, Ordering::Acquire);
                            }
                        }
                    }
                }

                // The key is absent, append at the tail.
                Position::Tail { slot } => {
                    match slot.compare_exchange(
                        ptr::null_mut(),
                        new_node,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        // Safety: the node is published and protected by the guard.
                        Ok(_) => return InsertResult::Inserted(unsafe { &*new_value }),

                        // The tail belongs to a node that is being unlinked.
                        Err(found) if found.unpack().tag() & MARKED != 0 => {
                            trace!("tail node was deleted, restarting from the head");
                            start = &self.head;
                        }

                        // Lost the append to a concurrent insert, which may be for the
                        // same key. Resume from the slot we lost.
                        Err(_) => {
                            trace!("lost tail append race, resuming scan");
                            start = slot;
                        }
                    }
                }
            }
        }
    }

    /// Removes the live node for the given key.
    ///
    /// # Safety
    ///
    /// `guard` must belong to the collector this list retires to.
    pub unsafe fn remove<Q>(&self, key: &Q, guard: &impl Guard) -> Removed
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        // Safety: guaranteed by caller.
        match unsafe { self.find(&self.head, |k| k.borrow() == key, guard) } {
            // Safety: `prev` pointed to `node` when it was found.
            Position::Found { prev, node } => unsafe { self.delete(prev, node, guard) },
            Position::Tail { .. } => Removed::NotFound,
        }
    }

    /// Removes the live node for the given key, running `between` after the node is found
    /// and before it is deleted.
    ///
    /// # Safety
    ///
    /// `guard` must belong to the collector this list retires to.
    #[cfg(test)]
    pub unsafe fn remove_interleaved<Q>(
        &self,
        key: &Q,
        between: impl FnOnce(),
        guard: &impl Guard,
    ) -> Removed
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        // Safety: guaranteed by caller.
        match unsafe { self.find(&self.head, |k| k.borrow() == key, guard) } {
            Position::Found { prev, node } => {
                between();

                // Safety: `prev` pointed to `node` when it was found.
                unsafe { self.delete(prev, node, guard) }
            }
            Position::Tail { .. } => Removed::NotFound,
        }
    }

    // Logically deletes `node`, then tries once to unlink it from `prev`.
    //
    // Safety: `node` must be protected by `guard`, and `prev` must be the link slot it
    // was found through.
    unsafe fn delete(
        &self,
        prev: &AtomicPtr<Node<K, V>>,
        node: *mut Node<K, V>,
        guard: &impl Guard,
    ) -> Removed {
        // Safety: the node is protected by the guard.
        let active = unsafe { &(*node).active };

        // Logical deletion, this is what makes the key absent.
        if active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Removed::NotFound;
        }

        // Safety: guaranteed by caller.
        match unsafe { self.unlink(prev, node, guard) } {
            Some(_) => Removed::Unlinked,
            None => {
                trace!("left node {:p} for a later traversal to unlink", node);
                Removed::Pending
            }
        }
    }
}

impl<K, V> Drop for RawList<K, V> {
    fn drop(&mut self) {
        let mut node = *self.head.get_mut();

        // Every reachable node is owned by the list. Unlinked nodes were retired
        // to the collector and are freed by it.
        while !node.is_null() {
            // Safety: we have unique access, and reachable nodes are never retired.
            let mut owned = unsafe { Box::from_raw(node) };
            node = owned.next.get_mut().unpack().ptr;
        }
    }
}

/// An iterator over the live entries of a list.
pub struct Iter<'g, K, V, G> {
    next: *mut Node<K, V>,
    guard: &'g G,
}

impl<'g, K: 'g, V: 'g, G> Iterator for Iter<'g, K, V, G>
where
    G: Guard,
{
    type Item = (&'g K, &'g V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        while !self.next.is_null() {
            // Safety: every node reached from the head under the guard is protected.
            let node = unsafe { &*self.next };
            self.next = self.guard.protect(&node.next, Ordering::Acquire).unpack().ptr;

            if node.active.load(Ordering::Acquire) {
                let value = self.guard.protect(&node.value, Ordering::Acquire);

                // Safety: values are protected by the guard.
                return Some((&node.key, unsafe { &*value }));
            }
        }

        None
    }
}
