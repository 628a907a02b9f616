#![allow(unstable_name_collisions)]
#![deny(unsafe_op_in_unsafe_fn)]
#![doc = include_str!("../README.md")]

mod hasher;
mod list;
mod map;
mod raw;

#[cfg(feature = "serde")]
mod serde_impls;

pub use list::{LinkedList, LinkedListBuilder, ListIter, ListRef, OccupiedError, Removed};
pub use map::{Iter, MapRef, ShardedMap, ShardedMapBuilder, DEFAULT_BUCKETS};
pub use seize::{Guard, LocalGuard, OwnedGuard};
