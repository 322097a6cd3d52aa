//! A threaded red-black tree map for Rust.
//!
//! This crate provides [`RBTreeMap`], an ordered key-value map built on a red-black tree
//! whose nodes are also chained in ascending key order. The chain (the *thread*) makes
//! every iterator or cursor step O(1) and gives O(1) access to the smallest and largest
//! entries, while lookups, insertions and removals stay O(log n).
//!
//! # Example
//!
//! ```
//! use threaded_rbtree::RBTreeMap;
//!
//! let mut scores = RBTreeMap::new();
//! scores.insert("Carol", 92);
//! scores.insert("Alice", 100);
//! scores.insert("Bob", 85);
//!
//! assert_eq!(scores.get(&"Bob"), Some(&85));
//! assert_eq!(scores.first_key_value(), Some((&"Alice", &100)));
//!
//! // Cursors walk the thread in either direction.
//! let mut cursor = scores.find(&"Bob");
//! cursor.move_prev();
//! assert_eq!(cursor.key(), Some(&"Alice"));
//!
//! // `at` reports a missing key as an error instead of panicking.
//! assert!(scores.at(&"Dave").is_err());
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library dependency
//! - **Threaded traversal** - `prev`/`next` links between neighbouring keys
//! - **Cursors** - forward, reverse and mutable cursors with an explicit end position
//! - **Self-check** - [`RBTreeMap::check_invariants`] verifies coloring, ordering and threading
//!
//! # Implementation
//!
//! Nodes live in a slot arena and refer to each other by index. Every node carries its
//! tree links (parent, left, right) and its thread links (prev, next); both sets are
//! updated together by insertion and removal, which rebalance with the classic
//! red-black fixups.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
// NOTE: `IterMut` needs unsafe code to hand out disjoint mutable borrows of arena slots.
// #![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod error;
mod raw;

pub mod rbtree_map;

pub use error::{InvariantViolation, OutOfRange};
pub use rbtree_map::RBTreeMap;
