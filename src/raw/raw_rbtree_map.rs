use alloc::vec::Vec;
use core::borrow::Borrow;
use core::cmp::Ordering;

use smallvec::SmallVec;

use super::arena::Arena;
use super::handle::Handle;
use super::node::{Color, Node, Side};
use crate::error::InvariantViolation;

/// The red-black tree engine backing `RBTreeMap`.
///
/// Tree links and thread links are only ever changed together, inside
/// `insert` and `remove`, so the ascending `prev`/`next` chain always matches
/// the in-order sequence of the tree.
#[derive(Clone)]
pub(crate) struct RawRBTreeMap<K, V> {
    /// Arena storing all nodes.
    nodes: Arena<Node<K, V>>,
    /// Handle to the root node, if the tree is non-empty.
    root: Option<Handle>,
    /// Number of key-value pairs in the tree.
    len: usize,
    /// The node with the smallest key, where forward traversal starts.
    first: Option<Handle>,
    /// The node with the largest key, where backward traversal starts.
    last: Option<Handle>,
}

impl<K, V> RawRBTreeMap<K, V> {
    /// Creates a new, empty tree.
    pub(crate) const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            root: None,
            len: 0,
            first: None,
            last: None,
        }
    }

    /// Creates a new tree with room for `capacity` nodes.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Arena::with_capacity(capacity),
            root: None,
            len: 0,
            first: None,
            last: None,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    pub(crate) const fn first(&self) -> Option<Handle> {
        self.first
    }

    pub(crate) const fn last(&self) -> Option<Handle> {
        self.last
    }

    /// Thread end on the given side (`Left` = first).
    fn end(&self, side: Side) -> Option<Handle> {
        match side {
            Side::Left => self.first,
            Side::Right => self.last,
        }
    }

    fn set_end(&mut self, side: Side, handle: Option<Handle>) {
        match side {
            Side::Left => self.first = handle,
            Side::Right => self.last = handle,
        }
    }

    #[inline]
    pub(crate) fn node(&self, handle: Handle) -> &Node<K, V> {
        self.nodes.get(handle)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, handle: Handle) -> &mut Node<K, V> {
        self.nodes.get_mut(handle)
    }

    /// Returns a mutable reference to a node through a raw pointer to the tree.
    ///
    /// # Safety
    /// - `ptr` must point to a live `RawRBTreeMap<K, V>` whose structure is not modified during `'a`.
    /// - No other reference to the node at `handle` may be alive for `'a`.
    pub(crate) unsafe fn node_mut_ptr<'a>(ptr: *mut Self, handle: Handle) -> &'a mut Node<K, V> {
        // SAFETY: only the `nodes` field is touched, and only the single slot at `handle`.
        unsafe { Arena::get_mut_ptr(core::ptr::addr_of_mut!((*ptr).nodes), handle) }
    }

    #[inline]
    fn is_red(&self, handle: Option<Handle>) -> bool {
        handle.is_some_and(|h| self.node(h).is_red())
    }

    fn set_color(&mut self, handle: Handle, color: Color) {
        self.node_mut(handle).set_color(color);
    }

    /// Drops every node in a single pass over the arena.
    pub(crate) fn clear(&mut self) {
        log::trace!("clearing tree of {} nodes", self.len);
        self.nodes.clear();
        self.root = None;
        self.len = 0;
        self.first = None;
        self.last = None;
    }

    /// Moves all key-value pairs out in ascending order by walking the thread.
    pub(crate) fn drain_to_vec(&mut self) -> Vec<(K, V)> {
        log::trace!("draining tree of {} nodes", self.len);
        let mut result = Vec::with_capacity(self.len);
        let mut current = self.first;
        while let Some(handle) = current {
            let node = self.nodes.remove(handle);
            current = node.next();
            result.push(node.into_key_value());
        }
        self.clear();
        result
    }

    /// Points `parent`'s link to `old` at `new` instead (or the root, when `parent` is `None`).
    fn replace_child(&mut self, parent: Option<Handle>, old: Handle, new: Option<Handle>) {
        match parent {
            None => self.root = new,
            Some(parent) => {
                let side = self
                    .node(parent)
                    .side_of(old)
                    .expect("`RawRBTreeMap::replace_child()` - `old` is not a child of `parent`!");
                self.node_mut(parent).set_child(side, new);
            }
        }
    }

    /// Rotates `pivot` down towards `dir`; its child on the other side takes its place.
    ///
    /// `rotate(p, Side::Left)` is the classic left rotation.
    fn rotate(&mut self, pivot: Handle, dir: Side) {
        let up = dir.opposite();
        let child = self
            .node(pivot)
            .child(up)
            .expect("`RawRBTreeMap::rotate()` - pivot has no child to rotate up!");

        let inner = self.node(child).child(dir);
        self.node_mut(pivot).set_child(up, inner);
        if let Some(inner) = inner {
            self.node_mut(inner).set_parent(Some(pivot));
        }

        let parent = self.node(pivot).parent();
        self.node_mut(child).set_parent(parent);
        self.replace_child(parent, pivot, Some(child));

        self.node_mut(child).set_child(dir, Some(pivot));
        self.node_mut(pivot).set_parent(Some(child));
    }

    /// Links the fresh node `handle` as `parent`'s child on `side`, and threads it
    /// between `parent` and `parent`'s old neighbour on that side.
    fn link_leaf(&mut self, parent: Handle, side: Side, handle: Handle) {
        let outer = self.node(parent).neighbour(side);

        let node = self.node_mut(handle);
        node.set_parent(Some(parent));
        node.set_neighbour(side, outer);
        node.set_neighbour(side.opposite(), Some(parent));

        let parent_node = self.node_mut(parent);
        parent_node.set_child(side, Some(handle));
        parent_node.set_neighbour(side, Some(handle));

        match outer {
            Some(outer) => self.node_mut(outer).set_neighbour(side.opposite(), Some(handle)),
            None => self.set_end(side, Some(handle)),
        }
    }

    /// Restores the red-black rules after linking the red node `node`.
    fn insert_fixup(&mut self, mut node: Handle) {
        while let Some(parent) = self.node(node).parent() {
            if !self.node(parent).is_red() {
                break;
            }

            // A red node is never the root, so it has a parent.
            let grandparent = self
                .node(parent)
                .parent()
                .expect("`RawRBTreeMap::insert_fixup()` - red node has no parent!");
            let side = self
                .node(grandparent)
                .side_of(parent)
                .expect("`RawRBTreeMap::insert_fixup()` - broken parent link!");
            let uncle = self.node(grandparent).child(side.opposite());

            if let Some(uncle) = uncle.filter(|&u| self.node(u).is_red()) {
                self.set_color(parent, Color::Black);
                self.set_color(uncle, Color::Black);
                self.set_color(grandparent, Color::Red);
                node = grandparent;
                continue;
            }

            let mut parent = parent;
            if self.node(parent).child(side.opposite()) == Some(node) {
                // Inner grandchild: turn it into the outer shape first.
                self.rotate(parent, side);
                parent = node;
            }
            self.set_color(parent, Color::Black);
            self.set_color(grandparent, Color::Red);
            self.rotate(grandparent, side.opposite());
            break;
        }

        if let Some(root) = self.root {
            self.set_color(root, Color::Black);
        }
    }

    /// Removes the node at `handle` from the tree and the thread and returns its pair.
    pub(crate) fn remove(&mut self, handle: Handle) -> (K, V) {
        let node = self.node(handle);
        let (parent, left, right, color) = (node.parent(), node.left(), node.right(), node.color());

        // `child` is whatever now occupies the slot that lost a node, `child_parent` its parent.
        let (child, child_parent, removed_color) = match (left, right) {
            (Some(left), Some(right)) => {
                // With a left subtree, the in-order predecessor is the thread's `prev`.
                let pred = self
                    .node(handle)
                    .prev()
                    .expect("`RawRBTreeMap::remove()` - node with a left subtree has no predecessor!");
                debug_assert!(self.node(pred).right().is_none());

                let pred_color = self.node(pred).color();
                let pred_left = self.node(pred).left();

                let child_parent = if pred == left {
                    pred
                } else {
                    let pred_parent = self
                        .node(pred)
                        .parent()
                        .expect("`RawRBTreeMap::remove()` - predecessor has no parent!");
                    self.node_mut(pred_parent).set_child(Side::Right, pred_left);
                    if let Some(pred_left) = pred_left {
                        self.node_mut(pred_left).set_parent(Some(pred_parent));
                    }
                    self.node_mut(pred).set_child(Side::Left, Some(left));
                    self.node_mut(left).set_parent(Some(pred));
                    pred_parent
                };

                // Move the predecessor node itself into the removed node's position.
                self.replace_child(parent, handle, Some(pred));
                let moved = self.node_mut(pred);
                moved.set_parent(parent);
                moved.set_child(Side::Right, Some(right));
                moved.set_color(color);
                self.node_mut(right).set_parent(Some(pred));

                (pred_left, Some(child_parent), pred_color)
            }
            (only, None) | (None, only) => {
                self.replace_child(parent, handle, only);
                if let Some(only) = only {
                    self.node_mut(only).set_parent(parent);
                }
                (only, parent, color)
            }
        };

        if removed_color == Color::Black {
            self.remove_fixup(child, child_parent);
        }

        self.unthread(handle);
        self.len -= 1;
        self.nodes.remove(handle).into_key_value()
    }

    /// Restores the red-black rules after a black node left the tree.
    ///
    /// `node` (possibly an empty slot) is short one black; `parent` is its parent.
    fn remove_fixup(&mut self, mut node: Option<Handle>, mut parent: Option<Handle>) {
        while let Some(p) = parent {
            if self.is_red(node) {
                break;
            }

            let side = match node {
                Some(n) => self
                    .node(p)
                    .side_of(n)
                    .expect("`RawRBTreeMap::remove_fixup()` - broken parent link!"),
                None if self.node(p).left().is_none() => Side::Left,
                None => Side::Right,
            };
            let far_side = side.opposite();

            // The short side has black height >= 1 on the other side, so a sibling exists.
            let mut sibling = self
                .node(p)
                .child(far_side)
                .expect("`RawRBTreeMap::remove_fixup()` - doubly-black node has no sibling!");

            if self.node(sibling).is_red() {
                self.set_color(sibling, Color::Black);
                self.set_color(p, Color::Red);
                self.rotate(p, side);
                sibling = self
                    .node(p)
                    .child(far_side)
                    .expect("`RawRBTreeMap::remove_fixup()` - sibling lost after rotation!");
            }

            let near = self.node(sibling).child(side);
            let far = self.node(sibling).child(far_side);

            if !self.is_red(near) && !self.is_red(far) {
                self.set_color(sibling, Color::Red);
                node = Some(p);
                parent = self.node(p).parent();
                continue;
            }

            if !self.is_red(far) {
                let near = near.expect("`RawRBTreeMap::remove_fixup()` - red near nephew is missing!");
                self.set_color(near, Color::Black);
                self.set_color(sibling, Color::Red);
                self.rotate(sibling, far_side);
                sibling = self
                    .node(p)
                    .child(far_side)
                    .expect("`RawRBTreeMap::remove_fixup()` - sibling lost after rotation!");
            }

            let parent_color = self.node(p).color();
            self.set_color(sibling, parent_color);
            self.set_color(p, Color::Black);
            if let Some(far) = self.node(sibling).child(far_side) {
                self.set_color(far, Color::Black);
            }
            self.rotate(p, side);
            node = self.root;
            break;
        }

        if let Some(node) = node {
            self.set_color(node, Color::Black);
        }
    }

    /// Splices `handle` out of the ascending thread.
    fn unthread(&mut self, handle: Handle) {
        let node = self.node(handle);
        let (prev, next) = (node.prev(), node.next());
        match prev {
            Some(prev) => self.node_mut(prev).set_next(next),
            None => self.first = next,
        }
        match next {
            Some(next) => self.node_mut(next).set_prev(prev),
            None => self.last = prev,
        }
    }

    /// Removes the first or last pair of the map.
    pub(crate) fn pop_end(&mut self, side: Side) -> Option<(K, V)> {
        let handle = self.end(side)?;
        Some(self.remove(handle))
    }

    /// Keeps only the pairs for which `f` returns `true`, visiting in ascending order.
    pub(crate) fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let before = self.len;
        let mut current = self.first;
        while let Some(handle) = current {
            let node = self.node_mut(handle);
            current = node.next();
            let (key, value) = node.key_value_mut();
            if !f(key, value) {
                self.remove(handle);
            }
        }
        log::trace!("retain removed {} of {} nodes", before - self.len, before);
    }
}

impl<K: Ord, V> RawRBTreeMap<K, V> {
    /// Finds the node holding `key`.
    pub(crate) fn search<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.node(handle);
            current = match key.cmp(node.key().borrow()) {
                Ordering::Less => node.left(),
                Ordering::Greater => node.right(),
                Ordering::Equal => return Some(handle),
            };
        }
        None
    }

    /// Inserts `key` if it is not present yet.
    ///
    /// Returns the node holding `key` and whether it was newly inserted. When the key
    /// already exists the map is unchanged and the offered pair is dropped.
    pub(crate) fn insert(&mut self, key: K, value: V) -> (Handle, bool) {
        let Some(mut current) = self.root else {
            let handle = self.nodes.insert(Node::new(key, value, Color::Black));
            self.root = Some(handle);
            self.first = Some(handle);
            self.last = Some(handle);
            self.len = 1;
            return (handle, true);
        };

        let side = loop {
            let node = self.node(current);
            let side = match key.cmp(node.key()) {
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
                Ordering::Equal => return (current, false),
            };
            match node.child(side) {
                Some(child) => current = child,
                None => break side,
            }
        };

        // The node is complete before any link points at it.
        let handle = self.nodes.insert(Node::new(key, value, Color::Red));
        self.link_leaf(current, side, handle);
        self.len += 1;
        self.insert_fixup(handle);
        (handle, true)
    }

    /// Removes `key` and returns its stored pair.
    pub(crate) fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.search(key)?;
        Some(self.remove(handle))
    }

    /// Verifies ordering, coloring, parent links, threading and counts.
    pub(crate) fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.check_structure().inspect_err(|violation| log::debug!("tree invariant violated: {violation}"))
    }

    fn check_structure(&self) -> Result<(), InvariantViolation> {
        let Some(root) = self.root else {
            if self.len != 0 || self.nodes.len() != 0 {
                return Err(InvariantViolation::LengthMismatch {
                    len: self.len,
                    reachable: 0,
                });
            }
            if self.first.is_some() || self.last.is_some() {
                return Err(InvariantViolation::ThreadEndMismatch);
            }
            return Ok(());
        };

        if self.node(root).parent().is_some() {
            return Err(InvariantViolation::ParentLinkMismatch);
        }
        if self.node(root).is_red() {
            return Err(InvariantViolation::RedRoot);
        }

        // Iterative in-order walk. Each stack entry carries the black count from the
        // root down to and including that node.
        let mut stack: SmallVec<[(Handle, usize); 64]> = SmallVec::new();
        let mut descend = Some((root, 0));
        let mut leaf_blacks: Option<usize> = None;
        let mut thread = self.first;
        let mut previous: Option<Handle> = None;
        let mut reachable = 0;

        loop {
            while let Some((handle, above)) = descend {
                let node = self.node(handle);
                let blacks = above + usize::from(!node.is_red());
                for side in [Side::Left, Side::Right] {
                    match node.child(side) {
                        Some(child) => {
                            let child_node = self.node(child);
                            if child_node.parent() != Some(handle) {
                                return Err(InvariantViolation::ParentLinkMismatch);
                            }
                            if node.is_red() && child_node.is_red() {
                                return Err(InvariantViolation::RedRedEdge);
                            }
                        }
                        None => match leaf_blacks {
                            None => leaf_blacks = Some(blacks),
                            Some(expected) if expected != blacks => {
                                return Err(InvariantViolation::BlackHeightMismatch);
                            }
                            Some(_) => {}
                        },
                    }
                }
                stack.push((handle, blacks));
                descend = node.left().map(|left| (left, blacks));
            }

            let Some((handle, blacks)) = stack.pop() else {
                break;
            };
            let node = self.node(handle);
            reachable += 1;

            if thread != Some(handle) || node.prev() != previous {
                return Err(InvariantViolation::ThreadMismatch);
            }
            if let Some(previous) = previous {
                if self.node(previous).key() >= node.key() {
                    return Err(InvariantViolation::OrderViolation);
                }
            }

            previous = Some(handle);
            thread = node.next();
            descend = node.right().map(|right| (right, blacks));
        }

        if thread.is_some() {
            return Err(InvariantViolation::ThreadMismatch);
        }
        if self.last != previous {
            return Err(InvariantViolation::ThreadEndMismatch);
        }
        if reachable != self.len || self.nodes.len() != self.len {
            return Err(InvariantViolation::LengthMismatch {
                len: self.len,
                reachable,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;
    use alloc::vec;
    use proptest::prelude::*;

    fn keys_in_thread<K: Copy, V>(tree: &RawRBTreeMap<K, V>) -> Vec<K> {
        let mut keys = Vec::new();
        let mut current = tree.first();
        while let Some(handle) = current {
            keys.push(*tree.node(handle).key());
            current = tree.node(handle).next();
        }
        keys
    }

    fn keys_in_reverse_thread<K: Copy, V>(tree: &RawRBTreeMap<K, V>) -> Vec<K> {
        let mut keys = Vec::new();
        let mut current = tree.last();
        while let Some(handle) = current {
            keys.push(*tree.node(handle).key());
            current = tree.node(handle).prev();
        }
        keys
    }

    fn tree_from(keys: &[i32]) -> RawRBTreeMap<i32, i32> {
        let mut tree = RawRBTreeMap::new();
        for &key in keys {
            tree.insert(key, key * 10);
            tree.check_invariants().unwrap();
        }
        tree
    }

    fn height<K, V>(tree: &RawRBTreeMap<K, V>, handle: Option<Handle>) -> usize {
        handle.map_or(0, |h| {
            let node = tree.node(h);
            1 + height(tree, node.left()).max(height(tree, node.right()))
        })
    }

    #[test]
    fn empty_tree_is_valid() {
        let tree: RawRBTreeMap<i32, i32> = RawRBTreeMap::new();
        assert_eq!(tree.check_invariants(), Ok(()));
        assert!(tree.is_empty());
        assert_eq!(tree.first(), None);
        assert_eq!(tree.last(), None);
    }

    #[test]
    fn first_insert_becomes_black_root_and_both_ends() {
        let mut tree = RawRBTreeMap::new();
        let (handle, inserted) = tree.insert(1, "a");
        assert!(inserted);
        assert_eq!(tree.root, Some(handle));
        assert_eq!(tree.first(), Some(handle));
        assert_eq!(tree.last(), Some(handle));
        assert_eq!(tree.node(handle).color(), Color::Black);
    }

    #[test]
    fn duplicate_insert_keeps_existing_value() {
        let mut tree = RawRBTreeMap::new();
        let (first, _) = tree.insert(7, "old");
        let (again, inserted) = tree.insert(7, "new");
        assert!(!inserted);
        assert_eq!(first, again);
        assert_eq!(*tree.node(first).value(), "old");
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn ascending_inserts_rotate_into_balance() {
        let tree = tree_from(&[1, 2, 3]);
        let root = tree.root.unwrap();
        assert_eq!(*tree.node(root).key(), 2);
        assert_eq!(keys_in_thread(&tree), vec![1, 2, 3]);
    }

    #[test]
    fn inner_grandchild_takes_double_rotation() {
        let tree = tree_from(&[3, 1, 2]);
        let root = tree.root.unwrap();
        assert_eq!(*tree.node(root).key(), 2);
        assert!(tree.node(tree.node(root).left().unwrap()).is_red());
        assert!(tree.node(tree.node(root).right().unwrap()).is_red());
    }

    #[test]
    fn thread_matches_example_sequence() {
        let tree = tree_from(&[5, 3, 8, 1, 4]);
        assert_eq!(keys_in_thread(&tree), vec![1, 3, 4, 5, 8]);
        assert_eq!(keys_in_reverse_thread(&tree), vec![8, 5, 4, 3, 1]);
    }

    #[test]
    fn height_stays_logarithmic_for_sorted_input() {
        let keys: Vec<i32> = (0..4096).collect();
        let tree = tree_from(&keys);
        // A red-black tree of n nodes has height <= 2 * log2(n + 1).
        assert!(height(&tree, tree.root) <= 2 * 13);
    }

    #[test]
    fn remove_leaf_one_child_and_two_children() {
        let mut tree = tree_from(&[50, 30, 70, 20, 40, 60, 80, 35]);

        // Leaf.
        assert_eq!(tree.remove_entry(&20), Some((20, 200)));
        tree.check_invariants().unwrap();

        // Node whose predecessor is deeper than its left child.
        assert_eq!(tree.remove_entry(&50), Some((50, 500)));
        tree.check_invariants().unwrap();

        // Node whose left child is its predecessor.
        assert_eq!(tree.remove_entry(&70), Some((70, 700)));
        tree.check_invariants().unwrap();

        assert_eq!(keys_in_thread(&tree), vec![30, 35, 40, 60, 80]);
        assert_eq!(tree.remove_entry(&50), None);
    }

    #[test]
    fn two_child_removal_moves_the_predecessor_node() {
        let mut tree = tree_from(&[2, 1, 3]);
        let pred = tree.search(&1).unwrap();
        let successor = tree.search(&3).unwrap();
        tree.remove_entry(&2);
        // The predecessor keeps its handle and now sits at the top.
        assert_eq!(tree.root, Some(pred));
        assert_eq!(tree.node(pred).right(), Some(successor));
        assert_eq!(tree.node(successor).parent(), Some(pred));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn removing_extremes_moves_thread_ends() {
        let mut tree = tree_from(&[1, 2, 3, 4]);
        assert_eq!(tree.pop_end(Side::Left), Some((1, 10)));
        assert_eq!(*tree.node(tree.first().unwrap()).key(), 2);
        assert_eq!(tree.pop_end(Side::Right), Some((4, 40)));
        assert_eq!(*tree.node(tree.last().unwrap()).key(), 3);
        assert_eq!(tree.node(tree.first().unwrap()).prev(), None);
        assert_eq!(tree.node(tree.last().unwrap()).next(), None);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn removing_everything_empties_the_ends() {
        let mut tree = tree_from(&[4, 2, 6, 1, 3, 5, 7]);
        for key in [4, 1, 7, 2, 6, 3, 5] {
            tree.remove_entry(&key).unwrap();
            tree.check_invariants().unwrap();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.root, None);
        assert_eq!(tree.first(), None);
        assert_eq!(tree.last(), None);
    }

    #[test]
    fn clear_resets_everything() {
        let mut tree = tree_from(&[3, 1, 2]);
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.check_invariants(), Ok(()));
        tree.insert(9, 90);
        assert_eq!(keys_in_thread(&tree), vec![9]);
    }

    #[test]
    fn drain_yields_ascending_pairs() {
        let mut tree = tree_from(&[3, 1, 2]);
        assert_eq!(tree.drain_to_vec(), vec![(1, 10), (2, 20), (3, 30)]);
        assert!(tree.is_empty());
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn retain_keeps_thread_consistent() {
        let mut tree = tree_from(&(0..64).collect::<Vec<_>>());
        tree.retain(|k, v| {
            *v += 1;
            k % 3 == 0
        });
        tree.check_invariants().unwrap();
        assert_eq!(keys_in_thread(&tree), (0..64).filter(|k| k % 3 == 0).collect::<Vec<_>>());
        assert_eq!(*tree.node(tree.search(&3).unwrap()).value(), 31);
    }

    #[test]
    fn detects_red_root() {
        let mut tree = tree_from(&[1]);
        let root = tree.root.unwrap();
        tree.set_color(root, Color::Red);
        assert_eq!(tree.check_invariants(), Err(InvariantViolation::RedRoot));
    }

    #[test]
    fn detects_red_red_edge() {
        // 2 black over 1 and 3 black, 4 red. Reddening 1 and 3 keeps black heights equal.
        let mut tree = tree_from(&[2, 1, 3, 4]);
        for key in [1, 3] {
            let handle = tree.search(&key).unwrap();
            tree.set_color(handle, Color::Red);
        }
        assert_eq!(tree.check_invariants(), Err(InvariantViolation::RedRedEdge));
    }

    #[test]
    fn detects_black_height_mismatch() {
        let mut tree = tree_from(&[2, 1, 3]);
        let one = tree.search(&1).unwrap();
        tree.set_color(one, Color::Black);
        assert_eq!(tree.check_invariants(), Err(InvariantViolation::BlackHeightMismatch));
    }

    #[test]
    fn detects_broken_thread() {
        let mut tree = tree_from(&[2, 1, 3]);
        let one = tree.search(&1).unwrap();
        tree.node_mut(one).set_next(None);
        assert_eq!(tree.check_invariants(), Err(InvariantViolation::ThreadMismatch));
    }

    #[test]
    fn detects_stale_last() {
        let mut tree = tree_from(&[2, 1, 3]);
        tree.last = tree.search(&2);
        let two = tree.search(&2).unwrap();
        let three = tree.search(&3).unwrap();
        // Keep the chain itself intact so only the end pointer is wrong.
        assert_eq!(tree.node(two).next(), Some(three));
        assert_eq!(tree.check_invariants(), Err(InvariantViolation::ThreadEndMismatch));
    }

    #[test]
    fn detects_order_violation() {
        let mut tree = RawRBTreeMap::new();
        let (root, _) = tree.insert(2, ());
        // Force a right child with a smaller key past `insert`.
        let bad = tree.nodes.insert(Node::new(1, (), Color::Red));
        tree.link_leaf(root, Side::Right, bad);
        tree.len += 1;
        assert_eq!(tree.check_invariants(), Err(InvariantViolation::OrderViolation));
    }

    #[test]
    fn detects_length_mismatch() {
        let mut tree = tree_from(&[1, 2]);
        tree.len = 5;
        assert_eq!(
            tree.check_invariants(),
            Err(InvariantViolation::LengthMismatch {
                len: 5,
                reachable: 2
            })
        );
    }

    #[test]
    fn clone_is_independent() {
        let tree = tree_from(&[1, 2, 3]);
        let mut copy = tree.clone();
        copy.remove_entry(&2);
        *copy.node_mut(copy.search(&1).unwrap()).value_mut() = 0;
        assert_eq!(keys_in_thread(&tree), vec![1, 2, 3]);
        assert_eq!(*tree.node(tree.search(&1).unwrap()).value(), 10);
        copy.check_invariants().unwrap();
    }

    #[derive(Clone, Debug)]
    enum Op {
        Insert(i16),
        Remove(i16),
        PopFirst,
        PopLast,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (-300i16..300).prop_map(Op::Insert),
            4 => (-300i16..300).prop_map(Op::Remove),
            1 => Just(Op::PopFirst),
            1 => Just(Op::PopLast),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn invariants_hold_through_random_operations(ops in prop::collection::vec(op_strategy(), 0..600)) {
            let mut tree: RawRBTreeMap<i16, u32> = RawRBTreeMap::new();
            let mut model: BTreeMap<i16, u32> = BTreeMap::new();

            for (step, op) in ops.iter().enumerate() {
                let step = step as u32;
                match *op {
                    Op::Insert(k) => {
                        let (_, inserted) = tree.insert(k, step);
                        let expected = !model.contains_key(&k);
                        model.entry(k).or_insert(step);
                        prop_assert_eq!(inserted, expected);
                    }
                    Op::Remove(k) => {
                        prop_assert_eq!(tree.remove_entry(&k), model.remove_entry(&k));
                    }
                    Op::PopFirst => prop_assert_eq!(tree.pop_end(Side::Left), model.pop_first()),
                    Op::PopLast => prop_assert_eq!(tree.pop_end(Side::Right), model.pop_last()),
                }
                prop_assert_eq!(tree.check_invariants(), Ok(()), "after {:?}", op);
                prop_assert_eq!(tree.len(), model.len());
            }

            let keys: Vec<i16> = model.keys().copied().collect();
            prop_assert_eq!(keys_in_thread(&tree), keys);
        }
    }
}
