//! Positional views into an [`RBTreeMap`](crate::RBTreeMap).
//!
//! A cursor names one entry of the map, or the end position just past the last
//! entry. Stepping follows the in-order thread, so each step is O(1).
//!
//! Borrowed accessors (`key`, `value`, `key_value`) are tied to the map borrow the
//! cursor holds, so the map cannot change while they are alive. [`Cursor::snapshot`]
//! returns an owned copy of the current entry that outlives any later mutation.

use core::fmt;
use core::ptr;

use crate::raw::{Handle, RawRBTreeMap};

/// A read-only cursor that steps through a map in ascending key order.
///
/// Created by [`RBTreeMap::find`], [`RBTreeMap::cursor_first`] and
/// [`RBTreeMap::cursor_end`].
///
/// # Examples
///
/// ```
/// use threaded_rbtree::RBTreeMap;
///
/// let map = RBTreeMap::from([(1, "a"), (2, "b"), (3, "c")]);
/// let mut cursor = map.find(&2);
/// assert_eq!(cursor.key_value(), Some((&2, &"b")));
/// cursor.move_next();
/// assert_eq!(cursor.key(), Some(&3));
/// cursor.move_next();
/// assert!(cursor.is_end());
/// cursor.move_prev();
/// assert_eq!(cursor.key(), Some(&3));
/// ```
///
/// [`RBTreeMap::find`]: crate::RBTreeMap::find
/// [`RBTreeMap::cursor_first`]: crate::RBTreeMap::cursor_first
/// [`RBTreeMap::cursor_end`]: crate::RBTreeMap::cursor_end
pub struct Cursor<'a, K, V> {
    tree: &'a RawRBTreeMap<K, V>,
    current: Option<Handle>,
}

/// A read-only cursor that steps through a map in descending key order.
///
/// Its end position lies before the smallest key. Created by
/// [`RBTreeMap::rev_cursor_first`] and [`RBTreeMap::rev_cursor_end`].
///
/// [`RBTreeMap::rev_cursor_first`]: crate::RBTreeMap::rev_cursor_first
/// [`RBTreeMap::rev_cursor_end`]: crate::RBTreeMap::rev_cursor_end
pub struct RevCursor<'a, K, V> {
    tree: &'a RawRBTreeMap<K, V>,
    current: Option<Handle>,
}

/// A cursor with mutable access to values, which can also remove the current entry.
///
/// Created by [`RBTreeMap::find_mut`], [`RBTreeMap::cursor_first_mut`] and
/// [`RBTreeMap::insert`].
///
/// [`RBTreeMap::find_mut`]: crate::RBTreeMap::find_mut
/// [`RBTreeMap::cursor_first_mut`]: crate::RBTreeMap::cursor_first_mut
/// [`RBTreeMap::insert`]: crate::RBTreeMap::insert
pub struct CursorMut<'a, K, V> {
    tree: &'a mut RawRBTreeMap<K, V>,
    current: Option<Handle>,
}

impl<'a, K, V> Cursor<'a, K, V> {
    pub(crate) fn new(tree: &'a RawRBTreeMap<K, V>, current: Option<Handle>) -> Self {
        Cursor { tree, current }
    }

    /// Returns `true` if the cursor is at the end position.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    /// Returns the key at the cursor, or `None` at the end position.
    #[must_use]
    pub fn key(&self) -> Option<&'a K> {
        self.key_value().map(|(k, _)| k)
    }

    /// Returns the value at the cursor, or `None` at the end position.
    #[must_use]
    pub fn value(&self) -> Option<&'a V> {
        self.key_value().map(|(_, v)| v)
    }

    /// Returns the entry at the cursor, or `None` at the end position.
    #[must_use]
    pub fn key_value(&self) -> Option<(&'a K, &'a V)> {
        let node = self.tree.node(self.current?);
        Some((node.key(), node.value()))
    }

    /// Returns an owned copy of the entry at the cursor.
    ///
    /// The copy is independent of the map: it stays valid after the entry is changed
    /// or removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use threaded_rbtree::RBTreeMap;
    ///
    /// let mut map = RBTreeMap::from([(1, String::from("a"))]);
    /// let snapshot = map.find(&1).snapshot();
    /// map.remove(&1);
    /// assert_eq!(snapshot, Some((1, String::from("a"))));
    /// ```
    #[must_use]
    pub fn snapshot(&self) -> Option<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.key_value().map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Moves to the next larger key, or to the end position after the largest key.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is already at the end position.
    pub fn move_next(&mut self) {
        let current = self.current.expect("`Cursor::move_next()` - cursor is already at the end!");
        self.current = self.tree.node(current).next();
    }

    /// Moves to the next smaller key.
    ///
    /// From the end position this moves to the largest key; from the smallest key it
    /// moves to the end position.
    pub fn move_prev(&mut self) {
        self.current = match self.current {
            Some(current) => self.tree.node(current).prev(),
            None => self.tree.last(),
        };
    }
}

impl<'a, K, V> RevCursor<'a, K, V> {
    pub(crate) fn new(tree: &'a RawRBTreeMap<K, V>, current: Option<Handle>) -> Self {
        RevCursor { tree, current }
    }

    /// Returns `true` if the cursor is at the end position.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    /// Returns the key at the cursor, or `None` at the end position.
    #[must_use]
    pub fn key(&self) -> Option<&'a K> {
        self.key_value().map(|(k, _)| k)
    }

    /// Returns the value at the cursor, or `None` at the end position.
    #[must_use]
    pub fn value(&self) -> Option<&'a V> {
        self.key_value().map(|(_, v)| v)
    }

    /// Returns the entry at the cursor, or `None` at the end position.
    #[must_use]
    pub fn key_value(&self) -> Option<(&'a K, &'a V)> {
        let node = self.tree.node(self.current?);
        Some((node.key(), node.value()))
    }

    /// Returns an owned copy of the entry at the cursor.
    #[must_use]
    pub fn snapshot(&self) -> Option<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.key_value().map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Moves to the next smaller key, or to the end position before the smallest key.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is already at the end position.
    pub fn move_next(&mut self) {
        let current = self.current.expect("`RevCursor::move_next()` - cursor is already at the end!");
        self.current = self.tree.node(current).prev();
    }

    /// Moves to the next larger key.
    ///
    /// From the end position this moves to the smallest key; from the largest key it
    /// moves to the end position.
    pub fn move_prev(&mut self) {
        self.current = match self.current {
            Some(current) => self.tree.node(current).next(),
            None => self.tree.first(),
        };
    }
}

impl<'a, K, V> CursorMut<'a, K, V> {
    pub(crate) fn new(tree: &'a mut RawRBTreeMap<K, V>, current: Option<Handle>) -> Self {
        CursorMut { tree, current }
    }

    /// Returns `true` if the cursor is at the end position.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    /// Returns the key at the cursor, or `None` at the end position.
    #[must_use]
    pub fn key(&self) -> Option<&K> {
        self.key_value().map(|(k, _)| k)
    }

    /// Returns the value at the cursor, or `None` at the end position.
    #[must_use]
    pub fn value(&self) -> Option<&V> {
        self.key_value().map(|(_, v)| v)
    }

    /// Returns the entry at the cursor, or `None` at the end position.
    #[must_use]
    pub fn key_value(&self) -> Option<(&K, &V)> {
        let node = self.tree.node(self.current?);
        Some((node.key(), node.value()))
    }

    /// Returns the value at the cursor for in-place mutation.
    ///
    /// # Examples
    ///
    /// ```
    /// use threaded_rbtree::RBTreeMap;
    ///
    /// let mut map = RBTreeMap::from([(1, 10)]);
    /// if let Some(value) = map.find_mut(&1).value_mut() {
    ///     *value += 1;
    /// }
    /// assert_eq!(map[&1], 11);
    /// ```
    pub fn value_mut(&mut self) -> Option<&mut V> {
        Some(self.tree.node_mut(self.current?).value_mut())
    }

    /// Returns the key and a mutable reference to the value at the cursor.
    pub fn key_value_mut(&mut self) -> Option<(&K, &mut V)> {
        Some(self.tree.node_mut(self.current?).key_value_mut())
    }

    /// Converts the cursor into a mutable reference to the current value.
    #[must_use = "`self` will be dropped if the result is not used"]
    pub fn into_value_mut(self) -> Option<&'a mut V> {
        let tree = self.tree;
        Some(tree.node_mut(self.current?).value_mut())
    }

    /// Returns an owned copy of the entry at the cursor.
    #[must_use]
    pub fn snapshot(&self) -> Option<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.key_value().map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Moves to the next larger key, or to the end position after the largest key.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is already at the end position.
    pub fn move_next(&mut self) {
        let current = self.current.expect("`CursorMut::move_next()` - cursor is already at the end!");
        self.current = self.tree.node(current).next();
    }

    /// Moves to the next smaller key; from the end position, to the largest key.
    pub fn move_prev(&mut self) {
        self.current = match self.current {
            Some(current) => self.tree.node(current).prev(),
            None => self.tree.last(),
        };
    }

    /// Removes the entry at the cursor and moves the cursor to the following entry.
    ///
    /// Returns `None`, leaving the map unchanged, at the end position.
    ///
    /// # Examples
    ///
    /// ```
    /// use threaded_rbtree::RBTreeMap;
    ///
    /// let mut map = RBTreeMap::from([(1, "a"), (2, "b"), (3, "c")]);
    /// let mut cursor = map.find_mut(&2);
    /// assert_eq!(cursor.remove_current(), Some((2, "b")));
    /// assert_eq!(cursor.key(), Some(&3));
    /// assert_eq!(map.len(), 2);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        let current = self.current?;
        self.current = self.tree.node(current).next();
        Some(self.tree.remove(current))
    }

    /// Returns a read-only cursor at the same position.
    #[must_use]
    pub fn as_cursor(&self) -> Cursor<'_, K, V> {
        Cursor::new(self.tree, self.current)
    }

    /// Returns a read-only reverse cursor at the same position.
    #[must_use]
    pub fn as_rev_cursor(&self) -> RevCursor<'_, K, V> {
        RevCursor::new(self.tree, self.current)
    }
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Cursor<'_, K, V> {}

impl<K, V> Clone for RevCursor<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for RevCursor<'_, K, V> {}

impl<K, V> PartialEq for Cursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.tree, other.tree) && self.current == other.current
    }
}

impl<K, V> Eq for Cursor<'_, K, V> {}

impl<K, V> PartialEq for RevCursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.tree, other.tree) && self.current == other.current
    }
}

impl<K, V> Eq for RevCursor<'_, K, V> {}

impl<K, V> PartialEq<RevCursor<'_, K, V>> for Cursor<'_, K, V> {
    fn eq(&self, other: &RevCursor<'_, K, V>) -> bool {
        ptr::eq(self.tree, other.tree) && self.current == other.current
    }
}

impl<K, V> PartialEq<Cursor<'_, K, V>> for RevCursor<'_, K, V> {
    fn eq(&self, other: &Cursor<'_, K, V>) -> bool {
        ptr::eq(self.tree, other.tree) && self.current == other.current
    }
}

impl<K, V> PartialEq<Cursor<'_, K, V>> for CursorMut<'_, K, V> {
    fn eq(&self, other: &Cursor<'_, K, V>) -> bool {
        ptr::eq(&*self.tree, other.tree) && self.current == other.current
    }
}

impl<K, V> PartialEq<CursorMut<'_, K, V>> for Cursor<'_, K, V> {
    fn eq(&self, other: &CursorMut<'_, K, V>) -> bool {
        other == self
    }
}

impl<K, V> PartialEq<RevCursor<'_, K, V>> for CursorMut<'_, K, V> {
    fn eq(&self, other: &RevCursor<'_, K, V>) -> bool {
        ptr::eq(&*self.tree, other.tree) && self.current == other.current
    }
}

impl<K, V> PartialEq<CursorMut<'_, K, V>> for RevCursor<'_, K, V> {
    fn eq(&self, other: &CursorMut<'_, K, V>) -> bool {
        other == self
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.key_value()).finish()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for RevCursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RevCursor").field(&self.key_value()).finish()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CursorMut<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CursorMut").field(&self.key_value()).finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use crate::RBTreeMap;
    use alloc::format;
    use alloc::vec::Vec;

    fn sample() -> RBTreeMap<i32, char> {
        RBTreeMap::from([(5, 'e'), (3, 'c'), (8, 'h'), (1, 'a'), (4, 'd')])
    }

    #[test]
    fn forward_walk_visits_keys_in_order() {
        let map = sample();
        let mut cursor = map.cursor_first();
        let mut keys = Vec::new();
        while let Some(key) = cursor.key() {
            keys.push(*key);
            cursor.move_next();
        }
        assert_eq!(keys, [1, 3, 4, 5, 8]);
        assert_eq!(cursor, map.cursor_end());
    }

    #[test]
    fn reverse_walk_visits_keys_backwards() {
        let map = sample();
        let mut cursor = map.rev_cursor_first();
        let mut keys = Vec::new();
        while let Some(key) = cursor.key() {
            keys.push(*key);
            cursor.move_next();
        }
        assert_eq!(keys, [8, 5, 4, 3, 1]);
        assert_eq!(cursor, map.rev_cursor_end());
    }

    #[test]
    fn move_prev_wraps_through_the_end_position() {
        let map = sample();
        let mut cursor = map.cursor_end();
        cursor.move_prev();
        assert_eq!(cursor.key(), Some(&8));

        let mut cursor = map.cursor_first();
        cursor.move_prev();
        assert!(cursor.is_end());

        let mut rev = map.rev_cursor_end();
        rev.move_prev();
        assert_eq!(rev.key(), Some(&1));

        let mut rev = map.rev_cursor_first();
        rev.move_prev();
        assert!(rev.is_end());
    }

    #[test]
    #[should_panic(expected = "`Cursor::move_next()` - cursor is already at the end!")]
    fn stepping_past_end_panics() {
        let map = sample();
        let mut cursor = map.cursor_end();
        cursor.move_next();
    }

    #[test]
    #[should_panic(expected = "`RevCursor::move_next()` - cursor is already at the end!")]
    fn stepping_reverse_past_end_panics() {
        let map: RBTreeMap<u8, u8> = RBTreeMap::new();
        let mut cursor = map.rev_cursor_first();
        cursor.move_next();
    }

    #[test]
    fn cursors_compare_by_map_and_position() {
        let map = sample();
        let other = sample();
        assert_eq!(map.find(&4), map.find(&4));
        assert_ne!(map.find(&4), map.find(&5));
        assert_ne!(map.find(&4), other.find(&4));
        assert_eq!(map.find(&42), map.cursor_end());

        let mut rev = map.rev_cursor_first();
        rev.move_next();
        assert!(map.find(&5) == rev);
        assert!(map.cursor_end() == map.rev_cursor_end());
    }

    #[test]
    fn mutable_cursor_matches_read_only_cursor() {
        let mut map = sample();
        let mut cursor = map.find_mut(&3);
        let copy = cursor.as_cursor();
        assert_eq!(copy.key(), Some(&3));
        cursor.move_next();
        assert_eq!(cursor.key(), Some(&4));
    }

    #[test]
    fn mutable_cursor_compares_with_reverse_cursor() {
        let mut map = sample();
        let other = sample();
        let mut cursor = map.find_mut(&4);
        assert!(cursor == cursor.as_rev_cursor());
        assert!(cursor.as_rev_cursor() == cursor);
        assert!(cursor != other.rev_cursor_first());

        let mut rev = cursor.as_rev_cursor();
        rev.move_next();
        assert_eq!(rev.key(), Some(&3));
        assert!(cursor != rev);

        cursor.move_next();
        cursor.move_next();
        cursor.move_next();
        assert!(cursor.is_end());
        assert!(cursor == cursor.as_rev_cursor());
    }

    #[test]
    fn remove_current_walks_forward() {
        let mut map = sample();
        let mut cursor = map.cursor_first_mut();
        while let Some((key, _)) = cursor.key_value() {
            if key % 2 == 1 {
                cursor.remove_current();
            } else {
                cursor.move_next();
            }
        }
        assert_eq!(cursor.remove_current(), None);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), [4, 8]);
        map.check_invariants().unwrap();
    }

    #[test]
    fn key_value_mut_edits_in_place() {
        let mut map = sample();
        let mut cursor = map.find_mut(&8);
        if let Some((key, value)) = cursor.key_value_mut() {
            assert_eq!(*key, 8);
            *value = 'H';
        }
        assert_eq!(cursor.into_value_mut(), Some(&mut 'H'));
    }

    #[test]
    fn debug_shows_current_entry() {
        let map = sample();
        assert_eq!(format!("{:?}", map.find(&1)), "Cursor(Some((1, 'a')))");
        assert_eq!(format!("{:?}", map.cursor_end()), "Cursor(None)");
    }
}
