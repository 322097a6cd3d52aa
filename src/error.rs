use thiserror::Error;

/// The error returned by [`RBTreeMap::at`] and [`RBTreeMap::at_mut`] when the key is absent.
///
/// [`RBTreeMap::at`]: crate::RBTreeMap::at
/// [`RBTreeMap::at_mut`]: crate::RBTreeMap::at_mut
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Error)]
#[error("key not found in map")]
pub struct OutOfRange;

/// A structural rule of the map that [`RBTreeMap::check_invariants`] found broken.
///
/// A map only ever reports one of these after a bug in this crate, or after a key's
/// ordering was changed while it was stored in the map.
///
/// [`RBTreeMap::check_invariants`]: crate::RBTreeMap::check_invariants
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Error)]
pub enum InvariantViolation {
    /// The root node is red.
    #[error("root node is red")]
    RedRoot,

    /// A red node has a red child.
    #[error("red node has a red child")]
    RedRedEdge,

    /// Two root-to-leaf paths pass through different numbers of black nodes.
    #[error("black height differs between root-to-leaf paths")]
    BlackHeightMismatch,

    /// An in-order walk met a key that is not strictly greater than the one before it.
    #[error("keys are not strictly ascending in order")]
    OrderViolation,

    /// A child does not point back at its parent, or the root has a parent.
    #[error("parent link disagrees with child link")]
    ParentLinkMismatch,

    /// The ascending thread does not follow the in-order sequence of the tree.
    #[error("in-order thread disagrees with the tree")]
    ThreadMismatch,

    /// `first` or `last` does not name the smallest or largest node.
    #[error("thread ends do not point at the smallest and largest keys")]
    ThreadEndMismatch,

    /// The stored length disagrees with the number of reachable or stored nodes.
    #[error("map reports {len} entries but {reachable} nodes are reachable")]
    LengthMismatch {
        /// Length recorded by the map.
        len: usize,
        /// Nodes found by walking the tree.
        reachable: usize,
    },
}
