use crate::index::btree::node::{BTreeNode, LeafNode, NodeId};

/// Maximum number of keys per node unless configured otherwise
pub const DEFAULT_ORDER: usize = 32;

/// In-memory B+Tree mapping ordered keys to values.
///
/// Nodes live in an arena and refer to each other by index. Leaves are chained
/// left to right for range scans.
#[derive(Debug, Clone)]
pub struct BPlusTree<K, V> {
    pub(super) nodes: Vec<BTreeNode<K, V>>,
    pub(super) root: NodeId,
    pub(super) order: usize,
    pub(super) len: usize,
}

impl<K: Clone + Ord, V: Clone> Default for BPlusTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Ord, V: Clone> BPlusTree<K, V> {
    pub fn new() -> Self {
        Self::with_order(DEFAULT_ORDER)
    }

    /// Create a tree whose nodes split once they hold more than `order` keys
    pub fn with_order(order: usize) -> Self {
        Self {
            nodes: vec![BTreeNode::Leaf(LeafNode::new())],
            root: 0,
            order: order.max(1),
            len: 0,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of keys stored
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels, 1 for a lone root leaf
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut current = self.root;
        while let BTreeNode::Internal(internal) = &self.nodes[current] {
            current = internal.children[0];
            height += 1;
        }
        height
    }

    pub fn search(&self, key: &K) -> Option<&V> {
        match &self.nodes[self.find_leaf(key)] {
            BTreeNode::Leaf(leaf) => leaf.get_value(key),
            BTreeNode::Internal(_) => None,
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Descend from the root to the leaf that would hold `key`
    pub(super) fn find_leaf(&self, key: &K) -> NodeId {
        let mut current = self.root;
        while let BTreeNode::Internal(internal) = &self.nodes[current] {
            current = internal.children[internal.find_child_index(key)];
        }
        current
    }

    #[cfg(test)]
    pub(crate) fn node(&self, id: NodeId) -> &BTreeNode<K, V> {
        &self.nodes[id]
    }

    #[cfg(test)]
    pub(crate) fn root_id(&self) -> NodeId {
        self.root
    }
}
