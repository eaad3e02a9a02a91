use crate::index::btree::node::BTreeNode;
use super::base::BPlusTree;

impl<K: Clone + Ord, V: Clone> BPlusTree<K, V> {
    /// Remove a key from the tree, returning its value.
    ///
    /// Only the leaf is touched; underfull nodes are not merged, so separators
    /// may outlive the keys they were copied from. Routing stays correct.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let leaf_id = self.find_leaf(key);
        let removed = match &mut self.nodes[leaf_id] {
            BTreeNode::Leaf(leaf) => leaf.remove(key),
            BTreeNode::Internal(_) => None,
        };

        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }
}
