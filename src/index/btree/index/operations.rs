use crate::index::btree::node::{BTreeNode, InternalNode, NodeId};
use super::base::BPlusTree;

impl<K: Clone + Ord, V: Clone> BPlusTree<K, V> {
    /// Insert a key-value pair, replacing the value if the key exists
    pub fn insert(&mut self, key: K, value: V) {
        if let Some((separator, right)) = self.insert_internal(self.root, key, value) {
            // Root split: the tree grows by one level at the top
            let new_root = InternalNode {
                keys: vec![separator],
                children: vec![self.root, right],
            };
            self.nodes.push(BTreeNode::Internal(new_root));
            self.root = self.nodes.len() - 1;
        }
    }

    /// Internal recursive insert function
    /// Returns Some((separator, right_node_id)) if `node_id` was split
    fn insert_internal(&mut self, node_id: NodeId, key: K, value: V) -> Option<(K, NodeId)> {
        let sibling_id = self.nodes.len();

        let child_id = match &mut self.nodes[node_id] {
            BTreeNode::Leaf(leaf) => {
                if leaf.insert(key, value) {
                    self.len += 1;
                }
                if leaf.keys.len() <= self.order {
                    return None;
                }

                let (sibling, separator) = leaf.split(sibling_id);
                self.nodes.push(BTreeNode::Leaf(sibling));
                return Some((separator, sibling_id));
            }
            BTreeNode::Internal(internal) => internal.children[internal.find_child_index(&key)],
        };

        let (separator, right_child) = self.insert_internal(child_id, key, value)?;

        let sibling_id = self.nodes.len();
        match &mut self.nodes[node_id] {
            BTreeNode::Internal(internal) => {
                internal.insert(separator, right_child);
                if internal.keys.len() <= self.order {
                    return None;
                }

                let (sibling, middle_key) = internal.split();
                self.nodes.push(BTreeNode::Internal(sibling));
                Some((middle_key, sibling_id))
            }
            // Nodes never change kind
            BTreeNode::Leaf(_) => None,
        }
    }
}
