use crate::index::btree::node::BTreeNode;
use super::base::BPlusTree;

impl<K: Clone + Ord, V: Clone> BPlusTree<K, V> {
    /// Values of every key in `[start_key, end_key]`, in key order
    pub fn range_scan(&self, start_key: &K, end_key: &K) -> Vec<V> {
        let mut result = Vec::new();
        if start_key > end_key {
            return result;
        }

        let mut current = Some(self.find_leaf(start_key));
        while let Some(node_id) = current {
            let BTreeNode::Leaf(leaf) = &self.nodes[node_id] else {
                break;
            };

            let start_pos = match leaf.keys.binary_search(start_key) {
                Ok(i) | Err(i) => i,
            };
            for (key, value) in leaf.keys[start_pos..].iter().zip(&leaf.values[start_pos..]) {
                if key > end_key {
                    return result;
                }
                result.push(value.clone());
            }

            current = leaf.next_leaf;
        }

        result
    }

    /// Every entry in key order, following the leaf chain
    pub fn entries(&self) -> Vec<(K, V)> {
        let mut current = Some(self.leftmost_leaf());
        let mut result = Vec::with_capacity(self.len);
        while let Some(node_id) = current {
            let BTreeNode::Leaf(leaf) = &self.nodes[node_id] else {
                break;
            };
            result.extend(leaf.keys.iter().cloned().zip(leaf.values.iter().cloned()));
            current = leaf.next_leaf;
        }
        result
    }

    fn leftmost_leaf(&self) -> usize {
        let mut current = self.root;
        while let BTreeNode::Internal(internal) = &self.nodes[current] {
            current = internal.children[0];
        }
        current
    }
}
