/// Index of a node inside the tree's node arena
pub type NodeId = usize;

/// Leaf node: sorted keys with their values, chained left to right
#[derive(Debug, Clone)]
pub struct LeafNode<K, V> {
    pub keys: Vec<K>,
    pub values: Vec<V>,
    pub next_leaf: Option<NodeId>,
}

/// Internal node: `children.len() == keys.len() + 1`
#[derive(Debug, Clone)]
pub struct InternalNode<K> {
    pub keys: Vec<K>,
    pub children: Vec<NodeId>,
}

/// B+Tree node implementation
/// - Leaf nodes store keys and values
/// - Internal nodes store separator keys and child node IDs
#[derive(Debug, Clone)]
pub enum BTreeNode<K, V> {
    Leaf(LeafNode<K, V>),
    Internal(InternalNode<K>),
}

impl<K, V> BTreeNode<K, V> {
    pub fn is_leaf(&self) -> bool {
        matches!(self, BTreeNode::Leaf(_))
    }

    pub fn keys(&self) -> &[K] {
        match self {
            BTreeNode::Leaf(leaf) => &leaf.keys,
            BTreeNode::Internal(internal) => &internal.keys,
        }
    }
}

impl<K: Clone + Ord, V> LeafNode<K, V> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            next_leaf: None,
        }
    }

    /// Insert a key-value pair, overwriting the value of an existing key.
    /// Returns true if the key was not present before.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        match self.keys.binary_search(&key) {
            Ok(i) => {
                self.values[i] = value;
                false
            }
            Err(i) => {
                self.keys.insert(i, key);
                self.values.insert(i, value);
                true
            }
        }
    }

    /// Move the upper half into a new sibling that takes over this leaf's
    /// chain link. Returns the sibling and its first key, which the parent
    /// receives as a copied separator.
    pub fn split(&mut self, sibling_id: NodeId) -> (Self, K) {
        let split_point = self.keys.len() / 2;

        let sibling = Self {
            keys: self.keys.split_off(split_point),
            values: self.values.split_off(split_point),
            next_leaf: self.next_leaf.take(),
        };
        self.next_leaf = Some(sibling_id);

        let separator = sibling.keys[0].clone();
        (sibling, separator)
    }

    pub fn get_value(&self, key: &K) -> Option<&V> {
        self.keys.binary_search(key).ok().map(|i| &self.values[i])
    }

    /// Remove a key, returning its value if it was present
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let i = self.keys.binary_search(key).ok()?;
        self.keys.remove(i);
        Some(self.values.remove(i))
    }
}

impl<K: Clone + Ord, V> Default for LeafNode<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Ord> InternalNode<K> {
    /// Find the index of the child that should contain the key: the first
    /// child whose separator is greater than the key, else the last child.
    pub fn find_child_index(&self, key: &K) -> usize {
        match self.keys.binary_search(key) {
            Ok(i) => i + 1, // equal keys live in the right subtree
            Err(i) => i,
        }
    }

    /// Insert a separator and the child to its right
    pub fn insert(&mut self, key: K, right_child: NodeId) {
        let pos = match self.keys.binary_search(&key) {
            Ok(i) | Err(i) => i,
        };
        self.keys.insert(pos, key);
        self.children.insert(pos + 1, right_child);
    }

    /// Split at the middle. The middle key is removed from both halves and
    /// returned for promotion.
    pub fn split(&mut self) -> (Self, K) {
        let split_point = self.keys.len() / 2;
        let middle_key = self.keys.remove(split_point);

        let sibling = Self {
            keys: self.keys.split_off(split_point),
            children: self.children.split_off(split_point + 1),
        };
        (sibling, middle_key)
    }
}
