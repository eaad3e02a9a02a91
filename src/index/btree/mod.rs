mod index;
mod node;

pub use index::{BPlusTree, DEFAULT_ORDER};
pub use node::{BTreeNode, InternalNode, LeafNode, NodeId};
