mod base;
mod deletion;
mod operations;
mod range_scan;

pub use base::{BPlusTree, DEFAULT_ORDER};
