pub mod error;
pub mod frame;
pub mod manager;
mod replacer;

pub use error::BufferPoolError;
pub use frame::{Frame, PagePtr};
pub use manager::BufferPool;
