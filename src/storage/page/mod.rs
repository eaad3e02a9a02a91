pub mod error;
pub mod header;
pub mod layout;
pub mod slotted;

pub use error::PageError;
pub use header::PageHeader;
pub use slotted::{SlottedPage, UpdateOutcome};
