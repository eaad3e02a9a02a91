pub mod error;
pub mod record;
pub mod scan;
#[allow(clippy::module_inception)]
pub mod table;

pub use error::TableError;
pub use record::{Record, RecordError};
pub use scan::TableScan;
pub use table::Table;
