pub mod dynamic;
pub mod manager;
pub mod reader;

pub use dynamic::RowRecord;
pub use manager::{DatabaseError, DatabaseManager};
pub use reader::{DatasetStore, PageResult, PgDatasetStore};
