pub mod error;
pub mod params;
pub mod planner;
pub mod types;

pub use error::QueryError;
pub use params::{DatasetParams, RawDatasetQuery};
pub use planner::QueryPlanner;
pub use types::*;
