pub mod format;

pub use format::{assemble, DatasetPage, PageMeta};
