mod column;
mod raw;
mod table;

pub use column::{Column, ColumnData, StorageKind};
pub use raw::RawRowPage;
pub use table::TypedTable;
