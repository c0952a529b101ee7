mod field;
mod infer;
mod table;

pub use field::{Field, FieldMode, LogicalType};
pub use infer::SchemaInferrer;
pub use table::ColumnSchema;
