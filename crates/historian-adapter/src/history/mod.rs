/*
[INPUT]:  Raw history reads and filter definitions
[OUTPUT]: Filtered raw history results
[POS]:    History layer - filter expressions and read context
[UPDATE]: When adding filter operators or read helpers
*/

pub mod context;
pub mod filter;

pub use context::RawHistoryContext;
pub use filter::{CompareOp, Field, FilterExpr, Operand};
