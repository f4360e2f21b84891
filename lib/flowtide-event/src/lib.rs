//! Event types emitted by flowtide decoders.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod metric;
pub use self::metric::{FieldValue, Metric};
