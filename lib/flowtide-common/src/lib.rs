//! Shared building blocks for flowtide crates.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod collections;
pub mod hash;
