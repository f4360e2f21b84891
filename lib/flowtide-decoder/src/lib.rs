//! Declarative, single-pass decoding of binary protocols into metrics.
//!
//! A decode grammar is written as a tree of [`Directive`]s: value directives that read big-endian integers or byte runs
//! off a cursor, combined through sequences, switches, iterations and length-prefixed regions, and pseudo-operations
//! that open and close the metrics being assembled. The tree is compiled once into a [`Schema`], which can then decode
//! any number of buffers, each with its own [`DecodeContext`].
//!
//! ```
//! use flowtide_decoder::{close_metric, ops, open_metric, seq, u16, u32, IterOptions, SchemaBuilder};
//!
//! // A count, followed by that many records of a port and a byte counter.
//! let schema = SchemaBuilder::new().build::<(), _>(u16().iter(
//!     16,
//!     seq![
//!         open_metric("flow"),
//!         u16().then(ops::as_tag("port")),
//!         u32().then(ops::as_field("bytes")),
//!         close_metric(),
//!     ],
//!     IterOptions::new(),
//! ));
//!
//! let mut cx = schema.new_context(true);
//! let mut buf: &[u8] = &[0x00, 0x01, 0x1F, 0x90, 0x00, 0x00, 0x05, 0xDC];
//! schema.execute(&mut buf, &mut cx, &mut ()).unwrap();
//!
//! let metrics = cx.take_metrics();
//! assert_eq!(metrics.len(), 1);
//! assert_eq!(metrics[0].tag("port"), Some("8080"));
//! ```
//!
//! # Configuring nodes
//!
//! A value directive takes at most one control shape. Attaching a second one does not compile, whether the node was
//! bare or already configured:
//!
//! ```compile_fail
//! use flowtide_decoder::{u32, Directive, IterOptions};
//!
//! let d: Directive<()> = u32()
//!     .iter(10, u32(), IterOptions::new())
//!     .iter(10, u32(), IterOptions::new());
//! ```
//!
//! ```compile_fail
//! use flowtide_decoder::{ops, u32, Directive, Switch};
//!
//! let d: Directive<()> = u32().switch(Switch::new()).then(ops::as_field("foo"));
//! ```
//!
//! ```compile_fail
//! use flowtide_decoder::{ops, u32, Directive, EncapsulationOptions};
//!
//! let node = u32();
//! let a: Directive<()> = node.then(ops::as_field("foo"));
//! let b: Directive<()> = node.encapsulated(EncapsulationOptions::new(8), u32());
//! ```
//!
//! Byte runs cannot be used as iteration counts or length prefixes:
//!
//! ```compile_fail
//! use flowtide_decoder::{bytes, u32, Directive, IterOptions};
//!
//! let d: Directive<()> = bytes(1).iter(10, u32(), IterOptions::new());
//! ```
//!
//! Slots have a single writer, and a node stores its value in at most one slot:
//!
//! ```compile_fail
//! use flowtide_decoder::{u32, SchemaBuilder};
//!
//! let mut builder = SchemaBuilder::new();
//! let (writer, _) = builder.slot::<u32>();
//! let again = writer.clone();
//! ```
//!
//! ```compile_fail
//! use flowtide_decoder::{u32, SchemaBuilder};
//!
//! let mut builder = SchemaBuilder::new();
//! let (first, _) = builder.slot::<u32>();
//! let (second, _) = builder.slot::<u32>();
//! let node = u32().alias(first).alias(second);
//! ```
#![deny(warnings)]

mod context;
pub use self::context::DecodeContext;

mod directive;
pub use self::directive::{
    bytes, close_metric, constant, iterate, notify, open_metric, reference, skip_rest, u16, u32, u64, u8, AliasState,
    Aliased, Directive, EncapsulationOptions, IterOptions, Switch, Unaliased, ValueDirective,
};

mod error;
pub use self::error::DecodeError;

pub mod ops;

mod schema;
pub use self::schema::{Schema, SchemaBuilder, SlotRef, SlotWriter};

pub mod value;

/// Creates a directive executing each of the given directives in order.
///
/// Each argument may be anything convertible into a [`Directive`], such as an unshaped value directive.
#[macro_export]
macro_rules! seq {
    () => {
        $crate::Directive::seq(::std::vec::Vec::new())
    };
    ($($directive:expr),+ $(,)?) => {
        $crate::Directive::seq(::std::vec![$($crate::Directive::from($directive)),+])
    };
}
