//! NetFlow v9 and IPFIX decoding.
//!
//! [`NetflowParser`] decodes export packets into metrics named `netflow`, one per data record. Templates announced by
//! exporters are learned as packets are parsed, per observation domain, and data records are decoded with the template
//! matching their set ID. Records whose template has not been seen yet are skipped.
//!
//! Fields are named after their IPFIX information element. Elements identifying a flow, such as addresses and ports,
//! become tags, while counters become fields:
//!
//! ```
//! use flowtide_netflow::{NetflowParser, Parser as _};
//!
//! let mut packet = vec![
//!     0, 9, 0, 2, // version, count
//!     0, 0, 0, 0, // sysUptime
//!     0x65, 0x53, 0xF1, 0x00, // exportTime
//!     0, 0, 0, 1, // sequenceNumber
//!     0, 0, 0, 7, // sourceID
//! ];
//! // Template 256: sourceIPv4Address (4 bytes), sourceTransportPort (2 bytes).
//! packet.extend_from_slice(&[0, 0, 0, 16, 1, 0, 0, 2, 0, 8, 0, 4, 0, 7, 0, 2]);
//! // One record of template 256.
//! packet.extend_from_slice(&[1, 0, 0, 10, 192, 168, 1, 1, 0x1F, 0x90]);
//!
//! let mut parser = NetflowParser::new();
//! let mut metrics = Vec::new();
//! parser.parse(&packet, &mut metrics).unwrap();
//!
//! assert_eq!(metrics.len(), 1);
//! assert_eq!(metrics[0].tag("sourceIPv4Address"), Some("192.168.1.1"));
//! assert_eq!(metrics[0].tag("sourceTransportPort"), Some("8080"));
//! assert_eq!(metrics[0].timestamp(), 1_700_000_000);
//! ```
#![deny(warnings)]

pub mod catalog;

mod parser;
pub use self::parser::{NetflowParser, ParseError, Parser};

pub mod schema;

pub mod template;
pub use self::template::{FieldDefn, FieldSpec, ObservationDomain, TemplateCache, TemplateDefn};
