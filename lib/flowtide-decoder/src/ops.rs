//! Operations applied to decoded values.
//!
//! An [`Op`] receives the value decoded by a value directive and does something with it: emits it as a metric field or
//! tag, stores it in a slot, uses it as the metric timestamp, or ends the enclosing iteration. Values can be converted on
//! the way there with a [`Chain`], which starts from [`map`] or one of the byte conversions ([`ipv4`], [`ipv6`],
//! [`mac`], [`hex`]) and ends with one of the same terminal operations:
//!
//! ```
//! use flowtide_decoder::{ops, u32};
//!
//! // Emits the decoded value divided by four as the field `x`.
//! let directive = u32().then(ops::map(|v: u32| v >> 2).as_field("x"));
//! # let _: flowtide_decoder::Directive<()> = directive;
//! ```
use std::{
    borrow::Cow,
    fmt,
    hash::Hash,
    net::{Ipv4Addr, Ipv6Addr},
};

use bytes::Bytes;
use flowtide_common::collections::FastHashMap;
use flowtide_event::FieldValue;

use crate::{context::DecodeContext, error::DecodeError, schema::SlotWriter, value::Unsigned};

type RunFn<T> = dyn Fn(T, &mut DecodeContext) -> Result<(), DecodeError> + Send + Sync;
type ConvertFn<T, U> = dyn Fn(T) -> Result<U, DecodeError> + Send + Sync;

/// An operation consuming a decoded value of type `T`.
pub struct Op<T> {
    run: Box<RunFn<T>>,
}

impl<T: 'static> Op<T> {
    fn new<F>(run: F) -> Self
    where
        F: Fn(T, &mut DecodeContext) -> Result<(), DecodeError> + Send + Sync + 'static,
    {
        Self { run: Box::new(run) }
    }

    pub(crate) fn run(&self, value: T, cx: &mut DecodeContext) -> Result<(), DecodeError> {
        (self.run)(value, cx)
    }
}

impl<T> fmt::Debug for Op<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Op").finish_non_exhaustive()
    }
}

/// A conversion from `T` to `U`, waiting for a terminal operation.
pub struct Chain<T, U> {
    convert: Box<ConvertFn<T, U>>,
}

impl<T: 'static, U: 'static> Chain<T, U> {
    fn new<F>(convert: F) -> Self
    where
        F: Fn(T) -> Result<U, DecodeError> + Send + Sync + 'static,
    {
        Self {
            convert: Box::new(convert),
        }
    }

    /// Applies a further conversion.
    pub fn map<V, F>(self, f: F) -> Chain<T, V>
    where
        V: 'static,
        F: Fn(U) -> V + Send + Sync + 'static,
    {
        let convert = self.convert;
        Chain::new(move |value| convert(value).map(&f))
    }

    /// Completes the chain with the given operation.
    pub fn then(self, op: Op<U>) -> Op<T> {
        let convert = self.convert;
        Op::new(move |value, cx| op.run(convert(value)?, cx))
    }

    /// Completes the chain by emitting the converted value as a field of the current metric.
    pub fn as_field<N>(self, name: N) -> Op<T>
    where
        N: Into<Cow<'static, str>>,
        U: Into<FieldValue>,
    {
        self.then(as_field(name))
    }

    /// Completes the chain by emitting the converted value as a tag of the current metric.
    pub fn as_tag<N>(self, name: N) -> Op<T>
    where
        N: Into<Cow<'static, str>>,
        U: fmt::Display,
    {
        self.then(as_tag(name))
    }

    /// Completes the chain by ending the enclosing iteration when the converted value equals `sentinel`.
    pub fn break_if(self, sentinel: U) -> Op<T>
    where
        U: PartialEq + Send + Sync,
    {
        self.then(break_if(sentinel))
    }
}

impl<T: 'static, U: Unsigned> Chain<T, U> {
    /// Completes the chain by storing the converted value in a slot.
    pub fn set(self, writer: SlotWriter<U>) -> Op<T> {
        self.then(set(writer))
    }

    /// Completes the chain by using the converted value as the metric timestamp.
    pub fn timestamp(self) -> Op<T> {
        self.then(timestamp())
    }
}

impl<T, U> fmt::Debug for Chain<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").finish_non_exhaustive()
    }
}

/// Emits the value as a field of the current metric.
pub fn as_field<T, N>(name: N) -> Op<T>
where
    T: Into<FieldValue> + 'static,
    N: Into<Cow<'static, str>>,
{
    let name = name.into();
    Op::new(move |value: T, cx| {
        cx.emit_field(&name, value.into());
        Ok(())
    })
}

/// Emits the value, rendered as a string, as a tag of the current metric.
pub fn as_tag<T, N>(name: N) -> Op<T>
where
    T: fmt::Display + 'static,
    N: Into<Cow<'static, str>>,
{
    let name = name.into();
    Op::new(move |value: T, cx| {
        cx.emit_tag(&name, value.to_string());
        Ok(())
    })
}

/// Stores the value in a slot.
pub fn set<T: Unsigned>(writer: SlotWriter<T>) -> Op<T> {
    let slot = writer.id();
    Op::new(move |value: T, cx| {
        cx.set_slot(slot, value.to_slot());
        Ok(())
    })
}

/// Ends the innermost enclosing iteration when the value equals `sentinel`.
///
/// The iteration ends once the sequence step containing this operation completes, and is not counted as an error.
pub fn break_if<T>(sentinel: T) -> Op<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    Op::new(move |value: T, cx| {
        if value == sentinel {
            cx.request_break();
        }
        Ok(())
    })
}

/// Uses the value as the timestamp, in seconds since the Unix epoch, of every metric closed afterwards.
pub fn timestamp<T: Unsigned>() -> Op<T> {
    Op::new(|value: T, cx| {
        cx.set_timestamp(value.to_slot());
        Ok(())
    })
}

/// Rejects the data being decoded.
pub fn fail<T: 'static>(message: &'static str) -> Op<T> {
    Op::new(move |_, _| Err(DecodeError::rejected(message)))
}

/// Converts the value with the given function.
pub fn map<T, U, F>(f: F) -> Chain<T, U>
where
    T: 'static,
    U: 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    Chain::new(move |value| Ok(f(value)))
}

/// Converts a byte run to a string with the given function.
pub fn bytes_to_str<F>(f: F) -> Chain<Bytes, String>
where
    F: Fn(&[u8]) -> String + Send + Sync + 'static,
{
    Chain::new(move |value: Bytes| Ok(f(&value)))
}

/// Converts a 4-byte run to an IPv4 address in dotted-decimal notation.
pub fn ipv4() -> Chain<Bytes, String> {
    Chain::new(|value: Bytes| {
        let octets = <[u8; 4]>::try_from(&value[..])
            .map_err(|_| DecodeError::rejected(format!("invalid IPv4 address length: {}", value.len())))?;
        Ok(Ipv4Addr::from(octets).to_string())
    })
}

/// Converts a 16-byte run to an IPv6 address in its canonical (RFC 5952) text form.
pub fn ipv6() -> Chain<Bytes, String> {
    Chain::new(|value: Bytes| {
        let octets = <[u8; 16]>::try_from(&value[..])
            .map_err(|_| DecodeError::rejected(format!("invalid IPv6 address length: {}", value.len())))?;
        Ok(Ipv6Addr::from(octets).to_string())
    })
}

/// Converts a 6-byte run to a MAC address in colon-separated hex notation.
pub fn mac() -> Chain<Bytes, String> {
    Chain::new(|value: Bytes| {
        if value.len() != 6 {
            return Err(DecodeError::rejected(format!(
                "invalid MAC address length: {}",
                value.len()
            )));
        }
        let hex = encode_hex(&value)?;
        let mut out = String::with_capacity(17);
        for (i, c) in hex.chars().enumerate() {
            if i > 0 && i % 2 == 0 {
                out.push(':');
            }
            out.push(c);
        }
        Ok(out)
    })
}

/// Converts a byte run of any length to lowercase hex.
pub fn hex() -> Chain<Bytes, String> {
    Chain::new(|value: Bytes| encode_hex(&value))
}

/// Converts the value through a lookup table, falling back to `default` for values missing from it.
pub fn lookup<T, U, I>(table: I, default: U) -> Chain<T, U>
where
    T: Eq + Hash + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = (T, U)>,
{
    let table = table.into_iter().collect::<FastHashMap<_, _>>();
    Chain::new(move |value| Ok(table.get(&value).unwrap_or(&default).clone()))
}

fn encode_hex(value: &[u8]) -> Result<String, DecodeError> {
    let mut out = vec![0u8; value.len() * 2];
    faster_hex::hex_encode(value, &mut out)
        .map(|hex| hex.to_string())
        .map_err(|e| DecodeError::rejected(format!("failed to encode bytes as hex: {}", e)))
}
