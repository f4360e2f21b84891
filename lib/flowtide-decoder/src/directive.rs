use std::{borrow::Cow, fmt, marker::PhantomData, sync::Arc};

use tracing::trace;

use crate::{
    context::DecodeContext,
    error::{
        ensure_remaining, DecodeError, EncapsulationLimitExceeded, EncapsulationNotConsumed, InvalidEncapsulationLength,
        IterationLimitExceeded, NoMatchingCase,
    },
    ops::Op,
    schema::{SlotId, SlotRef, SlotWriter},
    value::{ByteRun, Constant, DecodedValue, Fixed, Reader, SlotRead, Unsigned},
};

trait Execute<S> {
    fn execute(&self, buf: &mut &[u8], cx: &mut DecodeContext, state: &mut S) -> Result<(), DecodeError>;
}

/// A node in a decode grammar.
///
/// Directives are built bottom-up from value directives ([`u8`], [`u16`], [`u32`], [`u64`], [`bytes`], [`reference`]),
/// sequences ([`seq!`][crate::seq], [`Directive::seq`]), iteration ([`iterate`]) and zero-byte pseudo-operations
/// ([`open_metric`], [`close_metric`], [`notify`], [`skip_rest`]), and compiled into a [`Schema`][crate::Schema].
///
/// `S` is the caller state made available to [`notify`] callbacks and dynamic [`Switch`] matchers during a decode.
pub struct Directive<S> {
    inner: Box<dyn Execute<S> + Send + Sync>,
}

impl<S: 'static> Directive<S> {
    fn new<E>(inner: E) -> Self
    where
        E: Execute<S> + Send + Sync + 'static,
    {
        Self { inner: Box::new(inner) }
    }

    /// Creates a directive that does nothing.
    pub fn noop() -> Self {
        Self::new(Noop)
    }

    /// Creates a directive that executes each of the given directives in order.
    ///
    /// Execution stops at the first error. An empty sequence does nothing.
    pub fn seq<I>(children: I) -> Self
    where
        I: IntoIterator<Item = Directive<S>>,
    {
        Self::new(Seq {
            children: children.into_iter().collect(),
        })
    }

    /// Creates a directive that always rejects the data being decoded.
    pub fn fail(message: &'static str) -> Self {
        Self::new(Fail { message })
    }
}

impl<S> Directive<S> {
    pub(crate) fn execute(&self, buf: &mut &[u8], cx: &mut DecodeContext, state: &mut S) -> Result<(), DecodeError> {
        self.inner.execute(buf, cx, state)
    }
}

impl<S> fmt::Debug for Directive<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directive").finish_non_exhaustive()
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for super::Unaliased {}
    impl Sealed for super::Aliased {}
}

/// Whether a value directive stores its value in a slot.
pub trait AliasState: private::Sealed {}

/// The value directive does not store its value.
pub enum Unaliased {}

/// The value directive stores its value in a slot.
pub enum Aliased {}

impl AliasState for Unaliased {}
impl AliasState for Aliased {}

struct Node<R> {
    reader: R,
    alias: Option<SlotId>,
}

impl<R: Reader> Node<R> {
    fn read(&self, buf: &mut &[u8], cx: &mut DecodeContext) -> Result<R::Value, DecodeError> {
        let value = self.reader.read(buf, cx)?;
        if let (Some(slot), Some(raw)) = (self.alias, value.as_u64()) {
            cx.set_slot(slot, raw);
        }
        Ok(value)
    }
}

/// A directive decoding a single value.
///
/// A value directive can be given one control shape, which decides what is done with the decoded value:
///
/// - [`switch`][Self::switch] dispatches on it,
/// - [`iter`][Self::iter] uses it as an iteration count,
/// - [`encapsulated`][Self::encapsulated] uses it as a length prefix,
/// - [`then`][Self::then] and [`then_all`][Self::then_all] pass it to operations.
///
/// Each of these consumes the value directive and returns a plain [`Directive`], so a second shape cannot be attached.
/// Independently of its shape, the value can be stored in a slot with [`alias`][Self::alias], at most once.
///
/// Without a shape, the value is decoded (and possibly stored) and otherwise discarded.
pub struct ValueDirective<R, A = Unaliased> {
    node: Node<R>,
    _alias: PhantomData<fn() -> A>,
}

impl<R> ValueDirective<R, Unaliased> {
    fn new(reader: R) -> Self {
        Self {
            node: Node { reader, alias: None },
            _alias: PhantomData,
        }
    }
}

impl<R> ValueDirective<R, Unaliased>
where
    R: Reader,
    R::Value: Unsigned,
{
    /// Stores the decoded value in the given slot, each time it is decoded.
    pub fn alias(self, writer: SlotWriter<R::Value>) -> ValueDirective<R, Aliased> {
        ValueDirective {
            node: Node {
                reader: self.node.reader,
                alias: Some(writer.id()),
            },
            _alias: PhantomData,
        }
    }
}

impl<R, A> ValueDirective<R, A>
where
    R: Reader,
    A: AliasState,
{
    /// Dispatches on the decoded value.
    pub fn switch<S: 'static>(self, switch: Switch<R::Value, S>) -> Directive<S> {
        Directive::new(Switched { node: self.node, switch })
    }

    /// Passes the decoded value to an operation.
    pub fn then<S: 'static>(self, op: Op<R::Value>) -> Directive<S> {
        self.then_all(vec![op])
    }

    /// Passes the decoded value to each of the given operations, in order.
    pub fn then_all<S: 'static>(self, ops: Vec<Op<R::Value>>) -> Directive<S> {
        Directive::new(Applied { node: self.node, ops })
    }
}

impl<R, A> ValueDirective<R, A>
where
    R: Reader,
    R::Value: Unsigned,
    A: AliasState,
{
    /// Executes `body` as many times as the decoded value.
    ///
    /// The iteration can also end early through the stop conditions in `options`, or through a
    /// [`break_if`][crate::ops::break_if] operation executed by `body`. Running `body` more than `max` times is an error.
    pub fn iter<S, D>(self, max: usize, body: D, options: IterOptions) -> Directive<S>
    where
        S: 'static,
        D: Into<Directive<S>>,
    {
        Directive::new(Counted {
            node: self.node,
            iteration: Iteration {
                max,
                body: body.into(),
                options,
            },
        })
    }

    /// Executes `inner` over the number of bytes given by the decoded value.
    ///
    /// `inner` runs against a cursor holding exactly those bytes, and must consume all of them. A
    /// [`break_if`][crate::ops::break_if] executed by `inner` skips whatever is left of the region and ends the enclosing
    /// iteration.
    pub fn encapsulated<S, D>(self, options: EncapsulationOptions, inner: D) -> Directive<S>
    where
        S: 'static,
        D: Into<Directive<S>>,
    {
        Directive::new(Encapsulated {
            node: self.node,
            options,
            inner: inner.into(),
        })
    }
}

impl<S, R, A> From<ValueDirective<R, A>> for Directive<S>
where
    S: 'static,
    R: Reader,
    A: AliasState,
{
    fn from(value: ValueDirective<R, A>) -> Self {
        Directive::new(Plain { node: value.node })
    }
}

impl<R, A> fmt::Debug for ValueDirective<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueDirective")
            .field("alias", &self.node.alias)
            .finish_non_exhaustive()
    }
}

/// Decodes a `u8`.
pub fn u8() -> ValueDirective<Fixed<u8>> {
    ValueDirective::new(Fixed::new())
}

/// Decodes a big-endian `u16`.
pub fn u16() -> ValueDirective<Fixed<u16>> {
    ValueDirective::new(Fixed::new())
}

/// Decodes a big-endian `u32`.
pub fn u32() -> ValueDirective<Fixed<u32>> {
    ValueDirective::new(Fixed::new())
}

/// Decodes a big-endian `u64`.
pub fn u64() -> ValueDirective<Fixed<u64>> {
    ValueDirective::new(Fixed::new())
}

/// Decodes a run of `len` bytes.
pub fn bytes(len: usize) -> ValueDirective<ByteRun> {
    ValueDirective::new(ByteRun::new(len))
}

/// Re-uses the value most recently stored in a slot, without consuming any bytes.
pub fn reference<T: Unsigned>(slot: SlotRef<T>) -> ValueDirective<SlotRead<T>> {
    ValueDirective::new(SlotRead::new(slot.id()))
}

/// Produces a fixed value without consuming any bytes.
pub fn constant<T: Unsigned>(value: T) -> ValueDirective<Constant<T>> {
    ValueDirective::new(Constant::new(value))
}

/// Executes `body` until one of the stop conditions in `options` is met.
///
/// Running `body` more than `max` times is an error. Without any stop condition, only a
/// [`break_if`][crate::ops::break_if] operation, or an error, ends the iteration.
pub fn iterate<S, D>(max: usize, body: D, options: IterOptions) -> Directive<S>
where
    S: 'static,
    D: Into<Directive<S>>,
{
    Directive::new(Unbounded {
        iteration: Iteration {
            max,
            body: body.into(),
            options,
        },
    })
}

/// Opens a new metric.
///
/// The new metric starts with every tag and field emitted so far at the enclosing level, whether that is another open
/// metric or the top level of the decode.
pub fn open_metric<S, N>(name: N) -> Directive<S>
where
    S: 'static,
    N: Into<Cow<'static, str>>,
{
    Directive::new(OpenMetric { name: name.into() })
}

/// Closes the most recently opened metric, completing it.
pub fn close_metric<S: 'static>() -> Directive<S> {
    Directive::new(CloseMetric)
}

/// Runs a callback with the decode context and the caller state.
///
/// Callbacks can read slots through [`DecodeContext::get`], update the caller state, and reject the data by returning an
/// error.
pub fn notify<S, F>(callback: F) -> Directive<S>
where
    S: 'static,
    F: Fn(&DecodeContext, &mut S) -> Result<(), DecodeError> + Send + Sync + 'static,
{
    Directive::new(Notify { callback })
}

/// Consumes whatever remains of the current cursor.
pub fn skip_rest<S: 'static>() -> Directive<S> {
    Directive::new(SkipRest)
}

/// Stop conditions for an iteration.
#[derive(Clone, Copy, Debug, Default)]
pub struct IterOptions {
    stop_below: Option<usize>,
    eof_terminates: bool,
}

impl IterOptions {
    /// Creates a new `IterOptions` with no stop conditions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops the iteration when fewer than `remaining` bytes are left.
    pub fn stop_below(mut self, remaining: usize) -> Self {
        self.stop_below = Some(remaining);
        self
    }

    /// Stops the iteration when no bytes are left.
    pub fn eof_terminates(mut self) -> Self {
        self.eof_terminates = true;
        self
    }

    fn should_stop(&self, buf: &[u8]) -> bool {
        self.stop_below.is_some_and(|min| buf.len() < min) || (self.eof_terminates && buf.is_empty())
    }
}

/// Bounds for an encapsulated region.
#[derive(Clone, Copy, Debug)]
pub struct EncapsulationOptions {
    max_bytes: usize,
    including: usize,
}

impl EncapsulationOptions {
    /// Creates a new `EncapsulationOptions` accepting regions of up to `max_bytes` bytes, as declared by the length
    /// prefix.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            including: 0,
        }
    }

    /// Declares that the length prefix counts `header` bytes that were already consumed.
    pub fn including(mut self, header: usize) -> Self {
        self.including = header;
        self
    }
}

type Matcher<V, S> = dyn Fn(&V, &DecodeContext, &S) -> Option<Arc<Directive<S>>> + Send + Sync;

/// Branches of a [`ValueDirective::switch`].
///
/// The decoded value selects a branch by checking, in order: the static cases, the dynamic matcher, and the default
/// branch. Decoding fails if none of them applies.
pub struct Switch<V, S> {
    cases: Vec<(V, Directive<S>)>,
    dynamic: Option<Box<Matcher<V, S>>>,
    default: Option<Directive<S>>,
}

impl<V, S> Switch<V, S>
where
    V: DecodedValue,
    S: 'static,
{
    /// Creates a new `Switch` with no branches.
    pub fn new() -> Self {
        Self {
            cases: Vec::new(),
            dynamic: None,
            default: None,
        }
    }

    /// Adds a branch taken when the decoded value equals `value`.
    ///
    /// If several cases share a value, the first one added wins.
    pub fn case<D: Into<Directive<S>>>(mut self, value: V, branch: D) -> Self {
        self.cases.push((value, branch.into()));
        self
    }

    /// Sets a matcher consulted when no static case applies.
    ///
    /// The matcher sees the decoded value, the decode context and the caller state, which lets branches be chosen from
    /// data learned while decoding.
    pub fn dynamic<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&V, &DecodeContext, &S) -> Option<Arc<Directive<S>>> + Send + Sync + 'static,
    {
        self.dynamic = Some(Box::new(matcher));
        self
    }

    /// Sets the branch taken when nothing else applies.
    pub fn default<D: Into<Directive<S>>>(mut self, branch: D) -> Self {
        self.default = Some(branch.into());
        self
    }
}

impl<V, S> fmt::Debug for Switch<V, S>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Switch")
            .field("cases", &self.cases.iter().map(|(v, _)| v).collect::<Vec<_>>())
            .field("dynamic", &self.dynamic.is_some())
            .field("default", &self.default.is_some())
            .finish()
    }
}

struct Noop;

impl<S> Execute<S> for Noop {
    fn execute(&self, _: &mut &[u8], _: &mut DecodeContext, _: &mut S) -> Result<(), DecodeError> {
        Ok(())
    }
}

struct Fail {
    message: &'static str,
}

impl<S> Execute<S> for Fail {
    fn execute(&self, _: &mut &[u8], _: &mut DecodeContext, _: &mut S) -> Result<(), DecodeError> {
        Err(DecodeError::rejected(self.message))
    }
}

struct Seq<S> {
    children: Vec<Directive<S>>,
}

impl<S> Execute<S> for Seq<S> {
    fn execute(&self, buf: &mut &[u8], cx: &mut DecodeContext, state: &mut S) -> Result<(), DecodeError> {
        for child in &self.children {
            child.execute(buf, cx, state)?;

            // Unwind to the enclosing iteration.
            if cx.break_pending() {
                break;
            }
        }
        Ok(())
    }
}

struct Plain<R> {
    node: Node<R>,
}

impl<S, R: Reader> Execute<S> for Plain<R> {
    fn execute(&self, buf: &mut &[u8], cx: &mut DecodeContext, _: &mut S) -> Result<(), DecodeError> {
        self.node.read(buf, cx).map(|_| ())
    }
}

struct Switched<R: Reader, S> {
    node: Node<R>,
    switch: Switch<R::Value, S>,
}

impl<S, R: Reader> Execute<S> for Switched<R, S> {
    fn execute(&self, buf: &mut &[u8], cx: &mut DecodeContext, state: &mut S) -> Result<(), DecodeError> {
        let value = self.node.read(buf, cx)?;

        if let Some((_, branch)) = self.switch.cases.iter().find(|(case, _)| *case == value) {
            return branch.execute(buf, cx, state);
        }

        if let Some(matcher) = &self.switch.dynamic {
            if let Some(branch) = matcher(&value, cx, state) {
                return branch.execute(buf, cx, state);
            }
        }

        match &self.switch.default {
            Some(branch) => branch.execute(buf, cx, state),
            None => NoMatchingCase {
                value: format!("{:?}", value),
            }
            .fail(),
        }
    }
}

struct Applied<R: Reader> {
    node: Node<R>,
    ops: Vec<Op<R::Value>>,
}

impl<S, R: Reader> Execute<S> for Applied<R> {
    fn execute(&self, buf: &mut &[u8], cx: &mut DecodeContext, _: &mut S) -> Result<(), DecodeError> {
        let value = self.node.read(buf, cx)?;
        match self.ops.as_slice() {
            [op] => op.run(value, cx),
            ops => ops.iter().try_for_each(|op| op.run(value.clone(), cx)),
        }
    }
}

struct Iteration<S> {
    max: usize,
    body: Directive<S>,
    options: IterOptions,
}

impl<S> Iteration<S> {
    fn run(
        &self, count: Option<u64>, buf: &mut &[u8], cx: &mut DecodeContext, state: &mut S,
    ) -> Result<(), DecodeError> {
        let mut iterations = 0usize;
        loop {
            if count.is_some_and(|count| iterations as u64 >= count) || self.options.should_stop(buf) {
                return Ok(());
            }

            if iterations >= self.max {
                return IterationLimitExceeded { max: self.max }.fail();
            }

            let depth = cx.frame_depth();
            self.body.execute(buf, cx, state)?;
            iterations += 1;

            if cx.take_break() {
                // Metrics the body opened but never reached the close of are abandoned.
                cx.truncate_frames(depth);
                trace!(iterations, "Iteration ended by break.");
                return Ok(());
            }
        }
    }
}

struct Counted<R, S> {
    node: Node<R>,
    iteration: Iteration<S>,
}

impl<S, R> Execute<S> for Counted<R, S>
where
    R: Reader,
    R::Value: Unsigned,
{
    fn execute(&self, buf: &mut &[u8], cx: &mut DecodeContext, state: &mut S) -> Result<(), DecodeError> {
        let count = self.node.read(buf, cx)?.to_slot();
        self.iteration.run(Some(count), buf, cx, state)
    }
}

struct Unbounded<S> {
    iteration: Iteration<S>,
}

impl<S> Execute<S> for Unbounded<S> {
    fn execute(&self, buf: &mut &[u8], cx: &mut DecodeContext, state: &mut S) -> Result<(), DecodeError> {
        self.iteration.run(None, buf, cx, state)
    }
}

struct Encapsulated<R, S> {
    node: Node<R>,
    options: EncapsulationOptions,
    inner: Directive<S>,
}

impl<S, R> Execute<S> for Encapsulated<R, S>
where
    R: Reader,
    R::Value: Unsigned,
{
    fn execute(&self, buf: &mut &[u8], cx: &mut DecodeContext, state: &mut S) -> Result<(), DecodeError> {
        let declared = self.node.read(buf, cx)?.to_slot();
        let EncapsulationOptions { max_bytes, including } = self.options;

        if declared > max_bytes as u64 {
            return EncapsulationLimitExceeded {
                length: declared,
                max: max_bytes,
            }
            .fail();
        }

        // Bounded by `max_bytes` above.
        let declared_len = declared as usize;
        if declared_len < including {
            return InvalidEncapsulationLength {
                declared,
                header: including,
            }
            .fail();
        }

        let len = declared_len - including;
        ensure_remaining(buf, len)?;

        let (region, rest) = buf.split_at(len);
        let mut region = region;
        self.inner.execute(&mut region, cx, state)?;

        // A break leaves the rest of the region unread on its way to the enclosing iteration.
        if !region.is_empty() && !cx.break_pending() {
            return EncapsulationNotConsumed {
                remaining: region.len(),
            }
            .fail();
        }

        *buf = rest;
        Ok(())
    }
}

struct OpenMetric {
    name: Cow<'static, str>,
}

impl<S> Execute<S> for OpenMetric {
    fn execute(&self, _: &mut &[u8], cx: &mut DecodeContext, _: &mut S) -> Result<(), DecodeError> {
        cx.open_metric(&self.name);
        Ok(())
    }
}

struct CloseMetric;

impl<S> Execute<S> for CloseMetric {
    fn execute(&self, _: &mut &[u8], cx: &mut DecodeContext, _: &mut S) -> Result<(), DecodeError> {
        cx.close_metric()
    }
}

struct Notify<F> {
    callback: F,
}

impl<S, F> Execute<S> for Notify<F>
where
    F: Fn(&DecodeContext, &mut S) -> Result<(), DecodeError>,
{
    fn execute(&self, _: &mut &[u8], cx: &mut DecodeContext, state: &mut S) -> Result<(), DecodeError> {
        (self.callback)(cx, state)
    }
}

struct SkipRest;

impl<S> Execute<S> for SkipRest {
    fn execute(&self, buf: &mut &[u8], _: &mut DecodeContext, _: &mut S) -> Result<(), DecodeError> {
        *buf = &buf[buf.len()..];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use proptest::{collection::vec as arb_vec, prelude::*};

    use super::*;
    use crate::{ops, schema::SchemaBuilder, seq};

    fn decode(directive: Directive<()>, mut buf: &[u8]) -> (Result<(), DecodeError>, DecodeContext, usize) {
        let mut cx = DecodeContext::new(true);
        let result = cx.decode(&directive, &mut buf, &mut ());
        (result, cx, buf.len())
    }

    #[test]
    fn u32_insufficient_bytes() {
        let (result, _, remaining) = decode(u32().into(), &1001u16.to_be_bytes());
        assert!(result.unwrap_err().is_truncation());
        assert_eq!(remaining, 2);
    }

    #[test]
    fn u32_consumes_four_bytes() {
        let mut builder = SchemaBuilder::new();
        let (writer, reader) = builder.slot::<u32>();

        let (result, cx, remaining) = decode(u32().alias(writer).into(), &1001u32.to_be_bytes());
        result.unwrap();
        assert_eq!(remaining, 0);
        assert_eq!(cx.get(reader), 1001);
    }

    #[test]
    fn empty_seq_consumes_nothing() {
        let (result, _, remaining) = decode(seq![], &1001u32.to_be_bytes());
        result.unwrap();
        assert_eq!(remaining, 4);

        let (result, _, remaining) = decode(Directive::seq(Vec::new()), &1001u32.to_be_bytes());
        result.unwrap();
        assert_eq!(remaining, 4);
    }

    #[test]
    fn error_in_seq() {
        let (result, _, _) = decode(seq![u32(), Directive::fail("boom")], &1001u32.to_be_bytes());
        assert!(matches!(result, Err(DecodeError::Rejected { .. })));
    }

    #[test]
    fn switch_selects_single_branch() {
        let mut builder = SchemaBuilder::new();
        let (w1, r1) = builder.slot::<u32>();
        let (w2, r2) = builder.slot::<u32>();
        let directive = u16().switch(Switch::new().case(1, u32().alias(w1)).case(2, u32().alias(w2)));

        let mut buf = Vec::new();
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&4u32.to_be_bytes());

        let mut cx = DecodeContext::new(false);
        cx.decode(&directive, &mut buf.as_slice(), &mut ()).unwrap();
        assert_eq!(cx.get(r1), 0);
        assert_eq!(cx.get(r2), 4);

        buf[1] = 3;
        cx.reset();
        let err = cx.decode(&directive, &mut buf.as_slice(), &mut ()).unwrap_err();
        assert!(matches!(err, DecodeError::NoMatchingCase { .. }));
    }

    #[test]
    fn switch_on_bytes() {
        let directive: Directive<()> = bytes(1).switch(
            Switch::new()
                .case(Bytes::from_static(&[1]), u32())
                .case(Bytes::from_static(&[2]), u16()),
        );

        let (result, _, remaining) = decode(directive, &[2, 0, 0, 0, 0]);
        result.unwrap();
        assert_eq!(remaining, 2);
    }

    #[test]
    fn switch_noop_and_default() {
        let (result, _, _) = decode(u32().switch(Switch::new().case(0, Directive::noop())), &0u32.to_be_bytes());
        result.unwrap();

        let directive = u32().switch(Switch::new().case(0, Directive::noop()).default(Directive::noop()));
        let (result, _, _) = decode(directive, &2u32.to_be_bytes());
        result.unwrap();
    }

    #[test]
    fn switch_resolution_order() {
        let mut builder = SchemaBuilder::new();
        let (writer, reader) = builder.slot::<u8>();
        let dynamic = Arc::new(Directive::from(u8().alias(writer)));

        // Static cases win over the dynamic matcher, which wins over the default.
        let directive: Directive<u32> = u8().switch(
            Switch::new()
                .case(1, u16())
                .dynamic(move |value: &u8, _, matched: &u32| {
                    (*value == 2 || *matched == 1).then(|| Arc::clone(&dynamic))
                })
                .default(Directive::fail("default")),
        );

        let mut cx = DecodeContext::new(false);
        let mut buf: &[u8] = &[1, 0, 0];
        cx.decode(&directive, &mut buf, &mut 0).unwrap();
        assert!(buf.is_empty());

        let mut buf: &[u8] = &[2, 9];
        cx.decode(&directive, &mut buf, &mut 0).unwrap();
        assert_eq!(cx.get(reader), 9);

        let mut buf: &[u8] = &[3, 7];
        cx.decode(&directive, &mut buf, &mut 1).unwrap();
        assert_eq!(cx.get(reader), 7);

        let mut buf: &[u8] = &[3, 7];
        let err = cx.decode(&directive, &mut buf, &mut 0).unwrap_err();
        assert_eq!(err.to_string(), "default");
    }

    #[test]
    fn iter_runs_body_per_count() {
        let mut builder = SchemaBuilder::new();
        let (writer, reader) = builder.slot::<u32>();

        let directive = u32().iter(usize::MAX, u32().alias(writer), IterOptions::new());
        let mut buf = Vec::new();
        for v in [2u32, 3, 4] {
            buf.extend_from_slice(&v.to_be_bytes());
        }

        let mut cx = DecodeContext::new(false);
        cx.decode(&directive, &mut buf.as_slice(), &mut ()).unwrap();
        assert_eq!(cx.get(reader), 4);

        cx.reset();
        assert_eq!(cx.get(reader), 0);
    }

    #[test]
    fn iter_limit() {
        let mut buf = Vec::new();
        for v in [2u32, 3, 4] {
            buf.extend_from_slice(&v.to_be_bytes());
        }

        let (result, _, _) = decode(u32().iter(1, u32(), IterOptions::new()), &buf);
        assert!(matches!(result, Err(DecodeError::IterationLimitExceeded { max: 1 })));

        // Reaching the count at exactly the limit is fine.
        let (result, _, remaining) = decode(u32().iter(2, u32(), IterOptions::new()), &buf);
        result.unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn iterate_stop_conditions() {
        let buf = [0u8, 1, 0, 2, 0, 3, 0xFF];

        // Stops once a whole `u16` no longer fits.
        let (result, _, remaining) = decode(iterate(3, u16(), IterOptions::new().stop_below(2)), &buf);
        result.unwrap();
        assert_eq!(remaining, 1);

        // Same condition, one iteration short.
        let (result, _, _) = decode(iterate(2, u16(), IterOptions::new().stop_below(2)), &buf);
        assert!(matches!(result, Err(DecodeError::IterationLimitExceeded { max: 2 })));

        // Without a stop condition, running out of bytes is a truncation.
        let (result, _, _) = decode(iterate(10, u16(), IterOptions::new().eof_terminates()), &buf);
        assert!(result.unwrap_err().is_truncation());

        let (result, _, remaining) = decode(iterate(10, u16(), IterOptions::new().eof_terminates()), &buf[..6]);
        result.unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn errors_within_iter() {
        let (result, _, _) = decode(
            u32().iter(usize::MAX, Directive::fail("boom"), IterOptions::new()),
            &1u32.to_be_bytes(),
        );
        assert!(result.is_err());

        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(&1u32.to_be_bytes());
        let (result, _, _) = decode(
            u32().iter(usize::MAX, u32().then(ops::fail("boom")), IterOptions::new()),
            &buf,
        );
        assert!(result.is_err());
    }

    #[test]
    fn break_if_ends_innermost_iteration() {
        let directive = seq![
            iterate(
                10,
                seq![
                    open_metric("m"),
                    u16().then_all(vec![ops::as_field("v"), ops::break_if(0)]),
                    close_metric(),
                ],
                IterOptions::new().eof_terminates(),
            ),
            u16().then(ops::as_tag("after")),
            open_metric("n"),
            close_metric(),
        ];

        let (result, cx, remaining) = decode(directive, &[0, 5, 0, 6, 0, 0, 0, 9]);
        result.unwrap();
        assert_eq!(remaining, 0);

        // The breaking record is never closed, and nothing it emitted leaks past the iteration.
        let metrics = cx.metrics();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[1].field("v").and_then(|v| v.as_unsigned()), Some(6));
        assert_eq!(metrics[2].name(), "n");
        assert_eq!(metrics[2].field("v"), None);
        assert_eq!(metrics[2].tag("after"), Some("9"));
    }

    #[test]
    fn break_discards_abandoned_record() {
        let directive = seq![
            iterate(
                10,
                seq![
                    open_metric("m"),
                    u16().then_all(vec![ops::as_field("v"), ops::break_if(0)]),
                    close_metric(),
                ],
                IterOptions::new().eof_terminates(),
            ),
            open_metric("n"),
            u16().then(ops::as_field("w")),
            close_metric(),
        ];

        let (result, cx, _) = decode(directive, &[0, 5, 0, 0, 0, 9]);
        result.unwrap();

        let metrics = cx.metrics();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[1].name(), "n");
        assert_eq!(metrics[1].field("v"), None);
        assert_eq!(metrics[1].field("w").and_then(|v| v.as_unsigned()), Some(9));
    }

    #[test]
    fn break_inside_encapsulated_region() {
        // Length-prefixed records, where a zero value inside a record ends the list.
        let directive = seq![
            iterate(
                10,
                u8().encapsulated(
                    EncapsulationOptions::new(16),
                    seq![
                        open_metric("m"),
                        u8().then_all(vec![ops::as_field("v"), ops::break_if(0)]),
                        skip_rest(),
                        close_metric(),
                    ],
                ),
                IterOptions::new().eof_terminates(),
            ),
            u8().then(ops::as_tag("after")),
        ];

        let (result, cx, remaining) = decode(directive, &[2, 7, 1, 3, 0, 1, 1, 4]);
        result.unwrap();
        assert_eq!(remaining, 0);

        let metrics = cx.metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].field("v").and_then(|v| v.as_unsigned()), Some(7));
    }

    #[test]
    fn open_metric_per_iteration() {
        let directive = u32().iter(
            usize::MAX,
            seq![open_metric(""), u32().then(ops::as_field("foo")), close_metric()],
            IterOptions::new(),
        );
        let mut buf = Vec::new();
        for v in [2u32, 3, 4] {
            buf.extend_from_slice(&v.to_be_bytes());
        }

        let (result, cx, _) = decode(directive, &buf);
        result.unwrap();
        let metrics = cx.metrics();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].field("foo").and_then(|v| v.as_unsigned()), Some(3));
        assert_eq!(metrics[1].field("foo").and_then(|v| v.as_unsigned()), Some(4));
    }

    #[test]
    fn as_tag_per_iteration() {
        let directive = u32().iter(
            usize::MAX,
            seq![open_metric(""), u32().then(ops::as_tag("foo")), close_metric()],
            IterOptions::new(),
        );
        let mut buf = Vec::new();
        for v in [2u32, 3, 3] {
            buf.extend_from_slice(&v.to_be_bytes());
        }

        let (result, cx, _) = decode(directive, &buf);
        result.unwrap();
        assert!(cx.metrics().iter().all(|m| m.tag("foo") == Some("3")));
    }

    #[test]
    fn metrics_inherit_enclosing_emissions() {
        let directive = seq![
            u32().then(ops::as_field("bar")),
            u32().then(ops::as_tag("baz")),
            u32().iter(
                usize::MAX,
                seq![open_metric(""), u32().then(ops::as_field("foo")), close_metric()],
                IterOptions::new(),
            ),
        ];
        let mut buf = Vec::new();
        for v in [55u32, 56, 2, 3, 4] {
            buf.extend_from_slice(&v.to_be_bytes());
        }

        let (result, cx, _) = decode(directive, &buf);
        result.unwrap();

        let metrics = cx.metrics();
        assert_eq!(metrics.len(), 2);
        for (metric, foo) in metrics.iter().zip([3, 4]) {
            assert_eq!(metric.field("bar").and_then(|v| v.as_unsigned()), Some(55));
            assert_eq!(metric.tag("baz"), Some("56"));
            assert_eq!(metric.field("foo").and_then(|v| v.as_unsigned()), Some(foo));
        }
    }

    #[test]
    fn encapsulated_region() {
        let mut builder = SchemaBuilder::new();
        let (inner_w, inner_r) = builder.slot::<u32>();
        let (outer_w, outer_r) = builder.slot::<u32>();

        let directive = seq![
            u32().encapsulated(EncapsulationOptions::new(usize::MAX), seq![u32().alias(inner_w), skip_rest()]),
            u32().alias(outer_w),
        ];
        let mut buf = Vec::new();
        for v in [8u32, 2, 3, 4] {
            buf.extend_from_slice(&v.to_be_bytes());
        }

        let (result, cx, remaining) = decode(directive, &buf);
        result.unwrap();
        assert_eq!(remaining, 0);
        assert_eq!(cx.get(inner_r), 2);
        assert_eq!(cx.get(outer_r), 4);
    }

    #[test]
    fn encapsulation_limits() {
        let mut buf = Vec::new();
        for v in [8u32, 2, 3, 4] {
            buf.extend_from_slice(&v.to_be_bytes());
        }

        // Enough bytes are available, but the prefix is over the limit.
        let (result, _, _) = decode(u32().encapsulated(EncapsulationOptions::new(4), skip_rest()), &buf);
        assert!(matches!(
            result,
            Err(DecodeError::EncapsulationLimitExceeded { length: 8, max: 4 })
        ));

        let (result, _, _) = decode(u32().encapsulated(EncapsulationOptions::new(8), u32()), &buf);
        assert!(matches!(
            result,
            Err(DecodeError::EncapsulationNotConsumed { remaining: 4 })
        ));

        let (result, _, _) = decode(
            u32().encapsulated(EncapsulationOptions::new(64).including(12), skip_rest()),
            &buf,
        );
        assert!(matches!(
            result,
            Err(DecodeError::InvalidEncapsulationLength { declared: 8, header: 12 })
        ));

        // The inclusive header is subtracted from the prefix.
        let (result, _, remaining) = decode(
            u32().encapsulated(EncapsulationOptions::new(64).including(4), u32()),
            &buf,
        );
        result.unwrap();
        assert_eq!(remaining, 8);
    }

    #[test]
    fn encapsulated_inner_cannot_overread() {
        let (result, _, _) = decode(
            u8().encapsulated(EncapsulationOptions::new(255), u32()),
            &[2, 0, 0, 0, 1],
        );
        assert!(matches!(
            result,
            Err(DecodeError::InsufficientBytes { needed: 4, remaining: 2 })
        ));
    }

    #[test]
    fn reference_rereads_alias() {
        let mut builder = SchemaBuilder::new();
        let (writer, reader) = builder.slot::<u32>();

        let directive = seq![
            u32().alias(writer),
            open_metric(""),
            reference(reader).then(ops::as_field("again")),
            close_metric(),
        ];

        let (result, cx, remaining) = decode(directive, &1001u32.to_be_bytes());
        result.unwrap();
        assert_eq!(remaining, 0);
        assert_eq!(cx.metrics()[0].field("again").and_then(|v| v.as_unsigned()), Some(1001));
    }

    #[test]
    fn reference_drives_iteration() {
        let mut builder = SchemaBuilder::new();
        let (writer, reader) = builder.slot::<u8>();

        let directive = seq![u8().alias(writer), reference(reader).iter(4, u8(), IterOptions::new())];
        let (result, _, remaining) = decode(directive, &[2, 1, 1, 1]);
        result.unwrap();
        assert_eq!(remaining, 1);
    }

    #[test]
    fn constant_value() {
        let directive = seq![open_metric(""), constant(5u16).then(ops::as_field("x")), close_metric()];
        let (result, cx, _) = decode(directive, &[]);
        result.unwrap();
        assert_eq!(cx.metrics()[0].field("x").and_then(|v| v.as_unsigned()), Some(5));
    }

    #[test]
    fn notify_sees_slots_and_state() {
        let mut builder = SchemaBuilder::new();
        let (writer, reader) = builder.slot::<u16>();

        let directive: Directive<Vec<u16>> = u8().iter(
            8,
            seq![
                u16().alias(writer),
                notify(move |cx: &DecodeContext, seen: &mut Vec<u16>| {
                    seen.push(cx.get(reader));
                    Ok(())
                }),
            ],
            IterOptions::new(),
        );

        let mut seen = Vec::new();
        let mut cx = DecodeContext::new(false);
        let mut buf: &[u8] = &[2, 0, 7, 0, 9];
        cx.decode(&directive, &mut buf, &mut seen).unwrap();
        assert_eq!(seen, [7, 9]);
    }

    #[test]
    fn timestamp_and_map() {
        let directive = seq![
            u32().then(ops::timestamp()),
            open_metric("m"),
            u32().then(ops::map(|v: u32| v >> 2).as_field("x")),
            close_metric(),
        ];
        let mut buf = Vec::new();
        buf.extend_from_slice(&1_700_000_000u32.to_be_bytes());
        buf.extend_from_slice(&1001u32.to_be_bytes());

        let (result, cx, _) = decode(directive, &buf);
        result.unwrap();
        let metric = &cx.metrics()[0];
        assert_eq!(metric.timestamp(), 1_700_000_000);
        assert_eq!(metric.field("x").and_then(|v| v.as_unsigned()), Some(250));
    }

    #[test]
    fn failed_decode_keeps_closed_metrics() {
        let directive = u8().iter(
            4,
            seq![open_metric("m"), u16().then(ops::as_field("v")), close_metric()],
            IterOptions::new(),
        );

        let (result, cx, _) = decode(directive, &[3, 0, 1, 0, 2, 0]);
        assert!(result.unwrap_err().is_truncation());
        assert_eq!(cx.metrics().len(), 2);
    }

    #[test]
    fn reset_makes_decodes_independent() {
        let mut builder = SchemaBuilder::new();
        let (writer, reader) = builder.slot::<u32>();
        let schema = builder.build::<(), _>(seq![
            u32().alias(writer),
            open_metric("m"),
            reference(reader).then(ops::as_field("v")),
            close_metric(),
        ]);

        let mut cx = schema.new_context(true);
        schema.execute(&mut &1001u32.to_be_bytes()[..], &mut cx, &mut ()).unwrap();
        cx.reset();

        let err = schema.execute(&mut &[0u8, 0][..], &mut cx, &mut ()).unwrap_err();
        assert!(err.is_truncation());
        assert_eq!(cx.get(reader), 0);
        assert!(cx.metrics().is_empty());
    }

    proptest! {
        #[test]
        fn property_test_hostile_input_never_panics(input in arb_vec(any::<u8>(), 0..256)) {
            // Length-prefixed records of length-prefixed values, decoded from arbitrary bytes: every outcome must be a
            // clean result or error, and the cursor never moves past the input.
            let directive: Directive<()> = u16().iter(
                64,
                u8().encapsulated(
                    EncapsulationOptions::new(32).including(1),
                    iterate(
                        32,
                        seq![open_metric("m"), u8().switch(
                            Switch::new()
                                .case(1, u32().then(ops::as_field("a")))
                                .case(2, bytes(4).then(ops::ipv4().as_tag("b")))
                                .default(skip_rest()),
                        ), close_metric()],
                        IterOptions::new().eof_terminates(),
                    ),
                ),
                IterOptions::new().eof_terminates(),
            );

            let mut cx = DecodeContext::new(true);
            let mut buf = input.as_slice();
            let _ = cx.decode(&directive, &mut buf, &mut ());
            prop_assert!(buf.len() <= input.len());
        }
    }
}
