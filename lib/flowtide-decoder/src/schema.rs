use std::{fmt, marker::PhantomData};

use crate::{context::DecodeContext, directive::Directive, error::DecodeError, value::Unsigned};

/// Index of a value in a decode context's slot arena.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SlotId(pub(crate) usize);

/// Write half of a slot.
///
/// A writer can be handed to exactly one directive (via [`alias`][crate::ValueDirective::alias] or
/// [`ops::set`][crate::ops::set]), which makes every slot single-assignment per decode.
pub struct SlotWriter<T> {
    id: SlotId,
    _value: PhantomData<fn(T)>,
}

impl<T> SlotWriter<T> {
    pub(crate) fn id(&self) -> SlotId {
        self.id
    }
}

impl<T> fmt::Debug for SlotWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SlotWriter").field(&self.id.0).finish()
    }
}

/// Read half of a slot.
///
/// Readers are `Copy`, and can be used any number of times: with [`reference`][crate::reference] to re-use a decoded
/// value inside the directive tree, or with [`DecodeContext::get`] from notification callbacks.
pub struct SlotRef<T> {
    id: SlotId,
    _value: PhantomData<fn() -> T>,
}

impl<T> SlotRef<T> {
    pub(crate) fn id(&self) -> SlotId {
        self.id
    }
}

impl<T> Clone for SlotRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SlotRef<T> {}

impl<T> fmt::Debug for SlotRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SlotRef").field(&self.id.0).finish()
    }
}

/// Builder for a [`Schema`].
///
/// Slots are allocated here, before the directives that use them are built, so that each slot gets a stable index into
/// the arena of every [`DecodeContext`] created from the resulting schema.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    slots: usize,
}

impl SchemaBuilder {
    /// Creates a new `SchemaBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new slot holding a value of type `T`.
    pub fn slot<T: Unsigned>(&mut self) -> (SlotWriter<T>, SlotRef<T>) {
        let id = SlotId(self.slots);
        self.slots += 1;

        (
            SlotWriter {
                id,
                _value: PhantomData,
            },
            SlotRef {
                id,
                _value: PhantomData,
            },
        )
    }

    /// Compiles the schema rooted at the given directive.
    pub fn build<S, D>(self, root: D) -> Schema<S>
    where
        D: Into<Directive<S>>,
    {
        Schema {
            root: root.into(),
            slots: self.slots,
        }
    }
}

/// A compiled directive tree.
///
/// A schema holds no decoded state, so one schema can serve any number of decodes, including concurrent ones. Each
/// decode runs against its own [`DecodeContext`] and its own caller state `S`.
pub struct Schema<S> {
    root: Directive<S>,
    slots: usize,
}

impl<S> Schema<S> {
    /// Returns the number of slots allocated for this schema.
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    /// Creates a decode context sized for this schema.
    pub fn new_context(&self, metrics_enabled: bool) -> DecodeContext {
        DecodeContext::with_slots(self.slots, metrics_enabled)
    }

    /// Executes the schema against `buf`, advancing it past every consumed byte.
    ///
    /// # Errors
    ///
    /// If the input is malformed, an error is returned. Metrics closed before the error remain in `cx`.
    pub fn execute(&self, buf: &mut &[u8], cx: &mut DecodeContext, state: &mut S) -> Result<(), DecodeError> {
        cx.decode(&self.root, buf, state)
    }
}

impl<S> fmt::Debug for Schema<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("slots", &self.slots).finish_non_exhaustive()
    }
}
