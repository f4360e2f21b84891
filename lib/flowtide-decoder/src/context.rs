use flowtide_event::{
    metric::{Fields, Tags},
    FieldValue, Metric,
};
use smallvec::SmallVec;
use tracing::trace;

use crate::{
    directive::Directive,
    error::{DecodeError, NoOpenMetric},
    schema::{SlotId, SlotRef},
    value::Unsigned,
};

/// A metric under construction.
///
/// The bottom frame of the stack is never emitted: it collects whatever is emitted outside of any open metric (packet
/// headers, typically) so that every metric opened afterwards inherits it.
#[derive(Clone, Default)]
struct Frame {
    name: String,
    tags: Tags,
    fields: Fields,
}

/// State of a single decode.
///
/// A context owns everything a directive tree produces while it runs: the slot arena holding aliased values, the stack
/// of metrics currently being assembled, the metrics already completed, and the timestamp given to them.
///
/// Contexts are cheap to create, and one is normally created per packet. A context can also be reused with
/// [`reset`][Self::reset], which returns it to the same state as a freshly created one.
///
/// ## Partial results
///
/// If a decode fails, every metric that was closed before the failure stays available through
/// [`metrics`][Self::metrics]. Metrics still open at the time of the failure are discarded.
pub struct DecodeContext {
    slots: Vec<u64>,
    frames: SmallVec<[Frame; 4]>,
    completed: Vec<Metric>,
    metrics_enabled: bool,
    timestamp: u64,
    break_pending: bool,
}

impl DecodeContext {
    /// Creates a new `DecodeContext`.
    ///
    /// When `metrics_enabled` is `false`, metric pseudo-operations and tag/field emission are ignored, and the directive
    /// tree is only used to validate input and populate slots.
    pub fn new(metrics_enabled: bool) -> Self {
        Self::with_slots(0, metrics_enabled)
    }

    pub(crate) fn with_slots(slots: usize, metrics_enabled: bool) -> Self {
        let mut frames = SmallVec::new();
        frames.push(Frame::default());

        Self {
            slots: vec![0; slots],
            frames,
            completed: Vec::new(),
            metrics_enabled,
            timestamp: 0,
            break_pending: false,
        }
    }

    /// Executes `directive` against `buf`, advancing it past every consumed byte.
    ///
    /// # Errors
    ///
    /// If the input is malformed, an error is returned. Metrics closed before the error remain available.
    pub fn decode<S>(&mut self, directive: &Directive<S>, buf: &mut &[u8], state: &mut S) -> Result<(), DecodeError> {
        let result = directive.execute(buf, self, state);

        // A break that escaped every iteration has nothing left to stop.
        self.break_pending = false;

        let open = self.frames.len() - 1;
        if open > 0 {
            match &result {
                Ok(()) => trace!(open, "Discarding metrics left open at end of decode."),
                Err(e) => trace!(error = %e, open, "Discarding incomplete metrics after decode error."),
            }
            self.frames.truncate(1);
        }

        result
    }

    /// Returns `true` if metric assembly is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_enabled
    }

    /// Returns the metrics completed so far.
    pub fn metrics(&self) -> &[Metric] {
        &self.completed
    }

    /// Takes the metrics completed so far, leaving the context without any.
    pub fn take_metrics(&mut self) -> Vec<Metric> {
        std::mem::take(&mut self.completed)
    }

    /// Returns the timestamp given to metrics as they are closed.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Sets the timestamp given to metrics as they are closed, in seconds since the Unix epoch.
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// Gets the current value of a slot.
    ///
    /// Slots that have not been written during this decode hold zero.
    pub fn get<T: Unsigned>(&self, slot: SlotRef<T>) -> T {
        T::from_slot(self.slot(slot.id()))
    }

    /// Resets the context to the state of a freshly created one.
    ///
    /// All slots are zeroed, and both in-progress and completed metrics are dropped.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = 0);
        self.frames.truncate(1);
        self.frames[0] = Frame::default();
        self.completed.clear();
        self.timestamp = 0;
        self.break_pending = false;
    }

    pub(crate) fn slot(&self, id: SlotId) -> u64 {
        self.slots.get(id.0).copied().unwrap_or(0)
    }

    pub(crate) fn set_slot(&mut self, id: SlotId, value: u64) {
        if id.0 >= self.slots.len() {
            self.slots.resize(id.0 + 1, 0);
        }
        self.slots[id.0] = value;
    }

    pub(crate) fn emit_field(&mut self, name: &str, value: FieldValue) {
        if self.metrics_enabled {
            self.top_frame().fields.insert(name.to_string(), value);
        }
    }

    pub(crate) fn emit_tag(&mut self, name: &str, value: String) {
        if self.metrics_enabled {
            self.top_frame().tags.insert(name.to_string(), value);
        }
    }

    pub(crate) fn open_metric(&mut self, name: &str) {
        if !self.metrics_enabled {
            return;
        }

        let mut frame = self.top_frame().clone();
        frame.name = name.to_string();
        self.frames.push(frame);
    }

    pub(crate) fn close_metric(&mut self) -> Result<(), DecodeError> {
        if !self.metrics_enabled {
            return Ok(());
        }

        if self.frames.len() < 2 {
            return NoOpenMetric.fail();
        }

        let Some(frame) = self.frames.pop() else {
            return NoOpenMetric.fail();
        };
        self.completed
            .push(Metric::from_parts(frame.name, frame.tags, frame.fields, self.timestamp));
        Ok(())
    }

    pub(crate) fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Drops metrics opened above `depth` without completing them.
    pub(crate) fn truncate_frames(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
    }

    pub(crate) fn request_break(&mut self) {
        self.break_pending = true;
    }

    pub(crate) fn break_pending(&self) -> bool {
        self.break_pending
    }

    pub(crate) fn take_break(&mut self) -> bool {
        std::mem::take(&mut self.break_pending)
    }

    fn top_frame(&mut self) -> &mut Frame {
        // The root frame is only ever removed transiently by `close_metric`, which checks for it first.
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

impl std::fmt::Debug for DecodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeContext")
            .field("slots", &self.slots)
            .field("open_metrics", &(self.frames.len() - 1))
            .field("completed", &self.completed.len())
            .field("metrics_enabled", &self.metrics_enabled)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}
