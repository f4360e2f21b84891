use snafu::Snafu;

/// A decode error.
///
/// Every variant except [`NoOpenMetric`][DecodeError::NoOpenMetric] describes malformed (or hostile) input, and is
/// recoverable by rejecting the packet being decoded. `NoOpenMetric` means the directive tree itself closes more metrics
/// than it opens.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    /// The cursor held fewer bytes than a read required.
    #[snafu(display("insufficient bytes: needed {}, {} remaining", needed, remaining))]
    InsufficientBytes { needed: usize, remaining: usize },

    /// A switch found no case, dynamic match, or default for the decoded value.
    #[snafu(display("no matching case for value {}", value))]
    NoMatchingCase { value: String },

    /// An iteration ran `max` times without reaching its stop condition.
    #[snafu(display("iteration limit of {} exceeded", max))]
    IterationLimitExceeded { max: usize },

    /// A length prefix declared a region larger than the encapsulation allows.
    #[snafu(display("encapsulated length {} exceeds limit of {} bytes", length, max))]
    EncapsulationLimitExceeded { length: u64, max: usize },

    /// A length prefix was smaller than the header it is declared to include.
    #[snafu(display("encapsulated length {} is shorter than its {}-byte header", declared, header))]
    InvalidEncapsulationLength { declared: u64, header: usize },

    /// The directive inside an encapsulation did not consume its whole region.
    #[snafu(display("{} bytes left unconsumed in encapsulated region", remaining))]
    EncapsulationNotConsumed { remaining: usize },

    /// A metric was closed while none was open.
    #[snafu(display("no metric is open"))]
    NoOpenMetric,

    /// A notification callback or operation rejected the data.
    #[snafu(display("{}", message))]
    Rejected { message: String },
}

impl DecodeError {
    /// Creates an error rejecting the data being decoded with the given message.
    pub fn rejected<M: Into<String>>(message: M) -> Self {
        Rejected { message }.build()
    }

    /// Returns `true` if the input ended before the directive tree was satisfied.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::InsufficientBytes { .. })
    }
}

pub(crate) fn ensure_remaining(buf: &[u8], needed: usize) -> Result<(), DecodeError> {
    if buf.len() < needed {
        return InsufficientBytes {
            needed,
            remaining: buf.len(),
        }
        .fail();
    }
    Ok(())
}
