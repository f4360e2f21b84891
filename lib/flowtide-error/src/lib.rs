//! Application-level error handling.
//!
//! Library crates in this workspace define their own error enums with `snafu`. Anything that only needs to be reported
//! (loading a services file, replaying a capture, wiring up a binary) uses [`GenericError`] instead.

use std::fmt::Display;

/// A type-erased error, suitable for bubbling up to the top of an application.
pub type GenericError = anyhow::Error;

/// Constructs a [`GenericError`].
///
/// Accepts a string literal, a format string with arguments (in the same order as `std::format!`), or an existing value
/// implementing `Debug` and `Display`. An existing `std::error::Error` keeps its source chain.
#[macro_export]
macro_rules! generic_error {
    ($msg:literal $(,)?) => { $crate::_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::_anyhow!($fmt, $($arg)*) };
}

#[doc(hidden)]
pub use anyhow::anyhow as _anyhow;

mod private {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

/// Attaches human-readable context to a fallible result.
///
/// This wraps `anyhow::Context` under a distinct name so that it can be imported next to `snafu::ResultExt` without the
/// two extension traits colliding.
pub trait ErrorContext<T, E>: private::Sealed {
    /// Wraps the error with the given context.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Wraps the error with context that is only built if an error actually occurred.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        <Self as anyhow::Context<T, E>>::context(self, context)
    }

    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        <Self as anyhow::Context<T, E>>::with_context(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_wraps_source() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let err = result.error_context("Failed to open services file.").unwrap_err();

        assert_eq!(err.to_string(), "Failed to open services file.");
        assert_eq!(err.root_cause().to_string(), "missing");
    }

    #[test]
    fn generic_error_formats() {
        let err = generic_error!("bad payload in {}", "capture.bin");
        assert_eq!(err.to_string(), "bad payload in capture.bin");
    }
}
