use std::{fmt, hash::Hash, marker::PhantomData};

use bytes::{Buf as _, Bytes};

use crate::{
    context::DecodeContext,
    error::{ensure_remaining, DecodeError},
    schema::SlotId,
};

mod private {
    pub trait Sealed {}

    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
    impl Sealed for bytes::Bytes {}
}

/// A value produced by a value directive.
pub trait DecodedValue: private::Sealed + Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Returns the value widened to `u64`, if it is an unsigned integer.
    fn as_u64(&self) -> Option<u64>;
}

/// An unsigned, big-endian integer that can be read off the wire and stored in a slot.
pub trait Unsigned: DecodedValue + Copy + Eq + Hash + fmt::Display {
    /// Width on the wire, in bytes.
    const WIDTH: usize;

    #[doc(hidden)]
    fn get(buf: &mut &[u8]) -> Self;

    /// Narrows a slot value back to this type.
    fn from_slot(value: u64) -> Self;

    /// Widens this value for slot storage.
    fn to_slot(self) -> u64;
}

macro_rules! unsigned {
    ($ty:ty, $get:ident) => {
        impl DecodedValue for $ty {
            fn as_u64(&self) -> Option<u64> {
                Some(u64::from(*self))
            }
        }

        impl Unsigned for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            #[inline]
            fn get(buf: &mut &[u8]) -> Self {
                buf.$get()
            }

            #[inline]
            fn from_slot(value: u64) -> Self {
                value as $ty
            }

            #[inline]
            fn to_slot(self) -> u64 {
                u64::from(self)
            }
        }
    };
}

unsigned!(u8, get_u8);
unsigned!(u16, get_u16);
unsigned!(u32, get_u32);
unsigned!(u64, get_u64);

impl DecodedValue for Bytes {
    fn as_u64(&self) -> Option<u64> {
        None
    }
}

/// Source of the value for a value directive.
pub trait Reader: Send + Sync + 'static {
    /// Type of value produced.
    type Value: DecodedValue;

    /// Reads the value, advancing the cursor by however many bytes it occupies on the wire.
    fn read(&self, buf: &mut &[u8], cx: &DecodeContext) -> Result<Self::Value, DecodeError>;
}

/// Reads a fixed-width unsigned integer.
pub struct Fixed<T>(PhantomData<fn() -> T>);

impl<T> Fixed<T> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Unsigned> Reader for Fixed<T> {
    type Value = T;

    fn read(&self, buf: &mut &[u8], _: &DecodeContext) -> Result<T, DecodeError> {
        ensure_remaining(buf, T::WIDTH)?;
        Ok(T::get(buf))
    }
}

/// Reads a fixed-length run of bytes.
pub struct ByteRun {
    len: usize,
}

impl ByteRun {
    pub(crate) fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Reader for ByteRun {
    type Value = Bytes;

    fn read(&self, buf: &mut &[u8], _: &DecodeContext) -> Result<Bytes, DecodeError> {
        ensure_remaining(buf, self.len)?;
        Ok(buf.copy_to_bytes(self.len))
    }
}

/// Re-reads a value previously stored in a slot, without consuming any bytes.
pub struct SlotRead<T> {
    slot: SlotId,
    _value: PhantomData<fn() -> T>,
}

impl<T> SlotRead<T> {
    pub(crate) fn new(slot: SlotId) -> Self {
        Self {
            slot,
            _value: PhantomData,
        }
    }
}

impl<T: Unsigned> Reader for SlotRead<T> {
    type Value = T;

    fn read(&self, _: &mut &[u8], cx: &DecodeContext) -> Result<T, DecodeError> {
        Ok(T::from_slot(cx.slot(self.slot)))
    }
}

/// Produces a fixed value without consuming any bytes.
pub struct Constant<T> {
    value: T,
}

impl<T> Constant<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Unsigned> Reader for Constant<T> {
    type Value = T;

    fn read(&self, _: &mut &[u8], _: &DecodeContext) -> Result<T, DecodeError> {
        Ok(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_reads_big_endian() {
        let cx = DecodeContext::new(false);
        let mut buf: &[u8] = &[0x00, 0x00, 0x03, 0xE9, 0xFF];

        assert_eq!(Fixed::<u32>::new().read(&mut buf, &cx).unwrap(), 1001);
        assert_eq!(buf, &[0xFF]);
    }

    #[test]
    fn fixed_insufficient_bytes() {
        let cx = DecodeContext::new(false);
        let mut buf: &[u8] = &[0x03, 0xE9];

        let err = Fixed::<u32>::new().read(&mut buf, &cx).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InsufficientBytes {
                needed: 4,
                remaining: 2
            }
        ));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn byte_run() {
        let cx = DecodeContext::new(false);
        let mut buf: &[u8] = &[1, 2, 3, 4, 5];

        let value = ByteRun::new(4).read(&mut buf, &cx).unwrap();
        assert_eq!(&value[..], &[1, 2, 3, 4]);
        assert_eq!(buf, &[5]);
    }

    #[test]
    fn slot_narrowing() {
        assert_eq!(u16::from_slot(0x1_0005), 5);
        assert_eq!(0xFFu8.to_slot(), 255);
        assert_eq!(Bytes::from_static(b"ab").as_u64(), None);
    }
}
