#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod alarm;
pub mod bcd;
pub mod bit;
pub mod bits;
pub mod buffer;
pub mod datetime;
pub mod interface;
pub mod structured;

// Re-export main types
pub use alarm::{Alarm, AlarmField, AlarmFrequency, AlarmLayout, BcdAlarm, DayLayout, DayMatch};
pub use bcd::{Clock, HourFormat, decode_bcd, encode_bcd};
pub use bit::{ROBit, RWBit};
pub use bits::{Field, ROBits, RWBits};
#[cfg(feature = "alloc")]
pub use buffer::LazyStorage;
pub use buffer::{AddressWidth, ByteOrder, RegisterAddress, RegisterBuffer, Storage};
pub use datetime::{BcdDateTime, DateTime, DateTimeLayout};
#[cfg(feature = "std")]
pub use interface::MutexBus;
pub use interface::{
    I2cDevice, RefCellBus, RegisterBus, SharedBusError, SharedGuard, SpiDevice, Transaction,
};
pub use structured::{Element, Kind, ROUnaryStruct, Struct, StructArray, UnaryStruct};

/// Widest register, in bytes, that the bit and bit-field codecs accept
pub const MAX_REGISTER_WIDTH: u8 = 4;

/// Inline frame size for bit, bit-field and unary registers
///
/// Two address bytes followed by up to [`MAX_REGISTER_WIDTH`] payload bytes.
pub const FIELD_FRAME: usize = 2 + MAX_REGISTER_WIDTH as usize;

/// Default inline frame size for structured registers (two address bytes, eight payload bytes)
pub const STRUCT_FRAME: usize = 10;

/// Errors detected while constructing a register codec
///
/// These never involve the bus: a codec that was built successfully cannot
/// later fail for any of these reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The register address does not fit the address width (contains the address)
    AddressOutOfRange(u32),
    /// The bit index lies outside the register
    BitOutOfRange {
        /// Requested bit index
        bit: u8,
        /// Register width in bytes
        register_width: u8,
    },
    /// Field width is zero or wider than 32 bits (contains the width)
    InvalidWidth(u8),
    /// The field extends past the end of the register
    FieldOutOfRange {
        /// Lowest bit of the field
        lowest_bit: u8,
        /// Width of the field in bits
        width: u8,
        /// Register width in bytes
        register_width: u8,
    },
    /// Register width outside `1..=MAX_REGISTER_WIDTH` (contains the width)
    RegisterWidth(u8),
    /// The storage cannot hold the address and payload bytes
    BufferTooSmall {
        /// Bytes required for address and payload
        needed: usize,
        /// Bytes available in the storage
        capacity: usize,
    },
    /// A structured register format without elements
    EmptyFormat,
    /// A calendar or alarm layout with overlapping or out-of-range flag bits
    InvalidLayout,
}

/// Register access errors
///
/// Generic over the error type of the [`RegisterBus`] the codec talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Communication error reported by the bus provider
    Bus(E),
    /// The value does not fit the field it is written to
    OutOfRange {
        /// Rejected value
        value: i64,
        /// Smallest accepted value
        min: i64,
        /// Largest accepted value
        max: i64,
    },
    /// A byte read from the device holds a nibble greater than 9 (contains the raw byte)
    InvalidBcd(u8),
    /// The number of values does not match the register format
    Arity {
        /// Elements in the format
        expected: usize,
        /// Values supplied
        actual: usize,
    },
    /// Element index past the end of a register array
    Index {
        /// Requested index
        index: usize,
        /// Number of elements in the array
        count: usize,
    },
    /// Invalid codec configuration
    Config(ConfigError),
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Self::Bus(error)
    }
}

impl<E> Error<E> {
    pub(crate) const fn out_of_range(value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange { value, min, max }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AddressOutOfRange(address) => {
                write!(f, "register address {address:#x} does not fit its width")
            }
            Self::BitOutOfRange {
                bit,
                register_width,
            } => write!(f, "bit {bit} outside {register_width}-byte register"),
            Self::InvalidWidth(width) => write!(f, "invalid field width {width}"),
            Self::FieldOutOfRange {
                lowest_bit,
                width,
                register_width,
            } => write!(
                f,
                "{width}-bit field at bit {lowest_bit} exceeds {register_width}-byte register"
            ),
            Self::RegisterWidth(width) => write!(f, "unsupported register width {width}"),
            Self::BufferTooSmall { needed, capacity } => {
                write!(f, "buffer of {capacity} bytes cannot hold {needed} bytes")
            }
            Self::EmptyFormat => f.write_str("register format has no elements"),
            Self::InvalidLayout => f.write_str("overlapping or invalid layout bits"),
        }
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus(error) => write!(f, "bus error: {error:?}"),
            Self::OutOfRange { value, min, max } => {
                write!(f, "value {value} outside {min}..={max}")
            }
            Self::InvalidBcd(byte) => write!(f, "invalid BCD byte {byte:#04x}"),
            Self::Arity { expected, actual } => {
                write!(f, "expected {expected} values, got {actual}")
            }
            Self::Index { index, count } => write!(f, "index {index} outside array of {count}"),
            Self::Config(error) => write!(f, "configuration error: {error}"),
        }
    }
}
