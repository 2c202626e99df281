//! Structured registers
//!
//! A format is a slice of [`Element`]s, each an integer [`Kind`] with its own
//! byte order. The payload of a structured register is the concatenation of
//! its elements, first element at the lowest register address. Every payload
//! byte is determined by the values written, so writes need no prior read.

use crate::bits::sign_extend;
use crate::buffer::{ByteOrder, RegisterAddress, RegisterBuffer, Storage};
use crate::interface::RegisterBus;
use crate::{ConfigError, Error, FIELD_FRAME, STRUCT_FRAME};

#[cfg(feature = "alloc")]
use crate::buffer::LazyStorage;

/// Integer type of one struct element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Kind {
    /// Unsigned 8-bit
    U8,
    /// Signed 8-bit
    I8,
    /// Unsigned 16-bit
    U16,
    /// Signed 16-bit
    I16,
    /// Unsigned 24-bit
    U24,
    /// Signed 24-bit
    I24,
    /// Unsigned 32-bit
    U32,
    /// Signed 32-bit
    I32,
}

impl Kind {
    /// Size in bytes
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U24 | Self::I24 => 3,
            Self::U32 | Self::I32 => 4,
        }
    }

    /// Whether values are two's-complement
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I24 | Self::I32)
    }

    /// Smallest representable value
    #[must_use]
    pub const fn min(self) -> i64 {
        if self.is_signed() {
            -(1 << (self.width() * 8 - 1))
        } else {
            0
        }
    }

    /// Largest representable value
    #[must_use]
    pub const fn max(self) -> i64 {
        if self.is_signed() {
            (1 << (self.width() * 8 - 1)) - 1
        } else {
            (1 << (self.width() * 8)) - 1
        }
    }
}

/// One element of a structured register format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Element {
    /// Integer type
    pub kind: Kind,
    /// Byte order on the wire
    pub order: ByteOrder,
}

impl Element {
    /// Little-endian element
    #[must_use]
    pub const fn le(kind: Kind) -> Self {
        Self {
            kind,
            order: ByteOrder::Little,
        }
    }

    /// Big-endian element
    #[must_use]
    pub const fn be(kind: Kind) -> Self {
        Self {
            kind,
            order: ByteOrder::Big,
        }
    }

    /// Size in bytes
    #[must_use]
    pub const fn width(&self) -> usize {
        self.kind.width()
    }

    /// Decode the element from exactly [`width`](Self::width) bytes
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> i64 {
        let raw = self.order.load(bytes);
        if self.kind.is_signed() {
            sign_extend(raw, (self.width() * 8) as u32)
        } else {
            raw as i64
        }
    }

    /// Encode `value` into exactly [`width`](Self::width) bytes
    ///
    /// Returns `false` without touching `bytes` if the value does not fit.
    pub fn encode(&self, value: i64, bytes: &mut [u8]) -> bool {
        if !self.fits(value) {
            return false;
        }
        self.order.store(bytes, value as u64);
        true
    }

    const fn fits(&self, value: i64) -> bool {
        value >= self.kind.min() && value <= self.kind.max()
    }
}

/// Total payload size of a format
#[must_use]
pub fn format_width(format: &[Element]) -> usize {
    format.iter().map(Element::width).sum()
}

/// Decode `payload` into one value per element
///
/// # Errors
///
/// Returns [`Error::Arity`] if `out` does not have one slot per element.
pub fn unpack<E>(format: &[Element], payload: &[u8], out: &mut [i64]) -> Result<(), Error<E>> {
    check_arity(format, out.len())?;
    let mut offset = 0;
    for (element, slot) in format.iter().zip(out.iter_mut()) {
        let end = offset + element.width();
        *slot = element.decode(&payload[offset..end]);
        offset = end;
    }
    Ok(())
}

/// Encode one value per element into `payload`
///
/// Every value is checked before the first byte is written, so `payload` is
/// left untouched on error.
///
/// # Errors
///
/// Returns [`Error::Arity`] or [`Error::OutOfRange`].
pub fn pack<E>(format: &[Element], values: &[i64], payload: &mut [u8]) -> Result<(), Error<E>> {
    check_arity(format, values.len())?;
    if let Some((element, &value)) = format
        .iter()
        .zip(values)
        .find(|(element, value)| !element.fits(**value))
    {
        return Err(Error::out_of_range(
            value,
            element.kind.min(),
            element.kind.max(),
        ));
    }

    let mut offset = 0;
    for (element, &value) in format.iter().zip(values) {
        let end = offset + element.width();
        element.encode(value, &mut payload[offset..end]);
        offset = end;
    }
    Ok(())
}

fn check_arity<E>(format: &[Element], actual: usize) -> Result<(), Error<E>> {
    if format.len() != actual {
        return Err(Error::Arity {
            expected: format.len(),
            actual,
        });
    }
    Ok(())
}

fn check_format(format: &[Element]) -> Result<usize, ConfigError> {
    if format.is_empty() {
        return Err(ConfigError::EmptyFormat);
    }
    Ok(format_width(format))
}

/// Register holding a fixed tuple of integers
///
/// # Example
/// ```ignore
/// // Three big-endian axes starting at ACCEL_XOUT_H
/// const AXES: &[Element] = &[Element::be(Kind::I16), Element::be(Kind::I16), Element::be(Kind::I16)];
/// let mut accel = Struct::new(&mut device, RegisterAddress::new(0x2D), AXES)?;
/// let mut xyz = [0; 3];
/// accel.read(&mut xyz)?;
/// ```
pub struct Struct<'f, B, S = [u8; STRUCT_FRAME]> {
    bus: B,
    buffer: RegisterBuffer<S>,
    format: &'f [Element],
}

impl<'f, B: RegisterBus> Struct<'f, B> {
    /// Structured register with inline storage for up to eight payload bytes
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyFormat`] or [`ConfigError::BufferTooSmall`].
    pub fn new(
        bus: B,
        address: RegisterAddress,
        format: &'f [Element],
    ) -> Result<Self, ConfigError> {
        Self::with_storage(bus, [0; STRUCT_FRAME], address, format)
    }
}

#[cfg(feature = "alloc")]
impl<'f, B: RegisterBus> Struct<'f, B, LazyStorage> {
    /// Structured register of any size, allocating its buffer on first access
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyFormat`].
    pub fn new_lazy(
        bus: B,
        address: RegisterAddress,
        format: &'f [Element],
    ) -> Result<Self, ConfigError> {
        Self::with_storage(bus, LazyStorage::new(), address, format)
    }
}

impl<'f, B: RegisterBus, S: Storage> Struct<'f, B, S> {
    /// Build on caller-provided storage
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyFormat`] or [`ConfigError::BufferTooSmall`].
    pub fn with_storage(
        bus: B,
        storage: S,
        address: RegisterAddress,
        format: &'f [Element],
    ) -> Result<Self, ConfigError> {
        let width = check_format(format)?;
        Ok(Self {
            bus,
            buffer: RegisterBuffer::new(storage, address, width)?,
            format,
        })
    }

    /// Read every element into `out`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arity`] before touching the bus if `out` has the wrong
    /// length, or [`Error::Bus`] if the transaction fails.
    pub fn read(&mut self, out: &mut [i64]) -> Result<(), Error<B::Error>> {
        check_arity::<B::Error>(self.format, out.len())?;
        let mut bus = self.bus.lock()?;
        self.buffer.fetch(&mut bus)?;
        unpack(self.format, self.buffer.payload_mut(), out)
    }

    /// Write every element in one transaction
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arity`] or [`Error::OutOfRange`] before touching the
    /// bus, or [`Error::Bus`] if the transaction fails.
    pub fn write(&mut self, values: &[i64]) -> Result<(), Error<B::Error>> {
        pack::<B::Error>(self.format, values, self.buffer.payload_mut())?;
        let mut bus = self.bus.lock()?;
        self.buffer.store(&mut bus)?;
        Ok(())
    }

    /// Register format
    pub const fn format(&self) -> &'f [Element] {
        self.format
    }

    /// Consume the register and return the bus
    pub fn release(self) -> B {
        self.bus
    }
}

/// Register holding a single integer
pub struct UnaryStruct<B, S = [u8; FIELD_FRAME]> {
    bus: B,
    buffer: RegisterBuffer<S>,
    element: Element,
}

impl<B: RegisterBus> UnaryStruct<B> {
    /// Single-integer register
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BufferTooSmall`] only for custom storage.
    pub fn new(bus: B, address: RegisterAddress, element: Element) -> Result<Self, ConfigError> {
        Self::with_storage(bus, [0; FIELD_FRAME], address, element)
    }
}

impl<B: RegisterBus, S: Storage> UnaryStruct<B, S> {
    /// Build on caller-provided storage
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BufferTooSmall`] if the storage cannot hold the frame.
    pub fn with_storage(
        bus: B,
        storage: S,
        address: RegisterAddress,
        element: Element,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            bus,
            buffer: RegisterBuffer::new(storage, address, element.width())?,
            element,
        })
    }

    /// Read the value
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the transaction fails.
    pub fn read(&mut self) -> Result<i64, Error<B::Error>> {
        let mut bus = self.bus.lock()?;
        self.buffer.fetch(&mut bus)?;
        Ok(self.element.decode(self.buffer.payload_mut()))
    }

    /// Write the value
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] before touching the bus if `value` does
    /// not fit the element, or [`Error::Bus`] if the transaction fails.
    pub fn write(&mut self, value: i64) -> Result<(), Error<B::Error>> {
        if !self.element.encode(value, self.buffer.payload_mut()) {
            let kind = self.element.kind;
            return Err(Error::out_of_range(value, kind.min(), kind.max()));
        }
        let mut bus = self.bus.lock()?;
        self.buffer.store(&mut bus)?;
        Ok(())
    }

    /// Consume the register and return the bus
    pub fn release(self) -> B {
        self.bus
    }
}

/// Read-only single-integer register
pub struct ROUnaryStruct<B, S = [u8; FIELD_FRAME]>(UnaryStruct<B, S>);

impl<B: RegisterBus> ROUnaryStruct<B> {
    /// Single-integer register
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BufferTooSmall`] only for custom storage.
    pub fn new(bus: B, address: RegisterAddress, element: Element) -> Result<Self, ConfigError> {
        UnaryStruct::new(bus, address, element).map(Self)
    }
}

impl<B: RegisterBus, S: Storage> ROUnaryStruct<B, S> {
    /// Read the value
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the transaction fails.
    pub fn read(&mut self) -> Result<i64, Error<B::Error>> {
        self.0.read()
    }

    /// Consume the register and return the bus
    pub fn release(self) -> B {
        self.0.release()
    }
}

/// `count` consecutive structs of one format
///
/// Element `i` starts at `address + i * width`. Frames are built on the stack
/// per access in an `N`-byte array, so the array holds no buffer of its own.
pub struct StructArray<'f, B, const N: usize = STRUCT_FRAME> {
    bus: B,
    address: RegisterAddress,
    format: &'f [Element],
    width: usize,
    count: usize,
}

impl<'f, B: RegisterBus, const N: usize> StructArray<'f, B, N> {
    /// Array of `count` elements starting at `address`
    ///
    /// # Errors
    ///
    /// Returns an error if the format is empty, an element frame does not fit
    /// in `N` bytes or the last element lies outside the address space.
    pub fn new(
        bus: B,
        address: RegisterAddress,
        format: &'f [Element],
        count: usize,
    ) -> Result<Self, ConfigError> {
        let width = check_format(format)?;
        let needed = address.width().len() + width;
        if needed > N {
            return Err(ConfigError::BufferTooSmall {
                needed,
                capacity: N,
            });
        }
        if let Some(last) = count.checked_sub(1) {
            address.offset(last.saturating_mul(width))?;
        }
        Ok(Self {
            bus,
            address,
            format,
            width,
            count,
        })
    }

    /// Number of elements
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Whether the array has no elements
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn frame(&self, index: usize) -> Result<RegisterBuffer<[u8; N]>, Error<B::Error>> {
        if index >= self.count {
            return Err(Error::Index {
                index,
                count: self.count,
            });
        }
        let address = self
            .address
            .offset(index * self.width)
            .map_err(Error::Config)?;
        RegisterBuffer::new([0; N], address, self.width).map_err(Error::Config)
    }

    /// Read element `index` into `out`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] or [`Error::Arity`] before touching the bus,
    /// or [`Error::Bus`] if the transaction fails.
    pub fn get(&mut self, index: usize, out: &mut [i64]) -> Result<(), Error<B::Error>> {
        let mut buffer = self.frame(index)?;
        check_arity::<B::Error>(self.format, out.len())?;
        let mut bus = self.bus.lock()?;
        buffer.fetch(&mut bus)?;
        unpack(self.format, buffer.payload_mut(), out)
    }

    /// Write element `index`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`], [`Error::Arity`] or [`Error::OutOfRange`]
    /// before touching the bus, or [`Error::Bus`] if the transaction fails.
    pub fn set(&mut self, index: usize, values: &[i64]) -> Result<(), Error<B::Error>> {
        let mut buffer = self.frame(index)?;
        pack::<B::Error>(self.format, values, buffer.payload_mut())?;
        let mut bus = self.bus.lock()?;
        buffer.store(&mut bus)?;
        Ok(())
    }

    /// Consume the array and return the bus
    pub fn release(self) -> B {
        self.bus
    }
}
