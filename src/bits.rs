//! Multi-bit fields
//!
//! A [`Field`] is a contiguous run of 1 to 32 bits inside a register of 1 to 4
//! bytes, read as an unsigned or two's-complement signed integer. Bits outside
//! the field are preserved on write.

use crate::buffer::{ByteOrder, RegisterAddress, RegisterBuffer, Storage};
use crate::interface::RegisterBus;
use crate::{ConfigError, Error, FIELD_FRAME, MAX_REGISTER_WIDTH};

#[cfg(feature = "alloc")]
use crate::buffer::LazyStorage;

/// Widest supported field in bits
const MAX_FIELD_WIDTH: u8 = 32;

/// Sign-extend the low `bits` bits of `raw`
///
/// Widths of 0 or 64 and above leave `raw` as is.
pub(crate) const fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

/// Position, width and signedness of a bit field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    lowest_bit: u8,
    width: u8,
    signed: bool,
}

impl Field {
    /// Unsigned field of `width` bits starting at `lowest_bit`
    #[must_use]
    pub const fn unsigned(lowest_bit: u8, width: u8) -> Self {
        Self {
            lowest_bit,
            width,
            signed: false,
        }
    }

    /// Two's-complement field of `width` bits starting at `lowest_bit`
    #[must_use]
    pub const fn signed(lowest_bit: u8, width: u8) -> Self {
        Self {
            lowest_bit,
            width,
            signed: true,
        }
    }

    /// Field starting at bit `bit_offset` of payload byte `byte_offset`
    ///
    /// Byte 0 holds the least significant bits of the register.
    #[must_use]
    pub const fn at(byte_offset: u8, bit_offset: u8, width: u8, signed: bool) -> Self {
        Self {
            lowest_bit: byte_offset * 8 + bit_offset,
            width,
            signed,
        }
    }

    /// Lowest bit
    #[must_use]
    pub const fn lowest_bit(&self) -> u8 {
        self.lowest_bit
    }

    /// Width in bits
    #[must_use]
    pub const fn width(&self) -> u8 {
        self.width
    }

    /// Whether values are two's-complement
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    /// Mask of the field before shifting into position
    ///
    /// Saturates to all ones for widths of 64 and above.
    #[must_use]
    pub const fn mask(&self) -> u64 {
        match 1u64.checked_shl(self.width as u32) {
            Some(bit) => bit - 1,
            None => u64::MAX,
        }
    }

    /// Smallest representable value
    #[must_use]
    pub const fn min(&self) -> i64 {
        if self.signed && self.width > 0 {
            -self.max() - 1
        } else {
            0
        }
    }

    /// Largest representable value
    #[must_use]
    pub const fn max(&self) -> i64 {
        let mask = self.mask();
        if self.signed {
            (mask >> 1) as i64
        } else if mask > i64::MAX as u64 {
            i64::MAX
        } else {
            mask as i64
        }
    }

    /// Check the field against a register of `register_width` bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the width is zero or above 32, or the field does
    /// not fit in the register.
    pub const fn validate(&self, register_width: u8) -> Result<(), ConfigError> {
        if register_width == 0 || register_width > MAX_REGISTER_WIDTH {
            return Err(ConfigError::RegisterWidth(register_width));
        }
        if self.width == 0 || self.width > MAX_FIELD_WIDTH {
            return Err(ConfigError::InvalidWidth(self.width));
        }
        if self.lowest_bit as u32 + self.width as u32 > register_width as u32 * 8 {
            return Err(ConfigError::FieldOutOfRange {
                lowest_bit: self.lowest_bit,
                width: self.width,
                register_width,
            });
        }
        Ok(())
    }

    /// Extract the field from a register value
    #[must_use]
    pub const fn extract(&self, register: u64) -> i64 {
        let raw = match register.checked_shr(self.lowest_bit as u32) {
            Some(shifted) => shifted & self.mask(),
            None => 0,
        };
        if self.signed {
            sign_extend(raw, self.width as u32)
        } else {
            raw as i64
        }
    }

    /// Replace the field in a register value, leaving other bits untouched
    ///
    /// Returns `None` if `value` is outside [`min`](Self::min)..=[`max`](Self::max)
    /// or the field starts past bit 63.
    #[must_use]
    pub const fn inject(&self, register: u64, value: i64) -> Option<u64> {
        if value < self.min() || value > self.max() || self.lowest_bit >= 64 {
            return None;
        }
        let mask = self.mask();
        let cleared = register & !(mask << self.lowest_bit);
        Some(cleared | (((value as u64) & mask) << self.lowest_bit))
    }
}

/// Readable and writable multi-bit field
///
/// # Example
/// ```ignore
/// // PWR_MGMT_1 (0x06), bits 0..3 = CLKSEL
/// let mut clksel = RWBits::new(&mut device, RegisterAddress::new(0x06), Field::unsigned(0, 3))?;
/// clksel.write(1)?;
/// ```
pub struct RWBits<B, S = [u8; FIELD_FRAME]> {
    bus: B,
    buffer: RegisterBuffer<S>,
    field: Field,
    order: ByteOrder,
}

impl<B: RegisterBus> RWBits<B> {
    /// Field inside a one-byte register
    ///
    /// # Errors
    ///
    /// Returns an error if the field does not fit in one byte.
    pub fn new(bus: B, address: RegisterAddress, field: Field) -> Result<Self, ConfigError> {
        Self::with_width(bus, address, field, 1, ByteOrder::Little)
    }

    /// Field inside a `register_width`-byte register whose payload arrives in `order`
    ///
    /// # Errors
    ///
    /// Returns an error if the width is unsupported or the field does not fit.
    pub fn with_width(
        bus: B,
        address: RegisterAddress,
        field: Field,
        register_width: u8,
        order: ByteOrder,
    ) -> Result<Self, ConfigError> {
        Self::with_storage(bus, [0; FIELD_FRAME], address, field, register_width, order)
    }
}

#[cfg(feature = "alloc")]
impl<B: RegisterBus> RWBits<B, LazyStorage> {
    /// Like [`RWBits::with_width`], allocating the buffer on first access
    ///
    /// # Errors
    ///
    /// Returns an error if the width is unsupported or the field does not fit.
    pub fn new_lazy(
        bus: B,
        address: RegisterAddress,
        field: Field,
        register_width: u8,
        order: ByteOrder,
    ) -> Result<Self, ConfigError> {
        Self::with_storage(bus, LazyStorage::new(), address, field, register_width, order)
    }
}

impl<B: RegisterBus, S: Storage> RWBits<B, S> {
    /// Build on caller-provided storage
    ///
    /// # Errors
    ///
    /// Returns an error if the field does not fit or the storage is too small.
    pub fn with_storage(
        bus: B,
        storage: S,
        address: RegisterAddress,
        field: Field,
        register_width: u8,
        order: ByteOrder,
    ) -> Result<Self, ConfigError> {
        field.validate(register_width)?;
        Ok(Self {
            bus,
            buffer: RegisterBuffer::new(storage, address, usize::from(register_width))?,
            field,
            order,
        })
    }

    /// Read the field
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the transaction fails.
    pub fn read(&mut self) -> Result<i64, Error<B::Error>> {
        let mut bus = self.bus.lock()?;
        self.buffer.fetch(&mut bus)?;
        let register = self.order.load(self.buffer.payload_mut());
        Ok(self.field.extract(register))
    }

    /// Write the field, preserving every bit outside it
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] before touching the bus if `value` does
    /// not fit the field, or [`Error::Bus`] if a transaction fails.
    pub fn write(&mut self, value: i64) -> Result<(), Error<B::Error>> {
        let field = self.field;
        if value < field.min() || value > field.max() {
            return Err(Error::out_of_range(value, field.min(), field.max()));
        }

        let mut bus = self.bus.lock()?;
        self.buffer.fetch(&mut bus)?;
        let payload = self.buffer.payload_mut();
        let register = self.order.load(payload);
        if let Some(updated) = field.inject(register, value) {
            self.order.store(payload, updated);
        }
        self.buffer.store(&mut bus)?;
        Ok(())
    }

    /// Field description
    pub const fn field(&self) -> Field {
        self.field
    }

    /// Consume the register and return the bus
    pub fn release(self) -> B {
        self.bus
    }
}

/// Read-only multi-bit field
pub struct ROBits<B, S = [u8; FIELD_FRAME]>(RWBits<B, S>);

impl<B: RegisterBus> ROBits<B> {
    /// Field inside a one-byte register
    ///
    /// # Errors
    ///
    /// Returns an error if the field does not fit in one byte.
    pub fn new(bus: B, address: RegisterAddress, field: Field) -> Result<Self, ConfigError> {
        RWBits::new(bus, address, field).map(Self)
    }

    /// Field inside a wider register, see [`RWBits::with_width`]
    ///
    /// # Errors
    ///
    /// Returns an error if the width is unsupported or the field does not fit.
    pub fn with_width(
        bus: B,
        address: RegisterAddress,
        field: Field,
        register_width: u8,
        order: ByteOrder,
    ) -> Result<Self, ConfigError> {
        RWBits::with_width(bus, address, field, register_width, order).map(Self)
    }
}

impl<B: RegisterBus, S: Storage> ROBits<B, S> {
    /// Read the field
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
