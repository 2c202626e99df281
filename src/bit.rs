//! Single-bit registers
//!
//! A bit lives in one byte of a 1 to 4 byte register. Writing reads the
//! register, flips only the masked bit and writes the register back, all
//! under one bus lock.

use crate::buffer::{ByteOrder, RegisterAddress, RegisterBuffer, Storage};
use crate::interface::RegisterBus;
use crate::{ConfigError, Error, FIELD_FRAME, MAX_REGISTER_WIDTH};

#[cfg(feature = "alloc")]
use crate::buffer::LazyStorage;

/// Set or clear `mask` in `byte`
pub(crate) const fn apply_bit(byte: u8, mask: u8, value: bool) -> u8 {
    if value { byte | mask } else { byte & !mask }
}

/// Readable and writable single bit
///
/// # Example
/// ```ignore
/// // PWR_MGMT_1 (0x06), bit 6 = SLEEP
/// let mut sleep = RWBit::new(&mut device, RegisterAddress::new(0x06), 6)?;
/// sleep.write(false)?;
/// ```
pub struct RWBit<B, S = [u8; FIELD_FRAME]> {
    bus: B,
    buffer: RegisterBuffer<S>,
    byte: usize,
    mask: u8,
}

impl<B: RegisterBus> RWBit<B> {
    /// Bit `bit` (0-7) of a one-byte register
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BitOutOfRange`] if `bit` is 8 or more.
    pub fn new(bus: B, address: RegisterAddress, bit: u8) -> Result<Self, ConfigError> {
        Self::with_width(bus, address, bit, 1, ByteOrder::Little)
    }

    /// Bit `bit` of a `register_width`-byte register whose payload arrives in `order`
    ///
    /// Bit 0 is the least significant bit of the whole register.
    ///
    /// # Errors
    ///
    /// Returns an error if the width is unsupported or `bit` lies outside the register.
    pub fn with_width(
        bus: B,
        address: RegisterAddress,
        bit: u8,
        register_width: u8,
        order: ByteOrder,
    ) -> Result<Self, ConfigError> {
        Self::with_storage(bus, [0; FIELD_FRAME], address, bit, register_width, order)
    }
}

#[cfg(feature = "alloc")]
impl<B: RegisterBus> RWBit<B, LazyStorage> {
    /// Like [`RWBit::new`], allocating the buffer on first access
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BitOutOfRange`] if `bit` is 8 or more.
    pub fn new_lazy(bus: B, address: RegisterAddress, bit: u8) -> Result<Self, ConfigError> {
        Self::with_storage(bus, LazyStorage::new(), address, bit, 1, ByteOrder::Little)
    }
}

impl<B: RegisterBus, S: Storage> RWBit<B, S> {
    /// Build on caller-provided storage
    ///
    /// # Errors
    ///
    /// Returns an error if the width is unsupported, `bit` lies outside the
    /// register or the storage is too small.
    pub fn with_storage(
        bus: B,
        storage: S,
        address: RegisterAddress,
        bit: u8,
        register_width: u8,
        order: ByteOrder,
    ) -> Result<Self, ConfigError> {
        if register_width == 0 || register_width > MAX_REGISTER_WIDTH {
            return Err(ConfigError::RegisterWidth(register_width));
        }
        if u32::from(bit) >= u32::from(register_width) * 8 {
            return Err(ConfigError::BitOutOfRange {
                bit,
                register_width,
            });
        }

        let index = usize::from(bit / 8);
        let byte = match order {
            ByteOrder::Little => index,
            ByteOrder::Big => usize::from(register_width) - 1 - index,
        };

        Ok(Self {
            bus,
            buffer: RegisterBuffer::new(storage, address, usize::from(register_width))?,
            byte,
            mask: 1 << (bit % 8),
        })
    }

    /// Read the bit
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the transaction fails.
    pub fn read(&mut self) -> Result<bool, Error<B::Error>> {
        let mut bus = self.bus.lock()?;
        self.buffer.fetch(&mut bus)?;
        Ok(self.buffer.payload_mut()[self.byte] & self.mask != 0)
    }

    /// Set or clear the bit, leaving every other bit of the register untouched
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if either transaction fails. Nothing is written
    /// if the read fails.
    pub fn write(&mut self, value: bool) -> Result<(), Error<B::Error>> {
        let mut bus = self.bus.lock()?;
        self.buffer.fetch(&mut bus)?;
        let payload = self.buffer.payload_mut();
        payload[self.byte] = apply_bit(payload[self.byte], self.mask, value);
        self.buffer.store(&mut bus)?;
        Ok(())
    }

    /// Register address
    pub const fn address(&self) -> RegisterAddress {
        self.buffer.address()
    }

    /// Consume the register and return the bus
    pub fn release(self) -> B {
        self.bus
    }
}

/// Read-only single bit
pub struct ROBit<B, S = [u8; FIELD_FRAME]>(RWBit<B, S>);

impl<B: RegisterBus> ROBit<B> {
    /// Bit `bit` (0-7) of a one-byte register
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BitOutOfRange`] if `bit` is 8 or more.
    pub fn new(bus: B, address: RegisterAddress, bit: u8) -> Result<Self, ConfigError> {
        RWBit::new(bus, address, bit).map(Self)
    }

    /// Bit `bit` of a wider register, see [`RWBit::with_width`]
    ///
    /// # Errors
    ///
    /// Returns an error if the width is unsupported or `bit` lies outside the register.
    pub fn with_width(
        bus: B,
        address: RegisterAddress,
        bit: u8,
        register_width: u8,
        order: ByteOrder,
    ) -> Result<Self, ConfigError> {
        RWBit::with_width(bus, address, bit, register_width, order).map(Self)
    }
}

impl<B: RegisterBus, S: Storage> ROBit<B, S> {
    /// Read the bit
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the transaction fails.
    pub fn read(&mut self) -> Result<bool, Error<B::Error>> {
        self.0.read()
    }

    /// Consume the register and return the bus
    pub fn release(self) -> B {
        self.0.release()
    }
}
