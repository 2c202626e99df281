//! Bus transaction providers
//!
//! Codecs never drive the bus directly. They lock a [`RegisterBus`], which
//! hands out a guard implementing [`Transaction`], and perform their whole
//! read-modify-write sequence through that guard. The bus stays locked until
//! the guard is dropped, so no other access can slip between the read and the
//! write of a sibling field sharing the same byte.
//!
//! ## Providers
//! - [`I2cDevice`]: one device on an `embedded-hal` I2C bus, exclusively owned
//! - [`SpiDevice`]: one device behind an `embedded-hal` SPI chip select
//! - [`RefCellBus`]: cloneable handle sharing a provider between codecs
//! - [`MutexBus`] (feature `std`): the same for threads

use core::cell::{RefCell, RefMut};
use core::ops::DerefMut;

use embedded_hal::i2c::{I2c, Operation, SevenBitAddress};
use embedded_hal::spi;

/// Address bytes that a provider can hold back for the next operation
const MAX_HELD: usize = 4;

/// Read command bit in the first byte of an SPI frame
const SPI_READ: u8 = 0x80;

/// Byte-level operations performed while the bus is locked
pub trait Transaction {
    /// Transport error
    type Error;

    /// Write `bytes` to the device
    ///
    /// With `hold_bus` set no stop condition follows; the next operation
    /// continues the same bus transaction.
    fn write(&mut self, bytes: &[u8], hold_bus: bool) -> Result<(), Self::Error>;

    /// Read `bytes.len()` bytes from the device
    fn read_into(&mut self, bytes: &mut [u8]) -> Result<(), Self::Error>;

    /// Forget a `hold_bus` write that no operation followed
    ///
    /// Bus handles call this when they hand out a new guard.
    fn discard_held(&mut self) {}
}

/// A device that register codecs can lock for a sequence of transactions
pub trait RegisterBus {
    /// Transport error
    type Error;

    /// Scoped access to the device; dropping it releases the bus
    type Guard<'a>: Transaction<Error = Self::Error>
    where
        Self: 'a;

    /// Acquire exclusive access to the device
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the bus cannot be acquired.
    fn lock(&mut self) -> Result<Self::Guard<'_>, Self::Error>;
}

impl<T: Transaction + ?Sized> Transaction for &mut T {
    type Error = T::Error;

    fn write(&mut self, bytes: &[u8], hold_bus: bool) -> Result<(), Self::Error> {
        (**self).write(bytes, hold_bus)
    }

    fn read_into(&mut self, bytes: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_into(bytes)
    }

    fn discard_held(&mut self) {
        (**self).discard_held();
    }
}

impl<P: RegisterBus + ?Sized> RegisterBus for &mut P {
    type Error = P::Error;
    type Guard<'a>
        = P::Guard<'a>
    where
        Self: 'a;

    fn lock(&mut self) -> Result<Self::Guard<'_>, Self::Error> {
        (**self).lock()
    }
}

/// One device on an `embedded-hal` I2C bus
///
/// A write issued with `hold_bus` is held back and sent together with the
/// next operation: before a read it becomes a `write_read` with a repeated
/// start, before a write the bytes are merged into one write. A held write
/// that is followed by nothing before the guard drops is never sent.
pub struct I2cDevice<I2C> {
    i2c: I2C,
    address: SevenBitAddress,
    held: [u8; MAX_HELD],
    held_len: usize,
}

impl<I2C> I2cDevice<I2C> {
    /// Create a provider for the device at `address`
    ///
    /// # Arguments
    /// * `i2c` - The I2C peripheral
    /// * `address` - 7-bit device address
    pub const fn new(i2c: I2C, address: SevenBitAddress) -> Self {
        Self {
            i2c,
            address,
            held: [0; MAX_HELD],
            held_len: 0,
        }
    }

    /// Device address
    pub const fn address(&self) -> SevenBitAddress {
        self.address
    }

    /// Consume the provider and return the I2C peripheral
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> I2cDevice<I2C> {
    fn flush_held(&mut self) -> Result<(), I2C::Error> {
        if self.held_len == 0 {
            return Ok(());
        }
        let len = core::mem::take(&mut self.held_len);
        self.i2c.write(self.address, &self.held[..len])
    }
}

impl<I2C: I2c> Transaction for I2cDevice<I2C> {
    type Error = I2C::Error;

    fn write(&mut self, bytes: &[u8], hold_bus: bool) -> Result<(), Self::Error> {
        if hold_bus {
            if self.held_len + bytes.len() > MAX_HELD {
                self.flush_held()?;
            }
            if bytes.len() <= MAX_HELD {
                self.held[self.held_len..self.held_len + bytes.len()].copy_from_slice(bytes);
                self.held_len += bytes.len();
                return Ok(());
            }
        }

        let held = core::mem::take(&mut self.held_len);
        if held == 0 {
            self.i2c.write(self.address, bytes)
        } else {
            self.i2c.transaction(
                self.address,
                &mut [
                    Operation::Write(&self.held[..held]),
                    Operation::Write(bytes),
                ],
            )
        }
    }

    fn read_into(&mut self, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let held = core::mem::take(&mut self.held_len);
        if held == 0 {
            self.i2c.read(self.address, bytes)
        } else {
            self.i2c.write_read(self.address, &self.held[..held], bytes)
        }
    }

    fn discard_held(&mut self) {
        self.held_len = 0;
    }
}

impl<I2C: I2c> RegisterBus for I2cDevice<I2C> {
    type Error = I2C::Error;
    type Guard<'a>
        = &'a mut Self
    where
        Self: 'a;

    fn lock(&mut self) -> Result<Self::Guard<'_>, Self::Error> {
        // Exclusive by borrow
        self.discard_held();
        Ok(self)
    }
}

/// One device on an `embedded-hal` SPI bus
///
/// The first byte of every frame carries the direction in bit 7: set for a
/// read, clear for a write. With a two-byte register address that is the
/// first address byte. Chip select is managed by the [`spi::SpiDevice`]
/// implementation and stays asserted for one frame.
///
/// A write issued with `hold_bus` is held back and sent in the same frame as
/// the next operation, so an address and the data read after it share one
/// chip select.
///
/// # Example
/// ```ignore
/// let spi = embedded_hal_bus::spi::ExclusiveDevice::new(spi_bus, cs_pin, delay)?;
/// let mut device = SpiDevice::new(spi);
/// let mut who_am_i = ROBits::new(&mut device, RegisterAddress::new(0x00), Field::unsigned(0, 8))?;
/// ```
pub struct SpiDevice<SPI> {
    spi: SPI,
    held: [u8; MAX_HELD],
    held_len: usize,
}

impl<SPI> SpiDevice<SPI> {
    /// Create a provider for the device behind `spi`
    pub const fn new(spi: SPI) -> Self {
        Self {
            spi,
            held: [0; MAX_HELD],
            held_len: 0,
        }
    }

    /// Consume the provider and return the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: spi::SpiDevice> Transaction for SpiDevice<SPI> {
    type Error = SPI::Error;

    fn write(&mut self, bytes: &[u8], hold_bus: bool) -> Result<(), Self::Error> {
        if hold_bus && self.held_len + bytes.len() <= MAX_HELD {
            self.held[self.held_len..self.held_len + bytes.len()].copy_from_slice(bytes);
            self.held_len += bytes.len();
            return Ok(());
        }

        // Anything too long to hold goes out with the held bytes in one frame
        let held = core::mem::take(&mut self.held_len);
        if held > 0 {
            self.held[0] &= !SPI_READ;
            return self.spi.transaction(&mut [
                spi::Operation::Write(&self.held[..held]),
                spi::Operation::Write(bytes),
            ]);
        }
        match bytes.split_first() {
            Some((&command, rest)) => self.spi.transaction(&mut [
                spi::Operation::Write(&[command & !SPI_READ]),
                spi::Operation::Write(rest),
            ]),
            None => Ok(()),
        }
    }

    fn read_into(&mut self, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let held = core::mem::take(&mut self.held_len);
        if held == 0 {
            return self.spi.read(bytes);
        }
        self.held[0] |= SPI_READ;
        self.spi.transaction(&mut [
            spi::Operation::Write(&self.held[..held]),
            spi::Operation::Read(bytes),
        ])
    }

    fn discard_held(&mut self) {
        self.held_len = 0;
    }
}

impl<SPI: spi::SpiDevice> RegisterBus for SpiDevice<SPI> {
    type Error = SPI::Error;
    type Guard<'a>
        = &'a mut Self
    where
        Self: 'a;

    fn lock(&mut self) -> Result<Self::Guard<'_>, Self::Error> {
        self.discard_held();
        Ok(self)
    }
}

/// Errors from shared bus handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SharedBusError<E> {
    /// Another codec currently holds the bus
    Busy,
    /// A thread panicked while holding the bus
    Poisoned,
    /// Error from the underlying provider
    Bus(E),
}

/// Guard handed out by shared bus handles
///
/// Derefs to the shared provider and wraps its errors in [`SharedBusError`].
pub struct SharedGuard<G>(G);

impl<G> Transaction for SharedGuard<G>
where
    G: DerefMut,
    G::Target: Transaction,
{
    type Error = SharedBusError<<G::Target as Transaction>::Error>;

    fn write(&mut self, bytes: &[u8], hold_bus: bool) -> Result<(), Self::Error> {
        (*self.0).write(bytes, hold_bus).map_err(SharedBusError::Bus)
    }

    fn read_into(&mut self, bytes: &mut [u8]) -> Result<(), Self::Error> {
        (*self.0).read_into(bytes).map_err(SharedBusError::Bus)
    }

    fn discard_held(&mut self) {
        (*self.0).discard_held();
    }
}

/// Cloneable handle to a provider shared through a [`RefCell`]
///
/// Every codec bound to the same device gets its own copy of the handle.
/// Locking a bus that is already locked fails with [`SharedBusError::Busy`]
/// instead of interleaving with the holder's read-modify-write.
///
/// # Example
/// ```ignore
/// let device = RefCell::new(I2cDevice::new(i2c, 0x68));
/// let mut sleep = RWBit::new(RefCellBus::new(&device), RegisterAddress::new(0x06), 6)?;
/// let mut reset = RWBit::new(RefCellBus::new(&device), RegisterAddress::new(0x06), 7)?;
/// ```
pub struct RefCellBus<'a, T> {
    cell: &'a RefCell<T>,
}

impl<'a, T> RefCellBus<'a, T> {
    /// Create a handle to the shared provider
    pub const fn new(cell: &'a RefCell<T>) -> Self {
        Self { cell }
    }
}

impl<T> Clone for RefCellBus<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RefCellBus<'_, T> {}

impl<'a, T: Transaction> RegisterBus for RefCellBus<'a, T> {
    type Error = SharedBusError<T::Error>;
    type Guard<'g>
        = SharedGuard<RefMut<'a, T>>
    where
        Self: 'g;

    fn lock(&mut self) -> Result<Self::Guard<'_>, Self::Error> {
        let mut provider = self.cell.try_borrow_mut().map_err(|_| SharedBusError::Busy)?;
        provider.discard_held();
        Ok(SharedGuard(provider))
    }
}

#[cfg(feature = "std")]
pub use self::mutex::MutexBus;

#[cfg(feature = "std")]
mod mutex {
    use super::{RegisterBus, SharedBusError, SharedGuard, Transaction};
    use std::sync::{Arc, Mutex, MutexGuard};

    /// Cloneable handle to a provider shared between threads
    ///
    /// `lock` blocks until the current holder releases the bus.
    pub struct MutexBus<T> {
        inner: Arc<Mutex<T>>,
    }

    impl<T> MutexBus<T> {
        /// Take ownership of a provider and share it
        pub fn new(provider: T) -> Self {
            Self {
                inner: Arc::new(Mutex::new(provider)),
            }
        }
    }

    impl<T> Clone for MutexBus<T> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl<T: Transaction> RegisterBus for MutexBus<T> {
        type Error = SharedBusError<T::Error>;
        type Guard<'a>
            = SharedGuard<MutexGuard<'a, T>>
        where
            Self: 'a;

        fn lock(&mut self) -> Result<Self::Guard<'_>, Self::Error> {
            let mut provider = self.inner.lock().map_err(|_| SharedBusError::Poisoned)?;
            provider.discard_held();
            Ok(SharedGuard(provider))
        }
    }
}
