//! Register addresses and the per-codec transfer buffer
//!
//! Every codec owns exactly one [`RegisterBuffer`]: the register address in
//! device byte order followed by the payload bytes. The buffer is reused for
//! every access, so steady-state register traffic never allocates.
//!
//! ## Storage
//! - `[u8; N]`: inline storage, the address is written at construction
//! - [`LazyStorage`] (feature `alloc`): allocated on first access

use crate::ConfigError;
use crate::interface::Transaction;

#[cfg(feature = "alloc")]
use alloc::{boxed::Box, vec};

/// Byte order of multi-byte addresses and payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteOrder {
    /// Least significant byte first
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

impl ByteOrder {
    /// Assemble up to eight bytes into an integer
    #[must_use]
    pub fn load(self, bytes: &[u8]) -> u64 {
        match self {
            Self::Little => bytes
                .iter()
                .rev()
                .fold(0, |acc, &b| (acc << 8) | u64::from(b)),
            Self::Big => bytes.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b)),
        }
    }

    /// Spread the low `bytes.len()` bytes of `value` over `bytes`
    pub fn store(self, bytes: &mut [u8], mut value: u64) {
        match self {
            Self::Little => {
                for byte in bytes.iter_mut() {
                    *byte = value as u8;
                    value >>= 8;
                }
            }
            Self::Big => {
                for byte in bytes.iter_mut().rev() {
                    *byte = value as u8;
                    value >>= 8;
                }
            }
        }
    }
}

/// Number of bytes used to transmit a register address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressWidth {
    /// 8-bit register map (most sensors and RTCs)
    #[default]
    One = 1,
    /// 16-bit register map (cameras, large EEPROM-style maps)
    Two = 2,
}

impl AddressWidth {
    /// Width in bytes
    #[must_use]
    pub const fn len(self) -> usize {
        self as usize
    }
}

/// Location of a register in the device's register map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterAddress {
    value: u16,
    width: AddressWidth,
    order: ByteOrder,
}

impl RegisterAddress {
    /// An 8-bit register address
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self {
            value: value as u16,
            width: AddressWidth::One,
            order: ByteOrder::Little,
        }
    }

    /// A 16-bit register address transmitted in `order`
    #[must_use]
    pub const fn wide(value: u16, order: ByteOrder) -> Self {
        Self {
            value,
            width: AddressWidth::Two,
            order,
        }
    }

    /// An address of explicit width
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AddressOutOfRange`] if `value` needs more bytes than `width`.
    pub const fn with_width(
        value: u16,
        width: AddressWidth,
        order: ByteOrder,
    ) -> Result<Self, ConfigError> {
        if matches!(width, AddressWidth::One) && value > 0xFF {
            return Err(ConfigError::AddressOutOfRange(value as u32));
        }
        Ok(Self {
            value,
            width,
            order,
        })
    }

    /// Numeric address
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.value
    }

    /// Address width
    #[must_use]
    pub const fn width(&self) -> AddressWidth {
        self.width
    }

    /// Address byte order
    #[must_use]
    pub const fn order(&self) -> ByteOrder {
        self.order
    }

    /// The address `by` registers further on, with the same width and order
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AddressOutOfRange`] if the result leaves the address space.
    pub fn offset(self, by: usize) -> Result<Self, ConfigError> {
        let target = usize::from(self.value).saturating_add(by);
        let value = u16::try_from(target)
            .map_err(|_| ConfigError::AddressOutOfRange(u32::try_from(target).unwrap_or(u32::MAX)))?;
        Self::with_width(value, self.width, self.order)
    }

    fn write_to(self, out: &mut [u8]) {
        self.order.store(out, u64::from(self.value));
    }
}

/// Backing memory for a [`RegisterBuffer`]
pub trait Storage {
    /// Whether memory is only claimed on first access
    const LAZY: bool;

    /// Largest frame this storage can hold
    fn capacity(&self) -> usize;

    /// The first `len` bytes, allocating them if this is the first access
    ///
    /// `len` must not exceed [`capacity`](Self::capacity).
    fn bytes(&mut self, len: usize) -> &mut [u8];
}

impl<const N: usize> Storage for [u8; N] {
    const LAZY: bool = false;

    fn capacity(&self) -> usize {
        N
    }

    fn bytes(&mut self, len: usize) -> &mut [u8] {
        &mut self[..len]
    }
}

/// Heap storage allocated on the first register access
///
/// Trades a guaranteed-available buffer for zero footprint until the register
/// is actually used. Allocation happens inside the first `read`/`write`, so an
/// out-of-memory condition surfaces there rather than at construction.
#[cfg(feature = "alloc")]
#[derive(Debug, Default)]
pub struct LazyStorage {
    bytes: Option<Box<[u8]>>,
}

#[cfg(feature = "alloc")]
impl LazyStorage {
    /// Empty, unallocated storage
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: None }
    }
}

#[cfg(feature = "alloc")]
impl Storage for LazyStorage {
    const LAZY: bool = true;

    fn capacity(&self) -> usize {
        usize::MAX
    }

    /// Grows the allocation when `len` exceeds it, keeping the bytes held so far
    fn bytes(&mut self, len: usize) -> &mut [u8] {
        let allocated = self.bytes.as_deref().map_or(0, <[u8]>::len);
        if allocated < len {
            let mut grown = vec![0u8; len];
            if let Some(old) = self.bytes.as_deref() {
                grown[..old.len()].copy_from_slice(old);
            }
            self.bytes = Some(grown.into_boxed_slice());
        }
        match self.bytes.as_deref_mut() {
            Some(bytes) => &mut bytes[..len],
            None => &mut [],
        }
    }
}

/// Address bytes followed by payload bytes, owned by a single codec
///
/// The address bytes are written once (at construction, or on first access
/// for lazy storage) and never change afterwards. Payload bytes are only
/// meaningful directly after a [`fetch`](Self::fetch) or before a
/// [`store`](Self::store).
#[derive(Debug)]
pub struct RegisterBuffer<S> {
    storage: S,
    address: RegisterAddress,
    payload_len: usize,
    primed: bool,
}

impl<S: Storage> RegisterBuffer<S> {
    /// Create a buffer for `payload_len` data bytes at `address`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BufferTooSmall`] if the storage cannot hold the frame.
    pub fn new(storage: S, address: RegisterAddress, payload_len: usize) -> Result<Self, ConfigError> {
        let needed = address.width().len() + payload_len;
        let capacity = storage.capacity();
        if needed > capacity {
            return Err(ConfigError::BufferTooSmall { needed, capacity });
        }

        let mut buffer = Self {
            storage,
            address,
            payload_len,
            primed: false,
        };
        if !S::LAZY {
            buffer.frame();
        }
        Ok(buffer)
    }

    /// Register address
    #[must_use]
    pub const fn address(&self) -> RegisterAddress {
        self.address
    }

    /// Number of payload bytes
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Whether backing memory has been claimed yet
    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.primed
    }

    /// The whole frame: address bytes then payload
    pub fn frame(&mut self) -> &mut [u8] {
        let split = self.address.width().len();
        let bytes = self.storage.bytes(split + self.payload_len);
        if !self.primed {
            self.address.write_to(&mut bytes[..split]);
            self.primed = true;
        }
        bytes
    }

    /// Payload bytes only
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let split = self.address.width().len();
        &mut self.frame()[split..]
    }

    /// Read the register into the payload
    ///
    /// Sends the address without a stop condition, then reads the payload.
    ///
    /// # Errors
    ///
    /// Propagates the transport error unchanged.
    pub fn fetch<T: Transaction>(&mut self, bus: &mut T) -> Result<(), T::Error> {
        #[cfg(feature = "defmt")]
        defmt::trace!("read {=usize} bytes at {=u16:#x}", self.payload_len, self.address.value());

        let split = self.address.width().len();
        let frame = self.frame();
        let (address, payload) = frame.split_at_mut(split);
        bus.write(address, true)?;
        bus.read_into(payload)
    }

    /// Write address and payload in one transaction
    ///
    /// # Errors
    ///
    /// Propagates the transport error unchanged.
    pub fn store<T: Transaction>(&mut self, bus: &mut T) -> Result<(), T::Error> {
        #[cfg(feature = "defmt")]
        defmt::trace!("write {=usize} bytes at {=u16:#x}", self.payload_len, self.address.value());

        let frame = self.frame();
        bus.write(frame, false)
    }
}
