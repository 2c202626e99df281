//! BCD calendar registers
//!
//! Seven consecutive bytes starting at the seconds register:
//!
//! | byte | content                                   |
//! |------|-------------------------------------------|
//! | 0    | seconds (BCD, bit 7 oscillator flag)      |
//! | 1    | minutes (BCD)                             |
//! | 2    | hours (BCD with [`HourFormat`] flags)     |
//! | 3, 4 | weekday (raw) and day, order per layout   |
//! | 5    | month (BCD, optional century bit)         |
//! | 6    | year within the century (BCD)             |
//!
//! The whole block is read and written in a single transaction so that a
//! rollover between fields can never be observed half-applied.

use crate::bcd::{HourFormat, decode_bcd, encode_bcd};
use crate::buffer::{RegisterAddress, RegisterBuffer, Storage};
use crate::interface::RegisterBus;
use crate::{ConfigError, Error};

#[cfg(feature = "alloc")]
use crate::buffer::LazyStorage;

/// Bytes in a calendar block
pub const CALENDAR_LEN: usize = 7;

/// Inline frame for a calendar register
const CALENDAR_FRAME: usize = 2 + CALENDAR_LEN;

const SECOND_MASK: u8 = 0x7F;
const MINUTE_MASK: u8 = 0x7F;
const DAY_MASK: u8 = 0x3F;
const WEEKDAY_MASK: u8 = 0x07;
const MONTH_MASK: u8 = 0x1F;

/// Calendar date and time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    /// Full year, e.g. 2024
    pub year: u16,
    /// 1-12
    pub month: u8,
    /// 1-31
    pub day: u8,
    /// 0-6, Monday is 0
    pub weekday: u8,
    /// 0-23
    pub hour: u8,
    /// 0-59
    pub minute: u8,
    /// 0-59
    pub second: u8,
}

impl DateTime {
    /// Build a date and time, deriving the weekday from the Gregorian calendar
    #[must_use]
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            weekday: weekday_of(year, month, day),
            hour,
            minute,
            second,
        }
    }
}

/// Day of week for a Gregorian date, Monday is 0
fn weekday_of(year: u16, month: u8, day: u8) -> u8 {
    const OFFSETS: [u32; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
    let month = month.clamp(1, 12);
    let year = u32::from(if month < 3 { year.saturating_sub(1) } else { year });
    let sunday_based = (year + year / 4 - year / 100 + year / 400
        + OFFSETS[usize::from(month - 1)]
        + u32::from(day))
        % 7;
    ((sunday_based + 6) % 7) as u8
}

/// Device-specific arrangement of a calendar block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTimeLayout {
    /// Weekday byte precedes the day byte
    pub weekday_first: bool,
    /// Raw weekday value for Monday (0 or 1)
    pub weekday_start: u8,
    /// Year represented by a year byte of 0 with the century bit clear
    pub base_year: u16,
    /// Hour byte flags
    pub hour: HourFormat,
    /// Bit of the month byte marking the following century
    pub century_bit: Option<u8>,
}

impl Default for DateTimeLayout {
    fn default() -> Self {
        Self::DS1307
    }
}

impl DateTimeLayout {
    /// DS1307: weekday 1-7 before the day, no century flag
    pub const DS1307: Self = Self {
        weekday_first: true,
        weekday_start: 1,
        base_year: 2000,
        hour: HourFormat::DALLAS,
        century_bit: None,
    };

    /// DS3231: DS1307 layout with the century flag in bit 7 of the month
    pub const DS3231: Self = Self {
        century_bit: Some(7),
        ..Self::DS1307
    };

    /// PCF8523: day before a 0-6 weekday, 12-hour mode set elsewhere
    pub const PCF8523: Self = Self {
        weekday_first: false,
        weekday_start: 0,
        base_year: 2000,
        hour: HourFormat::NXP,
        century_bit: None,
    };

    /// Check that the flag bits do not overlap the BCD digits
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLayout`].
    pub const fn validate(&self) -> Result<(), ConfigError> {
        let century_ok = match self.century_bit {
            Some(bit) => bit >= 5 && bit < 8,
            None => true,
        };
        let year_ok = self.base_year <= u16::MAX - 199;
        if self.weekday_start > 1 || !self.hour.is_valid() || !century_ok || !year_ok {
            return Err(ConfigError::InvalidLayout);
        }
        Ok(())
    }

    /// Years representable by this layout
    #[must_use]
    pub const fn year_range(&self) -> (u16, u16) {
        let span = if self.century_bit.is_some() { 199 } else { 99 };
        (self.base_year, self.base_year.saturating_add(span))
    }

    const fn day_indices(&self) -> (usize, usize) {
        if self.weekday_first { (4, 3) } else { (3, 4) }
    }

    /// Decode a calendar block
    ///
    /// Only the BCD encoding is checked; a well-formed but impossible date
    /// such as February 31st is returned as read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBcd`] with the offending raw byte, or
    /// [`Error::Config`] for an invalid layout.
    pub fn decode<E>(&self, bytes: &[u8; CALENDAR_LEN]) -> Result<DateTime, Error<E>> {
        self.validate().map_err(Error::<E>::Config)?;
        let bcd = |index: usize, mask: u8| -> Result<u8, Error<E>> {
            decode_bcd(bytes[index] & mask).ok_or(Error::InvalidBcd(bytes[index]))
        };
        let (day_index, weekday_index) = self.day_indices();

        let hour = self
            .hour
            .decode(bytes[2] & (0x3F | self.hour.flag_mask()))
            .ok_or(Error::InvalidBcd(bytes[2]))?;

        let raw_weekday = bytes[weekday_index] & WEEKDAY_MASK;
        let weekday = (raw_weekday + 7 - self.weekday_start) % 7;

        let century = match self.century_bit {
            Some(bit) if bytes[5] & (1 << bit) != 0 => 100,
            _ => 0,
        };

        Ok(DateTime {
            year: self.base_year + century + u16::from(bcd(6, 0xFF)?),
            month: bcd(5, MONTH_MASK)?,
            day: bcd(day_index, DAY_MASK)?,
            weekday,
            hour,
            minute: bcd(1, MINUTE_MASK)?,
            second: bcd(0, SECOND_MASK)?,
        })
    }

    /// Encode a calendar block
    ///
    /// All fields are range-checked before `bytes` is modified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] for the first field outside its range,
    /// or [`Error::Config`] for an invalid layout.
    pub fn encode<E>(&self, value: &DateTime, bytes: &mut [u8; CALENDAR_LEN]) -> Result<(), Error<E>> {
        self.validate().map_err(Error::<E>::Config)?;
        let (min_year, max_year) = self.year_range();
        check(i64::from(value.year), i64::from(min_year), i64::from(max_year))?;
        check(i64::from(value.month), 1, 12)?;
        check(i64::from(value.day), 1, 31)?;
        check(i64::from(value.weekday), 0, 6)?;
        check(i64::from(value.hour), 0, 23)?;
        check(i64::from(value.minute), 0, 59)?;
        check(i64::from(value.second), 0, 59)?;

        let offset = value.year - self.base_year;
        let (year, century) = if offset >= 100 {
            (offset - 100, true)
        } else {
            (offset, false)
        };

        let mut out = [0u8; CALENDAR_LEN];
        let (day_index, weekday_index) = self.day_indices();
        out[0] = bcd_field(value.second)?;
        out[1] = bcd_field(value.minute)?;
        out[2] = self
            .hour
            .encode(value.hour)
            .ok_or(Error::out_of_range(i64::from(value.hour), 0, 23))?;
        out[day_index] = bcd_field(value.day)?;
        out[weekday_index] = value.weekday + self.weekday_start;
        out[5] = bcd_field(value.month)?;
        if let (true, Some(bit)) = (century, self.century_bit) {
            out[5] |= 1 << bit;
        }
        out[6] = bcd_field(year as u8)?;

        *bytes = out;
        Ok(())
    }
}

pub(crate) fn check<E>(value: i64, min: i64, max: i64) -> Result<(), Error<E>> {
    if value < min || value > max {
        return Err(Error::out_of_range(value, min, max));
    }
    Ok(())
}

pub(crate) fn bcd_field<E>(value: u8) -> Result<u8, Error<E>> {
    encode_bcd(value).ok_or(Error::out_of_range(i64::from(value), 0, 99))
}

/// Real-time clock calendar register
///
/// # Example
/// ```ignore
/// let mut clock = BcdDateTime::new(&mut rtc, RegisterAddress::new(0x00), DateTimeLayout::DS3231)?;
/// clock.write(&DateTime::new(2024, 2, 29, 13, 45, 0))?;
/// let now = clock.read()?;
/// ```
pub struct BcdDateTime<B, S = [u8; CALENDAR_FRAME]> {
    bus: B,
    buffer: RegisterBuffer<S>,
    layout: DateTimeLayout,
}

impl<B: RegisterBus> BcdDateTime<B> {
    /// Calendar block starting at `address`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLayout`] if the layout flags overlap.
    pub fn new(bus: B, address: RegisterAddress, layout: DateTimeLayout) -> Result<Self, ConfigError> {
        Self::with_storage(bus, [0; CALENDAR_FRAME], address, layout)
    }
}

#[cfg(feature = "alloc")]
impl<B: RegisterBus> BcdDateTime<B, LazyStorage> {
    /// Like [`BcdDateTime::new`], allocating the buffer on first access
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLayout`] if the layout flags overlap.
    pub fn new_lazy(
        bus: B,
        address: RegisterAddress,
        layout: DateTimeLayout,
    ) -> Result<Self, ConfigError> {
        Self::with_storage(bus, LazyStorage::new(), address, layout)
    }
}

impl<B: RegisterBus, S: Storage> BcdDateTime<B, S> {
    /// Build on caller-provided storage
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLayout`] or [`ConfigError::BufferTooSmall`].
    pub fn with_storage(
        bus: B,
        storage: S,
        address: RegisterAddress,
        layout: DateTimeLayout,
    ) -> Result<Self, ConfigError> {
        layout.validate()?;
        Ok(Self {
            bus,
            buffer: RegisterBuffer::new(storage, address, CALENDAR_LEN)?,
            layout,
        })
    }

    /// Read date and time in one transaction
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] or [`Error::InvalidBcd`].
    pub fn read(&mut self) -> Result<DateTime, Error<B::Error>> {
        let mut bus = self.bus.lock()?;
        self.buffer.fetch(&mut bus)?;
        drop(bus);

        let mut bytes = [0; CALENDAR_LEN];
        bytes.copy_from_slice(self.buffer.payload_mut());
        self.layout.decode(&bytes)
    }

    /// Write date and time in one transaction
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] before touching the bus, or [`Error::Bus`].
    pub fn write(&mut self, value: &DateTime) -> Result<(), Error<B::Error>> {
        let mut bytes = [0; CALENDAR_LEN];
        self.layout.encode::<B::Error>(value, &mut bytes)?;
        self.buffer.payload_mut().copy_from_slice(&bytes);

        let mut bus = self.bus.lock()?;
        self.buffer.store(&mut bus)?;
        Ok(())
    }

    /// Calendar layout
    pub const fn layout(&self) -> &DateTimeLayout {
        &self.layout
    }

    /// Consume the register and return the bus
    pub fn release(self) -> B {
        self.bus
    }
}
