//! BCD alarm registers
//!
//! An alarm block repeats the BCD time fields of the calendar, each with a
//! disable flag ("don't care") in a high bit. The day field compares against
//! either the day of month or the weekday. Depending on the device the choice
//! is a mode bit in a shared byte ([`DayLayout::Shared`]) or the alarm has one
//! byte for each ([`DayLayout::Separate`]).

use crate::bcd::{HourFormat, decode_bcd};
use crate::buffer::{RegisterAddress, RegisterBuffer, Storage};
use crate::datetime::{bcd_field, check};
use crate::interface::RegisterBus;
use crate::{ConfigError, Error};

#[cfg(feature = "alloc")]
use crate::buffer::LazyStorage;

/// Largest alarm block: seconds, minutes, hours, day, weekday
const MAX_ALARM_LEN: usize = 5;

/// Inline frame for an alarm register
const ALARM_FRAME: usize = 2 + MAX_ALARM_LEN;

/// One alarm field and whether it takes part in the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmField {
    /// Field value, kept even while disabled
    pub value: u8,
    /// Field is compared by the device
    pub enabled: bool,
}

impl AlarmField {
    /// Enabled field
    #[must_use]
    pub const fn at(value: u8) -> Self {
        Self {
            value,
            enabled: true,
        }
    }

    /// Disabled field
    #[must_use]
    pub const fn any() -> Self {
        Self {
            value: 0,
            enabled: false,
        }
    }

    /// Decode a plain BCD field whose disable flag is `disable_bit`
    ///
    /// Returns `None` for malformed BCD or a `disable_bit` above 7.
    ///
    /// ```
    /// use i2c_register::AlarmField;
    /// assert_eq!(AlarmField::decode(0x85, 7), Some(AlarmField { value: 5, enabled: false }));
    /// ```
    #[must_use]
    pub const fn decode(byte: u8, disable_bit: u8) -> Option<Self> {
        let Some(flag) = 1u8.checked_shl(disable_bit as u32) else {
            return None;
        };
        match decode_bcd(byte & !flag & 0x7F) {
            Some(value) => Some(Self {
                value,
                enabled: byte & flag == 0,
            }),
            None => None,
        }
    }

    /// Encode as a plain BCD field
    ///
    /// Returns `None` above 79 or for a `disable_bit` above 7.
    #[must_use]
    pub const fn encode(self, disable_bit: u8) -> Option<u8> {
        let Some(flag) = 1u8.checked_shl(disable_bit as u32) else {
            return None;
        };
        if self.value > 79 {
            return None;
        }
        match crate::bcd::encode_bcd(self.value) {
            Some(byte) if self.enabled => Some(byte),
            Some(byte) => Some(byte | flag),
            None => None,
        }
    }
}

/// What the day field of an alarm is compared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DayMatch {
    /// Day of month, 1-31
    #[default]
    DayOfMonth,
    /// Weekday, 0-6 with Monday as 0
    Weekday,
}

/// How an alarm block stores its day field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DayLayout {
    /// One byte; `mode_bit` set means the byte holds a weekday
    Shared {
        /// Day/weekday selector bit
        mode_bit: u8,
    },
    /// A day byte and a weekday byte, each with its own disable flag
    Separate {
        /// Weekday byte precedes the day byte
        weekday_first: bool,
    },
}

/// How often an alarm fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmFrequency {
    /// Every second
    Secondly,
    /// When the seconds match
    Minutely,
    /// When minutes and seconds match
    Hourly,
    /// When the time of day matches
    Daily,
    /// When weekday and time match
    Weekly,
    /// When day of month and time match
    Monthly,
}

/// Alarm time with per-field match flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alarm {
    /// 0-59
    pub second: AlarmField,
    /// 0-59
    pub minute: AlarmField,
    /// 0-23
    pub hour: AlarmField,
    /// Day of month or weekday, see `day_match`
    pub day: AlarmField,
    /// Meaning of `day`
    pub day_match: DayMatch,
}

impl Alarm {
    /// Alarm firing at `frequency`, comparing only the fields it needs
    ///
    /// Fields that do not take part keep their value but are disabled.
    /// `day_match` is overridden for [`AlarmFrequency::Weekly`] and
    /// [`AlarmFrequency::Monthly`].
    #[must_use]
    pub const fn repeating(
        frequency: AlarmFrequency,
        day_match: DayMatch,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Self {
        let active = match frequency {
            AlarmFrequency::Secondly => 0,
            AlarmFrequency::Minutely => 1,
            AlarmFrequency::Hourly => 2,
            AlarmFrequency::Daily => 3,
            AlarmFrequency::Weekly | AlarmFrequency::Monthly => 4,
        };
        let day_match = match frequency {
            AlarmFrequency::Weekly => DayMatch::Weekday,
            AlarmFrequency::Monthly => DayMatch::DayOfMonth,
            _ => day_match,
        };
        Self {
            second: AlarmField {
                value: second,
                enabled: active >= 1,
            },
            minute: AlarmField {
                value: minute,
                enabled: active >= 2,
            },
            hour: AlarmField {
                value: hour,
                enabled: active >= 3,
            },
            day: AlarmField {
                value: day,
                enabled: active >= 4,
            },
            day_match,
        }
    }

    /// Repetition implied by the enabled fields
    ///
    /// Returns `None` when the enabled fields are not a run starting at the
    /// seconds, e.g. a minute match with the seconds ignored.
    #[must_use]
    pub const fn frequency(&self) -> Option<AlarmFrequency> {
        let flags = [
            self.second.enabled,
            self.minute.enabled,
            self.hour.enabled,
            self.day.enabled,
        ];
        match flags {
            [false, false, false, false] => Some(AlarmFrequency::Secondly),
            [true, false, false, false] => Some(AlarmFrequency::Minutely),
            [true, true, false, false] => Some(AlarmFrequency::Hourly),
            [true, true, true, false] => Some(AlarmFrequency::Daily),
            [true, true, true, true] => match self.day_match {
                DayMatch::Weekday => Some(AlarmFrequency::Weekly),
                DayMatch::DayOfMonth => Some(AlarmFrequency::Monthly),
            },
            _ => None,
        }
    }
}

/// Device-specific arrangement of an alarm block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmLayout {
    /// Block starts with a seconds byte
    ///
    /// Without one the device matches at second 0 and the seconds field of
    /// an [`Alarm`] is ignored.
    pub has_seconds: bool,
    /// Day field arrangement
    pub day: DayLayout,
    /// Raw weekday value for Monday (0 or 1)
    pub weekday_start: u8,
    /// Bit set in a field byte when the field is ignored
    pub disable_bit: u8,
    /// Hour byte flags
    pub hour: HourFormat,
}

impl Default for AlarmLayout {
    fn default() -> Self {
        Self::DS3231_ALARM1
    }
}

impl AlarmLayout {
    /// DS3231 alarm 1 at 0x07: seconds, minutes, hours, day with DY/DT in bit 6
    pub const DS3231_ALARM1: Self = Self {
        has_seconds: true,
        day: DayLayout::Shared { mode_bit: 6 },
        weekday_start: 1,
        disable_bit: 7,
        hour: HourFormat::DALLAS,
    };

    /// DS3231 alarm 2 at 0x0B: alarm 1 without the seconds byte
    pub const DS3231_ALARM2: Self = Self {
        has_seconds: false,
        ..Self::DS3231_ALARM1
    };

    /// PCF8523 alarm at 0x0A: minutes, hours, day, weekday
    pub const PCF8523_ALARM: Self = Self {
        has_seconds: false,
        day: DayLayout::Separate {
            weekday_first: false,
        },
        weekday_start: 0,
        disable_bit: 7,
        hour: HourFormat::NXP,
    };

    /// Bytes in the block
    #[must_use]
    pub const fn len(&self) -> usize {
        let seconds = if self.has_seconds { 1 } else { 0 };
        let days = match self.day {
            DayLayout::Shared { .. } => 1,
            DayLayout::Separate { .. } => 2,
        };
        seconds + 2 + days
    }

    /// Always false, every layout holds at least minutes, hours and a day
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Check that no flag bit overlaps another or the BCD digits
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLayout`].
    pub const fn validate(&self) -> Result<(), ConfigError> {
        let disable = 1u8.checked_shl(self.disable_bit as u32);
        let disable = match disable {
            Some(mask) if self.disable_bit >= 6 => mask,
            _ => return Err(ConfigError::InvalidLayout),
        };
        let day_ok = match self.day {
            DayLayout::Shared { mode_bit } => mode_bit >= 6 && mode_bit < 8 && mode_bit != self.disable_bit,
            DayLayout::Separate { .. } => true,
        };
        let hour_ok = self.hour.is_valid() && self.hour.flag_mask() & disable == 0;
        if !day_ok || !hour_ok || self.weekday_start > 1 {
            return Err(ConfigError::InvalidLayout);
        }
        Ok(())
    }

    /// Repetition of `alarm` as this device would apply it
    ///
    /// Layouts without a seconds byte always match at second 0, so the
    /// seconds field counts as enabled.
    #[must_use]
    pub const fn frequency(&self, alarm: &Alarm) -> Option<AlarmFrequency> {
        let mut effective = *alarm;
        if !self.has_seconds {
            effective.second.enabled = true;
        }
        effective.frequency()
    }

    fn check_block<E>(&self, available: usize) -> Result<(), Error<E>> {
        self.validate().map_err(Error::<E>::Config)?;
        if available < self.len() {
            return Err(Error::Config(ConfigError::BufferTooSmall {
                needed: self.len(),
                capacity: available,
            }));
        }
        Ok(())
    }

    const fn disable_mask(&self) -> u8 {
        1 << self.disable_bit
    }

    /// Byte indices of minutes, hours, and the day and weekday bytes
    const fn indices(&self) -> (usize, usize, usize, usize) {
        let base = if self.has_seconds { 1 } else { 0 };
        let (day, weekday) = match self.day {
            DayLayout::Shared { .. } => (base + 2, base + 2),
            DayLayout::Separate {
                weekday_first: true,
            } => (base + 3, base + 2),
            DayLayout::Separate {
                weekday_first: false,
            } => (base + 2, base + 3),
        };
        (base, base + 1, day, weekday)
    }

    fn weekday_field(&self, byte: u8) -> AlarmField {
        let raw = byte & 0x07;
        AlarmField {
            value: (raw + 7 - self.weekday_start) % 7,
            enabled: byte & self.disable_mask() == 0,
        }
    }

    fn day_field<E>(&self, byte: u8) -> Result<AlarmField, Error<E>> {
        decode_bcd(byte & 0x3F)
            .map(|value| AlarmField {
                value,
                enabled: byte & self.disable_mask() == 0,
            })
            .ok_or(Error::InvalidBcd(byte))
    }

    /// Decode an alarm block from the first [`len`](Self::len) bytes of `bytes`
    ///
    /// For separate day bytes the weekday is reported only when the weekday
    /// byte is enabled and the day byte is not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBcd`] with the offending raw byte, or
    /// [`Error::Config`] for an invalid layout or a short slice.
    pub fn decode<E>(&self, bytes: &[u8]) -> Result<Alarm, Error<E>> {
        self.check_block::<E>(bytes.len())?;
        let disable = self.disable_mask();
        let field = |byte: u8| -> Result<AlarmField, Error<E>> {
            AlarmField::decode(byte, self.disable_bit).ok_or(Error::InvalidBcd(byte))
        };
        let (minute_index, hour_index, day_index, weekday_index) = self.indices();

        let second = if self.has_seconds {
            field(bytes[0])?
        } else {
            AlarmField::at(0)
        };

        let hour_byte = bytes[hour_index];
        let hour = AlarmField {
            value: self
                .hour
                .decode(hour_byte & !disable & (0x3F | self.hour.flag_mask()))
                .ok_or(Error::InvalidBcd(hour_byte))?,
            enabled: hour_byte & disable == 0,
        };

        let (day, day_match) = match self.day {
            DayLayout::Shared { mode_bit } => {
                let byte = bytes[day_index];
                if byte & (1 << mode_bit) != 0 {
                    (self.weekday_field(byte), DayMatch::Weekday)
                } else {
                    (self.day_field(byte)?, DayMatch::DayOfMonth)
                }
            }
            DayLayout::Separate { .. } => {
                let day = self.day_field(bytes[day_index])?;
                let weekday = self.weekday_field(bytes[weekday_index]);
                if weekday.enabled && !day.enabled {
                    (weekday, DayMatch::Weekday)
                } else {
                    (day, DayMatch::DayOfMonth)
                }
            }
        };

        Ok(Alarm {
            second,
            minute: field(bytes[minute_index])?,
            hour,
            day,
            day_match,
        })
    }

    /// Encode an alarm block into the first [`len`](Self::len) bytes of `bytes`
    ///
    /// Enabled fields must hold a valid time; disabled fields only need to be
    /// representable. Nothing is written on error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] for the first field outside its range,
    /// or [`Error::Config`] for an invalid layout or a short slice.
    pub fn encode<E>(&self, alarm: &Alarm, bytes: &mut [u8]) -> Result<(), Error<E>> {
        self.check_block::<E>(bytes.len())?;
        let disable = self.disable_mask();
        let flag = |field: &AlarmField| if field.enabled { 0 } else { disable };

        if self.has_seconds {
            check(i64::from(alarm.second.value), 0, 59)?;
        }
        check(i64::from(alarm.minute.value), 0, 59)?;
        check(i64::from(alarm.hour.value), 0, 23)?;
        match alarm.day_match {
            DayMatch::DayOfMonth => {
                let min = if alarm.day.enabled { 1 } else { 0 };
                check(i64::from(alarm.day.value), min, 31)?;
            }
            DayMatch::Weekday => check(i64::from(alarm.day.value), 0, 6)?,
        }

        let mut out = [0u8; MAX_ALARM_LEN];
        let (minute_index, hour_index, day_index, weekday_index) = self.indices();
        if self.has_seconds {
            out[0] = bcd_field(alarm.second.value)? | flag(&alarm.second);
        }
        out[minute_index] = bcd_field(alarm.minute.value)? | flag(&alarm.minute);
        out[hour_index] = self
            .hour
            .encode(alarm.hour.value)
            .ok_or(Error::out_of_range(i64::from(alarm.hour.value), 0, 23))?
            | flag(&alarm.hour);

        let weekday = alarm.day.value + self.weekday_start;
        match (self.day, alarm.day_match) {
            (DayLayout::Shared { .. }, DayMatch::DayOfMonth) => {
                out[day_index] = bcd_field(alarm.day.value)? | flag(&alarm.day);
            }
            (DayLayout::Shared { mode_bit }, DayMatch::Weekday) => {
                out[day_index] = weekday | (1 << mode_bit) | flag(&alarm.day);
            }
            (DayLayout::Separate { .. }, DayMatch::DayOfMonth) => {
                out[day_index] = bcd_field(alarm.day.value)? | flag(&alarm.day);
                out[weekday_index] = self.weekday_start | disable;
            }
            (DayLayout::Separate { .. }, DayMatch::Weekday) => {
                out[day_index] = 0x01 | disable;
                out[weekday_index] = weekday | flag(&alarm.day);
            }
        }

        let len = self.len();
        bytes[..len].copy_from_slice(&out[..len]);
        Ok(())
    }
}

/// Real-time clock alarm register
///
/// # Example
/// ```ignore
/// let rtc = RefCell::new(I2cDevice::new(i2c, 0x68));
/// let mut clock = BcdDateTime::new(RefCellBus::new(&rtc), RegisterAddress::new(0x00), DateTimeLayout::DS3231)?;
/// let mut alarm = BcdAlarm::new(RefCellBus::new(&rtc), RegisterAddress::new(0x07), AlarmLayout::DS3231_ALARM1)?;
/// alarm.write(&Alarm::repeating(AlarmFrequency::Daily, DayMatch::DayOfMonth, 1, 7, 30, 0))?;
/// let now = clock.read()?;
/// ```
pub struct BcdAlarm<B, S = [u8; ALARM_FRAME]> {
    bus: B,
    buffer: RegisterBuffer<S>,
    layout: AlarmLayout,
}

impl<B: RegisterBus> BcdAlarm<B> {
    /// Alarm block starting at `address`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLayout`] if the layout flags overlap.
    pub fn new(bus: B, address: RegisterAddress, layout: AlarmLayout) -> Result<Self, ConfigError> {
        Self::with_storage(bus, [0; ALARM_FRAME], address, layout)
    }
}

#[cfg(feature = "alloc")]
impl<B: RegisterBus> BcdAlarm<B, LazyStorage> {
    /// Like [`BcdAlarm::new`], allocating the buffer on first access
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLayout`] if the layout flags overlap.
    pub fn new_lazy(bus: B, address: RegisterAddress, layout: AlarmLayout) -> Result<Self, ConfigError> {
        Self::with_storage(bus, LazyStorage::new(), address, layout)
    }
}

impl<B: RegisterBus, S: Storage> BcdAlarm<B, S> {
    /// Build on caller-provided storage
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLayout`] or [`ConfigError::BufferTooSmall`].
    pub fn with_storage(
        bus: B,
        storage: S,
        address: RegisterAddress,
        layout: AlarmLayout,
    ) -> Result<Self, ConfigError> {
        layout.validate()?;
        Ok(Self {
            bus,
            buffer: RegisterBuffer::new(storage, address, layout.len())?,
            layout,
        })
    }

    /// Read the alarm in one transaction
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] or [`Error::InvalidBcd`].
    pub fn read(&mut self) -> Result<Alarm, Error<B::Error>> {
        let mut bus = self.bus.lock()?;
        self.buffer.fetch(&mut bus)?;
        drop(bus);
        self.layout.decode(self.buffer.payload_mut())
    }

    /// Write the alarm in one transaction
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] before touching the bus, or [`Error::Bus`].
    pub fn write(&mut self, alarm: &Alarm) -> Result<(), Error<B::Error>> {
        self.layout.encode::<B::Error>(alarm, self.buffer.payload_mut())?;
        let mut bus = self.bus.lock()?;
        self.buffer.store(&mut bus)?;
        Ok(())
    }

    /// Alarm layout
    pub const fn layout(&self) -> &AlarmLayout {
        &self.layout
    }

    /// Consume the register and return the bus
    pub fn release(self) -> B {
        self.bus
    }
}
