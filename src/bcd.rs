//! Binary-coded decimal helpers shared by the calendar and alarm registers
//!
//! One byte holds two decimal digits, tens in the high nibble: `0x47` is 47.

/// Decode a BCD byte, returning `None` if either nibble is greater than 9
///
/// # Example
/// ```
/// assert_eq!(i2c_register::decode_bcd(0x47), Some(47));
/// assert_eq!(i2c_register::decode_bcd(0x4A), None);
/// ```
#[must_use]
pub const fn decode_bcd(byte: u8) -> Option<u8> {
    let tens = byte >> 4;
    let ones = byte & 0x0F;
    if tens > 9 || ones > 9 {
        return None;
    }
    Some(tens * 10 + ones)
}

/// Encode a value in `0..=99` as BCD, returning `None` above 99
#[must_use]
pub const fn encode_bcd(value: u8) -> Option<u8> {
    if value > 99 {
        return None;
    }
    Some(((value / 10) << 4) | (value % 10))
}

/// Hour notation used when writing an hour byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Clock {
    /// 0-23
    #[default]
    TwentyFourHour,
    /// 1-12 with an AM/PM flag
    TwelveHour,
}

/// Flag bits overlaid on a BCD hour byte
///
/// Many RTCs reserve one high bit of the hour register to select 12-hour
/// notation and another as the PM flag. Devices that select the notation in a
/// separate control register have no mode bit; for them `clock` decides how
/// the byte is read as well as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HourFormat {
    /// Notation used when encoding
    pub clock: Clock,
    /// Bit that is set when the byte holds a 12-hour value
    pub mode_bit: Option<u8>,
    /// Bit that is set for PM in 12-hour notation
    pub pm_bit: u8,
}

impl Default for HourFormat {
    fn default() -> Self {
        Self::DALLAS
    }
}

impl HourFormat {
    /// Dallas/Maxim layout (DS1307, DS3231): bit 6 selects 12-hour, bit 5 is PM
    pub const DALLAS: Self = Self {
        clock: Clock::TwentyFourHour,
        mode_bit: Some(6),
        pm_bit: 5,
    };

    /// NXP layout (PCF8523): notation set in a control register, bit 5 is PM
    pub const NXP: Self = Self {
        clock: Clock::TwentyFourHour,
        mode_bit: None,
        pm_bit: 5,
    };

    /// Same layout, writing 12-hour values
    #[must_use]
    pub const fn twelve_hour(self) -> Self {
        Self {
            clock: Clock::TwelveHour,
            ..self
        }
    }

    /// Whether the flag bits fit in a byte alongside a 12-hour BCD value
    pub(crate) const fn is_valid(&self) -> bool {
        let pm_ok = self.pm_bit >= 5 && self.pm_bit < 8;
        match self.mode_bit {
            Some(bit) => pm_ok && bit >= 5 && bit < 8 && bit != self.pm_bit,
            None => pm_ok,
        }
    }

    /// Bits owned by this format in the hour byte
    pub(crate) const fn flag_mask(&self) -> u8 {
        let mode = match self.mode_bit {
            Some(bit) => 1 << bit,
            None => 0,
        };
        mode | (1 << self.pm_bit)
    }

    fn reads_twelve_hour(&self, byte: u8) -> bool {
        match self.mode_bit {
            Some(bit) => byte & (1 << bit) != 0,
            None => self.clock == Clock::TwelveHour,
        }
    }

    /// Decode an hour byte to 0-23
    ///
    /// Bits above the hour value other than the mode and PM flags must
    /// already be cleared. Returns `None` for malformed BCD.
    #[must_use]
    pub fn decode(&self, byte: u8) -> Option<u8> {
        if self.reads_twelve_hour(byte) {
            let pm = byte & (1 << self.pm_bit) != 0;
            let hour = decode_bcd(byte & 0x1F)? % 12;
            Some(if pm { hour + 12 } else { hour })
        } else {
            decode_bcd(byte & 0x3F)
        }
    }

    /// Encode an hour in 0-23, returning `None` above 23
    #[must_use]
    pub fn encode(&self, hour: u8) -> Option<u8> {
        if hour > 23 {
            return None;
        }
        match self.clock {
            Clock::TwentyFourHour => encode_bcd(hour),
            Clock::TwelveHour => {
                let twelve = match hour % 12 {
                    0 => 12,
                    h => h,
                };
                let mut byte = encode_bcd(twelve)?;
                if hour >= 12 {
                    byte |= 1 << self.pm_bit;
                }
                if let Some(bit) = self.mode_bit {
                    byte |= 1 << bit;
                }
                Some(byte)
            }
        }
    }
}
