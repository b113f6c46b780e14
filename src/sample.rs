//! Sample state and raw-to-physical conversion.

use crate::registers::{FS_IDX, MAGN_GAIN};

/// The sensor reports die temperature as an offset from 25 °C in eighths of
/// a degree.
pub(crate) const TEMP_DIVISOR: u16 = 8;

/// A fixed-point physical value: integer part plus signed millionths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Integer part, truncated toward zero.
    pub whole: i32,
    /// Fractional part in millionths, carrying the sign of the raw value.
    pub micros: i32,
}

impl Measurement {
    /// Converts a raw two's-complement register value with the given gain
    /// divisor.
    ///
    /// Division truncates toward zero, so negative raw values round toward
    /// zero rather than toward negative infinity, and the fractional part
    /// keeps the raw value's sign with `|micros| < 1_000_000`. The widening
    /// to `i64` keeps the scaled remainder exact at the raw extremes.
    pub fn from_raw(raw: i16, divisor: u16) -> Self {
        let raw = i32::from(raw);
        let divisor = i32::from(divisor);
        Measurement {
            whole: raw / divisor,
            micros: ((i64::from(raw % divisor) * 1_000_000) / i64::from(divisor)) as i32,
        }
    }
}

/// Measurement channels exposed by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    MagnX,
    MagnY,
    MagnZ,
    /// All three magnetometer axes, converted in X, Y, Z order.
    MagnXyz,
    /// Die temperature in °C.
    DieTemp,
}

/// A converted reading for one channel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading {
    Magn(Measurement),
    MagnXyz([Measurement; 3]),
    DieTemp(Measurement),
}

/// Most recent raw readings. Zero until the first successful fetch, so every
/// channel converts to a zero measurement before then.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RawSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub temp: i16,
}

impl RawSample {
    pub(crate) fn read(&self, channel: Channel) -> Reading {
        const GAIN: u16 = MAGN_GAIN[FS_IDX];
        match channel {
            Channel::MagnX => Reading::Magn(Measurement::from_raw(self.x, GAIN)),
            Channel::MagnY => Reading::Magn(Measurement::from_raw(self.y, GAIN)),
            Channel::MagnZ => Reading::Magn(Measurement::from_raw(self.z, GAIN)),
            Channel::MagnXyz => Reading::MagnXyz([
                Measurement::from_raw(self.x, GAIN),
                Measurement::from_raw(self.y, GAIN),
                Measurement::from_raw(self.z, GAIN),
            ]),
            Channel::DieTemp => {
                let mut val = Measurement::from_raw(self.temp, TEMP_DIVISOR);
                val.whole += 25;
                Reading::DieTemp(val)
            }
        }
    }
}
