#![cfg_attr(not(feature = "std"), no_std)]
//! Driver for the ST LIS3MDL 3-axis magnetometer with die-temperature sensor,
//! over I2C.
//!
//! The driver converts the chip's register map into fixed-point physical
//! measurements and, with the `trigger` feature, arms the chip's
//! magnitude-threshold interrupt and delivers notifications to a registered
//! handler outside of interrupt context.
//!
//! Usage:
//!
//! ```rust,ignore
//! use lis3mdl::sample::{Channel, Reading};
//! use lis3mdl::trigger::{DispatchModel, Trigger, TriggerKind};
//!
//! let device = lis3mdl::Lis3mdl::new(i2c, lis3mdl::registers::ADDR_PRIMARY, Default::default());
//! let (mut device, relay) = device.initialize(Box::new(irq_line), DispatchModel::default())?;
//!
//! device.enable_trigger(
//!     Trigger { kind: TriggerKind::Threshold, channel: Channel::MagnXyz },
//!     Box::new(|trigger| {
//!         // runs in the dispatch context; fetch fresh data here
//!     }),
//! )?;
//!
//! // from the GPIO interrupt callback:
//! relay.notify(pin_mask);
//!
//! device.fetch_all()?;
//! if let Reading::MagnXyz(xyz) = device.read_channel(Channel::MagnXyz) {
//!     // xyz[0].whole gauss + xyz[0].micros millionths, X then Y then Z
//! }
//! ```

pub mod ll;
pub mod ready;
pub mod registers;
pub mod sample;
#[cfg(feature = "trigger")]
pub mod trigger;
pub mod uninitialized;

/// Indicates that the `Lis3mdl` instance has not been configured yet
#[derive(Debug)]
pub struct Uninitialized;

/// Indicates that the `Lis3mdl` instance is ready to be used
pub struct Ready {
    #[cfg(feature = "trigger")]
    pub(crate) trigger: crate::trigger::TriggerContext,
}

/// Operating selectors applied during [`initialize`](Lis3mdl::initialize).
///
/// Both selectors arrive as text from external configuration and are matched
/// against the fixed tables in [`registers`]; an unrecognized name fails
/// initialization before any register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Power/performance mode, one of [`registers::PMODE_STRINGS`].
    pub power_mode: &'static str,
    /// Output data rate in Hz, one of [`registers::ODR_STRINGS`].
    pub output_data_rate: &'static str,
}

impl Default for Config {
    /// The chip's reset-default modes: low-power, 0.625 Hz.
    fn default() -> Self {
        Config {
            power_mode: "LP",
            output_data_rate: "0.625",
        }
    }
}

/// Driver error, generic over the bus error type.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Transport-level failure on the I2C bus.
    Bus(E),
    /// WHO_AM_I returned something other than the LIS3MDL identity.
    WhoAmIMismatch(u8),
    /// Power-mode or data-rate selector not in the fixed tables, or an
    /// attribute value out of range.
    InvalidConfiguration,
    /// The attribute cannot be set on this device.
    UnsupportedAttribute,
    /// The trigger kind or channel cannot be armed on this device.
    UnsupportedTrigger,
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Error::Bus(err)
    }
}

/// LIS3MDL top-level driver
///
/// Constructed over any [`embedded_hal::i2c::I2c`] implementation via
/// [`Lis3mdl::new`](crate::Lis3mdl::new), then moved to the [`Ready`] state
/// by `initialize`, which runs the identity check, the soft reset and the
/// one-shot configuration burst.
pub struct Lis3mdl<I2C, State> {
    ll: crate::ll::Lis3mdl<I2C>,
    config: Config,
    sample: crate::sample::RawSample,
    state: State,
}
