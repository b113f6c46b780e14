//! Startup path for a `Lis3mdl` that has not been configured yet.

use bilge::prelude::*;
use embedded_hal::i2c::I2c;

use crate::registers::{self, CtrlReg1, CtrlReg2, CtrlReg3, CtrlReg4, CtrlReg5};
use crate::sample::RawSample;
use crate::{Config, Error, Lis3mdl, Ready, Uninitialized};

#[cfg(feature = "trigger")]
use crate::trigger::{self, DispatchModel, EventRelay, InterruptLine};

impl<I2C> Lis3mdl<I2C, Uninitialized> {
    /// Creates an unconfigured driver over `i2c` at `address`
    /// ([`registers::ADDR_PRIMARY`] or [`registers::ADDR_SECONDARY`]).
    pub fn new(i2c: I2C, address: u8, config: Config) -> Self {
        Lis3mdl {
            ll: crate::ll::Lis3mdl::new(i2c, address),
            config,
            sample: RawSample::default(),
            state: Uninitialized,
        }
    }
}

impl<I2C: I2c> Lis3mdl<I2C, Uninitialized> {
    /// Brings the chip up and wires the threshold-trigger plumbing.
    ///
    /// Runs the identity check, selector validation, soft reset and the
    /// configuration burst, then builds the dispatch context for `line` and
    /// the chosen model. The returned [`EventRelay`] is what the platform's
    /// GPIO interrupt callback must call; it is clonable and never blocks.
    ///
    /// Fails fast: any step's failure aborts initialization, and no
    /// partially-initialized device is returned.
    #[cfg(feature = "trigger")]
    pub fn initialize(
        mut self,
        line: Box<dyn InterruptLine>,
        dispatch: DispatchModel,
    ) -> Result<(Lis3mdl<I2C, Ready>, EventRelay), Error<I2C::Error>> {
        self.configure()?;

        let (context, relay) = trigger::init(line, dispatch);
        let mut device = Lis3mdl {
            ll: self.ll,
            config: self.config,
            sample: self.sample,
            state: Ready { trigger: context },
        };

        // Drain a sample so a latched interrupt line is released before the
        // trigger is ever armed.
        device.fetch_all()?;

        Ok((device, relay))
    }

    /// Brings the chip up: identity check, selector validation, soft reset
    /// and the configuration burst. Fails fast on any step.
    #[cfg(not(feature = "trigger"))]
    pub fn initialize(mut self) -> Result<Lis3mdl<I2C, Ready>, Error<I2C::Error>> {
        self.configure()?;

        Ok(Lis3mdl {
            ll: self.ll,
            config: self.config,
            sample: self.sample,
            state: Ready {},
        })
    }

    fn configure(&mut self) -> Result<(), Error<I2C::Error>> {
        let id = self.ll.read_byte(registers::WHO_AM_I)?;
        if id != registers::CHIP_ID {
            return Err(Error::WhoAmIMismatch(id));
        }

        // The selectors come in as text from external configuration; a typo
        // has to be caught before the first register write.
        let pidx = registers::PMODE_STRINGS
            .iter()
            .position(|name| *name == self.config.power_mode)
            .ok_or(Error::InvalidConfiguration)?;
        let oidx = registers::ODR_STRINGS
            .iter()
            .position(|name| *name == self.config.output_data_rate)
            .ok_or(Error::InvalidConfiguration)?;

        let mut reset = CtrlReg2::from(0u8);
        reset.set_soft_reset(u1::new(1));
        self.ll.write_reg(reset)?;

        let odr = registers::ODR_BITS[oidx];
        // The fast rates only run in single conversion mode.
        let mode = if CtrlReg1::from(odr).fast_odr().value() != 0 {
            registers::MD_SINGLE
        } else {
            registers::MD_CONTINUOUS
        };

        let mut ctrl2 = CtrlReg2::from(0u8);
        ctrl2.set_full_scale(u2::new(registers::FS_IDX as u8));
        let mut ctrl3 = CtrlReg3::from(0u8);
        ctrl3.set_system_mode(u2::new(mode));
        let mut ctrl4 = CtrlReg4::from(0u8);
        ctrl4.set_z_operating_mode(u2::new(registers::PMODE_BITS[pidx]));
        let mut ctrl5 = CtrlReg5::from(0u8);
        ctrl5.set_block_data_update(u1::new(1));

        // CTRL_REG1..CTRL_REG5 in one burst; the chip wants address plus
        // data without an intervening stop.
        self.ll.write_burst(&[
            registers::CTRL_REG1,
            odr,
            ctrl2.into(),
            ctrl3.into(),
            ctrl4.into(),
            ctrl5.into(),
        ])?;

        Ok(())
    }
}
