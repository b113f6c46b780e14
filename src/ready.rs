//! Operations on a configured `Lis3mdl`.

use embedded_hal::i2c::I2c;

use crate::registers;
use crate::sample::{Channel, Measurement, Reading};
use crate::{Error, Lis3mdl, Ready};

#[cfg(feature = "trigger")]
use bilge::prelude::*;
#[cfg(feature = "trigger")]
use crate::registers::IntCfg;
#[cfg(feature = "trigger")]
use crate::trigger::{Trigger, TriggerHandler, TriggerKind};

/// Attributes settable through [`Lis3mdl::set_attribute`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Attribute {
    /// Index into the output-data-rate table, [`registers::ODR_BITS`].
    SamplingFrequency,
    /// Lower magnitude threshold. The chip's interrupt generator has no
    /// lower limit register.
    LowerThreshold,
    /// Upper magnitude threshold for the threshold trigger, in raw LSB.
    UpperThreshold,
    /// Per-axis zero offset.
    Offset,
}

impl<I2C: I2c> Lis3mdl<I2C, Ready> {
    /// Reads all four raw channels into driver state.
    ///
    /// Two burst transactions: the chip's read pointer does not carry from
    /// the magnetometer block into the temperature block, so a single
    /// combined read would return stale temperature bytes. State is only
    /// updated once both transactions have succeeded; a failed fetch leaves
    /// the previous sample intact for every channel.
    pub fn fetch_all(&mut self) -> Result<(), Error<I2C::Error>> {
        let mut magn = [0u8; 8];
        self.ll.read_burst(registers::OUT_X_L, &mut magn)?;

        let mut temp = [0u8; 2];
        self.ll.read_burst(registers::TEMP_OUT_L, &mut temp)?;

        self.sample.x = i16::from_le_bytes([magn[0], magn[1]]);
        self.sample.y = i16::from_le_bytes([magn[2], magn[3]]);
        self.sample.z = i16::from_le_bytes([magn[4], magn[5]]);
        self.sample.temp = i16::from_le_bytes([temp[0], temp[1]]);
        Ok(())
    }

    /// Converts the most recent fetch for `channel`. Touches no bus; call
    /// [`fetch_all`](Self::fetch_all) first, from the same context. Before
    /// the first fetch every channel converts from zero.
    pub fn read_channel(&self, channel: Channel) -> Reading {
        self.sample.read(channel)
    }

    /// Applies an operating attribute to the device.
    ///
    /// Bus failures are returned as-is with no retry; the register may or
    /// may not have been written.
    pub fn set_attribute(
        &mut self,
        attribute: Attribute,
        value: Measurement,
    ) -> Result<(), Error<I2C::Error>> {
        match attribute {
            Attribute::SamplingFrequency => {
                let idx = usize::try_from(value.whole)
                    .ok()
                    .filter(|idx| *idx < registers::ODR_BITS.len())
                    .ok_or(Error::InvalidConfiguration)?;
                self.ll
                    .write_byte(registers::CTRL_REG1, registers::ODR_BITS[idx])?;
            }
            Attribute::UpperThreshold => {
                // Address plus both threshold bytes in one transaction; the
                // chip rejects a stop condition between them. Bit 15 of the
                // threshold is unused.
                let ths = value.whole as u16;
                self.ll.write_burst(&[
                    registers::INT_THS_L,
                    (ths & 0xFF) as u8,
                    ((ths >> 8) & 0x7F) as u8,
                ])?;
            }
            _ => return Err(Error::UnsupportedAttribute),
        }
        Ok(())
    }

    /// Arms the hardware threshold interrupt and registers `handler` to run
    /// in the dispatch context. A prior registration is replaced.
    ///
    /// A failed register write leaves the chip and the interrupt line out of
    /// step with each other; call [`disable_trigger`](Self::disable_trigger)
    /// before arming again.
    #[cfg(feature = "trigger")]
    pub fn enable_trigger(
        &mut self,
        trigger: Trigger,
        handler: TriggerHandler,
    ) -> Result<(), Error<I2C::Error>> {
        if trigger.kind != TriggerKind::Threshold {
            return Err(Error::UnsupportedTrigger);
        }

        let mut cfg = IntCfg::disabled();
        cfg.set_int_enable(u1::new(1));
        cfg.set_active_high(u1::new(1));
        match trigger.channel {
            Channel::MagnX => cfg.set_x_enable(u1::new(1)),
            Channel::MagnY => cfg.set_y_enable(u1::new(1)),
            Channel::MagnZ => cfg.set_z_enable(u1::new(1)),
            Channel::MagnXyz => {
                cfg.set_x_enable(u1::new(1));
                cfg.set_y_enable(u1::new(1));
                cfg.set_z_enable(u1::new(1));
            }
            Channel::DieTemp => return Err(Error::UnsupportedTrigger),
        }

        self.state.trigger.register(trigger, handler);
        self.state.trigger.arm();
        self.ll.write_reg(cfg)?;
        Ok(())
    }

    /// Disarms the interrupt line, clears the registered handler and clears
    /// every channel enable in the interrupt configuration.
    ///
    /// This is the only way to stop notifications; nothing auto-disarms. An
    /// event already queued before the disable is dropped at dispatch time.
    #[cfg(feature = "trigger")]
    pub fn disable_trigger(&mut self) -> Result<(), Error<I2C::Error>> {
        self.state.trigger.disarm();
        self.state.trigger.clear();
        self.ll.write_reg(IntCfg::disabled())?;
        Ok(())
    }

    /// Release the bus from the driver.
    pub fn release(self) -> I2C {
        self.ll.release()
    }
}

#[cfg(all(test, feature = "trigger"))]
mod test {
    use super::*;
    use crate::trigger::{testing, DispatchModel, EventRelay, WorkQueue};
    use crate::Config;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal::i2c::ErrorKind;

    const ADDR: u8 = registers::ADDR_PRIMARY;
    const LINE_MASK: u32 = 1 << 4;

    fn startup_expectations(extra: &[I2cTransaction]) -> Vec<I2cTransaction> {
        let mut expectations = vec![
            I2cTransaction::write_read(ADDR, vec![registers::WHO_AM_I], vec![registers::CHIP_ID]),
            I2cTransaction::write(ADDR, vec![registers::CTRL_REG2, 0x04]),
            I2cTransaction::write(
                ADDR,
                vec![registers::CTRL_REG1, 0x00, 0x00, 0x00, 0x00, 0x40],
            ),
            I2cTransaction::write_read(ADDR, vec![registers::OUT_X_L], vec![0u8; 8]),
            I2cTransaction::write_read(ADDR, vec![registers::TEMP_OUT_L], vec![0u8; 2]),
        ];
        expectations.extend_from_slice(extra);
        expectations
    }

    /// A configured device whose mock bus still expects `extra` after the
    /// startup sequence.
    fn ready_device(
        extra: &[I2cTransaction],
    ) -> (Lis3mdl<I2cMock, Ready>, EventRelay, Arc<AtomicBool>) {
        let i2c = I2cMock::new(&startup_expectations(extra));
        let (line, armed) = testing::line(LINE_MASK);
        let (device, relay) = Lis3mdl::new(i2c, ADDR, Config::default())
            .initialize(line, DispatchModel::default())
            .unwrap();
        (device, relay, armed)
    }

    #[test]
    fn test_fetch_all_reads_both_blocks() {
        // x = 6842 (one gain unit), y = 3421, z = -6842, temp = 16 (27 °C).
        let (mut device, _relay, _armed) = ready_device(&[
            I2cTransaction::write_read(
                ADDR,
                vec![registers::OUT_X_L],
                vec![0xBA, 0x1A, 0x5D, 0x0D, 0x46, 0xE5, 0xFF, 0xFF],
            ),
            I2cTransaction::write_read(ADDR, vec![registers::TEMP_OUT_L], vec![0x10, 0x00]),
        ]);

        device.fetch_all().unwrap();

        assert_eq!(
            device.read_channel(Channel::MagnXyz),
            Reading::MagnXyz([
                Measurement { whole: 1, micros: 0 },
                Measurement { whole: 0, micros: 500_000 },
                Measurement { whole: -1, micros: 0 },
            ])
        );
        assert_eq!(
            device.read_channel(Channel::MagnY),
            Reading::Magn(Measurement { whole: 0, micros: 500_000 })
        );
        assert_eq!(
            device.read_channel(Channel::DieTemp),
            Reading::DieTemp(Measurement { whole: 27, micros: 0 })
        );

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_failed_temperature_read_keeps_previous_sample() {
        let (mut device, _relay, _armed) = ready_device(&[
            I2cTransaction::write_read(
                ADDR,
                vec![registers::OUT_X_L],
                vec![0xBA, 0x1A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            ),
            I2cTransaction::write_read(ADDR, vec![registers::TEMP_OUT_L], vec![0x10, 0x00]),
            I2cTransaction::write_read(
                ADDR,
                vec![registers::OUT_X_L],
                vec![0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            ),
            I2cTransaction::write_read(ADDR, vec![registers::TEMP_OUT_L], vec![0u8; 2])
                .with_error(ErrorKind::Other),
        ]);

        device.fetch_all().unwrap();
        assert_eq!(
            device.read_channel(Channel::MagnX),
            Reading::Magn(Measurement { whole: 1, micros: 0 })
        );

        // The second fetch dies on the temperature block; neither block of
        // driver state may pick up the new magnetometer bytes.
        assert_eq!(device.fetch_all().unwrap_err(), Error::Bus(ErrorKind::Other));
        assert_eq!(
            device.read_channel(Channel::MagnX),
            Reading::Magn(Measurement { whole: 1, micros: 0 })
        );
        assert_eq!(
            device.read_channel(Channel::DieTemp),
            Reading::DieTemp(Measurement { whole: 27, micros: 0 })
        );

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_channels_read_zero_before_first_fetch() {
        let (device, _relay, _armed) = ready_device(&[]);

        assert_eq!(
            device.read_channel(Channel::MagnXyz),
            Reading::MagnXyz([Measurement::default(); 3])
        );

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_set_sampling_frequency_writes_table_code() {
        let (mut device, _relay, _armed) = ready_device(&[I2cTransaction::write(
            ADDR,
            vec![registers::CTRL_REG1, 0x10],
        )]);

        device
            .set_attribute(
                Attribute::SamplingFrequency,
                Measurement { whole: 4, micros: 0 },
            )
            .unwrap();

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_out_of_range_sampling_frequency_is_rejected_without_io() {
        let (mut device, _relay, _armed) = ready_device(&[]);

        for whole in [registers::ODR_BITS.len() as i32, -1] {
            assert_eq!(
                device
                    .set_attribute(Attribute::SamplingFrequency, Measurement { whole, micros: 0 })
                    .unwrap_err(),
                Error::InvalidConfiguration
            );
        }

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_set_upper_threshold_masks_the_high_byte() {
        let (mut device, _relay, _armed) = ready_device(&[
            I2cTransaction::write(ADDR, vec![registers::INT_THS_L, 0xE8, 0x03]),
            I2cTransaction::write(ADDR, vec![registers::INT_THS_L, 0xFF, 0x7F]),
        ]);

        device
            .set_attribute(
                Attribute::UpperThreshold,
                Measurement { whole: 1000, micros: 0 },
            )
            .unwrap();
        device
            .set_attribute(
                Attribute::UpperThreshold,
                Measurement { whole: 0xFFFF, micros: 0 },
            )
            .unwrap();

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_unsupported_attribute_performs_zero_writes() {
        let (mut device, _relay, _armed) = ready_device(&[]);

        for attribute in [Attribute::LowerThreshold, Attribute::Offset] {
            assert_eq!(
                device
                    .set_attribute(attribute, Measurement { whole: 1, micros: 0 })
                    .unwrap_err(),
                Error::UnsupportedAttribute
            );
        }

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_enable_trigger_programs_channel_bits_and_arms_the_line() {
        // base 0x08 | IEN 0x01 | IEA 0x04, plus XIEN for the single axis.
        let (mut device, _relay, armed) = ready_device(&[I2cTransaction::write(
            ADDR,
            vec![registers::INT_CFG, 0x8D],
        )]);

        device
            .enable_trigger(
                Trigger {
                    kind: TriggerKind::Threshold,
                    channel: Channel::MagnX,
                },
                Box::new(|_| {}),
            )
            .unwrap();
        assert!(armed.load(Ordering::SeqCst));

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_enable_then_disable_clears_every_channel_bit() {
        let (mut device, _relay, armed) = ready_device(&[
            I2cTransaction::write(ADDR, vec![registers::INT_CFG, 0xED]),
            I2cTransaction::write(ADDR, vec![registers::INT_CFG, 0x08]),
        ]);

        device
            .enable_trigger(
                Trigger {
                    kind: TriggerKind::Threshold,
                    channel: Channel::MagnXyz,
                },
                Box::new(|_| {}),
            )
            .unwrap();
        assert!(armed.load(Ordering::SeqCst));
        assert!(device.state.trigger.has_handler());

        device.disable_trigger().unwrap();
        assert!(!armed.load(Ordering::SeqCst));
        assert!(!device.state.trigger.has_handler());

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_unsupported_trigger_is_rejected_without_side_effects() {
        let (mut device, _relay, armed) = ready_device(&[]);

        assert_eq!(
            device
                .enable_trigger(
                    Trigger {
                        kind: TriggerKind::DataReady,
                        channel: Channel::MagnXyz,
                    },
                    Box::new(|_| {}),
                )
                .unwrap_err(),
            Error::UnsupportedTrigger
        );
        assert_eq!(
            device
                .enable_trigger(
                    Trigger {
                        kind: TriggerKind::Threshold,
                        channel: Channel::DieTemp,
                    },
                    Box::new(|_| {}),
                )
                .unwrap_err(),
            Error::UnsupportedTrigger
        );
        assert!(!armed.load(Ordering::SeqCst));
        assert!(!device.state.trigger.has_handler());

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_interrupt_event_reaches_the_handler() {
        let (mut device, relay, _armed) = ready_device(&[I2cTransaction::write(
            ADDR,
            vec![registers::INT_CFG, 0x2D],
        )]);

        let (observed_tx, observed_rx) = mpsc::channel();
        device
            .enable_trigger(
                Trigger {
                    kind: TriggerKind::Threshold,
                    channel: Channel::MagnZ,
                },
                Box::new(move |trigger| {
                    observed_tx.send(*trigger).unwrap();
                }),
            )
            .unwrap();

        relay.notify(LINE_MASK);
        let observed = observed_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(observed.kind, TriggerKind::Threshold);
        assert_eq!(observed.channel, Channel::MagnZ);

        // A mask that does not cover this device's line is not delivered.
        relay.notify(!LINE_MASK);
        assert!(observed_rx.recv_timeout(Duration::from_millis(200)).is_err());

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_shared_queue_model_delivers_through_the_platform_queue() {
        struct InlineQueue;

        impl WorkQueue for InlineQueue {
            fn submit(&self, work: Box<dyn FnOnce() + Send>) {
                work();
            }
        }

        let expectations = startup_expectations(&[I2cTransaction::write(
            ADDR,
            vec![registers::INT_CFG, 0x4D],
        )]);

        let i2c = I2cMock::new(&expectations);
        let (line, _armed) = testing::line(LINE_MASK);
        let (mut device, relay) = Lis3mdl::new(i2c, ADDR, Config::default())
            .initialize(line, DispatchModel::SharedQueue(Arc::new(InlineQueue)))
            .unwrap();

        let (observed_tx, observed_rx) = mpsc::channel();
        device
            .enable_trigger(
                Trigger {
                    kind: TriggerKind::Threshold,
                    channel: Channel::MagnY,
                },
                Box::new(move |trigger| observed_tx.send(*trigger).unwrap()),
            )
            .unwrap();

        relay.notify(LINE_MASK);
        let observed = observed_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(observed.kind, TriggerKind::Threshold);
        assert_eq!(observed.channel, Channel::MagnY);

        let mut i2c = device.release();
        i2c.done();
    }

    #[test]
    fn test_event_after_disable_is_dropped_quietly() {
        let (mut device, relay, _armed) = ready_device(&[
            I2cTransaction::write(ADDR, vec![registers::INT_CFG, 0xED]),
            I2cTransaction::write(ADDR, vec![registers::INT_CFG, 0x08]),
        ]);

        let (observed_tx, observed_rx) = mpsc::channel();
        device
            .enable_trigger(
                Trigger {
                    kind: TriggerKind::Threshold,
                    channel: Channel::MagnXyz,
                },
                Box::new(move |trigger| {
                    observed_tx.send(*trigger).unwrap();
                }),
            )
            .unwrap();
        device.disable_trigger().unwrap();

        relay.notify(LINE_MASK);
        assert!(observed_rx.recv_timeout(Duration::from_millis(200)).is_err());

        let mut i2c = device.release();
        i2c.done();
    }
}
