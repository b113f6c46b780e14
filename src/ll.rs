//! Register-protocol layer: raw byte transfers against the chip's
//! register-addressed map. No measurement semantics live here.

use embedded_hal::i2c::I2c;

use crate::registers::Register;

/// Low-level access to a LIS3MDL behind an I2C bus.
///
/// Every operation is a blocking bus transaction and may stall on bus
/// arbitration; none of them may be called from interrupt context.
pub struct Lis3mdl<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> Lis3mdl<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Lis3mdl { i2c, address }
    }

    /// Release the bus from the driver.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> Lis3mdl<I2C> {
    pub fn read_byte(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(self.address, &[reg], &mut buf)?;
        Ok(buf[0])
    }

    pub fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[reg, value])
    }

    /// Writes a typed register through its mapped address.
    pub fn write_reg<R: Register>(&mut self, reg: R) -> Result<(), I2C::Error> {
        self.write_byte(R::ADDR, reg.into())
    }

    /// Burst read starting at `reg`, one transaction; the chip walks its
    /// read pointer across the block. Bytes land in bus order (the chip's
    /// 16-bit fields are little-endian) and decoding is the caller's job.
    pub fn read_burst(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), I2C::Error> {
        self.i2c.write_read(self.address, &[reg], buf)
    }

    /// One write transaction of register address plus data, with no stop
    /// condition in between. `buf[0]` is the register address.
    pub fn write_burst(&mut self, buf: &[u8]) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, buf)
    }
}
