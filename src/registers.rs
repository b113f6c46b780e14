//! LIS3MDL register map
//!
//! Single source for register addresses, field layouts and the fixed
//! configuration tables. The sampling, configuration and trigger paths all
//! read their bit positions from here.

use bilge::prelude::*;

/// I2C address with the SDO/SA1 strap low.
pub const ADDR_PRIMARY: u8 = 0x1C;
/// I2C address with the SDO/SA1 strap high.
pub const ADDR_SECONDARY: u8 = 0x1E;

/// WHO_AM_I contents for every LIS3MDL revision.
pub const CHIP_ID: u8 = 0x3D;

pub const WHO_AM_I: u8 = 0x0F;
pub const CTRL_REG1: u8 = 0x20;
pub const CTRL_REG2: u8 = 0x21;
pub const CTRL_REG3: u8 = 0x22;
pub const CTRL_REG4: u8 = 0x23;
pub const CTRL_REG5: u8 = 0x24;
pub const STATUS_REG: u8 = 0x27;
/// First byte of the output block; the read pointer walks OUT_X_L..OUT_Z_H
/// but does not carry into the temperature block.
pub const OUT_X_L: u8 = 0x28;
pub const TEMP_OUT_L: u8 = 0x2E;
pub const INT_CFG: u8 = 0x30;
pub const INT_SRC: u8 = 0x31;
pub const INT_THS_L: u8 = 0x32;
pub const INT_THS_H: u8 = 0x33;

/// Output-data-rate selector names, index-aligned with [`ODR_BITS`].
pub const ODR_STRINGS: [&str; 12] = [
    "0.625", "1.25", "2.5", "5", "10", "20", "40", "80", "155", "300", "560", "1000",
];

/// CTRL_REG1 codes for each entry of [`ODR_STRINGS`]. The four fast rates
/// carry FAST_ODR plus the XY operating mode that reaches them.
pub const ODR_BITS: [u8; 12] = [
    0x00, 0x04, 0x08, 0x0C, 0x10, 0x14, 0x18, 0x1C, 0x62, 0x42, 0x22, 0x02,
];

/// Gain divisors in LSB/gauss, indexed by the CTRL_REG2 full-scale field.
pub const MAGN_GAIN: [u16; 4] = [6842, 3421, 2281, 1711];

/// Fixed full-scale selection (±4 gauss). Conversion and the configuration
/// burst both read this one constant, so the divisor cannot drift from the
/// programmed range.
pub const FS_IDX: usize = 0;

/// Power/performance mode selector names, index-aligned with [`PMODE_BITS`].
pub const PMODE_STRINGS: [&str; 4] = ["LP", "MP", "HP", "UHP"];

/// Z-axis operating-mode codes for each entry of [`PMODE_STRINGS`].
pub const PMODE_BITS: [u8; 4] = [0, 1, 2, 3];

/// CTRL_REG3 system-mode code for continuous conversion.
pub const MD_CONTINUOUS: u8 = 0x00;
/// CTRL_REG3 system-mode code for single conversion.
pub const MD_SINGLE: u8 = 0x01;

/// Registers with a typed field layout know their own bus address.
pub trait Register: Into<u8> {
    /// Register address on the bus.
    const ADDR: u8;
}

/// CTRL_REG1: self test, XY operating mode and output data rate.
#[bitsize(8)]
#[derive(DebugBits, FromBits, PartialEq)]
pub struct CtrlReg1 {
    pub self_test: u1,
    pub fast_odr: u1,
    pub output_data_rate: u3,
    pub xy_operating_mode: u2,
    pub temp_enable: u1,
}

/// CTRL_REG2: full scale, reboot and soft reset.
#[bitsize(8)]
#[derive(DebugBits, FromBits, PartialEq)]
pub struct CtrlReg2 {
    reserved: u2,
    pub soft_reset: u1,
    pub reboot: u1,
    reserved: u1,
    pub full_scale: u2,
    reserved: u1,
}

/// CTRL_REG3: system operating mode and SPI wiring.
#[bitsize(8)]
#[derive(DebugBits, FromBits, PartialEq)]
pub struct CtrlReg3 {
    pub system_mode: u2,
    pub spi_3wire: u1,
    reserved: u2,
    pub low_power: u1,
    reserved: u2,
}

/// CTRL_REG4: Z-axis operating mode and data endianness.
#[bitsize(8)]
#[derive(DebugBits, FromBits, PartialEq)]
pub struct CtrlReg4 {
    reserved: u1,
    pub big_endian: u1,
    pub z_operating_mode: u2,
    reserved: u4,
}

/// CTRL_REG5: block data update and fast read.
#[bitsize(8)]
#[derive(DebugBits, FromBits, PartialEq)]
pub struct CtrlReg5 {
    reserved: u6,
    pub block_data_update: u1,
    pub fast_read: u1,
}

/// INT_CFG: per-axis interrupt enables, polarity and latching. The
/// `always_set` bit reads as 1 and must stay set on every write.
#[bitsize(8)]
#[derive(DebugBits, FromBits, PartialEq)]
pub struct IntCfg {
    pub int_enable: u1,
    pub latch: u1,
    pub active_high: u1,
    pub always_set: u1,
    reserved: u1,
    pub z_enable: u1,
    pub y_enable: u1,
    pub x_enable: u1,
}

impl IntCfg {
    /// Every interrupt source disabled; only the always-set bit remains.
    pub fn disabled() -> Self {
        let mut cfg = Self::from(0u8);
        cfg.set_always_set(u1::new(1));
        cfg
    }
}

impl Register for CtrlReg2 {
    const ADDR: u8 = CTRL_REG2;
}

impl Register for IntCfg {
    const ADDR: u8 = INT_CFG;
}
