//! CCS811 air-quality sensor over a blocking I2C bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use thiserror_no_std::Error;

use crate::sensors::{AirQualitySource, DriveMode, Freshness};

// =============================================================================
// I2C Addresses
// =============================================================================

/// ADDR pin high. Pulled low the chip answers on 0x5A instead.
pub const I2C_ADDR_SECONDARY: u8 = 0x5B;

// =============================================================================
// Registers
// =============================================================================

pub const ADDR_STATUS: u8 = 0x00;
pub const ADDR_MEAS_MODE: u8 = 0x01;
pub const ADDR_ALG_RESULT_DATA: u8 = 0x02;
pub const ADDR_ENV_DATA: u8 = 0x05;
pub const ADDR_HW_ID: u8 = 0x20;
pub const ADDR_ERROR_ID: u8 = 0xE0;
pub const ADDR_APP_START: u8 = 0xF4;

pub const HW_ID: u8 = 0x81;

// STATUS bits
const STATUS_ERROR: u8 = 0x01;
const STATUS_DATA_READY: u8 = 0x08;
const STATUS_APP_VALID: u8 = 0x10;
const STATUS_FW_MODE: u8 = 0x80;

/// The application needs a moment after APP_START before it answers.
const APP_START_DELAY_MS: u32 = 2;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ccs811Error<E> {
    #[error("I2C error: {0:?}")]
    Bus(E),
    #[error("Unexpected hardware id {0:#x}")]
    WrongHardwareId(u8),
    #[error("No valid application firmware")]
    AppNotValid,
    #[error("Sensor stayed in boot mode")]
    NotInAppMode,
    #[error("Sensor reported error {0:#x}")]
    Device(u8),
}

fn drive_mode_bits(mode: DriveMode) -> u8 {
    let mode = match mode {
        DriveMode::Idle => 0,
        DriveMode::Every1s => 1,
        DriveMode::Every10s => 2,
        DriveMode::Every60s => 3,
        DriveMode::Every250ms => 4,
    };
    mode << 4
}

pub struct Ccs811<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    co2: u16,
    voc: u16,
}

impl<I: I2c, D: DelayNs> Ccs811<I, D> {
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            co2: 0,
            voc: 0,
        }
    }

    /// Checks the chip and moves it from boot to application mode.
    fn start_application(&mut self) -> Result<(), Ccs811Error<I::Error>> {
        let hw_id = self.read_register(ADDR_HW_ID)?;
        if hw_id != HW_ID {
            return Err(Ccs811Error::WrongHardwareId(hw_id));
        }

        if self.read_register(ADDR_STATUS)? & STATUS_APP_VALID == 0 {
            return Err(Ccs811Error::AppNotValid);
        }

        self.i2c
            .write(self.address, &[ADDR_APP_START])
            .map_err(Ccs811Error::Bus)?;
        self.delay.delay_ms(APP_START_DELAY_MS);

        if self.read_register(ADDR_STATUS)? & STATUS_FW_MODE == 0 {
            return Err(Ccs811Error::NotInAppMode);
        }
        Ok(())
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Ccs811Error<I::Error>> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut value)
            .map_err(Ccs811Error::Bus)?;
        Ok(value[0])
    }

    fn device_error(&mut self) -> Ccs811Error<I::Error> {
        match self.read_register(ADDR_ERROR_ID) {
            Ok(id) => Ccs811Error::Device(id),
            Err(e) => e,
        }
    }
}

impl<I, D> AirQualitySource for Ccs811<I, D>
where
    I: I2c,
    D: DelayNs,
{
    type Error = Ccs811Error<I::Error>;

    /// Boots the application firmware, then sets the drive mode.
    fn configure(&mut self, mode: DriveMode) -> Result<(), Self::Error> {
        self.start_application()?;
        self.i2c
            .write(self.address, &[ADDR_MEAS_MODE, drive_mode_bits(mode)])
            .map_err(Ccs811Error::Bus)
    }

    fn set_compensation(&mut self, humidity: u16, temperature: u16) -> Result<(), Self::Error> {
        let [h_hi, h_lo] = humidity.to_be_bytes();
        let [t_hi, t_lo] = temperature.to_be_bytes();
        self.i2c
            .write(self.address, &[ADDR_ENV_DATA, h_hi, h_lo, t_hi, t_lo])
            .map_err(Ccs811Error::Bus)
    }

    fn refresh(&mut self) -> Result<Freshness, Self::Error> {
        let status = self.read_register(ADDR_STATUS)?;
        if status & STATUS_ERROR != 0 {
            return Err(self.device_error());
        }
        if status & STATUS_DATA_READY == 0 {
            return Ok(Freshness::Stale);
        }

        // eCO2 (2), TVOC (2), STATUS, ERROR_ID, RAW_DATA (2)
        let mut data = [0u8; 8];
        self.i2c
            .write_read(self.address, &[ADDR_ALG_RESULT_DATA], &mut data)
            .map_err(Ccs811Error::Bus)?;
        if data[4] & STATUS_ERROR != 0 {
            return Err(Ccs811Error::Device(data[5]));
        }

        self.co2 = u16::from_be_bytes([data[0], data[1]]);
        self.voc = u16::from_be_bytes([data[2], data[3]]);
        Ok(Freshness::Fresh)
    }

    fn latest_co2(&self) -> u16 {
        self.co2
    }

    fn latest_voc(&self) -> u16 {
        self.voc
    }
}
