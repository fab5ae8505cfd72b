//! Environmental data in the air-quality sensor's compensation encoding.
//!
//! The sensor takes humidity in 1/512 %RH and temperature in 1/512 °C with a
//! +25 °C offset, both unsigned 16 bit. Our readings store humidity in
//! 1/1024 %RH and temperature in 1/100 °C.

use crate::state::EnvironmentalReading;

/// Lowest temperature the offset encoding can carry, in 1/100 °C.
const TEMPERATURE_OFFSET: i32 = 2_500;

/// Compensation input for [`crate::sensors::AirQualitySource::set_compensation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Compensation {
    pub humidity: u16,
    pub temperature: u16,
}

impl From<&EnvironmentalReading> for Compensation {
    fn from(reading: &EnvironmentalReading) -> Self {
        Self {
            humidity: saturate(compensation_humidity(reading.humidity)),
            temperature: saturate(compensation_temperature(reading.temperature)),
        }
    }
}

/// 1/1024 %RH to 1/512 %RH, rounding down.
pub const fn compensation_humidity(humidity: u32) -> u32 {
    humidity / 2
}

/// 1/100 °C to offset 1/512 °C, rounding down.
///
/// Anything below -25 °C clamps to the encoding's zero. The shifted value is
/// scaled by 512/100, reduced to 128/25, multiplying before dividing.
pub const fn compensation_temperature(temperature: i32) -> u32 {
    if temperature < -TEMPERATURE_OFFSET {
        return 0;
    }
    let shifted = (temperature as i64 + TEMPERATURE_OFFSET as i64) as u64;
    let scaled = shifted * 128 / 25;
    if scaled > u32::MAX as u64 {
        u32::MAX
    } else {
        scaled as u32
    }
}

fn saturate(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
