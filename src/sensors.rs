use crate::state::EnvironmentalReading;
use crate::timer::Duration;

/// Oversampling/filter presets for the environmental sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SamplingProfile {
    /// 1x oversampling on every channel, IIR filter off. Lowest power,
    /// meant for one forced conversion every few seconds.
    WeatherMonitoring,
    /// 1x humidity and temperature, pressure skipped, IIR filter off.
    /// Shortest conversion.
    HumiditySensing,
}

/// Measurement cadence of the air-quality sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveMode {
    Idle,
    Every1s,
    Every10s,
    Every60s,
    Every250ms,
}

/// Outcome of a successful air-quality refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Freshness {
    /// A new sample was read.
    Fresh,
    /// The device had no new sample yet; the latest values are the old ones.
    Stale,
}

/// A sensor that measures temperature, humidity and pressure on request.
pub trait EnvironmentalSource {
    type Error: core::fmt::Debug;

    fn configure(&mut self, profile: SamplingProfile) -> Result<(), Self::Error>;

    /// Starts a single conversion. The result is ready after
    /// [`EnvironmentalSource::conversion_delay`].
    fn begin_forced_conversion(&mut self) -> Result<(), Self::Error>;

    /// Time one forced conversion takes with the configured profile.
    fn conversion_delay(&self) -> Duration;

    /// Reads the result of the last conversion.
    fn latest_reading(&mut self) -> Result<EnvironmentalReading, Self::Error>;
}

/// A gas sensor that corrects its output with ambient humidity/temperature.
pub trait AirQualitySource {
    type Error: core::fmt::Debug;

    fn configure(&mut self, mode: DriveMode) -> Result<(), Self::Error>;

    /// Feeds the compensation input. `humidity` is in 1/512 %RH, `temperature`
    /// in 1/512 °C offset by +25 °C.
    fn set_compensation(&mut self, humidity: u16, temperature: u16) -> Result<(), Self::Error>;

    fn refresh(&mut self) -> Result<Freshness, Self::Error>;

    /// CO2 equivalent in ppm from the last successful refresh.
    fn latest_co2(&self) -> u16;

    /// Total VOC in ppb from the last successful refresh.
    fn latest_voc(&self) -> u16;
}
