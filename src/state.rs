//! Measurement state shared by the tasks.
//!
//! Only the latest value of each reading is kept. The two text lines are
//! re-rendered whenever their reading changes, so the render task only has
//! to copy them out.

use crate::rendering::{format_air_quality, format_environment, status_suffix, TextLine};

/// One environmental sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvironmentalReading {
    /// Hundredths of a degree Celsius.
    pub temperature: i32,
    /// 1/1024 of a percent relative humidity.
    pub humidity: u32,
    /// Pascal.
    pub pressure: u32,
}

impl EnvironmentalReading {
    pub fn whole_degrees(&self) -> i32 {
        self.temperature / 100
    }

    pub fn whole_percent(&self) -> u32 {
        self.humidity / 1024
    }

    pub fn whole_kilopascals(&self) -> u32 {
        self.pressure / 1000
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AirQualityStatus {
    #[default]
    Ok,
    /// The sensor had nothing new since the last refresh.
    Stale,
    /// The last refresh failed; the numbers are from an earlier one.
    Error,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AirQualityReading {
    /// CO2 equivalent, ppm.
    pub co2: u16,
    /// Total volatile organic compounds, ppb.
    pub voc: u16,
    pub status: AirQualityStatus,
}

/// Everything the tasks read and write.
pub struct Readings {
    /// `None` until the first harvest.
    environment: Option<EnvironmentalReading>,
    air_quality: Option<AirQualityReading>,
    environment_line: TextLine,
    air_quality_line: TextLine,
}

impl Readings {
    /// Empty readings with placeholder lines sized for a `width`-column display.
    pub fn new(width: usize, environment_placeholder: &str, air_quality_placeholder: &str) -> Self {
        Self {
            environment: None,
            air_quality: None,
            environment_line: TextLine::new(width, environment_placeholder),
            air_quality_line: TextLine::new(width, air_quality_placeholder),
        }
    }

    pub fn environment(&self) -> Option<&EnvironmentalReading> {
        self.environment.as_ref()
    }

    pub fn air_quality(&self) -> Option<&AirQualityReading> {
        self.air_quality.as_ref()
    }

    pub fn environment_line(&self) -> &TextLine {
        &self.environment_line
    }

    pub fn air_quality_line(&self) -> &TextLine {
        &self.air_quality_line
    }

    /// Stores a new environmental sample and re-renders its line.
    pub fn record_environment(&mut self, reading: EnvironmentalReading) {
        self.environment = Some(reading);
        self.environment_line.set(&format_environment(&reading));
    }

    /// Stores a new air-quality sample and re-renders its line.
    pub fn record_air_quality(&mut self, reading: AirQualityReading) {
        self.air_quality = Some(reading);
        self.air_quality_line
            .set_with_suffix(&format_air_quality(&reading), status_suffix(reading.status));
    }

    /// Marks the air-quality sample as failed, keeping the last numbers.
    pub fn record_air_quality_error(&mut self) {
        let previous = self.air_quality.unwrap_or_default();
        self.record_air_quality(AirQualityReading {
            status: AirQualityStatus::Error,
            ..previous
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_fill_the_lines_until_data_arrives() {
        let readings = Readings::new(20, "starting up, wait", "micro meteo station");
        assert_eq!(readings.environment(), None);
        assert_eq!(readings.environment_line().as_str(), "starting up, wait   ");
        assert_eq!(readings.air_quality_line().as_str(), "micro meteo station ");
    }

    #[test]
    fn error_keeps_previous_numbers() {
        let mut readings = Readings::new(20, "", "");
        readings.record_air_quality(AirQualityReading {
            co2: 850,
            voc: 120,
            status: AirQualityStatus::Ok,
        });
        readings.record_air_quality_error();

        let reading = readings.air_quality().unwrap();
        assert_eq!((reading.co2, reading.voc), (850, 120));
        assert_eq!(reading.status, AirQualityStatus::Error);
        assert_eq!(readings.air_quality_line().as_str(), "CO2 850 TV 120 error");
    }

    #[test]
    fn error_before_any_sample_shows_zeros() {
        let mut readings = Readings::new(16, "", "");
        readings.record_air_quality_error();
        assert_eq!(readings.air_quality_line().as_str(), "CO2 0 TV 0 error");
    }
}
