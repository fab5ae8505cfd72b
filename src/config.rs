use crate::rendering::DisplayControl;
use crate::sensors::{DriveMode, SamplingProfile};
use crate::timer::{Duration, Schedule};

pub const TRIGGER_PERIOD_MS: u64 = 5_000;
/// Gives the first environmental conversion time to land before the
/// air-quality sensor needs it.
pub const FIRST_REFRESH_DELAY_MS: u64 = 10_000;
pub const REFRESH_PERIOD_MS: u64 = 60_000;
pub const RENDER_PERIOD_MS: u64 = 1_000;

/// Fixed station wiring, decided at build time.
/// trigger: when environmental conversions start
/// refresh: when the air-quality sensor is compensated and read
/// render: when the display is flushed
/// sampling: environmental sensor preset
/// drive_mode: air-quality sensor measurement cadence
/// display: display flags set at startup
/// environment_placeholder / air_quality_placeholder: text shown until data arrives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StationConfig {
    pub trigger: Schedule,
    pub refresh: Schedule,
    pub render: Schedule,
    pub sampling: SamplingProfile,
    pub drive_mode: DriveMode,
    pub display: DisplayControl,
    pub environment_placeholder: &'static str,
    pub air_quality_placeholder: &'static str,
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            trigger: Schedule::periodic(0, TRIGGER_PERIOD_MS),
            refresh: Schedule::periodic(FIRST_REFRESH_DELAY_MS, REFRESH_PERIOD_MS),
            render: Schedule::periodic(0, RENDER_PERIOD_MS),
            sampling: SamplingProfile::WeatherMonitoring,
            drive_mode: DriveMode::Every60s,
            display: DisplayControl {
                display: true,
                cursor: false,
                blink: false,
            },
            environment_placeholder: "starting up, wait",
            air_quality_placeholder: "micro meteo station",
        }
    }
}

impl StationConfig {
    /// Whether the timers alone keep the measurement chain in order for a
    /// sensor needing `conversion_delay` per sample:
    /// - a conversion finishes before the next one is triggered
    /// - the first refresh comes strictly after the first harvest
    pub fn is_ordered(&self, conversion_delay: Duration) -> bool {
        let Some(trigger_period) = self.trigger.period() else {
            return false;
        };
        conversion_delay < trigger_period
            && self.refresh.delay() > self.trigger.delay() + conversion_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cadence_is_ordered_for_realistic_sensors() {
        let config = StationConfig::default();
        assert!(config.is_ordered(Duration::from_ticks(10)));
        assert!(config.is_ordered(Duration::from_ticks(4_999)));
    }

    #[test]
    fn slow_conversion_breaks_ordering() {
        let config = StationConfig::default();
        assert!(!config.is_ordered(Duration::from_ticks(TRIGGER_PERIOD_MS)));
    }

    #[test]
    fn early_refresh_breaks_ordering() {
        let config = StationConfig {
            refresh: Schedule::periodic(50, REFRESH_PERIOD_MS),
            ..StationConfig::default()
        };
        assert!(!config.is_ordered(Duration::from_ticks(50)));
        assert!(config.is_ordered(Duration::from_ticks(49)));
    }

    #[test]
    fn one_shot_trigger_is_rejected() {
        let config = StationConfig {
            trigger: Schedule::one_shot(0),
            ..StationConfig::default()
        };
        assert!(!config.is_ordered(Duration::from_ticks(1)));
    }
}
