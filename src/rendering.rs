use heapless::String;
use ufmt::uwrite;

use crate::state::{AirQualityReading, AirQualityStatus, EnvironmentalReading};

/// Widest character display supported (HD44780-class controllers top out at 40).
pub const MAX_COLUMNS: usize = 40;

/// Row holding the environmental line.
pub const ENVIRONMENT_ROW: u8 = 0;
/// Row holding the air-quality line.
pub const AIR_QUALITY_ROW: u8 = 1;

// Big enough for any i32/u32/u16 the formatters print.
type Scratch = String<64>;

/// Display on/off, cursor and cursor blink flags applied at initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayControl {
    pub display: bool,
    pub cursor: bool,
    pub blink: bool,
}

/// A character display addressed by row.
pub trait TextSink {
    type Error: core::fmt::Debug;

    fn initialize(&mut self, control: DisplayControl) -> Result<(), Self::Error>;

    /// Number of character columns per row.
    fn width(&self) -> usize;

    /// Writes `text` starting at column 0 of `row`.
    fn write_line(&mut self, row: u8, text: &str) -> Result<(), Self::Error>;
}

/// One display row worth of text.
///
/// Always exactly `width` characters long: [`TextLine::set`] cuts longer text
/// and pads shorter text with spaces, so writing a line replaces everything
/// that was on the row before.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextLine {
    text: String<MAX_COLUMNS>,
    width: usize,
}

impl TextLine {
    /// A line of `width` columns (capped at [`MAX_COLUMNS`]) holding `text`.
    pub fn new(width: usize, text: &str) -> Self {
        let mut line = Self {
            text: String::new(),
            width: width.min(MAX_COLUMNS),
        };
        line.set(text);
        line
    }

    /// Replaces the whole line with `text`, fitted to the width.
    pub fn set(&mut self, text: &str) {
        self.text.clear();
        let mut columns = 0;
        for c in text.chars().take(self.width) {
            // Capacity is in bytes, wide characters can run out of room first.
            if self.text.push(c).is_err() {
                break;
            }
            columns += 1;
        }
        while columns < self.width && self.text.push(' ').is_ok() {
            columns += 1;
        }
    }

    /// Like [`TextLine::set`], but a non-empty `suffix` always survives: when
    /// `"{body} {suffix}"` does not fit, `body` is cut instead.
    pub fn set_with_suffix(&mut self, body: &str, suffix: &str) {
        if suffix.is_empty() {
            self.set(body);
            return;
        }
        let room = self.width.saturating_sub(suffix.chars().count() + 1);
        let mut joined = Scratch::new();
        for c in body.chars().take(room) {
            if joined.push(c).is_err() {
                break;
            }
        }
        let _ = joined.push(' ');
        let _ = joined.push_str(suffix);
        self.set(&joined);
    }

    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// `"{t}C | {h}% | {p}kPa"` in whole units.
pub fn format_environment(reading: &EnvironmentalReading) -> Scratch {
    let mut line = Scratch::new();
    let _ = uwrite!(
        line,
        "{}C | {}% | {}kPa",
        reading.whole_degrees(),
        reading.whole_percent(),
        reading.whole_kilopascals()
    );
    line
}

/// `"CO2 {ppm} TV {ppb}"`. The status goes after it through
/// [`TextLine::set_with_suffix`] with [`status_suffix`].
pub fn format_air_quality(reading: &AirQualityReading) -> Scratch {
    let mut line = Scratch::new();
    let _ = uwrite!(line, "CO2 {} TV {}", reading.co2, reading.voc);
    line
}

pub fn status_suffix(status: AirQualityStatus) -> &'static str {
    match status {
        AirQualityStatus::Ok => "",
        AirQualityStatus::Stale => "stale",
        AirQualityStatus::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_padded_to_width() {
        let line = TextLine::new(16, "abc");
        assert_eq!(line.as_str(), "abc             ");
        assert_eq!(line.as_str().len(), 16);
    }

    #[test]
    fn long_text_is_cut_at_width() {
        let mut line = TextLine::new(8, "");
        line.set("CO2 400 TV 12 stale");
        assert_eq!(line.as_str(), "CO2 400 ");
    }

    #[test]
    fn set_replaces_previous_content() {
        let mut line = TextLine::new(10, "starting up");
        line.set("ok");
        assert_eq!(line.as_str(), "ok        ");
    }

    #[test]
    fn width_is_capped() {
        let line = TextLine::new(200, "x");
        assert_eq!(line.width(), MAX_COLUMNS);
        assert_eq!(line.as_str().len(), MAX_COLUMNS);
    }

    #[test]
    fn wide_characters_stop_at_capacity() {
        let wide: std::string::String = core::iter::repeat('é').take(MAX_COLUMNS).collect();
        let line = TextLine::new(MAX_COLUMNS, &wide);
        assert_eq!(line.as_str().chars().count(), MAX_COLUMNS / 2);
        assert_eq!(line.as_str().len(), MAX_COLUMNS);
    }

    #[test]
    fn environment_line_uses_whole_units() {
        let reading = EnvironmentalReading {
            temperature: 2_345,
            humidity: 45_000,
            pressure: 101_325,
        };
        assert_eq!(format_environment(&reading).as_str(), "23C | 43% | 101kPa");
    }

    #[test]
    fn negative_temperature_truncates_toward_zero() {
        let reading = EnvironmentalReading {
            temperature: -1_250,
            humidity: 1_024,
            pressure: 99_000,
        };
        assert_eq!(format_environment(&reading).as_str(), "-12C | 1% | 99kPa");
    }

    #[test]
    fn air_quality_body_has_both_numbers() {
        let reading = AirQualityReading {
            co2: 612,
            voc: 31,
            status: AirQualityStatus::Error,
        };
        assert_eq!(format_air_quality(&reading).as_str(), "CO2 612 TV 31");
    }

    #[test]
    fn suffix_follows_body_when_it_fits() {
        let mut line = TextLine::new(20, "");
        line.set_with_suffix("CO2 612 TV 31", "error");
        assert_eq!(line.as_str(), "CO2 612 TV 31 error ");

        line.set_with_suffix("CO2 612 TV 31", "");
        assert_eq!(line.as_str(), "CO2 612 TV 31       ");
    }

    #[test]
    fn suffix_survives_a_narrow_display() {
        let mut line = TextLine::new(16, "");
        line.set_with_suffix("CO2 612 TV 120", "error");
        assert_eq!(line.as_str(), "CO2 612 TV error");

        line.set_with_suffix("CO2 1234 TV 1200", "stale");
        assert_eq!(line.as_str(), "CO2 1234 T stale");
    }
}
