#![no_std]
#![no_main]

use bme680::{
    Bme680, FieldDataCondition, I2CAddress, IIRFilterSize, OversamplingSetting, PowerMode,
    Settings, SettingsBuilder,
};
use cortex_m_rt::entry;
use defmt::*;
use defmt_rtt as _;
use embedded_hal::delay::DelayNs;
use hd44780_driver::bus::FourBitBus;
use hd44780_driver::{Cursor, CursorBlink, Display, DisplayMode, HD44780};
use i2c_pio::I2C as PioI2c;
use panic_probe as _;
use rp_pico::hal::Timer;

// Provide an alias for our BSP so we can switch targets quickly.
// Uncomment the BSP you included in Cargo.toml, the rest of the code does not need to change.
use rp_pico as bsp;

use bsp::hal::{
    clocks::{init_clocks_and_plls, Clock as _},
    pac,
    watchdog::Watchdog,
};
use micro_meteo::ccs811::{Ccs811, I2C_ADDR_SECONDARY};
use micro_meteo::config::StationConfig;
use micro_meteo::rendering::{DisplayControl, TextSink};
use micro_meteo::sensors::{EnvironmentalSource, SamplingProfile};
use micro_meteo::state::EnvironmentalReading;
use micro_meteo::station::Station;
use micro_meteo::timer::{Clock, Duration, Instant};
use rp_pico::hal;
use rp_pico::hal::fugit::RateExtU32;
use rp_pico::hal::gpio::bank0::{Gpio0, Gpio1, Gpio2, Gpio3, Gpio4, Gpio5, Gpio8, Gpio9};
use rp_pico::hal::gpio::{FunctionI2C, FunctionNull, FunctionSio, Pin, PullDown, PullUp, SioOutput};
use rp_pico::hal::pio::{PIOExt, SM0};
use rp_pico::pac::PIO0;

/// 20x2 character LCD
const LCD_COLUMNS: usize = 20;
/// DDRAM address of the first column of each row
const LCD_ROW_ADDRESSES: [u8; 2] = [0x00, 0x40];

const BUS_FREQUENCY_KHZ: u32 = 100;

type Bme<'a> = Bme680<
    PioI2c<'a, PIO0, SM0, Pin<Gpio8, FunctionNull, PullDown>, Pin<Gpio9, FunctionNull, PullDown>>,
    Timer,
>;

type LcdPin<I> = Pin<I, FunctionSio<SioOutput>, PullDown>;
type Lcd = HD44780<
    FourBitBus<LcdPin<Gpio0>, LcdPin<Gpio1>, LcdPin<Gpio2>, LcdPin<Gpio3>, LcdPin<Gpio4>, LcdPin<Gpio5>>,
>;

#[derive(Debug, Format)]
enum SensorError {
    Bus,
    /// The conversion had not finished when it was read.
    NoNewData,
}

#[derive(Debug, Format)]
struct DisplayError;

/// BME680 in forced mode as the station's environmental source.
struct Bme680Source<'a> {
    bme: Bme<'a>,
    delay: Timer,
    conversion_delay: Duration,
}

impl<'a> Bme680Source<'a> {
    fn new(bme: Bme<'a>, delay: Timer) -> Self {
        Self {
            bme,
            delay,
            conversion_delay: Duration::from_ticks(0),
        }
    }
}

/// Oversampling and filter settings for a profile. Gas heating stays off,
/// only temperature, humidity and pressure are used.
fn profile_settings(profile: SamplingProfile) -> Settings {
    let (temperature, humidity, pressure) = match profile {
        SamplingProfile::WeatherMonitoring => (
            OversamplingSetting::OS1x,
            OversamplingSetting::OS1x,
            OversamplingSetting::OS1x,
        ),
        SamplingProfile::HumiditySensing => (
            OversamplingSetting::OS1x,
            OversamplingSetting::OS1x,
            OversamplingSetting::OSNone,
        ),
    };
    SettingsBuilder::new()
        .with_temperature_oversampling(temperature)
        .with_humidity_oversampling(humidity)
        .with_pressure_oversampling(pressure)
        .with_temperature_filter(IIRFilterSize::Size0)
        .with_run_gas(false)
        .build()
}

impl EnvironmentalSource for Bme680Source<'_> {
    type Error = SensorError;

    fn configure(&mut self, profile: SamplingProfile) -> Result<(), SensorError> {
        let settings = profile_settings(profile);
        let profile_duration = self
            .bme
            .get_profile_dur(&settings.0)
            .map_err(|_| SensorError::Bus)?;
        self.bme
            .set_sensor_settings(&mut self.delay, settings)
            .map_err(|_| SensorError::Bus)?;
        // Round up, reading a millisecond late is harmless
        self.conversion_delay = Duration::from_ticks(profile_duration.as_millis() as u64 + 1);
        Ok(())
    }

    fn begin_forced_conversion(&mut self) -> Result<(), SensorError> {
        self.bme
            .set_sensor_mode(&mut self.delay, PowerMode::ForcedMode)
            .map_err(|_| SensorError::Bus)
    }

    fn conversion_delay(&self) -> Duration {
        self.conversion_delay
    }

    fn latest_reading(&mut self) -> Result<EnvironmentalReading, SensorError> {
        let (data, condition) = self
            .bme
            .get_sensor_data(&mut self.delay)
            .map_err(|_| SensorError::Bus)?;
        if matches!(condition, FieldDataCondition::Unchanged) {
            return Err(SensorError::NoNewData);
        }
        Ok(EnvironmentalReading {
            temperature: (data.temperature_celsius() * 100.0) as i32,
            humidity: (data.humidity_percent() * 1024.0) as u32,
            pressure: (data.pressure_hpa() * 100.0) as u32,
        })
    }
}

/// HD44780 character LCD as the station's text sink.
struct LcdSink {
    lcd: Lcd,
    delay: Timer,
}

impl TextSink for LcdSink {
    type Error = DisplayError;

    fn initialize(&mut self, control: DisplayControl) -> Result<(), DisplayError> {
        let mode = DisplayMode {
            display: if control.display { Display::On } else { Display::Off },
            cursor_visibility: if control.cursor {
                Cursor::Visible
            } else {
                Cursor::Invisible
            },
            cursor_blink: if control.blink {
                CursorBlink::On
            } else {
                CursorBlink::Off
            },
        };
        self.lcd.reset(&mut self.delay).map_err(|_| DisplayError)?;
        self.lcd.clear(&mut self.delay).map_err(|_| DisplayError)?;
        self.lcd
            .set_display_mode(mode, &mut self.delay)
            .map_err(|_| DisplayError)
    }

    fn width(&self) -> usize {
        LCD_COLUMNS
    }

    fn write_line(&mut self, row: u8, text: &str) -> Result<(), DisplayError> {
        let address = *LCD_ROW_ADDRESSES.get(row as usize).ok_or(DisplayError)?;
        self.lcd
            .set_cursor_pos(address, &mut self.delay)
            .map_err(|_| DisplayError)?;
        self.lcd
            .write_str(text, &mut self.delay)
            .map_err(|_| DisplayError)
    }
}

/// Milliseconds from the RP2040's free-running microsecond timer.
struct PicoClock {
    timer: Timer,
}

impl Clock for PicoClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.timer.get_counter().ticks() / 1_000)
    }

    fn sleep_until(&mut self, deadline: Instant) {
        let now = self.now();
        if deadline > now {
            let wait_ms = (deadline - now).ticks();
            self.timer.delay_ms(u32::try_from(wait_ms).unwrap_or(u32::MAX));
        }
    }
}

#[entry]
fn main() -> ! {
    info!("Micro meteo starting");
    // Grab our singleton objects
    let mut pac = pac::Peripherals::take().unwrap();

    // Set up the watchdog driver - needed by the clock setup code
    let mut watchdog = Watchdog::new(pac.WATCHDOG);

    // Configure the clocks
    //
    // The default is to generate a 125 MHz system clock
    let clocks = init_clocks_and_plls(
        rp_pico::XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    // The single-cycle I/O block controls our GPIO pins
    let sio = hal::Sio::new(pac.SIO);

    // Set the pins up according to their function on this particular board
    let pins = rp_pico::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    // BME680 on a PIO I2C bus
    let (mut pio, sm0, _, _, _) = pac.PIO0.split(&mut pac.RESETS);
    let i2c_pio = PioI2c::new(
        &mut pio,
        pins.gpio8,
        pins.gpio9,
        sm0,
        BUS_FREQUENCY_KHZ.kHz(),
        clocks.system_clock.freq(),
    );
    let bme = match Bme680::init(i2c_pio, &mut timer, I2CAddress::Secondary) {
        Ok(bme) => bme,
        Err(_) => defmt::panic!("BME680 not responding"),
    };

    // CCS811 on I2C1
    let sda: Pin<_, FunctionI2C, PullUp> = pins.gpio6.reconfigure();
    let scl: Pin<_, FunctionI2C, PullUp> = pins.gpio7.reconfigure();
    let i2c1 = hal::I2C::i2c1(
        pac.I2C1,
        sda,
        scl,
        BUS_FREQUENCY_KHZ.kHz(),
        &mut pac.RESETS,
        &clocks.system_clock,
    );

    // HD44780 in 4-bit mode
    let lcd = match HD44780::new_4bit(
        pins.gpio0.into_push_pull_output(),
        pins.gpio1.into_push_pull_output(),
        pins.gpio2.into_push_pull_output(),
        pins.gpio3.into_push_pull_output(),
        pins.gpio4.into_push_pull_output(),
        pins.gpio5.into_push_pull_output(),
        &mut timer,
    ) {
        Ok(lcd) => lcd,
        Err(_) => defmt::panic!("LCD setup failed"),
    };

    let led = pins.led.into_push_pull_output();

    let mut clock = PicoClock { timer };
    let started = Station::start(
        Bme680Source::new(bme, timer),
        Ccs811::new(i2c1, timer, I2C_ADDR_SECONDARY),
        LcdSink { lcd, delay: timer },
        led,
        &StationConfig::default(),
        &clock,
    );
    let (station, scheduler) = match started {
        Ok(started) => started,
        Err(e) => defmt::panic!("Startup failed: {}", Debug2Format(&e)),
    };

    info!("Micro meteo ready");
    station.run_forever(scheduler, &mut clock)
}
