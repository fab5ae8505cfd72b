//! The station: devices, readings and the tasks that connect them.
//!
//! Measurement chain, expressed purely through timers:
//!
//! ```text
//! Trigger --(conversion delay)--> Harvest --> readings.environment
//!                                                   |
//! Refresh (first fire after the first Harvest) <----+--> readings.air_quality
//!
//! Render (own cadence) --> display rows 0 and 1
//! ```
//!
//! Harvest is a one-shot posted by Trigger, `conversion_delay` after the
//! conversion was started, so it can never read an unfinished conversion.
//! Refresh's first delay is checked at startup to land strictly after the
//! first Harvest, and it still refuses to compensate with data that does not
//! exist yet. Text lines are rendered when their data arrives; Render only
//! copies them to the display.

use embedded_hal::digital::StatefulOutputPin;

use crate::compensation::Compensation;
use crate::config::StationConfig;
use crate::error::StartupError;
use crate::rendering::{TextSink, AIR_QUALITY_ROW, ENVIRONMENT_ROW};
use crate::sensors::{AirQualitySource, EnvironmentalSource, Freshness};
use crate::state::{AirQualityReading, AirQualityStatus, Readings};
use crate::timer::{Clock, Schedule, Scheduler, Timers};

/// Number of timers the station registers.
pub const TASK_COUNT: usize = 4;

/// The station's tasks, in registration (tie-break) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Task {
    /// Start a forced environmental conversion and post [`Task::Harvest`].
    Trigger,
    /// Read the finished conversion and render the environmental line.
    Harvest,
    /// Compensate and read the air-quality sensor, render its line.
    Refresh,
    /// Push both lines to the display and toggle the indicator.
    Render,
}

pub type StationScheduler = Scheduler<Task, TASK_COUNT>;

type StationStartupError<E, A, S> = StartupError<
    <E as EnvironmentalSource>::Error,
    <A as AirQualitySource>::Error,
    <S as TextSink>::Error,
>;

pub struct Station<E, A, S, L> {
    environment: E,
    air_quality: A,
    display: S,
    indicator: L,
    readings: Readings,
}

impl<E, A, S, L> Station<E, A, S, L>
where
    E: EnvironmentalSource,
    A: AirQualitySource,
    S: TextSink,
    L: StatefulOutputPin,
{
    /// Configures every device and wires up the timers.
    ///
    /// Order: display, environmental sensor, air-quality sensor, then the
    /// cadence check against the environmental sensor's conversion delay.
    /// Trigger, Refresh and Render are posted at `clock.now()`; Harvest is
    /// only ever posted by Trigger.
    pub fn start<C: Clock>(
        mut environment: E,
        mut air_quality: A,
        mut display: S,
        indicator: L,
        config: &StationConfig,
        clock: &C,
    ) -> Result<(Self, StationScheduler), StationStartupError<E, A, S>> {
        display
            .initialize(config.display)
            .map_err(StartupError::Display)?;
        environment
            .configure(config.sampling)
            .map_err(StartupError::Environmental)?;
        air_quality
            .configure(config.drive_mode)
            .map_err(StartupError::AirQuality)?;

        let conversion_delay = environment.conversion_delay();
        info!("Conversion delay: {} ms", conversion_delay.ticks());
        if !config.is_ordered(conversion_delay) {
            error!("Cadence cannot fit a {} ms conversion", conversion_delay.ticks());
            return Err(StartupError::Unordered);
        }

        let mut scheduler = StationScheduler::default();
        scheduler.register(Task::Trigger, config.trigger)?;
        scheduler.register(Task::Harvest, Schedule::OneShot { delay: conversion_delay })?;
        scheduler.register(Task::Refresh, config.refresh)?;
        scheduler.register(Task::Render, config.render)?;

        let now = clock.now();
        for task in [Task::Trigger, Task::Refresh, Task::Render] {
            scheduler.post(task, now)?;
        }

        let readings = Readings::new(
            display.width(),
            config.environment_placeholder,
            config.air_quality_placeholder,
        );

        Ok((
            Self {
                environment,
                air_quality,
                display,
                indicator,
                readings,
            },
            scheduler,
        ))
    }

    /// Runs one task to completion.
    pub fn dispatch<C: Clock>(
        &mut self,
        task: Task,
        timers: &mut Timers<'_, Task, TASK_COUNT>,
        clock: &C,
    ) {
        trace!("{} at {} ms", task, clock.now().ticks());
        match task {
            Task::Trigger => self.trigger(timers, clock),
            Task::Harvest => self.harvest(),
            Task::Refresh => self.refresh(),
            Task::Render => self.render(),
        }
    }

    /// Hands control to the scheduler until power-off.
    pub fn run_forever<C: Clock>(mut self, mut scheduler: StationScheduler, clock: &mut C) -> ! {
        info!("Station running");
        scheduler.run_forever(clock, |task, timers, clock| {
            self.dispatch(task, timers, clock)
        })
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    pub fn environment(&self) -> &E {
        &self.environment
    }

    pub fn air_quality(&self) -> &A {
        &self.air_quality
    }

    pub fn display(&self) -> &S {
        &self.display
    }

    pub fn indicator(&self) -> &L {
        &self.indicator
    }

    fn trigger<C: Clock>(&mut self, timers: &mut Timers<'_, Task, TASK_COUNT>, clock: &C) {
        if self.environment.begin_forced_conversion().is_err() {
            warn!("Could not start a conversion, keeping the last reading");
            return;
        }
        // Counted from after the command went out, not from the fire time.
        match timers.post(Task::Harvest, clock.now()) {
            Ok(true) => {}
            Ok(false) => debug!("Harvest already pending"),
            Err(_) => error!("Harvest has no timer"),
        }
    }

    fn harvest(&mut self) {
        match self.environment.latest_reading() {
            Ok(reading) => self.readings.record_environment(reading),
            Err(_) => warn!("Environmental read failed, keeping the last reading"),
        }
    }

    fn refresh(&mut self) {
        match self.readings.environment() {
            Some(reading) => {
                let compensation = Compensation::from(reading);
                if self
                    .air_quality
                    .set_compensation(compensation.humidity, compensation.temperature)
                    .is_err()
                {
                    warn!("Could not write compensation data");
                }
            }
            None => warn!("No environmental reading yet, refreshing uncompensated"),
        }

        let status = match self.air_quality.refresh() {
            Ok(Freshness::Fresh) => AirQualityStatus::Ok,
            Ok(Freshness::Stale) => {
                warn!("Air-quality data is stale");
                AirQualityStatus::Stale
            }
            Err(_) => {
                warn!("Air-quality refresh failed");
                self.readings.record_air_quality_error();
                return;
            }
        };
        self.readings.record_air_quality(AirQualityReading {
            co2: self.air_quality.latest_co2(),
            voc: self.air_quality.latest_voc(),
            status,
        });
    }

    fn render(&mut self) {
        let lines = [
            (ENVIRONMENT_ROW, self.readings.environment_line()),
            (AIR_QUALITY_ROW, self.readings.air_quality_line()),
        ];
        for (row, line) in lines {
            if self.display.write_line(row, line.as_str()).is_err() {
                warn!("Display write failed on row {}", row);
            }
            info!("{}", line.as_str());
        }
        if self.indicator.toggle().is_err() {
            warn!("Indicator toggle failed");
        }
    }
}
