//! Cooperative timer queue.
//!
//! The scheduler owns a fixed table of timers, one per task. Each timer is
//! either idle or armed with an absolute deadline. [`Scheduler::step`] sleeps
//! until the earliest deadline, disarms (or re-arms) that timer and hands the
//! task to the dispatcher. Exactly one task runs at a time and it always runs
//! to completion, which is what lets the tasks share state without locks.

use fugit::{MillisDurationU64, TimerInstantU64};
use heapless::Vec;

use crate::error::SchedulerError;

/// Milliseconds since boot.
pub type Instant = TimerInstantU64<1_000>;
/// Millisecond time span.
pub type Duration = MillisDurationU64;

/// How long an empty queue idles before looking again.
const IDLE_SLEEP_MS: u64 = 1_000;

/// Source of time for the scheduler.
pub trait Clock {
    /// Current time.
    fn now(&self) -> Instant;

    /// Block until `deadline`. Returns immediately if it already passed.
    fn sleep_until(&mut self, deadline: Instant);
}

/// When a task fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Schedule {
    /// Fires `delay` after being posted, then every `period`.
    Periodic { delay: Duration, period: Duration },
    /// Fires once, `delay` after being posted. Can be posted again afterwards.
    OneShot { delay: Duration },
}

impl Schedule {
    pub const fn periodic(delay_ms: u64, period_ms: u64) -> Self {
        Schedule::Periodic {
            delay: Duration::from_ticks(delay_ms),
            period: Duration::from_ticks(period_ms),
        }
    }

    pub const fn one_shot(delay_ms: u64) -> Self {
        Schedule::OneShot {
            delay: Duration::from_ticks(delay_ms),
        }
    }

    /// Time from posting to the first fire.
    pub const fn delay(&self) -> Duration {
        match *self {
            Schedule::Periodic { delay, .. } | Schedule::OneShot { delay } => delay,
        }
    }

    /// Re-arm interval, `None` for one-shots.
    pub const fn period(&self) -> Option<Duration> {
        match *self {
            Schedule::Periodic { period, .. } => Some(period),
            Schedule::OneShot { .. } => None,
        }
    }
}

struct Timer<T> {
    task: T,
    schedule: Schedule,
    deadline: Option<Instant>,
}

/// Fixed-capacity table of task timers.
pub struct Scheduler<T, const N: usize> {
    timers: Vec<Timer<T>, N>,
}

/// The part of the scheduler a running task may touch.
///
/// A task can arm timers but never dispatch, so a running task cannot be
/// re-entered.
pub struct Timers<'a, T, const N: usize> {
    scheduler: &'a mut Scheduler<T, N>,
}

impl<T: Copy + PartialEq, const N: usize> Timers<'_, T, N> {
    /// See [`Scheduler::post`].
    pub fn post(&mut self, task: T, now: Instant) -> Result<bool, SchedulerError> {
        self.scheduler.post(task, now)
    }
}

impl<T: Copy + PartialEq, const N: usize> Default for Scheduler<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + PartialEq, const N: usize> Scheduler<T, N> {
    pub const fn new() -> Self {
        Self { timers: Vec::new() }
    }

    /// Adds a timer for `task`. The timer starts idle; [`Scheduler::post`]
    /// arms it. Registration order breaks deadline ties.
    pub fn register(&mut self, task: T, schedule: Schedule) -> Result<(), SchedulerError> {
        if self.index_of(task).is_some() {
            return Err(SchedulerError::AlreadyRegistered);
        }
        self.timers
            .push(Timer {
                task,
                schedule,
                deadline: None,
            })
            .map_err(|_| SchedulerError::Full)
    }

    /// Arms `task` to fire its schedule's delay after `now`.
    ///
    /// Returns `Ok(false)` without touching the deadline when the task is
    /// already armed; fires of the same task never queue up.
    pub fn post(&mut self, task: T, now: Instant) -> Result<bool, SchedulerError> {
        let index = self.index_of(task).ok_or(SchedulerError::UnknownTask)?;
        let timer = &mut self.timers[index];
        if timer.deadline.is_some() {
            return Ok(false);
        }
        timer.deadline = Some(now + timer.schedule.delay());
        Ok(true)
    }

    /// Deadline of `task`, `None` while idle or unknown.
    pub fn deadline(&self, task: T) -> Option<Instant> {
        self.index_of(task)
            .and_then(|index| self.timers[index].deadline)
    }

    /// Earliest armed task and its deadline.
    pub fn next_due(&self) -> Option<(T, Instant)> {
        self.earliest()
            .map(|index| (self.timers[index].task, self.timers[index].deadline))
            .and_then(|(task, deadline)| deadline.map(|deadline| (task, deadline)))
    }

    /// Waits for the earliest armed timer and dispatches its task.
    ///
    /// A periodic timer re-arms at `last_deadline + period` once the task
    /// returns. If the task overran that point it re-arms at the finish time
    /// instead, so a slow task drifts later rather than firing back to back
    /// to catch up. Returns the dispatched task, or `None` when nothing is
    /// armed.
    pub fn step<C, F>(&mut self, clock: &mut C, dispatch: &mut F) -> Option<T>
    where
        C: Clock,
        F: FnMut(T, &mut Timers<'_, T, N>, &mut C),
    {
        let index = self.earliest()?;
        let deadline = self.timers[index].deadline?;

        clock.sleep_until(deadline);

        let timer = &mut self.timers[index];
        timer.deadline = None;
        let task = timer.task;
        let schedule = timer.schedule;

        dispatch(task, &mut Timers { scheduler: self }, clock);

        if let Some(period) = schedule.period() {
            let finished = clock.now();
            let next = deadline + period;
            let timer = &mut self.timers[index];
            if timer.deadline.is_none() {
                timer.deadline = Some(if next > finished { next } else { finished });
            }
        }

        Some(task)
    }

    /// Dispatches every task due at or before `until`, then returns.
    pub fn run_until<C, F>(&mut self, clock: &mut C, until: Instant, mut dispatch: F)
    where
        C: Clock,
        F: FnMut(T, &mut Timers<'_, T, N>, &mut C),
    {
        while let Some((_, deadline)) = self.next_due() {
            if deadline > until {
                break;
            }
            self.step(clock, &mut dispatch);
        }
    }

    /// Dispatches tasks until power-off.
    pub fn run_forever<C, F>(&mut self, clock: &mut C, mut dispatch: F) -> !
    where
        C: Clock,
        F: FnMut(T, &mut Timers<'_, T, N>, &mut C),
    {
        loop {
            if self.step(clock, &mut dispatch).is_none() {
                let idle_until = clock.now() + Duration::from_ticks(IDLE_SLEEP_MS);
                clock.sleep_until(idle_until);
            }
        }
    }

    fn index_of(&self, task: T) -> Option<usize> {
        self.timers.iter().position(|timer| timer.task == task)
    }

    // min_by_key keeps the first of equal keys, i.e. registration order.
    fn earliest(&self) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .filter_map(|(index, timer)| timer.deadline.map(|deadline| (index, deadline)))
            .min_by_key(|&(_, deadline)| deadline)
            .map(|(index, _)| index)
    }
}

/// Virtual clock: sleeping jumps straight to the deadline.
#[cfg(test)]
pub(crate) struct SimClock {
    now: Instant,
}

#[cfg(test)]
impl SimClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Instant::from_ticks(0),
        }
    }

    /// Burns `ms` of virtual time, as a slow bus transaction would.
    pub(crate) fn advance(&mut self, ms: u64) {
        self.now = self.now + Duration::from_ticks(ms);
    }
}

#[cfg(test)]
impl Clock for SimClock {
    fn now(&self) -> Instant {
        self.now
    }

    fn sleep_until(&mut self, deadline: Instant) {
        if deadline > self.now {
            self.now = deadline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Job {
        Fast,
        Slow,
        Once,
    }

    fn at(ms: u64) -> Instant {
        Instant::from_ticks(ms)
    }

    #[test]
    fn periodic_fires_after_delay_then_every_period() {
        let mut clock = SimClock::new();
        let mut scheduler: Scheduler<Job, 4> = Scheduler::new();
        scheduler
            .register(Job::Fast, Schedule::periodic(100, 1_000))
            .unwrap();
        assert!(scheduler.post(Job::Fast, clock.now()).unwrap());

        let mut fired = std::vec::Vec::new();
        scheduler.run_until(&mut clock, at(3_500), |job, _, clock: &mut SimClock| {
            fired.push((job, clock.now().ticks()));
        });

        assert_eq!(
            fired,
            [(Job::Fast, 100), (Job::Fast, 1_100), (Job::Fast, 2_100), (Job::Fast, 3_100)]
        );
    }

    #[test]
    fn ties_go_to_the_first_registered_task() {
        let mut clock = SimClock::new();
        let mut scheduler: Scheduler<Job, 4> = Scheduler::new();
        scheduler
            .register(Job::Slow, Schedule::periodic(0, 500))
            .unwrap();
        scheduler
            .register(Job::Fast, Schedule::periodic(0, 250))
            .unwrap();
        scheduler.post(Job::Fast, clock.now()).unwrap();
        scheduler.post(Job::Slow, clock.now()).unwrap();

        let mut fired = std::vec::Vec::new();
        scheduler.run_until(&mut clock, at(500), |job, _, clock: &mut SimClock| {
            fired.push((job, clock.now().ticks()));
        });

        assert_eq!(
            fired,
            [
                (Job::Slow, 0),
                (Job::Fast, 0),
                (Job::Fast, 250),
                (Job::Slow, 500),
                (Job::Fast, 500),
            ]
        );
    }

    #[test]
    fn one_shot_fires_once_and_can_be_posted_again() {
        let mut clock = SimClock::new();
        let mut scheduler: Scheduler<Job, 4> = Scheduler::new();
        scheduler.register(Job::Once, Schedule::one_shot(40)).unwrap();

        assert!(scheduler.post(Job::Once, clock.now()).unwrap());
        // Already pending, the second post must not move the deadline.
        clock.advance(10);
        assert!(!scheduler.post(Job::Once, clock.now()).unwrap());
        assert_eq!(scheduler.deadline(Job::Once), Some(at(40)));

        let mut count = 0;
        scheduler.run_until(&mut clock, at(1_000), |_, _, _: &mut SimClock| count += 1);
        assert_eq!(count, 1);
        assert_eq!(scheduler.next_due(), None);

        assert!(scheduler.post(Job::Once, clock.now()).unwrap());
        assert_eq!(scheduler.deadline(Job::Once), Some(at(80)));
    }

    #[test]
    fn overrunning_task_drifts_instead_of_catching_up() {
        let mut clock = SimClock::new();
        let mut scheduler: Scheduler<Job, 4> = Scheduler::new();
        scheduler
            .register(Job::Slow, Schedule::periodic(0, 10))
            .unwrap();
        scheduler.post(Job::Slow, clock.now()).unwrap();

        let mut starts = std::vec::Vec::new();
        scheduler.run_until(&mut clock, at(60), |_, _, clock: &mut SimClock| {
            starts.push(clock.now().ticks());
            clock.advance(25);
        });

        // One fire per finished run, never two fires at the same instant.
        assert_eq!(starts, [0, 25, 50]);
    }

    #[test]
    fn punctual_task_keeps_its_phase() {
        let mut clock = SimClock::new();
        let mut scheduler: Scheduler<Job, 4> = Scheduler::new();
        scheduler
            .register(Job::Fast, Schedule::periodic(0, 10))
            .unwrap();
        scheduler.post(Job::Fast, clock.now()).unwrap();

        let mut starts = std::vec::Vec::new();
        scheduler.run_until(&mut clock, at(30), |_, _, clock: &mut SimClock| {
            starts.push(clock.now().ticks());
            clock.advance(3);
        });

        assert_eq!(starts, [0, 10, 20, 30]);
    }

    #[test]
    fn running_task_can_arm_another() {
        let mut clock = SimClock::new();
        let mut scheduler: Scheduler<Job, 4> = Scheduler::new();
        scheduler
            .register(Job::Slow, Schedule::periodic(0, 1_000))
            .unwrap();
        scheduler.register(Job::Once, Schedule::one_shot(300)).unwrap();
        scheduler.post(Job::Slow, clock.now()).unwrap();

        let mut fired = std::vec::Vec::new();
        scheduler.run_until(&mut clock, at(1_500), |job, timers, clock: &mut SimClock| {
            fired.push((job, clock.now().ticks()));
            if job == Job::Slow {
                clock.advance(5);
                timers.post(Job::Once, clock.now()).unwrap();
            }
        });

        assert_eq!(
            fired,
            [
                (Job::Slow, 0),
                (Job::Once, 305),
                (Job::Slow, 1_000),
                (Job::Once, 1_305),
            ]
        );
    }

    #[test]
    fn table_errors() {
        let mut scheduler: Scheduler<Job, 2> = Scheduler::new();
        scheduler.register(Job::Fast, Schedule::one_shot(1)).unwrap();
        assert_eq!(
            scheduler.register(Job::Fast, Schedule::one_shot(1)),
            Err(SchedulerError::AlreadyRegistered)
        );
        scheduler.register(Job::Slow, Schedule::one_shot(1)).unwrap();
        assert_eq!(
            scheduler.register(Job::Once, Schedule::one_shot(1)),
            Err(SchedulerError::Full)
        );

        let mut empty: Scheduler<Job, 2> = Scheduler::new();
        assert_eq!(
            empty.post(Job::Once, at(0)),
            Err(SchedulerError::UnknownTask)
        );
        assert_eq!(empty.next_due(), None);
    }
}
