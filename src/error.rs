//! Error types.
//!
//! Only startup can fail. Once the scheduler runs, device failures are folded
//! into the readings (stale values, an air-quality status) and shown on the
//! display instead of being propagated.

use thiserror_no_std::Error;

/// Timer table misuse.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerError {
    #[error("Timer table is full")]
    Full,
    #[error("Task has no registered timer")]
    UnknownTask,
    #[error("Task already has a timer")]
    AlreadyRegistered,
}

/// Fatal failure while bringing the station up.
///
/// `E`, `A` and `S` are the error types of the environmental source, the
/// air-quality source and the display respectively.
#[derive(Error, Debug)]
pub enum StartupError<E, A, S> {
    #[error("Environmental sensor setup failed: {0:?}")]
    Environmental(E),
    #[error("Air-quality sensor setup failed: {0:?}")]
    AirQuality(A),
    #[error("Display setup failed: {0:?}")]
    Display(S),
    #[error("Scheduler setup failed: {0}")]
    Scheduler(#[from] SchedulerError),
    /// The cadence does not leave room for a conversion before its harvest,
    /// or for a harvest before the first air-quality refresh.
    #[error("Task cadence breaks the measurement ordering")]
    Unordered,
}
