//! Clock

use std::fmt::Debug;

use jiff::{Zoned, civil::Date, tz::TimeZone};

/// Source of the current time.
pub trait Clock: Debug + Send + Sync {
    /// Current time.
    fn now(&self) -> Zoned;

    /// Current calendar date.
    fn today(&self) -> Date {
        self.now().date()
    }
}

/// Wall clock in a fixed time zone.
#[derive(Debug, Clone)]
pub struct SystemClock {
    time_zone: TimeZone,
}

impl SystemClock {
    /// Wall clock in `time_zone`.
    #[must_use]
    pub fn new(time_zone: TimeZone) -> Self {
        Self { time_zone }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(TimeZone::system())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Zoned {
        Zoned::now().with_time_zone(self.time_zone.clone())
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone)]
pub struct FixedClock(Zoned);

impl FixedClock {
    /// Clock that always reports `now`.
    #[must_use]
    pub fn new(now: Zoned) -> Self {
        Self(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Zoned {
        self.0.clone()
    }
}
