use chrono::{Local, NaiveDateTime};

/// Clock abstracts access to the current local timestamp so services remain deterministic in tests.
pub trait Clock: Send + Sync {
    /// Returns the current wall-clock time in the user's local zone.
    fn now(&self) -> NaiveDateTime;
}

/// Reads the operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
