use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Identifies a timer subscription inside the time protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Wall-clock timestamp relative to the UNIX epoch (UTC).
///
/// `nanos` is always below one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Instant {
    pub seconds: u64,
    pub nanos: u32,
}

impl Instant {
    /// Build an instant, carrying excess nanoseconds into seconds.
    pub fn new(seconds: u64, nanos: u32) -> Self {
        Self {
            seconds: seconds.saturating_add(u64::from(nanos / NANOS_PER_SEC)),
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Time from `earlier` until `self`, or zero if `self` is not later.
    pub fn saturating_duration_since(&self, earlier: Instant) -> std::time::Duration {
        let to_nanos = |instant: &Instant| {
            u128::from(instant.seconds) * u128::from(NANOS_PER_SEC) + u128::from(instant.nanos)
        };
        let nanos = to_nanos(self).saturating_sub(to_nanos(&earlier));
        std::time::Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl From<SystemTime> for Instant {
    fn from(time: SystemTime) -> Self {
        // Clocks set before 1970 clamp to the epoch.
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            seconds: since_epoch.as_secs(),
            nanos: since_epoch.subsec_nanos(),
        }
    }
}

/// Span of time with nanosecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Duration {
    pub nanos: u64,
}

impl Duration {
    pub fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis.saturating_mul(1_000_000),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self {
            nanos: secs.saturating_mul(u64::from(NANOS_PER_SEC)),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }
}

impl From<Duration> for std::time::Duration {
    fn from(duration: Duration) -> Self {
        std::time::Duration::from_nanos(duration.nanos)
    }
}

impl From<std::time::Duration> for Duration {
    fn from(duration: std::time::Duration) -> Self {
        Self {
            nanos: u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRequest {
    Now,
    Interval { id: TimerId, duration: Duration },
    Clear { id: TimerId },
    NotBefore { id: TimerId, instant: Instant },
    NotAfter { id: TimerId, duration: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeResponse {
    Now { instant: Instant },
    Tick { id: TimerId, instant: Instant },
    InstantArrived { id: TimerId },
    DurationElapsed { id: TimerId },
}
