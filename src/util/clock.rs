//! Clock helpers and the protocol timestamp type.
//!
//! Workers and the RPC layer carry instants as [`WireTimestamp`] (seconds plus
//! nanoseconds since the Unix epoch). Conversion into an in-process
//! [`DateTime<Utc>`] is fallible and never defaults silently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

const NANOS_PER_SECOND: i32 = 1_000_000_000;

/// chrono carries a leap second as `nanos` in `1e9..2e9` on the last second of a minute.
const LEAP_NANOS_LIMIT: i32 = 2 * NANOS_PER_SECOND;

/// Protocol timestamp as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WireTimestamp {
    /// Whole seconds since the Unix epoch.
    pub seconds: i64,
    /// Sub-second nanoseconds, `0..1_000_000_000`, or up to `2_000_000_000`
    /// during a leap second.
    pub nanos: i32,
}

impl WireTimestamp {
    /// Build a wire timestamp from its raw parts without validation.
    pub const fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    /// Convert to an in-process time value.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTimestamp`] when `nanos` is out of
    /// range or the instant cannot be represented. `nanos` past one second is
    /// accepted only as a leap second, i.e. when `seconds` ends a minute.
    pub fn to_datetime(self) -> Result<DateTime<Utc>, SchedulerError> {
        let invalid = || SchedulerError::InvalidTimestamp {
            seconds: self.seconds,
            nanos: self.nanos,
        };
        let leap = self.seconds.rem_euclid(60) == 59;
        let limit = if leap { LEAP_NANOS_LIMIT } else { NANOS_PER_SECOND };
        if !(0..limit).contains(&self.nanos) {
            return Err(invalid());
        }
        let nanos = u32::try_from(self.nanos).map_err(|_| invalid())?;
        DateTime::from_timestamp(self.seconds, nanos).ok_or_else(invalid)
    }

    /// Lossless conversion from an in-process time value.
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        // timestamp_subsec_nanos is < 2e9 even with leap seconds, which fits in i32
        #[allow(clippy::cast_possible_wrap)]
        let nanos = time.timestamp_subsec_nanos() as i32;
        Self {
            seconds: time.timestamp(),
            nanos,
        }
    }

    /// Wire timestamp for the current instant.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }
}

impl From<DateTime<Utc>> for WireTimestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self::from_datetime(time)
    }
}

impl TryFrom<WireTimestamp> for DateTime<Utc> {
    type Error = SchedulerError;

    fn try_from(ts: WireTimestamp) -> Result<Self, Self::Error> {
        ts.to_datetime()
    }
}

/// Current wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
