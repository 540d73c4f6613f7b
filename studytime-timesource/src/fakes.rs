// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant, SystemTime},
};

use crate::Time;

/// A clock that never moves
#[derive(Debug)]
pub struct FrozenClock {
    wall_clock: SystemTime,
    instant: Instant,
}

impl FrozenClock {
    /// Freeze the wall clock at `time`
    ///
    /// # Examples
    ///
    /// ```
    /// use studytime_timesource::{TimeSource, fakes::FrozenClock};
    /// use std::time::UNIX_EPOCH;
    ///
    /// let ts = TimeSource::custom(FrozenClock::at_time(UNIX_EPOCH));
    /// assert_eq!(ts.system_time(), UNIX_EPOCH);
    /// ```
    pub fn at_time(time: impl Into<SystemTime>) -> Self {
        Self {
            wall_clock: time.into(),
            instant: Instant::now(),
        }
    }
}

impl Time for FrozenClock {
    fn now(&self) -> SystemTime {
        self.wall_clock
    }

    fn instant(&self) -> Instant {
        self.instant
    }
}

/// A clock advanced by hand through a shared handle
///
/// Clones share the same reading, so a test keeps one handle and gives another
/// to the tracker under test.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<FrozenClock>>);

impl ManualClock {
    /// Start the clock with the wall clock at `time`
    pub fn at_time(time: impl Into<SystemTime>) -> Self {
        Self(Arc::new(Mutex::new(FrozenClock::at_time(time))))
    }

    /// Move both the monotonic and the wall clock forward by `by`
    ///
    /// # Examples
    ///
    /// ```
    /// use studytime_timesource::{TimeSource, fakes::ManualClock};
    /// use std::time::{Duration, UNIX_EPOCH};
    ///
    /// let clock = ManualClock::at_time(UNIX_EPOCH);
    /// let ts = TimeSource::custom(clock.clone());
    /// let start = ts.instant();
    ///
    /// clock.advance(Duration::from_secs(20));
    /// assert_eq!(start.elapsed(), Duration::from_secs(20));
    /// assert_eq!(ts.system_time(), UNIX_EPOCH + Duration::from_secs(20));
    /// ```
    pub fn advance(&self, by: Duration) {
        let mut clock = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        clock.instant += by;
        clock.wall_clock += by;
    }
}

impl Time for ManualClock {
    fn now(&self) -> SystemTime {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).wall_clock
    }

    fn instant(&self) -> Instant {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).instant
    }
}
