// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant as StdInstant, SystemTime},
};

/// Fake clocks for driving trackers deterministically in tests
///
/// To enable this module, you must enable the `test-util` feature.
#[cfg(feature = "test-util")]
pub mod fakes;

/// A source of monotonic and wall-clock readings
///
/// Trackers only ever measure elapsed study time with [`Time::instant`]. The wall
/// clock is used to stamp the start and end of a stopwatch run.
pub trait Time: Send + Sync + Debug {
    /// Current wall-clock time
    fn now(&self) -> SystemTime;

    /// Current monotonic instant
    fn instant(&self) -> StdInstant;
}

/// Clock backed by tokio's timer, so paused and advanced test time is honoured
///
/// This requires that the `tokio` feature be enabled.
#[cfg(feature = "tokio")]
pub mod tokio {
    use std::time::{Instant as StdInstant, SystemTime};

    use tokio::time::Instant as TokioInstant;

    use crate::{Time, TimeSource};

    impl TimeSource {
        /// A time source that follows tokio's clock, starting the wall clock at `starting_timestamp`
        ///
        /// Periodic flush timers run on tokio, so a tracker built with this source sees
        /// exactly the same timeline as its auto-save interval.
        ///
        /// # Examples
        ///
        /// ```
        /// # #[tokio::main(flavor = "current_thread")]
        /// # async fn main() {
        /// use std::time::{Duration, UNIX_EPOCH};
        /// use studytime_timesource::TimeSource;
        ///
        /// tokio::time::pause();
        /// let ts = TimeSource::tokio(UNIX_EPOCH);
        /// let start = ts.instant();
        ///
        /// tokio::time::advance(Duration::from_secs(45)).await;
        /// assert_eq!(start.elapsed(), Duration::from_secs(45));
        /// # }
        /// ```
        pub fn tokio(starting_timestamp: SystemTime) -> Self {
            TimeSource::custom(TokioTime::starting_at(starting_timestamp))
        }
    }

    /// [`Time`] implementation reading tokio's (possibly paused) clock
    #[derive(Copy, Clone, Debug)]
    pub struct TokioTime {
        origin: TokioInstant,
        origin_wall_clock: SystemTime,
    }

    impl TokioTime {
        /// Anchor the wall clock at `wall_clock` for tokio's current instant
        pub fn starting_at(wall_clock: SystemTime) -> Self {
            Self {
                origin: TokioInstant::now(),
                origin_wall_clock: wall_clock,
            }
        }
    }

    impl Time for TokioTime {
        fn now(&self) -> SystemTime {
            self.origin_wall_clock + self.origin.elapsed()
        }

        fn instant(&self) -> StdInstant {
            TokioInstant::now().into_std()
        }
    }

    #[cfg(test)]
    mod test {
        use std::time::{Duration, UNIX_EPOCH};

        use crate::TimeSource;

        #[tokio::test(start_paused = true)]
        async fn follows_paused_tokio_clock() {
            let ts = TimeSource::tokio(UNIX_EPOCH);
            let start = ts.instant();
            assert_eq!(ts.system_time(), UNIX_EPOCH);

            tokio::time::advance(Duration::from_secs(20)).await;
            assert_eq!(ts.system_time(), UNIX_EPOCH + Duration::from_secs(20));
            assert_eq!(start.elapsed(), Duration::from_secs(20));
            assert_eq!(
                ts.instant().saturating_duration_since(&start),
                Duration::from_secs(20)
            );
        }
    }
}

/// Where a tracker reads time from
///
/// Defaults to the operating system clocks. Tests swap in a custom source so a
/// simulated clock drives the accumulator.
#[derive(Clone, Default)]
pub enum TimeSource {
    /// Operating system clocks
    #[default]
    System,
    /// A custom clock
    Custom(Arc<dyn Time>),
}

impl Debug for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "TimeSource::System"),
            Self::Custom(_) => write!(f, "TimeSource::Custom(...)"),
        }
    }
}

impl TimeSource {
    /// Wrap a custom [`Time`] implementation
    pub fn custom(time: impl Time + 'static) -> Self {
        Self::Custom(Arc::new(time))
    }

    /// The current monotonic instant, bound to this source
    ///
    /// # Examples
    ///
    /// ```
    /// use studytime_timesource::TimeSource;
    ///
    /// let ts = TimeSource::System;
    /// let start = ts.instant();
    /// let _ = start.elapsed();
    /// ```
    pub fn instant(&self) -> Instant {
        let value = match self {
            Self::System => StdInstant::now(),
            Self::Custom(time) => time.instant(),
        };
        Instant {
            value,
            time_source: self.clone(),
        }
    }

    /// The current wall-clock time
    pub fn system_time(&self) -> SystemTime {
        match self {
            Self::System => SystemTime::now(),
            Self::Custom(time) => time.now(),
        }
    }
}

/// A monotonic instant that remembers which [`TimeSource`] produced it
///
/// `elapsed()` reads the same source again, so simulated clocks stay consistent.
#[derive(Clone)]
pub struct Instant {
    value: StdInstant,
    time_source: TimeSource,
}

impl Debug for Instant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

impl PartialEq for Instant {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Instant {}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl Instant {
    /// Time elapsed since this instant, measured on its own source
    pub fn elapsed(&self) -> Duration {
        self.time_source
            .instant()
            .value
            .saturating_duration_since(self.value)
    }

    /// Time between `earlier` and `self`, or zero if `earlier` is later
    pub fn saturating_duration_since(&self, earlier: &Instant) -> Duration {
        self.value.saturating_duration_since(earlier.value)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use crate::{
        TimeSource,
        fakes::{FrozenClock, ManualClock},
    };

    #[test]
    fn default_is_system() {
        assert!(matches!(TimeSource::default(), TimeSource::System));
    }

    #[test]
    fn instants_follow_their_source() {
        let clock = ManualClock::at_time(UNIX_EPOCH);
        let ts = TimeSource::custom(clock.clone());
        let start = ts.instant();

        clock.advance(Duration::from_secs(7));
        assert_eq!(start.elapsed(), Duration::from_secs(7));
        assert_eq!(ts.system_time(), UNIX_EPOCH + Duration::from_secs(7));
    }

    #[test]
    fn frozen_clock_never_moves() {
        let wall_clock = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let ts = TimeSource::custom(FrozenClock::at_time(wall_clock));
        let start = ts.instant();
        assert_eq!(ts.system_time(), wall_clock);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(ts.instant(), start);
    }

    #[test]
    fn saturating_difference_never_goes_negative() {
        let clock = ManualClock::at_time(UNIX_EPOCH);
        let ts = TimeSource::custom(clock.clone());
        let earlier = ts.instant();
        clock.advance(Duration::from_secs(3));
        let later = ts.instant();

        assert_eq!(earlier.saturating_duration_since(&later), Duration::ZERO);
        assert_eq!(later.saturating_duration_since(&earlier), Duration::from_secs(3));
        assert!(earlier < later);
    }
}
