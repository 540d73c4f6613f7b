// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The time accumulator: visible, running wall-clock time as whole seconds.
//!
//! Two independent flags gate the clock. `running` is what the user (or the
//! ambient tracker's mount) asked for; `visible` follows the page. Time only
//! advances while both hold, one continuous segment at a time, so repeated
//! hide/show cycles can never count the same interval twice.
//!
//! Elapsed time is kept at full precision and floored to seconds when read.
//! Flushing is recorded in whole seconds, so the sub-second remainder of one
//! flush is carried into the next instead of being dropped.

use std::time::Duration;

use studytime_timesource::{Instant, TimeSource};

/// A point-in-time view of an [`Accumulator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatorState {
    pub elapsed_seconds: u64,
    pub flushed_seconds: u64,
    pub running: bool,
    /// Start of the segment currently being counted, if any.
    pub last_resume: Option<Instant>,
    pub visible: bool,
}

impl AccumulatorState {
    pub fn pending_seconds(&self) -> u64 {
        self.elapsed_seconds.saturating_sub(self.flushed_seconds)
    }
}

/// The error cases for [`Accumulator`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorError {
    /// `reset` was called while the clock was running.
    ResetWhileRunning,
}

impl std::fmt::Display for AccumulatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResetWhileRunning => f.write_str("cannot reset a running accumulator"),
        }
    }
}

impl std::error::Error for AccumulatorError {}

/// Elapsed visible time for one tracked subject.
#[derive(Debug)]
pub struct Accumulator {
    time_source: TimeSource,
    enabled: bool,
    running: bool,
    visible: bool,
    segment_start: Option<Instant>,
    closed: Duration,
    flushed_seconds: u64,
}

impl Accumulator {
    /// A stopped accumulator at zero.
    ///
    /// A disabled accumulator (e.g. for an anonymous user) ignores `resume` and
    /// therefore never accrues time.
    pub fn new(time_source: TimeSource, enabled: bool, visible: bool) -> Self {
        Self {
            time_source,
            enabled,
            running: false,
            visible,
            segment_start: None,
            closed: Duration::ZERO,
            flushed_seconds: 0,
        }
    }

    fn now(&self) -> Instant {
        self.time_source.instant()
    }

    // An edge stamped before seconds already credited as flushed must not take them
    // back: elapsed never drops below flushed.
    fn close_segment(&mut self, at: &Instant) {
        if let Some(start) = self.segment_start.take() {
            self.closed += at.saturating_duration_since(&start);
            self.closed = self.closed.max(Duration::from_secs(self.flushed_seconds));
        }
    }

    /// Start the clock. Returns `false` if it was already running or tracking is disabled.
    pub fn resume(&mut self) -> bool {
        if !self.enabled || self.running {
            return false;
        }
        self.running = true;
        if self.visible {
            self.segment_start = Some(self.now());
        }
        true
    }

    /// Stop the clock. Returns `false` if it wasn't running.
    pub fn pause(&mut self) -> bool {
        if !self.running {
            return false;
        }
        let now = self.now();
        self.close_segment(&now);
        self.running = false;
        true
    }

    /// The page became hidden at `at`. Leaves `running` untouched.
    pub fn on_hidden(&mut self, at: &Instant) {
        if !self.visible {
            return;
        }
        self.close_segment(at);
        self.visible = false;
    }

    /// The page became visible at `at`; the clock picks up again if still running.
    pub fn on_visible(&mut self, at: &Instant) {
        if self.visible {
            return;
        }
        self.visible = true;
        if self.running {
            self.segment_start = Some(at.clone());
        }
    }

    /// Zero both counters. Only legal while stopped.
    pub fn reset(&mut self) -> Result<(), AccumulatorError> {
        if self.running {
            return Err(AccumulatorError::ResetWhileRunning);
        }
        self.closed = Duration::ZERO;
        self.flushed_seconds = 0;
        Ok(())
    }

    /// Total counted time, including the open segment.
    pub fn elapsed(&self) -> Duration {
        match &self.segment_start {
            Some(start) => self.closed + self.now().saturating_duration_since(start),
            None => self.closed,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed().as_secs()
    }

    pub fn flushed_seconds(&self) -> u64 {
        self.flushed_seconds
    }

    /// Seconds not yet confirmed as delivered.
    pub fn pending_seconds(&self) -> u64 {
        self.elapsed_seconds().saturating_sub(self.flushed_seconds)
    }

    /// Record `seconds` as delivered, capped at the elapsed total.
    pub(crate) fn mark_flushed(&mut self, seconds: u64) {
        let elapsed = self.elapsed_seconds();
        self.flushed_seconds = self.flushed_seconds.saturating_add(seconds).min(elapsed);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether wall-clock time is currently being counted.
    pub fn is_advancing(&self) -> bool {
        self.running && self.visible
    }

    pub fn state(&self) -> AccumulatorState {
        AccumulatorState {
            elapsed_seconds: self.elapsed_seconds(),
            flushed_seconds: self.flushed_seconds,
            running: self.running,
            last_resume: self.segment_start.clone(),
            visible: self.visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use assert2::check;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use studytime_timesource::{TimeSource, fakes::ManualClock};

    use super::*;

    fn setup() -> (Accumulator, ManualClock) {
        let clock = ManualClock::at_time(UNIX_EPOCH);
        let acc = Accumulator::new(TimeSource::custom(clock.clone()), true, true);
        (acc, clock)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn counts_only_while_running() {
        let (mut acc, clock) = setup();
        clock.advance(secs(5));
        check!(acc.resume());
        clock.advance(secs(10));
        check!(acc.pause());
        clock.advance(secs(50));
        check!(acc.elapsed_seconds() == 10);
        check!(!acc.pause());
    }

    #[test]
    fn resume_is_idempotent() {
        let (mut acc, clock) = setup();
        acc.resume();
        clock.advance(secs(4));
        check!(!acc.resume());
        clock.advance(secs(4));
        check!(acc.elapsed_seconds() == 8);
    }

    #[test]
    fn hidden_time_is_excluded() {
        let (mut acc, clock) = setup();
        let ts = TimeSource::custom(clock.clone());
        acc.resume();
        clock.advance(secs(20));
        acc.on_hidden(&ts.instant());
        clock.advance(secs(100));
        acc.on_hidden(&ts.instant());
        acc.on_visible(&ts.instant());
        clock.advance(secs(10));
        check!(acc.elapsed_seconds() == 30);
        check!(acc.is_running());
    }

    #[test]
    fn resume_while_hidden_waits_for_visibility() {
        let (mut acc, clock) = setup();
        let ts = TimeSource::custom(clock.clone());
        acc.on_hidden(&ts.instant());
        acc.resume();
        clock.advance(secs(30));
        check!(acc.elapsed_seconds() == 0);
        check!(acc.state().last_resume.is_none());
        acc.on_visible(&ts.instant());
        clock.advance(secs(3));
        check!(acc.elapsed_seconds() == 3);
    }

    #[test]
    fn disabled_tracking_is_inert() {
        let clock = ManualClock::at_time(UNIX_EPOCH);
        let mut acc = Accumulator::new(TimeSource::custom(clock.clone()), false, true);
        check!(!acc.resume());
        clock.advance(secs(60));
        check!(acc.elapsed_seconds() == 0);
        check!(!acc.is_running());
    }

    #[test]
    fn reset_requires_stopped_clock() {
        let (mut acc, clock) = setup();
        acc.resume();
        clock.advance(secs(15));
        acc.mark_flushed(10);
        check!(acc.reset() == Err(AccumulatorError::ResetWhileRunning));
        acc.pause();
        check!(acc.reset() == Ok(()));
        check!(acc.elapsed_seconds() == 0);
        check!(acc.flushed_seconds() == 0);
    }

    #[test]
    fn sub_second_remainders_carry_over() {
        let (mut acc, clock) = setup();
        acc.resume();
        clock.advance(Duration::from_millis(1500));
        check!(acc.pending_seconds() == 1);
        acc.mark_flushed(1);
        clock.advance(Duration::from_millis(600));
        check!(acc.elapsed_seconds() == 2);
        check!(acc.pending_seconds() == 1);
    }

    #[test]
    fn stale_hidden_edge_keeps_flushed_seconds() {
        let (mut acc, clock) = setup();
        let ts = TimeSource::custom(clock.clone());
        acc.resume();
        clock.advance(secs(5));
        let stale = ts.instant();
        clock.advance(secs(5));
        let pending = acc.pending_seconds();
        acc.mark_flushed(pending);
        check!(acc.flushed_seconds() == 10);

        acc.on_hidden(&stale);
        let state = acc.state();
        check!(state.elapsed_seconds == 10);
        check!(state.flushed_seconds == 10);
        check!(state.pending_seconds() == 0);

        acc.on_visible(&ts.instant());
        clock.advance(secs(3));
        check!(acc.pending_seconds() == 3);
    }

    #[test]
    fn pending_in_a_snapshot_saturates() {
        let state = AccumulatorState {
            elapsed_seconds: 4,
            flushed_seconds: 9,
            running: false,
            last_resume: None,
            visible: true,
        };
        check!(state.pending_seconds() == 0);
    }

    #[derive(Debug, Clone, Copy)]
    enum Event {
        Resume,
        Pause,
        Hidden,
        Visible,
    }

    /// Random interleavings of resume/pause/hidden/visible against a reference model
    /// that sums the seconds during which both flags held.
    #[test]
    fn elapsed_matches_visible_running_time() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..200 {
            let (mut acc, clock) = setup();
            let ts = TimeSource::custom(clock.clone());
            let (mut running, mut visible, mut expected) = (false, true, 0u64);
            let mut flushed = 0u64;

            for _ in 0..rng.random_range(1..60) {
                let step = rng.random_range(0..40u64);
                clock.advance(secs(step));
                if running && visible {
                    expected += step;
                }
                match [Event::Resume, Event::Pause, Event::Hidden, Event::Visible]
                    [rng.random_range(0..4)]
                {
                    Event::Resume => {
                        acc.resume();
                        running = true;
                    }
                    Event::Pause => {
                        acc.pause();
                        running = false;
                    }
                    Event::Hidden => {
                        acc.on_hidden(&ts.instant());
                        visible = false;
                    }
                    Event::Visible => {
                        acc.on_visible(&ts.instant());
                        visible = true;
                    }
                }
                if rng.random_bool(0.2) {
                    let pending = acc.pending_seconds();
                    acc.mark_flushed(pending);
                    flushed += pending;
                    check!(acc.pending_seconds() == 0);
                }
                check!(acc.elapsed_seconds() == expected);
                check!(acc.flushed_seconds() == flushed);
                check!(acc.flushed_seconds() <= acc.elapsed_seconds());
                check!(acc.is_advancing() == (running && visible));
            }
        }
    }
}
