// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The user-facing stopwatch with auto-save and session history.

use std::time::SystemTime;

use studytime_core::{ApiError, Session, SessionId, SessionKind, StudyApi, TrackedSubject};
use studytime_timesource::TimeSource;
use tracing::debug;

use crate::{
    accumulator::AccumulatorState,
    error::SessionError,
    scheduler::{Delivery, FlushReason},
    session::SessionManager,
    stats::SessionStats,
    tracker::Tracker,
};

/// The state shown on the stopwatch controls.
///
/// Page visibility never changes this: a hidden page stops the clock but a
/// running stopwatch stays `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopwatchState {
    #[default]
    Idle,
    Running,
    Paused,
}

/// An explicit start/pause/save timer for one subject.
///
/// While running, pending seconds are auto-saved on the configured interval.
/// Saving turns the run into a [`Session`] and returns the stopwatch to idle.
///
/// Built with [`StopwatchBuilder`](crate::StopwatchBuilder).
#[derive(Debug)]
pub struct Stopwatch<A: StudyApi> {
    tracker: Tracker<A>,
    sessions: SessionManager<A>,
    state: StopwatchState,
    run_started_at: Option<SystemTime>,
    time_source: TimeSource,
}

impl<A: StudyApi> Stopwatch<A> {
    pub(crate) fn new(
        tracker: Tracker<A>,
        sessions: SessionManager<A>,
        time_source: TimeSource,
    ) -> Self {
        Self {
            tracker,
            sessions,
            state: StopwatchState::Idle,
            run_started_at: None,
            time_source,
        }
    }

    pub fn state(&self) -> StopwatchState {
        self.state
    }

    pub fn subject(&self) -> TrackedSubject {
        self.tracker.subject()
    }

    pub fn is_enabled(&self) -> bool {
        self.tracker.is_enabled()
    }

    /// Start a new run from idle. Does nothing in any other state or when disabled.
    pub fn start(&mut self) -> bool {
        if self.state != StopwatchState::Idle || !self.tracker.resume() {
            return false;
        }
        self.state = StopwatchState::Running;
        self.run_started_at = Some(self.time_source.system_time());
        debug!(subject = %self.tracker.subject(), "stopwatch started");
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state != StopwatchState::Running {
            return false;
        }
        self.tracker.pause();
        self.state = StopwatchState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != StopwatchState::Paused || !self.tracker.resume() {
            return false;
        }
        self.state = StopwatchState::Running;
        true
    }

    /// Stop and zero the stopwatch.
    ///
    /// Seconds not yet auto-saved are still reported to the server: they were
    /// real study time even though no session is kept.
    pub fn reset(&mut self) -> Delivery {
        self.state = StopwatchState::Idle;
        self.run_started_at = None;
        self.tracker.reset()
    }

    /// Persist the current run as a session.
    ///
    /// The stopwatch is paused first. On success it is idle and zeroed; on failure
    /// it stays paused with the measured time intact so the caller can retry.
    /// Returns `Ok(None)` when tracking is disabled.
    pub async fn save_session(
        &mut self,
        kind: SessionKind,
        notes: impl Into<String>,
    ) -> Result<Option<Session>, SessionError> {
        if self.state == StopwatchState::Running {
            self.pause();
        }
        let saved = self
            .sessions
            .save(&self.tracker, kind, notes.into(), self.run_started_at)
            .await?;
        if saved.is_some() {
            self.state = StopwatchState::Idle;
            self.run_started_at = None;
        }
        Ok(saved)
    }

    pub async fn delete_session(&mut self, id: SessionId) -> Result<(), SessionError> {
        self.sessions.delete(id).await
    }

    /// Re-fetch the session history from the server.
    pub async fn refresh_sessions(&mut self) -> Result<&[Session], SessionError> {
        self.sessions.load().await
    }

    /// Cached session history, newest first.
    pub fn sessions(&self) -> &[Session] {
        self.sessions.sessions()
    }

    pub fn stats(&self) -> &SessionStats {
        self.sessions.stats()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.tracker.elapsed_seconds()
    }

    pub fn pending_seconds(&self) -> u64 {
        self.tracker.pending_seconds()
    }

    pub fn accumulator_state(&self) -> AccumulatorState {
        self.tracker.state()
    }

    pub async fn lifetime_total(&self) -> Result<u64, ApiError> {
        self.tracker.lifetime_total().await
    }

    /// Hand the pending seconds to the teardown transport. See
    /// [`AmbientTracker::page_teardown`](crate::AmbientTracker::page_teardown).
    pub fn page_teardown(&self) -> Delivery {
        self.tracker.flush(FlushReason::Teardown)
    }

    /// Stop the stopwatch and report what is pending without saving a session.
    pub fn unmount(self) -> Delivery {
        self.tracker.flush(FlushReason::Unmount)
    }
}
