// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The tracker core shared by both modes.
//!
//! A [`Tracker`] owns one accumulator for one subject, wires it to the page's
//! visibility edges, and applies its [`FlushPolicy`]. [`AmbientTracker`] and
//! [`Stopwatch`] are thin wrappers that only choose the policy and the controls
//! they expose.
//!
//! All state sits behind one mutex that is never held across an await, so every
//! transition is atomic with respect to timers, visibility callbacks and network
//! completions. Server calls run outside the lock while time keeps accruing.
//!
//! [`AmbientTracker`]: crate::AmbientTracker
//! [`Stopwatch`]: crate::Stopwatch

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use studytime_core::{ApiError, StudyApi, TrackedSubject};
use studytime_timesource::TimeSource;
use tokio::{sync::Notify, task::JoinHandle};
use tracing::debug;

use crate::{
    accumulator::{Accumulator, AccumulatorState},
    scheduler::{
        Delivery, DeliveryOutcome, FlushPolicy, FlushReason, TeardownChannel, dispatch_final,
        spawn_periodic,
    },
    visibility::{ListenerId, Visibility, VisibilityEdge, VisibilityMonitor},
};

#[derive(Debug, Clone, Copy)]
struct InFlight {
    generation: u64,
    seconds: u64,
}

/// A flush that has been started and must be completed with [`Shared::complete_flush`].
#[derive(Debug, Clone)]
pub(crate) struct PendingFlush {
    pub(crate) subject: TrackedSubject,
    pub(crate) seconds: u64,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkipReason {
    Outstanding,
    NotRunning,
    BelowThreshold(u64),
}

pub(crate) struct TrackerState {
    subject: TrackedSubject,
    accumulator: Accumulator,
    in_flight: Option<InFlight>,
    // bumped on every reset so a late confirmation can't credit the next run
    generation: u64,
}

impl TrackerState {
    fn on_edge(&mut self, edge: &VisibilityEdge) {
        match edge {
            VisibilityEdge::Hidden(at) => self.accumulator.on_hidden(at),
            VisibilityEdge::Visible(at) => self.accumulator.on_visible(at),
        }
    }

    fn outstanding_seconds(&self) -> u64 {
        match self.in_flight {
            Some(in_flight) if in_flight.generation == self.generation => in_flight.seconds,
            _ => 0,
        }
    }

    /// Reserve the pending seconds for a server call.
    pub(crate) fn begin_flush(
        &mut self,
        min_delta: u64,
        require_running: bool,
    ) -> Result<PendingFlush, SkipReason> {
        if self.in_flight.is_some() {
            return Err(SkipReason::Outstanding);
        }
        if require_running && !self.accumulator.is_running() {
            return Err(SkipReason::NotRunning);
        }
        let pending = self.accumulator.pending_seconds();
        if pending < min_delta.max(1) {
            return Err(SkipReason::BelowThreshold(pending));
        }
        self.in_flight = Some(InFlight {
            generation: self.generation,
            seconds: pending,
        });
        Ok(PendingFlush {
            subject: self.subject.clone(),
            seconds: pending,
            generation: self.generation,
        })
    }

    /// Take everything not already on its way for a final flush.
    fn take_final(&mut self) -> (TrackedSubject, u64) {
        let seconds = self
            .accumulator
            .pending_seconds()
            .saturating_sub(self.outstanding_seconds());
        self.accumulator.mark_flushed(seconds);
        (self.subject.clone(), seconds)
    }

    fn restart(&mut self, subject: Option<TrackedSubject>) {
        self.accumulator.pause();
        let reset = self.accumulator.reset();
        debug_assert!(reset.is_ok());
        self.generation += 1;
        if let Some(subject) = subject {
            self.subject = subject;
        }
    }
}

pub(crate) struct Shared {
    state: Mutex<TrackerState>,
    settled: Notify,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release the in-flight reservation, crediting the seconds on success.
    ///
    /// Waiters in [`Tracker::flush_pending`] are woken even if crediting unwinds.
    pub(crate) fn complete_flush(&self, flush: &PendingFlush, delivered: bool) {
        let _settled = NotifyOnDrop(&self.settled);
        let mut state = self.lock();
        state.in_flight = None;
        if delivered && state.generation == flush.generation {
            state.accumulator.mark_flushed(flush.seconds);
        }
    }
}

struct NotifyOnDrop<'a>(&'a Notify);

impl Drop for NotifyOnDrop<'_> {
    fn drop(&mut self) {
        self.0.notify_waiters();
    }
}

pub(crate) struct TrackerOptions {
    pub(crate) time_source: TimeSource,
    pub(crate) enabled: bool,
    pub(crate) monitor: Option<VisibilityMonitor>,
    pub(crate) teardown: TeardownChannel,
    pub(crate) policy: FlushPolicy,
}

/// Time tracking for one subject under one [`FlushPolicy`].
///
/// Dropping the tracker performs the unmount flush.
pub struct Tracker<A: StudyApi> {
    shared: Arc<Shared>,
    api: Arc<A>,
    policy: FlushPolicy,
    enabled: bool,
    teardown: TeardownChannel,
    subscription: Option<(VisibilityMonitor, ListenerId)>,
    ticker: Option<JoinHandle<()>>,
}

impl<A: StudyApi> std::fmt::Debug for Tracker<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("subject", &self.subject())
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish()
    }
}

impl<A: StudyApi> Tracker<A> {
    pub(crate) fn new(subject: TrackedSubject, api: Arc<A>, options: TrackerOptions) -> Self {
        let visible = options
            .monitor
            .as_ref()
            .is_none_or(|monitor| monitor.current() == Visibility::Visible);
        let shared = Arc::new(Shared {
            state: Mutex::new(TrackerState {
                subject,
                accumulator: Accumulator::new(options.time_source, options.enabled, visible),
                in_flight: None,
                generation: 0,
            }),
            settled: Notify::new(),
        });

        let subscription = options.monitor.map(|monitor| {
            let weak = Arc::downgrade(&shared);
            let id = monitor.subscribe(move |edge| match weak.upgrade() {
                Some(shared) => {
                    shared.lock().on_edge(edge);
                    true
                }
                None => false,
            });
            (monitor, id)
        });

        let ticker = match options.policy {
            FlushPolicy::Periodic {
                interval,
                min_delta,
            } if options.enabled => {
                spawn_periodic(Arc::downgrade(&shared), Arc::clone(&api), interval, min_delta)
            }
            _ => None,
        };

        Self {
            shared,
            api,
            policy: options.policy,
            enabled: options.enabled,
            teardown: options.teardown,
            subscription,
            ticker,
        }
    }

    pub fn subject(&self) -> TrackedSubject {
        self.shared.lock().subject.clone()
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Whether tracking is active at all. A disabled tracker accepts every call and does nothing.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn resume(&self) -> bool {
        self.shared.lock().accumulator.resume()
    }

    pub fn pause(&self) -> bool {
        self.shared.lock().accumulator.pause()
    }

    pub fn state(&self) -> AccumulatorState {
        self.shared.lock().accumulator.state()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.shared.lock().accumulator.elapsed_seconds()
    }

    pub fn pending_seconds(&self) -> u64 {
        self.shared.lock().accumulator.pending_seconds()
    }

    /// Dispatch every pending second without waiting for the result.
    ///
    /// Calling this twice in a row sends the pending seconds at most once.
    pub fn flush(&self, reason: FlushReason) -> Delivery {
        let (subject, seconds) = self.shared.lock().take_final();
        dispatch_final(&self.api, &self.teardown, subject, seconds, reason)
    }

    /// Flush the current subject and start over at zero for `subject`.
    ///
    /// The running flag carries over. Switching to the current subject does nothing.
    ///
    /// Seconds already reserved by an outstanding auto-save are left to that call.
    /// The two requests are independent, so the server may see this final delta
    /// before the auto-save's.
    pub fn switch_subject(&self, subject: TrackedSubject) -> Delivery {
        let (previous, seconds) = {
            let mut state = self.shared.lock();
            if state.subject == subject {
                return Delivery::ready(DeliveryOutcome::Skipped);
            }
            let was_running = state.accumulator.is_running();
            let taken = state.take_final();
            state.restart(Some(subject));
            if was_running {
                state.accumulator.resume();
            }
            debug!(from = %taken.0, to = %state.subject, "tracked subject changed");
            taken
        };
        dispatch_final(
            &self.api,
            &self.teardown,
            previous,
            seconds,
            FlushReason::SubjectChange,
        )
    }

    /// Stop the clock, flush whatever is pending, and zero the counters.
    ///
    /// Like [`Self::switch_subject`], the final delta is not ordered after an
    /// auto-save that is still outstanding.
    pub fn reset(&self) -> Delivery {
        let (subject, seconds) = {
            let mut state = self.shared.lock();
            let taken = state.take_final();
            state.restart(None);
            taken
        };
        dispatch_final(&self.api, &self.teardown, subject, seconds, FlushReason::Reset)
    }

    /// Stop the clock and zero the counters, assuming nothing is pending.
    pub(crate) fn discard(&self) {
        self.shared.lock().restart(None);
    }

    /// Deliver every pending second and wait for the server to confirm.
    ///
    /// Waits for an outstanding auto-save first so deltas reach the server in
    /// order. On failure the seconds stay pending.
    pub(crate) async fn flush_pending(&self) -> Result<u64, ApiError> {
        let flush = loop {
            let settled = self.shared.settled.notified();
            match self.shared.lock().begin_flush(1, false) {
                Ok(flush) => break flush,
                Err(SkipReason::Outstanding) => {}
                Err(_) => return Ok(0),
            }
            settled.await;
        };
        let result = self
            .api
            .record_time_delta(&flush.subject, flush.seconds)
            .await;
        self.shared.complete_flush(&flush, result.is_ok());
        result.map(|()| flush.seconds)
    }

    /// The subject's lifetime total from the server. Zero when tracking is disabled.
    pub async fn lifetime_total(&self) -> Result<u64, ApiError> {
        if !self.enabled {
            return Ok(0);
        }
        let subject = self.subject();
        self.api.accumulated_time(&subject).await
    }
}

impl<A: StudyApi> Drop for Tracker<A> {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some((monitor, id)) = self.subscription.take() {
            monitor.unsubscribe(id);
        }
        // fire and forget
        let _ = self.flush(FlushReason::Unmount);
    }
}
