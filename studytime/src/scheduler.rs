// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Deciding when pending seconds are delivered, and how.
//!
//! The two tracker modes differ only in their [`FlushPolicy`]:
//!
//! - [`FlushPolicy::Periodic`] flushes on a fixed interval while the clock runs,
//!   once enough seconds are pending. The seconds are only marked as flushed
//!   after the server confirmed them, so a failed tick is retried by the next one.
//! - [`FlushPolicy::EdgeTriggered`] flushes once, when the subject changes, the
//!   tracker is dropped, or the page is torn down.
//!
//! Final flushes are never awaited by the tracker. They mark their seconds as
//! flushed up front (the subject is being discarded, so a second final flush must
//! find nothing to send) and return a [`Delivery`] the caller may ignore.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll},
    time::Duration,
};

use studytime_core::{StudyApi, TeardownPayload, TeardownTransport, TrackedSubject};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{MissedTickBehavior, interval_at},
};
use tracing::{debug, warn};

use crate::tracker::{Shared, SkipReason};

/// Default seconds between auto-saves of a running stopwatch.
pub const DEFAULT_AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Default minimum pending seconds for an auto-save to fire.
pub const DEFAULT_MIN_SAVE_THRESHOLD: u64 = 10;

/// When a tracker delivers its pending seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Every `interval` while running, if at least `min_delta` seconds are pending.
    Periodic { interval: Duration, min_delta: u64 },
    /// Only on subject change, drop, or page teardown.
    EdgeTriggered,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::Periodic {
            interval: DEFAULT_AUTO_SAVE_INTERVAL,
            min_delta: DEFAULT_MIN_SAVE_THRESHOLD,
        }
    }
}

/// Why a final flush happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    SubjectChange,
    Unmount,
    Reset,
    /// The page is being destroyed; prefer the teardown transport.
    Teardown,
}

/// How a final flush ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Nothing was pending.
    Skipped,
    /// The server confirmed the seconds.
    Delivered(u64),
    /// The teardown transport accepted the seconds.
    Beacon(u64),
    /// The server call failed; the seconds are lost.
    Failed(u64),
    /// No channel could carry the seconds.
    Dropped(u64),
}

/// A final flush in progress.
///
/// Resolves to the [`DeliveryOutcome`]. Dropping it does not cancel the delivery.
pub struct Delivery(DeliveryInner);

enum DeliveryInner {
    Ready(Option<DeliveryOutcome>),
    Spawned {
        handle: JoinHandle<DeliveryOutcome>,
        seconds: u64,
    },
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            DeliveryInner::Ready(outcome) => f.debug_tuple("Delivery").field(outcome).finish(),
            DeliveryInner::Spawned { seconds, .. } => {
                f.debug_struct("Delivery").field("in_flight", seconds).finish()
            }
        }
    }
}

impl Delivery {
    pub(crate) fn ready(outcome: DeliveryOutcome) -> Self {
        Self(DeliveryInner::Ready(Some(outcome)))
    }

    fn spawned(handle: JoinHandle<DeliveryOutcome>, seconds: u64) -> Self {
        Self(DeliveryInner::Spawned { handle, seconds })
    }
}

impl Future for Delivery {
    type Output = DeliveryOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.0 {
            DeliveryInner::Ready(outcome) => {
                Poll::Ready(outcome.take().unwrap_or(DeliveryOutcome::Skipped))
            }
            DeliveryInner::Spawned { handle, seconds } => match Pin::new(handle).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_)) => Poll::Ready(DeliveryOutcome::Dropped(*seconds)),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

/// Produces the credential a teardown payload carries.
///
/// Captured when the tracker is built, so the unload path never reaches for
/// ambient state.
pub type Credential = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct TeardownChannel {
    pub(crate) transport: Option<Arc<dyn TeardownTransport>>,
    pub(crate) credential: Option<Credential>,
}

impl TeardownChannel {
    fn try_send(&self, subject: &TrackedSubject, seconds: u64) -> bool {
        let Some(transport) = &self.transport else {
            return false;
        };
        let token = self.credential.as_ref().and_then(|credential| credential());
        let payload = TeardownPayload::new(subject, seconds, token);
        transport.dispatch(&payload)
    }
}

/// Hand `seconds` for `subject` to the best available channel without waiting.
pub(crate) fn dispatch_final<A: StudyApi>(
    api: &Arc<A>,
    teardown: &TeardownChannel,
    subject: TrackedSubject,
    seconds: u64,
    reason: FlushReason,
) -> Delivery {
    if seconds == 0 {
        return Delivery::ready(DeliveryOutcome::Skipped);
    }
    if reason == FlushReason::Teardown {
        if teardown.try_send(&subject, seconds) {
            debug!(%subject, seconds, "handed pending seconds to teardown transport");
            return Delivery::ready(DeliveryOutcome::Beacon(seconds));
        }
        debug!(%subject, seconds, "teardown transport unavailable, using ordinary request");
    }
    let Ok(runtime) = Handle::try_current() else {
        warn!(%subject, seconds, ?reason, "no async runtime, pending seconds dropped");
        return Delivery::ready(DeliveryOutcome::Dropped(seconds));
    };
    let api = Arc::clone(api);
    let handle = runtime.spawn(async move {
        match api.record_time_delta(&subject, seconds).await {
            Ok(()) => {
                debug!(%subject, seconds, ?reason, "final flush delivered");
                DeliveryOutcome::Delivered(seconds)
            }
            Err(error) => {
                warn!(%subject, seconds, ?reason, %error, "final flush failed");
                DeliveryOutcome::Failed(seconds)
            }
        }
    });
    Delivery::spawned(handle, seconds)
}

/// Start the auto-save loop for a periodic tracker.
///
/// The loop ends on its own once the tracker is gone. Each tick that finds enough
/// pending seconds spawns the server call separately, so ticks keep their cadence;
/// a tick that finds a call still outstanding does nothing and leaves the seconds
/// to the next tick.
pub(crate) fn spawn_periodic<A: StudyApi>(
    shared: Weak<Shared>,
    api: Arc<A>,
    interval: Duration,
    min_delta: u64,
) -> Option<JoinHandle<()>> {
    let Ok(runtime) = Handle::try_current() else {
        warn!("no async runtime, auto-save disabled");
        return None;
    };
    let spawner = runtime.clone();
    Some(runtime.spawn(async move {
        let mut ticker = interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            let flush = match shared.lock().begin_flush(min_delta, true) {
                Ok(flush) => flush,
                Err(SkipReason::BelowThreshold(pending)) => {
                    debug!(pending, min_delta, "auto-save skipped, below threshold");
                    continue;
                }
                Err(reason) => {
                    debug!(?reason, "auto-save skipped");
                    continue;
                }
            };
            let api = Arc::clone(&api);
            spawner.spawn(async move {
                let result = api.record_time_delta(&flush.subject, flush.seconds).await;
                match &result {
                    Ok(()) => debug!(subject = %flush.subject, seconds = flush.seconds, "auto-saved"),
                    Err(error) => warn!(
                        subject = %flush.subject,
                        seconds = flush.seconds,
                        %error,
                        "auto-save failed, seconds kept for the next tick"
                    ),
                }
                shared.complete_flush(&flush, result.is_ok());
            });
        }
    }))
}
