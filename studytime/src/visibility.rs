// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Page visibility edges.
//!
//! The host forwards raw visibility reports to a [`VisibilityMonitor`]. The monitor
//! turns them into edges: one [`VisibilityEdge`] per real transition, no matter how
//! many duplicate reports the platform produces. Trackers subscribe to those edges
//! so backgrounded time is never counted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use studytime_timesource::{Instant, TimeSource};

/// Whether the page is currently shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// A visibility transition and the instant it was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityEdge {
    Hidden(Instant),
    Visible(Instant),
}

impl VisibilityEdge {
    pub fn at(&self) -> &Instant {
        match self {
            Self::Hidden(at) | Self::Visible(at) => at,
        }
    }

    /// The visibility in effect after this edge.
    pub fn visibility(&self) -> Visibility {
        match self {
            Self::Hidden(_) => Visibility::Hidden,
            Self::Visible(_) => Visibility::Visible,
        }
    }
}

/// Handle returned by [`VisibilityMonitor::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&VisibilityEdge) -> bool + Send>;

struct Inner {
    current: Visibility,
    supported: bool,
    time_source: TimeSource,
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

/// Page-wide visibility state, shared by every tracker on the page.
///
/// Cloning is cheap; clones observe and notify the same listeners.
///
/// # Examples
/// ```
/// use std::sync::{Arc, Mutex};
/// use studytime::visibility::{Visibility, VisibilityEdge, VisibilityMonitor};
/// use studytime_timesource::TimeSource;
///
/// let monitor = VisibilityMonitor::new(TimeSource::System, Visibility::Visible);
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// monitor.subscribe(move |edge| {
///     sink.lock().unwrap().push(edge.visibility());
///     true
/// });
///
/// monitor.observe(Visibility::Hidden);
/// monitor.observe(Visibility::Hidden); // duplicate report, coalesced
/// monitor.observe(Visibility::Visible);
/// assert_eq!(*seen.lock().unwrap(), vec![Visibility::Hidden, Visibility::Visible]);
/// ```
#[derive(Clone)]
pub struct VisibilityMonitor {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for VisibilityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("VisibilityMonitor")
            .field("current", &inner.current)
            .field("supported", &inner.supported)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl Default for VisibilityMonitor {
    fn default() -> Self {
        Self::unsupported(TimeSource::default())
    }
}

impl VisibilityMonitor {
    /// Monitor for a host that reports visibility, starting in `initial`.
    pub fn new(time_source: TimeSource, initial: Visibility) -> Self {
        Self::build(time_source, initial, true)
    }

    /// Monitor for a host that can't report visibility.
    ///
    /// The page is treated as always visible and reports are ignored: at worst this
    /// over-counts, it never stalls a running timer.
    pub fn unsupported(time_source: TimeSource) -> Self {
        Self::build(time_source, Visibility::Visible, false)
    }

    fn build(time_source: TimeSource, initial: Visibility, supported: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                current: initial,
                supported,
                time_source,
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> Visibility {
        self.lock().current
    }

    pub fn is_supported(&self) -> bool {
        self.lock().supported
    }

    /// Feed a raw visibility report from the host.
    ///
    /// Returns the edge if the report was a real transition. Listeners are invoked
    /// in subscription order; a listener returning `false` is removed.
    pub fn observe(&self, visibility: Visibility) -> Option<VisibilityEdge> {
        let mut inner = self.lock();
        if !inner.supported || inner.current == visibility {
            return None;
        }
        inner.current = visibility;
        let at = inner.time_source.instant();
        let edge = match visibility {
            Visibility::Hidden => VisibilityEdge::Hidden(at),
            Visibility::Visible => VisibilityEdge::Visible(at),
        };
        inner.listeners.retain_mut(|(_, listener)| listener(&edge));
        Some(edge)
    }

    /// Register `listener` for every future edge.
    pub fn subscribe(
        &self,
        listener: impl FnMut(&VisibilityEdge) -> bool + Send + 'static,
    ) -> ListenerId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.lock().listeners.retain(|(listener, _)| *listener != id);
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::{Duration, UNIX_EPOCH},
    };

    use assert2::check;
    use studytime_timesource::{TimeSource, fakes::ManualClock};

    use super::*;

    #[test]
    fn duplicate_reports_are_coalesced() {
        let monitor = VisibilityMonitor::new(TimeSource::System, Visibility::Visible);
        check!(monitor.is_supported());
        check!(monitor.observe(Visibility::Visible).is_none());
        check!(monitor.observe(Visibility::Hidden).is_some());
        check!(monitor.observe(Visibility::Hidden).is_none());
        check!(monitor.current() == Visibility::Hidden);
    }

    #[test]
    fn edges_carry_observation_instant() {
        let clock = ManualClock::at_time(UNIX_EPOCH);
        let ts = TimeSource::custom(clock.clone());
        let start = ts.instant();
        let monitor = VisibilityMonitor::new(ts, Visibility::Visible);

        clock.advance(Duration::from_secs(12));
        let edge = monitor.observe(Visibility::Hidden).unwrap();
        check!(edge.visibility() == Visibility::Hidden);
        check!(edge.at().saturating_duration_since(&start) == Duration::from_secs(12));
    }

    #[test]
    fn unsupported_host_stays_visible() {
        let monitor = VisibilityMonitor::unsupported(TimeSource::System);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        monitor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        check!(!monitor.is_supported());
        check!(monitor.observe(Visibility::Hidden).is_none());
        check!(monitor.current() == Visibility::Visible);
        check!(calls.load(Ordering::SeqCst) == 0);
    }

    #[test]
    fn listeners_can_leave() {
        let monitor = VisibilityMonitor::new(TimeSource::System, Visibility::Visible);
        let kept = monitor.subscribe(|_| true);
        monitor.subscribe(|_| false);
        check!(monitor.listener_count() == 2);

        monitor.observe(Visibility::Hidden);
        check!(monitor.listener_count() == 1);

        monitor.unsubscribe(kept);
        check!(monitor.listener_count() == 0);
    }
}
