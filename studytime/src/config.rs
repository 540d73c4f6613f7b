// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Builders for the two tracker modes.

use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use studytime_core::{StudyApi, TeardownTransport, TrackedSubject};
use studytime_timesource::TimeSource;

use crate::{
    ambient::AmbientTracker,
    scheduler::{
        Credential, DEFAULT_AUTO_SAVE_INTERVAL, DEFAULT_MIN_SAVE_THRESHOLD, FlushPolicy,
        TeardownChannel,
    },
    session::SessionManager,
    stats::DEFAULT_IMPROVEMENT_WINDOW,
    stopwatch::Stopwatch,
    tracker::{Tracker, TrackerOptions},
    visibility::VisibilityMonitor,
};

/// Stopwatch tunables, for hosts that keep them in their own config files.
///
/// Missing fields take their defaults.
///
/// ```
/// # use studytime::StopwatchSettings;
/// let settings: StopwatchSettings =
///     serde_json::from_str(r#"{ "auto_save_interval_seconds": 60 }"#).unwrap();
/// assert_eq!(settings.auto_save_interval_seconds, 60);
/// assert_eq!(settings.min_save_threshold_seconds, 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StopwatchSettings {
    pub auto_save_interval_seconds: u64,
    pub min_save_threshold_seconds: u64,
    pub improvement_window: usize,
}

impl Default for StopwatchSettings {
    fn default() -> Self {
        Self {
            auto_save_interval_seconds: DEFAULT_AUTO_SAVE_INTERVAL.as_secs(),
            min_save_threshold_seconds: DEFAULT_MIN_SAVE_THRESHOLD,
            improvement_window: DEFAULT_IMPROVEMENT_WINDOW,
        }
    }
}

/// Settings common to both modes.
#[derive(Clone)]
struct Common {
    enabled: bool,
    time_source: TimeSource,
    monitor: Option<VisibilityMonitor>,
    teardown: TeardownChannel,
}

impl Default for Common {
    fn default() -> Self {
        Self {
            enabled: true,
            time_source: TimeSource::default(),
            monitor: None,
            teardown: TeardownChannel::default(),
        }
    }
}

impl Common {
    fn options(self, policy: FlushPolicy) -> TrackerOptions {
        TrackerOptions {
            time_source: self.time_source,
            enabled: self.enabled,
            monitor: self.monitor,
            teardown: self.teardown,
            policy,
        }
    }
}

macro_rules! common_setters {
    () => {
        /// Whether tracking is active, e.g. only for signed-in users.
        ///
        /// Defaults to `true`. A disabled tracker accepts every call and does nothing.
        pub fn enabled(mut self, enabled: bool) -> Self {
            self.common.enabled = enabled;
            self
        }

        /// Clock used for measuring. Defaults to the system clock.
        ///
        /// The visibility monitor must share this clock, since its edges carry
        /// timestamps.
        pub fn time_source(mut self, time_source: TimeSource) -> Self {
            self.common.time_source = time_source;
            self
        }

        /// The page's visibility monitor.
        ///
        /// Without one the page is treated as always visible.
        pub fn visibility_monitor(mut self, monitor: VisibilityMonitor) -> Self {
            self.common.monitor = Some(monitor);
            self
        }

        /// Transport for flushes during page teardown.
        ///
        /// Without one, teardown flushes fall back to an ordinary request.
        pub fn teardown_transport(mut self, transport: impl TeardownTransport + 'static) -> Self {
            self.common.teardown.transport = Some(Arc::new(transport));
            self
        }

        /// Source of the credential carried in teardown payloads.
        ///
        /// Called when a teardown flush is dispatched.
        pub fn credential(
            mut self,
            credential: impl Fn() -> Option<String> + Send + Sync + 'static,
        ) -> Self {
            self.common.teardown.credential = Some(Arc::new(credential) as Credential);
            self
        }
    };
}

/// Builder for an [`AmbientTracker`].
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use std::sync::Arc;
/// use studytime::AmbientTrackerBuilder;
/// use studytime_core::{TrackedSubject, test_util::TestApi};
///
/// let api = TestApi::new();
/// let tracker = AmbientTrackerBuilder::new()
///     .credential(|| Some("token".to_owned()))
///     .build(Arc::new(api.clone()), TrackedSubject::lesson("intro"));
/// assert!(tracker.state().running);
/// # }
/// ```
#[derive(Clone, Default)]
pub struct AmbientTrackerBuilder {
    common: Common,
}

impl AmbientTrackerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    common_setters!();

    /// Build a tracker for `subject`. The clock starts immediately.
    pub fn build<A: StudyApi>(self, api: Arc<A>, subject: TrackedSubject) -> AmbientTracker<A> {
        let options = self.common.options(FlushPolicy::EdgeTriggered);
        AmbientTracker::new(Tracker::new(subject, api, options))
    }
}

/// Builder for a [`Stopwatch`].
#[derive(Clone)]
pub struct StopwatchBuilder {
    common: Common,
    auto_save_interval: Duration,
    min_save_threshold: u64,
    improvement_window: usize,
}

impl Default for StopwatchBuilder {
    fn default() -> Self {
        Self {
            common: Common::default(),
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            min_save_threshold: DEFAULT_MIN_SAVE_THRESHOLD,
            improvement_window: DEFAULT_IMPROVEMENT_WINDOW,
        }
    }
}

impl StopwatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    common_setters!();

    /// Sets how often a running stopwatch auto-saves.
    ///
    /// Defaults to 30 seconds.
    pub fn auto_save_interval(mut self, interval: Duration) -> Self {
        assert!(
            interval > Duration::ZERO,
            "auto_save_interval must not be zero"
        );
        self.auto_save_interval = interval;
        self
    }

    /// Sets the fewest pending seconds an auto-save will report.
    ///
    /// Defaults to 10 seconds. Values below one behave as one, since sub-second
    /// deltas are never sent.
    pub fn min_save_threshold(mut self, seconds: u64) -> Self {
        self.min_save_threshold = seconds;
        self
    }

    /// Sets how many sessions each improvement window covers.
    ///
    /// Defaults to 5.
    pub fn improvement_window(mut self, window: usize) -> Self {
        assert!(window > 0, "improvement_window must not be zero");
        self.improvement_window = window;
        self
    }

    /// Apply every tunable from `settings`.
    pub fn settings(self, settings: StopwatchSettings) -> Self {
        self.auto_save_interval(Duration::from_secs(settings.auto_save_interval_seconds))
            .min_save_threshold(settings.min_save_threshold_seconds)
            .improvement_window(settings.improvement_window)
    }

    /// Build an idle stopwatch for `subject`.
    ///
    /// Auto-save needs a tokio runtime; built outside one, the stopwatch only
    /// reports on save, reset, teardown and drop.
    pub fn build<A: StudyApi>(self, api: Arc<A>, subject: TrackedSubject) -> Stopwatch<A> {
        let time_source = self.common.time_source.clone();
        let enabled = self.common.enabled;
        let policy = FlushPolicy::Periodic {
            interval: self.auto_save_interval,
            min_delta: self.min_save_threshold,
        };
        let sessions = SessionManager::new(
            Arc::clone(&api),
            subject.clone(),
            enabled,
            time_source.clone(),
            self.improvement_window,
        );
        let tracker = Tracker::new(subject, api, self.common.options(policy));
        Stopwatch::new(tracker, sessions, time_source)
    }
}
