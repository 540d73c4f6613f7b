// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Passive time tracking for whatever content is on screen.

use studytime_core::{ApiError, StudyApi, TrackedSubject};

use crate::{
    accumulator::AccumulatorState,
    scheduler::{Delivery, FlushReason},
    tracker::Tracker,
};

/// Measures visible time on a content view without any user interaction.
///
/// The clock starts when the tracker is built and only stops while the page is
/// hidden. Pending seconds are delivered once, when the subject changes, when
/// the tracker is dropped, or when the host reports page teardown.
///
/// Built with [`AmbientTrackerBuilder`](crate::AmbientTrackerBuilder).
#[derive(Debug)]
pub struct AmbientTracker<A: StudyApi> {
    tracker: Tracker<A>,
}

impl<A: StudyApi> AmbientTracker<A> {
    pub(crate) fn new(tracker: Tracker<A>) -> Self {
        tracker.resume();
        Self { tracker }
    }

    pub fn subject(&self) -> TrackedSubject {
        self.tracker.subject()
    }

    /// Report the time spent on the current subject and start over for `subject`.
    pub fn switch_subject(&self, subject: TrackedSubject) -> Delivery {
        self.tracker.switch_subject(subject)
    }

    /// Hand the pending seconds to the teardown transport.
    ///
    /// Call this from the host's unload hook. If the transport is missing or
    /// refuses the payload, an ordinary request is attempted instead.
    pub fn page_teardown(&self) -> Delivery {
        self.tracker.flush(FlushReason::Teardown)
    }

    /// Stop tracking and report what is pending.
    ///
    /// Dropping the tracker does the same; this only gives access to the delivery.
    pub fn unmount(self) -> Delivery {
        self.tracker.flush(FlushReason::Unmount)
    }

    pub fn state(&self) -> AccumulatorState {
        self.tracker.state()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.tracker.elapsed_seconds()
    }

    pub fn pending_seconds(&self) -> u64 {
        self.tracker.pending_seconds()
    }

    pub fn is_enabled(&self) -> bool {
        self.tracker.is_enabled()
    }

    /// Lifetime study time for the current subject, as recorded by the server.
    pub async fn lifetime_total(&self) -> Result<u64, ApiError> {
        self.tracker.lifetime_total().await
    }
}
