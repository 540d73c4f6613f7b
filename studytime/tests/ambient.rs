// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::Arc,
    time::{Duration, UNIX_EPOCH},
};

use assert2::{check, let_assert};
use rstest::rstest;
use studytime::{
    AmbientTracker, AmbientTrackerBuilder, DeliveryOutcome, Visibility, VisibilityMonitor,
};
use studytime_core::{
    ContentType, TeardownPayload, TrackedSubject,
    test_util::{DeltaCall, TestApi, TestBeacon},
};
use studytime_timesource::{TimeSource, fakes::ManualClock};

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

async fn advance(seconds: u64) {
    tokio::time::advance(Duration::from_secs(seconds)).await;
    settle().await;
}

struct Page {
    api: TestApi,
    time_source: TimeSource,
    monitor: VisibilityMonitor,
}

impl Page {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let time_source = TimeSource::tokio(UNIX_EPOCH);
        Self {
            api: TestApi::new(),
            monitor: VisibilityMonitor::new(time_source.clone(), Visibility::Visible),
            time_source,
        }
    }

    fn builder(&self) -> AmbientTrackerBuilder {
        AmbientTrackerBuilder::new()
            .time_source(self.time_source.clone())
            .visibility_monitor(self.monitor.clone())
    }

    fn mount(&self, subject: TrackedSubject) -> AmbientTracker<TestApi> {
        self.builder().build(Arc::new(self.api.clone()), subject)
    }
}

#[tokio::test(start_paused = true)]
async fn hidden_time_is_not_reported() {
    let page = Page::new();
    let a = TrackedSubject::exercise("A");
    let b = TrackedSubject::exercise("B");
    let tracker = page.mount(a.clone());

    advance(20).await;
    page.monitor.observe(Visibility::Hidden);
    advance(100).await;
    page.monitor.observe(Visibility::Visible);
    advance(10).await;

    check!(tracker.switch_subject(b.clone()).await == DeliveryOutcome::Delivered(30));
    check!(
        page.api.deltas()
            == vec![DeltaCall {
                subject: a,
                seconds: 30
            }]
    );
    check!(tracker.subject() == b);
    check!(tracker.elapsed_seconds() == 0);
    check!(tracker.state().running);

    advance(7).await;
    check!(tracker.unmount().await == DeliveryOutcome::Delivered(7));
    check!(page.api.delta_seconds(&b) == vec![7]);
}

#[tokio::test(start_paused = true)]
async fn nothing_is_sent_before_an_edge() {
    let page = Page::new();
    let tracker = page.mount(TrackedSubject::lesson("1"));
    advance(600).await;
    check!(page.api.delta_attempts() == 0);
    check!(tracker.pending_seconds() == 600);
}

#[tokio::test(start_paused = true)]
async fn switching_to_the_same_subject_does_nothing() {
    let page = Page::new();
    let subject = TrackedSubject::lesson("1");
    let tracker = page.mount(subject.clone());
    advance(5).await;
    check!(tracker.switch_subject(subject).await == DeliveryOutcome::Skipped);
    check!(tracker.elapsed_seconds() == 5);
}

#[tokio::test(start_paused = true)]
async fn sub_second_views_are_not_reported() {
    let page = Page::new();
    let tracker = page.mount(TrackedSubject::exercise("A"));
    tokio::time::advance(Duration::from_millis(900)).await;
    check!(tracker.switch_subject(TrackedSubject::exercise("B")).await == DeliveryOutcome::Skipped);
    check!(page.api.delta_attempts() == 0);
}

#[tokio::test(start_paused = true)]
async fn teardown_sends_beacon_with_credential() {
    let page = Page::new();
    let beacon = TestBeacon::new();
    let subject = TrackedSubject::exam("final");
    let tracker = page
        .builder()
        .teardown_transport(beacon.clone())
        .credential(|| Some("s3cret".to_owned()))
        .build(Arc::new(page.api.clone()), subject.clone());

    advance(25).await;
    check!(tracker.page_teardown().await == DeliveryOutcome::Beacon(25));
    check!(
        beacon.payloads()
            == vec![TeardownPayload {
                content_type: ContentType::Exam,
                content_id: "final".to_owned(),
                seconds: 25,
                token: Some("s3cret".to_owned()),
            }]
    );
    check!(page.api.delta_attempts() == 0);
}

#[tokio::test(start_paused = true)]
async fn teardown_is_idempotent() {
    let page = Page::new();
    let beacon = TestBeacon::new();
    let tracker = page
        .builder()
        .teardown_transport(beacon.clone())
        .build(Arc::new(page.api.clone()), TrackedSubject::exercise("A"));

    advance(12).await;
    check!(tracker.page_teardown().await == DeliveryOutcome::Beacon(12));
    check!(tracker.page_teardown().await == DeliveryOutcome::Skipped);
    check!(tracker.unmount().await == DeliveryOutcome::Skipped);
    settle().await;

    check!(beacon.bodies().len() == 1);
    check!(page.api.delta_attempts() == 0);
}

#[rstest]
#[case::unavailable(Some(TestBeacon::unavailable()))]
#[case::missing(None)]
#[tokio::test(start_paused = true)]
async fn teardown_falls_back_to_ordinary_request(#[case] beacon: Option<TestBeacon>) {
    let page = Page::new();
    let subject = TrackedSubject::lesson("7");
    let mut builder = page.builder();
    if let Some(beacon) = beacon.clone() {
        builder = builder.teardown_transport(beacon);
    }
    let tracker = builder.build(Arc::new(page.api.clone()), subject.clone());

    advance(9).await;
    check!(tracker.page_teardown().await == DeliveryOutcome::Delivered(9));
    check!(page.api.delta_seconds(&subject) == vec![9]);
    check!(beacon.is_none_or(|beacon| beacon.bodies().is_empty()));
}

#[tokio::test(start_paused = true)]
async fn failed_final_flush_is_not_retried() {
    let page = Page::new();
    let tracker = page.mount(TrackedSubject::exercise("A"));
    page.api.fail_next_deltas(1);
    advance(15).await;

    check!(tracker.switch_subject(TrackedSubject::exercise("B")).await == DeliveryOutcome::Failed(15));
    drop(tracker);
    settle().await;
    check!(page.api.delta_attempts() == 1);
    check!(page.api.deltas().is_empty());
}

#[tokio::test(start_paused = true)]
async fn drop_flushes_and_unsubscribes() {
    let page = Page::new();
    let subject = TrackedSubject::exercise("A");
    let tracker = page.mount(subject.clone());
    check!(page.monitor.listener_count() == 1);

    advance(11).await;
    drop(tracker);
    settle().await;
    check!(page.monitor.listener_count() == 0);
    check!(page.api.delta_seconds(&subject) == vec![11]);
}

#[tokio::test(start_paused = true)]
async fn trackers_share_the_page_monitor() {
    let page = Page::new();
    let a = page.mount(TrackedSubject::exercise("A"));
    advance(5).await;
    let b = page.mount(TrackedSubject::lesson("B"));
    advance(5).await;

    page.monitor.observe(Visibility::Hidden);
    advance(50).await;
    check!(a.elapsed_seconds() == 10);
    check!(b.elapsed_seconds() == 5);
    check!(!a.state().visible);
}

#[tokio::test(start_paused = true)]
async fn mounted_while_hidden_waits_for_visibility() {
    let page = Page::new();
    page.monitor.observe(Visibility::Hidden);
    let tracker = page.mount(TrackedSubject::exercise("A"));
    advance(30).await;
    check!(tracker.elapsed_seconds() == 0);

    page.monitor.observe(Visibility::Visible);
    advance(4).await;
    check!(tracker.elapsed_seconds() == 4);
}

#[tokio::test(start_paused = true)]
async fn disabled_tracker_is_neutral() {
    let page = Page::new();
    let beacon = TestBeacon::new();
    let subject = TrackedSubject::exercise("A");
    page.api.preset_total(subject.clone(), 300);
    let tracker = page
        .builder()
        .enabled(false)
        .teardown_transport(beacon.clone())
        .build(Arc::new(page.api.clone()), subject);

    advance(60).await;
    check!(!tracker.is_enabled());
    check!(!tracker.state().running);
    check!(tracker.page_teardown().await == DeliveryOutcome::Skipped);
    check!(tracker.lifetime_total().await == Ok(0));
    check!(tracker.switch_subject(TrackedSubject::exercise("B")).await == DeliveryOutcome::Skipped);
    check!(beacon.bodies().is_empty());
    check!(page.api.delta_attempts() == 0);
}

#[tokio::test(start_paused = true)]
async fn lifetime_total_follows_current_subject() {
    let page = Page::new();
    let a = TrackedSubject::exercise("A");
    let b = TrackedSubject::exercise("B");
    page.api.preset_total(a.clone(), 1000);
    let tracker = page.mount(a.clone());

    check!(tracker.lifetime_total().await == Ok(1000));
    advance(40).await;
    tracker.switch_subject(b).await;
    check!(tracker.lifetime_total().await == Ok(0));
    let_assert!(Ok(total) = studytime_core::StudyApi::accumulated_time(&page.api, &a).await);
    check!(total == 1040);
}

#[test]
fn without_runtime_final_flush_is_dropped() {
    let clock = ManualClock::at_time(UNIX_EPOCH);
    let api = TestApi::new();
    let tracker = AmbientTrackerBuilder::new()
        .time_source(TimeSource::custom(clock.clone()))
        .build(Arc::new(api.clone()), TrackedSubject::exercise("A"));
    clock.advance(Duration::from_secs(3));

    let delivery = tracker.page_teardown();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    check!(runtime.block_on(delivery) == DeliveryOutcome::Dropped(3));
    check!(tracker.pending_seconds() == 0);
    check!(api.delta_attempts() == 0);
}
