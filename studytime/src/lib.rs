// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod accumulator;
mod ambient;
mod config;
mod error;
pub mod scheduler;
mod session;
pub mod stats;
mod stopwatch;
mod tracker;
pub mod visibility;

pub use accumulator::{Accumulator, AccumulatorError, AccumulatorState};
pub use ambient::AmbientTracker;
pub use config::{AmbientTrackerBuilder, StopwatchBuilder, StopwatchSettings};
pub use error::SessionError;
pub use scheduler::{Credential, Delivery, DeliveryOutcome, FlushPolicy, FlushReason};
pub use session::SessionManager;
pub use stats::{SessionStats, Trend};
pub use stopwatch::{Stopwatch, StopwatchState};
pub use tracker::Tracker;
pub use visibility::{Visibility, VisibilityEdge, VisibilityMonitor};
