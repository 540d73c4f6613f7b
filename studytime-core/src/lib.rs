// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod api;
pub mod session;
pub mod subject;
pub mod teardown;
#[cfg(feature = "test-util")]
pub mod test_util;

pub use api::{ApiError, StudyApi};
pub use session::{NewSession, Session, SessionId, SessionKind};
pub use subject::{ContentType, ParseContentTypeError, TrackedSubject};
pub use teardown::{TeardownPayload, TeardownTransport};
