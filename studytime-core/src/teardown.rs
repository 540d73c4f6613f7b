// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Delivery while the page is being destroyed.
//!
//! An ordinary request dispatched from an unload handler is usually cancelled
//! together with the page. A [`TeardownTransport`] is the beacon-style primitive
//! that hands the payload to the host so it survives the page. Such transports
//! can't carry custom headers, which is why the credential rides in the body.

use serde::{Deserialize, Serialize};

use crate::{ContentType, TrackedSubject};

/// Body sent through a [`TeardownTransport`].
///
/// Carries the same logical payload as a `recordTimeDelta` request plus the
/// credential that request would have sent as a header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownPayload {
    pub content_type: ContentType,
    pub content_id: String,
    pub seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl TeardownPayload {
    pub fn new(subject: &TrackedSubject, seconds: u64, token: Option<String>) -> Self {
        Self {
            content_type: subject.content_type,
            content_id: subject.content_id.clone(),
            seconds,
            token,
        }
    }

    /// JSON request body.
    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Fire-and-forget delivery that outlives the page.
///
/// `dispatch` must not block. It returns `true` if the host accepted the payload
/// for delivery, and `false` if the primitive is unavailable or refused it, in
/// which case the engine falls back to the ordinary channel.
pub trait TeardownTransport: Send + Sync {
    fn dispatch(&self, payload: &TeardownPayload) -> bool;
}
