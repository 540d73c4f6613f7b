// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contains the [`StudyApi`] trait, the server operations a tracker consumes.

use std::{fmt, future::Future};

use crate::{NewSession, Session, SessionId, TrackedSubject};

/// The error cases for a [`StudyApi`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response.
    Network(String),
    /// The server answered with a non-success status.
    Status { code: u16, message: String },
    /// The response body could not be understood.
    Decode(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Status { code, message } => write!(f, "server returned {code}: {message}"),
            Self::Decode(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

/// Server operations used by the trackers.
///
/// Implemented by the host application's REST client. Every call may be slow or
/// fail; the engine never assumes any of them is idempotent, so it is the
/// engine's job to never deliver the same seconds twice.
///
/// The returned futures must be `Send` so the engine can dispatch them on a
/// spawned task and keep accumulating time while they are outstanding.
pub trait StudyApi: Send + Sync + 'static {
    /// Add `seconds` (at least 1) to the subject's lifetime total.
    fn record_time_delta(
        &self,
        subject: &TrackedSubject,
        seconds: u64,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Persist a finished stopwatch run.
    fn record_session(
        &self,
        session: &NewSession,
    ) -> impl Future<Output = Result<Session, ApiError>> + Send;

    /// All saved runs for the subject.
    fn list_sessions(
        &self,
        subject: &TrackedSubject,
    ) -> impl Future<Output = Result<Vec<Session>, ApiError>> + Send;

    /// Remove a saved run.
    fn delete_session(&self, id: SessionId) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// The subject's lifetime total in seconds, as shown to the user.
    fn accumulated_time(
        &self,
        subject: &TrackedSubject,
    ) -> impl Future<Output = Result<u64, ApiError>> + Send;
}
