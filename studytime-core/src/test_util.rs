// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! In-memory collaborators for testing trackers.
//!
//! [`TestApi`] stands in for the REST client and records every call it receives;
//! [`TestBeacon`] stands in for the page-teardown transport.
//!
//! This requires that the `test-util` feature be enabled.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use crate::{
    ApiError, NewSession, Session, SessionId, SessionKind, StudyApi, TeardownPayload,
    TeardownTransport, TrackedSubject,
};

/// A delivered `recordTimeDelta` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaCall {
    pub subject: TrackedSubject,
    pub seconds: u64,
}

#[derive(Default)]
struct State {
    deltas: Vec<DeltaCall>,
    delta_attempts: usize,
    outstanding_deltas: usize,
    fail_deltas: usize,
    fail_session: bool,
    fail_delete: bool,
    fail_list: bool,
    gate: Option<Arc<Semaphore>>,
    sessions: Vec<(TrackedSubject, Session)>,
    next_session_id: u64,
    preset_totals: HashMap<TrackedSubject, u64>,
}

/// In-memory [`StudyApi`].
///
/// Cloning is cheap and every clone observes the same state, so a test keeps
/// one handle as an inspector and hands another to the tracker.
///
/// # Examples
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use studytime_core::{StudyApi, TrackedSubject, test_util::TestApi};
///
/// let api = TestApi::new();
/// let subject = TrackedSubject::exercise("1");
/// api.record_time_delta(&subject, 30).await.unwrap();
/// assert_eq!(api.delta_seconds(&subject), vec![30]);
/// assert_eq!(api.accumulated_time(&subject).await.unwrap(), 30);
/// # }
/// ```
#[derive(Clone, Default)]
pub struct TestApi {
    state: Arc<Mutex<State>>,
}

impl TestApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every delivered delta, in delivery order.
    pub fn deltas(&self) -> Vec<DeltaCall> {
        self.state().deltas.clone()
    }

    /// Delivered delta amounts for one subject, in delivery order.
    pub fn delta_seconds(&self, subject: &TrackedSubject) -> Vec<u64> {
        self.state()
            .deltas
            .iter()
            .filter(|call| &call.subject == subject)
            .map(|call| call.seconds)
            .collect()
    }

    /// Number of `recordTimeDelta` calls started, including failed and held ones.
    pub fn delta_attempts(&self) -> usize {
        self.state().delta_attempts
    }

    /// Number of `recordTimeDelta` calls currently held by [`Self::hold_deltas`].
    pub fn outstanding_deltas(&self) -> usize {
        self.state().outstanding_deltas
    }

    /// Fail the next `n` delta calls with a network error.
    pub fn fail_next_deltas(&self, n: usize) {
        self.state().fail_deltas = n;
    }

    /// Fail the next `recordSession` call.
    pub fn fail_next_session(&self) {
        self.state().fail_session = true;
    }

    /// Fail the next `deleteSession` call.
    pub fn fail_next_delete(&self) {
        self.state().fail_delete = true;
    }

    /// Fail the next `listSessions` call.
    pub fn fail_next_list(&self) {
        self.state().fail_list = true;
    }

    /// Keep delta calls outstanding until released with [`Self::release_deltas`].
    pub fn hold_deltas(&self) {
        self.state().gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held delta calls complete.
    pub fn release_deltas(&self, n: usize) {
        if let Some(gate) = &self.state().gate {
            gate.add_permits(n);
        }
    }

    /// Stop holding delta calls and let every held one complete.
    pub fn release_all_deltas(&self) {
        if let Some(gate) = self.state().gate.take() {
            gate.close();
        }
    }

    /// Lifetime seconds the server already knew about before the test.
    pub fn preset_total(&self, subject: TrackedSubject, seconds: u64) {
        self.state().preset_totals.insert(subject, seconds);
    }

    /// Store a session as if it had been saved earlier.
    pub fn insert_session(
        &self,
        subject: &TrackedSubject,
        duration_seconds: u64,
        kind: SessionKind,
        created_at: DateTime<Utc>,
    ) -> Session {
        let mut state = self.state();
        state.next_session_id += 1;
        let session = Session {
            id: SessionId(state.next_session_id),
            duration_seconds,
            kind,
            started_at: created_at - chrono::Duration::seconds(duration_seconds as i64),
            ended_at: created_at,
            notes: String::new(),
            created_at,
        };
        state.sessions.push((subject.clone(), session.clone()));
        session
    }

    /// Every stored session for one subject, newest first.
    pub fn sessions(&self, subject: &TrackedSubject) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .state()
            .sessions
            .iter()
            .filter(|(owner, _)| owner == subject)
            .map(|(_, session)| session.clone())
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        sessions
    }
}

impl StudyApi for TestApi {
    fn record_time_delta(
        &self,
        subject: &TrackedSubject,
        seconds: u64,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        let call = DeltaCall {
            subject: subject.clone(),
            seconds,
        };
        let api = self.clone();
        async move {
            let gate = {
                let mut state = api.state();
                state.delta_attempts += 1;
                state.outstanding_deltas += 1;
                state.gate.clone()
            };
            if let Some(gate) = gate {
                // a closed gate means everything is released
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            let mut state = api.state();
            state.outstanding_deltas -= 1;
            if state.fail_deltas > 0 {
                state.fail_deltas -= 1;
                return Err(ApiError::Network("connection reset".to_owned()));
            }
            state.deltas.push(call);
            Ok(())
        }
    }

    fn record_session(
        &self,
        session: &NewSession,
    ) -> impl Future<Output = Result<Session, ApiError>> + Send {
        let draft = session.clone();
        let api = self.clone();
        async move {
            let mut state = api.state();
            if std::mem::take(&mut state.fail_session) {
                return Err(ApiError::Status {
                    code: 503,
                    message: "service unavailable".to_owned(),
                });
            }
            state.next_session_id += 1;
            let session = Session {
                id: SessionId(state.next_session_id),
                duration_seconds: draft.duration_seconds,
                kind: draft.kind,
                started_at: draft.started_at,
                ended_at: draft.ended_at,
                notes: draft.notes,
                created_at: draft.ended_at,
            };
            state.sessions.push((draft.subject, session.clone()));
            Ok(session)
        }
    }

    fn list_sessions(
        &self,
        subject: &TrackedSubject,
    ) -> impl Future<Output = Result<Vec<Session>, ApiError>> + Send {
        let result = if std::mem::take(&mut self.state().fail_list) {
            Err(ApiError::Network("connection reset".to_owned()))
        } else {
            Ok(self.sessions(subject))
        };
        async move { result }
    }

    fn delete_session(&self, id: SessionId) -> impl Future<Output = Result<(), ApiError>> + Send {
        let api = self.clone();
        async move {
            let mut state = api.state();
            if std::mem::take(&mut state.fail_delete) {
                return Err(ApiError::Network("connection reset".to_owned()));
            }
            let before = state.sessions.len();
            state.sessions.retain(|(_, session)| session.id != id);
            if state.sessions.len() == before {
                return Err(ApiError::Status {
                    code: 404,
                    message: format!("session {id} not found"),
                });
            }
            Ok(())
        }
    }

    fn accumulated_time(
        &self,
        subject: &TrackedSubject,
    ) -> impl Future<Output = Result<u64, ApiError>> + Send {
        let total = {
            let state = self.state();
            let preset = state.preset_totals.get(subject).copied().unwrap_or(0);
            let delivered: u64 = state
                .deltas
                .iter()
                .filter(|call| &call.subject == subject)
                .map(|call| call.seconds)
                .sum();
            preset + delivered
        };
        async move { Ok(total) }
    }
}

/// In-memory [`TeardownTransport`] that records every body it accepts.
#[derive(Clone)]
pub struct TestBeacon {
    bodies: Arc<Mutex<Vec<String>>>,
    available: bool,
}

impl TestBeacon {
    pub fn new() -> Self {
        Self {
            bodies: Default::default(),
            available: true,
        }
    }

    /// A transport that refuses everything, like a host without beacon support.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Accepted request bodies, in dispatch order.
    pub fn bodies(&self) -> Vec<String> {
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Accepted payloads, decoded.
    pub fn payloads(&self) -> Vec<TeardownPayload> {
        self.bodies()
            .iter()
            .map(|body| serde_json::from_str(body).expect("beacon bodies are valid JSON"))
            .collect()
    }
}

impl Default for TestBeacon {
    fn default() -> Self {
        Self::new()
    }
}

impl TeardownTransport for TestBeacon {
    fn dispatch(&self, payload: &TeardownPayload) -> bool {
        if !self.available {
            return false;
        }
        match payload.to_body() {
            Ok(body) => {
                self.bodies
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(body);
                true
            }
            Err(_) => false,
        }
    }
}
