// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Turning finished stopwatch runs into persisted sessions.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};
use studytime_core::{NewSession, Session, SessionId, SessionKind, StudyApi, TrackedSubject};
use studytime_timesource::TimeSource;
use tracing::{debug, warn};

use crate::{error::SessionError, stats::SessionStats, tracker::Tracker};

/// Cached session history for one subject, with derived [`SessionStats`].
///
/// The server owns the sessions; this is a read-only copy kept newest first.
/// Until the history has been fetched once, every save or delete fetches it so
/// the statistics always cover the whole history, not just this run's sessions.
#[derive(Debug)]
pub struct SessionManager<A: StudyApi> {
    api: Arc<A>,
    subject: TrackedSubject,
    enabled: bool,
    time_source: TimeSource,
    window: usize,
    sessions: Vec<Session>,
    loaded: bool,
    stats: SessionStats,
}

impl<A: StudyApi> SessionManager<A> {
    pub(crate) fn new(
        api: Arc<A>,
        subject: TrackedSubject,
        enabled: bool,
        time_source: TimeSource,
        window: usize,
    ) -> Self {
        Self {
            api,
            subject,
            enabled,
            time_source,
            window,
            sessions: Vec::new(),
            loaded: false,
            stats: SessionStats::default(),
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    fn replace(&mut self, mut sessions: Vec<Session>) {
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        self.stats = SessionStats::compute(&sessions, self.window);
        self.sessions = sessions;
    }

    /// Re-fetch the history from the server.
    pub async fn load(&mut self) -> Result<&[Session], SessionError> {
        if !self.enabled {
            return Ok(&self.sessions);
        }
        let sessions = self
            .api
            .list_sessions(&self.subject)
            .await
            .map_err(SessionError::Load)?;
        self.replace(sessions);
        self.loaded = true;
        Ok(&self.sessions)
    }

    /// Bring the cache up to date after a change the server already accepted.
    ///
    /// A loaded cache is patched locally with `apply`. Otherwise the history is
    /// fetched; if that fails, `apply` is used on what is cached so far.
    async fn sync(&mut self, apply: impl FnOnce(&mut Vec<Session>)) {
        if !self.loaded {
            match self.api.list_sessions(&self.subject).await {
                Ok(sessions) => {
                    self.replace(sessions);
                    self.loaded = true;
                    return;
                }
                Err(error) => warn!(
                    subject = %self.subject,
                    %error,
                    "failed to load sessions, history is partial"
                ),
            }
        }
        let mut sessions = std::mem::take(&mut self.sessions);
        apply(&mut sessions);
        self.replace(sessions);
    }

    /// Persist the run measured by `tracker` and reset it.
    ///
    /// The tracker is paused, its pending seconds are delivered, and the session is
    /// recorded with the full elapsed time. Only then is the tracker zeroed: if any
    /// step fails the measured time stays in place for a retry.
    ///
    /// Returns `Ok(None)` when tracking is disabled.
    pub async fn save(
        &mut self,
        tracker: &Tracker<A>,
        kind: SessionKind,
        notes: String,
        started_at: Option<SystemTime>,
    ) -> Result<Option<Session>, SessionError> {
        if !self.enabled {
            return Ok(None);
        }
        tracker.pause();
        let duration_seconds = tracker.elapsed_seconds();
        if duration_seconds == 0 {
            return Err(SessionError::NothingToSave);
        }
        tracker.flush_pending().await.map_err(SessionError::Flush)?;

        let ended_at = self.time_source.system_time();
        let started_at = started_at.unwrap_or_else(|| {
            ended_at
                .checked_sub(Duration::from_secs(duration_seconds))
                .unwrap_or(UNIX_EPOCH)
        });
        let draft = NewSession {
            subject: self.subject.clone(),
            duration_seconds,
            kind,
            started_at: DateTime::<Utc>::from(started_at),
            ended_at: DateTime::<Utc>::from(ended_at),
            notes,
        };
        let session = self
            .api
            .record_session(&draft)
            .await
            .map_err(SessionError::Persist)?;
        debug!(subject = %self.subject, id = %session.id, duration_seconds, "session saved");

        tracker.discard();
        let saved = session.clone();
        self.sync(move |sessions| sessions.push(saved)).await;
        Ok(Some(session))
    }

    /// Delete a session on the server, then drop it from the cached history.
    ///
    /// A failure leaves the cache untouched.
    pub async fn delete(&mut self, id: SessionId) -> Result<(), SessionError> {
        if !self.enabled {
            return Ok(());
        }
        self.api
            .delete_session(id)
            .await
            .map_err(SessionError::Delete)?;
        self.sync(|sessions| sessions.retain(|session| session.id != id))
            .await;
        Ok(())
    }
}
