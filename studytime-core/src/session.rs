// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Persisted stopwatch runs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TrackedSubject;

/// Server-assigned session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Why the user was timing themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Practice,
    Study,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Practice => "practice",
            Self::Study => "study",
        })
    }
}

/// A saved stopwatch run. Owned by the server and immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub duration_seconds: u64,
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Body of a `recordSession` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub subject: TrackedSubject,
    pub duration_seconds: u64,
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn session_wire_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let session = Session {
            id: SessionId(7),
            duration_seconds: 45,
            kind: SessionKind::Practice,
            started_at: at,
            ended_at: at + chrono::Duration::seconds(45),
            notes: String::new(),
            created_at: at + chrono::Duration::seconds(46),
        };
        let json = serde_json::to_value(&session).unwrap();
        check!(json["id"] == 7);
        check!(json["kind"] == "practice");
        check!(json["duration_seconds"] == 45);

        let back: Session = serde_json::from_value(json).unwrap();
        check!(back == session);
    }
}
