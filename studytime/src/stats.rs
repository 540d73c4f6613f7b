// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Statistics over a subject's saved sessions.
//!
//! Sessions time how long the user needs for a piece of content, so shorter is
//! better: `best` is the shortest run and a positive improvement means the
//! recent runs got faster.

use studytime_core::Session;

/// Default number of sessions in each improvement window.
pub const DEFAULT_IMPROVEMENT_WINDOW: usize = 5;

/// Direction of the recent sessions compared with the ones before them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Declining,
    Steady,
}

/// Summary of a subject's session history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionStats {
    pub count: usize,
    /// Shortest duration, in seconds.
    pub best: Option<u64>,
    /// Longest duration, in seconds.
    pub worst: Option<u64>,
    /// Mean duration, in seconds.
    pub average: Option<f64>,
    pub last_session: Option<Session>,
    /// How much faster the latest window is than the window before it, in percent.
    ///
    /// `None` until both windows are full.
    pub improvement_percent: Option<f64>,
}

fn mean(sessions: &[Session]) -> Option<f64> {
    if sessions.is_empty() {
        return None;
    }
    let total: u64 = sessions.iter().map(|s| s.duration_seconds).sum();
    Some(total as f64 / sessions.len() as f64)
}

impl SessionStats {
    /// Compute statistics for `sessions`, ordered newest first.
    ///
    /// The improvement compares the newest `window` sessions with the `window`
    /// sessions before them.
    pub fn compute(sessions: &[Session], window: usize) -> Self {
        let durations = sessions.iter().map(|s| s.duration_seconds);
        let improvement_percent = if window > 0 && sessions.len() >= 2 * window {
            let recent = mean(&sessions[..window]);
            let older = mean(&sessions[window..2 * window]);
            match (recent, older) {
                (Some(recent), Some(older)) if older > 0.0 => {
                    Some((older - recent) / older * 100.0)
                }
                _ => None,
            }
        } else {
            None
        };
        Self {
            count: sessions.len(),
            best: durations.clone().min(),
            worst: durations.max(),
            average: mean(sessions),
            last_session: sessions.first().cloned(),
            improvement_percent,
        }
    }

    pub fn trend(&self) -> Option<Trend> {
        self.improvement_percent.map(|percent| {
            if percent > 0.0 {
                Trend::Improving
            } else if percent < 0.0 {
                Trend::Declining
            } else {
                Trend::Steady
            }
        })
    }
}
