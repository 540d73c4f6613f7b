// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use studytime_core::ApiError;

/// The error cases surfaced by session history operations.
///
/// These are the only failures the engine reports to the UI. Every other failure
/// is logged and retried or accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Saving was requested before any time was measured.
    NothingToSave,
    /// Pending seconds could not be delivered before saving. Nothing was reset.
    Flush(ApiError),
    /// The session could not be persisted. Nothing was reset.
    Persist(ApiError),
    /// The session could not be deleted. The cached history is unchanged.
    Delete(ApiError),
    /// The history could not be fetched. The cached history is unchanged.
    Load(ApiError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToSave => f.write_str("no time measured yet"),
            Self::Flush(_) => f.write_str("failed to deliver pending study time"),
            Self::Persist(_) => f.write_str("failed to save session"),
            Self::Delete(_) => f.write_str("failed to delete session"),
            Self::Load(_) => f.write_str("failed to load sessions"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NothingToSave => None,
            Self::Flush(err) | Self::Persist(err) | Self::Delete(err) | Self::Load(err) => {
                Some(err)
            }
        }
    }
}
