// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! What is being timed.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The kind of content a tracker measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Exercise,
    Lesson,
    Exam,
}

impl ContentType {
    /// The wire name, as used in request paths and bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exercise => "exercise",
            Self::Lesson => "lesson",
            Self::Exam => "exam",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown content type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContentTypeError(String);

impl fmt::Display for ParseContentTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown content type `{}`", self.0)
    }
}

impl std::error::Error for ParseContentTypeError {}

impl FromStr for ContentType {
    type Err = ParseContentTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exercise" => Ok(Self::Exercise),
            "lesson" => Ok(Self::Lesson),
            "exam" => Ok(Self::Exam),
            other => Err(ParseContentTypeError(other.to_owned())),
        }
    }
}

/// A `(content type, content id)` pair identifying what one tracker measures.
///
/// A tracker never mutates its subject in place: switching to another subject
/// flushes and resets the accumulated time first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedSubject {
    pub content_type: ContentType,
    pub content_id: String,
}

impl TrackedSubject {
    pub fn new(content_type: ContentType, content_id: impl Into<String>) -> Self {
        Self {
            content_type,
            content_id: content_id.into(),
        }
    }

    pub fn exercise(content_id: impl Into<String>) -> Self {
        Self::new(ContentType::Exercise, content_id)
    }

    pub fn lesson(content_id: impl Into<String>) -> Self {
        Self::new(ContentType::Lesson, content_id)
    }

    pub fn exam(content_id: impl Into<String>) -> Self {
        Self::new(ContentType::Exam, content_id)
    }
}

impl fmt::Display for TrackedSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.content_type, self.content_id)
    }
}
