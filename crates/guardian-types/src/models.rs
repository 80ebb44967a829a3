use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Moderation state of an uploaded image.
///
/// A record starts `Pending` and moves to `Safe` or `Unsafe` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Safe,
    Unsafe,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Safe => "safe",
            Self::Unsafe => "unsafe",
        }
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "safe" => Ok(Self::Safe),
            "unsafe" => Ok(Self::Unsafe),
            other => Err(format!("unknown moderation status '{}'", other)),
        }
    }
}

/// One uploaded image and its verdict. The bytes themselves live in the
/// store and are served from [`ModerationRecord::image_ref`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub status: ModerationStatus,
    pub confidence: Option<f64>,
    pub file_name: Option<String>,
    pub content_type: String,
    pub size: u64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

impl ModerationRecord {
    pub fn image_ref(&self) -> String {
        format!("/images/{}/content", self.id)
    }
}

/// The authenticated caller, as produced by the token verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: String,
    pub is_authenticated: bool,
}

impl Principal {
    pub fn authenticated(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            is_authenticated: true,
        }
    }
}

/// A single concept returned by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Outcome of running the moderation policy over a set of label scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub is_unsafe: bool,
    pub confidence: f64,
}

impl Verdict {
    pub fn status(&self) -> ModerationStatus {
        if self.is_unsafe {
            ModerationStatus::Unsafe
        } else {
            ModerationStatus::Safe
        }
    }
}
