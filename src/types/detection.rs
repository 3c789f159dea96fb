//! Detection identifier types

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Prefix used by the counter when issuing identifiers.
pub const DETECTION_ID_PREFIX: &str = "detection#";

/// Opaque identifier of one physical pothole encounter.
///
/// Issued by the counter as `detection#<n>`, but devices may send any
/// non-empty token. Identifiers that carry the counter prefix sort by their
/// numeric sequence so `detection#2` precedes `detection#10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionId(String);

impl DetectionId {
    /// Wrap a raw header value.
    ///
    /// Returns `None` for blank tokens and for tokens that cannot be used as a
    /// file name component (path separators, control characters, `.`/`..`).
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let unsafe_name = trimmed.is_empty()
            || trimmed == "."
            || trimmed == ".."
            || trimmed.chars().any(|c| c == '/' || c == '\\' || c.is_control());
        if unsafe_name {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Identifier issued by the counter for sequence number `n`.
    pub fn from_sequence(n: u64) -> Self {
        Self(format!("{DETECTION_ID_PREFIX}{n}"))
    }

    /// Counter sequence number, when the id was issued by the counter.
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix(DETECTION_ID_PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the image artifact for this detection.
    pub fn image_filename(&self) -> String {
        format!("{}.jpg", self.0)
    }
}

impl fmt::Display for DetectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for DetectionId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.sequence(), other.sequence()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for DetectionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
