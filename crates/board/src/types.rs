//! Shared value types for the board domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! values with invariants (WIP limits are strictly positive, team sizes follow
//! fixed thresholds) and participate in domain computations.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{ColumnPurpose, ContributorLogin, IssueNumber, PullRequestNumber};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so the domain API does not leak `chrono`
/// types to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns this timestamp moved `days` days into the past.
    pub fn days_before(self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// Fractional hours elapsed from `earlier` to `self` (negative if `earlier`
    /// is actually later).
    pub fn hours_since(self, earlier: Timestamp) -> f64 {
        (self.0 - earlier.0).num_seconds() as f64 / 3600.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Team size
// ---------------------------------------------------------------------------

/// Coarse team-size class derived from the contributor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSize {
    /// Up to 3 contributors.
    Small,
    /// 4 to 8 contributors.
    Medium,
    /// More than 8 contributors.
    Large,
}

impl TeamSize {
    /// Classifies a contributor count: `<= 3` small, `<= 8` medium, else large.
    pub fn classify(contributor_count: u32) -> Self {
        match contributor_count {
            0..=3 => TeamSize::Small,
            4..=8 => TeamSize::Medium,
            _ => TeamSize::Large,
        }
    }

    /// Key of this class in a template's preset tables (e.g. `"small_team"`).
    pub fn preset_key(self) -> &'static str {
        match self {
            TeamSize::Small => "small_team",
            TeamSize::Medium => "medium_team",
            TeamSize::Large => "large_team",
        }
    }

    /// Lower-case name of the class.
    pub fn as_str(self) -> &'static str {
        match self {
            TeamSize::Small => "small",
            TeamSize::Medium => "medium",
            TeamSize::Large => "large",
        }
    }
}

impl std::fmt::Display for TeamSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(TeamSize::Small),
            "medium" => Ok(TeamSize::Medium),
            "large" => Ok(TeamSize::Large),
            other => Err(format!(
                "unknown team size '{other}' (expected small, medium or large)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// WIP limits
// ---------------------------------------------------------------------------

/// A work-in-progress limit: the maximum number of items allowed in a stage.
///
/// Always strictly positive. "No limit" is modelled as `Option::<WipLimit>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct WipLimit(u32);

impl WipLimit {
    /// Creates a [`WipLimit`], returning `None` for zero.
    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Returns the underlying integer value.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for WipLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for WipLimit {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        WipLimit::new(value).ok_or_else(|| "WIP limit must be at least 1".to_string())
    }
}

impl From<WipLimit> for u32 {
    fn from(value: WipLimit) -> Self {
        value.0
    }
}

/// Desired WIP limit per workflow stage for one run.
///
/// `None` means the stage is unbounded (serialised as `null`). Keys are exactly
/// the purposes of the template columns the map was computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WipLimitMap(BTreeMap<ColumnPurpose, Option<WipLimit>>);

impl WipLimitMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the limit for `purpose`, replacing any previous entry.
    pub fn insert(&mut self, purpose: ColumnPurpose, limit: Option<WipLimit>) {
        self.0.insert(purpose, limit);
    }

    /// Looks up a purpose. The outer `Option` is `None` when the purpose is
    /// not in the map; the inner one is `None` for unbounded stages.
    pub fn get(&self, purpose: &ColumnPurpose) -> Option<Option<WipLimit>> {
        self.0.get(purpose).copied()
    }

    /// Number of stages in the map.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map has no stages.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(purpose, limit)` pairs in purpose order.
    pub fn iter(&self) -> impl Iterator<Item = (&ColumnPurpose, Option<WipLimit>)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }
}

// ---------------------------------------------------------------------------
// Repository activity signals
// ---------------------------------------------------------------------------

/// One contributor and their lifetime contribution count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorStat {
    /// Contributor login.
    pub login: ContributorLogin,
    /// Number of contributions reported by the service.
    pub contributions: u32,
}

/// An issue (never a pull request) opened or updated inside the activity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: IssueNumber,
    pub title: String,
    pub created_at: Timestamp,
}

/// A pull request together with its merge time, if merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: PullRequestNumber,
    pub created_at: Timestamp,
    pub merged_at: Option<Timestamp>,
}

impl PullRequest {
    /// Hours from creation to merge, or `None` if the pull request is unmerged.
    pub fn merge_latency_hours(&self) -> Option<f64> {
        self.merged_at.map(|merged| merged.hours_since(self.created_at))
    }
}

/// Issues and pull requests observed over the trailing activity window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityWindow {
    pub issues: Vec<Issue>,
    pub pull_requests: Vec<PullRequest>,
}

impl ActivityWindow {
    /// Length of the trailing fetch window in days.
    pub const DAYS: i64 = 30;
}
