//! Reduction of raw repository activity into an [`AnalysisRecord`].

use serde::{Deserialize, Serialize};

use crate::{ContributorStat, Issue, PullRequest, TeamSize};

/// Weeks the issue and pull-request counts are normalised over.
///
/// Fixed regardless of the fetch window so formula units stay stable.
pub const NORMALIZATION_WEEKS: f64 = 4.0;

/// Review time reported when no pull request in the window has been merged.
pub const DEFAULT_REVIEW_TIME_DAYS: u32 = 2;

/// Contributors with more contributions than this count as active.
pub const ACTIVE_CONTRIBUTION_THRESHOLD: u32 = 5;

/// Contributor count assumed when the repository could not be analysed.
pub const DEGRADED_CONTRIBUTOR_COUNT: u32 = 5;

/// Activity metrics of a repository, derived once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub contributor_count: u32,
    /// Contributors with more than [`ACTIVE_CONTRIBUTION_THRESHOLD`] contributions.
    pub active_contributor_count: u32,
    /// Issues per week.
    pub issue_velocity: u32,
    /// Pull requests per week.
    pub pr_frequency: u32,
    /// Mean creation-to-merge latency of merged pull requests, in days.
    pub avg_review_time_days: u32,
    pub team_size: TeamSize,
    /// `true` when the record is the fallback used after a collection failure.
    #[serde(default)]
    pub degraded: bool,
}

impl AnalysisRecord {
    /// Record used when activity could not be collected: a medium team of five
    /// with every other metric at its zero value.
    pub fn degraded() -> Self {
        Self {
            contributor_count: DEGRADED_CONTRIBUTOR_COUNT,
            active_contributor_count: 0,
            issue_velocity: 0,
            pr_frequency: 0,
            avg_review_time_days: 0,
            team_size: TeamSize::Medium,
            degraded: true,
        }
    }

    /// Replaces the derived team-size class with an explicit one.
    ///
    /// The override wins even when it contradicts the contributor count.
    pub fn with_team_size(mut self, team_size: TeamSize) -> Self {
        self.team_size = team_size;
        self
    }
}

/// Derives an [`AnalysisRecord`] from raw signals.
///
/// `issues` must already exclude pull requests.
pub fn analyze(
    contributors: &[ContributorStat],
    issues: &[Issue],
    pull_requests: &[PullRequest],
) -> AnalysisRecord {
    let contributor_count = saturating_u32(contributors.len());
    let active_contributor_count = saturating_u32(
        contributors
            .iter()
            .filter(|c| c.contributions > ACTIVE_CONTRIBUTION_THRESHOLD)
            .count(),
    );

    AnalysisRecord {
        contributor_count,
        active_contributor_count,
        issue_velocity: per_week(issues.len()),
        pr_frequency: per_week(pull_requests.len()),
        avg_review_time_days: average_review_days(pull_requests),
        team_size: TeamSize::classify(contributor_count),
        degraded: false,
    }
}

fn per_week(count: usize) -> u32 {
    round_half_up(count as f64 / NORMALIZATION_WEEKS).max(0.0) as u32
}

fn average_review_days(pull_requests: &[PullRequest]) -> u32 {
    let latencies: Vec<f64> = pull_requests
        .iter()
        .filter_map(PullRequest::merge_latency_hours)
        .collect();
    if latencies.is_empty() {
        return DEFAULT_REVIEW_TIME_DAYS;
    }

    let mean_hours = latencies.iter().sum::<f64>() / latencies.len() as f64;
    // Clock skew can make a merge precede creation; never report negative days.
    round_half_up(mean_hours / 24.0).max(0.0) as u32
}

/// Rounds to the nearest integer with halves going up (2.5 → 3, -2.5 → -2).
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::{ContributorLogin, IssueNumber, PullRequestNumber, Timestamp};

    fn contributor(login: &str, contributions: u32) -> ContributorStat {
        ContributorStat {
            login: ContributorLogin::new(login).unwrap(),
            contributions,
        }
    }

    fn issues(n: u64) -> Vec<Issue> {
        let at = Timestamp::from_utc(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        (1..=n)
            .map(|i| Issue {
                number: IssueNumber::new(i),
                title: format!("issue {i}"),
                created_at: at,
            })
            .collect()
    }

    fn pr(number: u64, merged_after_hours: Option<i64>) -> PullRequest {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        PullRequest {
            number: PullRequestNumber::new(number),
            created_at: Timestamp::from_utc(created),
            merged_at: merged_after_hours
                .map(|h| Timestamp::from_utc(created + Duration::hours(h))),
        }
    }

    #[test]
    fn counts_contributors_and_active_contributors() {
        let record = analyze(
            &[contributor("a", 5), contributor("b", 6), contributor("c", 40)],
            &[],
            &[],
        );
        assert_eq!(record.contributor_count, 3);
        assert_eq!(record.active_contributor_count, 2);
        assert_eq!(record.team_size, TeamSize::Small);
        assert!(!record.degraded);
    }

    #[test]
    fn normalises_counts_over_four_weeks() {
        let prs: Vec<_> = (1..=6).map(|n| pr(n, None)).collect();
        let record = analyze(&[], &issues(10), &prs);
        // 10 / 4 = 2.5 rounds up, 6 / 4 = 1.5 rounds up.
        assert_eq!(record.issue_velocity, 3);
        assert_eq!(record.pr_frequency, 2);

        let record = analyze(&[], &issues(9), &[pr(1, None)]);
        assert_eq!(record.issue_velocity, 2);
        assert_eq!(record.pr_frequency, 0);
    }

    #[test]
    fn review_time_defaults_to_two_days_without_merges() {
        let record = analyze(&[], &[], &[pr(1, None), pr(2, None)]);
        assert_eq!(record.avg_review_time_days, DEFAULT_REVIEW_TIME_DAYS);

        let record = analyze(&[], &[], &[]);
        assert_eq!(record.avg_review_time_days, 2);
    }

    #[test]
    fn review_time_averages_merged_prs_only() {
        // (24 + 72) / 2 = 48h = 2 days; the unmerged PR is ignored.
        let record = analyze(&[], &[], &[pr(1, Some(24)), pr(2, Some(72)), pr(3, None)]);
        assert_eq!(record.avg_review_time_days, 2);

        // 84h = 3.5 days rounds up to 4.
        let record = analyze(&[], &[], &[pr(1, Some(84))]);
        assert_eq!(record.avg_review_time_days, 4);

        // 6h rounds down to 0 days.
        let record = analyze(&[], &[], &[pr(1, Some(6))]);
        assert_eq!(record.avg_review_time_days, 0);
    }

    #[test]
    fn degraded_record_is_a_medium_team_of_five() {
        let record = AnalysisRecord::degraded();
        assert_eq!(record.team_size, TeamSize::Medium);
        assert_eq!(record.contributor_count, 5);
        assert_eq!(record.issue_velocity, 0);
        assert_eq!(record.pr_frequency, 0);
        assert_eq!(record.active_contributor_count, 0);
        assert!(record.degraded);
    }

    #[test]
    fn team_size_override_wins() {
        let contributors: Vec<_> = (0..12).map(|i| contributor(&format!("c{i}"), 1)).collect();
        let record = analyze(&contributors, &[], &[]).with_team_size(TeamSize::Small);
        assert_eq!(record.contributor_count, 12);
        assert_eq!(record.team_size, TeamSize::Small);
    }
}
