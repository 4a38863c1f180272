//! Turns an [`AnalysisRecord`] into the desired WIP limit of every column.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::round_half_up;
use crate::formula;
use crate::template::{TemplateError, WipPresets};
use crate::{AnalysisRecord, ColumnSpec, WipLimit, WipLimitMap};

/// Limit used when a formula fails and no preset covers the column.
pub const FALLBACK_WIP_LIMIT: u32 = 2;

/// Where a column's limit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSource {
    Fixed,
    Formula,
    Preset,
    Fallback,
}

/// Resolves the limit of a single column.
///
/// Precedence: fixed limit (verbatim, `None` = unbounded) > clamped formula
/// result > preset for the team-size class > [`FALLBACK_WIP_LIMIT`].
pub fn resolve_column(
    column: &ColumnSpec,
    presets: &WipPresets,
    analysis: &AnalysisRecord,
) -> Result<(Option<WipLimit>, LimitSource), TemplateError> {
    column.validate()?;

    if let Some(fixed) = column.fixed_wip_limit {
        // validate() rejects a fixed limit of zero.
        return Ok((fixed.and_then(WipLimit::new), LimitSource::Fixed));
    }

    let Some(source) = column.wip_limit_formula.as_deref() else {
        return Err(TemplateError::MissingLimitRule {
            purpose: column.purpose.clone(),
        });
    };

    match formula::evaluate(source, f64::from(analysis.contributor_count)) {
        Ok(raw) => {
            let (min, max) = column.bounds();
            let clamped = round_half_up(raw.clamp(f64::from(min), f64::from(max))) as u32;
            debug!(
                purpose = %column.purpose,
                formula = source,
                raw,
                limit = clamped,
                "evaluated WIP formula"
            );
            Ok((WipLimit::new(clamped), LimitSource::Formula))
        }
        Err(error) => {
            let preset = presets.lookup(analysis.team_size, &column.purpose);
            warn!(
                purpose = %column.purpose,
                formula = source,
                %error,
                team_size = %analysis.team_size,
                preset = preset.map(WipLimit::as_u32),
                "WIP formula could not be evaluated; falling back to preset"
            );
            Ok(match preset {
                Some(limit) => (Some(limit), LimitSource::Preset),
                None => (WipLimit::new(FALLBACK_WIP_LIMIT), LimitSource::Fallback),
            })
        }
    }
}

/// Computes the WIP limit map for `columns`.
///
/// Deterministic: identical columns, presets and analysis always produce an
/// identical map with exactly one entry per column purpose.
pub fn compute_limits(
    columns: &[ColumnSpec],
    presets: &WipPresets,
    analysis: &AnalysisRecord,
) -> Result<WipLimitMap, TemplateError> {
    let mut limits = WipLimitMap::new();
    for column in columns {
        let (limit, _) = resolve_column(column, presets, analysis)?;
        limits.insert(column.purpose.clone(), limit);
    }
    Ok(limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnPurpose, TeamSize};

    fn record(contributor_count: u32) -> AnalysisRecord {
        AnalysisRecord {
            contributor_count,
            active_contributor_count: 0,
            issue_velocity: 0,
            pr_frequency: 0,
            avg_review_time_days: 2,
            team_size: TeamSize::classify(contributor_count),
            degraded: false,
        }
    }

    fn purpose(p: &str) -> ColumnPurpose {
        ColumnPurpose::new(p).unwrap()
    }

    #[test]
    fn small_team_formula_doubles_contributors() {
        let columns = [ColumnSpec::with_formula("Backlog", "backlog", "team_size * 2")
            .unwrap()
            .bounded(1, 20)];
        let analysis = record(2);
        assert_eq!(analysis.team_size, TeamSize::Small);

        let limits = compute_limits(&columns, &WipPresets::default(), &analysis).unwrap();
        assert_eq!(limits.get(&purpose("backlog")), Some(WipLimit::new(4)));
    }

    #[test]
    fn large_team_result_is_clamped_to_max() {
        let columns = [ColumnSpec::with_formula("Doing", "implementation", "team_size")
            .unwrap()
            .bounded(1, 5)];
        let analysis = record(12);
        assert_eq!(analysis.team_size, TeamSize::Large);

        let limits = compute_limits(&columns, &WipPresets::default(), &analysis).unwrap();
        assert_eq!(limits.get(&purpose("implementation")), Some(WipLimit::new(5)));
    }

    #[test]
    fn results_stay_within_bounds_and_are_integers() {
        for (formula, contributors) in [
            ("team_size / 3", 1),
            ("team_size * 10", 9),
            ("0 - team_size", 4),
            ("team_size / 2", 7),
            ("2.49", 0),
        ] {
            let column = ColumnSpec::with_formula("C", "c", formula).unwrap().bounded(2, 8);
            let (limit, source) =
                resolve_column(&column, &WipPresets::default(), &record(contributors)).unwrap();
            let value = limit.unwrap().as_u32();
            assert_eq!(source, LimitSource::Formula);
            assert!((2..=8).contains(&value), "{formula} -> {value}");
        }

        // 7 / 2 = 3.5 rounds half up.
        let column = ColumnSpec::with_formula("C", "c", "team_size / 2").unwrap();
        let (limit, _) = resolve_column(&column, &WipPresets::default(), &record(7)).unwrap();
        assert_eq!(limit, WipLimit::new(4));
    }

    #[test]
    fn default_bounds_are_one_to_twenty() {
        let column = ColumnSpec::with_formula("C", "c", "team_size * 100").unwrap();
        let (limit, _) = resolve_column(&column, &WipPresets::default(), &record(3)).unwrap();
        assert_eq!(limit, WipLimit::new(20));

        let column = ColumnSpec::with_formula("C", "c", "team_size - 10").unwrap();
        let (limit, _) = resolve_column(&column, &WipPresets::default(), &record(3)).unwrap();
        assert_eq!(limit, WipLimit::new(1));
    }

    #[test]
    fn fixed_limits_are_used_verbatim() {
        let columns = [
            ColumnSpec::with_fixed("Done", "done", None).unwrap(),
            // Fixed limits bypass the clamp even when bounds are set.
            ColumnSpec::with_fixed("Review", "review", Some(30)).unwrap().bounded(1, 5),
        ];
        for contributors in [0, 3, 12, 500] {
            let limits =
                compute_limits(&columns, &WipPresets::default(), &record(contributors)).unwrap();
            assert_eq!(limits.get(&purpose("done")), Some(None));
            assert_eq!(limits.get(&purpose("review")), Some(WipLimit::new(30)));
        }
    }

    #[test]
    fn fixed_limit_wins_over_formula() {
        let mut column = ColumnSpec::with_formula("Done", "done", "team_size").unwrap();
        column.fixed_wip_limit = Some(None);
        let (limit, source) = resolve_column(&column, &WipPresets::default(), &record(6)).unwrap();
        assert_eq!((limit, source), (None, LimitSource::Fixed));
    }

    #[test]
    fn failing_formula_uses_preset_for_team_size() {
        let mut presets = WipPresets::default();
        presets.set(TeamSize::Medium, purpose("review"), 7);
        presets.set(TeamSize::Large, purpose("review"), 11);

        let column = ColumnSpec::with_formula("Review", "review", "team_size / 0").unwrap();
        let (limit, source) = resolve_column(&column, &presets, &record(5)).unwrap();
        assert_eq!((limit, source), (WipLimit::new(7), LimitSource::Preset));

        let unsafe_column = ColumnSpec::with_formula("Review", "review", "require('fs')").unwrap();
        let large = record(5).with_team_size(TeamSize::Large);
        let (limit, _) = resolve_column(&unsafe_column, &presets, &large).unwrap();
        assert_eq!(limit, WipLimit::new(11));
    }

    #[test]
    fn failing_formula_without_preset_uses_two() {
        let column = ColumnSpec::with_formula("Design", "design", "team_size +").unwrap();
        let (limit, source) = resolve_column(&column, &WipPresets::default(), &record(5)).unwrap();
        assert_eq!((limit, source), (WipLimit::new(2), LimitSource::Fallback));
    }

    #[test]
    fn column_without_rule_is_rejected() {
        let mut column = ColumnSpec::with_formula("X", "x", "1").unwrap();
        column.wip_limit_formula = None;
        assert!(matches!(
            compute_limits(&[column], &WipPresets::default(), &record(3)),
            Err(TemplateError::MissingLimitRule { .. })
        ));
    }

    #[test]
    fn computation_is_deterministic_and_complete() {
        let template = crate::BoardTemplate::builtin();
        let analysis = record(6);
        let first = compute_limits(&template.columns, &template.wip_presets, &analysis).unwrap();
        let second = compute_limits(&template.columns, &template.wip_presets, &analysis).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), template.columns.len());
        for column in &template.columns {
            assert!(first.get(&column.purpose).is_some(), "{}", column.purpose);
        }
    }
}
