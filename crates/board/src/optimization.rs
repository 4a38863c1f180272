//! Diffing a board against the template and the desired WIP limits.
//!
//! The board service has no native WIP limits. Each template column is an
//! option of the template's single-select stage field, and the column's limit
//! lives in that option's description as `WIP limit: N` (or
//! `WIP limit: unbounded`). [`plan_optimizations`] turns the differences
//! between what the board has and what the template wants into an ordered list
//! of [`OptimizationAction`]s.

use serde::{Deserialize, Serialize};

use crate::{
    BoardHandle, BoardTemplate, ColumnPurpose, FieldDataType, FieldId, FieldKind, FieldOptionSpec,
    FieldSpec, OptionColor, WipLimit, WipLimitMap,
};

const WIP_MARKER: &str = "WIP limit:";
const UNBOUNDED: &str = "unbounded";

// ---------------------------------------------------------------------------
// WIP limit encoding
// ---------------------------------------------------------------------------

/// Encodes a limit as an option description.
pub fn encode_wip_limit(limit: Option<WipLimit>) -> String {
    match limit {
        Some(limit) => format!("{WIP_MARKER} {limit}"),
        None => format!("{WIP_MARKER} {UNBOUNDED}"),
    }
}

/// Decodes the limit recorded in an option description.
///
/// Returns `None` when the description carries no (valid) marker, and
/// `Some(None)` for an explicitly unbounded column. The marker may appear on
/// any line of the description.
pub fn decode_wip_limit(description: &str) -> Option<Option<WipLimit>> {
    description.lines().find_map(|line| {
        let value = line.trim().strip_prefix(WIP_MARKER)?.trim();
        if value.eq_ignore_ascii_case(UNBOUNDED) {
            Some(None)
        } else {
            value.parse::<u32>().ok().and_then(WipLimit::new).map(Some)
        }
    })
}

/// Replaces the limit recorded in `description`, keeping every other line.
///
/// Lines starting with the marker are dropped and the new marker is appended
/// as the last line.
pub fn rewrite_wip_limit(description: &str, limit: Option<WipLimit>) -> String {
    let marker = encode_wip_limit(limit);
    let mut lines: Vec<&str> = description
        .lines()
        .filter(|line| !line.trim().starts_with(WIP_MARKER))
        .collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines.push(&marker);
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// What an optimization action changes on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizationKind {
    /// Create a field the board is missing.
    AddField { spec: FieldSpec },
    /// Add a column option to the existing stage field.
    AddColumn {
        field_id: FieldId,
        purpose: ColumnPurpose,
        option: FieldOptionSpec,
        wip_limit: Option<WipLimit>,
    },
    /// Rewrite the WIP limit recorded on an existing column option.
    AdjustWipLimit {
        field_id: FieldId,
        purpose: ColumnPurpose,
        option_name: String,
        /// Limit currently recorded; `None` when the option carries no marker.
        current: Option<Option<WipLimit>>,
        desired: Option<WipLimit>,
    },
}

impl OptimizationKind {
    /// Short label used in logs.
    pub fn label(&self) -> String {
        match self {
            OptimizationKind::AddField { spec } => format!("add field '{}'", spec.name),
            OptimizationKind::AddColumn { option, .. } => format!("add column '{}'", option.name),
            OptimizationKind::AdjustWipLimit {
                option_name,
                desired,
                ..
            } => format!(
                "set WIP limit of '{option_name}' to {}",
                desired.map_or_else(|| UNBOUNDED.to_string(), |l| l.to_string())
            ),
        }
    }
}

/// What happened to an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Planned but not attempted (yet).
    Pending,
    /// Applied successfully.
    Applied,
    /// Attempted and failed; the run continued without it.
    Skipped { reason: String },
}

/// A planned change together with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationAction {
    #[serde(flatten)]
    pub kind: OptimizationKind,
    pub outcome: ActionOutcome,
}

impl OptimizationAction {
    /// Wraps a kind in a [`ActionOutcome::Pending`] action.
    pub fn pending(kind: OptimizationKind) -> Self {
        Self {
            kind,
            outcome: ActionOutcome::Pending,
        }
    }

    /// Returns `true` once the action has been applied.
    pub fn is_applied(&self) -> bool {
        self.outcome == ActionOutcome::Applied
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// The single-select field that carries every template column, with limits
/// encoded in the option descriptions.
pub fn stage_field_spec(template: &BoardTemplate, limits: &WipLimitMap) -> FieldSpec {
    FieldSpec {
        name: template.stage_field.clone(),
        kind: FieldKind::SingleSelect,
        options: template
            .columns
            .iter()
            .map(|column| {
                column_option(
                    column.name.clone(),
                    column.color,
                    desired(limits, &column.purpose),
                )
            })
            .collect(),
    }
}

fn column_option(name: String, color: OptionColor, limit: Option<WipLimit>) -> FieldOptionSpec {
    FieldOptionSpec {
        name,
        color,
        description: encode_wip_limit(limit),
    }
}

fn desired(limits: &WipLimitMap, purpose: &ColumnPurpose) -> Option<WipLimit> {
    // A purpose absent from the map is treated as unbounded.
    limits.get(purpose).flatten()
}

/// Custom fields from the template that the board does not have yet.
pub fn missing_custom_fields(board: &BoardHandle, template: &BoardTemplate) -> Vec<FieldSpec> {
    template
        .custom_fields
        .iter()
        .filter(|spec| board.field_named(&spec.name).is_none())
        .cloned()
        .collect()
}

/// Column additions and WIP adjustments needed on an existing stage field.
///
/// Returns `None` when the board has no single-select field named after the
/// template's stage field.
pub fn plan_column_changes(
    board: &BoardHandle,
    template: &BoardTemplate,
    limits: &WipLimitMap,
) -> Option<Vec<OptimizationKind>> {
    let field = board
        .field_named(&template.stage_field)
        .filter(|f| f.data_type == FieldDataType::SingleSelect)?;

    let changes = template
        .columns
        .iter()
        .filter_map(|column| {
            let wanted = desired(limits, &column.purpose);
            match field.option_named(&column.name) {
                None => Some(OptimizationKind::AddColumn {
                    field_id: field.id.clone(),
                    purpose: column.purpose.clone(),
                    option: column_option(column.name.clone(), column.color, wanted),
                    wip_limit: wanted,
                }),
                Some(option) => {
                    let current = decode_wip_limit(&option.description);
                    (current != Some(wanted)).then(|| OptimizationKind::AdjustWipLimit {
                        field_id: field.id.clone(),
                        purpose: column.purpose.clone(),
                        option_name: option.name.clone(),
                        current,
                        desired: wanted,
                    })
                }
            }
        })
        .collect();
    Some(changes)
}

/// Plans every change that brings `board` in line with `template` and `limits`.
///
/// Order: missing custom fields, then either the whole stage field (when the
/// board lacks it) or per-column additions/adjustments in template order.
pub fn plan_optimizations(
    board: &BoardHandle,
    template: &BoardTemplate,
    limits: &WipLimitMap,
) -> Vec<OptimizationAction> {
    let mut kinds: Vec<OptimizationKind> = missing_custom_fields(board, template)
        .into_iter()
        .map(|spec| OptimizationKind::AddField { spec })
        .collect();

    match plan_column_changes(board, template, limits) {
        Some(changes) => kinds.extend(changes),
        None => kinds.push(OptimizationKind::AddField {
            spec: stage_field_spec(template, limits),
        }),
    }

    kinds.into_iter().map(OptimizationAction::pending).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoardField, BoardId, ColumnSpec, FieldOption, WipPresets};

    fn purpose(p: &str) -> ColumnPurpose {
        ColumnPurpose::new(p).unwrap()
    }

    fn template() -> BoardTemplate {
        BoardTemplate {
            name: "Flow".into(),
            description: String::new(),
            stage_field: "Status".into(),
            columns: vec![
                ColumnSpec::with_formula("Doing", "doing", "team_size").unwrap(),
                ColumnSpec::with_fixed("Done", "done", None).unwrap(),
            ],
            custom_fields: vec![FieldSpec {
                name: "Estimate".into(),
                kind: FieldKind::Number,
                options: vec![],
            }],
            wip_presets: WipPresets::default(),
        }
    }

    fn limits() -> WipLimitMap {
        let mut map = WipLimitMap::new();
        map.insert(purpose("doing"), WipLimit::new(3));
        map.insert(purpose("done"), None);
        map
    }

    fn board(fields: Vec<BoardField>) -> BoardHandle {
        BoardHandle {
            id: BoardId::new("PVT_1").unwrap(),
            number: None,
            title: "Flow".into(),
            short_description: None,
            url: "https://example.test/p/1".into(),
            closed: false,
            fields,
            views: vec![],
        }
    }

    fn status_field(options: &[(&str, &str)]) -> BoardField {
        BoardField {
            id: FieldId::new("F_status").unwrap(),
            name: "Status".into(),
            data_type: FieldDataType::SingleSelect,
            options: options
                .iter()
                .map(|(name, description)| FieldOption {
                    id: None,
                    name: name.to_string(),
                    color: OptionColor::Gray,
                    description: description.to_string(),
                })
                .collect(),
        }
    }

    fn estimate_field() -> BoardField {
        BoardField {
            id: FieldId::new("F_estimate").unwrap(),
            name: "Estimate".into(),
            data_type: FieldDataType::Number,
            options: vec![],
        }
    }

    #[test]
    fn wip_limit_encoding_round_trips_through_descriptions() {
        assert_eq!(encode_wip_limit(WipLimit::new(4)), "WIP limit: 4");
        assert_eq!(encode_wip_limit(None), "WIP limit: unbounded");
        assert_eq!(decode_wip_limit("Work in flight\nWIP limit: 4"), Some(WipLimit::new(4)));
        assert_eq!(decode_wip_limit("WIP limit: Unbounded"), Some(None));
        assert_eq!(decode_wip_limit("WIP limit: 0"), None);
        assert_eq!(decode_wip_limit("no marker here"), None);
    }

    #[test]
    fn rewriting_keeps_the_rest_of_the_description() {
        assert_eq!(rewrite_wip_limit("", WipLimit::new(2)), "WIP limit: 2");
        assert_eq!(
            rewrite_wip_limit("Work in flight\nWIP limit: 8\n", WipLimit::new(3)),
            "Work in flight\nWIP limit: 3"
        );
        assert_eq!(
            rewrite_wip_limit("WIP limit: 8\nOwned by QA", None),
            "Owned by QA\nWIP limit: unbounded"
        );
    }

    #[test]
    fn board_without_stage_field_gets_everything() {
        let actions = plan_optimizations(&board(vec![]), &template(), &limits());
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| a.outcome == ActionOutcome::Pending));

        assert!(matches!(
            &actions[0].kind,
            OptimizationKind::AddField { spec } if spec.name == "Estimate"
        ));
        let OptimizationKind::AddField { spec } = &actions[1].kind else {
            panic!("expected stage field, got {:?}", actions[1].kind);
        };
        assert_eq!(spec.kind, FieldKind::SingleSelect);
        let descriptions: Vec<_> = spec.options.iter().map(|o| o.description.as_str()).collect();
        assert_eq!(descriptions, ["WIP limit: 3", "WIP limit: unbounded"]);
    }

    #[test]
    fn converged_board_needs_no_actions() {
        let board = board(vec![
            status_field(&[("Doing", "WIP limit: 3"), ("Done", "WIP limit: unbounded")]),
            estimate_field(),
        ]);
        assert!(plan_optimizations(&board, &template(), &limits()).is_empty());
    }

    #[test]
    fn adjusts_stale_limits_and_adds_missing_columns() {
        let board = board(vec![
            status_field(&[("Doing", "WIP limit: 8"), ("Todo", "")]),
            estimate_field(),
        ]);
        let actions = plan_optimizations(&board, &template(), &limits());
        assert_eq!(actions.len(), 2);

        assert_eq!(
            actions[0].kind,
            OptimizationKind::AdjustWipLimit {
                field_id: FieldId::new("F_status").unwrap(),
                purpose: purpose("doing"),
                option_name: "Doing".into(),
                current: Some(WipLimit::new(8)),
                desired: WipLimit::new(3),
            }
        );
        assert!(matches!(
            &actions[1].kind,
            OptimizationKind::AddColumn { option, wip_limit: None, .. } if option.name == "Done"
        ));
    }

    #[test]
    fn option_without_marker_is_adjusted() {
        let board = board(vec![
            status_field(&[("Doing", "in progress"), ("Done", "WIP limit: unbounded")]),
            estimate_field(),
        ]);
        let actions = plan_optimizations(&board, &template(), &limits());
        assert!(matches!(
            &actions[..],
            [OptimizationAction {
                kind: OptimizationKind::AdjustWipLimit { current: None, .. },
                ..
            }]
        ));
    }

    #[test]
    fn stage_field_of_wrong_type_is_not_reused() {
        let mut field = status_field(&[]);
        field.data_type = FieldDataType::Text;
        assert!(plan_column_changes(&board(vec![field]), &template(), &limits()).is_none());
    }

    #[test]
    fn actions_serialise_with_type_and_status() {
        let action = OptimizationAction::pending(OptimizationKind::AddField {
            spec: FieldSpec {
                name: "Estimate".into(),
                kind: FieldKind::Number,
                options: vec![],
            },
        });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "add_field");
        assert_eq!(json["outcome"]["status"], "pending");
    }
}
