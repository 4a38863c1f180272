//! Board template: the explicit configuration value every run is driven by.
//!
//! A template names the board, lists its workflow stages ([`ColumnSpec`]s) with
//! their WIP-limit rules, declares extra custom fields and provides preset WIP
//! tables per team-size class. Templates are decoded from YAML:
//!
//! ```yaml
//! project_board_template:
//!   name: Development Workflow
//!   description: Automated Kanban board
//!   stage_field: Status
//!   columns:
//!     - name: "Backlog"
//!       purpose: backlog
//!       wip_limit_formula: "team_size * 2"
//!       max_wip_limit: 20
//!     - { name: "Done", purpose: done, wip_limit: null }
//!   custom_fields:
//!     - { name: Estimate, type: number }
//!   wip_presets:
//!     small_team: { backlog: 6 }
//! ```
//!
//! When no template document exists the caller uses
//! [`BoardTemplate::builtin`]. Precedence is: explicit caller override >
//! template value > built-in default.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::{ColumnPurpose, FieldKind, FieldSpec, OptionColor, TeamSize, WipLimit};

/// Lower bound applied to formula results when a column sets none.
pub const DEFAULT_MIN_WIP_LIMIT: u32 = 1;

/// Upper bound applied to formula results when a column sets none.
pub const DEFAULT_MAX_WIP_LIMIT: u32 = 20;

/// Name of the single-select field whose options are the board columns.
pub const DEFAULT_STAGE_FIELD: &str = "Status";

/// Errors produced while decoding or validating a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("could not decode template YAML: {0}")]
    Decode(#[from] serde_yaml::Error),

    #[error("template defines no columns")]
    NoColumns,

    #[error("template stage field name is blank")]
    BlankStageField,

    #[error("column '{purpose}' has a blank name")]
    BlankColumnName { purpose: ColumnPurpose },

    #[error("column purpose '{purpose}' is used more than once")]
    DuplicatePurpose { purpose: ColumnPurpose },

    #[error("column name '{name}' is used more than once")]
    DuplicateColumnName { name: String },

    #[error("column '{purpose}' needs either a wip_limit_formula or a wip_limit")]
    MissingLimitRule { purpose: ColumnPurpose },

    #[error("column '{purpose}' has a fixed WIP limit of 0; use null for unbounded")]
    ZeroFixedLimit { purpose: ColumnPurpose },

    #[error("column '{purpose}' has invalid WIP bounds [{min}, {max}]")]
    InvalidBounds {
        purpose: ColumnPurpose,
        min: u32,
        max: u32,
    },

    #[error("unknown preset table '{key}' (expected small_team, medium_team or large_team)")]
    UnknownPresetTable { key: String },

    #[error("preset table '{key}' sets a WIP limit of 0 for '{purpose}'")]
    ZeroPresetLimit { key: String, purpose: ColumnPurpose },

    #[error("custom field '{field}' is single-select but declares no options")]
    SingleSelectWithoutOptions { field: String },

    #[error("custom field '{field}' clashes with the stage field or another custom field")]
    DuplicateField { field: String },
}

// ---------------------------------------------------------------------------
// Column specification
// ---------------------------------------------------------------------------

/// One workflow stage of the board and the rule that yields its WIP limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Display name; also the name of the stage-field option for this column.
    pub name: String,
    /// Unique key of the stage.
    pub purpose: ColumnPurpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit_formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_wip_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wip_limit: Option<u32>,
    /// Fixed limit that bypasses the formula. `Some(None)` is an explicit
    /// `null` in the document and means unbounded.
    #[serde(
        rename = "wip_limit",
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub fixed_wip_limit: Option<Option<u32>>,
    /// Colour of the column's stage-field option.
    #[serde(default)]
    pub color: OptionColor,
}

impl ColumnSpec {
    /// Column with a formula rule and default bounds.
    pub fn with_formula(name: &str, purpose: &str, formula: &str) -> Option<Self> {
        Some(Self {
            name: name.to_string(),
            purpose: ColumnPurpose::new(purpose)?,
            wip_limit_formula: Some(formula.to_string()),
            min_wip_limit: None,
            max_wip_limit: None,
            fixed_wip_limit: None,
            color: OptionColor::default(),
        })
    }

    /// Column with a fixed limit (`None` = unbounded).
    pub fn with_fixed(name: &str, purpose: &str, limit: Option<u32>) -> Option<Self> {
        Some(Self {
            name: name.to_string(),
            purpose: ColumnPurpose::new(purpose)?,
            wip_limit_formula: None,
            min_wip_limit: None,
            max_wip_limit: None,
            fixed_wip_limit: Some(limit),
            color: OptionColor::default(),
        })
    }

    /// Sets the clamp bounds for formula results.
    pub fn bounded(mut self, min: u32, max: u32) -> Self {
        self.min_wip_limit = Some(min);
        self.max_wip_limit = Some(max);
        self
    }

    /// Effective clamp bounds: the column's own, else `[1, 20]`.
    pub fn bounds(&self) -> (u32, u32) {
        (
            self.min_wip_limit.unwrap_or(DEFAULT_MIN_WIP_LIMIT),
            self.max_wip_limit.unwrap_or(DEFAULT_MAX_WIP_LIMIT),
        )
    }

    pub(crate) fn validate(&self) -> Result<(), TemplateError> {
        let purpose = || self.purpose.clone();

        if self.name.trim().is_empty() {
            return Err(TemplateError::BlankColumnName { purpose: purpose() });
        }

        match (&self.fixed_wip_limit, &self.wip_limit_formula) {
            (Some(Some(0)), _) => {
                return Err(TemplateError::ZeroFixedLimit { purpose: purpose() })
            }
            (Some(_), _) => {}
            (None, Some(formula)) if !formula.trim().is_empty() => {}
            (None, _) => return Err(TemplateError::MissingLimitRule { purpose: purpose() }),
        }

        let (min, max) = self.bounds();
        if min == 0 || min > max {
            return Err(TemplateError::InvalidBounds {
                purpose: purpose(),
                min,
                max,
            });
        }
        Ok(())
    }
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u32>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Preset tables
// ---------------------------------------------------------------------------

/// Fallback WIP limits keyed by `"<team size>_team"` and then by purpose.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WipPresets(BTreeMap<String, BTreeMap<ColumnPurpose, u32>>);

impl WipPresets {
    /// Sets the preset for one team size and purpose.
    pub fn set(&mut self, team_size: TeamSize, purpose: ColumnPurpose, limit: u32) {
        self.0
            .entry(team_size.preset_key().to_string())
            .or_default()
            .insert(purpose, limit);
    }

    /// Looks up the preset for a team size and purpose.
    pub fn lookup(&self, team_size: TeamSize, purpose: &ColumnPurpose) -> Option<WipLimit> {
        self.0
            .get(team_size.preset_key())
            .and_then(|table| table.get(purpose))
            .and_then(|limit| WipLimit::new(*limit))
    }

    fn validate(&self) -> Result<(), TemplateError> {
        let known = [TeamSize::Small, TeamSize::Medium, TeamSize::Large].map(TeamSize::preset_key);
        for (key, table) in &self.0 {
            if !known.contains(&key.as_str()) {
                return Err(TemplateError::UnknownPresetTable { key: key.clone() });
            }
            if let Some((purpose, _)) = table.iter().find(|(_, limit)| **limit == 0) {
                return Err(TemplateError::ZeroPresetLimit {
                    key: key.clone(),
                    purpose: purpose.clone(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TemplateDocument {
    project_board_template: BoardTemplate,
}

/// A validated board template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardTemplate {
    /// Title given to newly created boards.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Single-select field whose options represent the columns.
    #[serde(default = "default_stage_field")]
    pub stage_field: String,
    /// Workflow stages in board order.
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub custom_fields: Vec<FieldSpec>,
    #[serde(default)]
    pub wip_presets: WipPresets,
}

fn default_stage_field() -> String {
    DEFAULT_STAGE_FIELD.to_string()
}

impl BoardTemplate {
    /// Decodes and validates a template document.
    pub fn from_yaml_str(source: &str) -> Result<Self, TemplateError> {
        let document: TemplateDocument = serde_yaml::from_str(source)?;
        let template = document.project_board_template;
        template.validate()?;
        Ok(template)
    }

    /// The template used when the repository provides none: five stages with
    /// `team_size` formulas on backlog, design and implementation, a constant
    /// review limit and an unbounded done column. It defines no custom fields.
    pub fn builtin() -> Self {
        let column = |name: &str, purpose: &'static str, formula: &str, min: u32, max: u32, color| {
            ColumnSpec {
                name: name.to_string(),
                purpose: purpose_key(purpose),
                wip_limit_formula: Some(formula.to_string()),
                min_wip_limit: Some(min),
                max_wip_limit: Some(max),
                fixed_wip_limit: None,
                color,
            }
        };

        let columns = vec![
            column("📋 Backlog", "backlog", "team_size * 2", 5, 20, OptionColor::Gray),
            column("🎨 Design", "design", "team_size / 2", 1, 4, OptionColor::Purple),
            column("🔨 Implementation", "implementation", "team_size", 2, 10, OptionColor::Blue),
            column("🔍 Review", "review", "2", 1, 20, OptionColor::Yellow),
            ColumnSpec {
                name: "✅ Done".to_string(),
                purpose: purpose_key("done"),
                wip_limit_formula: None,
                min_wip_limit: None,
                max_wip_limit: None,
                fixed_wip_limit: Some(None),
                color: OptionColor::Green,
            },
        ];

        let mut wip_presets = WipPresets::default();
        for (team_size, limits) in [
            (TeamSize::Small, [6, 1, 3, 2]),
            (TeamSize::Medium, [10, 2, 5, 3]),
            (TeamSize::Large, [20, 4, 8, 5]),
        ] {
            for (purpose, limit) in ["backlog", "design", "implementation", "review"]
                .into_iter()
                .zip(limits)
            {
                wip_presets.set(team_size, purpose_key(purpose), limit);
            }
        }

        Self {
            name: "Development Workflow".to_string(),
            description: "Automated Kanban board tuned to repository activity".to_string(),
            stage_field: default_stage_field(),
            columns,
            custom_fields: Vec::new(),
            wip_presets,
        }
    }

    /// Checks every structural rule; a template that passes can drive a run.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.stage_field.trim().is_empty() {
            return Err(TemplateError::BlankStageField);
        }
        if self.columns.is_empty() {
            return Err(TemplateError::NoColumns);
        }

        let mut purposes = HashSet::new();
        let mut names = HashSet::new();
        for column in &self.columns {
            column.validate()?;
            if !purposes.insert(&column.purpose) {
                return Err(TemplateError::DuplicatePurpose {
                    purpose: column.purpose.clone(),
                });
            }
            if !names.insert(column.name.as_str()) {
                return Err(TemplateError::DuplicateColumnName {
                    name: column.name.clone(),
                });
            }
        }

        let mut field_names = HashSet::from([self.stage_field.as_str()]);
        for field in &self.custom_fields {
            if !field_names.insert(field.name.as_str()) {
                return Err(TemplateError::DuplicateField {
                    field: field.name.clone(),
                });
            }
            if field.kind == FieldKind::SingleSelect && field.options.is_empty() {
                return Err(TemplateError::SingleSelectWithoutOptions {
                    field: field.name.clone(),
                });
            }
        }

        self.wip_presets.validate()
    }
}

fn purpose_key(purpose: &'static str) -> ColumnPurpose {
    ColumnPurpose::from_static(purpose)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
project_board_template:
  name: Team Flow
  description: Our board
  columns:
    - name: Backlog
      purpose: backlog
      wip_limit_formula: "team_size * 2"
      min_wip_limit: 2
      max_wip_limit: 12
    - name: Review
      purpose: review
      wip_limit: 3
    - name: Done
      purpose: done
      wip_limit: null
  custom_fields:
    - name: Size
      type: single_select
      options:
        - { name: S, color: GREEN }
        - { name: L }
  wip_presets:
    small_team: { backlog: 4 }
    large_team: { backlog: 15, review: 6 }
"#;

    #[test]
    fn decodes_sample_document() {
        let template = BoardTemplate::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(template.name, "Team Flow");
        assert_eq!(template.stage_field, DEFAULT_STAGE_FIELD);
        assert_eq!(template.columns.len(), 3);

        let backlog = &template.columns[0];
        assert_eq!(backlog.wip_limit_formula.as_deref(), Some("team_size * 2"));
        assert_eq!(backlog.bounds(), (2, 12));
        assert_eq!(backlog.fixed_wip_limit, None);

        assert_eq!(template.columns[1].fixed_wip_limit, Some(Some(3)));
        assert_eq!(template.columns[2].fixed_wip_limit, Some(None));

        let size = &template.custom_fields[0];
        assert_eq!(size.kind, FieldKind::SingleSelect);
        assert_eq!(size.options[0].color, OptionColor::Green);
        assert_eq!(size.options[1].color, OptionColor::Gray);

        let backlog_purpose = ColumnPurpose::new("backlog").unwrap();
        assert_eq!(
            template.wip_presets.lookup(TeamSize::Large, &backlog_purpose),
            WipLimit::new(15)
        );
        assert_eq!(template.wip_presets.lookup(TeamSize::Medium, &backlog_purpose), None);
    }

    #[test]
    fn builtin_template_is_valid() {
        let template = BoardTemplate::builtin();
        template.validate().unwrap();

        let purposes: Vec<_> = template.columns.iter().map(|c| c.purpose.as_str()).collect();
        assert_eq!(purposes, ["backlog", "design", "implementation", "review", "done"]);
        for column in &template.columns[..3] {
            let formula = column.wip_limit_formula.as_deref().unwrap();
            assert!(formula.contains("team_size"), "{formula}");
        }
        assert_eq!(template.columns[4].fixed_wip_limit, Some(None));
        assert!(template.custom_fields.is_empty());
    }

    #[test]
    fn rejects_blank_purposes() {
        for purpose in ["\"   \"", "\"\""] {
            let source = format!(
                r#"
project_board_template:
  name: Blank
  columns:
    - {{ name: Doing, purpose: {purpose}, wip_limit_formula: "team_size" }}
    - {{ name: Done, purpose: done, wip_limit: null }}
"#
            );
            assert!(
                matches!(BoardTemplate::from_yaml_str(&source), Err(TemplateError::Decode(_))),
                "accepted purpose {purpose}"
            );
        }
    }

    #[test]
    fn rejects_column_without_limit_rule() {
        let source = r#"
project_board_template:
  name: Broken
  columns:
    - { name: Doing, purpose: doing }
"#;
        let err = BoardTemplate::from_yaml_str(source).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MissingLimitRule { ref purpose } if purpose.as_str() == "doing"
        ));
    }

    #[test]
    fn blank_formula_counts_as_missing() {
        let column = ColumnSpec::with_formula("Doing", "doing", "  ").unwrap();
        assert!(matches!(column.validate(), Err(TemplateError::MissingLimitRule { .. })));
    }

    #[test]
    fn rejects_structural_mistakes() {
        let mut template = BoardTemplate::builtin();
        template.columns.push(template.columns[0].clone());
        assert!(matches!(template.validate(), Err(TemplateError::DuplicatePurpose { .. })));

        let mut template = BoardTemplate::builtin();
        template.columns[1] = template.columns[1].clone().bounded(5, 2);
        assert!(matches!(
            template.validate(),
            Err(TemplateError::InvalidBounds { min: 5, max: 2, .. })
        ));

        let mut template = BoardTemplate::builtin();
        template.columns[0].min_wip_limit = Some(25);
        template.columns[0].max_wip_limit = None;
        assert!(matches!(template.validate(), Err(TemplateError::InvalidBounds { .. })));

        let mut template = BoardTemplate::builtin();
        template.columns[4].fixed_wip_limit = Some(Some(0));
        assert!(matches!(template.validate(), Err(TemplateError::ZeroFixedLimit { .. })));

        let mut template = BoardTemplate::builtin();
        template.columns.clear();
        assert!(matches!(template.validate(), Err(TemplateError::NoColumns)));

        let mut template = BoardTemplate::builtin();
        template.custom_fields.push(FieldSpec {
            name: DEFAULT_STAGE_FIELD.to_string(),
            kind: FieldKind::Text,
            options: Vec::new(),
        });
        assert!(matches!(template.validate(), Err(TemplateError::DuplicateField { .. })));
    }

    #[test]
    fn rejects_bad_preset_tables() {
        let source = r#"
project_board_template:
  name: Presets
  columns:
    - { name: Doing, purpose: doing, wip_limit: 2 }
  wip_presets:
    gigantic_team: { doing: 3 }
"#;
        assert!(matches!(
            BoardTemplate::from_yaml_str(source),
            Err(TemplateError::UnknownPresetTable { .. })
        ));

        let mut template = BoardTemplate::builtin();
        template
            .wip_presets
            .set(TeamSize::Small, ColumnPurpose::new("review").unwrap(), 0);
        assert!(matches!(template.validate(), Err(TemplateError::ZeroPresetLimit { .. })));
    }

    #[test]
    fn malformed_yaml_is_a_decode_error() {
        assert!(matches!(
            BoardTemplate::from_yaml_str("project_board_template: [unclosed"),
            Err(TemplateError::Decode(_))
        ));
    }
}
