//! Board structure as seen through the board service, plus the field
//! specifications used to add structure to a board.

use serde::{Deserialize, Serialize};

use crate::{BoardId, BoardNumber, FieldId, OptionId, ViewId};

// ---------------------------------------------------------------------------
// Existing board
// ---------------------------------------------------------------------------

/// A board already hosted by the board service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardHandle {
    pub id: BoardId,
    pub number: Option<BoardNumber>,
    pub title: String,
    pub short_description: Option<String>,
    pub url: String,
    pub closed: bool,
    pub fields: Vec<BoardField>,
    pub views: Vec<BoardView>,
}

impl BoardHandle {
    /// Finds a field by its display name (exact match).
    pub fn field_named(&self, name: &str) -> Option<&BoardField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Data type of a board field as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldDataType {
    SingleSelect,
    Number,
    Text,
    Date,
    Iteration,
    /// Built-in or future types the domain does not manage (title, assignees, ...).
    #[serde(other)]
    Other,
}

/// A field that exists on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardField {
    pub id: FieldId,
    pub name: String,
    pub data_type: FieldDataType,
    /// Options of a single-select field; empty for every other type.
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

impl BoardField {
    /// Finds a single-select option by its display name.
    pub fn option_named(&self, name: &str) -> Option<&FieldOption> {
        self.options.iter().find(|o| o.name == name)
    }
}

/// One option of a single-select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    /// `None` for options that have not been created yet.
    pub id: Option<OptionId>,
    pub name: String,
    pub color: OptionColor,
    #[serde(default)]
    pub description: String,
}

/// Layout of a board view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewLayout {
    BoardLayout,
    TableLayout,
    RoadmapLayout,
    #[serde(other)]
    Other,
}

/// A view configured on a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardView {
    pub id: ViewId,
    pub name: String,
    pub layout: ViewLayout,
}

/// Properties of a board to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardBlueprint {
    pub title: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Field specifications
// ---------------------------------------------------------------------------

/// Kind of field a template may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    SingleSelect,
    Number,
    Text,
    Date,
}

impl FieldKind {
    /// The service data type a field of this kind is stored as.
    pub fn data_type(self) -> FieldDataType {
        match self {
            FieldKind::SingleSelect => FieldDataType::SingleSelect,
            FieldKind::Number => FieldDataType::Number,
            FieldKind::Text => FieldDataType::Text,
            FieldKind::Date => FieldDataType::Date,
        }
    }
}

/// Colour palette accepted for single-select options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionColor {
    Blue,
    Green,
    #[default]
    Gray,
    Orange,
    Pink,
    Purple,
    Red,
    Yellow,
}

/// Option of a single-select field to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOptionSpec {
    pub name: String,
    #[serde(default)]
    pub color: OptionColor,
    #[serde(default)]
    pub description: String,
}

/// A field to be added to a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Only meaningful for [`FieldKind::SingleSelect`].
    #[serde(default)]
    pub options: Vec<FieldOptionSpec>,
}

impl FieldSpec {
    /// Converts the spec into the field shape it produces once created.
    pub fn into_board_field(self, id: FieldId) -> BoardField {
        BoardField {
            id,
            name: self.name,
            data_type: self.kind.data_type(),
            options: self
                .options
                .into_iter()
                .map(|o| FieldOption {
                    id: None,
                    name: o.name,
                    color: o.color,
                    description: o.description,
                })
                .collect(),
        }
    }
}
