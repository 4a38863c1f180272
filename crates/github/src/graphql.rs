//! Projects v2 GraphQL documents and payloads.

use board::{
    BoardField, BoardHandle, BoardId, BoardNumber, BoardView, FieldDataType, FieldId, FieldKind,
    FieldOption, FieldOptionSpec, OptionColor, OptionId, ServiceError, ViewId, ViewLayout,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Selection shared by every document returning a board.
macro_rules! board_fragment {
    () => {
        r#"
fragment BoardFields on ProjectV2 {
  id
  number
  title
  shortDescription
  url
  closed
  fields(first: 20) {
    nodes {
      ... on ProjectV2FieldCommon { id name dataType }
      ... on ProjectV2SingleSelectField { options { id name color description } }
    }
  }
  views(first: 10) {
    nodes { id name layout }
  }
}
"#
    };
}

pub(crate) const FIND_BOARDS: &str = concat!(
    r#"
query($owner: String!, $repo: String!) {
  repository(owner: $owner, name: $repo) {
    projectsV2(first: 10) {
      nodes { ...BoardFields }
    }
  }
}
"#,
    board_fragment!()
);

pub(crate) const DESCRIBE_BOARD: &str = concat!(
    r#"
query($id: ID!) {
  node(id: $id) {
    ... on ProjectV2 { ...BoardFields }
  }
}
"#,
    board_fragment!()
);

pub(crate) const CREATE_BOARD: &str = concat!(
    r#"
mutation($ownerId: ID!, $title: String!, $repositoryId: ID!) {
  createProjectV2(input: { ownerId: $ownerId, title: $title, repositoryId: $repositoryId }) {
    projectV2 { ...BoardFields }
  }
}
"#,
    board_fragment!()
);

pub(crate) const SET_DESCRIPTION: &str = r#"
mutation($projectId: ID!, $shortDescription: String!) {
  updateProjectV2(input: { projectId: $projectId, shortDescription: $shortDescription }) {
    projectV2 { id }
  }
}
"#;

pub(crate) const CREATE_FIELD: &str = r#"
mutation(
  $projectId: ID!
  $name: String!
  $dataType: ProjectV2CustomFieldType!
  $options: [ProjectV2SingleSelectFieldOptionInput!]
) {
  createProjectV2Field(input: {
    projectId: $projectId
    dataType: $dataType
    name: $name
    singleSelectOptions: $options
  }) {
    projectV2Field {
      ... on ProjectV2FieldCommon { id }
    }
  }
}
"#;

pub(crate) const FIELD_OPTIONS: &str = r#"
query($id: ID!) {
  node(id: $id) {
    ... on ProjectV2SingleSelectField { id options { id name color description } }
  }
}
"#;

pub(crate) const SET_FIELD_OPTIONS: &str = r#"
mutation($fieldId: ID!, $options: [ProjectV2SingleSelectFieldOptionInput!]) {
  updateProjectV2Field(input: { fieldId: $fieldId, singleSelectOptions: $options }) {
    projectV2Field {
      ... on ProjectV2SingleSelectField { id }
    }
  }
}
"#;

/// `ProjectV2CustomFieldType` value for a field kind.
pub(crate) fn custom_field_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::SingleSelect => "SINGLE_SELECT",
        FieldKind::Number => "NUMBER",
        FieldKind::Text => "TEXT",
        FieldKind::Date => "DATE",
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct FindBoardsData {
    pub(crate) repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RepositoryNode {
    /// Decoded node by node so one malformed board does not hide the others.
    pub(crate) projects_v2: Connection<serde_json::Value>,
}

/// `node(id:)` result; an object of another type comes back as `{}`.
#[derive(Debug, Deserialize)]
pub(crate) struct NodeData {
    node: Option<serde_json::Value>,
}

impl NodeData {
    /// The node as `T`, or `None` when it does not exist or has another type.
    pub(crate) fn into_node<T: DeserializeOwned>(self) -> Result<Option<T>, ServiceError> {
        match self.node {
            None => Ok(None),
            Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ServiceError::Decode {
                    message: e.to_string(),
                }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateBoardData {
    pub(crate) create_project_v2: CreatedBoard,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatedBoard {
    pub(crate) project_v2: ProjectNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateFieldData {
    pub(crate) create_project_v2_field: CreatedField,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatedField {
    pub(crate) project_v2_field: IdNode,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdNode {
    pub(crate) id: String,
}

/// Response of mutations whose payload is not inspected.
#[derive(Debug, Deserialize)]
pub(crate) struct Ignored {}

#[derive(Debug, Deserialize)]
pub(crate) struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub(crate) nodes: Vec<Option<T>>,
}

impl<T> Connection<T> {
    fn into_nodes(self) -> impl Iterator<Item = T> {
        self.nodes.into_iter().flatten()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectNode {
    id: String,
    number: Option<u64>,
    title: String,
    short_description: Option<String>,
    url: String,
    #[serde(default)]
    closed: bool,
    fields: Option<Connection<FieldNode>>,
    views: Option<Connection<ViewNode>>,
}

/// A field node; built-in field types outside the fragments come back empty.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldNode {
    id: Option<String>,
    name: Option<String>,
    data_type: Option<FieldDataType>,
    #[serde(default)]
    options: Vec<OptionNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OptionNode {
    id: Option<String>,
    name: String,
    #[serde(default)]
    color: OptionColor,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ViewNode {
    id: String,
    name: String,
    layout: ViewLayout,
}

/// Options of a single-select field, as returned by [`FIELD_OPTIONS`].
#[derive(Debug, Deserialize)]
pub(crate) struct SelectFieldNode {
    pub(crate) options: Vec<OptionNode>,
}

impl SelectFieldNode {
    /// The options in their input shape, ready to be written back.
    pub(crate) fn into_inputs(self) -> Vec<OptionInput> {
        self.options
            .into_iter()
            .map(|o| OptionInput {
                id: o.id,
                name: o.name,
                color: o.color,
                description: o.description,
            })
            .collect()
    }
}

impl ProjectNode {
    /// Decodes one entry of a board connection.
    pub(crate) fn from_value(value: serde_json::Value) -> Result<Self, ServiceError> {
        serde_json::from_value(value).map_err(|e| ServiceError::Decode {
            message: e.to_string(),
        })
    }
}

fn invalid_id(what: &str, value: &str) -> ServiceError {
    ServiceError::Decode {
        message: format!("invalid {what} id '{value}'"),
    }
}

impl TryFrom<ProjectNode> for BoardHandle {
    type Error = ServiceError;

    fn try_from(node: ProjectNode) -> Result<Self, Self::Error> {
        let id = BoardId::new(node.id.as_str()).ok_or_else(|| invalid_id("board", &node.id))?;

        let fields = node
            .fields
            .map(Connection::into_nodes)
            .into_iter()
            .flatten()
            .filter_map(|field| {
                let id = FieldId::new(field.id?)?;
                Some(BoardField {
                    id,
                    name: field.name?,
                    data_type: field.data_type.unwrap_or(FieldDataType::Other),
                    options: field
                        .options
                        .into_iter()
                        .map(|o| FieldOption {
                            id: o.id.and_then(OptionId::new),
                            name: o.name,
                            color: o.color,
                            description: o.description,
                        })
                        .collect(),
                })
            })
            .collect();

        let views = node
            .views
            .map(Connection::into_nodes)
            .into_iter()
            .flatten()
            .filter_map(|view| {
                Some(BoardView {
                    id: ViewId::new(view.id)?,
                    name: view.name,
                    layout: view.layout,
                })
            })
            .collect();

        Ok(BoardHandle {
            id,
            number: node.number.map(BoardNumber::new),
            title: node.title,
            short_description: node.short_description.filter(|d| !d.is_empty()),
            url: node.url,
            closed: node.closed,
            fields,
            views,
        })
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// `ProjectV2SingleSelectFieldOptionInput`.
///
/// Existing options keep their `id` when written back; the service recreates
/// options sent without one and clears the value of every item that used them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct OptionInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,
    pub(crate) name: String,
    pub(crate) color: OptionColor,
    pub(crate) description: String,
}

impl From<&FieldOptionSpec> for OptionInput {
    fn from(spec: &FieldOptionSpec) -> Self {
        Self {
            id: None,
            name: spec.name.clone(),
            color: spec.color,
            description: spec.description.clone(),
        }
    }
}
