//! [`RepositoryService`] over the GitHub APIs.

use async_trait::async_trait;
use board::optimization::rewrite_wip_limit;
use board::{
    BoardBlueprint, BoardHandle, BoardId, ContributorStat, FieldId, FieldKind, FieldSpec, Issue,
    OptimizationKind, PullRequest, RepositoryId, RepositoryService, ServiceError, Timestamp,
};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::client::GithubClient;
use crate::graphql::{
    self, CreateBoardData, CreateFieldData, FindBoardsData, Ignored, NodeData, OptionInput,
    ProjectNode, SelectFieldNode,
};
use crate::rest::{self, ContributorPayload, IssuePayload, PullRequestPayload, RepositoryPayload};

#[async_trait]
impl RepositoryService for GithubClient {
    #[instrument(skip_all, fields(repo = %repo))]
    async fn list_contributors(
        &self,
        repo: &RepositoryId,
    ) -> Result<Vec<ContributorStat>, ServiceError> {
        let payload: Vec<ContributorPayload> = self
            .get_list(&rest::contributors_path(repo), &rest::page_query())
            .await?;
        Ok(payload
            .into_iter()
            .filter_map(ContributorPayload::into_domain)
            .collect())
    }

    #[instrument(skip_all, fields(repo = %repo, since = %since))]
    async fn list_issues(
        &self,
        repo: &RepositoryId,
        since: Timestamp,
    ) -> Result<Vec<Issue>, ServiceError> {
        let payload: Vec<IssuePayload> = self
            .get_list(&rest::issues_path(repo), &rest::activity_query(Some(since)))
            .await?;
        Ok(payload.into_iter().filter_map(IssuePayload::into_domain).collect())
    }

    #[instrument(skip_all, fields(repo = %repo))]
    async fn list_pull_requests(
        &self,
        repo: &RepositoryId,
    ) -> Result<Vec<PullRequest>, ServiceError> {
        let payload: Vec<PullRequestPayload> = self
            .get_list(&rest::pulls_path(repo), &rest::activity_query(None))
            .await?;
        Ok(payload
            .into_iter()
            .map(PullRequestPayload::into_domain)
            .collect())
    }

    #[instrument(skip_all, fields(repo = %repo))]
    async fn find_active_boards(
        &self,
        repo: &RepositoryId,
    ) -> Result<Vec<BoardHandle>, ServiceError> {
        let data: FindBoardsData = self
            .graphql(
                graphql::FIND_BOARDS,
                json!({ "owner": repo.owner(), "repo": repo.name() }),
            )
            .await?;

        let repository = data.repository.ok_or_else(|| ServiceError::NotFound {
            what: format!("repository {repo}"),
        })?;

        let mut boards = Vec::new();
        for node in repository.projects_v2.nodes.into_iter().flatten() {
            match ProjectNode::from_value(node).and_then(BoardHandle::try_from) {
                Ok(board) if !board.closed => boards.push(board),
                Ok(board) => debug!(board = %board.id, "skipping closed board"),
                Err(e) => warn!(error = %e, "skipping board that could not be decoded"),
            }
        }
        debug!(active = boards.len(), "listed boards");
        Ok(boards)
    }

    #[instrument(skip_all, fields(board = %board))]
    async fn describe_board(&self, board: &BoardId) -> Result<BoardHandle, ServiceError> {
        let data: NodeData = self
            .graphql(graphql::DESCRIBE_BOARD, json!({ "id": board.as_str() }))
            .await?;
        let node: ProjectNode = data.into_node()?.ok_or_else(|| ServiceError::NotFound {
            what: format!("board {board}"),
        })?;
        BoardHandle::try_from(node)
    }

    #[instrument(skip_all, fields(repo = %repo, title = %blueprint.title))]
    async fn create_board(
        &self,
        repo: &RepositoryId,
        blueprint: &BoardBlueprint,
    ) -> Result<BoardHandle, ServiceError> {
        let ids: RepositoryPayload = self.get(&rest::repository_path(repo), &[]).await?;

        let data: CreateBoardData = self
            .graphql(
                graphql::CREATE_BOARD,
                json!({
                    "ownerId": ids.owner.node_id,
                    "title": blueprint.title,
                    "repositoryId": ids.node_id,
                }),
            )
            .await?;
        let mut board = BoardHandle::try_from(data.create_project_v2.project_v2)?;
        info!(board = %board.id, url = %board.url, "created project");

        let description = blueprint.description.trim();
        if !description.is_empty() {
            let _: Ignored = self
                .graphql(
                    graphql::SET_DESCRIPTION,
                    json!({ "projectId": board.id.as_str(), "shortDescription": description }),
                )
                .await?;
            board.short_description = Some(description.to_string());
        }

        Ok(board)
    }

    #[instrument(skip_all, fields(board = %board, field = %spec.name))]
    async fn add_field(&self, board: &BoardId, spec: &FieldSpec) -> Result<FieldId, ServiceError> {
        self.create_field(board, spec).await
    }

    #[instrument(skip_all, fields(board = %board, change = %change.label()))]
    async fn apply_optimization(
        &self,
        board: &BoardId,
        change: &OptimizationKind,
    ) -> Result<(), ServiceError> {
        match change {
            OptimizationKind::AddField { spec } => {
                self.create_field(board, spec).await?;
            }
            OptimizationKind::AddColumn { field_id, option, .. } => {
                let mut options = self.field_options(field_id).await?;
                if options.iter().any(|o| o.name == option.name) {
                    debug!(column = %option.name, "column already present");
                    return Ok(());
                }
                options.push(OptionInput::from(option));
                self.set_field_options(field_id, &options).await?;
            }
            OptimizationKind::AdjustWipLimit {
                field_id,
                option_name,
                desired,
                ..
            } => {
                let mut options = self.field_options(field_id).await?;
                let option = options
                    .iter_mut()
                    .find(|o| &o.name == option_name)
                    .ok_or_else(|| ServiceError::NotFound {
                        what: format!("option '{option_name}' of field {field_id}"),
                    })?;
                option.description = rewrite_wip_limit(&option.description, *desired);
                self.set_field_options(field_id, &options).await?;
            }
        }
        Ok(())
    }
}

impl GithubClient {
    async fn create_field(
        &self,
        board: &BoardId,
        spec: &FieldSpec,
    ) -> Result<FieldId, ServiceError> {
        let options: Option<Vec<OptionInput>> = (spec.kind == FieldKind::SingleSelect)
            .then(|| spec.options.iter().map(OptionInput::from).collect());

        let data: CreateFieldData = self
            .graphql(
                graphql::CREATE_FIELD,
                json!({
                    "projectId": board.as_str(),
                    "name": spec.name,
                    "dataType": graphql::custom_field_type(spec.kind),
                    "options": options,
                }),
            )
            .await?;

        let id = data.create_project_v2_field.project_v2_field.id;
        FieldId::new(id.as_str()).ok_or_else(|| ServiceError::Decode {
            message: format!("invalid field id '{id}'"),
        })
    }

    /// Current options of a single-select field, in board order.
    async fn field_options(&self, field: &FieldId) -> Result<Vec<OptionInput>, ServiceError> {
        let data: NodeData = self
            .graphql(graphql::FIELD_OPTIONS, json!({ "id": field.as_str() }))
            .await?;
        let node: SelectFieldNode = data.into_node()?.ok_or_else(|| ServiceError::NotFound {
            what: format!("single-select field {field}"),
        })?;
        Ok(node.into_inputs())
    }

    /// Replaces the option list of a single-select field.
    async fn set_field_options(
        &self,
        field: &FieldId,
        options: &[OptionInput],
    ) -> Result<(), ServiceError> {
        let _: Ignored = self
            .graphql(
                graphql::SET_FIELD_OPTIONS,
                json!({ "fieldId": field.as_str(), "options": options }),
            )
            .await?;
        Ok(())
    }
}
