//! Invocation parameters and template loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use board::{BoardError, BoardTemplate, RepositoryId, TeamSize};
use clap::builder::FalseyValueParser;
use clap::Parser;
use reconciler::ReconcileRequest;
use tracing::info;

/// Template location used when `--template` is not given.
pub const DEFAULT_TEMPLATE_PATH: &str = ".github/project-board-template.yml";

/// Tune a repository's project board to its recent activity.
#[derive(Debug, Clone, Parser)]
#[command(name = "kanban-tuner", version, about, long_about = None)]
pub struct Args {
    /// Repository to reconcile, as `owner/name`.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repo: Option<String>,

    /// Token used for every GitHub call.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Create a new board even if one already exists.
    #[arg(long, env = "FORCE_SETUP", value_parser = FalseyValueParser::new())]
    pub force: bool,

    /// Team size class (small, medium, large) replacing the derived one.
    #[arg(long, env = "TEAM_SIZE")]
    pub team_size: Option<String>,

    /// Board template; the built-in template is used when the file is absent.
    #[arg(long, env = "BOARD_TEMPLATE", default_value = DEFAULT_TEMPLATE_PATH)]
    pub template: PathBuf,

    /// Overall deadline for the run, in seconds.
    #[arg(long, env = "RECONCILE_TIMEOUT_SECS", default_value_t = 300)]
    pub timeout_secs: u64,

    /// GitHub API root.
    #[arg(long, env = "GITHUB_API_URL", default_value = github::DEFAULT_API_URL)]
    pub api_url: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

/// Validated invocation parameters.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub api_url: String,
    pub request: ReconcileRequest,
    pub deadline: Option<Duration>,
}

impl Args {
    /// Checks credential and repository identity before anything touches the
    /// network.
    pub fn settings(&self) -> Result<Settings, BoardError> {
        let token = non_blank(self.token.as_deref())
            .ok_or_else(|| BoardError::configuration("GITHUB_TOKEN is required"))?
            .to_string();

        let repo = non_blank(self.repo.as_deref())
            .ok_or_else(|| BoardError::configuration("GITHUB_REPOSITORY is required"))?;
        let repo = RepositoryId::parse(repo).ok_or_else(|| {
            BoardError::configuration(format!(
                "GITHUB_REPOSITORY must be 'owner/name', got '{repo}'"
            ))
        })?;

        let team_size_override = non_blank(self.team_size.as_deref())
            .map(str::parse::<TeamSize>)
            .transpose()
            .map_err(BoardError::configuration)?;

        Ok(Settings {
            token,
            api_url: self.api_url.clone(),
            request: ReconcileRequest {
                repo,
                force_setup: self.force,
                team_size_override,
            },
            deadline: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
        })
    }
}

/// Empty values (as CI systems pass for unset inputs) count as absent.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Loads and validates the board template at `path`.
///
/// A missing file selects the built-in template; any other read failure and
/// every decode or validation failure is fatal.
pub fn load_template(path: &Path) -> Result<BoardTemplate, BoardError> {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no board template found; using the built-in template");
            return Ok(BoardTemplate::builtin());
        }
        Err(e) => {
            return Err(BoardError::configuration(format!(
                "cannot read board template {}: {e}",
                path.display()
            )))
        }
    };

    let template = BoardTemplate::from_yaml_str(&source)?;
    info!(
        path = %path.display(),
        name = %template.name,
        columns = template.columns.len(),
        "loaded board template"
    );
    Ok(template)
}
