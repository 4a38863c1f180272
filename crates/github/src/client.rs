//! Authenticated access to the GitHub REST and GraphQL endpoints.

use std::time::Duration;

use board::ServiceError;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Public GitHub API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// User-Agent header required by the GitHub API.
const USER_AGENT: &str = concat!("kanban-tuner/", env!("CARGO_PKG_VERSION"));

const API_VERSION: &str = "2022-11-28";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body echoed into a [`ServiceError`].
const MAX_ERROR_BODY: usize = 200;

/// GitHub API client authenticated with a token.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    token: String,
    api_url: String,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GithubClient {
    /// Creates a client for the public GitHub API.
    pub fn new(token: impl Into<String>) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(map_reqwest_error)?;

        Ok(Self {
            http,
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
        })
    }

    /// Points the client at another API root (GitHub Enterprise, test servers).
    ///
    /// REST paths are appended to the root; GraphQL is served from
    /// `{root}/graphql`.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The API root requests are sent to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // -----------------------------------------------------------------------
    // REST
    // -----------------------------------------------------------------------

    /// `GET {api_url}{path}` decoded as `T`.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        let url = format!("{}{}", self.api_url, path);
        let response = self.send(self.http.get(url).query(query)).await?;
        response.json().await.map_err(map_reqwest_error)
    }

    /// `GET {api_url}{path}` for collection endpoints.
    ///
    /// `204 No Content` (returned e.g. for the contributors of an empty
    /// repository) yields an empty list.
    pub(crate) async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ServiceError> {
        let url = format!("{}{}", self.api_url, path);
        let response = self.send(self.http.get(url).query(query)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        response.json().await.map_err(map_reqwest_error)
    }

    // -----------------------------------------------------------------------
    // GraphQL
    // -----------------------------------------------------------------------

    /// Runs a GraphQL document and returns its `data`.
    ///
    /// A response carrying `errors` fails as [`ServiceError::Query`], or as
    /// [`ServiceError::NotFound`] when every error is of type `NOT_FOUND`.
    pub(crate) async fn graphql<T: DeserializeOwned>(
        &self,
        document: &str,
        variables: serde_json::Value,
    ) -> Result<T, ServiceError> {
        let url = format!("{}/graphql", self.api_url);
        let body = serde_json::json!({ "query": document, "variables": variables });
        let response = self.send(self.http.post(url).json(&body)).await?;
        let envelope: GraphqlEnvelope<T> = response.json().await.map_err(map_reqwest_error)?;

        if !envelope.errors.is_empty() {
            let messages: Vec<String> = envelope.errors.iter().map(|e| e.message.clone()).collect();
            if envelope.errors.iter().all(|e| e.kind.as_deref() == Some("NOT_FOUND")) {
                return Err(ServiceError::NotFound {
                    what: messages.join("; "),
                });
            }
            return Err(ServiceError::Query { messages });
        }

        envelope.data.ok_or_else(|| ServiceError::Decode {
            message: "GraphQL response carried neither data nor errors".to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    async fn send(&self, request: RequestBuilder) -> Result<Response, ServiceError> {
        let response = request
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "GitHub response");
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::Http {
            status: status.as_u16(),
            message: error_message(status, &body),
            retry_after,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestError {
    message: String,
}

fn map_reqwest_error(error: reqwest::Error) -> ServiceError {
    if error.is_timeout() {
        ServiceError::Timeout
    } else if error.is_decode() {
        ServiceError::Decode {
            message: error.to_string(),
        }
    } else {
        ServiceError::Transport {
            message: error.to_string(),
        }
    }
}

/// Delay requested by GitHub before retrying.
///
/// Honours `Retry-After` (seconds) first, then an exhausted primary rate
/// limit (`x-ratelimit-remaining: 0` with `x-ratelimit-reset` epoch seconds).
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let requested =
        header(headers, RETRY_AFTER.as_str()).and_then(|v| v.trim().parse::<u64>().ok());
    if let Some(seconds) = requested {
        return Some(Duration::from_secs(seconds));
    }

    if header(headers, "x-ratelimit-remaining") == Some("0") {
        let reset = header(headers, "x-ratelimit-reset")?.trim().parse::<i64>().ok()?;
        let wait = reset - chrono::Utc::now().timestamp();
        return Some(Duration::from_secs(wait.max(1) as u64));
    }

    None
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Human-readable message of an error response: GitHub's `message` field when
/// present, otherwise the (truncated) body or the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(error) = serde_json::from_str::<RestError>(body) {
        return error.message;
    }
    let body = body.trim();
    if body.is_empty() {
        return status.canonical_reason().unwrap_or("unknown error").to_string();
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}
