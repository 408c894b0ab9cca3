use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::types::{
    Comment, NewComment, NewStatus, NewThread, PullRequest, PullRequestStatus, Thread,
    ThreadStatusPatch,
};
use crate::config::{AuthScheme, Connection};
use crate::error::ApiError;
use crate::models::ThreadStatus;

pub const API_VERSION: &str = "7.1";

/// Azure DevOps REST client bound to one pull request
pub struct DevOpsClient {
    http: Client,
    connection: Connection,
}

impl DevOpsClient {
    pub fn new(connection: Connection) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(concat!("ado-review/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, connection })
    }

    pub fn pull_request_id(&self) -> u64 {
        self.connection.pull_request_id
    }

    /// Build `<base>/<org>/<project>/_apis/git/repositories/<repo>/pullrequests/<id>/<extra...>`
    fn pr_url(&self, extra: &[&str]) -> Result<Url, ApiError> {
        let c = &self.connection;
        let mut url = Url::parse(&c.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", c.base_url, e)))?;

        let pr_id = c.pull_request_id.to_string();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{} cannot be a base URL", c.base_url)))?
            .pop_if_empty()
            .extend([
                c.organization.as_str(),
                c.project.as_str(),
                "_apis",
                "git",
                "repositories",
                c.repository.as_str(),
                "pullrequests",
                pr_id.as_str(),
            ])
            .extend(extra);

        url.query_pairs_mut().append_pair("api-version", API_VERSION);

        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url).header("Accept", "application/json");

        match self.connection.auth {
            AuthScheme::Basic => builder.basic_auth("", Some(&self.connection.token)),
            AuthScheme::Bearer => builder.bearer_auth(&self.connection.token),
        }
    }

    /// Send a request and decode the body. `Ok(None)` means the API answered
    /// with an empty or `null` body.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<Option<T>, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() || status == StatusCode::NON_AUTHORITATIVE_INFORMATION {
            warn!(status = %status, what, "Azure DevOps request failed");
            return Err(ApiError::from_response(status, body, what));
        }

        let body = body.trim();
        if body.is_empty() || body == "null" {
            debug!(status = %status, what, "Empty response body");
            return Ok(None);
        }

        serde_json::from_str(body)
            .map(Some)
            .map_err(|source| ApiError::Decode {
                what: what.to_string(),
                source,
            })
    }

    /// Fetch the pull request this client is bound to
    pub async fn get_pull_request(&self) -> Result<PullRequest, ApiError> {
        let what = format!("pull request {}", self.pull_request_id());
        info!(pr = self.pull_request_id(), "Fetching pull request");

        let url = self.pr_url(&[])?;
        self.send(self.request(Method::GET, url), &what)
            .await?
            .ok_or(ApiError::NotFound(what))
    }

    /// Fetch a comment thread by id. Deleted threads count as not found.
    pub async fn get_thread(&self, thread_id: u64) -> Result<Thread, ApiError> {
        let what = format!("thread {}", thread_id);
        info!(thread_id, "Fetching thread");

        let id = thread_id.to_string();
        let url = self.pr_url(&["threads", &id])?;
        let thread: Thread = self
            .send(self.request(Method::GET, url), &what)
            .await?
            .ok_or_else(|| ApiError::NotFound(what.clone()))?;

        if thread.is_deleted {
            debug!(thread_id, "Thread is deleted");
            return Err(ApiError::NotFound(what));
        }

        Ok(thread)
    }

    /// Create a new comment thread
    pub async fn create_thread(&self, thread: &NewThread) -> Result<Thread, ApiError> {
        let what = "thread creation".to_string();
        info!(
            inline = thread.thread_context.is_some(),
            status = thread.status,
            "Creating thread"
        );

        let url = self.pr_url(&["threads"])?;
        let created: Thread = self
            .send(self.request(Method::POST, url).json(thread), &what)
            .await?
            .ok_or(ApiError::EmptyResponse(what))?;

        debug!(thread_id = created.id, "Thread created");
        Ok(created)
    }

    /// Add a comment to an existing thread
    pub async fn add_comment(
        &self,
        thread_id: u64,
        comment: &NewComment,
    ) -> Result<Comment, ApiError> {
        let what = format!("thread {}", thread_id);
        info!(thread_id, "Adding comment to thread");

        let id = thread_id.to_string();
        let url = self.pr_url(&["threads", &id, "comments"])?;
        let created: Comment = self
            .send(self.request(Method::POST, url).json(comment), &what)
            .await?
            .ok_or_else(|| ApiError::EmptyResponse(format!("comment on {}", what)))?;

        debug!(thread_id, comment_id = created.id, "Comment added");
        Ok(created)
    }

    /// Change a thread's status
    pub async fn update_thread_status(
        &self,
        thread_id: u64,
        status: ThreadStatus,
    ) -> Result<Thread, ApiError> {
        let what = format!("thread {}", thread_id);
        info!(thread_id, status = %status, "Updating thread status");

        let id = thread_id.to_string();
        let url = self.pr_url(&["threads", &id])?;
        let patch = ThreadStatusPatch {
            status: status.wire(),
        };

        self.send(self.request(Method::PATCH, url).json(&patch), &what)
            .await?
            .ok_or_else(|| ApiError::EmptyResponse(format!("status update of {}", what)))
    }

    /// Post a status check on the pull request
    pub async fn create_status(&self, status: &NewStatus) -> Result<PullRequestStatus, ApiError> {
        let what = format!("pull request {}", self.pull_request_id());
        info!(
            genre = %status.context.genre,
            context = %status.context.name,
            state = %status.state,
            "Creating pull request status"
        );

        let url = self.pr_url(&["statuses"])?;
        self.send(self.request(Method::POST, url).json(status), &what)
            .await?
            .ok_or_else(|| ApiError::EmptyResponse(format!("status on {}", what)))
    }
}
