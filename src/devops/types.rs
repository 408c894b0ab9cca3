use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{decode_status, CheckState, ThreadStatus};

/// Comment type for plain text comments
pub const COMMENT_TYPE_TEXT: u8 = 1;

/// Pull request as returned by `GET /pullrequests/{id}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: u64,
    #[serde(default)]
    pub title: String,
    pub status: Option<String>,
}

impl PullRequest {
    /// Lifecycle state such as `active`, `completed` or `abandoned`
    pub fn state(&self) -> &str {
        self.status.as_deref().unwrap_or("unknown")
    }
}

/// Comment thread
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: u64,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Thread {
    /// Display name of the thread's current status
    pub fn status_name(&self) -> String {
        match &self.status {
            Some(Value::String(s)) => decode_status(s),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|w| ThreadStatus::ALL.into_iter().find(|s| u64::from(s.wire()) == w))
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| n.to_string()),
            _ => "unknown".to_string(),
        }
    }

    /// ID of the thread's opening comment
    pub fn first_comment_id(&self) -> Option<u64> {
        self.comments.first().map(|c| c.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub parent_comment_id: u64,
    pub content: String,
    pub comment_type: u8,
}

impl NewComment {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            parent_comment_id: 0,
            content: content.into(),
            comment_type: COMMENT_TYPE_TEXT,
        }
    }
}

/// Body of `POST /pullrequests/{id}/threads`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub comments: Vec<NewComment>,
    pub status: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_context: Option<ThreadContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_thread_context: Option<PullRequestThreadContext>,
}

/// File anchor for an inline thread
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadContext {
    pub file_path: String,
    pub right_file_start: FilePosition,
    pub right_file_end: FilePosition,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FilePosition {
    pub line: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestThreadContext {
    pub iteration_context: IterationContext,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationContext {
    pub first_comparing_iteration: u64,
    pub second_comparing_iteration: u64,
}

impl IterationContext {
    /// Pin both comparison sides to one iteration
    pub fn pinned(iteration_id: u64) -> Self {
        Self {
            first_comparing_iteration: iteration_id,
            second_comparing_iteration: iteration_id,
        }
    }
}

/// Body of `PATCH /pullrequests/{id}/threads/{threadId}`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThreadStatusPatch {
    pub status: u8,
}

/// Body of `POST /pullrequests/{id}/statuses`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStatus {
    pub state: CheckState,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    pub context: StatusContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusContext {
    pub name: String,
    pub genre: String,
}

/// Status record returned after creation
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestStatus {
    pub id: u64,
}
