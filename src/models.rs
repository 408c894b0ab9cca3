use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Review thread status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadStatus {
    #[default]
    Active,
    Fixed,
    WontFix,
    Closed,
    Pending,
}

impl ThreadStatus {
    pub const ALL: [ThreadStatus; 5] = [
        ThreadStatus::Active,
        ThreadStatus::Fixed,
        ThreadStatus::WontFix,
        ThreadStatus::Closed,
        ThreadStatus::Pending,
    ];

    /// Integer sent to the API
    pub fn wire(self) -> u8 {
        match self {
            ThreadStatus::Active => 1,
            ThreadStatus::Fixed => 2,
            ThreadStatus::WontFix => 3,
            ThreadStatus::Closed => 4,
            ThreadStatus::Pending => 5,
        }
    }

    /// Display name, also accepted on the command line
    pub fn name(self) -> &'static str {
        match self {
            ThreadStatus::Active => "Active",
            ThreadStatus::Fixed => "Fixed",
            ThreadStatus::WontFix => "WontFix",
            ThreadStatus::Closed => "Closed",
            ThreadStatus::Pending => "Pending",
        }
    }

    /// Parse a status name (case-insensitive). Unknown names map to `Active`.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode the status string the API reports on a thread into its display name.
/// Unrecognized values pass through unchanged.
pub fn decode_status(raw: &str) -> String {
    match raw {
        "active" => "Active",
        "fixed" => "Fixed",
        "wontFix" => "WontFix",
        "closed" => "Closed",
        "pending" => "Pending",
        "byDesign" => "By Design",
        other => other,
    }
    .to_string()
}

/// Convert backslashes to forward slashes and ensure a leading slash
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

/// Inclusive line range on the changed side of a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// "Line 10" or "Lines 10-12"
    pub fn label(&self) -> String {
        if self.is_single() {
            format!("Line {}", self.start)
        } else {
            format!("Lines {}", self)
        }
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Where an inline comment should be anchored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAnchor {
    pub path: String,
    pub lines: LineRange,
}

/// A comment to post: either a reply to an existing thread or a new thread
#[derive(Debug, Clone, Default)]
pub struct CommentRequest {
    pub body: String,
    pub thread_id: Option<u64>,
    pub file_path: Option<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub iteration_id: Option<u64>,
    pub initial_status: ThreadStatus,
}

impl CommentRequest {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// Check the request before any network call is made
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.body.trim().is_empty() {
            return Err(ApiError::InvalidRequest("comment body is empty".to_string()));
        }

        if matches!(self.start_line, Some(0)) || matches!(self.end_line, Some(0)) {
            return Err(ApiError::InvalidRequest(
                "line numbers must be positive".to_string(),
            ));
        }

        let Some(path) = &self.file_path else {
            if self.start_line.is_some() || self.end_line.is_some() {
                return Err(ApiError::InvalidRequest(
                    "line numbers require a file path".to_string(),
                ));
            }
            return Ok(());
        };

        if path.trim().is_empty() {
            return Err(ApiError::InvalidRequest("file path is empty".to_string()));
        }

        let start = self.start_line.ok_or_else(|| {
            ApiError::InvalidRequest("a start line is required with a file path".to_string())
        })?;

        match self.end_line {
            Some(end) if end < start => Err(ApiError::InvalidRequest(format!(
                "end line {} is before start line {}",
                end, start
            ))),
            _ => Ok(()),
        }
    }

    /// Inline anchor, present only when a file path and a positive start line were given
    pub fn anchor(&self) -> Option<InlineAnchor> {
        let path = self.file_path.as_deref()?;
        let start = self.start_line.filter(|l| *l > 0)?;
        let end = self.end_line.filter(|l| *l > 0).unwrap_or(start);

        Some(InlineAnchor {
            path: normalize_path(path),
            lines: LineRange { start, end },
        })
    }
}

/// Result of posting a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    Replied {
        thread_id: u64,
        comment_id: u64,
    },
    CreatedInline {
        thread_id: u64,
        comment_id: u64,
        path: String,
        lines: LineRange,
    },
    CreatedGeneral {
        thread_id: u64,
        comment_id: u64,
    },
    Failed {
        reason: String,
    },
}

impl PostOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, PostOutcome::Failed { .. })
    }
}

impl fmt::Display for PostOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostOutcome::Replied {
                thread_id,
                comment_id,
            } => write!(f, "Replied to thread {} (comment ID: {})", thread_id, comment_id),
            PostOutcome::CreatedInline {
                thread_id,
                comment_id,
                path,
                lines,
            } => write!(
                f,
                "Created inline thread {} on {} ({}) (comment ID: {})",
                thread_id,
                path,
                lines.label(),
                comment_id
            ),
            PostOutcome::CreatedGeneral {
                thread_id,
                comment_id,
            } => write!(f, "Created thread {} (comment ID: {})", thread_id, comment_id),
            PostOutcome::Failed { reason } => write!(f, "Failed to post comment: {}", reason),
        }
    }
}

/// Result of a thread status update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Unchanged { thread_id: u64, status: String },
    Updated { thread_id: u64, from: String, to: ThreadStatus },
}

impl fmt::Display for StatusChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusChange::Unchanged { thread_id, status } => {
                write!(f, "Thread {} is already {}; nothing to do", thread_id, status)
            }
            StatusChange::Updated { thread_id, from, to } => {
                write!(f, "Thread {} status changed: {} -> {}", thread_id, from, to)
            }
        }
    }
}

/// Pull request status check state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum CheckState {
    #[value(name = "succeeded")]
    Succeeded,
    #[value(name = "failed")]
    Failed,
    #[value(name = "error")]
    Error,
    #[value(name = "pending")]
    Pending,
    #[value(name = "notSet")]
    NotSet,
    #[value(name = "notApplicable")]
    NotApplicable,
}

impl CheckState {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckState::Succeeded => "succeeded",
            CheckState::Failed => "failed",
            CheckState::Error => "error",
            CheckState::Pending => "pending",
            CheckState::NotSet => "notSet",
            CheckState::NotApplicable => "notApplicable",
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status check to attach to a pull request
#[derive(Debug, Clone)]
pub struct StatusCheck {
    pub state: CheckState,
    pub description: String,
    pub target_url: Option<String>,
    pub genre: String,
    pub context: String,
    pub iteration_id: Option<u64>,
}

impl StatusCheck {
    pub fn new(state: CheckState, description: impl Into<String>) -> Self {
        Self {
            state,
            description: description.into(),
            target_url: None,
            genre: "copilot".to_string(),
            context: "code review".to_string(),
            iteration_id: None,
        }
    }

    /// Composite `genre/context` name, for display only
    pub fn key(&self) -> String {
        format!("{}/{}", self.genre, self.context)
    }
}

/// A status check the API accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCheck {
    pub id: u64,
    pub key: String,
    pub state: CheckState,
}

impl fmt::Display for CreatedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Set status {} to {} (status ID: {})", self.key, self.state, self.id)
    }
}
