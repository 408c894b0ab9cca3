use reqwest::StatusCode;
use thiserror::Error;

/// Errors from Azure DevOps API calls and request validation
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed ({status}); check the token and auth type")]
    Authentication { status: StatusCode },

    #[error("{0} not found")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("server returned no result for {0}")]
    EmptyResponse(String),

    #[error("unexpected response ({status}): {body}")]
    Unexpected { status: StatusCode, body: String },

    #[error("failed to parse {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Map a non-success HTTP response to an error
    pub fn from_response(status: StatusCode, body: String, what: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::NON_AUTHORITATIVE_INFORMATION => {
                ApiError::Authentication { status }
            }
            StatusCode::NOT_FOUND => ApiError::NotFound(what.to_string()),
            StatusCode::BAD_REQUEST => ApiError::BadRequest(extract_message(&body)),
            _ => ApiError::Unexpected { status, body },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// Pull the `message` field out of an API error body, falling back to the raw text
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
