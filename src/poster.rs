use tracing::{info, instrument, warn};

use crate::devops::types::{
    FilePosition, IterationContext, NewComment, NewThread, PullRequestThreadContext,
    ThreadContext,
};
use crate::devops::DevOpsClient;
use crate::error::ApiError;
use crate::models::{CommentRequest, InlineAnchor, PostOutcome};

/// Posts review comments, falling back to a plain thread when an inline anchor is rejected
pub struct CommentPoster<'a> {
    client: &'a DevOpsClient,
}

impl<'a> CommentPoster<'a> {
    pub fn new(client: &'a DevOpsClient) -> Self {
        Self { client }
    }

    /// Reply to `request.thread_id` if set, otherwise open a new thread.
    ///
    /// Lookup failures and failed submissions of non-inline comments are
    /// returned as errors. An inline submission that fails gets exactly one
    /// retry as a plain thread; if that also fails the outcome is `Failed`.
    #[instrument(skip(self, request), fields(pr = self.client.pull_request_id(), thread_id = ?request.thread_id))]
    pub async fn post(&self, request: &CommentRequest) -> Result<PostOutcome, ApiError> {
        request.validate()?;

        match request.thread_id {
            Some(thread_id) => self.reply(thread_id, &request.body).await,
            None => self.create(request).await,
        }
    }

    async fn reply(&self, thread_id: u64, body: &str) -> Result<PostOutcome, ApiError> {
        let thread = self.client.get_thread(thread_id).await?;

        let comment = self
            .client
            .add_comment(thread.id, &NewComment::text(body))
            .await?;

        info!(thread_id, comment_id = comment.id, "Reply posted");

        Ok(PostOutcome::Replied {
            thread_id: thread.id,
            comment_id: comment.id,
        })
    }

    async fn create(&self, request: &CommentRequest) -> Result<PostOutcome, ApiError> {
        let pr = self.client.get_pull_request().await?;
        info!(pr = pr.pull_request_id, title = %pr.title, state = pr.state(), "Pull request found");

        let anchor = request.anchor();
        let payload = build_thread(request, anchor.as_ref());

        match (self.client.create_thread(&payload).await, anchor) {
            (Ok(thread), Some(anchor)) => {
                info!(thread_id = thread.id, path = %anchor.path, lines = %anchor.lines, "Inline thread created");
                Ok(PostOutcome::CreatedInline {
                    thread_id: thread.id,
                    comment_id: thread.first_comment_id().unwrap_or_default(),
                    path: anchor.path,
                    lines: anchor.lines,
                })
            }
            (Ok(thread), None) => {
                info!(thread_id = thread.id, "Thread created");
                Ok(PostOutcome::CreatedGeneral {
                    thread_id: thread.id,
                    comment_id: thread.first_comment_id().unwrap_or_default(),
                })
            }
            (Err(err), None) => Err(err),
            (Err(err), Some(anchor)) => {
                warn!(error = %err, path = %anchor.path, "Inline comment failed, posting as general comment");
                Ok(self.fallback(request, &anchor, err).await)
            }
        }
    }

    async fn fallback(
        &self,
        request: &CommentRequest,
        anchor: &InlineAnchor,
        inline_error: ApiError,
    ) -> PostOutcome {
        let payload = NewThread {
            comments: vec![NewComment::text(fallback_body(&request.body, anchor))],
            status: request.initial_status.wire(),
            thread_context: None,
            pull_request_thread_context: None,
        };

        match self.client.create_thread(&payload).await {
            Ok(thread) => {
                info!(thread_id = thread.id, "Fallback thread created");
                PostOutcome::CreatedGeneral {
                    thread_id: thread.id,
                    comment_id: thread.first_comment_id().unwrap_or_default(),
                }
            }
            Err(err) => {
                warn!(error = %err, "Fallback comment failed");
                PostOutcome::Failed {
                    reason: format!(
                        "inline comment failed ({}); fallback comment failed ({})",
                        inline_error, err
                    ),
                }
            }
        }
    }
}

/// Thread creation payload, anchored when `anchor` is given
pub fn build_thread(request: &CommentRequest, anchor: Option<&InlineAnchor>) -> NewThread {
    let (thread_context, pull_request_thread_context) = match anchor {
        Some(anchor) => (
            Some(ThreadContext {
                file_path: anchor.path.clone(),
                right_file_start: FilePosition {
                    line: anchor.lines.start,
                    offset: 1,
                },
                right_file_end: FilePosition {
                    line: anchor.lines.end,
                    offset: 1,
                },
            }),
            request.iteration_id.map(|id| PullRequestThreadContext {
                iteration_context: IterationContext::pinned(id),
            }),
        ),
        None => (None, None),
    };

    NewThread {
        comments: vec![NewComment::text(request.body.clone())],
        status: request.initial_status.wire(),
        thread_context,
        pull_request_thread_context,
    }
}

/// Original body with the file and line(s) appended
pub fn fallback_body(body: &str, anchor: &InlineAnchor) -> String {
    format!(
        "{}\n\n**File:** `{}`\n**{}**",
        body,
        anchor.path,
        anchor.lines.label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devops::client::tests::{test_client, PR_PATH};
    use crate::models::{LineRange, ThreadStatus};
    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_pull_request(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(PR_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pullRequestId": 42,
                "title": "Add login page"
            })))
            .mount(server)
            .await;
    }

    fn created_thread(id: u64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "status": "active",
            "comments": [{"id": 1, "parentCommentId": 0, "content": "x"}]
        }))
    }

    fn threads_path() -> String {
        format!("{}/threads", PR_PATH)
    }

    async fn thread_bodies(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.method.as_str() == "POST" && r.url.path() == threads_path())
            .map(|r| r.body_json::<Value>().unwrap())
            .collect()
    }

    fn inline_request() -> CommentRequest {
        CommentRequest {
            file_path: Some("/src/P.cs".to_string()),
            start_line: Some(10),
            ..CommentRequest::new("Consider a null check here.")
        }
    }

    #[test]
    fn test_fallback_body() {
        let anchor = InlineAnchor {
            path: "/src/P.cs".to_string(),
            lines: LineRange { start: 10, end: 10 },
        };
        assert_eq!(
            fallback_body("Looks off.", &anchor),
            "Looks off.\n\n**File:** `/src/P.cs`\n**Line 10**"
        );

        let anchor = InlineAnchor {
            lines: LineRange { start: 10, end: 12 },
            ..anchor
        };
        assert!(fallback_body("Looks off.", &anchor).ends_with("**Lines 10-12**"));
    }

    #[test]
    fn test_build_thread_inline_with_iteration() {
        let request = CommentRequest {
            file_path: Some("src\\P.cs".to_string()),
            start_line: Some(3),
            end_line: Some(7),
            iteration_id: Some(4),
            initial_status: ThreadStatus::Pending,
            ..CommentRequest::new("body")
        };

        let anchor = request.anchor();
        let value = serde_json::to_value(build_thread(&request, anchor.as_ref())).unwrap();

        assert_eq!(value["status"], 5);
        assert_eq!(value["threadContext"]["filePath"], "/src/P.cs");
        assert_eq!(value["threadContext"]["rightFileStart"], json!({"line": 3, "offset": 1}));
        assert_eq!(value["threadContext"]["rightFileEnd"], json!({"line": 7, "offset": 1}));
        assert_eq!(
            value["pullRequestThreadContext"]["iterationContext"],
            json!({"firstComparingIteration": 4, "secondComparingIteration": 4})
        );
    }

    #[test]
    fn test_build_thread_general_ignores_iteration() {
        let request = CommentRequest {
            iteration_id: Some(4),
            ..CommentRequest::new("body")
        };

        let value = serde_json::to_value(build_thread(&request, None)).unwrap();
        assert!(value.get("threadContext").is_none());
        assert!(value.get("pullRequestThreadContext").is_none());
    }

    #[tokio::test]
    async fn test_new_general_thread() {
        let server = MockServer::start().await;
        mount_pull_request(&server).await;
        Mock::given(method("POST"))
            .and(path(threads_path()))
            .respond_with(created_thread(11))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let outcome = CommentPoster::new(&client)
            .post(&CommentRequest::new("Nice work overall."))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PostOutcome::CreatedGeneral {
                thread_id: 11,
                comment_id: 1
            }
        );

        let bodies = thread_bodies(&server).await;
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["status"], 1);
        assert_eq!(bodies[0]["comments"].as_array().unwrap().len(), 1);
        assert_eq!(bodies[0]["comments"][0]["content"], "Nice work overall.");
        assert!(bodies[0].get("threadContext").is_none());
    }

    #[tokio::test]
    async fn test_new_inline_thread() {
        let server = MockServer::start().await;
        mount_pull_request(&server).await;
        Mock::given(method("POST"))
            .and(path(threads_path()))
            .and(body_partial_json(json!({
                "threadContext": {
                    "filePath": "/src/P.cs",
                    "rightFileStart": {"line": 10, "offset": 1},
                    "rightFileEnd": {"line": 10, "offset": 1}
                }
            })))
            .respond_with(created_thread(12))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let outcome = CommentPoster::new(&client)
            .post(&inline_request())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PostOutcome::CreatedInline {
                thread_id: 12,
                comment_id: 1,
                path: "/src/P.cs".to_string(),
                lines: LineRange { start: 10, end: 10 },
            }
        );
    }

    #[tokio::test]
    async fn test_inline_failure_falls_back_once() {
        let server = MockServer::start().await;
        mount_pull_request(&server).await;
        Mock::given(method("POST"))
            .and(path(threads_path()))
            .and(body_partial_json(json!({"threadContext": {"filePath": "/src/P.cs"}})))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(threads_path()))
            .and(body_string_contains("**File:** `/src/P.cs`"))
            .respond_with(created_thread(13))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let outcome = CommentPoster::new(&client)
            .post(&inline_request())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PostOutcome::CreatedGeneral {
                thread_id: 13,
                comment_id: 1
            }
        );

        let bodies = thread_bodies(&server).await;
        assert_eq!(bodies.len(), 2);
        let fallback = &bodies[1];
        assert!(fallback.get("threadContext").is_none());
        assert_eq!(fallback["status"], 1);
        assert_eq!(
            fallback["comments"][0]["content"],
            "Consider a null check here.\n\n**File:** `/src/P.cs`\n**Line 10**"
        );
    }

    #[tokio::test]
    async fn test_inline_empty_result_falls_back() {
        let server = MockServer::start().await;
        mount_pull_request(&server).await;
        Mock::given(method("POST"))
            .and(path(threads_path()))
            .and(body_partial_json(json!({"threadContext": {"filePath": "/src/P.cs"}})))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(threads_path()))
            .and(body_string_contains("**Line 10**"))
            .respond_with(created_thread(14))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let outcome = CommentPoster::new(&client)
            .post(&inline_request())
            .await
            .unwrap();

        assert!(matches!(outcome, PostOutcome::CreatedGeneral { thread_id: 14, .. }));
    }

    #[tokio::test]
    async fn test_fallback_failure_is_terminal() {
        let server = MockServer::start().await;
        mount_pull_request(&server).await;
        Mock::given(method("POST"))
            .and(path(threads_path()))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let outcome = CommentPoster::new(&client)
            .post(&CommentRequest {
                initial_status: ThreadStatus::Closed,
                ..inline_request()
            })
            .await
            .unwrap();

        match outcome {
            PostOutcome::Failed { reason } => {
                assert!(reason.contains("inline comment failed"));
                assert!(reason.contains("fallback comment failed"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }

        let bodies = thread_bodies(&server).await;
        assert_eq!(bodies[1]["status"], 4);
    }

    #[tokio::test]
    async fn test_general_failure_propagates() {
        let server = MockServer::start().await;
        mount_pull_request(&server).await;
        Mock::given(method("POST"))
            .and(path(threads_path()))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "nope"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = CommentPoster::new(&client)
            .post(&CommentRequest::new("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "nope"));
    }

    #[tokio::test]
    async fn test_missing_pull_request_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PR_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(created_thread(1))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = CommentPoster::new(&client)
            .post(&inline_request())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_reply_to_thread() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/threads/5", PR_PATH)))
            .respond_with(created_thread(5))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{}/threads/5/comments", PR_PATH)))
            .and(body_partial_json(json!({
                "parentCommentId": 0,
                "commentType": 1,
                "content": "Fixed in the latest push."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 3,
                "parentCommentId": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let outcome = CommentPoster::new(&client)
            .post(&CommentRequest {
                thread_id: Some(5),
                ..CommentRequest::new("Fixed in the latest push.")
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PostOutcome::Replied {
                thread_id: 5,
                comment_id: 3
            }
        );
    }

    #[tokio::test]
    async fn test_reply_to_missing_thread() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/threads/77", PR_PATH)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = CommentPoster::new(&client)
            .post(&CommentRequest {
                thread_id: Some(77),
                ..CommentRequest::new("ping")
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "thread 77 not found");
    }

    #[tokio::test]
    async fn test_reply_to_deleted_thread() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/threads/5", PR_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 5,
                "status": "active",
                "isDeleted": true
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{}/threads/5/comments", PR_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3})))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = CommentPoster::new(&client)
            .post(&CommentRequest {
                thread_id: Some(5),
                ..CommentRequest::new("Still an issue?")
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(ref what) if what == "thread 5"));
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_calls() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = CommentPoster::new(&client)
            .post(&CommentRequest {
                file_path: Some("/a.rs".to_string()),
                ..CommentRequest::new("body")
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }
}
