use tracing::{info, instrument};

use crate::devops::types::{NewStatus, StatusContext};
use crate::devops::DevOpsClient;
use crate::error::ApiError;
use crate::models::{CreatedCheck, StatusCheck};

/// Post a status check on the pull request. The platform replaces any
/// earlier status with the same genre and context.
#[instrument(skip(client, check), fields(pr = client.pull_request_id(), key = %check.key()))]
pub async fn set_status_check(
    client: &DevOpsClient,
    check: &StatusCheck,
) -> Result<CreatedCheck, ApiError> {
    let pr = client.get_pull_request().await?;
    info!(pr = pr.pull_request_id, title = %pr.title, state = pr.state(), "Pull request found");

    let payload = NewStatus {
        state: check.state,
        description: check.description.clone(),
        target_url: check.target_url.clone().filter(|u| !u.trim().is_empty()),
        context: StatusContext {
            name: check.context.clone(),
            genre: check.genre.clone(),
        },
        iteration_id: check.iteration_id,
    };

    let created = client.create_status(&payload).await?;

    info!(status_id = created.id, state = %check.state, "Status check created");

    Ok(CreatedCheck {
        id: created.id,
        key: check.key(),
        state: check.state,
    })
}
