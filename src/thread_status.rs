use tracing::{info, instrument};

use crate::devops::DevOpsClient;
use crate::error::ApiError;
use crate::models::{StatusChange, ThreadStatus};

/// Set a thread's status, skipping the write when it already matches.
///
/// `requested` is compared case-sensitively against the display name of the
/// thread's current status; the value written is `ThreadStatus::from_name(requested)`.
#[instrument(skip(client), fields(pr = client.pull_request_id()))]
pub async fn set_thread_status(
    client: &DevOpsClient,
    thread_id: u64,
    requested: &str,
) -> Result<StatusChange, ApiError> {
    let thread = client.get_thread(thread_id).await?;
    let current = thread.status_name();

    if current == requested {
        info!(thread_id, status = %current, "Thread already has the requested status");
        return Ok(StatusChange::Unchanged {
            thread_id,
            status: current,
        });
    }

    let target = ThreadStatus::from_name(requested);
    client.update_thread_status(thread_id, target).await?;

    info!(thread_id, from = %current, to = %target, "Thread status updated");

    Ok(StatusChange::Updated {
        thread_id,
        from: current,
        to: target,
    })
}
