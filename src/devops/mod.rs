pub mod client;
pub mod types;

pub use client::{DevOpsClient, API_VERSION};
pub use types::{NewComment, NewStatus, NewThread, PullRequest, Thread};
