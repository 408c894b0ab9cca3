pub mod config;
pub mod devops;
pub mod error;
pub mod models;
pub mod poster;
pub mod status_check;
pub mod thread_status;

pub use config::{AuthScheme, Config, Connection, ConnectionOverrides};
pub use devops::DevOpsClient;
pub use error::ApiError;
pub use models::*;
pub use poster::CommentPoster;
pub use status_check::set_status_check;
pub use thread_status::set_thread_status;
