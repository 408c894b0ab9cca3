use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ado_review::config::DEFAULT_CONFIG_PATH;
use ado_review::{
    set_status_check, set_thread_status, AuthScheme, CheckState, CommentPoster, CommentRequest,
    Config, ConnectionOverrides, DevOpsClient, PostOutcome, StatusCheck, ThreadStatus,
};

#[derive(Parser)]
#[command(name = "ado-review")]
#[command(about = "Post review comments and statuses on Azure DevOps pull requests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(flatten)]
    connection: ConnectionArgs,
}

/// Target pull request and credentials; each flag falls back to an environment variable
#[derive(Args)]
struct ConnectionArgs {
    /// Personal access token or OAuth token
    #[arg(long, env = "AZURE_DEVOPS_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// How the token is sent
    #[arg(long, env = "AZURE_DEVOPS_AUTH_TYPE", value_enum, ignore_case = true, global = true)]
    auth_type: Option<AuthScheme>,

    /// Organization name
    #[arg(long, env = "AZURE_DEVOPS_ORG", global = true)]
    organization: Option<String>,

    /// Project name
    #[arg(long, env = "AZURE_DEVOPS_PROJECT", global = true)]
    project: Option<String>,

    /// Repository name or ID
    #[arg(long, env = "AZURE_DEVOPS_REPO", global = true)]
    repository: Option<String>,

    /// Pull request ID
    #[arg(long, env = "AZURE_DEVOPS_PR_ID", value_parser = clap::value_parser!(u64).range(1..), global = true)]
    pr_id: Option<u64>,

    /// Pull request iteration the comment or status applies to
    #[arg(long, env = "AZURE_DEVOPS_ITERATION_ID", value_parser = clap::value_parser!(u64).range(1..), global = true)]
    iteration_id: Option<u64>,

    /// Server URL (defaults to https://dev.azure.com)
    #[arg(long, env = "AZURE_DEVOPS_BASE_URL", global = true)]
    base_url: Option<String>,
}

impl ConnectionArgs {
    fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            base_url: self.base_url.clone(),
            organization: self.organization.clone(),
            project: self.project.clone(),
            repository: self.repository.clone(),
            pull_request_id: self.pr_id,
            token: self.token.clone(),
            auth: self.auth_type,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Post a comment: reply to a thread, or open a new (optionally inline) thread
    PostComment {
        /// Comment text (markdown). Read from --comment-file or stdin if omitted
        #[arg(long, conflicts_with = "comment_file")]
        comment: Option<String>,

        /// Read the comment text from a file
        #[arg(long)]
        comment_file: Option<PathBuf>,

        /// Reply to this thread instead of opening a new one
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        thread_id: Option<u64>,

        /// File to anchor the new thread to
        #[arg(long)]
        file_path: Option<String>,

        /// First line of the anchor
        #[arg(long, requires = "file_path", value_parser = clap::value_parser!(u32).range(1..))]
        start_line: Option<u32>,

        /// Last line of the anchor (defaults to --start-line)
        #[arg(long, requires = "start_line", value_parser = clap::value_parser!(u32).range(1..))]
        end_line: Option<u32>,

        /// Status of the new thread (Active, Fixed, WontFix, Closed, Pending)
        #[arg(long, default_value = "Active")]
        status: String,
    },

    /// Change the status of a comment thread
    SetThreadStatus {
        /// Thread ID
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        thread_id: u64,

        /// New status (Active, Fixed, WontFix, Closed, Pending)
        #[arg(long)]
        status: String,
    },

    /// Set a status check on the pull request
    SetPrStatus {
        /// Check state
        #[arg(long, value_enum)]
        state: CheckState,

        /// Short description shown next to the check
        #[arg(long)]
        description: String,

        /// Link opened from the check
        #[arg(long)]
        target_url: Option<String>,

        /// Status genre (defaults to the config value, "copilot")
        #[arg(long)]
        genre: Option<String>,

        /// Status context name (defaults to the config value, "code review")
        #[arg(long)]
        context: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the transcript
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ado_review=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let iteration_id = cli.connection.iteration_id;
    let connection = config.resolve_connection(cli.connection.overrides())?;

    println!("Pull request: {}", connection.describe());
    let client = DevOpsClient::new(connection).context("Failed to create Azure DevOps client")?;

    match cli.command {
        Commands::PostComment {
            comment,
            comment_file,
            thread_id,
            file_path,
            start_line,
            end_line,
            status,
        } => {
            let request = CommentRequest {
                body: read_comment(comment, comment_file)?,
                thread_id,
                file_path,
                start_line,
                end_line,
                iteration_id,
                initial_status: ThreadStatus::from_name(&status),
            };
            post_comment(&client, &request).await?;
        }
        Commands::SetThreadStatus { thread_id, status } => {
            let change = match set_thread_status(&client, thread_id, &status).await {
                Err(err) if err.is_not_found() => anyhow::bail!(
                    "Thread {} does not exist on pull request {}",
                    thread_id,
                    client.pull_request_id()
                ),
                result => result
                    .with_context(|| format!("Failed to set status of thread {}", thread_id))?,
            };
            println!("{}", change);
        }
        Commands::SetPrStatus {
            state,
            description,
            target_url,
            genre,
            context,
        } => {
            let check = StatusCheck {
                state,
                description,
                target_url,
                genre: genre.unwrap_or_else(|| config.status_check.genre.clone()),
                context: context.unwrap_or_else(|| config.status_check.context.clone()),
                iteration_id,
            };
            let created = set_status_check(&client, &check)
                .await
                .with_context(|| format!("Failed to set status {}", check.key()))?;
            println!("{}", created);
        }
    }

    Ok(())
}

async fn post_comment(client: &DevOpsClient, request: &CommentRequest) -> Result<()> {
    let outcome = CommentPoster::new(client)
        .post(request)
        .await
        .context("Failed to post comment")?;

    if !outcome.is_success() {
        anyhow::bail!("{}", outcome);
    }

    if request.thread_id.is_none() && matches!(outcome, PostOutcome::CreatedGeneral { .. }) {
        if let Some(anchor) = request.anchor() {
            info!(path = %anchor.path, "Inline anchor rejected");
            println!(
                "Inline comment on {} ({}) was rejected; posted as a general comment instead",
                anchor.path,
                anchor.lines.label()
            );
        }
    }

    println!("{}", outcome);

    Ok(())
}

fn read_comment(comment: Option<String>, comment_file: Option<PathBuf>) -> Result<String> {
    match (comment, comment_file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("Failed to read comment file: {}", path.display())),
        (None, None) => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read comment from stdin")?;
            Ok(buffer)
        }
    }
}
