mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod services;
mod workflow;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::notes::{self, NotesCommandArgs};
use crate::cmd::serve;
use crate::config::{AppConfig, ConfigOverrides};
use crate::context::AppContext;
use crate::domain::changelog::Since;
use crate::error::{AppError, AppResult};
use crate::infra::gitlab::GitLabClient;

#[derive(Parser)]
#[command(
    name = "gitlab-release-notes",
    author,
    version,
    about = "Generate release notes for a GitLab project from merge request titles since the last release",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    notes: NotesArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve an HTML form that generates release notes on submission.
    Serve(ServeArgs),
}

#[derive(Args)]
struct NotesArgs {
    /// Numeric id of the GitLab project.
    #[arg(required = true)]
    project_id: Option<u64>,
    /// Base URL of the GitLab instance [env: GITLAB_URL, default: https://gitlab.com]
    #[arg(long)]
    url: Option<String>,
    /// Access token sent with every API request [env: GITLAB_PRIVATE_TOKEN]
    #[arg(long, alias = "private_token")]
    private_token: Option<String>,
    /// Terminate lines with an HTML line break instead of a newline.
    #[arg(long)]
    html: bool,
    /// List merge requests merged since this date (YYYY-MM-DD) or RFC 3339 timestamp.
    #[arg(long)]
    since: Option<Since>,
    /// Only consider merge requests targeting this branch.
    #[arg(long)]
    branch: Option<String>,
    /// Print nothing when there is no new merged merge request.
    #[arg(long)]
    quiet: bool,
    /// Merge requests fetched per page [env: GITLAB_PER_PAGE, default: 20]
    #[arg(long)]
    per_page: Option<u32>,
    /// HTTP timeout in seconds [env: GITLAB_TIMEOUT_SECS, default: 30]
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on [env: RELEASE_NOTES_HOST, default: 127.0.0.1]
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on [env: RELEASE_NOTES_PORT, default: 8080]
    #[arg(long)]
    port: Option<u16>,
    /// Default GitLab URL when the form leaves it empty [env: GITLAB_URL]
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.command.is_some());

    let outcome = CliOutcome::from_result(run(cli).await);
    if let Some(text) = &outcome.stdout {
        println!("{text}");
    }
    if let Some(text) = &outcome.stderr {
        eprintln!("{text}");
    }
    if outcome.exit_code != 0 {
        std::process::exit(outcome.exit_code);
    }
}

/// What the process prints, and where, for a finished run.
#[derive(Debug, PartialEq, Eq)]
struct CliOutcome {
    stdout: Option<String>,
    stderr: Option<String>,
    exit_code: i32,
}

impl CliOutcome {
    /// A project without merged merge requests is reported but is not a
    /// failure. An empty changelog (quiet mode) prints nothing.
    fn from_result(result: AppResult<String>) -> Self {
        match result {
            Ok(changelog) => Self {
                stdout: (!changelog.is_empty()).then_some(changelog),
                stderr: None,
                exit_code: 0,
            },
            Err(error @ AppError::NoMergedRequests { .. }) => Self {
                stdout: None,
                stderr: Some(error.to_string()),
                exit_code: 0,
            },
            Err(error) => Self {
                stdout: None,
                stderr: Some(format!("Error: {error}")),
                exit_code: 1,
            },
        }
    }
}

fn init_tracing(serving: bool) {
    let default_directive = if serving {
        "gitlab_release_notes=info"
    } else {
        "gitlab_release_notes=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> AppResult<String> {
    let config = AppConfig::from_env()?;

    match cli.command {
        Some(Commands::Serve(args)) => {
            let config = config.with_overrides(ConfigOverrides {
                gitlab_url: args.url,
                host: args.host,
                port: args.port,
                ..ConfigOverrides::default()
            })?;
            serve::run(config).await.map(|()| String::new())
        }
        None => run_notes(config, cli.notes).await,
    }
}

async fn run_notes(config: AppConfig, args: NotesArgs) -> AppResult<String> {
    let project_id = args
        .project_id
        .ok_or_else(|| AppError::Configuration("a project id is required".to_string()))?;
    let config = config.with_overrides(ConfigOverrides {
        gitlab_url: args.url,
        private_token: args.private_token,
        per_page: args.per_page,
        timeout_secs: args.timeout_secs,
        ..ConfigOverrides::default()
    })?;

    let hosting = Arc::new(GitLabClient::from_config(&config)?);
    let context = AppContext::new(config, hosting);

    notes::run(
        &context,
        NotesCommandArgs {
            project_id,
            since: args.since,
            branch: args.branch,
            html: args.html,
            quiet: args.quiet,
        },
    )
    .await
}
